use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::models::Fingerprint;

// ── Types ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RefreshState {
    pub status: RefreshStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: RefreshProgress,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RefreshStatus {
    #[default]
    Idle,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshProgress {
    /// Where the feed was loaded from
    #[serde(default)]
    pub source: String,
    pub matches_loaded: u32,
    /// Feed elements that could not be read as matches
    pub malformed_skipped: u32,
    /// Fingerprint of the feed now in force
    #[serde(default)]
    pub fingerprint: Option<Fingerprint>,
    /// False when the fetched feed was identical to the one in force
    #[serde(default)]
    pub changed: bool,
    #[serde(default)]
    pub message: String,
}

// ── Start ────────────────────────────────────────────────────────

pub async fn start_refresh(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    begin_refresh(&state).await?;

    let task_state = state.clone();
    tokio::spawn(async move {
        run_refresh(task_state).await;
    });

    let current = state.refresh_state.read().await;
    Ok((StatusCode::ACCEPTED, Json(current.clone())))
}

/// Mark a refresh as running, or refuse if one already is.
pub async fn begin_refresh(state: &AppState) -> Result<(), ApiError> {
    let mut refresh = state.refresh_state.write().await;
    if refresh.status == RefreshStatus::Running {
        return Err(ApiError::Conflict("Refresh already running".to_string()));
    }
    *refresh = RefreshState {
        status: RefreshStatus::Running,
        started_at: Some(Utc::now()),
        completed_at: None,
        progress: RefreshProgress {
            source: state.source.describe(),
            message: "Loading match history...".to_string(),
            ..RefreshProgress::default()
        },
        errors: Vec::new(),
    };
    Ok(())
}

// ── Status ───────────────────────────────────────────────────────

pub async fn status(State(state): State<AppState>) -> Json<RefreshState> {
    let current = state.refresh_state.read().await;
    Json(current.clone())
}

// ── Background load ──────────────────────────────────────────────

/// Load the feed and swap it in. A failed load leaves the previous
/// dataset in force.
pub async fn run_refresh(state: AppState) {
    let refresh_state: Arc<tokio::sync::RwLock<RefreshState>> = state.refresh_state.clone();

    match state.source.load().await {
        Ok(feed) => {
            let previous = state.feed().await;
            let changed = previous.fingerprint != feed.fingerprint;
            let matches_loaded = feed.len() as u32;
            let malformed_skipped = feed.skipped as u32;
            let fingerprint = feed.fingerprint.clone();

            if changed {
                state.replace_feed(feed).await;
                tracing::info!(
                    "Refresh loaded {} matches, feed is now {}",
                    matches_loaded,
                    fingerprint
                );
            } else {
                tracing::info!("Refresh found no changes ({})", fingerprint);
            }

            let mut refresh = refresh_state.write().await;
            refresh.progress.matches_loaded = matches_loaded;
            refresh.progress.malformed_skipped = malformed_skipped;
            refresh.progress.fingerprint = Some(fingerprint);
            refresh.progress.changed = changed;
            refresh.progress.message = if changed {
                format!("Loaded {} matches", matches_loaded)
            } else {
                "No new matches".to_string()
            };
            refresh.completed_at = Some(Utc::now());
            refresh.status = RefreshStatus::Completed;
        }
        Err(e) => {
            let msg = format!("Load failed: {}", e);
            tracing::warn!("{}", msg);
            let mut refresh = refresh_state.write().await;
            refresh.progress.message = "Load failed, keeping previous data".to_string();
            refresh.errors.push(msg);
            refresh.completed_at = Some(Utc::now());
            refresh.status = RefreshStatus::Failed;
        }
    }
}
