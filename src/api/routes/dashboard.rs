use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::{DashboardSnapshot, DashboardTotals};
use crate::models::{DateRange, Fingerprint};

use super::refresh::RefreshStatus;
use super::RangeParams;

// ── Overview ─────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct OverviewResponse {
    pub source: String,
    pub fingerprint: Fingerprint,
    pub loaded_at: DateTime<Utc>,
    /// Window of the published snapshot
    pub range: DateRange,
    pub totals: DashboardTotals,
    /// Window most recently requested, possibly still settling
    pub requested_range: DateRange,
    pub refresh_status: RefreshStatus,
}

pub async fn overview(State(state): State<AppState>) -> Json<OverviewResponse> {
    let (fingerprint, loaded_at) = {
        let dataset = state.dataset.read().await;
        (dataset.feed.fingerprint.clone(), dataset.loaded_at)
    };
    let snapshot = state.scheduler.latest();
    let refresh_status = state.refresh_state.read().await.status;

    Json(OverviewResponse {
        source: state.source.describe(),
        fingerprint,
        loaded_at,
        range: snapshot.range,
        totals: snapshot.totals,
        requested_range: state.scheduler.requested_range(),
        refresh_status,
    })
}

// ── Filter ───────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct FilterBody {
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FilterAccepted {
    pub requested_range: DateRange,
    /// True when the published snapshot already covers the request
    pub settled: bool,
}

/// Schedule recomputation for a new window. The snapshot is published
/// once the window stops changing.
pub async fn set_filter(
    State(state): State<AppState>,
    Json(body): Json<FilterBody>,
) -> Result<impl IntoResponse, ApiError> {
    let range = RangeParams {
        from: body.from,
        to: body.to,
    }
    .range()?;

    state.scheduler.set_range(range);
    let settled = state.scheduler.latest().range == range;

    Ok((
        StatusCode::ACCEPTED,
        Json(FilterAccepted {
            requested_range: range,
            settled,
        }),
    ))
}

// ── Dashboard ────────────────────────────────────────────────────

pub async fn dashboard(State(state): State<AppState>) -> Json<DashboardSnapshot> {
    let latest = state.scheduler.latest();
    Json(DashboardSnapshot::clone(&latest))
}
