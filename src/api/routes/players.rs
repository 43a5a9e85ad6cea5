use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::{ApiError, Pagination, PaginationMeta};
use crate::calculate::{aggregate_players, head_to_head_row, opponents_by_games_against, search_by_name};
use crate::models::{DateRange, HeadToHeadStats, PlayerId, PlayerStats};

use super::{compute, RangeParams};

// ── List ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlayersParams {
    pub q: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PlayersResponse {
    pub range: DateRange,
    pub players: Vec<PlayerStats>,
    pub pagination: PaginationMeta,
}

/// Players matching the search, highest current rating first.
pub async fn list_players(
    State(state): State<AppState>,
    Query(params): Query<PlayersParams>,
) -> Result<Json<PlayersResponse>, ApiError> {
    let range = RangeParams {
        from: params.from,
        to: params.to,
    };
    let filter = range.filter(&state.engine)?;
    let feed = state.feed().await;

    let stats = aggregate_players(&feed.matches, &filter);
    let found = search_by_name(&stats, params.q.as_deref().unwrap_or_default());

    let pagination = Pagination::new(params.page, params.page_size);
    let meta = PaginationMeta::new(&pagination, found.len() as u32);
    let players = found
        .into_iter()
        .skip(pagination.offset() as usize)
        .take(pagination.page_size as usize)
        .cloned()
        .collect();

    Ok(Json(PlayersResponse {
        range: filter.range,
        players,
        pagination: meta,
    }))
}

// ── Detail ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct PlayerDetailResponse {
    pub player: PlayerStats,
    /// Most opposing-side games first
    pub head_to_head: Vec<HeadToHeadStats>,
}

pub async fn get_player(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(range): Query<RangeParams>,
) -> Result<Json<PlayerDetailResponse>, ApiError> {
    let filter = range.filter(&state.engine)?;
    let feed = state.feed().await;
    let id = PlayerId::from(id);

    let detail = compute({
        let id = id.clone();
        move || {
            let stats = aggregate_players(&feed.matches, &filter);
            let player = stats.get(&id).cloned()?;
            let others: Vec<PlayerId> = stats.keys().cloned().collect();
            let row = head_to_head_row(&feed.matches, &id, &others, &filter);
            let head_to_head: Vec<HeadToHeadStats> =
                opponents_by_games_against(&row).into_iter().cloned().collect();
            Some((player, head_to_head))
        }
    })
    .await?;
    let (player, head_to_head) =
        detail.ok_or_else(|| ApiError::NotFound(format!("player {}", id)))?;

    Ok(Json(PlayerDetailResponse {
        player,
        head_to_head,
    }))
}
