use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::{aggregate_players, head_to_head, head_to_head_matrix, top_by_win_rate, HeadToHeadMatrix};
use crate::models::{DateRange, HeadToHeadStats, PlayerId, PlayerStats};

use super::{compute, parse_ids, RangeParams};

/// Players shown when the caller does not pick any.
pub const DEFAULT_MATRIX_SIZE: usize = 15;

#[derive(Debug, Deserialize)]
pub struct MatrixParams {
    /// Comma-separated player ids
    pub ids: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct MatrixResponse {
    pub range: DateRange,
    /// Axis order of the matrix
    pub players: Vec<PlayerStats>,
    pub matrix: HeadToHeadMatrix,
}

pub async fn matrix(
    State(state): State<AppState>,
    Query(params): Query<MatrixParams>,
) -> Result<Json<MatrixResponse>, ApiError> {
    let range = RangeParams {
        from: params.from,
        to: params.to,
    };
    let filter = range.filter(&state.engine)?;
    let window = filter.range;
    let strategy = state.engine.pairwise;
    let requested = parse_ids(params.ids.as_deref());
    let feed = state.feed().await;

    let (players, matrix) = compute(move || {
        let stats = aggregate_players(&feed.matches, &filter);
        let players: Vec<PlayerStats> = if requested.is_empty() {
            top_by_win_rate(&stats, DEFAULT_MATRIX_SIZE)
                .into_iter()
                .cloned()
                .collect()
        } else {
            requested
                .iter()
                .filter_map(|id| stats.get(id).cloned())
                .collect()
        };

        let ids: Vec<PlayerId> = players.iter().map(|p| p.player_id.clone()).collect();
        let matrix = head_to_head_matrix(&feed.matches, &ids, &filter, strategy);
        (players, matrix)
    })
    .await?;

    Ok(Json(MatrixResponse {
        range: window,
        players,
        matrix,
    }))
}

pub async fn pair(
    State(state): State<AppState>,
    Path((player1, player2)): Path<(String, String)>,
    Query(range): Query<RangeParams>,
) -> Result<Json<HeadToHeadStats>, ApiError> {
    if player1 == player2 {
        return Err(ApiError::BadRequest(
            "Head-to-head needs two different players".to_string(),
        ));
    }
    let filter = range.filter(&state.engine)?;
    let feed = state.feed().await;
    let (player1, player2) = (PlayerId::from(player1), PlayerId::from(player2));

    let stats = compute(move || head_to_head(&feed.matches, &player1, &player2, &filter)).await?;
    Ok(Json(stats))
}
