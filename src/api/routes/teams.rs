use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::api::state::AppState;
use crate::api::ApiError;
use crate::calculate::{
    aggregate_players, candidates_by_mmr, compare_teams, suggest_teammates, MAX_ROSTER_SIZE,
};
use crate::models::{DateRange, PlayerId, TeamCompositionResult, TeammateSuggestion};

use super::{compute, parse_ids, RangeParams};

#[derive(Debug, Deserialize)]
pub struct TeamsParams {
    /// Comma-separated player ids
    pub team1: Option<String>,
    pub team2: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
}

struct Rosters {
    team1: Vec<PlayerId>,
    team2: Vec<PlayerId>,
}

impl TeamsParams {
    fn rosters(&self) -> Result<Rosters, ApiError> {
        let team1 = parse_ids(self.team1.as_deref());
        let team2 = parse_ids(self.team2.as_deref());

        if team1.len() > MAX_ROSTER_SIZE || team2.len() > MAX_ROSTER_SIZE {
            return Err(ApiError::BadRequest(format!(
                "Rosters are limited to {} players",
                MAX_ROSTER_SIZE
            )));
        }
        if let Some(shared) = team1.iter().find(|id| team2.contains(id)) {
            return Err(ApiError::BadRequest(format!(
                "Player {} cannot be on both teams",
                shared
            )));
        }
        Ok(Rosters { team1, team2 })
    }

    fn range(&self) -> RangeParams {
        RangeParams {
            from: self.from.clone(),
            to: self.to.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub range: DateRange,
    pub team1: Vec<PlayerId>,
    pub team2: Vec<PlayerId>,
    pub result: TeamCompositionResult,
    pub team1_win_rate: f64,
}

pub async fn compare(
    State(state): State<AppState>,
    Query(params): Query<TeamsParams>,
) -> Result<Json<CompareResponse>, ApiError> {
    let Rosters { team1, team2 } = params.rosters()?;
    let filter = params.range().filter(&state.engine)?;
    let feed = state.feed().await;

    let result = compare_teams(&feed.matches, &team1, &team2, &filter);

    Ok(Json(CompareResponse {
        range: filter.range,
        team1,
        team2,
        team1_win_rate: result.team1_win_rate(),
        result,
    }))
}

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub range: DateRange,
    pub suggestions: Vec<TeammateSuggestion>,
}

pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<TeamsParams>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let Rosters { team1, team2 } = params.rosters()?;
    let filter = params.range().filter(&state.engine)?;
    let window = filter.range;
    let feed = state.feed().await;

    let suggestions = compute(move || {
        let players = aggregate_players(&feed.matches, &filter);
        let candidates = candidates_by_mmr(players.values());
        suggest_teammates(&feed.matches, &candidates, &team1, &team2, &filter)
    })
    .await?;

    Ok(Json(SuggestResponse {
        range: window,
        suggestions,
    }))
}
