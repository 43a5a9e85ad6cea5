//! Statistics calculation engine.
//!
//! Pure functions over a match list:
//! - Date-range and validity filtering
//! - Per-player win/loss and rating summaries
//! - Pairwise head-to-head matrix
//! - Team-vs-team tallies and teammate suggestions
//!
//! Nothing here keeps state between calls; every filter change means a
//! full recomputation.

pub mod filter;
pub mod head_to_head;
pub mod players;
pub mod team;

use std::collections::BTreeMap;

use serde::Serialize;

pub use filter::{parse_date_range, MatchFilter, DEFAULT_GAME};
pub use head_to_head::{
    head_to_head, head_to_head_matrix, head_to_head_row, opponents_by_games_against,
    HeadToHeadMatrix, PairwiseStrategy,
};
pub use players::{aggregate_players, search_by_name, top_by_win_rate, MMR_CHANGE_BASELINE};
pub use team::{candidates_by_mmr, compare_teams, suggest_teammates, MAX_ROSTER_SIZE};

use crate::models::{DateRange, Fingerprint, MatchFeed, PlayerId, PlayerStats};

/// Headline figures for one filter.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardTotals {
    /// Decisive in-category matches inside the window
    pub total_matches: usize,
    pub total_players: usize,
    /// Feed elements that could not be read as matches
    pub malformed_records: usize,
    /// Non-decisive winners other than the cancel marker
    pub anomalous_winners: usize,
}

/// Everything the overview and matrix views show for one filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardSnapshot {
    pub fingerprint: Fingerprint,
    pub range: DateRange,
    pub totals: DashboardTotals,
    pub players: BTreeMap<PlayerId, PlayerStats>,
    pub head_to_head: HeadToHeadMatrix,
}

/// Recompute the dashboard from scratch.
pub fn compute_snapshot(
    feed: &MatchFeed,
    filter: &MatchFilter,
    strategy: PairwiseStrategy,
) -> DashboardSnapshot {
    let filtered = filter.apply(&feed.matches);
    let players = aggregate_players(&feed.matches, filter);
    let ids: Vec<PlayerId> = players.keys().cloned().collect();
    let head_to_head = head_to_head_matrix(&feed.matches, &ids, filter, strategy);

    DashboardSnapshot {
        fingerprint: feed.fingerprint.clone(),
        range: filter.range,
        totals: DashboardTotals {
            total_matches: filtered.matches.len(),
            total_players: players.len(),
            malformed_records: feed.skipped,
            anomalous_winners: filtered.rejected.anomalous_winner,
        },
        players,
        head_to_head,
    }
}
