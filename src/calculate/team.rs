//! Team composition query: how two rosters fared when they met.

use std::collections::HashSet;

use tracing::{debug, warn};

use super::filter::MatchFilter;
use crate::models::{
    percentage, Match, PlayerId, PlayerStats, Side, TeamCompositionResult, TeammateSuggestion,
};

/// Largest roster the team builder accepts per side.
pub const MAX_ROSTER_SIZE: usize = 5;

fn overlaps(team1: &[PlayerId], team2: &[PlayerId]) -> bool {
    team1.iter().any(|id| team2.contains(id))
}

/// Side roster 1 played on, when each roster is contained in a
/// different side. Extra players on a side are allowed.
fn team1_side(m: &Match, team1: &[PlayerId], team2: &[PlayerId], filter: &MatchFilter) -> Option<Side> {
    let rosters: [HashSet<&PlayerId>; 2] = Side::BOTH.map(|side| filter.roster(m, side).collect());
    let within = |team: &[PlayerId], side: Side| team.iter().all(|id| rosters[side.index()].contains(id));

    let zero = within(team1, Side::Zero) && within(team2, Side::One);
    let one = within(team1, Side::One) && within(team2, Side::Zero);

    match (zero, one) {
        (true, false) => Some(Side::Zero),
        (false, true) => Some(Side::One),
        (true, true) => {
            debug!("Ambiguous roster assignment in match at {}, skipping", m.time);
            None
        }
        (false, false) => None,
    }
}

fn tally(matches: &[&Match], team1: &[PlayerId], team2: &[PlayerId], filter: &MatchFilter) -> TeamCompositionResult {
    let mut result = TeamCompositionResult::default();

    for m in matches {
        let Some(winner) = m.winning_side() else {
            continue;
        };
        let Some(side) = team1_side(m, team1, team2, filter) else {
            continue;
        };

        result.total_games += 1;
        if winner == side {
            result.team1_wins += 1;
        } else {
            result.team2_wins += 1;
        }
    }

    result
}

/// Record of roster 1 against roster 2 over the filtered matches.
///
/// Empty or overlapping rosters give the all-zero result.
pub fn compare_teams(
    matches: &[Match],
    team1: &[PlayerId],
    team2: &[PlayerId],
    filter: &MatchFilter,
) -> TeamCompositionResult {
    if team1.is_empty() || team2.is_empty() {
        return TeamCompositionResult::default();
    }
    if overlaps(team1, team2) {
        warn!("Rosters share a player; team comparison is undefined");
        return TeamCompositionResult::default();
    }

    let filtered = filter.apply(matches);
    tally(&filtered.matches, team1, team2, filter)
}

/// Known players ordered by current rating, highest first.
pub fn candidates_by_mmr<'a>(players: impl IntoIterator<Item = &'a PlayerStats>) -> Vec<&'a PlayerStats> {
    let mut candidates: Vec<&PlayerStats> = players.into_iter().collect();
    candidates.sort_by(|a, b| b.mmr.total_cmp(&a.mmr));
    candidates
}

/// Rank candidates for roster 1 by how many games the enlarged roster
/// has played against roster 2.
///
/// Candidates already on a roster, and those with no resulting games, are
/// dropped. Ties keep candidate order. Nothing is suggested unless both
/// rosters are non-empty and roster 1 has room.
pub fn suggest_teammates(
    matches: &[Match],
    candidates: &[&PlayerStats],
    team1: &[PlayerId],
    team2: &[PlayerId],
    filter: &MatchFilter,
) -> Vec<TeammateSuggestion> {
    if team1.is_empty() || team2.is_empty() || team1.len() >= MAX_ROSTER_SIZE {
        return Vec::new();
    }
    if overlaps(team1, team2) {
        warn!("Rosters share a player; no suggestions");
        return Vec::new();
    }

    let filtered = filter.apply(matches);
    let mut roster = team1.to_vec();
    let mut suggestions = Vec::new();

    for candidate in candidates {
        let id = &candidate.player_id;
        if team1.contains(id) || team2.contains(id) {
            continue;
        }

        roster.push(id.clone());
        let result = tally(&filtered.matches, &roster, team2, filter);
        roster.pop();

        if result.total_games > 0 {
            suggestions.push(TeammateSuggestion {
                player_id: id.clone(),
                player_name: candidate.player_name.clone(),
                win_rate: percentage(result.team1_wins, result.total_games),
                result,
            });
        }
    }

    suggestions.sort_by(|a, b| b.result.total_games.cmp(&a.result.total_games));
    debug!(
        "{} teammate suggestion(s) from {} candidates",
        suggestions.len(),
        candidates.len()
    );
    suggestions
}
