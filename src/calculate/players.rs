//! Player aggregator: one summary record per player id.

use std::collections::BTreeMap;

use tracing::debug;

use super::filter::MatchFilter;
use crate::models::{Match, PlayerId, PlayerStats};

/// Seed of every player's summed rating delta.
///
/// The feed gives no meaning for a non-zero offset; keep it explicit so it
/// can be changed in one place.
pub const MMR_CHANGE_BASELINE: f64 = 0.0;

/// Fold the filtered matches into per-player statistics.
///
/// Matches are processed in input order: the name and current `mmr` of a
/// player come from their last appearance, and `average_mmr` is a running
/// mean, so reordering the input can move it within floating-point
/// tolerance.
pub fn aggregate_players(matches: &[Match], filter: &MatchFilter) -> BTreeMap<PlayerId, PlayerStats> {
    let filtered = filter.apply(matches);
    let mut players: BTreeMap<PlayerId, PlayerStats> = BTreeMap::new();
    let mut skipped_participants = 0usize;

    for m in &filtered.matches {
        let Some(winner) = m.winning_side() else {
            continue;
        };

        for (side, participant) in m.participants() {
            if !filter.counts_participant(participant) {
                if !participant.is_well_formed() {
                    skipped_participants += 1;
                }
                continue;
            }
            let (Some(id), Some(mmr)) = (participant.player_id(), participant.mmr) else {
                continue;
            };

            players
                .entry(id.clone())
                .or_insert_with(|| {
                    PlayerStats::new(id.clone(), participant.name.clone(), MMR_CHANGE_BASELINE)
                })
                .record(
                    &participant.name,
                    side == winner,
                    mmr,
                    participant.mmr_change.unwrap_or(0.0),
                );
        }
    }

    for stats in players.values_mut() {
        stats.finalize();
    }

    if skipped_participants > 0 {
        debug!("Skipped {} malformed participant(s)", skipped_participants);
    }
    debug!(
        "Aggregated {} players over {} matches",
        players.len(),
        filtered.matches.len()
    );

    players
}

/// Case-insensitive name search, highest current rating first.
pub fn search_by_name<'a>(
    players: &'a BTreeMap<PlayerId, PlayerStats>,
    query: &str,
) -> Vec<&'a PlayerStats> {
    let query = query.trim().to_lowercase();
    let mut found: Vec<&PlayerStats> = players
        .values()
        .filter(|p| p.player_name.to_lowercase().contains(&query))
        .collect();
    found.sort_by(|a, b| b.mmr.total_cmp(&a.mmr));
    found
}

/// Highest win rates first, at most `limit` players.
pub fn top_by_win_rate(players: &BTreeMap<PlayerId, PlayerStats>, limit: usize) -> Vec<&PlayerStats> {
    let mut ranked: Vec<&PlayerStats> = players.values().collect();
    ranked.sort_by(|a, b| b.win_rate.total_cmp(&a.win_rate));
    ranked.truncate(limit);
    ranked
}
