//! Head-to-head aggregator.
//!
//! Every joint appearance of two players is classified as either
//! same-side ("with") or opposing-side ("against"), so for each pair
//! `matches_with_both == games_with() + games_against()`.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::filter::MatchFilter;
use crate::models::{HeadToHeadStats, Match, PlayerId, Side};

/// `player1 -> player2 -> record`, one entry per ordered pair of distinct ids.
pub type HeadToHeadMatrix = BTreeMap<PlayerId, BTreeMap<PlayerId, HeadToHeadStats>>;

/// How the matrix is built. Both produce identical output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairwiseStrategy {
    /// Scan the match list once per ordered pair, O(n² · m)
    #[default]
    PerPair,
    /// Walk the match list once, accumulating only pairs that co-occur
    SinglePass,
}

fn tally(stats: &mut HeadToHeadStats, side1: Side, side2: Side, winner: Side) {
    if side1 == side2 {
        stats.record_with(winner == side1);
    } else {
        stats.record_against(winner == side1);
    }
}

fn tally_pair(
    matches: &[&Match],
    player1: &PlayerId,
    player2: &PlayerId,
    filter: &MatchFilter,
) -> HeadToHeadStats {
    let mut stats = HeadToHeadStats::new(player1.clone(), player2.clone());

    for m in matches {
        let Some(winner) = m.winning_side() else {
            continue;
        };
        let (Some(side1), Some(side2)) = (filter.side_of(m, player1), filter.side_of(m, player2))
        else {
            continue;
        };
        tally(&mut stats, side1, side2, winner);
    }

    stats.finalize();
    stats
}

/// Record for one ordered pair over the filtered matches.
pub fn head_to_head(
    matches: &[Match],
    player1: &PlayerId,
    player2: &PlayerId,
    filter: &MatchFilter,
) -> HeadToHeadStats {
    let filtered = filter.apply(matches);
    tally_pair(&filtered.matches, player1, player2, filter)
}

fn distinct(ids: &[PlayerId]) -> Vec<&PlayerId> {
    let mut seen = BTreeSet::new();
    ids.iter().filter(|id| seen.insert(*id)).collect()
}

fn per_pair(matches: &[&Match], ids: &[&PlayerId], filter: &MatchFilter) -> HeadToHeadMatrix {
    let mut matrix = HeadToHeadMatrix::new();
    for &player1 in ids {
        let row = ids
            .iter()
            .filter(|&&player2| player2 != player1)
            .map(|&player2| (player2.clone(), tally_pair(matches, player1, player2, filter)))
            .collect();
        matrix.insert(player1.clone(), row);
    }
    matrix
}

fn single_pass(matches: &[&Match], ids: &[&PlayerId], filter: &MatchFilter) -> HeadToHeadMatrix {
    let wanted: BTreeSet<&PlayerId> = ids.iter().copied().collect();
    let mut pairs: HashMap<(&PlayerId, &PlayerId), HeadToHeadStats> = HashMap::new();

    for m in matches {
        let Some(winner) = m.winning_side() else {
            continue;
        };

        // First side wins when a player is (anomalously) listed on both.
        let mut present: Vec<(&PlayerId, Side)> = Vec::new();
        for side in Side::BOTH {
            for id in filter.roster(m, side) {
                if wanted.contains(id) && !present.iter().any(|(p, _)| *p == id) {
                    present.push((id, side));
                }
            }
        }

        for &(player1, side1) in &present {
            for &(player2, side2) in &present {
                if player1 == player2 {
                    continue;
                }
                let stats = pairs
                    .entry((player1, player2))
                    .or_insert_with(|| HeadToHeadStats::new(player1.clone(), player2.clone()));
                tally(stats, side1, side2, winner);
            }
        }
    }

    let mut matrix = HeadToHeadMatrix::new();
    for &player1 in ids {
        let row = ids
            .iter()
            .filter(|&&player2| player2 != player1)
            .map(|&player2| {
                let mut stats = pairs
                    .remove(&(player1, player2))
                    .unwrap_or_else(|| HeadToHeadStats::new(player1.clone(), player2.clone()));
                stats.finalize();
                (player2.clone(), stats)
            })
            .collect();
        matrix.insert(player1.clone(), row);
    }
    matrix
}

/// Full pairwise matrix over `player_ids`. Pairs that never co-occur get
/// all-zero records.
pub fn head_to_head_matrix(
    matches: &[Match],
    player_ids: &[PlayerId],
    filter: &MatchFilter,
    strategy: PairwiseStrategy,
) -> HeadToHeadMatrix {
    let filtered = filter.apply(matches);
    let ids = distinct(player_ids);

    debug!(
        "Building {}x{} head-to-head matrix over {} matches ({:?})",
        ids.len(),
        ids.len(),
        filtered.matches.len(),
        strategy
    );

    match strategy {
        PairwiseStrategy::PerPair => per_pair(&filtered.matches, &ids, filter),
        PairwiseStrategy::SinglePass => single_pass(&filtered.matches, &ids, filter),
    }
}

/// One player's row against each of `others`, without building the
/// whole matrix.
pub fn head_to_head_row(
    matches: &[Match],
    player: &PlayerId,
    others: &[PlayerId],
    filter: &MatchFilter,
) -> BTreeMap<PlayerId, HeadToHeadStats> {
    let filtered = filter.apply(matches);
    distinct(others)
        .into_iter()
        .filter(|other| *other != player)
        .map(|other| (other.clone(), tally_pair(&filtered.matches, player, other, filter)))
        .collect()
}

/// A player's row, most opposing-side games first.
pub fn opponents_by_games_against(row: &BTreeMap<PlayerId, HeadToHeadStats>) -> Vec<&HeadToHeadStats> {
    let mut ordered: Vec<&HeadToHeadStats> = row.values().collect();
    ordered.sort_by(|a, b| b.games_against().cmp(&a.games_against()));
    ordered
}
