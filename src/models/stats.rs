//! Derived statistics models.
//!
//! Every record here is produced by one aggregation call and discarded
//! with it; nothing is cached between calls.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::PlayerId;

/// Percentage `part / total * 100`, zero when `total` is zero.
pub fn percentage(part: u32, total: u32) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

/// Inclusive time window. A missing bound is open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl DateRange {
    pub fn new(from: Option<DateTime<Utc>>, to: Option<DateTime<Utc>>) -> Self {
        Self { from, to }
    }

    /// The unbounded window.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn is_unbounded(&self) -> bool {
        self.from.is_none() && self.to.is_none()
    }

    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.from.map_or(true, |from| at >= from) && self.to.map_or(true, |to| at <= to)
    }
}

/// Per-player summary over the filtered match list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerStats {
    pub player_id: PlayerId,

    /// Name from the most recently processed appearance
    pub player_name: String,

    pub total_matches: u32,
    pub wins: u32,
    pub losses: u32,

    /// Percentage, 0 when no matches
    pub win_rate: f64,

    /// Running mean of the per-match rating
    #[serde(rename = "averageMMR")]
    pub average_mmr: f64,

    /// Sum of rating deltas, seeded at the baseline
    pub mmr_change: f64,

    /// Rating from the most recently processed appearance
    pub mmr: f64,
}

impl PlayerStats {
    pub fn new(player_id: PlayerId, player_name: String, baseline_change: f64) -> Self {
        Self {
            player_id,
            player_name,
            total_matches: 0,
            wins: 0,
            losses: 0,
            win_rate: 0.0,
            average_mmr: 0.0,
            mmr_change: baseline_change,
            mmr: 0.0,
        }
    }

    /// Fold one appearance into the record.
    pub fn record(&mut self, name: &str, won: bool, mmr: f64, mmr_change: f64) {
        self.total_matches += 1;
        if won {
            self.wins += 1;
        } else {
            self.losses += 1;
        }

        let n = self.total_matches as f64;
        self.average_mmr = (self.average_mmr * (n - 1.0) + mmr) / n;
        self.mmr_change += mmr_change;
        self.mmr = mmr;
        self.player_name = name.to_string();
    }

    pub fn finalize(&mut self) {
        self.win_rate = percentage(self.wins, self.total_matches);
    }
}

/// Pairwise record from `player1`'s point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeadToHeadStats {
    pub player1_id: PlayerId,
    pub player2_id: PlayerId,

    /// Decisive matches in which both appear
    pub matches_with_both: u32,

    pub player1_wins_with_player2: u32,
    pub player1_loses_with_player2: u32,
    pub player1_wins_against_player2: u32,
    pub player1_losses_against_player2: u32,

    pub win_rate_with: f64,
    pub win_rate_against: f64,
}

impl HeadToHeadStats {
    pub fn new(player1_id: PlayerId, player2_id: PlayerId) -> Self {
        Self {
            player1_id,
            player2_id,
            matches_with_both: 0,
            player1_wins_with_player2: 0,
            player1_loses_with_player2: 0,
            player1_wins_against_player2: 0,
            player1_losses_against_player2: 0,
            win_rate_with: 0.0,
            win_rate_against: 0.0,
        }
    }

    pub fn record_with(&mut self, won: bool) {
        self.matches_with_both += 1;
        if won {
            self.player1_wins_with_player2 += 1;
        } else {
            self.player1_loses_with_player2 += 1;
        }
    }

    pub fn record_against(&mut self, won: bool) {
        self.matches_with_both += 1;
        if won {
            self.player1_wins_against_player2 += 1;
        } else {
            self.player1_losses_against_player2 += 1;
        }
    }

    pub fn games_with(&self) -> u32 {
        self.player1_wins_with_player2 + self.player1_loses_with_player2
    }

    pub fn games_against(&self) -> u32 {
        self.player1_wins_against_player2 + self.player1_losses_against_player2
    }

    pub fn finalize(&mut self) {
        self.win_rate_with = percentage(self.player1_wins_with_player2, self.games_with());
        self.win_rate_against =
            percentage(self.player1_wins_against_player2, self.games_against());
    }

    /// The same record seen from `player2`'s side.
    pub fn mirrored(&self) -> Self {
        let mut mirrored = Self {
            player1_id: self.player2_id.clone(),
            player2_id: self.player1_id.clone(),
            matches_with_both: self.matches_with_both,
            player1_wins_with_player2: self.player1_wins_with_player2,
            player1_loses_with_player2: self.player1_loses_with_player2,
            player1_wins_against_player2: self.player1_losses_against_player2,
            player1_losses_against_player2: self.player1_wins_against_player2,
            win_rate_with: 0.0,
            win_rate_against: 0.0,
        };
        mirrored.finalize();
        mirrored
    }
}

/// Outcome tally of roster 1 against roster 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamCompositionResult {
    pub total_games: u32,
    pub team1_wins: u32,
    pub team2_wins: u32,
}

impl TeamCompositionResult {
    pub fn team1_win_rate(&self) -> f64 {
        percentage(self.team1_wins, self.total_games)
    }
}

/// Hypothetical result of adding one candidate to roster 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeammateSuggestion {
    pub player_id: PlayerId,
    pub player_name: String,
    #[serde(flatten)]
    pub result: TeamCompositionResult,
    pub win_rate: f64,
}
