//! Match validity predicate and date-range filter.
//!
//! Every aggregator runs its input through [`MatchFilter::apply`] itself,
//! so figures stay consistent for a given filter even when callers have
//! already narrowed the list.

use chrono::{DateTime, NaiveDate, Utc};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{parse_timestamp, DateRange, Match, Participant, PlayerId, Side};

/// Default game category.
pub const DEFAULT_GAME: &str = "dota";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid date bound '{0}' (expected RFC 3339 or YYYY-MM-DD)")]
    InvalidBound(String),
}

/// Which end of a window a user-supplied bound describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundKind {
    Start,
    End,
}

/// Parse a user-supplied bound.
///
/// A bare date as the end bound covers the whole day.
pub fn parse_bound(raw: &str, kind: BoundKind) -> Result<DateTime<Utc>, FilterError> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let naive = match kind {
            BoundKind::Start => date.and_hms_opt(0, 0, 0),
            BoundKind::End => date.and_hms_milli_opt(23, 59, 59, 999),
        };
        return naive
            .map(|n| n.and_utc())
            .ok_or_else(|| FilterError::InvalidBound(raw.to_string()));
    }
    parse_timestamp(raw).ok_or_else(|| FilterError::InvalidBound(raw.to_string()))
}

/// Build a window from optional user-supplied bounds. Empty strings are
/// treated as absent.
pub fn parse_date_range(from: Option<&str>, to: Option<&str>) -> Result<DateRange, FilterError> {
    let from = from
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_bound(s, BoundKind::Start))
        .transpose()?;
    let to = to
        .filter(|s| !s.trim().is_empty())
        .map(|s| parse_bound(s, BoundKind::End))
        .transpose()?;
    Ok(DateRange::new(from, to))
}

/// Why matches were dropped by [`MatchFilter::apply`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RejectCounts {
    pub other_game: usize,
    pub not_decisive: usize,
    /// Subset of `not_decisive` with a winner other than the cancel marker
    pub anomalous_winner: usize,
    pub malformed: usize,
    pub unparseable_time: usize,
    pub out_of_range: usize,
}

impl RejectCounts {
    pub fn total(&self) -> usize {
        self.other_game + self.not_decisive + self.malformed + self.unparseable_time + self.out_of_range
    }
}

/// Matches that passed the filter, in input order.
#[derive(Debug, Clone)]
pub struct FilteredMatches<'a> {
    pub matches: Vec<&'a Match>,
    pub rejected: RejectCounts,
}

/// Which matches and participants take part in aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchFilter {
    /// Game category tag to keep
    pub game: String,

    pub range: DateRange,

    /// Drop participants whose `picked` flag is false
    pub require_picked: bool,
}

impl Default for MatchFilter {
    fn default() -> Self {
        Self {
            game: DEFAULT_GAME.to_string(),
            range: DateRange::all(),
            require_picked: false,
        }
    }
}

impl MatchFilter {
    pub fn new(game: impl Into<String>) -> Self {
        Self {
            game: game.into(),
            ..Default::default()
        }
    }

    pub fn with_range(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_require_picked(mut self, require_picked: bool) -> Self {
        self.require_picked = require_picked;
        self
    }

    /// Whether a participant is counted.
    pub fn counts_participant(&self, participant: &Participant) -> bool {
        participant.is_well_formed() && (participant.picked || !self.require_picked)
    }

    /// Counted participant ids on one side of a match.
    pub fn roster<'a>(&'a self, m: &'a Match, side: Side) -> impl Iterator<Item = &'a PlayerId> + 'a {
        m.side(side)
            .iter()
            .filter(move |p| self.counts_participant(p))
            .filter_map(Participant::player_id)
    }

    /// Side a player is counted on, checking side 0 first.
    pub fn side_of(&self, m: &Match, id: &PlayerId) -> Option<Side> {
        Side::BOTH
            .into_iter()
            .find(|&side| self.roster(m, side).any(|p| p == id))
    }

    fn classify(&self, m: &Match, rejected: &mut RejectCounts) -> bool {
        if m.game != self.game {
            rejected.other_game += 1;
            return false;
        }
        if !m.is_decisive() {
            rejected.not_decisive += 1;
            if m.has_anomalous_winner() {
                rejected.anomalous_winner += 1;
            }
            return false;
        }
        // A side with nobody countable cannot credit a result to anyone.
        if m.sides().is_none()
            || Side::BOTH
                .into_iter()
                .any(|side| self.roster(m, side).next().is_none())
        {
            rejected.malformed += 1;
            return false;
        }
        let Some(at) = m.parsed_time() else {
            rejected.unparseable_time += 1;
            return false;
        };
        if !self.range.contains(at) {
            rejected.out_of_range += 1;
            return false;
        }
        true
    }

    /// Keep the countable matches: right category, decisive, two sides
    /// that each have a counted participant, parseable time inside the
    /// window. Undated matches are dropped even when the window is
    /// unbounded.
    pub fn apply<'a>(&self, matches: &'a [Match]) -> FilteredMatches<'a> {
        let mut rejected = RejectCounts::default();
        let kept: Vec<&Match> = matches
            .iter()
            .filter(|m| self.classify(m, &mut rejected))
            .collect();

        if rejected.anomalous_winner > 0 {
            warn!(
                "{} match(es) with a winner outside {{-1, 0, 1}} treated as not decisive",
                rejected.anomalous_winner
            );
        }
        if rejected.malformed + rejected.unparseable_time > 0 {
            debug!(
                "Skipped {} malformed and {} undated match(es)",
                rejected.malformed, rejected.unparseable_time
            );
        }
        debug!(
            "Filter kept {} of {} matches (game={})",
            kept.len(),
            matches.len(),
            self.game
        );

        FilteredMatches {
            matches: kept,
            rejected,
        }
    }
}
