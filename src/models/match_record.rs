//! Match record model: the raw input schema of the match feed.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::debug;

use super::{Fingerprint, PlayerId};

/// `winner` value the feed uses for a cancelled match.
pub const WINNER_CANCELLED: i64 = -1;

/// One side of a match (index 0 or 1 in `teams`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Zero,
    One,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::Zero => 0,
            Side::One => 1,
        }
    }

    pub fn opponent(self) -> Side {
        match self {
            Side::Zero => Side::One,
            Side::One => Side::Zero,
        }
    }

    /// Map a feed `winner` value to a side. Anything other than 0 or 1 is
    /// not decisive.
    pub fn from_winner(winner: i64) -> Option<Side> {
        match winner {
            0 => Some(Side::Zero),
            1 => Some(Side::One),
            _ => None,
        }
    }

    pub const BOTH: [Side; 2] = [Side::Zero, Side::One];
}

/// A player's appearance on one side of one match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Participant {
    /// Missing or blank ids make the participant unusable for aggregation.
    #[serde(default, deserialize_with = "lenient_id")]
    pub id: Option<PlayerId>,

    #[serde(default)]
    pub name: String,

    /// Rating at the time of the match
    #[serde(default)]
    pub mmr: Option<f64>,

    /// Rating delta applied by this match
    #[serde(default, alias = "mmrChange")]
    pub mmr_change: Option<f64>,

    #[serde(default = "default_picked")]
    pub picked: bool,

    #[serde(default)]
    pub team_num: Option<i64>,

    #[serde(default)]
    pub role: Option<String>,
}

fn default_picked() -> bool {
    true
}

/// Accept string or numeric ids; anything else is treated as missing.
fn lenient_id<'de, D>(deserializer: D) -> Result<Option<PlayerId>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(PlayerId::from(s)),
        Some(serde_json::Value::Number(n)) => Some(PlayerId::from(n.to_string())),
        _ => None,
    })
}

impl Participant {
    pub fn new(id: &str, name: &str, mmr: f64, mmr_change: f64) -> Self {
        Self {
            id: Some(PlayerId::from(id)),
            name: name.to_string(),
            mmr: Some(mmr),
            mmr_change: Some(mmr_change),
            picked: true,
            team_num: None,
            role: None,
        }
    }

    /// The participant's id, if present and non-blank.
    pub fn player_id(&self) -> Option<&PlayerId> {
        self.id.as_ref().filter(|id| !id.is_blank())
    }

    /// Whether the participant carries the fields aggregation needs.
    pub fn is_well_formed(&self) -> bool {
        self.player_id().is_some() && self.mmr.is_some_and(f64::is_finite)
    }
}

/// One completed or cancelled game.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    /// Game category tag
    #[serde(default)]
    pub game: String,

    /// Raw timestamp, parsed on demand
    #[serde(default)]
    pub time: String,

    #[serde(default)]
    pub teams: Vec<Vec<Participant>>,

    /// 0 or 1 for the winning side; anything else is not decisive
    #[serde(default = "default_winner")]
    pub winner: i64,

    /// Feed sequence number
    #[serde(default)]
    pub game_num: Option<u64>,
}

fn default_winner() -> i64 {
    WINNER_CANCELLED
}

impl Match {
    pub fn winning_side(&self) -> Option<Side> {
        Side::from_winner(self.winner)
    }

    pub fn is_decisive(&self) -> bool {
        self.winning_side().is_some()
    }

    /// A non-decisive `winner` that is not the documented cancel marker.
    pub fn has_anomalous_winner(&self) -> bool {
        !self.is_decisive() && self.winner != WINNER_CANCELLED
    }

    pub fn parsed_time(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.time)
    }

    /// Both rosters, when the match has exactly two non-empty sides.
    pub fn sides(&self) -> Option<[&[Participant]; 2]> {
        match self.teams.as_slice() {
            [a, b] if !a.is_empty() && !b.is_empty() => Some([a.as_slice(), b.as_slice()]),
            _ => None,
        }
    }

    pub fn side(&self, side: Side) -> &[Participant] {
        self.teams
            .get(side.index())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate every participant together with the side they played on.
    pub fn participants(&self) -> impl Iterator<Item = (Side, &Participant)> {
        Side::BOTH
            .into_iter()
            .flat_map(move |side| self.side(side).iter().map(move |p| (side, p)))
    }
}

/// Parse a feed timestamp.
///
/// Accepts RFC 3339, or a naive `YYYY-MM-DDTHH:MM:SS[.f]` /
/// `YYYY-MM-DD HH:MM:SS[.f]` / `YYYY-MM-DD`, all taken as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn not_a_feed(reason: &str) -> serde_json::Error {
    <serde_json::Error as serde::de::Error>::custom(format!("not a match feed: {}", reason))
}

/// A parsed match feed document (`{ "data": [...] }`).
#[derive(Debug, Clone)]
pub struct MatchFeed {
    pub matches: Vec<Match>,

    /// Elements of `data` that could not be read as a match
    pub skipped: usize,

    pub fingerprint: Fingerprint,
}

impl MatchFeed {
    pub fn new(matches: Vec<Match>) -> Self {
        let fingerprint = match serde_json::to_vec(&matches) {
            Ok(bytes) => Fingerprint::of(&bytes),
            Err(_) => Fingerprint::of(&[]),
        };
        Self {
            matches,
            skipped: 0,
            fingerprint,
        }
    }

    /// Parse a feed document, skipping elements that are not valid matches.
    ///
    /// Only a document that is not a JSON object with a `data` array is an
    /// error.
    pub fn from_json_str(content: &str) -> Result<Self, serde_json::Error> {
        let document: serde_json::Value = serde_json::from_str(content)?;
        let data = match document {
            serde_json::Value::Object(mut fields) => match fields.remove("data") {
                Some(serde_json::Value::Array(data)) => data,
                Some(_) => return Err(not_a_feed("`data` is not an array")),
                None => return Err(not_a_feed("missing `data`")),
            },
            _ => return Err(not_a_feed("document is not a JSON object")),
        };
        let mut matches = Vec::with_capacity(data.len());
        let mut skipped = 0;

        for (index, value) in data.into_iter().enumerate() {
            match serde_json::from_value::<Match>(value) {
                Ok(m) => matches.push(m),
                Err(e) => {
                    debug!("Skipping malformed match record #{}: {}", index, e);
                    skipped += 1;
                }
            }
        }

        Ok(Self {
            matches,
            skipped,
            fingerprint: Fingerprint::of(content.as_bytes()),
        })
    }

    /// Concatenate pages in fetch order.
    pub fn from_pages(pages: Vec<MatchFeed>) -> Self {
        let mut matches = Vec::new();
        let mut skipped = 0;
        let mut hasher_input = String::new();

        for page in pages {
            hasher_input.push_str(page.fingerprint.as_str());
            skipped += page.skipped;
            matches.extend(page.matches);
        }

        Self {
            matches,
            skipped,
            fingerprint: Fingerprint::of(hasher_input.as_bytes()),
        }
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const FEED: &str = r#"{
        "data": [
            {
                "game": "dota",
                "time": "2025-09-10T19:30:00.000000+00:00",
                "winner": 0,
                "game_num": 12,
                "teams": [
                    [{"name": "Alice", "id": "1", "mmr": 1510.5, "mmr_change": 12.0, "picked": true, "team_num": 0, "role": null}],
                    [{"name": "Bob", "id": 2, "mmr": 1490.0, "mmr_change": -12.0, "picked": false, "team_num": 1}]
                ]
            },
            {"game": "dota", "time": "2025-09-11", "winner": -1, "teams": [[], []]},
            {"game": "dota", "teams": "not a list"},
            42
        ]
    }"#;

    #[test]
    fn test_feed_parsing_skips_malformed_elements() {
        let feed = MatchFeed::from_json_str(FEED).unwrap();

        assert_eq!(feed.len(), 2);
        assert_eq!(feed.skipped, 2);

        let first = &feed.matches[0];
        assert_eq!(first.game_num, Some(12));
        assert_eq!(first.side(Side::Zero)[0].mmr_change, Some(12.0));
        assert_eq!(first.side(Side::One)[0].id, Some(PlayerId::from("2")));
        assert!(!first.side(Side::One)[0].picked);
    }

    #[test]
    fn test_feed_rejects_non_document() {
        assert!(MatchFeed::from_json_str("[1, 2, 3]").is_err());
        assert!(MatchFeed::from_json_str("[]").is_err());
        assert!(MatchFeed::from_json_str("not json").is_err());
    }

    #[test]
    fn test_feed_requires_data_array() {
        assert!(MatchFeed::from_json_str("{}").is_err());
        assert!(MatchFeed::from_json_str(r#"{"error": "rate limited"}"#).is_err());
        assert!(MatchFeed::from_json_str(r#"{"data": null}"#).is_err());
        assert!(MatchFeed::from_json_str(r#"{"data": {"0": {}}}"#).is_err());
    }

    #[test]
    fn test_feed_with_empty_data_is_empty() {
        let feed = MatchFeed::from_json_str(r#"{"data": []}"#).unwrap();
        assert!(feed.is_empty());
        assert_eq!(feed.skipped, 0);
    }

    #[test]
    fn test_camel_case_mmr_change_alias() {
        let p: Participant =
            serde_json::from_str(r#"{"id": "7", "name": "x", "mmr": 1000, "mmrChange": -3.5}"#)
                .unwrap();
        assert_eq!(p.mmr_change, Some(-3.5));
        assert!(p.picked);
    }

    #[test]
    fn test_participant_well_formed() {
        assert!(Participant::new("1", "a", 1000.0, 0.0).is_well_formed());

        let mut missing_id = Participant::new("1", "a", 1000.0, 0.0);
        missing_id.id = None;
        assert!(!missing_id.is_well_formed());

        let blank_id = Participant::new("  ", "a", 1000.0, 0.0);
        assert!(!blank_id.is_well_formed());

        let mut missing_mmr = Participant::new("1", "a", 1000.0, 0.0);
        missing_mmr.mmr = None;
        assert!(!missing_mmr.is_well_formed());
    }

    #[test]
    fn test_winner_decisiveness() {
        let mut m: Match = serde_json::from_str(r#"{"game": "dota", "teams": []}"#).unwrap();
        assert_eq!(m.winner, WINNER_CANCELLED);
        assert!(!m.is_decisive());
        assert!(!m.has_anomalous_winner());

        m.winner = 2;
        assert!(!m.is_decisive());
        assert!(m.has_anomalous_winner());

        m.winner = 1;
        assert_eq!(m.winning_side(), Some(Side::One));
    }

    #[test]
    fn test_sides_requires_two_non_empty_rosters() {
        let p = Participant::new("1", "a", 1000.0, 0.0);
        let mut m = Match {
            game: "dota".to_string(),
            time: "2025-01-01".to_string(),
            teams: vec![vec![p.clone()], vec![p.clone()]],
            winner: 0,
            game_num: None,
        };
        assert!(m.sides().is_some());

        m.teams = vec![vec![p.clone()], vec![]];
        assert!(m.sides().is_none());

        m.teams = vec![vec![p.clone()], vec![p.clone()], vec![p]];
        assert!(m.sides().is_none());
    }

    #[test]
    fn test_participants_iterates_with_side() {
        let m = Match {
            game: "dota".to_string(),
            time: String::new(),
            teams: vec![
                vec![Participant::new("a", "A", 1.0, 0.0), Participant::new("b", "B", 1.0, 0.0)],
                vec![Participant::new("c", "C", 1.0, 0.0)],
            ],
            winner: 0,
            game_num: None,
        };
        let sides: Vec<(Side, &str)> = m
            .participants()
            .map(|(s, p)| (s, p.name.as_str()))
            .collect();
        assert_eq!(
            sides,
            vec![(Side::Zero, "A"), (Side::Zero, "B"), (Side::One, "C")]
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 9, 10, 19, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2025-09-10T19:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-10T21:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-10T19:30:00.000000"), Some(expected));
        assert_eq!(parse_timestamp("2025-09-10 19:30:00"), Some(expected));
        assert_eq!(
            parse_timestamp("2025-09-10"),
            Some(Utc.with_ymd_and_hms(2025, 9, 10, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_parse_timestamp_rejects_garbage() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("yesterday"), None);
        assert_eq!(parse_timestamp("2025-13-40"), None);
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::Zero.opponent(), Side::One);
        assert_eq!(Side::One.index(), 1);
        assert_eq!(Side::from_winner(2), None);
        assert_eq!(Side::from_winner(-1), None);
    }
}
