//! # Inhouse Stats
//!
//! Player statistics for in-house matchmaking queues.
//!
//! ## Architecture
//!
//! - **models**: Core data structures (matches, participants, aggregates)
//! - **calculate**: Filtering, player aggregation, head-to-head, team queries
//! - **fetch**: Match history sources (HTTP endpoint, JSON snapshot)
//! - **recompute**: Settled background recomputation of the dashboard
//! - **api**: REST API endpoints
//! - **config**: Configuration loading and validation

pub mod api;
pub mod calculate;
pub mod config;
pub mod fetch;
pub mod models;
pub mod recompute;

pub use models::*;

use std::time::Duration;

/// Parse a human-friendly duration string (e.g., "6h", "30m", "90s", "250ms").
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(n) = s.strip_suffix("ms") {
        let num: u64 = n.parse().ok()?;
        return Some(Duration::from_millis(num));
    }

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 3600)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Default to seconds
        (s, 1)
    };

    let num: u64 = num_str.parse().ok()?;
    Some(Duration::from_secs(num * multiplier))
}
