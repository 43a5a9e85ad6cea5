//! Core data models: the match feed schema and the derived statistics.

mod ids;
mod match_record;
mod stats;

pub use ids::*;
pub use match_record::*;
pub use stats::*;
