pub mod dashboard;
pub mod head_to_head;
pub mod players;
pub mod refresh;
pub mod teams;

use serde::Deserialize;

use crate::api::ApiError;
use crate::calculate::{parse_date_range, MatchFilter};
use crate::config::EngineConfig;
use crate::models::{DateRange, PlayerId};

/// `from`/`to` query parameters shared by every statistics endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct RangeParams {
    pub from: Option<String>,
    pub to: Option<String>,
}

impl RangeParams {
    pub fn range(&self) -> Result<DateRange, ApiError> {
        parse_date_range(self.from.as_deref(), self.to.as_deref())
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    pub fn filter(&self, engine: &EngineConfig) -> Result<MatchFilter, ApiError> {
        Ok(engine.filter(self.range()?))
    }
}

/// Run an aggregation on the blocking pool so large feeds do not stall
/// the async workers.
pub async fn compute<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ApiError::Internal(format!("Computation failed: {}", e)))
}

/// Split a comma-separated id list, dropping blanks and duplicates.
pub fn parse_ids(raw: Option<&str>) -> Vec<PlayerId> {
    let mut ids: Vec<PlayerId> = Vec::new();
    for part in raw.unwrap_or_default().split(',') {
        let id = PlayerId::from(part.trim());
        if !id.is_blank() && !ids.contains(&id) {
            ids.push(id);
        }
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ids() {
        let ids = parse_ids(Some(" a, b,,a ,c "));
        let raw: Vec<&str> = ids.iter().map(PlayerId::as_str).collect();
        assert_eq!(raw, vec!["a", "b", "c"]);
        assert!(parse_ids(None).is_empty());
        assert!(parse_ids(Some("")).is_empty());
    }

    #[tokio::test]
    async fn test_compute_runs_off_the_async_worker() {
        let runtime_thread = std::thread::current().id();
        let (value, worker_thread) = compute(move || (21 * 2, std::thread::current().id()))
            .await
            .unwrap();
        assert_eq!(value, 42);
        assert_ne!(worker_thread, runtime_thread);
    }

    #[tokio::test]
    async fn test_compute_panic_is_internal_error() {
        let result: Result<(), ApiError> = compute(|| panic!("aggregation blew up")).await;
        assert!(matches!(result, Err(ApiError::Internal(_))));
    }

    #[test]
    fn test_range_params() {
        let params = RangeParams {
            from: Some("2025-09-01".to_string()),
            to: None,
        };
        let range = params.range().unwrap();
        assert!(range.from.is_some());
        assert!(range.to.is_none());

        let bad = RangeParams {
            from: Some("soon".to_string()),
            to: None,
        };
        assert!(matches!(bad.range(), Err(ApiError::BadRequest(_))));
    }
}
