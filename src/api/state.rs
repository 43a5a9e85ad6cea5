use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::api::routes::refresh::RefreshState;
use crate::config::EngineConfig;
use crate::fetch::MatchSource;
use crate::models::MatchFeed;
use crate::recompute::RecomputeScheduler;

/// The feed currently in force.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub feed: Arc<MatchFeed>,
    pub loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(feed: MatchFeed) -> Self {
        Self {
            feed: Arc::new(feed),
            loaded_at: Utc::now(),
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub dataset: Arc<tokio::sync::RwLock<Dataset>>,
    pub scheduler: Arc<RecomputeScheduler>,
    pub source: Arc<dyn MatchSource>,
    pub engine: Arc<EngineConfig>,
    pub refresh_state: Arc<tokio::sync::RwLock<RefreshState>>,
}

impl AppState {
    /// Must be called inside a Tokio runtime: it starts the recompute
    /// worker.
    pub fn new(feed: MatchFeed, source: Arc<dyn MatchSource>, engine: EngineConfig) -> Self {
        let dataset = Dataset::new(feed);
        let scheduler = RecomputeScheduler::spawn(dataset.feed.clone(), engine.clone());
        Self {
            dataset: Arc::new(tokio::sync::RwLock::new(dataset)),
            scheduler: Arc::new(scheduler),
            source,
            engine: Arc::new(engine),
            refresh_state: Arc::new(tokio::sync::RwLock::new(RefreshState::default())),
        }
    }

    /// Snapshot of the feed for one request.
    pub async fn feed(&self) -> Arc<MatchFeed> {
        self.dataset.read().await.feed.clone()
    }

    /// Swap in a new feed and schedule recomputation.
    pub async fn replace_feed(&self, feed: MatchFeed) {
        let dataset = Dataset::new(feed);
        self.scheduler.replace_feed(dataset.feed.clone());
        *self.dataset.write().await = dataset;
    }
}
