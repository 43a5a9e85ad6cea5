//! Settled recomputation of the dashboard snapshot.
//!
//! Filter changes arrive far faster than a full head-to-head rebuild can
//! run (a date picker being dragged). Changes are pushed into a watch
//! channel and the worker only recomputes once no new change has arrived
//! for the settle delay. The newest input always wins; a computation
//! already running is not cancelled, its result is simply superseded by
//! the next publication.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::calculate::{compute_snapshot, DashboardSnapshot};
use crate::config::EngineConfig;
use crate::models::{DateRange, MatchFeed};

#[derive(Clone)]
struct Inputs {
    feed: Arc<MatchFeed>,
    range: DateRange,
}

/// Owns the background worker; dropping it stops the worker.
pub struct RecomputeScheduler {
    inputs: watch::Sender<Inputs>,
    output: watch::Receiver<Arc<DashboardSnapshot>>,
    worker: JoinHandle<()>,
}

impl RecomputeScheduler {
    /// Compute the unfiltered snapshot up front and start the worker.
    pub fn spawn(feed: Arc<MatchFeed>, engine: EngineConfig) -> Self {
        let range = DateRange::all();
        let initial = compute_snapshot(&feed, &engine.filter(range), engine.pairwise);

        let (inputs, inputs_rx) = watch::channel(Inputs { feed, range });
        let (output_tx, output) = watch::channel(Arc::new(initial));
        let worker = tokio::spawn(run(inputs_rx, output_tx, engine));

        Self {
            inputs,
            output,
            worker,
        }
    }

    /// Request a new window. Re-sending the current window is a no-op.
    pub fn set_range(&self, range: DateRange) {
        self.inputs.send_if_modified(|inputs| {
            if inputs.range == range {
                false
            } else {
                inputs.range = range;
                true
            }
        });
    }

    /// Swap in a freshly loaded feed, keeping the current window.
    pub fn replace_feed(&self, feed: Arc<MatchFeed>) {
        self.inputs.send_modify(|inputs| inputs.feed = feed);
    }

    /// Window most recently requested (possibly not yet computed).
    pub fn requested_range(&self) -> DateRange {
        self.inputs.borrow().range
    }

    /// Most recently published snapshot.
    pub fn latest(&self) -> Arc<DashboardSnapshot> {
        self.output.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.output.clone()
    }
}

impl Drop for RecomputeScheduler {
    fn drop(&mut self) {
        self.worker.abort();
    }
}

/// Wait until the inputs stop changing for `settle`. Returns false once
/// the sender is gone.
async fn settled(inputs: &mut watch::Receiver<Inputs>, settle: Duration) -> bool {
    loop {
        match tokio::time::timeout(settle, inputs.changed()).await {
            Ok(Ok(())) => continue,
            Ok(Err(_)) => return false,
            Err(_) => return true,
        }
    }
}

async fn run(
    mut inputs: watch::Receiver<Inputs>,
    output: watch::Sender<Arc<DashboardSnapshot>>,
    engine: EngineConfig,
) {
    let settle = engine.settle_delay();

    while inputs.changed().await.is_ok() {
        if !settled(&mut inputs, settle).await {
            break;
        }

        let current = inputs.borrow_and_update().clone();
        {
            let published = output.borrow();
            if published.range == current.range && published.fingerprint == current.feed.fingerprint {
                debug!("Inputs unchanged after settling, skipping recompute");
                continue;
            }
        }

        let filter = engine.filter(current.range);
        let strategy = engine.pairwise;
        let started = std::time::Instant::now();
        let computed = tokio::task::spawn_blocking(move || {
            compute_snapshot(&current.feed, &filter, strategy)
        })
        .await;

        match computed {
            Ok(snapshot) => {
                info!(
                    "Recomputed dashboard: {} matches, {} players in {:?}",
                    snapshot.totals.total_matches,
                    snapshot.totals.total_players,
                    started.elapsed()
                );
                output.send_replace(Arc::new(snapshot));
            }
            Err(e) => warn!("Dashboard recompute failed: {}", e),
        }
    }

    debug!("Recompute worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculate::filter::fixtures::three_matches;
    use crate::calculate::parse_date_range;

    fn engine(settle_ms: u64) -> EngineConfig {
        EngineConfig {
            settle_ms,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_initial_snapshot_is_unfiltered() {
        let scheduler = RecomputeScheduler::spawn(Arc::new(MatchFeed::new(three_matches())), engine(10));
        let snapshot = scheduler.latest();
        assert_eq!(snapshot.totals.total_matches, 3);
        assert!(snapshot.range.is_unbounded());
    }

    #[tokio::test]
    async fn test_burst_of_changes_settles_once() {
        let scheduler = RecomputeScheduler::spawn(Arc::new(MatchFeed::new(three_matches())), engine(50));
        let mut rx = scheduler.subscribe();
        rx.borrow_and_update();

        for day in ["2025-09-01", "2025-09-02", "2025-09-03"] {
            scheduler.set_range(parse_date_range(Some(day), None).unwrap());
        }
        let last = parse_date_range(Some("2025-09-03"), None).unwrap();
        assert_eq!(scheduler.requested_range(), last);

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("snapshot published")
            .unwrap();
        let snapshot = rx.borrow_and_update().clone();
        assert_eq!(snapshot.range, last);
        assert_eq!(snapshot.totals.total_matches, 1);

        // Nothing else is pending.
        assert!(tokio::time::timeout(Duration::from_millis(200), rx.changed())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_same_range_is_not_recomputed() {
        let scheduler = RecomputeScheduler::spawn(Arc::new(MatchFeed::new(three_matches())), engine(10));
        let mut rx = scheduler.subscribe();
        rx.borrow_and_update();

        scheduler.set_range(DateRange::all());
        assert!(tokio::time::timeout(Duration::from_millis(150), rx.changed())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_replace_feed_recomputes() {
        let scheduler = RecomputeScheduler::spawn(Arc::new(MatchFeed::new(Vec::new())), engine(10));
        let mut rx = scheduler.subscribe();
        assert_eq!(rx.borrow_and_update().totals.total_matches, 0);

        scheduler.replace_feed(Arc::new(MatchFeed::new(three_matches())));

        tokio::time::timeout(Duration::from_secs(5), rx.changed())
            .await
            .expect("snapshot published")
            .unwrap();
        assert_eq!(rx.borrow().totals.total_matches, 3);
    }
}
