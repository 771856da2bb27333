use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::feed::{RefreshMode, RefreshOutcome, Refresher};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackgroundFetchResult {
    NewData,
    NoData,
    Failed,
}

/// Runs one background refresh. Never fails: errors are logged and reported
/// as `Failed`.
pub async fn run_cycle(refresher: &Refresher, published_after: DateTime<Utc>) -> BackgroundFetchResult {
    match refresher
        .refresh(RefreshMode::Background { published_after })
        .await
    {
        Ok(RefreshOutcome::NewArticles(count)) => {
            tracing::info!("Background refresh stored {} new articles", count);
            BackgroundFetchResult::NewData
        }
        Ok(outcome) => {
            tracing::debug!("Background refresh finished: {:?}", outcome);
            BackgroundFetchResult::NoData
        }
        Err(e) => {
            tracing::error!("Background refresh failed ({}): {}", e.kind(), e);
            BackgroundFetchResult::Failed
        }
    }
}

/// Owns the recurring background refresh task.
pub struct BackgroundScheduler {
    refresher: Arc<Refresher>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundScheduler {
    pub fn new(refresher: Arc<Refresher>) -> Self {
        Self {
            refresher,
            task: Mutex::new(None),
        }
    }

    /// Start refreshing every `interval`, replacing any earlier registration.
    /// The first cycle runs one interval from now.
    pub fn register(&self, interval: Duration) {
        let refresher = Arc::clone(&self.refresher);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // interval() yields immediately on the first tick
            ticker.tick().await;

            let mut window_start = Utc::now();
            loop {
                ticker.tick().await;
                let started = Utc::now();
                // A failed cycle keeps its window so the next one catches up
                if run_cycle(&refresher, window_start).await != BackgroundFetchResult::Failed {
                    window_start = started;
                }
            }
        });

        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = task.replace(handle) {
            previous.abort();
        }
        tracing::info!("Registered background refresh every {:?}", interval);
    }

    pub fn unregister(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = task.take() {
            handle.abort();
            tracing::info!("Unregistered background refresh");
        }
    }

    pub fn is_registered(&self) -> bool {
        self.task
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl Drop for BackgroundScheduler {
    fn drop(&mut self) {
        self.unregister();
    }
}
