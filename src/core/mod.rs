pub mod health;
pub mod storage;

use std::collections::BTreeMap;
use std::sync::Arc;

use health::FeedHealthTracker;

#[derive(Clone)]
pub struct AppServices {
    health: Arc<FeedHealthTracker>,
}

impl AppServices {
    pub fn new(health: FeedHealthTracker) -> Self {
        Self {
            health: Arc::new(health),
        }
    }

    pub fn health(&self) -> Arc<FeedHealthTracker> {
        Arc::clone(&self.health)
    }

    pub async fn health_report(&self) -> BTreeMap<String, String> {
        let mut report = BTreeMap::new();
        for feed in self.health.snapshot().await {
            let status = if feed.skip {
                "skip"
            } else if feed.slow {
                "slow"
            } else {
                "ok"
            };
            report.insert(feed.feed_id, status.to_string());
        }
        report
    }
}
