use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex};

use super::config::{HealthConfig, FAILURE_COUNTS_KEY, SLOW_THRESHOLD_KEY};
use super::events::{LoadTimeEvent, LoadTimeEvents};
use crate::core::storage::KeyValueStore;

pub const FAILED_LOAD_SENTINEL: f64 = -1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Fast,
    Slow,
    Failed,
}

impl LoadOutcome {
    pub fn classify(seconds: f64, config: &HealthConfig) -> Self {
        if seconds >= config.hard_failure_secs || seconds < 0.0 {
            Self::Failed
        } else if seconds > config.slow_threshold {
            Self::Slow
        } else {
            Self::Fast
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeedHealth {
    pub feed_id: String,
    pub load_time: Option<f64>,
    pub failure_count: u32,
    pub slow: bool,
    pub skip: bool,
}

#[derive(Debug)]
struct TrackerState {
    config: HealthConfig,
    configured_slow_threshold: f64,
    load_times: HashMap<String, f64>,
    failure_counts: BTreeMap<String, u32>,
}

impl TrackerState {
    fn load_time(&self, feed_id: &str) -> f64 {
        self.load_times.get(feed_id).copied().unwrap_or(0.0)
    }

    fn failure_count(&self, feed_id: &str) -> u32 {
        self.failure_counts.get(feed_id).copied().unwrap_or(0)
    }

    fn is_slow(&self, feed_id: &str) -> bool {
        let seconds = self.load_time(feed_id);
        seconds > self.config.slow_threshold && seconds > 0.0
    }

    fn should_skip(&self, feed_id: &str) -> bool {
        self.failure_count(feed_id) >= self.config.max_failures
    }

    fn apply(&mut self, feed_id: &str, outcome: LoadOutcome) -> u32 {
        let max_failures = self.config.max_failures;
        match outcome {
            LoadOutcome::Failed => {
                let count = self.failure_counts.entry(feed_id.to_string()).or_insert(0);
                *count = count.saturating_add(1);
                *count
            }
            LoadOutcome::Slow => match self.failure_counts.get_mut(feed_id) {
                Some(count) => {
                    if *count < max_failures {
                        *count += 1;
                    }
                    *count
                }
                None => {
                    self.failure_counts.insert(feed_id.to_string(), 1);
                    1
                }
            },
            LoadOutcome::Fast => {
                self.failure_counts.insert(feed_id.to_string(), 0);
                0
            }
        }
    }
}

pub struct FeedHealthTracker {
    store: Arc<dyn KeyValueStore>,
    events: LoadTimeEvents,
    state: Mutex<TrackerState>,
}

impl FeedHealthTracker {
    pub async fn load(store: Arc<dyn KeyValueStore>, config: HealthConfig) -> Self {
        let failure_counts = match store.get(FAILURE_COUNTS_KEY).await {
            Ok(Some(raw)) => decode_failure_counts(&raw),
            Ok(None) => BTreeMap::new(),
            Err(error) => {
                tracing::warn!(key = FAILURE_COUNTS_KEY, %error, "failed to read feed failure counts");
                BTreeMap::new()
            }
        };
        let stored_threshold = match store.get(SLOW_THRESHOLD_KEY).await {
            Ok(raw) => raw,
            Err(error) => {
                tracing::warn!(key = SLOW_THRESHOLD_KEY, %error, "failed to read slow threshold override");
                None
            }
        };
        let effective = config.with_stored_threshold(stored_threshold.as_deref());
        tracing::info!(
            feeds = failure_counts.len(),
            slow_threshold = effective.slow_threshold,
            max_failures = effective.max_failures,
            "loaded feed health state"
        );

        Self {
            store,
            events: LoadTimeEvents::new(),
            state: Mutex::new(TrackerState {
                config: effective,
                configured_slow_threshold: config.slow_threshold,
                load_times: HashMap::new(),
                failure_counts,
            }),
        }
    }

    pub async fn record_load_time(&self, feed_id: &str, seconds: f64) -> LoadTimeEvent {
        let mut state = self.state.lock().await;
        state.load_times.insert(feed_id.to_string(), seconds);
        let outcome = LoadOutcome::classify(seconds, &state.config);
        let failure_count = state.apply(feed_id, outcome);
        tracing::debug!(feed = feed_id, seconds, ?outcome, failure_count, "recorded feed load");

        self.persist_failure_counts(&state.failure_counts).await;

        let event = LoadTimeEvent {
            feed_title: feed_id.to_string(),
            load_time: seconds,
        };
        self.events.publish(event.clone());
        event
    }

    pub async fn record_failed_feed(&self, feed_id: &str) -> LoadTimeEvent {
        self.record_load_time(feed_id, FAILED_LOAD_SENTINEL).await
    }

    pub async fn record_elapsed(&self, feed_id: &str, elapsed: Duration) -> LoadTimeEvent {
        self.record_load_time(feed_id, elapsed.as_secs_f64()).await
    }

    // Never-recorded feeds read as 0.0.
    pub async fn load_time(&self, feed_id: &str) -> f64 {
        self.state.lock().await.load_time(feed_id)
    }

    pub async fn failure_count(&self, feed_id: &str) -> u32 {
        self.state.lock().await.failure_count(feed_id)
    }

    pub async fn failure_counts(&self) -> BTreeMap<String, u32> {
        self.state.lock().await.failure_counts.clone()
    }

    pub async fn reset_failure_count(&self, feed_id: &str) {
        let mut state = self.state.lock().await;
        state.failure_counts.insert(feed_id.to_string(), 0);
        self.persist_failure_counts(&state.failure_counts).await;
    }

    pub async fn should_skip_feed(&self, feed_id: &str) -> bool {
        self.state.lock().await.should_skip(feed_id)
    }

    pub async fn is_feed_slow(&self, feed_id: &str) -> bool {
        self.state.lock().await.is_slow(feed_id)
    }

    pub async fn slow_threshold(&self) -> f64 {
        self.state.lock().await.config.slow_threshold
    }

    // Returns the effective threshold. Zero, negative or non-finite values
    // clear the override; values at or above the hard failure cut-off are
    // rejected and leave the current threshold in place.
    pub async fn set_slow_threshold(&self, seconds: f64) -> f64 {
        let mut state = self.state.lock().await;
        let stored = if state.config.accepts_slow_threshold(seconds) {
            state.config.slow_threshold = seconds;
            seconds
        } else if seconds.is_finite() && seconds > 0.0 {
            tracing::warn!(
                seconds,
                hard_failure_secs = state.config.hard_failure_secs,
                "rejecting slow threshold at or above the hard failure cut-off"
            );
            return state.config.slow_threshold;
        } else {
            state.config.slow_threshold = state.configured_slow_threshold;
            0.0
        };

        match serde_json::to_vec(&stored) {
            Ok(payload) => {
                if let Err(error) = self.store.set(SLOW_THRESHOLD_KEY, &payload).await {
                    tracing::warn!(key = SLOW_THRESHOLD_KEY, %error, "failed to persist slow threshold");
                }
            }
            Err(error) => {
                tracing::warn!(key = SLOW_THRESHOLD_KEY, %error, "failed to encode slow threshold");
            }
        }
        state.config.slow_threshold
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoadTimeEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> Vec<FeedHealth> {
        let state = self.state.lock().await;
        let feed_ids: BTreeSet<&String> = state
            .load_times
            .keys()
            .chain(state.failure_counts.keys())
            .collect();
        feed_ids
            .into_iter()
            .map(|feed_id| FeedHealth {
                feed_id: feed_id.clone(),
                load_time: state.load_times.get(feed_id).copied(),
                failure_count: state.failure_count(feed_id),
                slow: state.is_slow(feed_id),
                skip: state.should_skip(feed_id),
            })
            .collect()
    }

    async fn persist_failure_counts(&self, counts: &BTreeMap<String, u32>) {
        let payload = match serde_json::to_vec(counts) {
            Ok(payload) => payload,
            Err(error) => {
                tracing::warn!(key = FAILURE_COUNTS_KEY, %error, "failed to encode feed failure counts");
                return;
            }
        };
        if let Err(error) = self.store.set(FAILURE_COUNTS_KEY, &payload).await {
            tracing::warn!(key = FAILURE_COUNTS_KEY, %error, "failed to persist feed failure counts");
        }
    }
}

fn decode_failure_counts(raw: &[u8]) -> BTreeMap<String, u32> {
    serde_json::from_slice(raw).unwrap_or_else(|error| {
        tracing::warn!(key = FAILURE_COUNTS_KEY, %error, "discarding undecodable feed failure counts");
        BTreeMap::new()
    })
}
