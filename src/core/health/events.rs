use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

const EVENT_CAPACITY: usize = 64;

// `load_time` is the recorded value verbatim; a NaN duration serializes as
// `null`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTimeEvent {
    pub feed_title: String,
    pub load_time: f64,
}

#[derive(Debug, Clone)]
pub struct LoadTimeEvents {
    tx: broadcast::Sender<LoadTimeEvent>,
}

impl LoadTimeEvents {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LoadTimeEvent> {
        self.tx.subscribe()
    }

    pub fn publish(&self, event: LoadTimeEvent) {
        // No receivers is the common case outside the UI.
        let _ = self.tx.send(event);
    }
}

impl Default for LoadTimeEvents {
    fn default() -> Self {
        Self::new()
    }
}
