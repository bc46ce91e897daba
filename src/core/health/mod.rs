pub mod config;
pub mod events;
pub mod tracker;

pub use config::{ConfigError, HealthConfig};
pub use events::LoadTimeEvent;
pub use tracker::{FeedHealth, FeedHealthTracker, LoadOutcome};
