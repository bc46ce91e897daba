pub const FAILURE_COUNTS_KEY: &str = "slowOrFailedFeeds";
pub const SLOW_THRESHOLD_KEY: &str = "feedSlowThreshold";

pub const DEFAULT_SLOW_THRESHOLD_SECS: f64 = 10.0;
pub const DEFAULT_MAX_FAILURES: u32 = 3;
pub const DEFAULT_HARD_FAILURE_SECS: f64 = 45.0;

const SLOW_THRESHOLD_ENV: &str = "RSSR_FEED_SLOW_THRESHOLD";
const MAX_FAILURES_ENV: &str = "RSSR_FEED_MAX_FAILURES";
const HARD_FAILURE_ENV: &str = "RSSR_FEED_HARD_FAILURE_SECS";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthConfig {
    pub slow_threshold: f64,
    pub max_failures: u32,
    pub hard_failure_secs: f64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            slow_threshold: DEFAULT_SLOW_THRESHOLD_SECS,
            max_failures: DEFAULT_MAX_FAILURES,
            hard_failure_secs: DEFAULT_HARD_FAILURE_SECS,
        }
    }
}

impl HealthConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(raw) = non_empty(lookup(SLOW_THRESHOLD_ENV)) {
            config.slow_threshold = parse_seconds(SLOW_THRESHOLD_ENV, &raw)?;
        }
        if let Some(raw) = non_empty(lookup(MAX_FAILURES_ENV)) {
            config.max_failures = match raw.trim().parse::<u32>() {
                Ok(value) if value > 0 => value,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: MAX_FAILURES_ENV,
                        value: raw,
                    })
                }
            };
        }
        if let Some(raw) = non_empty(lookup(HARD_FAILURE_ENV)) {
            config.hard_failure_secs = parse_seconds(HARD_FAILURE_ENV, &raw)?;
        }
        // The slow band sits strictly between the two thresholds.
        if config.hard_failure_secs <= config.slow_threshold {
            return Err(ConfigError::InvalidValue {
                key: HARD_FAILURE_ENV,
                value: config.hard_failure_secs.to_string(),
            });
        }
        Ok(config)
    }

    pub fn with_stored_threshold(mut self, stored: Option<&[u8]>) -> Self {
        if let Some(threshold) = stored.and_then(decode_threshold) {
            if self.accepts_slow_threshold(threshold) {
                self.slow_threshold = threshold;
            } else {
                tracing::warn!(
                    key = SLOW_THRESHOLD_KEY,
                    threshold,
                    hard_failure_secs = self.hard_failure_secs,
                    "ignoring slow threshold at or above the hard failure cut-off"
                );
            }
        }
        self
    }

    pub fn accepts_slow_threshold(&self, seconds: f64) -> bool {
        seconds.is_finite() && seconds > 0.0 && seconds < self.hard_failure_secs
    }
}

fn decode_threshold(raw: &[u8]) -> Option<f64> {
    match serde_json::from_slice::<f64>(raw) {
        Ok(value) if value.is_finite() && value > 0.0 => Some(value),
        Ok(_) => None,
        Err(error) => {
            tracing::warn!(key = SLOW_THRESHOLD_KEY, %error, "ignoring undecodable slow threshold");
            None
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|raw| !raw.trim().is_empty())
}

fn parse_seconds(key: &'static str, raw: &str) -> Result<f64, ConfigError> {
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() && value > 0.0 => Ok(value),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
        }),
    }
}
