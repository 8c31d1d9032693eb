use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Service-level ceilings a run is judged against.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Slo {
    /// p95 latency must stay strictly below this many milliseconds.
    pub p95_ms: f64,
    /// Failure rate must stay strictly below this fraction (0..=1).
    pub error_rate: f64,
}

/// All knobs for one run, resolved once at startup and immutable after.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub target: String,
    pub expected_status: u16,
    pub duration_s: u64,
    pub vus: usize,
    pub timeout_ms: u64,
    pub sleep_ms: u64,
    pub slo: Slo,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("virtual caller count must be at least 1")]
    NoCallers,
    #[error("duration must be at least 1 second")]
    ZeroDuration,
    #[error("error-rate ceiling must be within 0..=1, got {0}")]
    ErrorRateOutOfRange(f64),
    #[error("p95 ceiling must be positive, got {0}ms")]
    NonPositiveP95(f64),
    #[error("target is not an http(s) URL: {0}")]
    BadTarget(String),
}

impl Config {
    /// Fail-fast validation before any request is issued.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.vus == 0 {
            return Err(ConfigError::NoCallers);
        }
        if self.duration_s == 0 {
            return Err(ConfigError::ZeroDuration);
        }
        if !(0.0..=1.0).contains(&self.slo.error_rate) {
            return Err(ConfigError::ErrorRateOutOfRange(self.slo.error_rate));
        }
        if self.slo.p95_ms <= 0.0 {
            return Err(ConfigError::NonPositiveP95(self.slo.p95_ms));
        }
        if !self.target.starts_with("http://") && !self.target.starts_with("https://") {
            return Err(ConfigError::BadTarget(self.target.clone()));
        }
        Ok(())
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.duration_s)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn sleep(&self) -> Duration {
        Duration::from_millis(self.sleep_ms)
    }
}

/// One HTTP attempt by one virtual caller.
#[derive(Debug, Clone)]
pub struct Sample {
    pub at: chrono::DateTime<chrono::Utc>,
    pub latency_ms: f64,
    pub success: bool,
    /// Status code as text, or "TIMEOUT" / "ERROR" for transport failures.
    pub status: String,
}
