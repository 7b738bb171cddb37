use std::path::PathBuf;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;

#[derive(Debug, Clone)]
pub(crate) struct Settings {
    pub(super) runtime: RuntimeSettings,
    pub(super) timing: WorkerTiming,
    pub(super) telemetry: TelemetrySettings,
}

#[derive(Debug, Clone)]
pub(crate) struct RuntimeSettings {
    pub(crate) shm_prefix: String,
    pub(crate) worker_bin: Option<PathBuf>,
}

/// Pacing of a worker's simulated review and grading work.
#[derive(Debug, Clone)]
pub(crate) struct WorkerTiming {
    pub(crate) review: DelayBand,
    pub(crate) grading: DelayBand,
    pub(crate) change_probability: f64,
    pub(crate) idle_backoff: Duration,
    pub(crate) seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub(crate) struct TelemetrySettings {
    pub(crate) log_level: String,
    pub(crate) json: bool,
}

/// Inclusive range of milliseconds a delay is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DelayBand {
    min_ms: u64,
    max_ms: u64,
}

#[derive(Debug, Error)]
pub(crate) enum ConfigError {
    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
    #[error("invalid delay band for {field}: {value} (expected \"min-max\" or a single value)")]
    InvalidDelayBand { field: &'static str, value: String },
    #[error("invalid shared memory prefix: {0} (must start with '/' and contain no other '/')")]
    InvalidShmPrefix(String),
}

impl DelayBand {
    pub(crate) const ZERO: Self = Self { min_ms: 0, max_ms: 0 };

    pub(crate) fn new(min_ms: u64, max_ms: u64) -> Option<Self> {
        (min_ms <= max_ms).then_some(Self { min_ms, max_ms })
    }

    pub(crate) fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        if self.min_ms == self.max_ms {
            return Duration::from_millis(self.min_ms);
        }
        Duration::from_millis(rng.gen_range(self.min_ms..=self.max_ms))
    }
}

impl WorkerTiming {
    /// No delays and a rubric edit on every review step.
    #[cfg(test)]
    pub(crate) fn instant() -> Self {
        Self {
            review: DelayBand::ZERO,
            grading: DelayBand::ZERO,
            change_probability: 1.0,
            idle_backoff: Duration::ZERO,
            seed: None,
        }
    }
}
