use std::path::PathBuf;
use std::time::Duration;

use super::parsing::{
    env_optional, env_or_default, parse_bool, parse_delay_band, parse_probability,
    parse_shm_prefix, parse_u64,
};
use super::types::{ConfigError, RuntimeSettings, Settings, TelemetrySettings, WorkerTiming};

impl Settings {
    pub(crate) fn load() -> Result<Self, ConfigError> {
        let shm_prefix = parse_shm_prefix(env_or_default("MARKER_SHM_PREFIX", "/exam_marker"))?;
        let worker_bin = env_optional("MARKER_WORKER_BIN").map(PathBuf::from);

        let review = parse_delay_band(
            "MARKER_REVIEW_DELAY_MS",
            env_or_default("MARKER_REVIEW_DELAY_MS", "500-1000"),
        )?;
        let grading = parse_delay_band(
            "MARKER_GRADING_DELAY_MS",
            env_or_default("MARKER_GRADING_DELAY_MS", "1000-2000"),
        )?;
        let change_probability = parse_probability(
            "MARKER_CHANGE_PROBABILITY",
            env_or_default("MARKER_CHANGE_PROBABILITY", "0.5"),
        )?;
        let idle_backoff_ms =
            parse_u64("MARKER_IDLE_BACKOFF_MS", env_or_default("MARKER_IDLE_BACKOFF_MS", "50"))?;
        let seed = env_optional("MARKER_SEED")
            .map(|value| parse_u64("MARKER_SEED", value))
            .transpose()?;

        let log_level = env_or_default("MARKER_LOG_LEVEL", "info");
        let json = env_optional("MARKER_LOG_JSON").map(|value| parse_bool(&value)).unwrap_or(false);

        Ok(Self {
            runtime: RuntimeSettings { shm_prefix, worker_bin },
            timing: WorkerTiming {
                review,
                grading,
                change_probability,
                idle_backoff: Duration::from_millis(idle_backoff_ms),
                seed,
            },
            telemetry: TelemetrySettings { log_level, json },
        })
    }

    pub(crate) fn runtime(&self) -> &RuntimeSettings {
        &self.runtime
    }

    pub(crate) fn timing(&self) -> &WorkerTiming {
        &self.timing
    }

    pub(crate) fn telemetry(&self) -> &TelemetrySettings {
        &self.telemetry
    }
}

impl RuntimeSettings {
    /// Explicit `MARKER_WORKER_BIN`, else `exam-marker-worker` next to the running executable.
    pub(crate) fn worker_bin(&self) -> std::io::Result<PathBuf> {
        if let Some(path) = &self.worker_bin {
            return Ok(path.clone());
        }

        let current = std::env::current_exe()?;
        Ok(current.with_file_name(format!("exam-marker-worker{}", std::env::consts::EXE_SUFFIX)))
    }
}
