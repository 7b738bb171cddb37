use std::env;

use super::types::{ConfigError, DelayBand};

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_probability(field: &'static str, value: String) -> Result<f64, ConfigError> {
    match value.parse::<f64>() {
        Ok(parsed) if (0.0..=1.0).contains(&parsed) => Ok(parsed),
        _ => Err(ConfigError::InvalidValue { field, value }),
    }
}

/// Accepts `"500-1000"` or a fixed `"750"`, in milliseconds.
pub(super) fn parse_delay_band(field: &'static str, value: String) -> Result<DelayBand, ConfigError> {
    let invalid = || ConfigError::InvalidDelayBand { field, value: value.clone() };

    let (min, max) = match value.split_once('-') {
        Some((min, max)) => (min.trim(), max.trim()),
        None => (value.trim(), value.trim()),
    };
    let min = min.parse::<u64>().map_err(|_| invalid())?;
    let max = max.parse::<u64>().map_err(|_| invalid())?;

    DelayBand::new(min, max).ok_or_else(invalid)
}

pub(super) fn parse_shm_prefix(value: String) -> Result<String, ConfigError> {
    if value.len() < 2 || !value.starts_with('/') || value[1..].contains('/') {
        return Err(ConfigError::InvalidShmPrefix(value));
    }
    Ok(value)
}
