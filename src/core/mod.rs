pub(crate) mod cli;
pub(crate) mod config;
pub(crate) mod shutdown;
pub(crate) mod telemetry;
