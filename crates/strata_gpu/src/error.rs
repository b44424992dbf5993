use strata_sched::SchedulerError;
use thiserror::Error;

/// Errors raised while loading a [`GpuMemoryConfig`](crate::GpuMemoryConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse memory manager config")]
    Parse(#[from] serde_json::Error),

    #[error("failed to read config file '{path}'")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("config field '{field}' is invalid: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

/// Errors raised while constructing a [`GpuMemoryManager`](crate::GpuMemoryManager).
#[derive(Debug, Error)]
pub enum GpuMemoryError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}
