use thiserror::Error;

/// Errors surfaced by runners and proxies.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("must be called on the target thread of runner '{runner}'")]
    WrongThread { runner: String },

    #[error("task runner '{runner}' has stopped accepting tasks")]
    RunnerStopped { runner: String },

    #[error("failed to spawn runner thread '{runner}'")]
    Spawn {
        runner: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build async runtime for '{runner}'")]
    Runtime {
        runner: String,
        #[source]
        source: std::io::Error,
    },
}
