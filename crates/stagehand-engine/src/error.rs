//! Error types for the engine binary.

/// Top-level error for the engine binary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: stagehand_core::config::ConfigError,
    },

    /// A static declaration was rejected.
    #[error("declaration error: {source}")]
    Declaration {
        /// The underlying scheduling error.
        #[from]
        source: stagehand_core::error::SchedulingError,
    },

    /// Simulation runner failed.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: stagehand_core::runner::RunnerError,
    },
}
