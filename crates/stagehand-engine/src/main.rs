//! Stagehand engine binary.
//!
//! Loads a model file, declares its blocks, and runs the tick cycle with an
//! interpreter that logs each block instead of evaluating it.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (first argument, else `stagehand-config.yaml`)
//! 2. Initialize structured logging (tracing)
//! 3. Create the scheduler and run the static declaration pass
//! 4. Run the simulation loop
//! 5. Log the result

mod echo;
mod error;
mod summary_callback;

use std::path::PathBuf;

use stagehand_core::config::{LoggingConfig, StagehandConfig};
use stagehand_core::runner;
use stagehand_core::scheduler::Scheduler;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::echo::EchoInterpreter;
use crate::error::EngineError;
use crate::summary_callback::SummaryCallback;

/// Default model file, relative to the working directory.
const DEFAULT_CONFIG_PATH: &str = "stagehand-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if configuration, declaration or the run fails.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so remember whether
    //    the defaults were used and report it afterwards.
    let (config, config_path) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging);
    info!("stagehand-engine starting");
    match config_path {
        Some(path) => info!(path = %path.display(), "Configuration loaded"),
        None => warn!("Config file not found, using defaults"),
    }
    info!(
        model = config.model.name,
        model_type = ?config.model.model_type,
        seed = config.model.seed,
        explicit_species = config.model.explicit_species,
        "Model settings"
    );

    // 3. Create the scheduler and declare the model's blocks.
    let mut scheduler = Scheduler::from_config(&config);
    scheduler
        .declare_all(&config)
        .map_err(|source| EngineError::Declaration { source })?;
    info!(
        blocks = scheduler.block_count(),
        functions = config.functions.len(),
        "Static declarations complete"
    );

    // 4. Run the simulation.
    let mut interpreter = EchoInterpreter::new();
    let mut callback = SummaryCallback;
    let result = runner::run_simulation(
        &mut scheduler,
        &mut interpreter,
        &config.run,
        &mut callback,
    )
    .map_err(|source| EngineError::Runner { source })?;

    // 5. Log results.
    runner::log_simulation_end(&result);
    match serde_json::to_string(&result) {
        Ok(json) => info!(result = json, "Simulation result"),
        Err(e) => warn!(error = %e, "failed to serialize simulation result"),
    }

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        blocks_executed = interpreter.executed(),
        "stagehand-engine shutdown complete"
    );

    Ok(())
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&logging.level));
    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
}

/// Load the model configuration.
///
/// Uses the first command-line argument if given; otherwise
/// `stagehand-config.yaml` in the working directory, falling back to the
/// defaults when that file is absent. Returns the path actually read.
fn load_config() -> Result<(StagehandConfig, Option<PathBuf>), EngineError> {
    if let Some(arg) = std::env::args_os().nth(1) {
        let path = PathBuf::from(arg);
        let config = StagehandConfig::from_file(&path)?;
        return Ok((config, Some(path)));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = StagehandConfig::from_file(&path)?;
        Ok((config, Some(path)))
    } else {
        let mut config = StagehandConfig::default();
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok((config, None))
    }
}
