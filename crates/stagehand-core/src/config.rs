//! Configuration loading and typed config structures.
//!
//! A model file (`stagehand-config.yaml` by default) carries the model
//! settings, dispatch switches, run limits, logging options and the static
//! block declarations executed before the first cycle.

use std::path::Path;

use serde::Deserialize;
use stagehand_types::{BlockId, BlockKind, BlockScope, ModelType, Tick};

use crate::block::BlockRequest;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// An environment override held a value of the wrong type.
    #[error("invalid value {value:?} for environment override {name}")]
    InvalidOverride {
        /// Environment variable name.
        name: &'static str,
        /// The raw value.
        value: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level model configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StagehandConfig {
    /// Model-level settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Dispatch ordering switches.
    #[serde(default)]
    pub dispatch: DispatchConfig,

    /// Run-loop limits.
    #[serde(default)]
    pub run: RunConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Static block declarations.
    #[serde(default)]
    pub blocks: Vec<BlockDeclaration>,

    /// User-defined function declarations.
    #[serde(default)]
    pub functions: Vec<FunctionDeclaration>,
}

impl StagehandConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `STAGEHAND_SEED` overrides `model.seed`
    /// - `STAGEHAND_MAX_TICKS` overrides `run.max_ticks`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for an unparsable override.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::InvalidOverride`] for an unparsable override.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOverride`] if a value does not parse.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(seed) = parse_override(&lookup, "STAGEHAND_SEED")? {
            self.model.seed = seed;
        }
        if let Some(max_ticks) = parse_override(&lookup, "STAGEHAND_MAX_TICKS")? {
            self.run.max_ticks = max_ticks;
        }
        Ok(())
    }
}

fn parse_override(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
) -> Result<Option<u64>, ConfigError> {
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<u64>()
                .map_err(|_parse_err| ConfigError::InvalidOverride { name, value })
        })
        .transpose()
}

/// Model-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ModelConfig {
    /// Human-readable model name.
    #[serde(default = "default_model_name")]
    pub name: String,

    /// Cycle shape.
    #[serde(default = "default_model_type")]
    pub model_type: ModelType,

    /// Seed for randomized dispatch order.
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Whether the model declares its species explicitly. When set,
    /// species-scoped callbacks must name a species.
    #[serde(default)]
    pub explicit_species: bool,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            model_type: default_model_type(),
            seed: default_seed(),
            explicit_species: false,
        }
    }
}

/// Randomize-order switches, one per kind category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct DispatchConfig {
    /// Shuffle `first()`/`early()`/`late()` events within a stage.
    #[serde(default)]
    pub randomize_events: bool,

    /// Shuffle callbacks within a dispatch.
    #[serde(default)]
    pub randomize_callbacks: bool,
}

/// Run-loop configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct RunConfig {
    /// Maximum number of cycles to run; 0 disables the cap.
    #[serde(default = "default_max_ticks")]
    pub max_ticks: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            max_ticks: default_max_ticks(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Filter used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// One static block declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BlockDeclaration {
    /// Block kind.
    pub kind: BlockKind,

    /// Optional user-visible id.
    #[serde(default)]
    pub id: Option<BlockId>,

    /// First tick; defaults to 1.
    #[serde(default)]
    pub start: Option<Tick>,

    /// Last tick; defaults to open-ended.
    #[serde(default)]
    pub end: Option<Tick>,

    /// Scope filters.
    #[serde(default)]
    pub scope: BlockScope,

    /// Script text.
    pub source: String,
}

impl BlockDeclaration {
    /// Convert into a registration request.
    pub fn to_request(&self) -> BlockRequest {
        let mut request = BlockRequest::new(self.kind, self.source.as_str())
            .maybe_id(self.id)
            .scope_filters(self.scope);
        if let Some(start) = self.start {
            request = request.start(start);
        }
        if let Some(end) = self.end {
            request = request.end(end);
        }
        request
    }
}

/// A user-defined function declaration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FunctionDeclaration {
    /// Function name.
    pub name: String,

    /// Function body.
    pub source: String,
}

// ---------------------------------------------------------------------------
// Default value functions
// ---------------------------------------------------------------------------

fn default_model_name() -> String {
    "Untitled Model".to_owned()
}

const fn default_model_type() -> ModelType {
    ModelType::Wf
}

const fn default_seed() -> u64 {
    42
}

const fn default_max_ticks() -> u64 {
    0
}

fn default_log_level() -> String {
    "info".to_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use stagehand_types::{MutationTypeId, SubpopId};

    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = StagehandConfig::default();
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.model.model_type, ModelType::Wf);
        assert_eq!(config.run.max_ticks, 0);
        assert_eq!(config.logging.level, "info");
        assert!(config.blocks.is_empty());
    }

    #[test]
    fn parse_full_yaml() {
        let yaml = r#"
model:
  name: "Two-locus sweep"
  model_type: nonwf
  seed: 7
  explicit_species: false

dispatch:
  randomize_events: true
  randomize_callbacks: false

run:
  max_ticks: 500

logging:
  level: "debug"
  json: true

blocks:
  - kind: initialize_callback
    source: "initializeMutationRate(1e-7);"
  - kind: early_event
    id: 1
    start: 1
    source: "sim.addSubpop('p1', 500);"
  - kind: mutation_effect_callback
    id: 2
    start: 10
    end: 20
    scope:
      mutation_type: 3
      subpop: 1
    source: "return 1.5;"

functions:
  - name: helper
    source: "return x * 2;"
"#;
        let mut config: StagehandConfig = serde_yml::from_str(yaml).unwrap();
        config.apply_overrides(|_| None).unwrap();

        assert_eq!(config.model.name, "Two-locus sweep");
        assert_eq!(config.model.model_type, ModelType::NonWf);
        assert!(config.dispatch.randomize_events);
        assert_eq!(config.run.max_ticks, 500);
        assert!(config.logging.json);
        assert_eq!(config.blocks.len(), 3);
        assert_eq!(config.functions.len(), 1);

        let callback = config.blocks.get(2).unwrap();
        assert_eq!(callback.kind, BlockKind::MutationEffectCallback);
        assert_eq!(callback.scope.mutation_type, Some(MutationTypeId(3)));

        let request = callback.to_request();
        assert_eq!(request.range(), (10, 20));
        assert_eq!(request.scope().subpop, Some(SubpopId(1)));
        assert_eq!(request.requested_id(), Some(BlockId(2)));
    }

    #[test]
    fn parse_minimal_yaml_uses_defaults() {
        let config: StagehandConfig = serde_yml::from_str("model:\n  name: tiny\n").unwrap();
        assert_eq!(config.model.name, "tiny");
        assert_eq!(config.model.seed, 42);
        assert_eq!(config.run, RunConfig::default());
    }

    #[test]
    fn overrides_replace_values() {
        let mut config = StagehandConfig::default();
        config
            .apply_overrides(|name| match name {
                "STAGEHAND_SEED" => Some("99".to_owned()),
                "STAGEHAND_MAX_TICKS" => Some(" 12 ".to_owned()),
                _ => None,
            })
            .unwrap();
        assert_eq!(config.model.seed, 99);
        assert_eq!(config.run.max_ticks, 12);
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut config = StagehandConfig::default();
        let result = config.apply_overrides(|name| {
            (name == "STAGEHAND_SEED").then(|| "not-a-number".to_owned())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride {
                name: "STAGEHAND_SEED",
                ..
            })
        ));
        assert_eq!(config.model.seed, 42);
    }

    #[test]
    fn invalid_yaml_fails() {
        let result: Result<StagehandConfig, _> = serde_yml::from_str("model: [unclosed");
        assert!(result.is_err());
    }
}
