//! Config struct and loading logic.
//!
//! Priority (highest to lowest):
//! 1. CLI flags
//! 2. Environment variables
//! 3. `.reviewloom.toml` in the working directory
//! 4. `~/.config/reviewloom/config.toml` (global defaults)
//! 5. Built-in defaults

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::constants::{
    DEFAULT_CONTEXT_WINDOW, DEFAULT_FINAL_MIN_LEN, DEFAULT_FUZZY_THRESHOLD, DEFAULT_MAX_CONCURRENT,
    DEFAULT_MAX_MESSAGES, DEFAULT_REPUTATION_SCORE, DEFAULT_RETRY_AFTER_SECS,
    DEFAULT_RUN_TIMEOUT_SECS,
};
use crate::env::Env;
use crate::models::ProviderName;
use crate::reputation::{ClampPolicy, ReputationCalculator, WeightTable};

/// Errors during config loading.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    ParseFile {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub provider: ProviderConfig,
    pub pipeline: PipelineConfig,
    pub locator: LocatorConfig,
    pub reputation: ReputationConfig,
}

/// Inference provider configuration.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub name: ProviderName,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("name", &self.name)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: ProviderName::Anthropic,
            model: "claude-sonnet-4-20250514".to_string(),
            base_url: None,
            api_key: None,
        }
    }
}

/// How the next stage is chosen.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum PolicyKind {
    /// Follow declared edges, batching ready stages.
    #[default]
    Static,
    /// One stage per turn, chosen by a selector.
    Dynamic,
}

/// What happens when every concurrency slot is taken.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Admission {
    /// Wait for a slot.
    #[default]
    Blocking,
    /// Return `concurrency_exceeded` immediately.
    FailFast,
}

/// Pipeline execution limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub max_concurrent: usize,
    pub max_messages: usize,
    pub run_timeout_secs: u64,
    /// Longest wait for the next chunk of a stage. Unset means no limit.
    pub stage_idle_timeout_secs: Option<u64>,
    pub policy: PolicyKind,
    pub admission: Admission,
    pub instructions_dir: Option<PathBuf>,
    pub final_min_len: usize,
    pub suggested_retry_after_secs: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
            max_messages: DEFAULT_MAX_MESSAGES,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            stage_idle_timeout_secs: None,
            policy: PolicyKind::default(),
            admission: Admission::default(),
            instructions_dir: None,
            final_min_len: DEFAULT_FINAL_MIN_LEN,
            suggested_retry_after_secs: DEFAULT_RETRY_AFTER_SECS,
        }
    }
}

impl PipelineConfig {
    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn stage_idle_timeout(&self) -> Option<Duration> {
        self.stage_idle_timeout_secs.map(Duration::from_secs)
    }

    pub fn retry_after(&self) -> Duration {
        Duration::from_secs(self.suggested_retry_after_secs)
    }
}

/// Diff line-locator settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    pub fuzzy_threshold: f64,
    pub context_window: usize,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            fuzzy_threshold: DEFAULT_FUZZY_THRESHOLD,
            context_window: DEFAULT_CONTEXT_WINDOW,
        }
    }
}

/// Reputation weights and clamping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReputationConfig {
    pub critical: i64,
    pub medium: i64,
    pub minor: i64,
    pub praise: i64,
    pub baseline: i64,
    pub clamp_min: Option<i64>,
    pub clamp_max: Option<i64>,
    pub default_score: i64,
}

impl Default for ReputationConfig {
    fn default() -> Self {
        let weights = WeightTable::default();
        Self {
            critical: weights.critical,
            medium: weights.medium,
            minor: weights.minor,
            praise: weights.praise,
            baseline: weights.baseline,
            clamp_min: None,
            clamp_max: None,
            default_score: DEFAULT_REPUTATION_SCORE,
        }
    }
}

impl ReputationConfig {
    pub fn weights(&self) -> WeightTable {
        WeightTable {
            critical: self.critical,
            medium: self.medium,
            minor: self.minor,
            praise: self.praise,
            baseline: self.baseline,
        }
    }

    pub fn clamp(&self) -> ClampPolicy {
        ClampPolicy::new(self.clamp_min, self.clamp_max)
    }

    pub fn calculator(&self) -> ReputationCalculator {
        ReputationCalculator::new(self.weights(), self.clamp())
    }
}

impl Config {
    /// Load configuration with proper layering.
    ///
    /// Reads from global config, local config, then applies
    /// environment variable overrides.
    pub fn load(work_dir: Option<&Path>, env: &Env) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        // Layer 4: global config
        if let Some(global_path) = Self::global_config_path()
            && global_path.exists()
        {
            let global = Self::load_file(&global_path)?;
            config.merge(global);
        }

        // Layer 3: local config
        if let Some(dir) = work_dir {
            let local_path = dir.join(crate::constants::CONFIG_FILENAME);
            if local_path.exists() {
                let local = Self::load_file(&local_path)?;
                config.merge(local);
            }
        }

        // Layer 2: environment variables
        config.apply_env_vars(env);

        config.validate()?;
        Ok(config)
    }

    /// Load a config from a specific file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the global config file path.
    fn global_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(crate::constants::CONFIG_DIR).join("config.toml"))
    }

    /// Reject values no run could work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.max_concurrent == 0 {
            return Err(ConfigError::Invalid("pipeline.max_concurrent must be at least 1".into()));
        }
        if self.pipeline.max_messages == 0 {
            return Err(ConfigError::Invalid("pipeline.max_messages must be at least 1".into()));
        }
        if !(0.0..=1.0).contains(&self.locator.fuzzy_threshold) {
            return Err(ConfigError::Invalid(format!(
                "locator.fuzzy_threshold must be within 0.0..=1.0, got {}",
                self.locator.fuzzy_threshold
            )));
        }
        if let (Some(min), Some(max)) = (self.reputation.clamp_min, self.reputation.clamp_max)
            && min > max
        {
            return Err(ConfigError::Invalid(format!(
                "reputation.clamp_min ({min}) is greater than clamp_max ({max})"
            )));
        }
        Ok(())
    }

    /// Merge another config into this one (other takes precedence for non-default values).
    fn merge(&mut self, other: Config) {
        // Provider settings
        let default_provider = ProviderConfig::default();
        if other.provider.name != default_provider.name {
            self.provider.name = other.provider.name;
        }
        if other.provider.model != default_provider.model {
            self.provider.model = other.provider.model;
        }
        if other.provider.base_url.is_some() {
            self.provider.base_url = other.provider.base_url;
        }
        if other.provider.api_key.is_some() {
            self.provider.api_key = other.provider.api_key;
        }

        // Pipeline settings
        let default_pipeline = PipelineConfig::default();
        let pipeline = other.pipeline;
        if pipeline.max_concurrent != default_pipeline.max_concurrent {
            self.pipeline.max_concurrent = pipeline.max_concurrent;
        }
        if pipeline.max_messages != default_pipeline.max_messages {
            self.pipeline.max_messages = pipeline.max_messages;
        }
        if pipeline.run_timeout_secs != default_pipeline.run_timeout_secs {
            self.pipeline.run_timeout_secs = pipeline.run_timeout_secs;
        }
        if pipeline.stage_idle_timeout_secs.is_some() {
            self.pipeline.stage_idle_timeout_secs = pipeline.stage_idle_timeout_secs;
        }
        if pipeline.policy != default_pipeline.policy {
            self.pipeline.policy = pipeline.policy;
        }
        if pipeline.admission != default_pipeline.admission {
            self.pipeline.admission = pipeline.admission;
        }
        if pipeline.instructions_dir.is_some() {
            self.pipeline.instructions_dir = pipeline.instructions_dir;
        }
        if pipeline.final_min_len != default_pipeline.final_min_len {
            self.pipeline.final_min_len = pipeline.final_min_len;
        }
        if pipeline.suggested_retry_after_secs != default_pipeline.suggested_retry_after_secs {
            self.pipeline.suggested_retry_after_secs = pipeline.suggested_retry_after_secs;
        }

        // Locator settings
        let default_locator = LocatorConfig::default();
        if other.locator.fuzzy_threshold != default_locator.fuzzy_threshold {
            self.locator.fuzzy_threshold = other.locator.fuzzy_threshold;
        }
        if other.locator.context_window != default_locator.context_window {
            self.locator.context_window = other.locator.context_window;
        }

        // Reputation settings
        let default_rep = ReputationConfig::default();
        let rep = other.reputation;
        if rep.critical != default_rep.critical {
            self.reputation.critical = rep.critical;
        }
        if rep.medium != default_rep.medium {
            self.reputation.medium = rep.medium;
        }
        if rep.minor != default_rep.minor {
            self.reputation.minor = rep.minor;
        }
        if rep.praise != default_rep.praise {
            self.reputation.praise = rep.praise;
        }
        if rep.baseline != default_rep.baseline {
            self.reputation.baseline = rep.baseline;
        }
        if rep.clamp_min.is_some() {
            self.reputation.clamp_min = rep.clamp_min;
        }
        if rep.clamp_max.is_some() {
            self.reputation.clamp_max = rep.clamp_max;
        }
        if rep.default_score != default_rep.default_score {
            self.reputation.default_score = rep.default_score;
        }
    }

    /// Apply environment variable overrides.
    fn apply_env_vars(&mut self, env: &Env) {
        use crate::constants::{ENV_API_KEY, ENV_BASE_URL, ENV_MAX_CONCURRENT, ENV_MODEL, ENV_PROVIDER};

        if let Some(val) = env.non_empty(ENV_PROVIDER) {
            match val.parse::<ProviderName>() {
                Ok(name) => self.provider.name = name,
                Err(e) => tracing::warn!("ignoring invalid {ENV_PROVIDER} value: {e}"),
            }
        }
        if let Some(val) = env.non_empty(ENV_MODEL) {
            self.provider.model = val;
        }
        if let Some(val) = env.non_empty(ENV_BASE_URL) {
            self.provider.base_url = Some(val);
        }
        if let Some(val) = env.non_empty(ENV_MAX_CONCURRENT) {
            match val.parse::<usize>() {
                Ok(n) if n > 0 => self.pipeline.max_concurrent = n,
                _ => tracing::warn!("ignoring invalid {ENV_MAX_CONCURRENT} value: {val}"),
            }
        }

        // Provider-specific API key resolution
        let api_key = env
            .non_empty(ENV_API_KEY)
            .or_else(|| env.non_empty(self.provider.name.api_key_env_var()));
        if api_key.is_some() {
            self.provider.api_key = api_key;
        }
    }
}
