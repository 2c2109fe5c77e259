//! Configuration loading.
//!
//! Pinewright reads `~/.pinewright/config.toml` (or an explicit path). A
//! missing file yields defaults. A small set of environment variables
//! override file values.
//!
//! Precedence: env vars > config file > defaults.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::pipeline::{ArtifactKind, CapabilityTier, GenerationSettings, ModelChoice};

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Model selection and capability tiers.
    pub models: ModelsConfig,

    /// Sampling settings.
    pub generation: GenerationConfig,

    /// Defaults for new generation requests.
    pub defaults: DefaultsConfig,
}

/// Model selection: default selector, explicit expert tier, utility model.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Selector used for generation and refinement.
    pub default: String,

    /// Selectors that run with the expert prompt set. Matched exactly.
    pub expert: Vec<String>,

    /// Selector used for enhancement and document analysis.
    pub utility: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            expert: vec![default_model()],
            utility: default_utility_model(),
        }
    }
}

impl ModelsConfig {
    /// Pair a selector with its configured tier.
    pub fn choice(&self, selector: &str) -> ModelChoice {
        let tier = if self.expert.iter().any(|s| s == selector) {
            CapabilityTier::Expert
        } else {
            CapabilityTier::Standard
        };
        ModelChoice::new(selector, tier)
    }

    /// The default selector with its tier.
    pub fn default_choice(&self) -> ModelChoice {
        self.choice(&self.default)
    }
}

/// Sampling settings.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Temperature for generation and refinement.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Output token cap.
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,

    /// Reasoning budget for expert-tier calls.
    #[serde(default)]
    pub reasoning_budget: Option<u32>,

    /// Temperature for prompt enhancement.
    #[serde(default = "default_enhance_temperature")]
    pub enhance_temperature: f32,

    /// Temperature for document analysis.
    #[serde(default = "default_analysis_temperature")]
    pub analysis_temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            reasoning_budget: None,
            enhance_temperature: default_enhance_temperature(),
            analysis_temperature: default_analysis_temperature(),
        }
    }
}

/// Defaults for new generation requests.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    /// Target version tag.
    #[serde(default = "default_target_version")]
    pub target_version: String,

    /// Artifact kind.
    #[serde(default)]
    pub artifact_kind: ArtifactKind,

    /// Overlay flag.
    #[serde(default = "default_overlay")]
    pub overlay: bool,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            target_version: default_target_version(),
            artifact_kind: ArtifactKind::default(),
            overlay: default_overlay(),
        }
    }
}

// Default value functions for serde

fn default_model() -> String {
    "gemini-2.5-pro".to_owned()
}
fn default_utility_model() -> String {
    "gemini-2.5-flash".to_owned()
}
fn default_temperature() -> f32 {
    0.4
}
fn default_max_output_tokens() -> u32 {
    8192
}
fn default_enhance_temperature() -> f32 {
    0.7
}
fn default_analysis_temperature() -> f32 {
    0.2
}
fn default_target_version() -> String {
    "v6".to_owned()
}
fn default_overlay() -> bool {
    true
}

impl Config {
    /// Sampling settings for the pipeline service.
    pub fn generation_settings(&self) -> GenerationSettings {
        GenerationSettings {
            temperature: self.generation.temperature,
            max_output_tokens: self.generation.max_output_tokens,
            reasoning_budget: self.generation.reasoning_budget,
            utility_model: self.models.utility.clone(),
            enhance_temperature: self.generation.enhance_temperature,
            analysis_temperature: self.generation.analysis_temperature,
        }
    }

    /// Apply environment overrides (env > config > defaults).
    ///
    /// Takes a resolver function for testability (avoids `set_var` in tests).
    pub fn apply_overrides(&mut self, env: impl Fn(&str) -> Option<String>) {
        if let Some(v) = env("PINEWRIGHT_MODEL") {
            self.models.default = v;
        }
        if let Some(v) = env("PINEWRIGHT_UTILITY_MODEL") {
            self.models.utility = v;
        }
        if let Some(v) = env("PINEWRIGHT_TARGET_VERSION") {
            self.defaults.target_version = v;
        }
        if let Some(v) = env("PINEWRIGHT_TEMPERATURE") {
            match v.parse() {
                Ok(t) => self.generation.temperature = t,
                Err(_) => tracing::warn!(
                    var = "PINEWRIGHT_TEMPERATURE",
                    value = %v,
                    "ignoring invalid env override"
                ),
            }
        }
    }
}

/// Load the config from a TOML file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config at {}", path.display()))?;
    let config: Config = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config at {}", path.display()))?;
    Ok(config)
}

/// Load the config from `path`, falling back to defaults when it does not
/// exist, then apply process environment overrides.
///
/// # Errors
///
/// Returns an error if an existing file cannot be read or parsed.
pub fn load_or_default(path: &Path) -> anyhow::Result<Config> {
    let mut config = if path.exists() {
        tracing::info!(path = %path.display(), "loading config from file");
        load_config(path)?
    } else {
        tracing::info!(path = %path.display(), "no config file found, using defaults");
        Config::default()
    };
    config.apply_overrides(|key| std::env::var(key).ok());
    Ok(config)
}

/// Resolved runtime file locations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimePaths {
    /// Root directory (`~/.pinewright`).
    pub root: PathBuf,
    /// `config.toml` path.
    pub config_toml: PathBuf,
    /// `.env` credentials path.
    pub env_file: PathBuf,
    /// Log directory.
    pub logs_dir: PathBuf,
}

impl RuntimePaths {
    /// Paths rooted at an arbitrary directory.
    pub fn under(root: PathBuf) -> Self {
        Self {
            config_toml: root.join("config.toml"),
            env_file: root.join(".env"),
            logs_dir: root.join("logs"),
            root,
        }
    }
}

/// Resolve the default config directory (`~/.pinewright/`).
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn config_dir() -> anyhow::Result<PathBuf> {
    let home = directories::BaseDirs::new()
        .ok_or_else(|| anyhow::anyhow!("cannot determine home directory"))?;
    Ok(home.home_dir().join(".pinewright"))
}

/// Resolve runtime paths under [`config_dir`].
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined.
pub fn runtime_paths() -> anyhow::Result<RuntimePaths> {
    Ok(RuntimePaths::under(config_dir()?))
}
