//! Project configuration file support for agenteval.
//!
//! Loads configuration from `agenteval.toml` in the working directory.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Project-level configuration loaded from `agenteval.toml`
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    /// Global default agent (applies to critic and quantifier)
    pub agent: Option<String>,
    /// Global default model (applies to critic and quantifier)
    pub model: Option<String>,
    /// Requests allowed per criteria synthesis or quantification
    pub max_rounds: Option<usize>,
    /// Test cases quantified at once
    pub concurrency: Option<usize>,
    /// Limit on a single generation request, e.g. "90s" or "5m"
    #[serde(default, with = "humantime_serde")]
    pub timeout: Option<Duration>,
    /// Critic-specific configuration
    #[serde(default)]
    pub critic: RoleConfig,
    /// Quantifier-specific configuration
    #[serde(default)]
    pub quantifier: RoleConfig,
}

/// Configuration for a specific role (critic or quantifier)
#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
pub struct RoleConfig {
    /// Agent to use for this role
    pub agent: Option<String>,
    /// Model to use for this role
    pub model: Option<String>,
}

/// The config file name
pub const CONFIG_FILE_NAME: &str = "agenteval.toml";

impl ProjectConfig {
    /// Load configuration from the working directory.
    ///
    /// Returns:
    /// - `Ok(Some(config))` if file exists and parses successfully
    /// - `Ok(None)` if file does not exist
    /// - `Err(...)` if file exists but fails to parse (hard error)
    pub fn load(working_dir: &Path) -> Result<Option<Self>> {
        let config_path = working_dir.join(CONFIG_FILE_NAME);

        if !config_path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;

        let config: ProjectConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;

        Ok(Some(config))
    }

    /// Get the effective agent for the critic.
    /// Priority: [critic].agent > global agent > None
    pub fn critic_agent(&self) -> Option<&str> {
        self.critic.agent.as_deref().or(self.agent.as_deref())
    }

    /// Get the effective model for the critic.
    /// Priority: [critic].model > global model > None
    pub fn critic_model(&self) -> Option<&str> {
        self.critic.model.as_deref().or(self.model.as_deref())
    }

    /// Get the effective agent for the quantifier.
    /// Priority: [quantifier].agent > global agent > None
    pub fn quantifier_agent(&self) -> Option<&str> {
        self.quantifier.agent.as_deref().or(self.agent.as_deref())
    }

    /// Get the effective model for the quantifier.
    /// Priority: [quantifier].model > global model > None
    pub fn quantifier_model(&self) -> Option<&str> {
        self.quantifier.model.as_deref().or(self.model.as_deref())
    }
}
