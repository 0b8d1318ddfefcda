//! TOML configuration parsing and management.

use super::environment::EnvironmentLoader;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub executor: ExecutorSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Agent configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_agent_name")]
    pub name: String,
    #[serde(default)]
    pub description: String,
}

fn default_agent_name() -> String {
    "agent".to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            description: String::new(),
        }
    }
}

/// Remote peer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Endpoint of the remote agent.
    #[serde(default)]
    pub url: String,
    /// Prefer streaming calls when the peer supports them.
    #[serde(default = "default_streaming")]
    pub streaming: bool,
    /// Capacity of the event channel of a remote run.
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
    /// Metadata added to every outgoing request.
    #[serde(default)]
    pub request_metadata: Map<String, Value>,
}

fn default_streaming() -> bool {
    true
}

fn default_channel_capacity() -> usize {
    32
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            streaming: default_streaming(),
            channel_capacity: default_channel_capacity(),
            request_metadata: Map::new(),
        }
    }
}

/// Executor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorSettings {
    #[serde(default = "default_emit_partial_artifacts")]
    pub emit_partial_artifacts: bool,
}

fn default_emit_partial_artifacts() -> bool {
    true
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            emit_partial_artifacts: default_emit_partial_artifacts(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Transcript file. A timestamped temp file is used when unset.
    #[serde(default)]
    pub log_file: Option<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "INFO".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            log_level: default_log_level(),
        }
    }
}

impl Configuration {
    /// Override settings from the environment.
    pub fn apply_environment(&mut self, env: &EnvironmentLoader) {
        if let Some(streaming) = env.streaming() {
            self.remote.streaming = streaming;
        }
        if let Some(url) = env.remote_url() {
            self.remote.url = url;
        }
        if let Some(level) = env.log_level() {
            self.logging.log_level = level;
        }
    }

    /// Card describing the configured remote agent.
    pub fn agent_card(&self) -> crate::protocol::AgentCard {
        let mut card = crate::protocol::AgentCard::new(self.agent.name.clone(), self.remote.url.clone())
            .with_streaming(self.remote.streaming);
        card.description = self.agent.description.clone();
        card
    }

    /// Runtime settings of a remote agent.
    #[cfg(feature = "bridge")]
    pub fn remote_agent_config(&self) -> crate::remote::RemoteAgentConfig {
        crate::remote::RemoteAgentConfig {
            name: self.agent.name.clone(),
            streaming: self.remote.streaming,
            channel_capacity: self.remote.channel_capacity,
            request_metadata: self.remote.request_metadata.clone(),
        }
    }

    /// Runtime settings of an executor.
    #[cfg(feature = "bridge")]
    pub fn executor_config(&self) -> crate::executor::ExecutorConfig {
        crate::executor::ExecutorConfig {
            agent_name: self.agent.name.clone(),
            emit_partial_artifacts: self.executor.emit_partial_artifacts,
        }
    }

    /// Transcript logger for the configured log file and level.
    #[cfg(feature = "observability")]
    pub fn logger(&self) -> Result<crate::observability::Logger> {
        crate::observability::Logger::new(
            self.logging.log_file.as_deref().map(Path::new),
            Some(&self.logging.log_level),
        )
    }
}

/// Loads and manages TOML configuration.
#[derive(Debug)]
pub struct ConfigurationLoader {
    pub config_path: PathBuf,
    pub config: Configuration,
}

impl ConfigurationLoader {
    /// Initialize configuration loader.
    ///
    /// # Arguments
    /// * `config_path` - Path to TOML config file. If None, uses `config/a2a.toml`
    ///   when it exists and the default config otherwise.
    pub fn new(config_path: Option<&Path>) -> Result<Self> {
        let config_path = config_path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("config/a2a.toml"));

        let config = if config_path.exists() {
            Self::load_config(&config_path)?
        } else {
            Configuration::default()
        };

        Ok(Self { config_path, config })
    }

    /// Create a configuration loader from a pre-parsed Configuration.
    pub fn from_config(config: Configuration) -> Self {
        Self {
            config_path: PathBuf::from("config/a2a.toml"),
            config,
        }
    }

    /// Load configuration from TOML file.
    fn load_config(path: &Path) -> Result<Configuration> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        toml::from_str(&content)
            .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
    }

    /// Get configuration value by dot-notation key.
    pub fn get_string(&self, key: &str) -> Option<String> {
        match key {
            "agent.name" => Some(self.config.agent.name.clone()),
            "agent.description" => Some(self.config.agent.description.clone()),
            "remote.url" => Some(self.config.remote.url.clone()),
            "logging.log_file" => self.config.logging.log_file.clone(),
            "logging.log_level" => Some(self.config.logging.log_level.clone()),
            _ => None,
        }
    }

    /// Get numeric configuration value.
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match key {
            "remote.channel_capacity" => Some(self.config.remote.channel_capacity as u64),
            _ => None,
        }
    }

    /// Get boolean configuration value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match key {
            "remote.streaming" => Some(self.config.remote.streaming),
            "executor.emit_partial_artifacts" => Some(self.config.executor.emit_partial_artifacts),
            _ => None,
        }
    }
}
