//! Environment variable loading and management.
//!
//! Only bridge-level overrides are read here: the remote endpoint, the
//! streaming preference and the transcript log level.

use std::env;
use std::path::Path;

/// Overrides `remote.url`.
pub const REMOTE_URL_VAR: &str = "A2A_REMOTE_URL";
/// Overrides `remote.streaming` (`true`/`false`/`1`/`0`).
pub const STREAMING_VAR: &str = "A2A_STREAMING";
/// Overrides `logging.log_level`.
pub const LOG_LEVEL_VAR: &str = "A2A_LOG_LEVEL";

/// Loads environment variables from .env file and system environment.
#[derive(Debug, Clone)]
pub struct EnvironmentLoader {
    env_file: Option<String>,
}

impl EnvironmentLoader {
    /// Initialize the environment loader.
    ///
    /// # Arguments
    /// * `env_file` - Path to a .env file. Nothing is loaded when None.
    pub fn new(env_file: Option<&Path>) -> Self {
        // Only an explicit path is loaded, so tests never pick up a stray .env.
        if let Some(path) = env_file {
            if path.exists() {
                if let Err(e) = dotenv::from_path(path) {
                    tracing::warn!("Failed to load .env file {}: {}", path.display(), e);
                }
            }
        }

        Self {
            env_file: env_file.map(|p| p.to_string_lossy().to_string()),
        }
    }

    /// The .env file this loader was created with.
    pub fn env_file(&self) -> Option<&str> {
        self.env_file.as_deref()
    }

    /// Remote endpoint override.
    pub fn remote_url(&self) -> Option<String> {
        env::var(REMOTE_URL_VAR).ok().filter(|url| !url.is_empty())
    }

    /// Streaming override. Unparseable values are ignored.
    pub fn streaming(&self) -> Option<bool> {
        let value = env::var(STREAMING_VAR).ok()?;
        match value.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Some(true),
            "false" | "0" | "no" => Some(false),
            other => {
                tracing::warn!("Ignoring invalid {} value: {}", STREAMING_VAR, other);
                None
            }
        }
    }

    /// Transcript log level override.
    pub fn log_level(&self) -> Option<String> {
        env::var(LOG_LEVEL_VAR).ok().filter(|level| !level.is_empty())
    }
}

impl Default for EnvironmentLoader {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use std::io::Write;

    // All variables are touched from this single test so parallel tests
    // never observe each other's values.
    #[test]
    fn test_overrides() {
        env::remove_var(REMOTE_URL_VAR);
        env::remove_var(STREAMING_VAR);
        env::remove_var(LOG_LEVEL_VAR);
        let env_loader = EnvironmentLoader::default();
        assert_eq!(env_loader.remote_url(), None);
        assert_eq!(env_loader.streaming(), None);

        env::set_var(STREAMING_VAR, "0");
        env::set_var(REMOTE_URL_VAR, "http://peer:9000");
        env::set_var(LOG_LEVEL_VAR, "DEBUG");
        let mut config = Configuration::default();
        config.apply_environment(&env_loader);
        assert!(!config.remote.streaming);
        assert_eq!(config.remote.url, "http://peer:9000");
        assert_eq!(config.logging.log_level, "DEBUG");

        env::set_var(STREAMING_VAR, "maybe");
        assert_eq!(env_loader.streaming(), None);

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "A2A_STREAMING=true").unwrap();
        env::remove_var(STREAMING_VAR);
        let env_loader = EnvironmentLoader::new(Some(file.path()));
        assert_eq!(env_loader.streaming(), Some(true));
        assert!(env_loader.env_file().is_some());

        env::remove_var(REMOTE_URL_VAR);
        env::remove_var(STREAMING_VAR);
        env::remove_var(LOG_LEVEL_VAR);
    }
}
