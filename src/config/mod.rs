//! Configuration management for the bridge.
//!
//! This module provides configuration loading through TOML files and
//! environment overrides via `.env` files.
//!
//! # Example
//!
//! ```no_run
//! use abk_a2a::config::{ConfigurationLoader, EnvironmentLoader};
//! use std::path::Path;
//!
//! let env = EnvironmentLoader::new(Some(Path::new(".env")));
//!
//! let mut loader = ConfigurationLoader::new(Some(Path::new("config/a2a.toml"))).unwrap();
//! loader.config.apply_environment(&env);
//!
//! let card = loader.config.agent_card();
//! println!("Remote agent {} at {}", card.name, card.url);
//! ```

pub mod config;
pub mod environment;

pub use self::config::{
    AgentConfig, Configuration, ConfigurationLoader, ExecutorSettings, LoggingConfig, RemoteConfig,
};
pub use self::environment::EnvironmentLoader;
