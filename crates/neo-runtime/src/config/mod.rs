//! Configuration module for the neo runtime.
//!
//! This module provides figment-based loading of `neo.toml` and validation
//! of the bot, logging and addon settings.

pub mod error;
pub mod loader;
pub mod schema;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ConfigLoader, Profile, load_config, load_config_from_file};
pub use schema::{
    BotConfig, CooldownConfig, LogFormat, LogLevel, LogOutput, LogRotation, LoggingConfig, NeoConfig,
    SpanEventConfig,
};
pub use validation::validate_config;
