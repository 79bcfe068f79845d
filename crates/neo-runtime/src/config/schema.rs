//! Configuration schema definitions.
//!
//! ```toml
//! addons = ["greeter", "profile"]
//!
//! [bot]
//! prefix = "n!"
//! ignored_errors = ["not_found"]
//! owner_ids = [1234]
//! user_id = 5678
//!
//! [bot.cooldown]
//! rate = 2
//! per_secs = 4
//!
//! [logging]
//! level = "debug"
//! format = "pretty"
//!
//! [addon_config.greeter]
//! greeting = "Welcome aboard"
//! ```

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NeoConfig {
    /// Bot-wide settings.
    #[serde(default)]
    pub bot: BotConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Names of the addons to load, in load order.
    #[serde(default)]
    pub addons: Vec<String>,

    /// Per-addon configuration sections, keyed by addon name.
    #[serde(default)]
    pub addon_config: HashMap<String, serde_json::Value>,
}

// =============================================================================
// Bot
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Command prefix used where a server has not set its own.
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Command error kinds never shown to users (`not_found`, ...).
    #[serde(default)]
    pub ignored_errors: Vec<String>,

    /// Whether command names match regardless of case.
    #[serde(default = "default_case_insensitive")]
    pub case_insensitive: bool,

    /// Per-user limit on commands, across all commands.
    #[serde(default)]
    pub cooldown: CooldownConfig,

    /// Users exempt from the cooldown.
    #[serde(default)]
    pub owner_ids: Vec<i64>,

    /// The bot's own user id. When set, mentioning the bot works as a prefix.
    #[serde(default)]
    pub user_id: Option<i64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            ignored_errors: Vec::new(),
            case_insensitive: default_case_insensitive(),
            cooldown: CooldownConfig::default(),
            owner_ids: Vec::new(),
            user_id: None,
        }
    }
}

/// At most `rate` commands per user every `per_secs` seconds.
///
/// A `rate` of 0 turns the limit off.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CooldownConfig {
    #[serde(default = "default_cooldown_rate")]
    pub rate: u32,

    #[serde(default = "default_cooldown_per")]
    pub per_secs: f64,
}

impl CooldownConfig {
    pub fn is_enabled(&self) -> bool {
        self.rate > 0
    }

    pub fn per(&self) -> Duration {
        Duration::from_secs_f64(self.per_secs)
    }
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            rate: default_cooldown_rate(),
            per_secs: default_cooldown_per(),
        }
    }
}

fn default_cooldown_rate() -> u32 {
    2
}

fn default_cooldown_per() -> f64 {
    4.0
}

fn default_prefix() -> String {
    "n!".to_string()
}

fn default_case_insensitive() -> bool {
    true
}

// =============================================================================
// Logging
// =============================================================================

/// Logging configuration, consumed by [`crate::logging::init_from_config`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default)]
    pub level: LogLevel,

    #[serde(default)]
    pub format: LogFormat,

    #[serde(default)]
    pub output: LogOutput,

    /// Log file, required when `output = "file"`.
    #[serde(default)]
    pub file_path: Option<PathBuf>,

    #[serde(default)]
    pub rotation: LogRotation,

    #[serde(default)]
    pub span_events: SpanEventConfig,

    #[serde(default)]
    pub thread_ids: bool,

    /// Include file name and line number.
    #[serde(default)]
    pub file_location: bool,

    /// Per-target levels, e.g. `neo_framework = "debug"`.
    #[serde(default)]
    pub filters: HashMap<String, LogLevel>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }

    pub fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Full,
    Pretty,
    /// Requires the `json-log` feature.
    #[cfg(feature = "json-log")]
    Json,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
    File,
}

/// How often the log file is rotated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogRotation {
    #[default]
    Never,
    Hourly,
    Daily,
}

/// Which span lifecycle events are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanEventConfig {
    #[serde(default)]
    pub new: bool,
    #[serde(default)]
    pub enter: bool,
    #[serde(default)]
    pub exit: bool,
    #[serde(default)]
    pub close: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = NeoConfig::default();
        assert_eq!(config.bot.prefix, "n!");
        assert!(config.bot.case_insensitive);
        assert_eq!(config.bot.cooldown.rate, 2);
        assert_eq!(config.bot.cooldown.per(), Duration::from_secs(4));
        assert!(config.bot.owner_ids.is_empty());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert!(config.addons.is_empty());
    }

    #[test]
    fn test_deserialize_partial() {
        let config: NeoConfig = serde_json::from_value(serde_json::json!({
            "bot": {
                "ignored_errors": ["not_found"],
                "owner_ids": [42],
                "cooldown": { "rate": 0 },
            },
            "logging": { "level": "debug", "filters": { "neo_core": "trace" } },
            "addons": ["greeter"],
            "addon_config": { "greeter": { "greeting": "hi" } },
        }))
        .unwrap();

        assert_eq!(config.bot.prefix, "n!");
        assert_eq!(config.bot.ignored_errors, vec!["not_found"]);
        assert_eq!(config.bot.owner_ids, vec![42]);
        assert!(!config.bot.cooldown.is_enabled());
        assert_eq!(config.bot.cooldown.per_secs, 4.0);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.filters["neo_core"], LogLevel::Trace);
        assert_eq!(config.addon_config["greeter"]["greeting"], "hi");
    }
}
