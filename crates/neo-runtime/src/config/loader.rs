//! Configuration loader using figment.
//!
//! # Configuration Priority (lowest to highest)
//!
//! 1. Built-in defaults
//! 2. Profile-specific file (`neo.{profile}.toml`)
//! 3. Main file (`neo.toml`, or `config.toml`)
//! 4. Environment variables (`NEO_*`)
//! 5. Programmatic merges
//!
//! # Environment Variable Mapping
//!
//! Variables use the `NEO_` prefix with `__` separating nested keys:
//!
//! - `NEO_BOT__PREFIX=?` → `bot.prefix = "?"`
//! - `NEO_LOGGING__LEVEL=debug` → `logging.level = "debug"`
//! - `NEO_ADDON_CONFIG__GREETER__GREETING=hi` → `addon_config.greeter.greeting = "hi"`
//!
//! # Example
//!
//! ```rust,ignore
//! use neo_runtime::config::ConfigLoader;
//!
//! let config = ConfigLoader::new()
//!     .profile("production")
//!     .file("./config/neo.toml")
//!     .load()?;
//! ```

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use tracing::{debug, info, trace, warn};

use super::error::{ConfigError, ConfigResult};
use super::schema::NeoConfig;

const ENV_PREFIX: &str = "NEO_";
const FILE_NAMES: [&str; 2] = ["neo.toml", "config.toml"];

/// Configuration profile for environment-specific settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Profile {
    #[default]
    Development,
    Production,
    Custom(String),
}

impl Profile {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Parses a profile name; `prod` and `dev` are accepted as short forms.
    pub fn parse(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    /// Reads `NEO_PROFILE`, defaulting to Development.
    pub fn from_env() -> Self {
        std::env::var("NEO_PROFILE")
            .map(|p| Self::parse(&p))
            .unwrap_or_default()
    }
}

impl std::fmt::Display for Profile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Layered configuration loader.
pub struct ConfigLoader {
    /// Programmatic sources, merged last.
    overrides: Figment,
    profile: Profile,
    search_paths: Vec<PathBuf>,
    load_env: bool,
    /// Specific config file to load (overrides search).
    config_file: Option<PathBuf>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self {
            overrides: Figment::new(),
            profile: Profile::from_env(),
            search_paths: Vec::new(),
            load_env: true,
            config_file: None,
        }
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.profile = Profile::parse(profile.as_ref());
        self
    }

    /// Adds a directory searched for `neo.toml`.
    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.search_paths.push(path.as_ref().to_path_buf());
        self
    }

    pub fn with_current_dir(self) -> Self {
        match std::env::current_dir() {
            Ok(cwd) => self.search_path(cwd),
            Err(_) => self,
        }
    }

    /// Adds `<user config dir>/neo` to the search paths.
    pub fn with_user_config_dir(self) -> Self {
        match dirs::config_dir() {
            Some(dir) => self.search_path(dir.join("neo")),
            None => self,
        }
    }

    /// Loads exactly this file instead of searching.
    pub fn file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_env(mut self) -> Self {
        self.load_env = true;
        self
    }

    pub fn without_env(mut self) -> Self {
        self.load_env = false;
        self
    }

    /// Merges a whole configuration over every other source.
    pub fn merge(mut self, config: NeoConfig) -> Self {
        self.overrides = self.overrides.merge(Serialized::defaults(config));
        self
    }

    /// Merges an inline TOML document over every other source.
    pub fn merge_toml(mut self, toml: &str) -> Self {
        self.overrides = self.overrides.merge(Toml::string(toml));
        self
    }

    /// Loads and returns the configuration.
    pub fn load(self) -> ConfigResult<NeoConfig> {
        let profile = self.profile.clone();
        let config: NeoConfig = self.build_figment()?.extract()?;

        debug!(
            profile = %profile,
            logging_level = %config.logging.level,
            addons = config.addons.len(),
            "Configuration loaded"
        );
        Ok(config)
    }

    fn build_figment(self) -> ConfigResult<Figment> {
        let mut figment = Figment::from(Serialized::defaults(NeoConfig::default()));

        match &self.config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::FileNotFound(path.clone()));
                }
                let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
                if ext != "toml" {
                    return Err(ConfigError::UnsupportedFormat(ext.to_string()));
                }
                info!(path = %path.display(), "Loading configuration file");
                figment = figment.merge(Toml::file(path));
            }
            None => figment = self.load_config_files(figment),
        }

        if self.load_env {
            trace!("Loading environment variables with NEO_ prefix");
            figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));
        }

        Ok(figment.merge(self.overrides))
    }

    fn resolve_search_paths(&self) -> Vec<PathBuf> {
        if !self.search_paths.is_empty() {
            return self.search_paths.clone();
        }
        let mut paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            paths.push(cwd);
        }
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join("neo"));
        }
        paths
    }

    /// Merges the profile file and then the main file of the first search
    /// path that has a main file.
    fn load_config_files(&self, mut figment: Figment) -> Figment {
        for dir in self.resolve_search_paths() {
            for name in FILE_NAMES {
                let base = dir.join(name);
                if !base.exists() {
                    continue;
                }

                let stem = name.trim_end_matches(".toml");
                let profiled = dir.join(format!("{stem}.{}.toml", self.profile));
                if profiled.exists() {
                    debug!(path = %profiled.display(), "Loading profile-specific config");
                    figment = figment.merge(Toml::file(profiled));
                }

                info!(path = %base.display(), "Loading configuration file");
                return figment.merge(Toml::file(base));
            }
        }

        warn!("No configuration file found, using defaults");
        figment
    }
}

/// Loads the configuration from the default locations.
pub fn load_config() -> ConfigResult<NeoConfig> {
    ConfigLoader::new().load()
}

/// Loads the configuration from `path`, with environment overrides.
pub fn load_config_from_file<P: AsRef<Path>>(path: P) -> ConfigResult<NeoConfig> {
    ConfigLoader::new().file(path).load()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    fn isolated() -> ConfigLoader {
        // A search path without config files keeps the host's files out.
        ConfigLoader::new()
            .without_env()
            .search_path(std::env::temp_dir().join("neo-config-test-empty"))
    }

    #[test]
    fn test_default_config() {
        let config = isolated().load().unwrap();
        assert_eq!(config.logging.level.as_str(), "info");
        assert_eq!(config.bot.prefix, "n!");
    }

    #[test]
    fn test_inline_toml_overrides_defaults() {
        let config = isolated()
            .merge_toml(
                r#"
                addons = ["greeter", "todos"]

                [bot]
                prefix = "?"

                [logging]
                level = "warn"

                [addon_config.greeter]
                greeting = "hello"
                "#,
            )
            .load()
            .unwrap();

        assert_eq!(config.bot.prefix, "?");
        assert!(config.bot.case_insensitive);
        assert_eq!(config.logging.level, LogLevel::Warn);
        assert_eq!(config.addons, vec!["greeter", "todos"]);
        assert_eq!(config.addon_config["greeter"]["greeting"], "hello");
    }

    #[test]
    fn test_missing_file() {
        let err = isolated().file("/nonexistent/neo.toml").load().unwrap_err();
        assert!(matches!(err, ConfigError::FileNotFound(_)));
    }

    #[test]
    fn test_bad_value_is_parse_error() {
        let err = isolated()
            .merge_toml("[logging]\nlevel = \"loud\"")
            .load()
            .unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_profile_parse() {
        assert_eq!(Profile::parse("prod"), Profile::Production);
        assert_eq!(Profile::parse("DEV"), Profile::Development);
        assert_eq!(Profile::parse("staging").as_str(), "staging");
    }
}
