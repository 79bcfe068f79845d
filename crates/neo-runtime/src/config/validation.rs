//! Configuration validation utilities.

use std::collections::HashSet;

use neo_framework::CommandError;

use super::error::{ConfigError, ConfigResult};
use super::schema::{BotConfig, LogOutput, LoggingConfig, NeoConfig};

/// Validates the entire configuration.
pub fn validate_config(config: &NeoConfig) -> ConfigResult<()> {
    validate_bot_config(&config.bot)?;
    validate_logging_config(&config.logging)?;
    validate_addons(config)?;
    Ok(())
}

fn validate_bot_config(bot: &BotConfig) -> ConfigResult<()> {
    if bot.prefix.is_empty() {
        return Err(ConfigError::missing_field("bot.prefix"));
    }
    if bot.prefix.chars().any(char::is_whitespace) {
        return Err(ConfigError::validation("Prefix cannot contain whitespace"));
    }

    for kind in &bot.ignored_errors {
        if !CommandError::KINDS.contains(&kind.as_str()) {
            return Err(ConfigError::validation(format!(
                "Unknown error kind in bot.ignored_errors: {kind}. Valid values are: {:?}",
                CommandError::KINDS
            )));
        }
    }

    let per = bot.cooldown.per_secs;
    if bot.cooldown.is_enabled() && !(per.is_finite() && per > 0.0) {
        return Err(ConfigError::validation(format!(
            "bot.cooldown.per_secs must be a positive number of seconds, got {per}"
        )));
    }
    Ok(())
}

fn validate_logging_config(logging: &LoggingConfig) -> ConfigResult<()> {
    if logging.output == LogOutput::File && logging.file_path.is_none() {
        return Err(ConfigError::missing_field("logging.file_path"));
    }
    for target in logging.filters.keys() {
        if target.is_empty() || target.contains(char::is_whitespace) {
            return Err(ConfigError::validation(format!(
                "Invalid log filter target: '{target}'"
            )));
        }
    }
    Ok(())
}

fn validate_addons(config: &NeoConfig) -> ConfigResult<()> {
    let mut seen = HashSet::new();
    for name in &config.addons {
        if name.is_empty() {
            return Err(ConfigError::validation("Addon name cannot be empty"));
        }
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateAddon(name.clone()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(validate_config(&NeoConfig::default()).is_ok());
    }

    #[test]
    fn test_prefix() {
        let mut config = NeoConfig::default();
        config.bot.prefix = String::new();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::MissingField { .. })
        ));

        config.bot.prefix = "n !".into();
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));
    }

    #[test]
    fn test_ignored_error_kinds() {
        let mut config = NeoConfig::default();
        config.bot.ignored_errors = vec!["not_found".into(), "bad_argument".into()];
        assert!(validate_config(&config).is_ok());

        config.bot.ignored_errors.push("CommandNotFound".into());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_cooldown_window() {
        let mut config = NeoConfig::default();
        config.bot.cooldown.per_secs = 0.0;
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::ValidationError { .. })
        ));

        config.bot.cooldown.per_secs = f64::NAN;
        assert!(validate_config(&config).is_err());

        // A disabled limit has no window to check.
        config.bot.cooldown.rate = 0;
        assert!(validate_config(&config).is_ok());

        config.bot.cooldown = Default::default();
        config.bot.ignored_errors = vec!["cooldown".into()];
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_duplicate_addon() {
        let mut config = NeoConfig::default();
        config.addons = vec!["greeter".into(), "todos".into(), "greeter".into()];
        assert!(matches!(
            validate_config(&config),
            Err(ConfigError::DuplicateAddon(name)) if name == "greeter"
        ));
    }

    #[test]
    fn test_file_output_needs_path() {
        let mut config = NeoConfig::default();
        config.logging.output = LogOutput::File;
        assert!(validate_config(&config).is_err());

        config.logging.file_path = Some(PathBuf::from("logs/neo.log"));
        assert!(validate_config(&config).is_ok());
    }
}
