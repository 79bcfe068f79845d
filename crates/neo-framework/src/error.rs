//! Error types for the neo framework.

use std::time::Duration;

use neo_core::BoxError;
use thiserror::Error;

// =============================================================================
// Addon Errors
// =============================================================================

/// Errors raised by [`AddonManager`](crate::manager::AddonManager) operations.
#[derive(Debug, Error)]
pub enum AddonError {
    /// No loaded addon has this name.
    #[error("addon '{0}' is not loaded")]
    NotLoaded(String),

    /// An addon with this name is already loaded.
    #[error("addon '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// `merge` was asked to merge an addon into itself.
    #[error("cannot merge addon '{0}' into itself")]
    SelfMerge(String),

    /// The addon's `on_load` hook failed; the addon was not registered.
    #[error("addon '{name}' failed to load: {source}")]
    LoadFailed {
        /// Addon name.
        name: String,
        /// Error returned by `on_load`.
        #[source]
        source: BoxError,
    },

    /// A receiver returned an error.
    #[error("receiver for '{event}' on addon '{addon}' failed: {source}")]
    Receiver {
        /// Addon name.
        addon: String,
        /// Event name.
        event: String,
        /// Error returned by the receiver.
        #[source]
        source: BoxError,
    },
}

// =============================================================================
// Command Errors
// =============================================================================

/// Errors produced while resolving or running a command.
#[derive(Debug, Clone, Error)]
pub enum CommandError {
    /// No command matches the invoked name.
    #[error("command '{0}' not found")]
    NotFound(String),

    /// A group without its own handler was invoked without a subcommand.
    #[error("command '{0}' requires a subcommand")]
    MissingSubcommand(String),

    /// A required argument was not supplied.
    #[error("missing required argument '{0}'")]
    MissingArgument(String),

    /// An argument could not be converted.
    #[error("bad argument '{name}': {message}")]
    BadArgument {
        /// Argument name.
        name: String,
        /// Conversion error message.
        message: String,
    },

    /// The addon owning the command is no longer loaded.
    #[error("addon '{0}' owning this command is unavailable")]
    OwnerUnavailable(String),

    /// The handler failed.
    #[error("{0}")]
    Failed(String),

    /// The author used up their command budget for the current window.
    #[error("You are on cooldown. Try again in {:.2}s", .retry_after.as_secs_f64())]
    Cooldown { retry_after: Duration },
}

impl CommandError {
    /// Every value [`kind`](Self::kind) can return.
    pub const KINDS: [&'static str; 7] = [
        "not_found",
        "missing_subcommand",
        "missing_argument",
        "bad_argument",
        "owner_unavailable",
        "failed",
        "cooldown",
    ];

    pub fn missing_argument(name: impl Into<String>) -> Self {
        Self::MissingArgument(name.into())
    }

    pub fn bad_argument(name: impl Into<String>, message: impl ToString) -> Self {
        Self::BadArgument {
            name: name.into(),
            message: message.to_string(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Stable identifier of the error kind, as listed in `bot.ignored_errors`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::MissingSubcommand(_) => "missing_subcommand",
            Self::MissingArgument(_) => "missing_argument",
            Self::BadArgument { .. } => "bad_argument",
            Self::OwnerUnavailable(_) => "owner_unavailable",
            Self::Failed(_) => "failed",
            Self::Cooldown { .. } => "cooldown",
        }
    }
}

// =============================================================================
// Event Argument Errors
// =============================================================================

/// Errors returned when reading positional event arguments.
#[derive(Debug, Clone, Error)]
pub enum ArgError {
    /// Fewer arguments were supplied than requested.
    #[error("event argument {index} is missing")]
    Missing {
        /// Requested position.
        index: usize,
    },

    /// The argument at `index` has another type.
    #[error("event argument {index} is not a {expected}")]
    TypeMismatch {
        /// Requested position.
        index: usize,
        /// Requested type name.
        expected: &'static str,
    },
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for addon management.
pub type AddonResult<T> = Result<T, AddonError>;

/// Result type for command handlers and resolution.
pub type CommandResult<T = ()> = Result<T, CommandError>;

/// Result type returned by receivers and listeners.
pub type HandlerResult = Result<(), BoxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_error_kinds() {
        assert_eq!(CommandError::missing_argument("text").kind(), "missing_argument");
        assert_eq!(CommandError::bad_argument("n", "invalid digit").kind(), "bad_argument");
        assert_eq!(CommandError::NotFound("x".into()).kind(), "not_found");
        assert!(CommandError::KINDS.contains(&CommandError::failed("x").kind()));

        let cooldown = CommandError::Cooldown {
            retry_after: Duration::from_millis(2500),
        };
        assert_eq!(cooldown.kind(), "cooldown");
        assert!(CommandError::KINDS.contains(&cooldown.kind()));
        assert_eq!(cooldown.to_string(), "You are on cooldown. Try again in 2.50s");
    }

    #[test]
    fn test_display() {
        assert_eq!(
            CommandError::bad_argument("count", "invalid digit found in string").to_string(),
            "bad argument 'count': invalid digit found in string"
        );
        assert_eq!(
            AddonError::SelfMerge("greeter".into()).to_string(),
            "cannot merge addon 'greeter' into itself"
        );
    }
}
