//! Runtime error types.

use neo_core::{PatchError, RecordError, StoreError};
use neo_framework::AddonError;
use thiserror::Error;

pub use crate::config::{ConfigError, ConfigResult};

/// Errors that can occur during runtime operations.
#[derive(Error, Debug)]
pub enum RuntimeError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Applying the behaviour patches failed; none of them is in effect.
    #[error("Patch error: {0}")]
    Patch(#[from] PatchError),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Addon error: {0}")]
    Addon(#[from] AddonError),

    /// `addons` names an addon no factory was registered for.
    #[error("No addon registered under the name '{0}'")]
    UnknownAddon(String),

    #[error("Runtime is already running")]
    AlreadyRunning,

    #[error("Runtime is not running")]
    NotRunning,
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
