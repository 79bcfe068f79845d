//! Neo Runtime - Orchestration layer for the neo bot.
//!
//! This crate provides:
//! - Layered configuration (`neo.toml`, profiles, `NEO_*` variables)
//! - Logging setup
//! - The stock behaviour patches
//! - The per-user command cooldown
//! - Runtime orchestration (`NeoRuntime`)
//!
//! ```ignore
//! use neo_runtime::NeoRuntime;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = NeoRuntime::builder()
//!         .addon(Greeter::default)
//!         .build()?;
//!
//!     // Run until Ctrl+C
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Startup
//!
//! `start` applies the behaviour patches, loads the `profiles` and
//! `servers` records, then loads the addons listed under `addons` in
//! configuration order (every registered addon when the list is empty).
//! `stop` undoes all three.

pub mod config;
pub mod cooldown;
pub mod error;
pub mod logging;
pub mod patches;
pub mod runtime;

// Re-exports
pub use config::{ConfigError, ConfigLoader, ConfigResult, NeoConfig, Profile};
pub use cooldown::CommandCooldown;
pub use error::{RuntimeError, RuntimeResult};
pub use logging::{LoggingBuilder, SpanEvents};
pub use patches::{stock_patches, user_facing_message};
pub use runtime::{NeoRuntime, RuntimeBuilder};

/// Prelude for bot binaries.
pub mod prelude {
    pub use crate::config::{BotConfig, LoggingConfig, NeoConfig};
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::runtime::{NeoRuntime, RuntimeBuilder};

    pub use tracing::{debug, error, info, trace, warn};
}
