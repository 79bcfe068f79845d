//! # Neo
//!
//! A small, addon-based chat bot core.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐  messages  ┌──────────────┐────▶ Addon "greeter" (commands, receivers)
//! │   Gateway   │───────────▶│ AddonManager │────▶ Addon "todos"
//! │  (client)   │   events   └──────────────┘────▶ ...
//! └─────────────┘                   │
//!        │                          ▼ consults
//!        │                   ┌────────────┐
//!        │                   │ Behaviours │◀── patches applied at startup
//!        ▼                   └────────────┘
//! ┌─────────────┐  setters   ┌─────────────┐
//! │   Records   │───────────▶│ RecordStore │
//! └─────────────┘            └─────────────┘
//! ```
//!
//! - **Runtime**: configuration, logging, startup and shutdown
//! - **Addons**: feature modules owning commands, listeners and receivers
//! - **Records**: per-user and per-server settings persisted on assignment
//! - **Patches**: replaceable behaviours, applied once and reverted as a unit
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use neo::prelude::*;
//!
//! #[derive(Default)]
//! struct Greeter;
//!
//! #[async_trait]
//! impl Addon for Greeter {
//!     const NAME: &'static str = "greeter";
//!
//!     fn commands(self: Arc<Self>) -> Vec<Command> {
//!         vec![Command::new("ping").handler(|_inv| async { Ok(()) })]
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let runtime = NeoRuntime::builder().addon(Greeter::default).build()?;
//!     runtime.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - `json-log`: JSON log output

pub use neo_core as core;
pub use neo_framework as framework;
pub use neo_runtime as runtime;

pub use neo_framework::event_args;

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use neo::prelude::*;
/// ```
pub mod prelude {
    // Runtime - main entry point
    pub use neo_runtime::{NeoConfig, NeoRuntime, RuntimeBuilder, RuntimeError, RuntimeResult};

    // Addon system
    pub use neo_framework::async_trait;
    pub use neo_framework::{
        Addon, AddonContext, AddonManager, AddonRef, BoxFuture, Command, CommandError,
        CommandResult, EventArgs, HandlerResult, Invocation, Listener, Receivers,
    };

    // Records and patches
    pub use neo_core::record::{MemoryStore, ServerConfig, UserProfile};
    pub use neo_core::{BoxError, DecayingMap, DecayingSet, HookTable, Patch, RecordStore};

    pub use std::sync::Arc;
}
