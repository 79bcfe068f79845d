//! Addons: the feature modules of the bot.
//!
//! # Architecture
//!
//! An addon is a plain struct implementing [`Addon`]. It bundles:
//!
//! - **Receivers**: methods run when an event is dispatched to the addon,
//!   declared once per type in [`Addon::receivers`].
//! - **Commands**: a tree of [`Command`]s registered on load.
//! - **Listeners**: [`Listener`]s registered on load, bound to the addon.
//! - Optional **lifecycle hooks** (`on_load`, `on_unload`).
//!
//! The [`AddonManager`](crate::manager::AddonManager) wraps each addon in an
//! [`AddonCell`] and hands out type-erased [`AddonRef`] handles.
//!
//! # Quick start
//!
//! ```rust,ignore
//! struct Greeter;
//!
//! impl Greeter {
//!     fn member_join<'a>(&'a self, args: &'a EventArgs) -> BoxFuture<'a, HandlerResult> {
//!         Box::pin(async move {
//!             let member = args.get::<String>(0)?;
//!             info!(%member, "Member joined");
//!             Ok(())
//!         })
//!     }
//! }
//!
//! #[async_trait]
//! impl Addon for Greeter {
//!     const NAME: &'static str = "greeter";
//!
//!     fn receivers() -> Receivers<Self> {
//!         Receivers::new().on("member_join", Self::member_join)
//!     }
//! }
//! ```

// ─── Submodules ──────────────────────────────────────────────────────────────
mod cell;
mod context;
mod receiver;

// ─── Re-exports from submodules ──────────────────────────────────────────────
pub use cell::{AddonCell, AddonRef, ErasedAddon, downcast};
pub use context::AddonContext;
pub use receiver::{ReceiverFn, Receivers};

use std::sync::Arc;

use async_trait::async_trait;
use neo_core::BoxError;

use crate::command::Command;
use crate::listener::Listener;

/// A feature module.
///
/// Only [`NAME`](Addon::NAME) is required; everything else defaults to empty.
#[async_trait]
pub trait Addon: Send + Sync + Sized + 'static {
    /// Unique name, also the key of the addon's config section.
    const NAME: &'static str;

    /// The receiver table of this addon type.
    fn receivers() -> Receivers<Self> {
        Receivers::new()
    }

    /// Commands registered when the addon loads.
    fn commands(self: Arc<Self>) -> Vec<Command> {
        Vec::new()
    }

    /// Listeners registered when the addon loads.
    fn listeners(self: Arc<Self>) -> Vec<Listener> {
        Vec::new()
    }

    /// Runs before the addon's commands and listeners are registered.
    ///
    /// An error aborts the load.
    async fn on_load(&self, _ctx: &AddonContext) -> Result<(), BoxError> {
        Ok(())
    }

    /// Runs after the addon has left the manager.
    async fn on_unload(&self) {}
}

/// Whether an addon is registered with the manager.
///
/// ```text
/// load()                 ──► Loaded
/// unload() / merged away ──► Unloaded
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddonState {
    Loaded,
    Unloaded,
}
