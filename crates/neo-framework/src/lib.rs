//! # Neo Framework
//!
//! The addon layer of the neo bot.
//!
//! This layer provides:
//! - The [`Addon`] trait and the [`AddonManager`] that loads, unloads and
//!   merges addons
//! - Command trees with per-node ownership ([`Command`], [`CommandRegistry`])
//! - Event receivers and listeners ([`Receivers`], [`Listener`])
//! - Patchable behaviours consulted on every command call ([`Behaviours`])
//!
//! Persistence and the decaying containers live in `neo-core`; this crate
//! only depends on its hook table.

pub mod addon;
pub mod behaviour;
pub mod command;
pub mod error;
pub mod event;
pub mod listener;
pub mod manager;

pub use async_trait::async_trait;
pub use futures::future::BoxFuture;

pub use addon::{Addon, AddonContext, AddonRef, AddonState, ErasedAddon, Receivers, downcast};
pub use behaviour::Behaviours;
pub use command::{Command, CommandRegistry, Invocation};
pub use error::{AddonError, AddonResult, ArgError, CommandError, CommandResult, HandlerResult};
pub use event::EventArgs;
pub use listener::{Listener, ListenerRegistry};
pub use manager::AddonManager;
