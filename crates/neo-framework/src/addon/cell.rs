use std::any::Any;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use neo_core::BoxError;

use super::{Addon, AddonContext, Receivers};
use crate::command::Command;
use crate::error::HandlerResult;
use crate::event::EventArgs;
use crate::listener::Listener;

/// Shared handle to a loaded addon of any type.
pub type AddonRef = Arc<dyn ErasedAddon>;

/// Object-safe view of an [`Addon`], used by the manager and registries.
#[async_trait]
pub trait ErasedAddon: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// The addon instance, for downcasting.
    fn instance(&self) -> Arc<dyn Any + Send + Sync>;

    /// Events this addon declares receivers for, sorted.
    fn receiver_events(&self) -> Vec<&'static str>;

    fn has_receiver(&self, event: &str) -> bool;

    /// Starts the receiver for `event`, or returns `None` if there is none.
    fn receive<'a>(&'a self, event: &str, args: &'a EventArgs)
    -> Option<BoxFuture<'a, HandlerResult>>;

    fn commands(&self) -> Vec<Command>;

    fn listeners(&self) -> Vec<Listener>;

    async fn on_load(&self, ctx: &AddonContext) -> Result<(), BoxError>;

    async fn on_unload(&self);
}

/// Pairs an addon instance with its receiver table.
pub struct AddonCell<A: Addon> {
    addon: Arc<A>,
    receivers: Receivers<A>,
}

impl<A: Addon> AddonCell<A> {
    /// Wraps `addon`, building its receiver table.
    pub fn new(addon: A) -> Self {
        Self {
            addon: Arc::new(addon),
            receivers: A::receivers(),
        }
    }

    /// Wraps `addon` and erases its type.
    pub fn erase(addon: A) -> AddonRef {
        Arc::new(Self::new(addon))
    }

    pub fn addon(&self) -> &Arc<A> {
        &self.addon
    }
}

#[async_trait]
impl<A: Addon> ErasedAddon for AddonCell<A> {
    fn name(&self) -> &'static str {
        A::NAME
    }

    fn instance(&self) -> Arc<dyn Any + Send + Sync> {
        Arc::clone(&self.addon) as Arc<dyn Any + Send + Sync>
    }

    fn receiver_events(&self) -> Vec<&'static str> {
        self.receivers.events()
    }

    fn has_receiver(&self, event: &str) -> bool {
        self.receivers.contains(event)
    }

    fn receive<'a>(
        &'a self,
        event: &str,
        args: &'a EventArgs,
    ) -> Option<BoxFuture<'a, HandlerResult>> {
        self.receivers
            .get(event)
            .map(|receiver| receiver(self.addon.as_ref(), args))
    }

    fn commands(&self) -> Vec<Command> {
        A::commands(Arc::clone(&self.addon))
    }

    fn listeners(&self) -> Vec<Listener> {
        A::listeners(Arc::clone(&self.addon))
    }

    async fn on_load(&self, ctx: &AddonContext) -> Result<(), BoxError> {
        self.addon.on_load(ctx).await
    }

    async fn on_unload(&self) {
        self.addon.on_unload().await;
    }
}

impl<A: Addon> fmt::Debug for AddonCell<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddonCell")
            .field("name", &A::NAME)
            .field("receivers", &self.receivers)
            .finish()
    }
}

/// Returns the concrete addon behind `addon` if it is an `A`.
pub fn downcast<A: Addon>(addon: &AddonRef) -> Option<Arc<A>> {
    addon.instance().downcast::<A>().ok()
}
