//! Addon lifecycle management and event dispatch.
//!
//! [`AddonManager`] is the central owner of all loaded addons. It:
//!
//! - Loads addons (running `on_load`, then registering their commands and
//!   listeners) and unloads them again.
//! - Assigns command ownership: [`add_command`](AddonManager::add_command)
//!   walks a command tree and makes the addon the owner of every node.
//! - Merges one addon into another: the donor leaves the manager and its
//!   commands and listeners are re-registered under the target.
//! - Dispatches events to receivers ([`dispatch`](AddonManager::dispatch),
//!   [`broadcast`](AddonManager::broadcast)) and listeners
//!   ([`emit`](AddonManager::emit)), and routes command invocations.
//!
//! # Example
//!
//! ```rust,ignore
//! let manager = AddonManager::new(Behaviours::new(), HashMap::new());
//! manager.load(Greeter::default()).await?;
//! manager.load(Welcome::default()).await?;
//! manager.merge("greeter", "welcome").await?;
//!
//! manager.broadcast("member_join", &event_args!["user123"]).await;
//! manager.invoke("greet user123", EventArgs::new()).await?;
//! ```
//!
//! Locks are never held across an `.await`; handles are cloned out first.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::addon::{Addon, AddonCell, AddonContext, AddonRef, AddonState, downcast};
use crate::behaviour::Behaviours;
use crate::command::{Command, CommandRegistry, Invocation, Resolved};
use crate::error::{AddonError, AddonResult, CommandError, CommandResult};
use crate::event::EventArgs;
use crate::listener::{Listener, ListenerRegistry};

// =============================================================================
// LoadedAddon (internal)
// =============================================================================

struct LoadedAddon {
    handle: AddonRef,
    /// Cancelled when the addon leaves the manager.
    token: CancellationToken,
}

// =============================================================================
// AddonManager
// =============================================================================

/// Central manager for addon lifecycle, registration and dispatch.
///
/// # Addon configuration
///
/// `addon_configs` maps addon name to the JSON section handed to the addon
/// through [`AddonContext::get_config`]. Addons without a section get an
/// empty object.
pub struct AddonManager {
    addons: RwLock<Vec<LoadedAddon>>,
    commands: CommandRegistry,
    listeners: ListenerRegistry,
    behaviours: Behaviours,
    addon_configs: HashMap<String, Value>,
    root: CancellationToken,
}

impl AddonManager {
    pub fn new(behaviours: Behaviours, addon_configs: HashMap<String, Value>) -> Self {
        Self {
            addons: RwLock::new(Vec::new()),
            commands: CommandRegistry::new(),
            listeners: ListenerRegistry::new(),
            behaviours,
            addon_configs,
            root: CancellationToken::new(),
        }
    }

    /// Ties every addon token to `parent`.
    pub fn with_parent_token(mut self, parent: &CancellationToken) -> Self {
        self.root = parent.child_token();
        self
    }

    // ─── Loading ─────────────────────────────────────────────────────────────

    /// Loads `addon`.
    pub async fn load<A: Addon>(&self, addon: A) -> AddonResult<AddonRef> {
        self.load_erased(AddonCell::erase(addon)).await
    }

    /// Loads an already wrapped addon.
    ///
    /// `on_load` runs first; if it fails nothing is registered. Afterwards
    /// the addon's commands and listeners are registered under its name.
    pub async fn load_erased(&self, handle: AddonRef) -> AddonResult<AddonRef> {
        let name = handle.name();
        if self.is_loaded(name) {
            return Err(AddonError::AlreadyLoaded(name.to_owned()));
        }

        let config = self
            .addon_configs
            .get(name)
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::default()));
        let token = self.root.child_token();
        let ctx = AddonContext::new(name, Arc::new(config), token.clone());

        if let Err(source) = handle.on_load(&ctx).await {
            token.cancel();
            error!(addon = %name, error = %source, "Addon failed to load");
            return Err(AddonError::LoadFailed {
                name: name.to_owned(),
                source,
            });
        }

        {
            let mut addons = self.addons.write();
            if addons.iter().any(|e| e.handle.name() == name) {
                token.cancel();
                return Err(AddonError::AlreadyLoaded(name.to_owned()));
            }
            addons.push(LoadedAddon {
                handle: Arc::clone(&handle),
                token,
            });
        }

        let commands = handle.commands();
        let listeners = handle.listeners();
        let (command_count, listener_count) = (commands.len(), listeners.len());
        for command in commands {
            self.register_command(name, command);
        }
        for listener in listeners {
            let event = listener.name().to_owned();
            self.listeners.register(&event, name, listener);
        }

        info!(
            addon     = %name,
            receivers = handle.receiver_events().len(),
            commands  = command_count,
            listeners = listener_count,
            "Addon loaded"
        );
        Ok(handle)
    }

    /// Unloads the named addon.
    ///
    /// The addon stops receiving events before its `on_unload` hook runs.
    pub async fn unload(&self, name: &str) -> AddonResult<()> {
        let entry = self.take(name)?;
        let commands = self.commands.remove_owner(name);
        let listeners = self.listeners.remove_owner(name);
        entry.token.cancel();
        entry.handle.on_unload().await;

        info!(
            addon     = %name,
            commands  = commands.len(),
            listeners = listeners.len(),
            "Addon unloaded"
        );
        Ok(())
    }

    /// Unloads every addon in reverse load order.
    pub async fn unload_all(&self) {
        for name in self.loaded().into_iter().rev() {
            if let Err(e) = self.unload(name).await {
                warn!(addon = %name, error = %e, "Addon vanished during unload");
            }
        }
    }

    fn take(&self, name: &str) -> AddonResult<LoadedAddon> {
        let mut addons = self.addons.write();
        let pos = addons
            .iter()
            .position(|e| e.handle.name() == name)
            .ok_or_else(|| AddonError::NotLoaded(name.to_owned()))?;
        Ok(addons.remove(pos))
    }

    // ─── Registration ────────────────────────────────────────────────────────

    /// Registers `command` under `addon`.
    ///
    /// The addon becomes the owner of the command and all of its
    /// subcommands, at any depth. A command already registered under the
    /// same name is replaced, whichever addon owned it.
    pub fn add_command(&self, addon: &str, command: Command) -> AddonResult<()> {
        let owner = self.loaded_name(addon)?;
        self.register_command(owner, command);
        Ok(())
    }

    fn register_command(&self, owner: &'static str, mut command: Command) {
        command.reparent(owner);
        let name = command.name().to_owned();
        if let Some(previous) = self.commands.add(command) {
            debug!(
                command = %name,
                from    = previous.owner().unwrap_or("<none>"),
                to      = owner,
                "Command re-registered"
            );
        }
    }

    /// Binds `listener` to `addon` and registers it for `event`.
    ///
    /// `event` defaults to the listener's name. Registering the same
    /// listener again for the same event replaces the earlier registration.
    pub fn add_listener(
        &self,
        addon: &str,
        listener: Listener,
        event: Option<&str>,
    ) -> AddonResult<()> {
        let owner = self.loaded_name(addon)?;
        let event = event.unwrap_or(listener.name()).to_owned();
        if self.listeners.register(&event, owner, listener) {
            debug!(addon = owner, event = %event, "Listener re-registered");
        }
        Ok(())
    }

    /// Merges addon `from` into addon `into`.
    ///
    /// `from` leaves the manager first, then its commands and listeners are
    /// re-registered under `into`. Receivers belong to the addon type and
    /// are not transferred. The donor's token is cancelled and its
    /// `on_unload` hook runs.
    pub async fn merge(&self, into: &str, from: &str) -> AddonResult<()> {
        if into == from {
            return Err(AddonError::SelfMerge(into.to_owned()));
        }
        let target = self.loaded_name(into)?;
        let donor = self.take(from)?;

        let commands = self.commands.remove_owner(from);
        let listeners = self.listeners.remove_owner(from);
        let (command_count, listener_count) = (commands.len(), listeners.len());

        for command in commands {
            self.register_command(target, command);
        }
        for (event, listener) in listeners {
            self.listeners.register(&event, target, listener);
        }

        donor.token.cancel();
        donor.handle.on_unload().await;

        info!(
            into      = %target,
            from      = %from,
            commands  = command_count,
            listeners = listener_count,
            "Addons merged"
        );
        Ok(())
    }

    // ─── Dispatch ────────────────────────────────────────────────────────────

    /// Runs `addon`'s receiver for `event`.
    ///
    /// Returns `Ok(false)` when the addon declares no receiver for `event`.
    pub async fn dispatch(&self, addon: &str, event: &str, args: &EventArgs) -> AddonResult<bool> {
        let handle = self
            .get(addon)
            .ok_or_else(|| AddonError::NotLoaded(addon.to_owned()))?;
        let Some(receiver) = handle.receive(event, args) else {
            return Ok(false);
        };
        receiver.await.map_err(|source| AddonError::Receiver {
            addon: addon.to_owned(),
            event: event.to_owned(),
            source,
        })?;
        Ok(true)
    }

    /// Runs the `event` receiver of every loaded addon declaring one, in
    /// load order. Failures are logged and do not stop the broadcast.
    ///
    /// Returns the number of receivers run.
    pub async fn broadcast(&self, event: &str, args: &EventArgs) -> usize {
        let targets: Vec<AddonRef> = self
            .addons
            .read()
            .iter()
            .filter(|e| e.handle.has_receiver(event))
            .map(|e| Arc::clone(&e.handle))
            .collect();

        let mut invoked = 0;
        for handle in targets {
            // Skip addons unloaded by an earlier receiver.
            if !self.is_loaded(handle.name()) {
                continue;
            }
            let Some(receiver) = handle.receive(event, args) else {
                continue;
            };
            invoked += 1;
            if let Err(e) = receiver.await {
                error!(addon = %handle.name(), event, error = %e, "Receiver failed");
            }
        }
        invoked
    }

    /// Runs every listener registered for `event`, each bound to its owner.
    ///
    /// Returns the number of listeners run.
    pub async fn emit(&self, event: &str, args: &EventArgs) -> usize {
        let mut invoked = 0;
        for (owner, listener) in self.listeners.listeners(event) {
            let Some(handle) = self.get(owner) else {
                continue;
            };
            invoked += 1;
            if let Err(e) = listener.call(handle, args.clone()).await {
                error!(
                    addon    = owner,
                    listener = listener.name(),
                    event,
                    error    = %e,
                    "Listener failed"
                );
            }
        }
        invoked
    }

    /// Delivers `event` to listeners, then to receivers.
    pub async fn dispatch_event(&self, event: &str, args: &EventArgs) -> usize {
        let listeners = self.emit(event, args).await;
        let receivers = self.broadcast(event, args).await;
        debug!(event, listeners, receivers, "Event dispatched");
        listeners + receivers
    }

    // ─── Commands ────────────────────────────────────────────────────────────

    /// Resolves `line` to a command and runs it.
    ///
    /// The leading words select the command and its subcommands; the rest
    /// become [`Invocation::args`]. Name matching follows the
    /// case-insensitivity behaviour.
    pub async fn invoke(&self, line: &str, context: EventArgs) -> CommandResult {
        let words: Vec<&str> = line.split_whitespace().collect();
        let Resolved {
            command,
            path,
            consumed,
        } = self
            .commands
            .resolve(&words, self.behaviours.case_insensitive())
            .ok_or_else(|| {
                CommandError::NotFound(words.first().copied().unwrap_or_default().to_owned())
            })?;

        let Some(handler) = command.handler_fn().cloned() else {
            return Err(if command.is_group() {
                CommandError::MissingSubcommand(path)
            } else {
                CommandError::failed(format!("command '{path}' has no handler"))
            });
        };

        let owner_name = command
            .owner()
            .ok_or_else(|| CommandError::OwnerUnavailable(path.clone()))?;
        let owner = self
            .get(owner_name)
            .ok_or_else(|| CommandError::OwnerUnavailable(owner_name.to_owned()))?;

        debug!(command = %path, addon = owner_name, "Invoking command");
        handler(Invocation {
            owner,
            path,
            args: words[consumed..].iter().map(|w| (*w).to_owned()).collect(),
            context,
        })
        .await
    }

    /// Renders `error` for the user, or `None` if it is suppressed.
    pub fn render_error(&self, error: &CommandError) -> Option<String> {
        if self.behaviours.suppresses(error) {
            debug!(kind = error.kind(), "Command error suppressed");
            return None;
        }
        Some(self.behaviours.format_error(error))
    }

    // ─── Queries ─────────────────────────────────────────────────────────────

    pub fn get(&self, name: &str) -> Option<AddonRef> {
        self.addons
            .read()
            .iter()
            .find(|e| e.handle.name() == name)
            .map(|e| Arc::clone(&e.handle))
    }

    /// The loaded addon of type `A`.
    pub fn get_as<A: Addon>(&self) -> Option<Arc<A>> {
        self.get(A::NAME).and_then(|handle| downcast::<A>(&handle))
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.addons.read().iter().any(|e| e.handle.name() == name)
    }

    pub fn state(&self, name: &str) -> AddonState {
        if self.is_loaded(name) {
            AddonState::Loaded
        } else {
            AddonState::Unloaded
        }
    }

    /// Names of the loaded addons, in load order.
    pub fn loaded(&self) -> Vec<&'static str> {
        self.addons.read().iter().map(|e| e.handle.name()).collect()
    }

    fn loaded_name(&self, name: &str) -> AddonResult<&'static str> {
        self.addons
            .read()
            .iter()
            .map(|e| e.handle.name())
            .find(|n| *n == name)
            .ok_or_else(|| AddonError::NotLoaded(name.to_owned()))
    }

    /// Addon name to declared receiver events, for every loaded addon.
    pub fn receiver_table(&self) -> BTreeMap<&'static str, Vec<&'static str>> {
        self.addons
            .read()
            .iter()
            .map(|e| (e.handle.name(), e.handle.receiver_events()))
            .collect()
    }

    pub fn has_receiver(&self, addon: &str, event: &str) -> bool {
        self.get(addon).is_some_and(|h| h.has_receiver(event))
    }

    /// The top-level command registered as `name`.
    pub fn command(&self, name: &str) -> Option<Command> {
        self.commands.get(name)
    }

    /// Names of the top-level commands owned by `addon`, sorted.
    pub fn commands_of(&self, addon: &str) -> Vec<String> {
        self.commands.owned_by(addon)
    }

    /// `(event, listener)` pairs owned by `addon`, sorted.
    pub fn listeners_of(&self, addon: &str) -> Vec<(String, String)> {
        self.listeners.owned_by(addon)
    }

    pub fn command_registry(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn listener_registry(&self) -> &ListenerRegistry {
        &self.listeners
    }

    pub fn behaviours(&self) -> &Behaviours {
        &self.behaviours
    }
}

impl fmt::Debug for AddonManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AddonManager")
            .field("loaded", &self.loaded())
            .field("commands", &self.commands)
            .field("listeners", &self.listeners)
            .finish()
    }
}
