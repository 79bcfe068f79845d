//! Main runtime orchestration.
//!
//! [`NeoRuntime`] ties the layers together:
//!
//! 1. Applies the behaviour patches (stock, then user) exactly once.
//! 2. Loads the `profiles` and `servers` record caches from the store.
//! 3. Loads the configured addons through their registered factories.
//!
//! Afterwards the embedding gateway client feeds it messages
//! ([`handle_message`](NeoRuntime::handle_message)) and events
//! ([`dispatch`](NeoRuntime::dispatch)).
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use neo_runtime::NeoRuntime;
//!
//! let runtime = NeoRuntime::builder()
//!     .config_file("neo.toml")
//!     .store(Arc::new(PgStore::connect(url).await?))
//!     .addon(Greeter::default)
//!     .addon(Todos::new)
//!     .build()?;
//!
//! runtime.run().await?;
//! ```

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;

use neo_core::record::{MemoryStore, ServerConfig, UserProfile};
use neo_core::{HookTable, Patch, RecordCache, RecordLink, RecordStore, apply_all};
use neo_framework::addon::AddonCell;
use neo_framework::{
    Addon, AddonManager, AddonRef, Behaviours, CommandError, EventArgs, event_args,
};
use tokio::signal;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::config::{ConfigLoader, NeoConfig, validate_config};
use crate::cooldown::CommandCooldown;
use crate::error::{RuntimeError, RuntimeResult};
use crate::logging;
use crate::patches::stock_patches;

type AddonFactory = Box<dyn Fn() -> AddonRef + Send + Sync>;
type PatchFactory = Box<dyn FnOnce(&Arc<HookTable>) -> Patch + Send>;

struct Registration {
    name: &'static str,
    make: AddonFactory,
}

/// The neo runtime.
pub struct NeoRuntime {
    config: NeoConfig,
    /// Cancelled when the process shuts down; abandons pending record writes.
    shutdown: CancellationToken,
    patches: Vec<Patch>,
    manager: AddonManager,
    profiles: RecordCache<UserProfile>,
    servers: RecordCache<ServerConfig>,
    cooldown: CommandCooldown,
    factories: Vec<Registration>,
    running: RwLock<bool>,
}

impl NeoRuntime {
    pub fn builder() -> RuntimeBuilder {
        RuntimeBuilder::new()
    }

    fn assemble(
        config: NeoConfig,
        store: Arc<dyn RecordStore>,
        user_patches: Vec<PatchFactory>,
        factories: Vec<Registration>,
    ) -> Self {
        let shutdown = CancellationToken::new();
        let hooks = Arc::new(HookTable::new());
        let behaviours = Behaviours::with_table(Arc::clone(&hooks));

        let mut patches = stock_patches(&hooks, &config.bot);
        patches.extend(user_patches.into_iter().map(|make| make(&hooks)));

        let link = RecordLink::new(store, shutdown.clone());
        let manager = AddonManager::new(behaviours, config.addon_config.clone())
            .with_parent_token(&shutdown);
        let cooldown = CommandCooldown::new(
            &config.bot.cooldown,
            config.bot.owner_ids.iter().copied(),
            &shutdown,
        );

        info!(
            log_level = %config.logging.level,
            prefix    = %config.bot.prefix,
            addons    = factories.len(),
            patches   = patches.len(),
            "Runtime initialized from configuration"
        );

        Self {
            config,
            shutdown,
            patches,
            manager,
            profiles: RecordCache::new(link.clone()),
            servers: RecordCache::new(link),
            cooldown,
            factories,
            running: RwLock::new(false),
        }
    }

    pub fn config(&self) -> &NeoConfig {
        &self.config
    }

    pub fn manager(&self) -> &AddonManager {
        &self.manager
    }

    pub fn hooks(&self) -> &Arc<HookTable> {
        self.manager.behaviours().hooks()
    }

    pub fn profiles(&self) -> &RecordCache<UserProfile> {
        &self.profiles
    }

    pub fn servers(&self) -> &RecordCache<ServerConfig> {
        &self.servers
    }

    /// Cancelling this token makes [`run`](Self::run) return.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Starts the runtime.
    ///
    /// If any step fails, everything done so far is undone and the runtime
    /// stays stopped.
    pub async fn start(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if *running {
                return Err(RuntimeError::AlreadyRunning);
            }
            *running = true;
        }

        info!("Starting neo runtime");

        if let Err(e) = self.boot().await {
            error!(error = %e, "Runtime failed to start");
            self.teardown().await;
            *self.running.write().await = false;
            return Err(e);
        }

        info!(
            addons   = ?self.manager.loaded(),
            profiles = self.profiles.len(),
            servers  = self.servers.len(),
            "Runtime started"
        );
        Ok(())
    }

    async fn boot(&self) -> RuntimeResult<()> {
        apply_all(&self.patches)?;
        debug!(patches = self.patches.len(), "Behaviour patches applied");

        self.profiles.load_all().await?;
        self.servers.load_all().await?;

        for registration in self.addon_plan()? {
            self.manager.load_erased((registration.make)()).await?;
        }
        Ok(())
    }

    /// The factories to run, in load order.
    ///
    /// An empty `addons` list loads every registered addon.
    fn addon_plan(&self) -> RuntimeResult<Vec<&Registration>> {
        if self.config.addons.is_empty() {
            return Ok(self.factories.iter().collect());
        }
        self.config
            .addons
            .iter()
            .map(|name| {
                self.factories
                    .iter()
                    .find(|r| r.name == name)
                    .ok_or_else(|| RuntimeError::UnknownAddon(name.clone()))
            })
            .collect()
    }

    /// Stops the runtime: unloads every addon, flushes queued record writes
    /// and reverts the patches.
    pub async fn stop(&self) -> RuntimeResult<()> {
        {
            let mut running = self.running.write().await;
            if !*running {
                return Err(RuntimeError::NotRunning);
            }
            *running = false;
        }

        info!("Stopping neo runtime");
        self.teardown().await;
        info!("Runtime stopped");
        Ok(())
    }

    async fn teardown(&self) {
        self.manager.unload_all().await;

        let unflushed = self.profiles.flush_all().await + self.servers.flush_all().await;
        if unflushed > 0 {
            warn!(records = unflushed, "Some record writes were not flushed");
        }

        for patch in self.patches.iter().rev().filter(|p| p.is_applied()) {
            if let Err(e) = patch.revert() {
                warn!(patch = patch.label(), error = %e, "Failed to revert patch");
            }
        }
    }

    /// Runs until Ctrl+C, SIGTERM or the shutdown token is cancelled.
    pub async fn run(&self) -> RuntimeResult<()> {
        self.run_until(self.wait_for_shutdown()).await
    }

    /// Runs until `shutdown` completes.
    ///
    /// The shutdown token is cancelled on return, so the runtime cannot be
    /// started again.
    pub async fn run_until<F>(&self, shutdown: F) -> RuntimeResult<()>
    where
        F: Future<Output = ()>,
    {
        self.start().await?;
        info!("neo is now running");

        shutdown.await;

        let stopped = self.stop().await;
        self.shutdown.cancel();
        stopped
    }

    async fn wait_for_shutdown(&self) {
        tokio::select! {
            _ = self.shutdown.cancelled() => info!("Shutdown requested"),
            _ = os_signal() => {}
        }
    }

    // =========================================================================
    // Records
    // =========================================================================

    /// The profile of `user_id`, created with default settings if missing.
    pub async fn add_profile(&self, user_id: i64) -> RuntimeResult<Arc<UserProfile>> {
        Ok(self.profiles.get_or_insert(user_id).await?)
    }

    pub fn profile(&self, user_id: i64) -> Option<Arc<UserProfile>> {
        self.profiles.get(&user_id)
    }

    /// Deletes the profile and announces `profile_delete` with the user id.
    ///
    /// The event is announced even if the user had no profile.
    pub async fn delete_profile(&self, user_id: i64) -> RuntimeResult<()> {
        self.profiles.delete(&user_id).await?;
        info!(user_id, "Profile deleted");
        self.manager
            .dispatch_event("profile_delete", &event_args![user_id])
            .await;
        Ok(())
    }

    /// The settings of `server_id`, created with default settings if missing.
    pub async fn add_server(&self, server_id: i64) -> RuntimeResult<Arc<ServerConfig>> {
        Ok(self.servers.get_or_insert(server_id).await?)
    }

    pub fn server(&self, server_id: i64) -> Option<Arc<ServerConfig>> {
        self.servers.get(&server_id)
    }

    /// Deletes the server settings and announces `server_delete` with the id.
    pub async fn delete_server(&self, server_id: i64) -> RuntimeResult<()> {
        self.servers.delete(&server_id).await?;
        info!(server_id, "Server deleted");
        self.manager
            .dispatch_event("server_delete", &event_args![server_id])
            .await;
        Ok(())
    }

    /// Deletes the settings of every server not in `known`.
    ///
    /// Returns the ids that were deleted.
    pub async fn prune_servers(&self, known: &HashSet<i64>) -> RuntimeResult<Vec<i64>> {
        let stale: Vec<i64> = self
            .servers
            .keys()
            .into_iter()
            .filter(|id| !known.contains(id))
            .collect();

        for &server_id in &stale {
            self.delete_server(server_id).await?;
        }
        if !stale.is_empty() {
            info!(count = stale.len(), "Pruned servers the bot is no longer in");
        }
        Ok(stale)
    }

    /// The command prefix in `server_id`, or the bot-wide prefix.
    pub fn prefix_for(&self, server_id: Option<i64>) -> String {
        server_id
            .and_then(|id| self.servers.get(&id))
            .map(|server| server.prefix())
            .unwrap_or_else(|| self.config.bot.prefix.clone())
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Delivers a gateway event to listeners and receivers.
    pub async fn dispatch(&self, event: &str, args: &EventArgs) -> usize {
        self.manager.dispatch_event(event, args).await
    }

    /// Strips the prefix in effect, or a mention of the bot, from `content`.
    fn strip_command_prefix<'a>(
        &self,
        server_id: Option<i64>,
        content: &'a str,
    ) -> Option<&'a str> {
        if let Some(user_id) = self.config.bot.user_id {
            for mention in [format!("<@{user_id}> "), format!("<@!{user_id}> ")] {
                if let Some(rest) = content.strip_prefix(mention.as_str()) {
                    return Some(rest);
                }
            }
        }
        content.strip_prefix(self.prefix_for(server_id).as_str())
    }

    /// Runs `content` from `author_id` as a command if it starts with the
    /// prefix in effect.
    ///
    /// Returns the text to reply with, if any: the rendered error of a
    /// failed command unless that kind of error is ignored. Commands count
    /// against the author's cooldown unless the author is an owner.
    pub async fn handle_message(
        &self,
        server_id: Option<i64>,
        author_id: i64,
        content: &str,
        context: EventArgs,
    ) -> Option<String> {
        let line = self.strip_command_prefix(server_id, content)?.trim();
        let name = line.split_whitespace().next()?;

        if let Some(server) = server_id.and_then(|id| self.servers.get(&id))
            && server
                .disabled_commands()
                .iter()
                .any(|disabled| disabled.eq_ignore_ascii_case(name))
        {
            debug!(command = name, server_id, "Command disabled in server");
            return None;
        }

        let exists = self
            .manager
            .command_registry()
            .resolve(&[name], self.manager.behaviours().case_insensitive())
            .is_some();
        let span = info_span!("command", server = ?server_id, author = author_id, command = name);
        let result = if exists && let Err(retry_after) = self.cooldown.hit(author_id) {
            Err(CommandError::Cooldown { retry_after })
        } else {
            self.manager.invoke(line, context).instrument(span).await
        };

        match result {
            Ok(()) => None,
            Err(e) => {
                let reply = self.manager.render_error(&e);
                if reply.is_some() {
                    warn!(kind = e.kind(), error = %e, "Command failed");
                }
                reply
            }
        }
    }

    /// Runs an edited message again if its content changed.
    pub async fn handle_edit(
        &self,
        server_id: Option<i64>,
        author_id: i64,
        before: &str,
        after: &str,
        context: EventArgs,
    ) -> Option<String> {
        if before == after {
            return None;
        }
        self.handle_message(server_id, author_id, after, context).await
    }
}

impl Drop for NeoRuntime {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Waits for Ctrl+C or, on unix, SIGTERM.
///
/// Never completes if no handler can be registered.
async fn os_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler");
                return ctrl_c().await;
            }
        };

        tokio::select! {
            _ = ctrl_c() => {}
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    ctrl_c().await;
}

async fn ctrl_c() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, shutting down"),
        Err(e) => {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    }
}

// =============================================================================
// RuntimeBuilder
// =============================================================================

/// Builder for [`NeoRuntime`].
///
/// Without a [`store`](Self::store), records live in an in-memory store and
/// are lost on exit.
pub struct RuntimeBuilder {
    config_loader: ConfigLoader,
    config: Option<NeoConfig>,
    store: Option<Arc<dyn RecordStore>>,
    patches: Vec<PatchFactory>,
    factories: Vec<Registration>,
    init_logging: bool,
}

impl RuntimeBuilder {
    pub fn new() -> Self {
        Self {
            config_loader: ConfigLoader::new().with_current_dir(),
            config: None,
            store: None,
            patches: Vec::new(),
            factories: Vec::new(),
            init_logging: true,
        }
    }

    pub fn config_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.file(path);
        self
    }

    pub fn profile(mut self, profile: impl AsRef<str>) -> Self {
        self.config_loader = self.config_loader.profile(profile);
        self
    }

    pub fn search_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_loader = self.config_loader.search_path(path);
        self
    }

    pub fn without_env(mut self) -> Self {
        self.config_loader = self.config_loader.without_env();
        self
    }

    /// Merges `config` over the loaded configuration.
    pub fn merge(mut self, config: NeoConfig) -> Self {
        self.config_loader = self.config_loader.merge(config);
        self
    }

    /// Uses `config` as is, skipping every config source.
    pub fn config(mut self, config: NeoConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn store<S: RecordStore>(mut self, store: Arc<S>) -> Self {
        self.store = Some(store);
        self
    }

    /// Adds a patch applied at startup, after the stock patches.
    pub fn patch<F>(mut self, make: F) -> Self
    where
        F: FnOnce(&Arc<HookTable>) -> Patch + Send + 'static,
    {
        self.patches.push(Box::new(make));
        self
    }

    /// Registers the factory for addon `A`.
    ///
    /// `make` runs every time the runtime starts. Registering the same addon
    /// again replaces the earlier factory.
    pub fn addon<A, F>(mut self, make: F) -> Self
    where
        A: Addon,
        F: Fn() -> A + Send + Sync + 'static,
    {
        let registration = Registration {
            name: A::NAME,
            make: Box::new(move || AddonCell::erase(make())),
        };
        match self.factories.iter_mut().find(|r| r.name == A::NAME) {
            Some(existing) => *existing = registration,
            None => self.factories.push(registration),
        }
        self
    }

    /// Leaves the global tracing subscriber alone.
    pub fn without_logging(mut self) -> Self {
        self.init_logging = false;
        self
    }

    pub fn build(self) -> RuntimeResult<NeoRuntime> {
        let config = match self.config {
            Some(config) => config,
            None => self.config_loader.load()?,
        };
        validate_config(&config)?;

        if self.init_logging {
            logging::init_from_config(&config.logging);
        }

        let store: Arc<dyn RecordStore> = match self.store {
            Some(store) => store,
            None => {
                warn!("No record store configured, records are kept in memory only");
                Arc::new(
                    MemoryStore::new()
                        .with_table("profiles", "user_id", UserProfile::column_defaults())
                        .with_table(
                            "servers",
                            "server_id",
                            ServerConfig::column_defaults(&config.bot.prefix),
                        ),
                )
            }
        };

        Ok(NeoRuntime::assemble(config, store, self.patches, self.factories))
    }
}

impl Default for RuntimeBuilder {
    fn default() -> Self {
        Self::new()
    }
}
