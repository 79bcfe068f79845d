use std::sync::Arc;

use tokio_util::sync::CancellationToken;

// ─── AddonContext ─────────────────────────────────────────────────────────────

/// Context passed to an addon's `on_load` hook.
///
/// Carries the addon's section of `addon_config` in `neo.toml` (an empty
/// object when absent) and a token that is cancelled when the addon is
/// unloaded or merged away.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(serde::Deserialize, Default)]
/// #[serde(default)]
/// struct GreeterConfig { greeting: String }
///
/// async fn on_load(&self, ctx: &AddonContext) -> Result<(), BoxError> {
///     let cfg: GreeterConfig = ctx.get_config()?;
///     let recent = DecayingSet::with_parent(Duration::from_secs(60), ctx.token());
///     Ok(())
/// }
/// ```
#[derive(Clone, Debug)]
pub struct AddonContext {
    name: &'static str,
    config: Arc<serde_json::Value>,
    token: CancellationToken,
}

impl AddonContext {
    pub(crate) fn new(
        name: &'static str,
        config: Arc<serde_json::Value>,
        token: CancellationToken,
    ) -> Self {
        Self {
            name,
            config,
            token,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Deserialise the addon's config section into `T`.
    ///
    /// Use `#[serde(default)]` on `T` to make every field optional.
    pub fn get_config<T>(&self) -> serde_json::Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        T::deserialize(self.config.as_ref())
    }

    /// The raw config section.
    pub fn raw_config(&self) -> &serde_json::Value {
        &self.config
    }

    /// Cancelled when the addon leaves the manager.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, Default, PartialEq)]
    #[serde(default)]
    struct GreeterConfig {
        greeting: String,
        cooldown_secs: u64,
    }

    #[test]
    fn test_get_config() {
        let ctx = AddonContext::new(
            "greeter",
            Arc::new(serde_json::json!({ "greeting": "Welcome" })),
            CancellationToken::new(),
        );
        let cfg: GreeterConfig = ctx.get_config().unwrap();
        assert_eq!(cfg.greeting, "Welcome");
        assert_eq!(cfg.cooldown_secs, 0);
    }

    #[test]
    fn test_get_config_wrong_shape() {
        let ctx = AddonContext::new(
            "greeter",
            Arc::new(serde_json::json!({ "cooldown_secs": "soon" })),
            CancellationToken::new(),
        );
        assert!(ctx.get_config::<GreeterConfig>().is_err());
    }
}
