//! Overridable framework behaviours.
//!
//! The framework never hardcodes how command names are compared or how a
//! command error is worded. It reads those behaviours from a shared
//! [`HookTable`] on every use, so a [`Patch`](neo_core::Patch) applied at
//! startup changes them everywhere at once.
//!
//! | Slot | Type | Default |
//! |------|------|---------|
//! | [`CASE_INSENSITIVE`] | `bool` | `false` |
//! | [`FORMAT_ERROR`] | [`ErrorFormatter`] | the error's `Display` output |
//! | [`SUPPRESS_ERROR`] | [`ErrorFilter`] | suppress nothing |

use std::fmt;
use std::sync::Arc;

use neo_core::HookTable;

use crate::error::CommandError;

/// Slot name: whether command and subcommand lookup ignores case.
pub const CASE_INSENSITIVE: &str = "command.case_insensitive";
/// Slot name: renders a command error for the user.
pub const FORMAT_ERROR: &str = "command.format_error";
/// Slot name: decides whether a command error is silently dropped.
pub const SUPPRESS_ERROR: &str = "command.suppress_error";

pub type ErrorFormatter = Arc<dyn Fn(&CommandError) -> String + Send + Sync>;
pub type ErrorFilter = Arc<dyn Fn(&CommandError) -> bool + Send + Sync>;

/// Wraps a closure as an [`ErrorFormatter`] slot value.
pub fn formatter(f: impl Fn(&CommandError) -> String + Send + Sync + 'static) -> ErrorFormatter {
    Arc::new(f)
}

/// Wraps a closure as an [`ErrorFilter`] slot value.
pub fn filter(f: impl Fn(&CommandError) -> bool + Send + Sync + 'static) -> ErrorFilter {
    Arc::new(f)
}

/// Typed view over the behaviour slots of a [`HookTable`].
#[derive(Clone)]
pub struct Behaviours {
    hooks: Arc<HookTable>,
}

impl Behaviours {
    /// Creates a fresh table holding the defaults.
    pub fn new() -> Self {
        Self::with_table(Arc::new(HookTable::new()))
    }

    /// Uses `hooks`, installing defaults for the slots it lacks.
    pub fn with_table(hooks: Arc<HookTable>) -> Self {
        if !hooks.contains(CASE_INSENSITIVE) {
            hooks.install(CASE_INSENSITIVE, false);
        }
        if !hooks.contains(FORMAT_ERROR) {
            hooks.install(FORMAT_ERROR, formatter(|e| e.to_string()));
        }
        if !hooks.contains(SUPPRESS_ERROR) {
            hooks.install(SUPPRESS_ERROR, filter(|_| false));
        }
        Self { hooks }
    }

    /// The underlying table, the target for patches.
    pub fn hooks(&self) -> &Arc<HookTable> {
        &self.hooks
    }

    pub fn case_insensitive(&self) -> bool {
        self.hooks.get::<bool>(CASE_INSENSITIVE).unwrap_or(false)
    }

    pub fn format_error(&self, error: &CommandError) -> String {
        match self.hooks.get::<ErrorFormatter>(FORMAT_ERROR) {
            Some(format) => format(error),
            None => error.to_string(),
        }
    }

    pub fn suppresses(&self, error: &CommandError) -> bool {
        self.hooks
            .get::<ErrorFilter>(SUPPRESS_ERROR)
            .is_some_and(|suppress| suppress(error))
    }
}

impl Default for Behaviours {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Behaviours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Behaviours")
            .field("case_insensitive", &self.case_insensitive())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use neo_core::Patch;

    use super::*;

    #[test]
    fn test_defaults() {
        let behaviours = Behaviours::new();
        let err = CommandError::missing_argument("text");

        assert!(!behaviours.case_insensitive());
        assert_eq!(behaviours.format_error(&err), "missing required argument 'text'");
        assert!(!behaviours.suppresses(&err));
    }

    #[test]
    fn test_patched_behaviour_is_seen() {
        let behaviours = Behaviours::new();
        let patch = Patch::new("quiet", behaviours.hooks())
            .attribute(CASE_INSENSITIVE, true)
            .attribute(SUPPRESS_ERROR, filter(|e| e.kind() == "not_found"));
        patch.patch().unwrap();

        assert!(behaviours.case_insensitive());
        assert!(behaviours.suppresses(&CommandError::NotFound("x".into())));
        assert!(!behaviours.suppresses(&CommandError::failed("boom")));

        patch.revert().unwrap();
        assert!(!behaviours.case_insensitive());
        assert!(!behaviours.suppresses(&CommandError::NotFound("x".into())));
    }

    #[test]
    fn test_existing_slots_are_kept() {
        let hooks = Arc::new(HookTable::new());
        hooks.install(CASE_INSENSITIVE, true);
        let behaviours = Behaviours::with_table(hooks);
        assert!(behaviours.case_insensitive());
    }
}
