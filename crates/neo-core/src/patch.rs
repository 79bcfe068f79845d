//! Behaviour overrides.
//!
//! A [`HookTable`] is a set of named, typed slots that framework code reads
//! whenever it needs an overridable behaviour (how to compare command names,
//! how to word an error message, ...). A [`Patch`] stages replacement values
//! for some of those slots and later swaps them in atomically, remembering
//! the originals so the change can be undone.
//!
//! ```rust,ignore
//! let hooks = Arc::new(HookTable::new());
//! hooks.install("command.case_insensitive", false);
//!
//! let patch = Patch::new("case-insensitive groups", &hooks)
//!     .attribute("command.case_insensitive", true);
//! patch.patch()?;
//! assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(true));
//! patch.revert()?;
//! ```
//!
//! Slot names are always explicit. A patch applies at most once until it is
//! reverted; a second `patch()` call fails with
//! [`PatchError::AlreadyApplied`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::debug;

use crate::error::{PatchError, PatchResult};

type Slot = Arc<dyn Any + Send + Sync>;

// =============================================================================
// HookTable
// =============================================================================

/// Named behaviour slots consulted by the framework at call time.
#[derive(Default)]
pub struct HookTable {
    slots: RwLock<HashMap<String, Slot>>,
}

impl HookTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs `value` under `name`, replacing whatever was there.
    ///
    /// This is meant for defaults set up by the owner of the table. Overrides
    /// that must be revertible go through [`Patch`].
    pub fn install<T: Any + Send + Sync>(&self, name: impl Into<String>, value: T) {
        self.slots.write().insert(name.into(), Arc::new(value));
    }

    /// Returns a clone of the value under `name` if it exists and has type `T`.
    pub fn get<T: Any + Clone>(&self, name: &str) -> Option<T> {
        self.slots
            .read()
            .get(name)
            .and_then(|slot| slot.downcast_ref::<T>())
            .cloned()
    }

    /// Returns `true` if a slot named `name` exists.
    pub fn contains(&self, name: &str) -> bool {
        self.slots.read().contains_key(name)
    }

    /// Names of all installed slots, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.slots.read().keys().cloned().collect();
        names.sort();
        names
    }
}

impl fmt::Debug for HookTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookTable")
            .field("slots", &self.names())
            .finish()
    }
}

// =============================================================================
// Patch
// =============================================================================

/// A revertible set of slot overrides on one [`HookTable`].
pub struct Patch {
    label: String,
    target: Arc<HookTable>,
    staged: Vec<(String, Slot)>,
    /// `Some` while applied: the values the staged slots held before.
    originals: Mutex<Option<Vec<(String, Option<Slot>)>>>,
}

impl Patch {
    /// Creates an empty patch targeting `target`.
    pub fn new(label: impl Into<String>, target: &Arc<HookTable>) -> Self {
        Self {
            label: label.into(),
            target: Arc::clone(target),
            staged: Vec::new(),
            originals: Mutex::new(None),
        }
    }

    /// Stages `value` for slot `name` (builder form of [`Patch::stage`]).
    pub fn attribute<T: Any + Send + Sync>(mut self, name: impl Into<String>, value: T) -> Self {
        self.stage(name, value);
        self
    }

    /// Stages `value` for slot `name` without touching the target.
    ///
    /// Staging the same name twice keeps the later value.
    pub fn stage<T: Any + Send + Sync>(&mut self, name: impl Into<String>, value: T) {
        let name = name.into();
        let value: Slot = Arc::new(value);
        match self.staged.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = value,
            None => self.staged.push((name, value)),
        }
    }

    /// The patch's label, used in logs and errors.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Names of the staged slots, in staging order.
    pub fn staged(&self) -> impl Iterator<Item = &str> {
        self.staged.iter().map(|(name, _)| name.as_str())
    }

    /// Returns `true` between a successful `patch()` and the next `revert()`.
    pub fn is_applied(&self) -> bool {
        self.originals.lock().is_some()
    }

    /// Swaps every staged value into the target under a single write lock.
    pub fn patch(&self) -> PatchResult<()> {
        let mut originals = self.originals.lock();
        if originals.is_some() {
            return Err(PatchError::AlreadyApplied(self.label.clone()));
        }

        let mut slots = self.target.slots.write();
        let saved = self
            .staged
            .iter()
            .map(|(name, value)| (name.clone(), slots.insert(name.clone(), Arc::clone(value))))
            .collect();
        *originals = Some(saved);

        debug!(patch = %self.label, slots = self.staged.len(), "Patch applied");
        Ok(())
    }

    /// Restores the values the staged slots held before `patch()`.
    ///
    /// Slots that did not exist before are removed again.
    pub fn revert(&self) -> PatchResult<()> {
        let mut originals = self.originals.lock();
        let saved = originals
            .take()
            .ok_or_else(|| PatchError::NotApplied(self.label.clone()))?;

        let mut slots = self.target.slots.write();
        for (name, original) in saved.into_iter().rev() {
            match original {
                Some(value) => {
                    slots.insert(name, value);
                }
                None => {
                    slots.remove(&name);
                }
            }
        }

        debug!(patch = %self.label, "Patch reverted");
        Ok(())
    }
}

impl fmt::Debug for Patch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Patch")
            .field("label", &self.label)
            .field("staged", &self.staged().collect::<Vec<_>>())
            .field("applied", &self.is_applied())
            .finish()
    }
}

/// Applies `patches` in order.
///
/// If one fails, the patches this call already applied are reverted in
/// reverse order and the error is returned.
pub fn apply_all(patches: &[Patch]) -> PatchResult<()> {
    for (index, patch) in patches.iter().enumerate() {
        if let Err(e) = patch.patch() {
            for applied in patches[..index].iter().rev() {
                // Each of these was applied by this loop, so revert cannot fail.
                let _ = applied.revert();
            }
            return Err(e);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Arc<HookTable> {
        let hooks = Arc::new(HookTable::new());
        hooks.install("command.case_insensitive", false);
        hooks
    }

    #[test]
    fn test_staging_leaves_target_untouched() {
        let hooks = table();
        let patch = Patch::new("groups", &hooks).attribute("command.case_insensitive", true);

        assert!(!patch.is_applied());
        assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(false));
        assert_eq!(patch.staged().collect::<Vec<_>>(), vec!["command.case_insensitive"]);
    }

    #[test]
    fn test_patch_and_revert() {
        let hooks = table();
        let patch = Patch::new("groups", &hooks)
            .attribute("command.case_insensitive", true)
            .attribute("command.greeting", String::from("hi"));

        patch.patch().unwrap();
        assert!(patch.is_applied());
        assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(true));
        assert_eq!(hooks.get::<String>("command.greeting").as_deref(), Some("hi"));

        patch.revert().unwrap();
        assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(false));
        assert!(!hooks.contains("command.greeting"));
    }

    #[test]
    fn test_double_apply_is_error() {
        let hooks = table();
        let patch = Patch::new("groups", &hooks).attribute("command.case_insensitive", true);

        patch.patch().unwrap();
        assert!(matches!(patch.patch(), Err(PatchError::AlreadyApplied(label)) if label == "groups"));

        patch.revert().unwrap();
        patch.patch().unwrap();
        assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(true));
    }

    #[test]
    fn test_revert_without_apply_is_error() {
        let hooks = table();
        let patch = Patch::new("groups", &hooks);
        assert!(matches!(patch.revert(), Err(PatchError::NotApplied(_))));
    }

    #[test]
    fn test_restage_keeps_last_value() {
        let hooks = table();
        let mut patch = Patch::new("groups", &hooks);
        patch.stage("command.case_insensitive", true);
        patch.stage("command.case_insensitive", false);

        assert_eq!(patch.staged().count(), 1);
        patch.patch().unwrap();
        assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(false));
    }

    #[test]
    fn test_get_with_wrong_type() {
        let hooks = table();
        assert_eq!(hooks.get::<String>("command.case_insensitive"), None);
        assert_eq!(hooks.get::<bool>("missing"), None);
    }

    #[test]
    fn test_apply_all_rolls_back_on_failure() {
        let hooks = table();
        let first = Patch::new("first", &hooks).attribute("command.case_insensitive", true);
        let second = Patch::new("second", &hooks).attribute("command.extra", 1u32);
        second.patch().unwrap();

        let patches = [first, second];
        let err = apply_all(&patches).unwrap_err();
        assert!(matches!(err, PatchError::AlreadyApplied(label) if label == "second"));
        assert!(!patches[0].is_applied());
        assert_eq!(hooks.get::<bool>("command.case_insensitive"), Some(false));
    }

    #[test]
    fn test_apply_all_in_order() {
        let hooks = table();
        let patches = [
            Patch::new("a", &hooks).attribute("slot", 1u8),
            Patch::new("b", &hooks).attribute("slot", 2u8),
        ];
        apply_all(&patches).unwrap();
        assert_eq!(hooks.get::<u8>("slot"), Some(2));
        assert_eq!(hooks.names(), vec!["command.case_insensitive", "slot"]);
    }
}
