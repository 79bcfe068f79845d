//! Positional, type-erased event arguments.

use std::any::{Any, type_name};
use std::fmt;
use std::sync::Arc;

use crate::error::ArgError;

/// Arguments delivered with an event, e.g. the joining member for `member_join`.
///
/// Cloning is cheap: values are shared.
#[derive(Clone, Default)]
pub struct EventArgs {
    values: Vec<Arc<dyn Any + Send + Sync>>,
}

impl EventArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` (builder form).
    pub fn with<T: Any + Send + Sync>(mut self, value: T) -> Self {
        self.push(value);
        self
    }

    pub fn push<T: Any + Send + Sync>(&mut self, value: T) {
        self.values.push(Arc::new(value));
    }

    /// Borrows the argument at `index` as a `T`.
    pub fn get<T: Any>(&self, index: usize) -> Result<&T, ArgError> {
        self.values
            .get(index)
            .ok_or(ArgError::Missing { index })?
            .downcast_ref::<T>()
            .ok_or(ArgError::TypeMismatch {
                index,
                expected: type_name::<T>(),
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl fmt::Debug for EventArgs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventArgs").field("len", &self.len()).finish()
    }
}

/// Builds [`EventArgs`] from a list of values.
///
/// ```rust,ignore
/// manager.broadcast("member_join", &event_args!["user123"]).await;
/// ```
#[macro_export]
macro_rules! event_args {
    () => {
        $crate::event::EventArgs::new()
    };
    ($($value:expr),+ $(,)?) => {
        $crate::event::EventArgs::new()$(.with($value))+
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_access() {
        let args = event_args!["user123", 42u64];
        assert_eq!(args.len(), 2);
        assert_eq!(*args.get::<&str>(0).unwrap(), "user123");
        assert_eq!(*args.get::<u64>(1).unwrap(), 42);
    }

    #[test]
    fn test_errors() {
        let args = event_args![1i32];
        assert!(matches!(args.get::<i32>(3), Err(ArgError::Missing { index: 3 })));
        assert!(matches!(
            args.get::<String>(0),
            Err(ArgError::TypeMismatch { index: 0, .. })
        ));
        assert!(event_args![].is_empty());
    }
}
