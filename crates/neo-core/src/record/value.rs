//! Column values exchanged with a [`RecordStore`](super::RecordStore).

use std::collections::BTreeMap;
use std::fmt;

use time::OffsetDateTime;

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Text(String),
    Timestamp(OffsetDateTime),
    IntList(Vec<i64>),
    TextList(Vec<String>),
}

/// A row as returned by the store: column name to value.
pub type Row = BTreeMap<String, Value>;

impl Value {
    /// Name of the variant, used in type-mismatch errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
            Value::IntList(_) => "int[]",
            Value::TextList(_) => "text[]",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Text(v) => write!(f, "'{v}'"),
            Value::Timestamp(v) => write!(f, "{v}"),
            Value::IntList(v) => write!(f, "{v:?}"),
            Value::TextList(v) => write!(f, "{v:?}"),
        }
    }
}

// ─── Conversions ────────────────────────────────────────────────────────────

/// Extraction of a typed field from a [`Value`].
pub trait FromValue: Sized {
    /// Type name reported when extraction fails.
    const EXPECTED: &'static str;

    fn from_value(value: &Value) -> Option<Self>;
}

macro_rules! impl_value_conversions {
    ($($ty:ty => $variant:ident, $name:literal;)*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Value::$variant(v)
                }
            }

            impl FromValue for $ty {
                const EXPECTED: &'static str = $name;

                fn from_value(value: &Value) -> Option<Self> {
                    match value {
                        Value::$variant(v) => Some(v.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

impl_value_conversions! {
    bool => Bool, "bool";
    i64 => Int, "int";
    String => Text, "text";
    OffsetDateTime => Timestamp, "timestamp";
    Vec<i64> => IntList, "int[]";
    Vec<String> => TextList, "text[]";
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_owned())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(None),
            other => T::from_value(other).map(Some),
        }
    }
}
