//! Primary-key values.
//!
//! # Invariants
//! - A key is *assigned* only when no part is [`KeyValue::Null`].
//! - Keys order and hash structurally so they can live in sets.

use super::table::Column;
use super::value::{TypedValue, Value};
use std::fmt::{Display, Formatter};

/// One part of a primary key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyValue {
    /// Not assigned yet.
    Null,
    Integer(i64),
    Text(String),
}

impl KeyValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Reads a key part from a column value; reals, blobs and booleans are not
    /// valid key parts.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Null => Some(Self::Null),
            Value::Integer(value) => Some(Self::Integer(*value)),
            Value::Text(value) => Some(Self::Text(value.clone())),
            Value::Real(_) | Value::Blob(_) | Value::Boolean(_) => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Integer(value) => Value::Integer(*value),
            Self::Text(value) => Value::Text(value.clone()),
        }
    }
}

impl Display for KeyValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null => write!(f, "null"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Primary key of one row: a single column or a composite of several.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ObjectKey {
    Simple(KeyValue),
    Composite(Vec<KeyValue>),
}

impl ObjectKey {
    /// Unassigned single-column key.
    pub const fn null() -> Self {
        Self::Simple(KeyValue::Null)
    }

    pub fn parts(&self) -> &[KeyValue] {
        match self {
            Self::Simple(part) => std::slice::from_ref(part),
            Self::Composite(parts) => parts,
        }
    }

    pub fn is_assigned(&self) -> bool {
        !self.parts().is_empty() && self.parts().iter().all(|part| !part.is_null())
    }

    /// Integer value of a single-column key.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Simple(KeyValue::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    /// Typed values of the key parts, paired with their key columns.
    ///
    /// Returns `None` when the key arity differs from the column count.
    pub fn typed_parts(&self, columns: &[Column]) -> Option<Vec<(Column, TypedValue)>> {
        let parts = self.parts();
        if parts.len() != columns.len() {
            return None;
        }
        Some(
            columns
                .iter()
                .zip(parts)
                .map(|(column, part)| (*column, TypedValue::new(part.to_value(), column.sql_type())))
                .collect(),
        )
    }

    /// Builds a key from column values, one part per key column.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a Value>) -> Option<Self> {
        let mut parts = values
            .into_iter()
            .map(KeyValue::from_value)
            .collect::<Option<Vec<_>>>()?;
        match parts.len() {
            0 => None,
            1 => parts.pop().map(Self::Simple),
            _ => Some(Self::Composite(parts)),
        }
    }
}

impl Display for ObjectKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Simple(part) => write!(f, "{part}"),
            Self::Composite(parts) => {
                write!(f, "(")?;
                for (index, part) in parts.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{part}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl From<i64> for ObjectKey {
    fn from(value: i64) -> Self {
        Self::Simple(KeyValue::Integer(value))
    }
}

impl From<Option<i64>> for ObjectKey {
    fn from(value: Option<i64>) -> Self {
        value.map_or_else(Self::null, Self::from)
    }
}

impl From<&str> for ObjectKey {
    fn from(value: &str) -> Self {
        Self::Simple(KeyValue::Text(value.to_string()))
    }
}
