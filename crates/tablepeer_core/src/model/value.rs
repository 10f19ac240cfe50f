//! Typed column values and insert/update payloads.
//!
//! # Invariants
//! - Every value carries the storage type of the column it belongs to.
//! - `ColumnValues` keys are unique and keep insertion order.

use super::table::Column;
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::ToSql;
use serde::{Deserialize, Serialize};

/// Storage type discriminator of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlType {
    Integer,
    BigInt,
    Double,
    Varchar,
    Boolean,
    Blob,
}

/// Raw column value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
    Boolean(bool),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Null, numeric zero, empty text/blob or `false`.
    pub fn is_default(&self) -> bool {
        match self {
            Self::Null => true,
            Self::Integer(value) => *value == 0,
            Self::Real(value) => *value == 0.0,
            Self::Text(value) => value.is_empty(),
            Self::Blob(value) => value.is_empty(),
            Self::Boolean(value) => !value,
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for Value {
    fn from(value: Vec<u8>) -> Self {
        Self::Blob(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// A value paired with the storage type it is written as.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedValue {
    value: Value,
    sql_type: SqlType,
}

impl TypedValue {
    pub fn new(value: impl Into<Value>, sql_type: SqlType) -> Self {
        Self {
            value: value.into(),
            sql_type,
        }
    }

    pub fn null(sql_type: SqlType) -> Self {
        Self {
            value: Value::Null,
            sql_type,
        }
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn into_value(self) -> Value {
        self.value
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    pub fn is_default(&self) -> bool {
        self.value.is_default()
    }

    /// Storage representation. SQLite has no boolean type, so boolean columns
    /// and boolean values are written as integer 0/1.
    fn to_sql_value(&self) -> SqlValue {
        match (&self.value, self.sql_type) {
            (Value::Null, _) => SqlValue::Null,
            (Value::Boolean(flag), _) => SqlValue::Integer(i64::from(*flag)),
            (Value::Integer(value), SqlType::Boolean) => SqlValue::Integer(i64::from(*value != 0)),
            (Value::Integer(value), SqlType::Double) => SqlValue::Real(*value as f64),
            (Value::Integer(value), _) => SqlValue::Integer(*value),
            (Value::Real(value), _) => SqlValue::Real(*value),
            (Value::Text(value), _) => SqlValue::Text(value.clone()),
            (Value::Blob(value), _) => SqlValue::Blob(value.clone()),
        }
    }
}

impl ToSql for TypedValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::Owned(self.to_sql_value()))
    }
}

/// Ordered column → value payload of an insert or update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ColumnValues {
    entries: Vec<(Column, TypedValue)>,
}

impl ColumnValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `column`, typing `value` with the column's declared type.
    ///
    /// Re-setting an existing column replaces it in place.
    pub fn put(&mut self, column: Column, value: impl Into<Value>) {
        let typed = TypedValue::new(value, column.sql_type());
        self.put_typed(column, typed);
    }

    pub fn put_typed(&mut self, column: Column, value: TypedValue) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == column) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((column, value)),
        }
    }

    pub fn with(mut self, column: Column, value: impl Into<Value>) -> Self {
        self.put(column, value);
        self
    }

    pub fn get(&self, column: &Column) -> Option<&TypedValue> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == column)
            .map(|(_, value)| value)
    }

    pub fn remove(&mut self, column: &Column) -> Option<TypedValue> {
        let index = self
            .entries
            .iter()
            .position(|(existing, _)| existing == column)?;
        Some(self.entries.remove(index).1)
    }

    pub fn contains(&self, column: &Column) -> bool {
        self.get(column).is_some()
    }

    /// Keeps only entries accepted by `keep`, preserving order.
    pub fn retain(&mut self, mut keep: impl FnMut(&Column, &TypedValue) -> bool) {
        self.entries.retain(|(column, value)| keep(column, value));
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Column, &TypedValue)> {
        self.entries.iter().map(|(column, value)| (column, value))
    }

    pub fn columns(&self) -> impl Iterator<Item = &Column> {
        self.entries.iter().map(|(column, _)| column)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{ColumnValues, SqlType, TypedValue, Value};
    use crate::model::table::Column;
    use rusqlite::types::{ToSqlOutput, Value as SqlValue};
    use rusqlite::ToSql;

    const ID: Column = Column::new("item", "item_id", SqlType::Integer);
    const NAME: Column = Column::new("item", "name", SqlType::Varchar);
    const ACTIVE: Column = Column::new("item", "active", SqlType::Boolean);

    fn storage(value: &TypedValue) -> SqlValue {
        match value.to_sql().unwrap() {
            ToSqlOutput::Owned(value) => value,
            other => panic!("unexpected output {other:?}"),
        }
    }

    #[test]
    fn defaults_are_detected() {
        assert!(Value::Null.is_default());
        assert!(Value::Integer(0).is_default());
        assert!(Value::Text(String::new()).is_default());
        assert!(Value::Boolean(false).is_default());
        assert!(!Value::Integer(3).is_default());
        assert!(!Value::from("x").is_default());
        assert!(Value::from(None::<i64>).is_null());
    }

    #[test]
    fn booleans_are_written_as_integers() {
        assert_eq!(
            storage(&TypedValue::new(true, SqlType::Boolean)),
            SqlValue::Integer(1)
        );
        assert_eq!(
            storage(&TypedValue::new(5, SqlType::Boolean)),
            SqlValue::Integer(1)
        );
        assert_eq!(
            storage(&TypedValue::null(SqlType::Boolean)),
            SqlValue::Null
        );
    }

    #[test]
    fn column_values_keep_order_and_replace_in_place() {
        let mut values = ColumnValues::new()
            .with(ID, 1)
            .with(NAME, "first")
            .with(ACTIVE, true);
        values.put(NAME, "second");

        let names: Vec<&str> = values.columns().map(|column| column.name()).collect();
        assert_eq!(names, vec!["item_id", "name", "active"]);
        assert_eq!(values.get(&NAME).unwrap().value(), &Value::from("second"));
        assert_eq!(values.get(&ACTIVE).unwrap().sql_type(), SqlType::Boolean);

        let removed = values.remove(&ID).unwrap();
        assert_eq!(removed.value(), &Value::Integer(1));
        assert_eq!(values.len(), 2);
        assert!(!values.contains(&ID));
    }
}
