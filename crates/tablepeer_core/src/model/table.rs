//! Table and column descriptors.
//!
//! A peer is configured by one [`TableDescriptor`]; descriptors are plain
//! constants so each table is data, not generated code.

use super::value::SqlType;
use std::fmt::{Display, Formatter};

/// Column identifier with its declared storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Column {
    table: &'static str,
    name: &'static str,
    sql_type: SqlType,
}

impl Column {
    pub const fn new(table: &'static str, name: &'static str, sql_type: SqlType) -> Self {
        Self {
            table,
            name,
            sql_type,
        }
    }

    pub const fn table(&self) -> &'static str {
        self.table
    }

    pub const fn name(&self) -> &'static str {
        self.name
    }

    pub const fn sql_type(&self) -> SqlType {
        self.sql_type
    }
}

impl Display for Column {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.name)
    }
}

/// How primary-key values come into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdMethod {
    /// Storage assigns the key (SQLite rowid for an `INTEGER PRIMARY KEY`).
    Native,
    /// Callers always assign the key.
    None,
}

/// Static description of one table.
#[derive(Debug)]
pub struct TableDescriptor {
    pub name: &'static str,
    /// Database the table lives in; empty selects the provider default.
    pub database: &'static str,
    /// All columns in select order.
    pub columns: &'static [Column],
    pub primary_key: &'static [Column],
    /// Columns whose storage default wins over a client-side default value.
    pub use_default: &'static [Column],
    pub id_method: IdMethod,
}

impl TableDescriptor {
    pub fn is_primary_key(&self, column: &Column) -> bool {
        self.primary_key.contains(column)
    }

    pub fn uses_default(&self, column: &Column) -> bool {
        self.use_default.contains(column)
    }

    /// Whether inserts may leave the key to storage and read it back.
    pub fn generates_key(&self) -> bool {
        self.id_method == IdMethod::Native
            && self.primary_key.len() == 1
            && matches!(
                self.primary_key[0].sql_type(),
                SqlType::Integer | SqlType::BigInt
            )
    }
}
