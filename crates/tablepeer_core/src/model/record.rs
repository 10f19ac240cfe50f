//! Entity contract consumed by the generic peer, and the row mapper seam.
//!
//! # Invariants
//! - `column_values` lists every column of `table()` in declaration order.
//! - Rows mapped from storage are not new and not modified.

use super::key::ObjectKey;
use super::lifecycle::Lifecycle;
use super::table::TableDescriptor;
use super::value::ColumnValues;
use crate::peer::{PeerError, PeerResult};
use rusqlite::Row;
use std::marker::PhantomData;

/// A persisted entity of one table.
pub trait Record: Clone + 'static {
    fn table() -> &'static TableDescriptor;

    fn lifecycle(&self) -> &Lifecycle;

    fn lifecycle_mut(&mut self) -> &mut Lifecycle;

    /// Current key; unassigned parts are [`crate::KeyValue::Null`].
    fn primary_key(&self) -> ObjectKey;

    fn set_primary_key(&mut self, key: &ObjectKey) -> PeerResult<()>;

    /// Every column with its current value.
    fn column_values(&self) -> ColumnValues;

    /// Builds an entity from a row selected with `table().columns`.
    fn from_row(row: &Row<'_>) -> PeerResult<Self>;

    fn is_new(&self) -> bool {
        self.lifecycle().is_new()
    }

    fn is_modified(&self) -> bool {
        self.lifecycle().is_modified()
    }

    fn is_deleted(&self) -> bool {
        self.lifecycle().is_deleted()
    }

    /// Field-for-field equality, ignoring lifecycle state and caches.
    fn value_equals(&self, other: &Self) -> bool {
        self.column_values() == other.column_values()
    }
}

/// Maps one selected row into one entity.
pub trait RowMapper<E>: Send + Sync {
    fn map(&self, row: &Row<'_>) -> PeerResult<E>;
}

/// Default mapper delegating to [`Record::from_row`].
pub struct RecordMapper<E> {
    _entity: PhantomData<fn() -> E>,
}

impl<E> RecordMapper<E> {
    pub fn new() -> Self {
        Self {
            _entity: PhantomData,
        }
    }
}

impl<E> Default for RecordMapper<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Record> RowMapper<E> for RecordMapper<E> {
    fn map(&self, row: &Row<'_>) -> PeerResult<E> {
        E::from_row(row)
    }
}

/// Integer value of a single-column key, for `set_primary_key` impls.
///
/// An unassigned key maps to `None`.
pub fn integer_key(table: &TableDescriptor, key: &ObjectKey) -> PeerResult<Option<i64>> {
    if !key.is_assigned() {
        return Ok(None);
    }
    key.as_integer().map(Some).ok_or_else(|| {
        PeerError::Precondition(format!(
            "table `{}` expects a single integer key, got `{key}`",
            table.name
        ))
    })
}
