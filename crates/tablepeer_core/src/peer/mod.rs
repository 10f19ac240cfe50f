//! Generic per-table data-access peer.
//!
//! # Responsibility
//! - Build criteria and column values from entities and keys.
//! - Run every operation through the transaction boundary.
//! - Drive entity lifecycle flags as a side effect of successful writes.
//!
//! # Invariants
//! - Every operation has a standalone form (own transaction) and an `*_in`
//!   form participating in the caller's connection.
//! - Standalone forms change lifecycle flags only after commit.
//! - Deleted entities are rejected by insert, update and save.

use crate::criteria::{Criteria, CriteriaTranslator, Criterion, SqlStatement, SqliteTranslator};
use crate::db::{run_in_transaction, ConnectionProvider};
use crate::model::key::ObjectKey;
use crate::model::record::{Record, RecordMapper, RowMapper};
use crate::model::table::TableDescriptor;
use crate::model::value::{ColumnValues, TypedValue, Value};
use log::debug;
use rusqlite::{params_from_iter, Connection};
use std::sync::Arc;

mod error;
mod reconcile;

pub use error::{PeerError, PeerResult};
pub use reconcile::Relation;

/// Data-access orchestrator for the table of `E`.
pub struct Peer<E> {
    provider: Arc<dyn ConnectionProvider>,
    translator: Arc<dyn CriteriaTranslator>,
    mapper: Arc<dyn RowMapper<E>>,
    table: &'static TableDescriptor,
}

impl<E> Clone for Peer<E> {
    fn clone(&self) -> Self {
        Self {
            provider: Arc::clone(&self.provider),
            translator: Arc::clone(&self.translator),
            mapper: Arc::clone(&self.mapper),
            table: self.table,
        }
    }
}

impl<E: Record> Peer<E> {
    /// Peer over `E::table()` with the SQLite translator and record mapper.
    pub fn new(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self::with_parts(
            provider,
            Arc::new(SqliteTranslator),
            Arc::new(RecordMapper::<E>::new()),
            E::table(),
        )
    }

    /// Peer with every collaborator injected.
    pub fn with_parts(
        provider: Arc<dyn ConnectionProvider>,
        translator: Arc<dyn CriteriaTranslator>,
        mapper: Arc<dyn RowMapper<E>>,
        table: &'static TableDescriptor,
    ) -> Self {
        Self {
            provider,
            translator,
            mapper,
            table,
        }
    }

    pub fn with_translator(mut self, translator: Arc<dyn CriteriaTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn table(&self) -> &'static TableDescriptor {
        self.table
    }

    // ---------------------------------------------------------------------
    // insert
    // ---------------------------------------------------------------------

    /// Inserts `entity` in its own transaction, then assigns the key and
    /// marks it not new and not modified.
    pub fn insert(&self, entity: &mut E) -> PeerResult<()> {
        ensure_mutable(self.table, entity, "insert")?;
        let values = self.build_column_values(entity);
        let key = self.transaction(self.table.database, |conn| self.insert_row(conn, &values))?;
        self.mark_inserted(entity, &key)
    }

    pub fn insert_in(&self, conn: &Connection, entity: &mut E) -> PeerResult<()> {
        ensure_mutable(self.table, entity, "insert")?;
        let values = self.build_column_values(entity);
        let key = self.insert_row(conn, &values)?;
        self.mark_inserted(entity, &key)
    }

    /// Inserts raw column values and returns the explicit or generated key.
    pub fn insert_values(&self, values: &ColumnValues) -> PeerResult<ObjectKey> {
        self.transaction(self.table.database, |conn| self.insert_row(conn, values))
    }

    pub fn insert_values_in(&self, conn: &Connection, values: &ColumnValues) -> PeerResult<ObjectKey> {
        self.insert_row(conn, values)
    }

    // ---------------------------------------------------------------------
    // update
    // ---------------------------------------------------------------------

    /// Updates the row matching the entity key; returns the affected count.
    ///
    /// Zero affected rows is not an error.
    pub fn update(&self, entity: &mut E) -> PeerResult<usize> {
        ensure_mutable(self.table, entity, "update")?;
        let values = self.build_column_values(entity);
        let rows = self.transaction(self.table.database, |conn| {
            self.update_values_in(conn, values)
        })?;
        entity.lifecycle_mut().mark_updated();
        Ok(rows)
    }

    pub fn update_in(&self, conn: &Connection, entity: &mut E) -> PeerResult<usize> {
        ensure_mutable(self.table, entity, "update")?;
        let values = self.build_column_values(entity);
        let rows = self.update_values_in(conn, values)?;
        entity.lifecycle_mut().mark_updated();
        Ok(rows)
    }

    /// Updates by key; the primary-key entries are removed from `values` and
    /// used as the match predicate.
    pub fn update_values(&self, values: ColumnValues) -> PeerResult<usize> {
        self.transaction(self.table.database, |conn| {
            self.update_values_in(conn, values)
        })
    }

    pub fn update_values_in(&self, conn: &Connection, mut values: ColumnValues) -> PeerResult<usize> {
        let mut criteria = Criteria::new();
        for column in self.table.primary_key {
            let value = values.remove(column).ok_or_else(|| {
                PeerError::Precondition(format!(
                    "update of `{}` needs a value for key column `{column}`",
                    self.table.name
                ))
            })?;
            criteria = criteria.and_criterion(Criterion::new(*column, value.into_value()));
        }
        self.update_matching_in(conn, &criteria, &values)
    }

    /// Sets `values` on every row matching `criteria`.
    pub fn update_matching(&self, criteria: &Criteria, values: &ColumnValues) -> PeerResult<usize> {
        self.transaction(self.database(criteria), |conn| {
            self.update_matching_in(conn, criteria, values)
        })
    }

    pub fn update_matching_in(
        &self,
        conn: &Connection,
        criteria: &Criteria,
        values: &ColumnValues,
    ) -> PeerResult<usize> {
        let statement = self.translator.update(self.table, criteria, values)?;
        let rows = execute(conn, &statement)?;
        debug!(
            "event=peer_update module=peer status=ok table={} rows={}",
            self.table.name, rows
        );
        Ok(rows)
    }

    // ---------------------------------------------------------------------
    // save
    // ---------------------------------------------------------------------

    /// Inserts a new entity, updates a modified one, otherwise does nothing.
    pub fn save(&self, entity: &mut E) -> PeerResult<()> {
        ensure_mutable(self.table, entity, "save")?;
        if entity.is_new() {
            self.insert(entity)
        } else if entity.is_modified() {
            self.update(entity).map(|_| ())
        } else {
            Ok(())
        }
    }

    pub fn save_in(&self, conn: &Connection, entity: &mut E) -> PeerResult<()> {
        ensure_mutable(self.table, entity, "save")?;
        if entity.is_new() {
            self.insert_in(conn, entity)
        } else if entity.is_modified() {
            self.update_in(conn, entity).map(|_| ())
        } else {
            Ok(())
        }
    }

    // ---------------------------------------------------------------------
    // delete
    // ---------------------------------------------------------------------

    /// Deletes the row of `entity` and marks it deleted.
    pub fn delete(&self, entity: &mut E) -> PeerResult<usize> {
        let criteria = self.build_key_criteria(&assigned_key(self.table, entity)?)?;
        let rows = self.delete_matching(&criteria)?;
        entity.lifecycle_mut().mark_deleted();
        Ok(rows)
    }

    pub fn delete_in(&self, conn: &Connection, entity: &mut E) -> PeerResult<usize> {
        let criteria = self.build_key_criteria(&assigned_key(self.table, entity)?)?;
        let rows = self.delete_matching_in(conn, &criteria)?;
        entity.lifecycle_mut().mark_deleted();
        Ok(rows)
    }

    /// Deletes by key; a missing row yields `Ok(0)`.
    pub fn delete_key(&self, key: &ObjectKey) -> PeerResult<usize> {
        let criteria = self.build_key_criteria(key)?;
        self.delete_matching(&criteria)
    }

    pub fn delete_key_in(&self, conn: &Connection, key: &ObjectKey) -> PeerResult<usize> {
        let criteria = self.build_key_criteria(key)?;
        self.delete_matching_in(conn, &criteria)
    }

    /// Deletes all `entities` with one `IN` statement and marks each deleted.
    ///
    /// Entities without an assigned key match nothing.
    pub fn delete_all(&self, entities: &mut [E]) -> PeerResult<usize> {
        let criteria = self.build_pk_criteria(entities)?;
        let rows = self.delete_matching(&criteria)?;
        mark_all_deleted(entities);
        Ok(rows)
    }

    pub fn delete_all_in(&self, conn: &Connection, entities: &mut [E]) -> PeerResult<usize> {
        let criteria = self.build_pk_criteria(entities)?;
        let rows = self.delete_matching_in(conn, &criteria)?;
        mark_all_deleted(entities);
        Ok(rows)
    }

    /// Deletes every row matching `criteria`; empty criteria delete all rows.
    pub fn delete_matching(&self, criteria: &Criteria) -> PeerResult<usize> {
        self.transaction(self.database(criteria), |conn| {
            self.delete_matching_in(conn, criteria)
        })
    }

    pub fn delete_matching_in(&self, conn: &Connection, criteria: &Criteria) -> PeerResult<usize> {
        let statement = self.translator.delete(self.table, criteria)?;
        let rows = execute(conn, &statement)?;
        debug!(
            "event=peer_delete module=peer status=ok table={} rows={}",
            self.table.name, rows
        );
        Ok(rows)
    }

    // ---------------------------------------------------------------------
    // retrieve and select
    // ---------------------------------------------------------------------

    /// Loads exactly one row by key.
    ///
    /// Fails with `NotFound` on zero rows and `Ambiguous` on more than one.
    pub fn retrieve_by_key(&self, key: &ObjectKey) -> PeerResult<E> {
        self.transaction(self.table.database, |conn| {
            self.retrieve_by_key_in(conn, key)
        })
    }

    pub fn retrieve_by_key_in(&self, conn: &Connection, key: &ObjectKey) -> PeerResult<E> {
        let criteria = self.build_key_criteria(key)?;
        let mut rows = self.select_in(conn, &criteria)?;
        match rows.len() {
            0 => Err(PeerError::NotFound {
                table: self.table.name,
                key: key.clone(),
            }),
            1 => Ok(rows.remove(0)),
            matched => Err(PeerError::Ambiguous {
                table: self.table.name,
                matched,
            }),
        }
    }

    /// Loads the rows of `keys` with one `IN` query.
    ///
    /// Without assigned keys no connection is acquired and no query is run.
    pub fn retrieve_by_keys(&self, keys: &[ObjectKey]) -> PeerResult<Vec<E>> {
        if !keys.iter().any(ObjectKey::is_assigned) {
            return Ok(Vec::new());
        }
        self.transaction(self.table.database, |conn| {
            self.retrieve_by_keys_in(conn, keys)
        })
    }

    pub fn retrieve_by_keys_in(&self, conn: &Connection, keys: &[ObjectKey]) -> PeerResult<Vec<E>> {
        if !keys.iter().any(ObjectKey::is_assigned) {
            return Ok(Vec::new());
        }
        let criteria = self.build_keys_criteria(keys)?;
        self.select_in(conn, &criteria)
    }

    /// Rows matching `criteria`, in storage order unless the criteria orders.
    pub fn select(&self, criteria: &Criteria) -> PeerResult<Vec<E>> {
        self.transaction(self.database(criteria), |conn| self.select_in(conn, criteria))
    }

    pub fn select_in(&self, conn: &Connection, criteria: &Criteria) -> PeerResult<Vec<E>> {
        let statement = self.translator.select(self.table, criteria)?;
        let mut prepared = conn.prepare(&statement.sql)?;
        let mut rows = prepared.query(params_from_iter(statement.params.iter()))?;

        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(self.mapper.map(row)?);
        }
        debug!(
            "event=peer_select module=peer status=ok table={} rows={}",
            self.table.name,
            items.len()
        );
        Ok(items)
    }

    pub fn select_all(&self) -> PeerResult<Vec<E>> {
        self.select(&Criteria::new())
    }

    pub fn select_all_in(&self, conn: &Connection) -> PeerResult<Vec<E>> {
        self.select_in(conn, &Criteria::new())
    }

    /// At most one row; `Ok(None)` on zero, `Ambiguous` on more than one.
    pub fn select_one(&self, criteria: &Criteria) -> PeerResult<Option<E>> {
        self.transaction(self.database(criteria), |conn| {
            self.select_one_in(conn, criteria)
        })
    }

    pub fn select_one_in(&self, conn: &Connection, criteria: &Criteria) -> PeerResult<Option<E>> {
        let mut rows = self.select_in(conn, criteria)?;
        match rows.len() {
            0 => Ok(None),
            1 => Ok(rows.pop()),
            matched => Err(PeerError::Ambiguous {
                table: self.table.name,
                matched,
            }),
        }
    }

    /// Query by example: rows whose columns equal the entity's values.
    pub fn select_like(&self, example: &E) -> PeerResult<Vec<E>> {
        self.select(&self.build_select_criteria(example))
    }

    pub fn select_like_in(&self, conn: &Connection, example: &E) -> PeerResult<Vec<E>> {
        self.select_in(conn, &self.build_select_criteria(example))
    }

    pub fn select_single_like(&self, example: &E) -> PeerResult<Option<E>> {
        self.select_one(&self.build_select_criteria(example))
    }

    pub fn select_single_like_in(&self, conn: &Connection, example: &E) -> PeerResult<Option<E>> {
        self.select_one_in(conn, &self.build_select_criteria(example))
    }

    // ---------------------------------------------------------------------
    // criteria and payload builders
    // ---------------------------------------------------------------------

    /// Equality on every primary-key column; the key must be assigned.
    pub fn build_key_criteria(&self, key: &ObjectKey) -> PeerResult<Criteria> {
        if !key.is_assigned() {
            return Err(PeerError::Precondition(format!(
                "key criteria on `{}` need an assigned key",
                self.table.name
            )));
        }
        Criteria::new().and_key(self.table.primary_key, key)
    }

    /// Key set membership; unassigned keys are skipped.
    pub fn build_keys_criteria(&self, keys: &[ObjectKey]) -> PeerResult<Criteria> {
        Criteria::new().and_keys_in(self.table.primary_key, keys)
    }

    /// Key set membership over the keys of `entities`.
    pub fn build_pk_criteria(&self, entities: &[E]) -> PeerResult<Criteria> {
        let keys: Vec<ObjectKey> = entities.iter().map(Record::primary_key).collect();
        self.build_keys_criteria(&keys)
    }

    /// Equality on every column; key columns only once the entity is persisted.
    pub fn build_select_criteria(&self, example: &E) -> Criteria {
        let mut criteria = Criteria::new();
        for (column, value) in example.column_values().iter() {
            if self.table.is_primary_key(column) && example.is_new() {
                continue;
            }
            criteria = criteria.and_criterion(Criterion::new(*column, value.value().clone()));
        }
        criteria
    }

    /// Insert/update payload of `entity`.
    ///
    /// Key columns and storage-default columns of a new entity are left out
    /// while they hold a default value, so storage can assign them.
    pub fn build_column_values(&self, entity: &E) -> ColumnValues {
        let mut values = entity.column_values();
        if entity.is_new() {
            values.retain(|column, value| {
                let storage_assigned =
                    self.table.is_primary_key(column) || self.table.uses_default(column);
                !storage_assigned || !value.is_default()
            });
        }
        values
    }

    // ---------------------------------------------------------------------
    // internals
    // ---------------------------------------------------------------------

    fn transaction<T>(
        &self,
        database: &str,
        work: impl FnOnce(&Connection) -> PeerResult<T>,
    ) -> PeerResult<T> {
        run_in_transaction(self.provider.as_ref(), database, None, work)
    }

    fn database<'a>(&'a self, criteria: &'a Criteria) -> &'a str {
        criteria.database().unwrap_or(self.table.database)
    }

    fn insert_row(&self, conn: &Connection, values: &ColumnValues) -> PeerResult<ObjectKey> {
        let statement = self.translator.insert(self.table, values)?;
        execute(conn, &statement)?;

        let explicit: Option<Vec<&Value>> = self
            .table
            .primary_key
            .iter()
            .map(|column| values.get(column).map(TypedValue::value))
            .collect();
        let key = match explicit.and_then(ObjectKey::from_values) {
            Some(key) if key.is_assigned() => key,
            _ if self.table.generates_key() => ObjectKey::from(conn.last_insert_rowid()),
            _ => ObjectKey::null(),
        };

        debug!(
            "event=peer_insert module=peer status=ok table={} key={}",
            self.table.name, key
        );
        Ok(key)
    }

    fn mark_inserted(&self, entity: &mut E, key: &ObjectKey) -> PeerResult<()> {
        if key.is_assigned() {
            entity.set_primary_key(key)?;
        }
        entity.lifecycle_mut().mark_inserted();
        Ok(())
    }
}

fn execute(conn: &Connection, statement: &SqlStatement) -> PeerResult<usize> {
    let mut prepared = conn.prepare(&statement.sql)?;
    Ok(prepared.execute(params_from_iter(statement.params.iter()))?)
}

fn ensure_mutable<E: Record>(table: &TableDescriptor, entity: &E, operation: &str) -> PeerResult<()> {
    if entity.is_deleted() {
        return Err(PeerError::Precondition(format!(
            "cannot {operation} a deleted `{}` row (key {})",
            table.name,
            entity.primary_key()
        )));
    }
    Ok(())
}

fn assigned_key<E: Record>(table: &TableDescriptor, entity: &E) -> PeerResult<ObjectKey> {
    let key = entity.primary_key();
    if !key.is_assigned() {
        return Err(PeerError::Precondition(format!(
            "`{}` entity has no assigned key",
            table.name
        )));
    }
    Ok(key)
}

fn mark_all_deleted<E: Record>(entities: &mut [E]) {
    for entity in entities {
        entity.lifecycle_mut().mark_deleted();
    }
}
