//! One-to-many relations and child collection reconciliation.
//!
//! # Invariants
//! - Reconciliation runs in one transaction: insert/update every target child,
//!   then one delete for children of the parent that are no longer targeted.
//! - Duplicate targets are kept; each occurrence is persisted and cached.
//! - The standalone form writes keys, flags and the parent cache back only
//!   after commit.

use super::{Peer, PeerError, PeerResult};
use crate::criteria::Criteria;
use crate::model::key::ObjectKey;
use crate::model::lifecycle::LazyCollection;
use crate::model::record::Record;
use crate::model::table::Column;
use log::debug;
use rusqlite::Connection;
use std::collections::{BTreeMap, BTreeSet};

/// Parent-to-children link: the child's foreign-key columns plus accessors.
pub struct Relation<P, C> {
    name: &'static str,
    foreign_key: &'static [Column],
    attach: fn(&mut C, &ObjectKey) -> PeerResult<()>,
    cache: fn(&mut P) -> &mut LazyCollection<C>,
}

impl<P, C> Relation<P, C> {
    /// `attach` writes the parent key into a child's foreign-key fields;
    /// `cache` exposes the parent's cached children.
    pub const fn new(
        name: &'static str,
        foreign_key: &'static [Column],
        attach: fn(&mut C, &ObjectKey) -> PeerResult<()>,
        cache: fn(&mut P) -> &mut LazyCollection<C>,
    ) -> Self {
        Self {
            name,
            foreign_key,
            attach,
            cache,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn foreign_key(&self) -> &'static [Column] {
        self.foreign_key
    }
}

#[derive(Debug, Default)]
struct ReconcileStats {
    inserted: usize,
    saved: usize,
    deleted: usize,
}

impl<C: Record> Peer<C> {
    /// Children referencing `parent`, ordered by key; initializes the cache.
    pub fn fetch_children<P: Record>(
        &self,
        parent: &mut P,
        relation: &Relation<P, C>,
    ) -> PeerResult<Vec<C>> {
        let criteria = self.referencing(parent, relation)?;
        let children = self.select(&criteria)?;
        (relation.cache)(parent).set(children.clone());
        Ok(children)
    }

    pub fn fetch_children_in<P: Record>(
        &self,
        conn: &Connection,
        parent: &mut P,
        relation: &Relation<P, C>,
    ) -> PeerResult<Vec<C>> {
        let criteria = self.referencing(parent, relation)?;
        let children = self.select_in(conn, &criteria)?;
        (relation.cache)(parent).set(children.clone());
        Ok(children)
    }

    /// Cached children of `parent`, loading them on first access.
    pub fn children<'p, P: Record>(
        &self,
        parent: &'p mut P,
        relation: &Relation<P, C>,
    ) -> PeerResult<&'p [C]> {
        if !(relation.cache)(parent).is_initialized() {
            self.fetch_children(parent, relation)?;
        }
        let cache: &'p LazyCollection<C> = (relation.cache)(parent);
        Ok(cache.get().unwrap_or(&[]))
    }

    /// Makes the stored children of `parent` equal to `target`.
    ///
    /// On failure nothing is persisted and neither `target` nor the parent
    /// cache changes.
    pub fn reconcile_children<P: Record>(
        &self,
        parent: &mut P,
        target: &mut [C],
        relation: &Relation<P, C>,
    ) -> PeerResult<()> {
        let parent_key = assigned_parent_key(parent, relation)?;
        let mut staged = target.to_vec();
        self.transaction(self.table.database, |conn| {
            self.reconcile_rows(conn, &parent_key, &mut staged, relation)
        })?;

        target.clone_from_slice(&staged);
        (relation.cache)(parent).set(staged);
        Ok(())
    }

    /// Participating form; `target` is updated as statements succeed and the
    /// caller owns commit or rollback.
    pub fn reconcile_children_in<P: Record>(
        &self,
        conn: &Connection,
        parent: &mut P,
        target: &mut [C],
        relation: &Relation<P, C>,
    ) -> PeerResult<()> {
        let parent_key = assigned_parent_key(parent, relation)?;
        self.reconcile_rows(conn, &parent_key, target, relation)?;
        (relation.cache)(parent).set(target.to_vec());
        Ok(())
    }

    fn reconcile_rows<P>(
        &self,
        conn: &Connection,
        parent_key: &ObjectKey,
        target: &mut [C],
        relation: &Relation<P, C>,
    ) -> PeerResult<()> {
        let referencing = Criteria::new().and_key(relation.foreign_key, parent_key)?;

        let target_keys: BTreeSet<ObjectKey> = target
            .iter()
            .map(Record::primary_key)
            .filter(ObjectKey::is_assigned)
            .collect();
        let stored: BTreeMap<ObjectKey, C> = if target_keys.is_empty() {
            BTreeMap::new()
        } else {
            let criteria = referencing
                .clone()
                .and_keys_in(self.table.primary_key, &target_keys)?;
            self.select_in(conn, &criteria)?
                .into_iter()
                .map(|child| (child.primary_key(), child))
                .collect()
        };

        let mut stats = ReconcileStats::default();
        let mut kept = BTreeSet::new();
        for child in target.iter_mut() {
            (relation.attach)(child, parent_key)?;
            match stored.get(&child.primary_key()) {
                None => {
                    child.lifecycle_mut().set_new(true);
                    self.insert_in(conn, child)?;
                    stats.inserted += 1;
                }
                Some(row) => {
                    child.lifecycle_mut().set_new(false);
                    if !child.value_equals(row) {
                        child.lifecycle_mut().mark_modified();
                    }
                    self.save_in(conn, child)?;
                    stats.saved += 1;
                }
            }
            kept.insert(child.primary_key());
        }

        let orphans = referencing.and_keys_not_in(self.table.primary_key, &kept)?;
        stats.deleted = self.delete_matching_in(conn, &orphans)?;

        debug!(
            "event=peer_reconcile module=peer status=ok table={} relation={} parent={} inserted={} saved={} deleted={}",
            self.table.name, relation.name, parent_key, stats.inserted, stats.saved, stats.deleted
        );
        Ok(())
    }

    fn referencing<P: Record>(&self, parent: &P, relation: &Relation<P, C>) -> PeerResult<Criteria> {
        let parent_key = assigned_parent_key(parent, relation)?;
        let mut criteria = Criteria::new().and_key(relation.foreign_key, &parent_key)?;
        for column in self.table.primary_key {
            criteria = criteria.order_by_asc(*column);
        }
        Ok(criteria)
    }
}

fn assigned_parent_key<P: Record, C>(parent: &P, relation: &Relation<P, C>) -> PeerResult<ObjectKey> {
    let key = parent.primary_key();
    if !key.is_assigned() {
        return Err(PeerError::Precondition(format!(
            "relation `{}` needs a parent with an assigned key",
            relation.name
        )));
    }
    Ok(key)
}
