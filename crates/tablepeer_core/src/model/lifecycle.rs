//! Entity lifecycle flags and lazily initialized relation caches.
//!
//! # Invariants
//! - A fresh entity is new, unmodified and not deleted.
//! - Transitions are driven by peer operations after they succeed.
//! - A relation cache changes only through `set`, `init` or `invalidate`.

/// Persistence state of one entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lifecycle {
    new: bool,
    modified: bool,
    deleted: bool,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self {
            new: true,
            modified: false,
            deleted: false,
        }
    }
}

impl Lifecycle {
    /// State of an entity just read from storage.
    pub const fn persisted() -> Self {
        Self {
            new: false,
            modified: false,
            deleted: false,
        }
    }

    pub const fn is_new(&self) -> bool {
        self.new
    }

    pub const fn is_modified(&self) -> bool {
        self.modified
    }

    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    pub fn set_new(&mut self, new: bool) {
        self.new = new;
    }

    /// A field changed in memory.
    pub fn mark_modified(&mut self) {
        self.modified = true;
    }

    /// The row was inserted.
    pub fn mark_inserted(&mut self) {
        self.new = false;
        self.modified = false;
    }

    /// The row was updated.
    pub fn mark_updated(&mut self) {
        self.modified = false;
    }

    /// The row was deleted.
    pub fn mark_deleted(&mut self) {
        self.deleted = true;
    }
}

/// Cached child collection of a one-to-many relation.
#[derive(Debug, Clone, PartialEq)]
pub enum LazyCollection<C> {
    Uninitialized,
    Initialized(Vec<C>),
}

impl<C> Default for LazyCollection<C> {
    fn default() -> Self {
        Self::Uninitialized
    }
}

impl<C> LazyCollection<C> {
    pub fn is_initialized(&self) -> bool {
        matches!(self, Self::Initialized(_))
    }

    pub fn get(&self) -> Option<&[C]> {
        match self {
            Self::Uninitialized => None,
            Self::Initialized(items) => Some(items),
        }
    }

    pub fn get_mut(&mut self) -> Option<&mut Vec<C>> {
        match self {
            Self::Uninitialized => None,
            Self::Initialized(items) => Some(items),
        }
    }

    /// Replaces the contents and marks the cache initialized.
    pub fn set(&mut self, items: Vec<C>) {
        *self = Self::Initialized(items);
    }

    /// Returns the cached items, initializing an empty cache first.
    pub fn init(&mut self) -> &mut Vec<C> {
        if let Self::Uninitialized = self {
            *self = Self::Initialized(Vec::new());
        }
        match self {
            Self::Initialized(items) => items,
            Self::Uninitialized => unreachable!("cache was initialized above"),
        }
    }

    pub fn invalidate(&mut self) {
        *self = Self::Uninitialized;
    }
}

#[cfg(test)]
mod tests {
    use super::{LazyCollection, Lifecycle};

    #[test]
    fn lifecycle_transitions() {
        let mut state = Lifecycle::default();
        assert!(state.is_new() && !state.is_modified() && !state.is_deleted());

        state.mark_modified();
        state.mark_inserted();
        assert!(!state.is_new() && !state.is_modified());

        state.mark_modified();
        state.mark_updated();
        assert!(!state.is_modified());

        state.mark_deleted();
        assert!(state.is_deleted());
        assert!(!Lifecycle::persisted().is_new());
    }

    #[test]
    fn lazy_collection_state_machine() {
        let mut cache: LazyCollection<i32> = LazyCollection::default();
        assert!(!cache.is_initialized());
        assert!(cache.get().is_none());

        cache.init().push(1);
        assert_eq!(cache.get(), Some(&[1][..]));

        cache.init().push(2);
        assert_eq!(cache.get(), Some(&[1, 2][..]));

        cache.set(vec![9]);
        assert_eq!(cache.get(), Some(&[9][..]));

        cache.invalidate();
        assert!(!cache.is_initialized());
    }
}
