//! Data model shared by criteria, translator and peers.
//!
//! # Responsibility
//! - Describe tables, columns and typed column values.
//! - Define the entity contract (`Record`) and its lifecycle state.
//!
//! # Invariants
//! - Values always carry the storage type of their column.
//! - Lifecycle flags move only through documented transitions.

pub mod key;
pub mod lifecycle;
pub mod record;
pub mod table;
pub mod value;
