//! Table peers over SQLite.
//!
//! A [`Peer`] maps one table to a [`Record`] entity and runs typed CRUD,
//! criteria queries and child collection reconciliation, each inside the
//! transaction boundary of [`db::run_in_transaction`].

pub mod bookstore;
pub mod criteria;
pub mod db;
pub mod logging;
pub mod model;
pub mod peer;

pub use criteria::{Criteria, CriteriaTranslator, Criterion, Operator, SqlStatement, SqliteTranslator};
pub use db::{
    run_in_transaction, ConnectionLease, ConnectionProvider, DatabaseConfig, DatabaseLocation,
    DbError, DbResult, ProviderConfig, SqliteConnectionProvider,
};
pub use logging::{default_log_level, init_logging, init_logging_with, logging_status, LoggingConfig};
pub use model::key::{KeyValue, ObjectKey};
pub use model::lifecycle::{LazyCollection, Lifecycle};
pub use model::record::{Record, RecordMapper, RowMapper};
pub use model::table::{Column, IdMethod, TableDescriptor};
pub use model::value::{ColumnValues, SqlType, TypedValue, Value};
pub use peer::{Peer, PeerError, PeerResult, Relation};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
