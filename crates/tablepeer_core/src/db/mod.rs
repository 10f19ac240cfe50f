//! SQLite connection plumbing and transaction boundary.
//!
//! # Responsibility
//! - Open and configure SQLite connections for named databases.
//! - Lease connections through a bounded provider.
//! - Wrap units of work in an "open-if-absent, else reuse" transaction.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - A connection still inside a transaction is never handed out again.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod config;
mod open;
mod provider;
mod transaction;

pub use config::{DatabaseConfig, DatabaseLocation, ProviderConfig, DEFAULT_DATABASE_NAME};
pub use open::open_connection;
pub use provider::{BootstrapFn, ConnectionLease, ConnectionProvider, SqliteConnectionProvider};
pub use transaction::run_in_transaction;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// No database with this name is configured on the provider.
    UnknownDatabase(String),
    /// Every connection of the named database stayed leased past the timeout.
    PoolTimeout {
        database: String,
        waited_ms: u128,
    },
    /// A table or column name is not a plain SQL identifier.
    InvalidIdentifier(String),
    InvalidConfig(String),
}

impl DbError {
    /// Returns whether the underlying SQLite failure is a constraint violation
    /// (unique, primary key, foreign key, not null, check).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(failure, _))
                if failure.code == rusqlite::ErrorCode::ConstraintViolation
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnknownDatabase(name) => write!(f, "unknown database `{name}`"),
            Self::PoolTimeout {
                database,
                waited_ms,
            } => write!(
                f,
                "timed out after {waited_ms}ms waiting for a connection to `{database}`"
            ),
            Self::InvalidIdentifier(name) => write!(f, "invalid SQL identifier `{name}`"),
            Self::InvalidConfig(message) => write!(f, "invalid provider config: {message}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnknownDatabase(_) => None,
            Self::PoolTimeout { .. } => None,
            Self::InvalidIdentifier(_) => None,
            Self::InvalidConfig(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
