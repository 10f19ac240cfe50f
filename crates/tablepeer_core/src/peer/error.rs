use crate::db::DbError;
use crate::model::key::ObjectKey;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type PeerResult<T> = Result<T, PeerError>;

/// Errors surfaced by peer operations.
#[derive(Debug)]
pub enum PeerError {
    /// A by-key lookup matched no row.
    NotFound { table: &'static str, key: ObjectKey },
    /// A by-key lookup or single-row select matched more than one row.
    Ambiguous { table: &'static str, matched: usize },
    /// Execute, commit, connection or translation failure.
    Storage(DbError),
    /// The caller broke a documented precondition.
    Precondition(String),
    /// A persisted row could not be mapped to an entity.
    InvalidData(String),
}

impl PeerError {
    /// Whether the failure is a storage constraint violation (unique, foreign
    /// key, not null, check).
    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, Self::Storage(err) if err.is_constraint_violation())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }
}

impl Display for PeerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { table, key } => write!(f, "no row of `{table}` matches key {key}"),
            Self::Ambiguous { table, matched } => {
                write!(f, "expected one row of `{table}`, matched {matched}")
            }
            Self::Storage(err) => write!(f, "{err}"),
            Self::Precondition(message) => write!(f, "precondition failed: {message}"),
            Self::InvalidData(message) => write!(f, "invalid persisted data: {message}"),
        }
    }
}

impl Error for PeerError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            Self::NotFound { .. } => None,
            Self::Ambiguous { .. } => None,
            Self::Precondition(_) => None,
            Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for PeerError {
    fn from(value: DbError) -> Self {
        Self::Storage(value)
    }
}

impl From<rusqlite::Error> for PeerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(DbError::Sqlite(value))
    }
}
