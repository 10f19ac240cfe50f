//! Provider configuration.
//!
//! Databases are addressed by name so criteria can route to them; each name
//! maps to a file path or a named in-memory database.

use super::{DbError, DbResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

/// Name used when a table or criteria does not pick a database explicitly.
pub const DEFAULT_DATABASE_NAME: &str = "default";

const DEFAULT_MAX_CONNECTIONS: usize = 4;
const DEFAULT_ACQUIRE_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Where a named database lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatabaseLocation {
    /// SQLite database file.
    File(PathBuf),
    /// Shared-cache in-memory database. Data lives as long as at least one
    /// connection to it stays open. Pooled at most one connection at a time:
    /// shared-cache lock conflicts fail with `SQLITE_LOCKED` instead of
    /// honoring the busy timeout.
    Memory(String),
}

impl DatabaseLocation {
    /// Connection string understood by `rusqlite::Connection::open`.
    pub(crate) fn open_target(&self) -> String {
        match self {
            Self::File(path) => path.to_string_lossy().into_owned(),
            Self::Memory(name) => format!("file:{name}?mode=memory&cache=shared"),
        }
    }

    pub(crate) fn mode(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Memory(_) => "memory",
        }
    }
}

/// One named database and its lease limits.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseConfig {
    pub location: DatabaseLocation,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl DatabaseConfig {
    pub fn new(location: DatabaseLocation) -> Self {
        Self {
            location,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout_ms: DEFAULT_ACQUIRE_TIMEOUT_MS,
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }

    pub fn with_max_connections(mut self, max_connections: usize) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Connections the pool may lease at once; memory databases get one.
    pub fn connection_limit(&self) -> usize {
        match self.location {
            DatabaseLocation::File(_) => self.max_connections,
            DatabaseLocation::Memory(_) => self.max_connections.min(1),
        }
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

/// Named databases served by one provider.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_database_name")]
    pub default_database: String,
    pub databases: BTreeMap<String, DatabaseConfig>,
}

impl ProviderConfig {
    /// Config with a single database registered under [`DEFAULT_DATABASE_NAME`].
    pub fn single(location: DatabaseLocation) -> Self {
        let mut databases = BTreeMap::new();
        databases.insert(
            DEFAULT_DATABASE_NAME.to_string(),
            DatabaseConfig::new(location),
        );
        Self {
            default_database: DEFAULT_DATABASE_NAME.to_string(),
            databases,
        }
    }

    pub fn with_database(mut self, name: impl Into<String>, config: DatabaseConfig) -> Self {
        self.databases.insert(name.into(), config);
        self
    }

    /// Parses a JSON config document and validates it.
    pub fn from_json_str(text: &str) -> DbResult<Self> {
        let config: Self = serde_json::from_str(text)
            .map_err(|err| DbError::InvalidConfig(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that the default database exists and pool limits are usable.
    pub fn validate(&self) -> DbResult<()> {
        if !self.databases.contains_key(&self.default_database) {
            return Err(DbError::InvalidConfig(format!(
                "default database `{}` is not configured",
                self.default_database
            )));
        }
        if let Some((name, _)) = self
            .databases
            .iter()
            .find(|(_, database)| database.max_connections == 0)
        {
            return Err(DbError::InvalidConfig(format!(
                "database `{name}` must allow at least one connection"
            )));
        }
        Ok(())
    }

    /// Resolves a requested name; the empty name means the default database.
    pub fn resolve<'a>(&'a self, name: &'a str) -> DbResult<(&'a str, &'a DatabaseConfig)> {
        let name = if name.is_empty() {
            self.default_database.as_str()
        } else {
            name
        };
        self.databases
            .get_key_value(name)
            .map(|(key, config)| (key.as_str(), config))
            .ok_or_else(|| DbError::UnknownDatabase(name.to_string()))
    }
}

fn default_database_name() -> String {
    DEFAULT_DATABASE_NAME.to_string()
}

fn default_max_connections() -> usize {
    DEFAULT_MAX_CONNECTIONS
}

fn default_acquire_timeout_ms() -> u64 {
    DEFAULT_ACQUIRE_TIMEOUT_MS
}

fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

#[cfg(test)]
mod tests {
    use super::{DatabaseConfig, DatabaseLocation, ProviderConfig, DEFAULT_DATABASE_NAME};
    use crate::db::DbError;
    use std::path::PathBuf;

    #[test]
    fn json_config_fills_defaults() {
        let config = ProviderConfig::from_json_str(
            r#"{
                "databases": {
                    "default": { "location": { "file": "/tmp/books.db" } },
                    "archive": {
                        "location": { "memory": "archive" },
                        "max_connections": 1
                    }
                }
            }"#,
        )
        .expect("config should parse");

        assert_eq!(config.default_database, DEFAULT_DATABASE_NAME);
        let (_, default_db) = config.resolve("").unwrap();
        assert_eq!(
            default_db.location,
            DatabaseLocation::File(PathBuf::from("/tmp/books.db"))
        );
        assert_eq!(default_db.max_connections, 4);
        let (name, archive) = config.resolve("archive").unwrap();
        assert_eq!(name, "archive");
        assert_eq!(archive.max_connections, 1);
    }

    #[test]
    fn missing_default_database_is_rejected() {
        let err = ProviderConfig::from_json_str(
            r#"{ "default_database": "main", "databases": {} }"#,
        )
        .expect_err("missing default must fail");
        assert!(matches!(err, DbError::InvalidConfig(message) if message.contains("main")));
    }

    #[test]
    fn unknown_name_fails_to_resolve() {
        let config = ProviderConfig::single(DatabaseLocation::Memory("resolve".to_string()));
        let err = config.resolve("other").unwrap_err();
        assert!(matches!(err, DbError::UnknownDatabase(name) if name == "other"));
    }

    #[test]
    fn memory_databases_lease_one_connection() {
        let memory = DatabaseConfig::new(DatabaseLocation::Memory("limit".to_string()))
            .with_max_connections(8);
        assert_eq!(memory.connection_limit(), 1);

        let file = DatabaseConfig::new(DatabaseLocation::File(PathBuf::from("/tmp/limit.db")))
            .with_max_connections(8);
        assert_eq!(file.connection_limit(), 8);
    }

    #[test]
    fn memory_location_uses_shared_cache_uri() {
        let location = DatabaseLocation::Memory("books".to_string());
        assert_eq!(location.open_target(), "file:books?mode=memory&cache=shared");
        assert_eq!(location.mode(), "memory");
    }
}
