//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or shared-cache in-memory SQLite connections.
//! - Configure connection pragmas required by peer behavior.
//! - Run the provider's bootstrap hook before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON`.
//! - Returned connections have the bootstrap hook fully applied.

use super::config::DatabaseConfig;
use super::provider::BootstrapFn;
use super::DbResult;
use log::{error, info};
use rusqlite::Connection;
use std::time::Instant;

/// Opens one connection for a configured database.
///
/// # Side effects
/// - Runs `bootstrap` (for example schema creation) on the fresh connection.
/// - Emits `db_open` logging events with duration and status.
pub fn open_connection(
    database: &str,
    config: &DatabaseConfig,
    bootstrap: Option<BootstrapFn>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    let mode = config.location.mode();
    info!("event=db_open module=db status=start database={database} mode={mode}");

    let conn = match Connection::open(config.location.open_target()) {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error database={} mode={} duration_ms={} error_code=db_open_failed error={}",
                database,
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, config, bootstrap) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok database={} mode={} duration_ms={}",
                database,
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error database={} mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                database,
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &Connection,
    config: &DatabaseConfig,
    bootstrap: Option<BootstrapFn>,
) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(config.busy_timeout())?;
    if let Some(bootstrap) = bootstrap {
        bootstrap(conn)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::open_connection;
    use crate::db::{DatabaseConfig, DatabaseLocation};

    #[test]
    fn opened_connection_enforces_foreign_keys() {
        let config = DatabaseConfig::new(DatabaseLocation::Memory("open-fk".to_string()));
        let conn = open_connection("default", &config, None).unwrap();
        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn bootstrap_failure_is_reported() {
        fn broken(conn: &rusqlite::Connection) -> crate::db::DbResult<()> {
            conn.execute_batch("CREATE TABLE;")?;
            Ok(())
        }

        let config = DatabaseConfig::new(DatabaseLocation::Memory("open-broken".to_string()));
        assert!(open_connection("default", &config, Some(broken)).is_err());
    }
}
