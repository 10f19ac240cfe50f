//! Transaction boundary shared by every peer operation.
//!
//! # Invariants
//! - A caller-supplied connection is used as-is: no commit, no rollback.
//! - An owned transaction is committed on `Ok` and rolled back on `Err`.
//! - A rollback failure is logged and never replaces the triggering error.
//! - The lease goes back to the provider on every path, panics included.

use super::provider::{ConnectionLease, ConnectionProvider};
use crate::peer::{PeerError, PeerResult};
use log::{debug, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::time::Instant;

/// Runs `work` inside a transaction on `database_name`.
///
/// With `Some(conn)` the work participates in the caller's unit of work and
/// the caller owns commit/rollback. With `None` a connection is leased from
/// `provider` and a transaction is opened, committed or rolled back here.
pub fn run_in_transaction<T, F>(
    provider: &dyn ConnectionProvider,
    database_name: &str,
    connection: Option<&Connection>,
    work: F,
) -> PeerResult<T>
where
    F: FnOnce(&Connection) -> PeerResult<T>,
{
    if let Some(conn) = connection {
        return work(conn);
    }

    let lease = ConnectionLease::acquire(provider, database_name)?;
    run_owned(&lease, database_name, work)
}

fn run_owned<T, F>(conn: &Connection, database_name: &str, work: F) -> PeerResult<T>
where
    F: FnOnce(&Connection) -> PeerResult<T>,
{
    let started_at = Instant::now();
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;

    match work(&tx) {
        Ok(value) => {
            tx.commit()?;
            debug!(
                "event=tx_commit module=tx status=ok database={} duration_ms={}",
                database_name,
                started_at.elapsed().as_millis()
            );
            Ok(value)
        }
        Err(err) => {
            safe_rollback(tx, database_name, &err);
            Err(err)
        }
    }
}

fn safe_rollback(tx: Transaction<'_>, database_name: &str, cause: &PeerError) {
    match tx.rollback() {
        Ok(()) => debug!(
            "event=tx_rollback module=tx status=ok database={database_name} cause={cause}"
        ),
        Err(rollback_err) => warn!(
            "event=tx_rollback module=tx status=error database={database_name} cause={cause} error={rollback_err}"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::run_in_transaction;
    use crate::db::{DatabaseLocation, ProviderConfig, SqliteConnectionProvider};
    use crate::peer::PeerError;
    use rusqlite::Connection;

    fn provider(name: &str) -> SqliteConnectionProvider {
        fn schema(conn: &Connection) -> crate::db::DbResult<()> {
            conn.execute_batch("CREATE TABLE IF NOT EXISTS t (id INTEGER PRIMARY KEY);")?;
            Ok(())
        }
        SqliteConnectionProvider::new(ProviderConfig::single(DatabaseLocation::Memory(
            name.to_string(),
        )))
        .unwrap()
        .with_bootstrap(schema)
    }

    fn count_rows(provider: &SqliteConnectionProvider) -> i64 {
        run_in_transaction(provider, "", None, |conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM t;", [], |row| row.get(0))?)
        })
        .unwrap()
    }

    #[test]
    fn owned_transaction_commits_on_success() {
        let provider = provider("tx-commit");
        run_in_transaction(&provider, "", None, |conn| {
            conn.execute("INSERT INTO t (id) VALUES (1);", [])?;
            Ok(())
        })
        .unwrap();

        assert_eq!(count_rows(&provider), 1);
        assert_eq!(provider.leased_count(""), 0);
    }

    #[test]
    fn owned_transaction_rolls_back_and_keeps_original_error() {
        let provider = provider("tx-rollback");
        let err = run_in_transaction(&provider, "", None, |conn| {
            conn.execute("INSERT INTO t (id) VALUES (1);", [])?;
            Err::<(), _>(PeerError::Precondition("stop".to_string()))
        })
        .unwrap_err();

        assert!(matches!(err, PeerError::Precondition(message) if message == "stop"));
        assert_eq!(count_rows(&provider), 0);
        assert_eq!(provider.leased_count(""), 0);
    }

    #[test]
    fn participating_work_is_not_committed_by_the_boundary() {
        let provider = provider("tx-participate");
        assert_eq!(count_rows(&provider), 0);
        let conn = Connection::open("file:tx-participate?mode=memory&cache=shared").unwrap();
        conn.execute_batch("BEGIN;").unwrap();

        run_in_transaction(&provider, "", Some(&conn), |conn| {
            conn.execute("INSERT INTO t (id) VALUES (7);", [])?;
            Ok(())
        })
        .unwrap();

        assert!(!conn.is_autocommit());
        assert_eq!(provider.leased_count(""), 0);
        conn.execute_batch("ROLLBACK;").unwrap();
        assert_eq!(count_rows(&provider), 0);
    }
}
