//! Connection provider contract and bounded SQLite implementation.
//!
//! # Responsibility
//! - Hand out exclusive connection leases per named database.
//! - Bound concurrent leases and time out waiting acquirers.
//!
//! # Invariants
//! - `leased` never exceeds the database's `connection_limit()`.
//! - Only connections in autocommit mode (no open transaction) return to the
//!   idle list.

use super::config::ProviderConfig;
use super::open::open_connection;
use super::{DbError, DbResult};
use log::{debug, warn};
use rusqlite::Connection;
use std::collections::HashMap;
use std::ops::Deref;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Hook run once on every freshly opened connection.
pub type BootstrapFn = fn(&Connection) -> DbResult<()>;

/// Source of connections for the transaction boundary.
///
/// The empty database name selects the provider's default database.
pub trait ConnectionProvider: Send + Sync {
    /// Leases one connection, blocking until one is available.
    fn acquire(&self, database_name: &str) -> DbResult<Connection>;
    /// Returns a leased connection.
    fn release(&self, database_name: &str, conn: Connection);
}

/// RAII lease: returns the connection to its provider when dropped.
pub struct ConnectionLease<'p> {
    provider: &'p dyn ConnectionProvider,
    database_name: String,
    conn: Option<Connection>,
}

impl<'p> ConnectionLease<'p> {
    pub fn acquire(provider: &'p dyn ConnectionProvider, database_name: &str) -> DbResult<Self> {
        let conn = provider.acquire(database_name)?;
        Ok(Self {
            provider,
            database_name: database_name.to_string(),
            conn: Some(conn),
        })
    }

    pub fn database_name(&self) -> &str {
        &self.database_name
    }
}

impl Deref for ConnectionLease<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        match &self.conn {
            Some(conn) => conn,
            None => unreachable!("connection lease is only emptied on drop"),
        }
    }
}

impl Drop for ConnectionLease<'_> {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.provider.release(&self.database_name, conn);
        }
    }
}

#[derive(Default)]
struct PoolState {
    idle: Vec<Connection>,
    leased: usize,
}

/// Config-driven SQLite provider with a small per-database lease pool.
pub struct SqliteConnectionProvider {
    config: ProviderConfig,
    bootstrap: Option<BootstrapFn>,
    pools: Mutex<HashMap<String, PoolState>>,
    returned: Condvar,
}

impl SqliteConnectionProvider {
    pub fn new(config: ProviderConfig) -> DbResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            bootstrap: None,
            pools: Mutex::new(HashMap::new()),
            returned: Condvar::new(),
        })
    }

    /// Runs `bootstrap` on every connection this provider opens.
    pub fn with_bootstrap(mut self, bootstrap: BootstrapFn) -> Self {
        self.bootstrap = Some(bootstrap);
        self
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Number of connections currently leased for `database_name`.
    pub fn leased_count(&self, database_name: &str) -> usize {
        self.pool_stat(database_name, |pool| pool.leased)
    }

    /// Number of open connections waiting in the idle list.
    pub fn idle_count(&self, database_name: &str) -> usize {
        self.pool_stat(database_name, |pool| pool.idle.len())
    }

    fn pool_stat(&self, database_name: &str, stat: impl Fn(&PoolState) -> usize) -> usize {
        let Ok((name, _)) = self.config.resolve(database_name) else {
            return 0;
        };
        self.lock_pools().get(name).map_or(0, stat)
    }

    fn lock_pools(&self) -> MutexGuard<'_, HashMap<String, PoolState>> {
        self.pools.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ConnectionProvider for SqliteConnectionProvider {
    fn acquire(&self, database_name: &str) -> DbResult<Connection> {
        let (name, config) = self.config.resolve(database_name)?;
        let started_at = Instant::now();
        let deadline = started_at + config.acquire_timeout();
        let mut pools = self.lock_pools();

        loop {
            let pool = pools.entry(name.to_string()).or_default();
            if let Some(conn) = pool.idle.pop() {
                pool.leased += 1;
                debug!("event=conn_acquire module=db status=ok database={name} source=idle");
                return Ok(conn);
            }

            if pool.leased < config.connection_limit() {
                pool.leased += 1;
                drop(pools);
                return match open_connection(name, config, self.bootstrap) {
                    Ok(conn) => {
                        debug!("event=conn_acquire module=db status=ok database={name} source=open");
                        Ok(conn)
                    }
                    Err(err) => {
                        if let Some(pool) = self.lock_pools().get_mut(name) {
                            pool.leased = pool.leased.saturating_sub(1);
                        }
                        self.returned.notify_one();
                        Err(err)
                    }
                };
            }

            let now = Instant::now();
            if now >= deadline {
                let waited_ms = started_at.elapsed().as_millis();
                warn!(
                    "event=conn_acquire module=db status=error database={name} error_code=pool_timeout waited_ms={waited_ms}"
                );
                return Err(DbError::PoolTimeout {
                    database: name.to_string(),
                    waited_ms,
                });
            }

            let (guard, _) = self
                .returned
                .wait_timeout(pools, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            pools = guard;
        }
    }

    fn release(&self, database_name: &str, conn: Connection) {
        let Ok((name, _)) = self.config.resolve(database_name) else {
            return;
        };

        let mut pools = self.lock_pools();
        if let Some(pool) = pools.get_mut(name) {
            pool.leased = pool.leased.saturating_sub(1);
            if conn.is_autocommit() {
                pool.idle.push(conn);
            } else {
                warn!(
                    "event=conn_release module=db status=discarded database={name} reason=open_transaction"
                );
            }
        }
        drop(pools);
        self.returned.notify_one();
    }
}
