//! Connection and transaction management.
//!
//! Every call opens a fresh connection; callers own its lifetime. A
//! [`Transaction`] that is dropped without `commit()` is rolled back, so an
//! early return or `?` never leaves a half-written dataset behind.

use crate::core::config::CatalogConfig;
use crate::core::error::CatalogError;
use rusqlite::Connection;
use std::fs;
use std::ops::Deref;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

pub fn db_connect(config: &CatalogConfig) -> Result<Connection, CatalogError> {
    ensure_parent_dir(&config.db_path)?;
    let conn = Connection::open(&config.db_path)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    conn.query_row(
        &format!("PRAGMA journal_mode={};", config.journal_mode.pragma_value()),
        [],
        |_| Ok(()),
    )?;
    conn.execute_batch(&format!(
        "PRAGMA synchronous={}; PRAGMA foreign_keys=ON;",
        config.sync_mode.pragma_value()
    ))?;
    Ok(conn)
}

fn ensure_parent_dir(path: &Path) -> Result<(), CatalogError> {
    if path.is_dir() {
        return Err(CatalogError::ConfigError(format!(
            "database path {} is a directory",
            path.display()
        )));
    }
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(CatalogError::IoError)
        }
        _ => Ok(()),
    }
}

/// Handle on one catalog database. Cheap to clone; holds no open connection.
#[derive(Debug, Clone)]
pub struct Db {
    config: CatalogConfig,
}

impl Db {
    pub fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    /// A bare connection: every statement commits on its own.
    pub fn connect(&self) -> Result<Connection, CatalogError> {
        db_connect(&self.config)
    }

    /// Opens an explicit write transaction (`BEGIN IMMEDIATE`).
    pub fn begin(&self) -> Result<Transaction, CatalogError> {
        Transaction::begin(self.connect()?)
    }

    /// Execute a closure with a plain connection.
    pub fn with_conn<F, R>(&self, op_name: &str, f: F) -> Result<R, CatalogError>
    where
        F: FnOnce(&Connection) -> Result<R, CatalogError>,
    {
        let conn = self.connect()?;
        let result = f(&conn);
        if let Err(e) = &result {
            debug!(op = op_name, error = %e, "catalog operation failed");
        }
        result
    }

    /// Execute a closure inside a transaction: commit on `Ok`, roll back on `Err`.
    pub fn with_transaction<F, R>(&self, op_name: &str, f: F) -> Result<R, CatalogError>
    where
        F: FnOnce(&Connection) -> Result<R, CatalogError>,
    {
        let tx = self.begin()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                debug!(op = op_name, "transaction committed");
                Ok(value)
            }
            Err(e) => {
                debug!(op = op_name, error = %e, "rolling back transaction");
                if let Err(rollback_err) = tx.rollback() {
                    warn!(op = op_name, error = %rollback_err, "rollback failed");
                }
                Err(e)
            }
        }
    }
}

/// An open write transaction on its own connection.
///
/// Dereferences to [`Connection`], so every store primitive that takes
/// `&Connection` works inside it and sees its uncommitted writes.
pub struct Transaction {
    conn: Connection,
    finished: bool,
}

impl Transaction {
    fn begin(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch("BEGIN IMMEDIATE;")?;
        Ok(Self {
            conn,
            finished: false,
        })
    }

    pub fn commit(mut self) -> Result<(), CatalogError> {
        self.conn.execute_batch("COMMIT;")?;
        self.finished = true;
        Ok(())
    }

    pub fn rollback(mut self) -> Result<(), CatalogError> {
        self.finished = true;
        self.conn.execute_batch("ROLLBACK;")?;
        Ok(())
    }
}

impl Deref for Transaction {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if self.finished || self.conn.is_autocommit() {
            return;
        }
        warn!("transaction dropped without commit; rolling back");
        if let Err(e) = self.conn.execute_batch("ROLLBACK;") {
            warn!(error = %e, "rollback of abandoned transaction failed");
        }
    }
}
