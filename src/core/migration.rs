//! Schema creation, version tracking and migrations.
//!
//! - **Version tracking**: `schema_meta.schema_version` records the layout in use
//! - **Idempotent migrations**: safe to run multiple times
//! - A database written by a newer binary is refused rather than guessed at

use crate::core::error::CatalogError;
use crate::core::schemas;
use rusqlite::{Connection, OptionalExtension, params};
use tracing::info;

const VERSION_KEY: &str = "schema_version";

/// Migration definition
pub struct Migration {
    /// Schema version this migration produces
    pub target_version: u32,
    /// Human-readable description
    pub description: &'static str,
    pub up: fn(&Connection) -> Result<(), CatalogError>,
}

/// All migrations in chronological order.
pub fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        target_version: 1,
        description: "Create metadata_type, dataset_type, dataset, dataset_source and dataset_location",
        up: create_base_schema,
    }]
}

fn create_base_schema(conn: &Connection) -> Result<(), CatalogError> {
    for ddl in schemas::all_statements() {
        conn.execute(ddl, [])?;
    }
    Ok(())
}

/// Reads the stored schema version; `None` for an uninitialised database.
pub fn stored_version(conn: &Connection) -> Result<Option<u32>, CatalogError> {
    let has_meta: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_meta')",
        [],
        |row| row.get(0),
    )?;
    if !has_meta {
        return Ok(None);
    }
    let raw: Option<String> = conn
        .query_row(
            "SELECT value FROM schema_meta WHERE key = ?1",
            params![VERSION_KEY],
            |row| row.get(0),
        )
        .optional()?;
    raw.map(|v| {
        v.parse::<u32>().map_err(|_| {
            CatalogError::SchemaVersionError(format!("unreadable schema version '{}'", v))
        })
    })
    .transpose()
}

/// Bring the schema up to [`schemas::SCHEMA_VERSION`].
///
/// Returns `true` when the database was freshly created.
pub fn check_and_migrate(conn: &Connection) -> Result<bool, CatalogError> {
    let stored = stored_version(conn)?;
    match stored {
        Some(v) if v == schemas::SCHEMA_VERSION => return Ok(false),
        Some(v) if v > schemas::SCHEMA_VERSION => {
            return Err(CatalogError::SchemaVersionError(format!(
                "database schema v{} is newer than supported v{}",
                v,
                schemas::SCHEMA_VERSION
            )));
        }
        _ => {}
    }
    run_migrations(conn, stored.unwrap_or(0))?;
    Ok(stored.is_none())
}

fn run_migrations(conn: &Connection, from_version: u32) -> Result<(), CatalogError> {
    for migration in all_migrations()
        .into_iter()
        .filter(|m| m.target_version > from_version)
    {
        info!(
            version = migration.target_version,
            "migrating schema: {}", migration.description
        );
        (migration.up)(conn).map_err(|e| {
            CatalogError::DatabaseInitializationError(format!(
                "migration to v{} failed: {}",
                migration.target_version, e
            ))
        })?;
        conn.execute(
            "INSERT INTO schema_meta(key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![VERSION_KEY, migration.target_version.to_string()],
        )?;
    }
    Ok(())
}

/// Fails unless the database has been initialised at the current version.
pub fn ensure_current(conn: &Connection) -> Result<(), CatalogError> {
    match stored_version(conn)? {
        Some(v) if v == schemas::SCHEMA_VERSION => Ok(()),
        Some(v) => Err(CatalogError::SchemaVersionError(format!(
            "database schema v{} does not match supported v{}; run `cubeindex database init`",
            v,
            schemas::SCHEMA_VERSION
        ))),
        None => Err(CatalogError::DatabaseInitializationError(
            "database not initialised; run `cubeindex database init`".to_string(),
        )),
    }
}
