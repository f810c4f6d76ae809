//! Location ledger: where each dataset's data lives, with history.
//!
//! Row states form a small machine independent of the dataset's own
//! archived flag:
//!
//! ```text
//! (none) --add--> active --archive--> archived --restore--> active
//!                   |
//!                   +--remove--> (none)      // hard delete, irreversible
//! ```
//!
//! Listing order is `added` descending; restore keeps the original `added`.

use crate::core::error::{CatalogError, ConstraintKind, constraint_kind};
use crate::core::time;
use crate::index::model::LocationState;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Rejects strings that are not absolute URIs (`scheme:...`).
pub fn validate_uri(uri: &str) -> Result<(), CatalogError> {
    Url::parse(uri)
        .map(|_| ())
        .map_err(|e| CatalogError::ValidationError(format!("invalid location URI '{}': {}", uri, e)))
}

/// Adds an active location. Returns `false` if that URI is already active.
pub fn add_location(conn: &Connection, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
    validate_uri(uri)?;
    let inserted = conn
        .execute(
            "INSERT INTO dataset_location(dataset_ref, uri, added) VALUES (?1, ?2, ?3)
             ON CONFLICT DO NOTHING",
            params![id.to_string(), uri, time::now_rfc3339()],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::ForeignKey) => CatalogError::MissingRecord {
                kind: "dataset",
                id: id.to_string(),
            },
            _ => CatalogError::RusqliteError(e),
        })?;
    if inserted == 1 {
        debug!(dataset = %id, uri, "location added");
    }
    Ok(inserted == 1)
}

/// Deletes the active row for `uri`. Returns `false` if there was none.
pub fn remove_location(conn: &Connection, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
    let removed = conn.execute(
        "DELETE FROM dataset_location
         WHERE dataset_ref = ?1 AND uri = ?2 AND archived IS NULL",
        params![id.to_string(), uri],
    )?;
    Ok(removed > 0)
}

/// Moves the active row for `uri` to archived.
pub fn archive_location(conn: &Connection, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
    let changed = conn.execute(
        "UPDATE dataset_location SET archived = ?3
         WHERE dataset_ref = ?1 AND uri = ?2 AND archived IS NULL",
        params![id.to_string(), uri, time::now_rfc3339()],
    )?;
    Ok(changed > 0)
}

/// Re-activates the most recently archived row for `uri`.
///
/// Returns `false` if nothing is archived for that URI, or if the URI has
/// since been re-added as an active location.
pub fn restore_location(conn: &Connection, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
    let changed = conn.execute(
        "UPDATE dataset_location SET archived = NULL
         WHERE id = (
             SELECT id FROM dataset_location
             WHERE dataset_ref = ?1 AND uri = ?2 AND archived IS NOT NULL
             ORDER BY archived DESC, id DESC LIMIT 1
         )
         AND NOT EXISTS (
             SELECT 1 FROM dataset_location
             WHERE dataset_ref = ?1 AND uri = ?2 AND archived IS NULL
         )",
        params![id.to_string(), uri],
    )?;
    Ok(changed > 0)
}

fn query_uris(conn: &Connection, sql: &str, id: &Uuid) -> Result<Vec<String>, CatalogError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?);
    }
    Ok(out)
}

/// Active URIs, newest first.
pub fn get_locations(conn: &Connection, id: &Uuid) -> Result<Vec<String>, CatalogError> {
    query_uris(
        conn,
        "SELECT uri FROM dataset_location
         WHERE dataset_ref = ?1 AND archived IS NULL
         ORDER BY added DESC, id DESC",
        id,
    )
}

/// Archived URIs, newest first (by when they were added).
pub fn get_archived_locations(conn: &Connection, id: &Uuid) -> Result<Vec<String>, CatalogError> {
    query_uris(
        conn,
        "SELECT uri FROM dataset_location
         WHERE dataset_ref = ?1 AND archived IS NOT NULL
         ORDER BY added DESC, id DESC",
        id,
    )
}

/// Archived URIs together with when each was archived, newest archival first.
pub fn get_archived_location_times(
    conn: &Connection,
    id: &Uuid,
) -> Result<Vec<(String, DateTime<Utc>)>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT uri, archived FROM dataset_location
         WHERE dataset_ref = ?1 AND archived IS NOT NULL
         ORDER BY archived DESC, id DESC",
    )?;
    let rows = stmt.query_map(params![id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (uri, archived) = row?;
        if let Some(ts) = time::parse_ts(&archived) {
            out.push((uri, ts));
        }
    }
    Ok(out)
}

/// Current state of the newest row for `uri`, if any row exists.
pub fn location_state(
    conn: &Connection,
    id: &Uuid,
    uri: &str,
) -> Result<Option<LocationState>, CatalogError> {
    let archived: Option<Option<String>> = conn
        .query_row(
            "SELECT archived FROM dataset_location
             WHERE dataset_ref = ?1 AND uri = ?2
             ORDER BY archived IS NOT NULL, id DESC LIMIT 1",
            params![id.to_string(), uri],
            |row| row.get(0),
        )
        .optional()?;
    Ok(archived.map(|a| match a {
        None => LocationState::Active,
        Some(_) => LocationState::Archived,
    }))
}

/// Datasets with an *active* row for exactly `uri`, oldest location first.
pub fn get_dataset_ids_for_location(conn: &Connection, uri: &str) -> Result<Vec<Uuid>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT dataset_ref FROM dataset_location
         WHERE uri = ?1 AND archived IS NULL
         ORDER BY added, id",
    )?;
    let rows = stmt.query_map(params![uri], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(Uuid::parse_str(&row?)?);
    }
    Ok(out)
}
