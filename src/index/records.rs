//! Dataset record store: the single `dataset` row per indexed dataset.
//!
//! All functions take a `&Connection` so they work the same on a bare
//! connection (autocommit) and inside a [`crate::core::db::Transaction`].

use crate::core::error::{CatalogError, ConstraintKind, constraint_kind};
use crate::core::time;
use crate::index::model::{Product, document_checksum};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

/// A stored dataset row, before classification and lineage are resolved.
#[derive(Debug, Clone)]
pub struct DatasetRow {
    pub id: Uuid,
    pub dataset_type_ref: i64,
    pub metadata_type_ref: i64,
    pub metadata: Value,
    pub metadata_sha256: String,
    pub added: Option<DateTime<Utc>>,
    pub archived: Option<DateTime<Utc>>,
}

pub(crate) const DATASET_COLUMNS: &str =
    "d.id, d.dataset_type_ref, d.metadata_type_ref, d.metadata, d.metadata_sha256, d.added, d.archived";

pub(crate) fn map_dataset_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawDatasetRow> {
    Ok(RawDatasetRow {
        id: row.get(0)?,
        dataset_type_ref: row.get(1)?,
        metadata_type_ref: row.get(2)?,
        metadata: row.get(3)?,
        metadata_sha256: row.get(4)?,
        added: row.get(5)?,
        archived: row.get(6)?,
    })
}

/// Column values as SQLite hands them back.
pub(crate) struct RawDatasetRow {
    id: String,
    dataset_type_ref: i64,
    metadata_type_ref: i64,
    metadata: String,
    metadata_sha256: String,
    added: String,
    archived: Option<String>,
}

impl RawDatasetRow {
    pub(crate) fn decode(self) -> Result<DatasetRow, CatalogError> {
        Ok(DatasetRow {
            id: Uuid::parse_str(&self.id)?,
            dataset_type_ref: self.dataset_type_ref,
            metadata_type_ref: self.metadata_type_ref,
            metadata: serde_json::from_str(&self.metadata)?,
            metadata_sha256: self.metadata_sha256,
            added: time::parse_ts(&self.added),
            archived: self.archived.as_deref().and_then(time::parse_ts),
        })
    }
}

/// Creates the dataset row for `id`.
///
/// Returns `Ok(true)` when the row was created and `Ok(false)` when a row with
/// the same id and identical document already exists. A stored row with a
/// different document is a [`CatalogError::DuplicateRecord`]; the conflict is
/// detected by the primary key, never by a read-before-write.
pub fn insert_dataset(
    conn: &Connection,
    document: &Value,
    id: &Uuid,
    product: &Product,
) -> Result<bool, CatalogError> {
    let checksum = document_checksum(document);
    let id_text = id.to_string();
    let inserted = conn
        .execute(
            "INSERT INTO dataset(id, dataset_type_ref, metadata_type_ref, metadata, metadata_sha256, added)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO NOTHING",
            params![
                id_text,
                product.id,
                product.metadata_type.id,
                document.to_string(),
                checksum,
                time::now_rfc3339()
            ],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::ForeignKey) => CatalogError::MissingRecord {
                kind: "product",
                id: product.name.clone(),
            },
            _ => CatalogError::RusqliteError(e),
        })?;
    if inserted == 1 {
        debug!(dataset = %id, product = %product.name, "dataset row inserted");
        return Ok(true);
    }

    match stored_checksum(conn, id)? {
        Some(existing) if existing == checksum => Ok(false),
        _ => Err(CatalogError::DuplicateRecord {
            kind: "dataset",
            id: id_text,
        }),
    }
}

pub fn stored_checksum(conn: &Connection, id: &Uuid) -> Result<Option<String>, CatalogError> {
    Ok(conn
        .query_row(
            "SELECT metadata_sha256 FROM dataset WHERE id = ?1",
            params![id.to_string()],
            |row| row.get(0),
        )
        .optional()?)
}

/// Whether a row exists for `id`, archived or not. Sees uncommitted writes
/// of the transaction `conn` belongs to.
pub fn contains_dataset(conn: &Connection, id: &Uuid) -> Result<bool, CatalogError> {
    Ok(conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM dataset WHERE id = ?1)",
        params![id.to_string()],
        |row| row.get(0),
    )?)
}

pub fn get_dataset_row(conn: &Connection, id: &Uuid) -> Result<Option<DatasetRow>, CatalogError> {
    conn.query_row(
        &format!("SELECT {} FROM dataset d WHERE d.id = ?1", DATASET_COLUMNS),
        params![id.to_string()],
        map_dataset_row,
    )
    .optional()?
    .map(RawDatasetRow::decode)
    .transpose()
}

/// Marks a dataset archived. Returns `false` if it was already archived or is unknown.
pub fn archive_dataset(conn: &Connection, id: &Uuid) -> Result<bool, CatalogError> {
    let changed = conn.execute(
        "UPDATE dataset SET archived = ?2 WHERE id = ?1 AND archived IS NULL",
        params![id.to_string(), time::now_rfc3339()],
    )?;
    Ok(changed == 1)
}

/// Clears the archived flag. Returns `false` if the dataset was not archived.
pub fn restore_dataset(conn: &Connection, id: &Uuid) -> Result<bool, CatalogError> {
    let changed = conn.execute(
        "UPDATE dataset SET archived = NULL WHERE id = ?1 AND archived IS NOT NULL",
        params![id.to_string()],
    )?;
    Ok(changed == 1)
}
