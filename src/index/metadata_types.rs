//! Metadata types: the structural description of a family of dataset documents.

use crate::core::db::Db;
use crate::core::error::CatalogError;
use crate::core::time;
use crate::index::model::{MetadataType, document_checksum};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use tracing::info;

const SELECT_COLUMNS: &str = "SELECT id, name, definition FROM metadata_type";

fn map_row(row: &Row<'_>) -> rusqlite::Result<(i64, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
}

fn from_parts((id, name, definition): (i64, String, String)) -> Result<MetadataType, CatalogError> {
    Ok(MetadataType {
        id,
        name,
        definition: serde_json::from_str(&definition)?,
    })
}

fn definition_name(definition: &Value) -> Result<&str, CatalogError> {
    let name = definition
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| {
            CatalogError::ValidationError("metadata type definition needs a 'name'".to_string())
        })?;
    if let Some(section) = definition.get("dataset") {
        if !section.is_object() {
            return Err(CatalogError::ValidationError(format!(
                "metadata type '{}': 'dataset' must be an object",
                name
            )));
        }
    }
    Ok(name)
}

/// Inserts a metadata type, or returns the stored one if identical.
pub fn add_metadata_type(conn: &Connection, definition: &Value) -> Result<MetadataType, CatalogError> {
    let name = definition_name(definition)?;
    let inserted = conn.execute(
        "INSERT INTO metadata_type(name, definition, added) VALUES (?1, ?2, ?3)
         ON CONFLICT(name) DO NOTHING",
        params![name, definition.to_string(), time::now_rfc3339()],
    )?;
    let stored = get_metadata_type_by_name(conn, name)?.ok_or_else(|| {
        CatalogError::MissingRecord {
            kind: "metadata type",
            id: name.to_string(),
        }
    })?;
    if inserted == 0 && document_checksum(&stored.definition) != document_checksum(definition) {
        return Err(CatalogError::DocumentMismatch {
            kind: "metadata type",
            id: name.to_string(),
            detail: "a different definition is already stored under this name".to_string(),
        });
    }
    if inserted > 0 {
        info!(name, id = stored.id, "metadata type added");
    }
    Ok(stored)
}

pub fn get_metadata_type(conn: &Connection, id: i64) -> Result<Option<MetadataType>, CatalogError> {
    conn.query_row(
        &format!("{} WHERE id = ?1", SELECT_COLUMNS),
        params![id],
        map_row,
    )
    .optional()?
    .map(from_parts)
    .transpose()
}

pub fn get_metadata_type_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<MetadataType>, CatalogError> {
    conn.query_row(
        &format!("{} WHERE name = ?1", SELECT_COLUMNS),
        params![name],
        map_row,
    )
    .optional()?
    .map(from_parts)
    .transpose()
}

pub fn list_metadata_types(conn: &Connection) -> Result<Vec<MetadataType>, CatalogError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
    let rows = stmt.query_map([], map_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(from_parts(row?)?);
    }
    Ok(out)
}

/// Catalog-facing access to metadata types.
#[derive(Debug, Clone)]
pub struct MetadataTypeResource {
    db: Db,
}

impl MetadataTypeResource {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn add(&self, definition: &Value) -> Result<MetadataType, CatalogError> {
        self.db
            .with_transaction("metadata_type.add", |conn| add_metadata_type(conn, definition))
    }

    pub fn get(&self, id: i64) -> Result<Option<MetadataType>, CatalogError> {
        self.db
            .with_conn("metadata_type.get", |conn| get_metadata_type(conn, id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<MetadataType>, CatalogError> {
        self.db.with_conn("metadata_type.get_by_name", |conn| {
            get_metadata_type_by_name(conn, name)
        })
    }

    pub fn list(&self) -> Result<Vec<MetadataType>, CatalogError> {
        self.db
            .with_conn("metadata_type.list", list_metadata_types)
    }
}
