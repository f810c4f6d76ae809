//! Products (dataset types): named classifications bound to a metadata type.

use crate::core::db::Db;
use crate::core::error::CatalogError;
use crate::core::time;
use crate::index::metadata_types::{get_metadata_type, get_metadata_type_by_name};
use crate::index::model::{Product, document_checksum};
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde_json::Value;
use tracing::info;

const SELECT_COLUMNS: &str = "SELECT id, name, metadata_type_ref, definition FROM dataset_type";

struct ProductRow {
    id: i64,
    name: String,
    metadata_type_ref: i64,
    definition: String,
}

fn map_row(row: &Row<'_>) -> rusqlite::Result<ProductRow> {
    Ok(ProductRow {
        id: row.get(0)?,
        name: row.get(1)?,
        metadata_type_ref: row.get(2)?,
        definition: row.get(3)?,
    })
}

fn resolve(conn: &Connection, row: ProductRow) -> Result<Product, CatalogError> {
    let metadata_type = get_metadata_type(conn, row.metadata_type_ref)?.ok_or_else(|| {
        CatalogError::MissingRecord {
            kind: "metadata type",
            id: row.metadata_type_ref.to_string(),
        }
    })?;
    Ok(Product {
        id: row.id,
        name: row.name,
        metadata_type,
        definition: serde_json::from_str(&row.definition)?,
    })
}

/// Inserts a product definition, or returns the stored one if identical.
///
/// The definition names its metadata type by name (`metadata_type`), which
/// must already be indexed.
pub fn add_product(conn: &Connection, definition: &Value) -> Result<Product, CatalogError> {
    let name = definition
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| {
            CatalogError::ValidationError("product definition needs a 'name'".to_string())
        })?;
    let metadata_type_name = definition
        .get("metadata_type")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CatalogError::ValidationError(format!(
                "product '{}' must name its 'metadata_type'",
                name
            ))
        })?;
    let metadata_type = get_metadata_type_by_name(conn, metadata_type_name)?.ok_or_else(|| {
        CatalogError::MissingRecord {
            kind: "metadata type",
            id: metadata_type_name.to_string(),
        }
    })?;

    let inserted = conn.execute(
        "INSERT INTO dataset_type(name, metadata_type_ref, definition, added)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT(name) DO NOTHING",
        params![
            name,
            metadata_type.id,
            definition.to_string(),
            time::now_rfc3339()
        ],
    )?;
    let stored = get_product_by_name(conn, name)?.ok_or_else(|| CatalogError::MissingRecord {
        kind: "product",
        id: name.to_string(),
    })?;
    if inserted == 0 && document_checksum(&stored.definition) != document_checksum(definition) {
        return Err(CatalogError::DocumentMismatch {
            kind: "product",
            id: name.to_string(),
            detail: "a different definition is already stored under this name".to_string(),
        });
    }
    if inserted > 0 {
        info!(name, id = stored.id, metadata_type = %metadata_type.name, "product added");
    }
    Ok(stored)
}

pub fn get_product(conn: &Connection, id: i64) -> Result<Option<Product>, CatalogError> {
    let row = conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_COLUMNS),
            params![id],
            map_row,
        )
        .optional()?;
    row.map(|r| resolve(conn, r)).transpose()
}

pub fn get_product_by_name(conn: &Connection, name: &str) -> Result<Option<Product>, CatalogError> {
    let row = conn
        .query_row(
            &format!("{} WHERE name = ?1", SELECT_COLUMNS),
            params![name],
            map_row,
        )
        .optional()?;
    row.map(|r| resolve(conn, r)).transpose()
}

pub fn list_products(conn: &Connection) -> Result<Vec<Product>, CatalogError> {
    let mut stmt = conn.prepare(&format!("{} ORDER BY id", SELECT_COLUMNS))?;
    let rows = stmt.query_map([], map_row)?;
    let mut raw = Vec::new();
    for row in rows {
        raw.push(row?);
    }
    raw.into_iter().map(|r| resolve(conn, r)).collect()
}

#[derive(Debug, Clone)]
pub struct ProductResource {
    db: Db,
}

impl ProductResource {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn add_document(&self, definition: &Value) -> Result<Product, CatalogError> {
        self.db
            .with_transaction("product.add", |conn| add_product(conn, definition))
    }

    pub fn get(&self, id: i64) -> Result<Option<Product>, CatalogError> {
        self.db.with_conn("product.get", |conn| get_product(conn, id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Option<Product>, CatalogError> {
        self.db
            .with_conn("product.get_by_name", |conn| get_product_by_name(conn, name))
    }

    pub fn list(&self) -> Result<Vec<Product>, CatalogError> {
        self.db.with_conn("product.list", list_products)
    }
}
