//! Predicate → SQL translation for simple dataset searches.
//!
//! Built-in fields are `id`, `product` and `metadata_type`. Any other field
//! name is looked up in the `search_fields` of every metadata type; a dataset
//! matches when its own metadata type defines the field and the value at that
//! offset satisfies the predicate. Archived datasets never match.

use crate::core::error::CatalogError;
use crate::index::metadata_types::list_metadata_types;
use crate::index::model::{MetadataType, Predicate};
use crate::index::records::{DATASET_COLUMNS, DatasetRow, RawDatasetRow, map_dataset_row};
use rusqlite::Connection;
use rusqlite::types::Value as SqlValue;
use serde_json::Value;

const BUILTIN_FIELDS: &[&str] = &["id", "product", "metadata_type"];

/// A translated WHERE clause and its positional parameters.
#[derive(Debug, Default)]
pub struct WhereClause {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

/// SQLite JSON path for an offset, with every key quoted.
pub fn json_path(offset: &[String]) -> String {
    let mut path = String::from("$");
    for key in offset {
        path.push_str(".\"");
        path.push_str(&key.replace('"', "\\\""));
        path.push('"');
    }
    path
}

fn comparison(
    column: &str,
    predicate: &Predicate,
    params: &mut Vec<SqlValue>,
) -> Result<String, CatalogError> {
    match predicate {
        Predicate::Eq { value, .. } => {
            params.push(to_sql_value(value));
            Ok(format!("{} = ?", column))
        }
        Predicate::Range { field, low, high } => {
            let mut parts = Vec::new();
            if let Some(low) = low {
                params.push(to_sql_value(low));
                parts.push(format!("{} >= ?", column));
            }
            if let Some(high) = high {
                params.push(to_sql_value(high));
                parts.push(format!("{} <= ?", column));
            }
            if parts.is_empty() {
                return Err(CatalogError::ValidationError(format!(
                    "range on '{}' needs at least one bound",
                    field
                )));
            }
            Ok(parts.join(" AND "))
        }
    }
}

fn builtin_condition(
    predicate: &Predicate,
    params: &mut Vec<SqlValue>,
) -> Result<String, CatalogError> {
    let Predicate::Eq { field, value } = predicate else {
        return Err(CatalogError::ValidationError(format!(
            "'{}' only supports equality",
            predicate.field()
        )));
    };
    let text = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    match field.as_str() {
        "id" => {
            params.push(SqlValue::Text(text.to_lowercase()));
            Ok("d.id = ?".to_string())
        }
        "product" => {
            params.push(SqlValue::Text(text));
            Ok("d.dataset_type_ref IN (SELECT id FROM dataset_type WHERE name = ?)".to_string())
        }
        _ => {
            params.push(SqlValue::Text(text));
            Ok("d.metadata_type_ref IN (SELECT id FROM metadata_type WHERE name = ?)".to_string())
        }
    }
}

fn field_condition(
    predicate: &Predicate,
    metadata_types: &[MetadataType],
    params: &mut Vec<SqlValue>,
) -> Result<String, CatalogError> {
    let mut branches = Vec::new();
    for metadata_type in metadata_types {
        let Some(offset) = metadata_type.search_field_offset(predicate.field()) else {
            continue;
        };
        let column = format!("json_extract(d.metadata, '{}')", json_path(&offset).replace('\'', "''"));
        let cmp = comparison(&column, predicate, params)?;
        branches.push(format!("(d.metadata_type_ref = {} AND {})", metadata_type.id, cmp));
    }
    if branches.is_empty() {
        return Err(CatalogError::ValidationError(format!(
            "unknown search field '{}'",
            predicate.field()
        )));
    }
    Ok(format!("({})", branches.join(" OR ")))
}

/// Builds the WHERE clause for active datasets matching every predicate.
pub fn build_where(conn: &Connection, predicates: &[Predicate]) -> Result<WhereClause, CatalogError> {
    let mut clause = WhereClause {
        sql: "d.archived IS NULL".to_string(),
        params: Vec::new(),
    };
    let needs_types = predicates
        .iter()
        .any(|p| !BUILTIN_FIELDS.contains(&p.field()));
    let metadata_types = if needs_types {
        list_metadata_types(conn)?
    } else {
        Vec::new()
    };
    for predicate in predicates {
        let condition = if BUILTIN_FIELDS.contains(&predicate.field()) {
            builtin_condition(predicate, &mut clause.params)?
        } else {
            field_condition(predicate, &metadata_types, &mut clause.params)?
        };
        clause.sql.push_str(" AND ");
        clause.sql.push_str(&condition);
    }
    Ok(clause)
}

/// All matching rows, read in one pass, oldest first.
pub fn search_dataset_rows(
    conn: &Connection,
    predicates: &[Predicate],
) -> Result<Vec<DatasetRow>, CatalogError> {
    let clause = build_where(conn, predicates)?;
    let sql = format!(
        "SELECT {} FROM dataset d WHERE {} ORDER BY d.added, d.id",
        DATASET_COLUMNS, clause.sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(rusqlite::params_from_iter(clause.params.iter()), map_dataset_row)?;
    let mut raw: Vec<RawDatasetRow> = Vec::new();
    for row in rows {
        raw.push(row?);
    }
    raw.into_iter().map(RawDatasetRow::decode).collect()
}

pub fn count_datasets(conn: &Connection, predicates: &[Predicate]) -> Result<u64, CatalogError> {
    let clause = build_where(conn, predicates)?;
    let sql = format!("SELECT COUNT(*) FROM dataset d WHERE {}", clause.sql);
    let count: i64 = conn.query_row(
        &sql,
        rusqlite::params_from_iter(clause.params.iter()),
        |row| row.get(0),
    )?;
    Ok(u64::try_from(count).unwrap_or_default())
}
