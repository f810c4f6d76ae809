//! Centralized table definitions for the catalog database.
//!
//! One SQLite file holds everything:
//! 1. metadata_type / dataset_type: classification records.
//! 2. dataset: one row per indexed dataset, soft-archived via `archived`.
//! 3. dataset_source: lineage edges, keyed by (child, classifier).
//! 4. dataset_location: location history; removal deletes, archival is soft.

pub const SCHEMA_VERSION: u32 = 1;

pub const SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS schema_meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const METADATA_TYPE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS metadata_type (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        definition TEXT NOT NULL,
        added TEXT NOT NULL
    )
";

pub const DATASET_TYPE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dataset_type (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE,
        metadata_type_ref INTEGER NOT NULL,
        definition TEXT NOT NULL,
        added TEXT NOT NULL,
        FOREIGN KEY(metadata_type_ref) REFERENCES metadata_type(id)
    )
";

pub const DATASET_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dataset (
        id TEXT PRIMARY KEY,
        dataset_type_ref INTEGER NOT NULL,
        metadata_type_ref INTEGER NOT NULL,
        metadata TEXT NOT NULL,
        metadata_sha256 TEXT NOT NULL,
        added TEXT NOT NULL,
        archived TEXT,
        FOREIGN KEY(dataset_type_ref) REFERENCES dataset_type(id),
        FOREIGN KEY(metadata_type_ref) REFERENCES metadata_type(id)
    )
";
pub const DATASET_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_dataset_type ON dataset(dataset_type_ref)";

pub const DATASET_SOURCE_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dataset_source (
        dataset_ref TEXT NOT NULL,
        classifier TEXT NOT NULL,
        source_dataset_ref TEXT NOT NULL,
        PRIMARY KEY(dataset_ref, classifier),
        FOREIGN KEY(dataset_ref) REFERENCES dataset(id),
        FOREIGN KEY(source_dataset_ref) REFERENCES dataset(id)
    )
";
pub const DATASET_SOURCE_SCHEMA_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_dataset_source_parent ON dataset_source(source_dataset_ref)";

pub const DATASET_LOCATION_SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS dataset_location (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        dataset_ref TEXT NOT NULL,
        uri TEXT NOT NULL,
        added TEXT NOT NULL,
        archived TEXT,
        FOREIGN KEY(dataset_ref) REFERENCES dataset(id)
    )
";
// At most one active row per (dataset, uri); archived rows are history.
pub const DATASET_LOCATION_SCHEMA_ACTIVE_INDEX: &str = "
    CREATE UNIQUE INDEX IF NOT EXISTS uq_dataset_location_active
        ON dataset_location(dataset_ref, uri) WHERE archived IS NULL
";
pub const DATASET_LOCATION_SCHEMA_URI_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_dataset_location_uri ON dataset_location(uri)";

/// All DDL statements in creation order.
pub fn all_statements() -> [&'static str; 10] {
    [
        SCHEMA_META,
        METADATA_TYPE_SCHEMA,
        DATASET_TYPE_SCHEMA,
        DATASET_SCHEMA,
        DATASET_SCHEMA_INDEX,
        DATASET_SOURCE_SCHEMA,
        DATASET_SOURCE_SCHEMA_INDEX,
        DATASET_LOCATION_SCHEMA,
        DATASET_LOCATION_SCHEMA_ACTIVE_INDEX,
        DATASET_LOCATION_SCHEMA_URI_INDEX,
    ]
}
