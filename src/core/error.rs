use rusqlite::ffi;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("SQLite error: {0}")]
    RusqliteError(#[from] rusqlite::Error),
    #[error("I/O error: {0}")]
    IoError(#[from] io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
    #[error("Invalid UUID: {0}")]
    UuidError(#[from] uuid::Error),
    #[error("Duplicate {kind} record: {id}")]
    DuplicateRecord { kind: &'static str, id: String },
    #[error("Missing {kind} record: {id}")]
    MissingRecord { kind: &'static str, id: String },
    #[error("Document mismatch for {kind} {id}: {detail}")]
    DocumentMismatch {
        kind: &'static str,
        id: String,
        detail: String,
    },
    #[error("Lineage cycle: {child} cannot derive from {parent}")]
    LineageCycle { child: String, parent: String },
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Config error: {0}")]
    ConfigError(String),
    #[error("Failed to initialize database: {0}")]
    DatabaseInitializationError(String),
    #[error("Schema version error: {0}")]
    SchemaVersionError(String),
}

/// Storage-level constraint that rejected a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintKind {
    Unique,
    ForeignKey,
    Other,
}

impl CatalogError {
    /// Classifies a SQLite constraint violation, if this is one.
    pub fn constraint_kind(&self) -> Option<ConstraintKind> {
        match self {
            CatalogError::RusqliteError(err) => constraint_kind(err),
            _ => None,
        }
    }

    pub fn is_duplicate(&self) -> bool {
        matches!(self, CatalogError::DuplicateRecord { .. })
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, CatalogError::MissingRecord { .. })
    }

    pub fn is_mismatch(&self) -> bool {
        matches!(self, CatalogError::DocumentMismatch { .. })
    }
}

pub fn constraint_kind(err: &rusqlite::Error) -> Option<ConstraintKind> {
    let rusqlite::Error::SqliteFailure(code, _) = err else {
        return None;
    };
    if code.code != rusqlite::ErrorCode::ConstraintViolation {
        return None;
    }
    Some(match code.extended_code {
        ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE => {
            ConstraintKind::Unique
        }
        ffi::SQLITE_CONSTRAINT_FOREIGNKEY => ConstraintKind::ForeignKey,
        _ => ConstraintKind::Other,
    })
}

/// Check if an error is a SQLite busy/locked error that a caller may retry.
pub fn is_busy_error(err: &CatalogError) -> bool {
    match err {
        CatalogError::RusqliteError(rusqlite::Error::SqliteFailure(code, _)) => matches!(
            code.code,
            rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
        ),
        _ => false,
    }
}
