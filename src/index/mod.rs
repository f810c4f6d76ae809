//! The dataset catalog.
//!
//! [`Index`] is the root handle. It owns nothing but a [`Db`] (a config
//! value), so any number of indexes over different databases can live in one
//! process.

pub mod datasets;
pub mod defaults;
pub mod lineage;
pub mod locations;
pub mod metadata_types;
pub mod model;
pub mod products;
pub mod records;
pub mod search;

use crate::core::config::CatalogConfig;
use crate::core::db::Db;
use crate::core::error::CatalogError;
use crate::core::migration;
use datasets::DatasetResource;
use metadata_types::MetadataTypeResource;
use products::ProductResource;
use tracing::info;

#[derive(Debug, Clone)]
pub struct Index {
    db: Db,
}

impl Index {
    /// Handle on a database that may not be initialised yet.
    pub fn new(config: CatalogConfig) -> Self {
        Self {
            db: Db::new(config),
        }
    }

    /// Opens an initialised database, failing if the schema is missing or
    /// from a different version.
    pub fn connect(config: CatalogConfig) -> Result<Self, CatalogError> {
        let index = Self::new(config);
        index
            .db
            .with_conn("index.connect", migration::ensure_current)?;
        Ok(index)
    }

    /// Creates (or migrates) the schema, optionally installing the built-in
    /// metadata types. Returns `true` if the database was freshly created.
    pub fn init_db(&self, with_default_types: bool) -> Result<bool, CatalogError> {
        let created = self.db.with_transaction("index.init_db", |conn| {
            let created = migration::check_and_migrate(conn)?;
            if with_default_types {
                for definition in defaults::default_metadata_types() {
                    metadata_types::add_metadata_type(conn, &definition)?;
                }
            }
            Ok(created)
        })?;
        info!(path = %self.db.path().display(), created, "database initialised");
        Ok(created)
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    pub fn metadata_types(&self) -> MetadataTypeResource {
        MetadataTypeResource::new(self.db.clone())
    }

    pub fn products(&self) -> ProductResource {
        ProductResource::new(self.db.clone())
    }

    pub fn datasets(&self) -> DatasetResource {
        DatasetResource::new(self.db.clone())
    }
}
