//! Dataset facade: the public entry point over records, lineage and locations.
//!
//! Writes run inside one `BEGIN IMMEDIATE` transaction per call; reads use a
//! plain connection and rebuild a fully linked [`Dataset`] (classification,
//! active locations and recursively resolved sources).

use crate::core::db::Db;
use crate::core::error::CatalogError;
use crate::index::lineage::{self, LineageGraph};
use crate::index::locations;
use crate::index::model::{Dataset, Predicate, Product, SourcesPolicy};
use crate::index::products::get_product;
use crate::index::records::{self, DatasetRow};
use crate::index::search;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

/// Parses a dataset id given as text.
pub fn parse_id(raw: &str) -> Result<Uuid, CatalogError> {
    Uuid::parse_str(raw.trim())
        .map_err(|e| CatalogError::ValidationError(format!("invalid dataset id '{}': {}", raw, e)))
}

/// Rebuilds datasets from rows, caching products and guarding against
/// lineage loops in corrupted stores.
struct Resolver<'c> {
    conn: &'c Connection,
    products: FxHashMap<i64, Product>,
}

impl<'c> Resolver<'c> {
    fn new(conn: &'c Connection) -> Self {
        Self {
            conn,
            products: FxHashMap::default(),
        }
    }

    fn product(&mut self, id: i64) -> Result<Product, CatalogError> {
        if let Some(product) = self.products.get(&id) {
            return Ok(product.clone());
        }
        let product = get_product(self.conn, id)?.ok_or_else(|| CatalogError::MissingRecord {
            kind: "product",
            id: id.to_string(),
        })?;
        self.products.insert(id, product.clone());
        Ok(product)
    }

    fn dataset(&mut self, row: DatasetRow, with_sources: bool) -> Result<Dataset, CatalogError> {
        let mut path = FxHashSet::default();
        self.build(row, with_sources, &mut path)
    }

    fn build(
        &mut self,
        row: DatasetRow,
        with_sources: bool,
        path: &mut FxHashSet<Uuid>,
    ) -> Result<Dataset, CatalogError> {
        let product = self.product(row.dataset_type_ref)?;
        let mut sources = BTreeMap::new();
        if with_sources {
            path.insert(row.id);
            for (classifier, parent) in lineage::get_source_edges(self.conn, &row.id)? {
                if path.contains(&parent) {
                    return Err(CatalogError::LineageCycle {
                        child: row.id.to_string(),
                        parent: parent.to_string(),
                    });
                }
                let parent_row = records::get_dataset_row(self.conn, &parent)?.ok_or_else(|| {
                    CatalogError::MissingRecord {
                        kind: "source dataset",
                        id: parent.to_string(),
                    }
                })?;
                sources.insert(classifier, self.build(parent_row, true, path)?);
            }
            path.remove(&row.id);
        }
        Ok(Dataset {
            id: row.id,
            product,
            document: row.metadata,
            uris: locations::get_locations(self.conn, &row.id)?,
            sources,
            indexed_time: row.added,
            archived_time: row.archived,
        })
    }
}

#[derive(Debug, Clone)]
pub struct DatasetResource {
    db: Db,
}

impl DatasetResource {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    /// Indexes `dataset` with its declared lineage and initial locations.
    ///
    /// Ancestors are resolved under `policy` before the dataset row is
    /// written; everything happens in one transaction, so any error leaves
    /// the catalog untouched. Re-adding an identical dataset is a no-op;
    /// re-adding it with a different document or different sources fails.
    pub fn add(&self, dataset: &Dataset, policy: SourcesPolicy) -> Result<Dataset, CatalogError> {
        let graph = LineageGraph::build(dataset)?;
        for uri in &dataset.uris {
            locations::validate_uri(uri)?;
        }
        let root = graph.root();
        let document = graph
            .stored_document(&root)
            .ok_or_else(|| CatalogError::MissingRecord {
                kind: "lineage node",
                id: root.to_string(),
            })?;

        let created = self.db.with_transaction("dataset.add", |conn| {
            if policy == SourcesPolicy::Verify {
                if let Some(stored) = records::stored_checksum(conn, &root)? {
                    if Some(stored.as_str()) != graph.checksum(&root)
                        || !lineage::stored_edges_match(conn, &graph, &root)?
                    {
                        return Err(CatalogError::DocumentMismatch {
                            kind: "dataset",
                            id: root.to_string(),
                            detail: "indexed document or sources differ from the ones being added"
                                .to_string(),
                        });
                    }
                }
            }
            lineage::resolve_sources(conn, &graph, policy)?;
            let created = records::insert_dataset(conn, document, &root, &dataset.product)?;
            // An indexed dataset's lineage is fixed at its first insert.
            let edges = if created {
                lineage::record_edges(conn, &graph, &root)?
            } else {
                lineage::require_stored_edges(conn, &graph, &root)?;
                0
            };
            // Oldest first, so the first listed URI ends up the newest.
            for uri in dataset.uris.iter().rev() {
                locations::add_location(conn, &root, uri)?;
            }
            debug!(dataset = %root, created, edges, "dataset add resolved");
            Ok(created)
        })?;

        if created {
            info!(dataset = %root, product = %dataset.product.name, %policy, "dataset indexed");
        }
        self.get(&root)?.ok_or_else(|| CatalogError::MissingRecord {
            kind: "dataset",
            id: root.to_string(),
        })
    }

    /// The dataset with classification, locations and lineage resolved.
    pub fn get(&self, id: &Uuid) -> Result<Option<Dataset>, CatalogError> {
        self.db.with_conn("dataset.get", |conn| {
            records::get_dataset_row(conn, id)?
                .map(|row| Resolver::new(conn).dataset(row, true))
                .transpose()
        })
    }

    /// Like [`get`](Self::get) but leaves `sources` empty.
    pub fn get_without_sources(&self, id: &Uuid) -> Result<Option<Dataset>, CatalogError> {
        self.db.with_conn("dataset.get_without_sources", |conn| {
            records::get_dataset_row(conn, id)?
                .map(|row| Resolver::new(conn).dataset(row, false))
                .transpose()
        })
    }

    /// Known datasets among `ids`, in the order given. Unknown ids are skipped.
    pub fn get_many(&self, ids: &[Uuid]) -> Result<Vec<Dataset>, CatalogError> {
        self.db.with_conn("dataset.get_many", |conn| {
            let mut resolver = Resolver::new(conn);
            let mut out = Vec::with_capacity(ids.len());
            for id in ids {
                if let Some(row) = records::get_dataset_row(conn, id)? {
                    out.push(resolver.dataset(row, true)?);
                }
            }
            Ok(out)
        })
    }

    pub fn has(&self, id: &Uuid) -> Result<bool, CatalogError> {
        self.db
            .with_conn("dataset.has", |conn| records::contains_dataset(conn, id))
    }

    /// Archives every listed dataset. Already archived or unknown ids are left alone.
    pub fn archive(&self, ids: &[Uuid]) -> Result<(), CatalogError> {
        let changed = self.db.with_transaction("dataset.archive", |conn| {
            let mut changed = 0;
            for id in ids {
                if records::archive_dataset(conn, id)? {
                    changed += 1;
                }
            }
            Ok(changed)
        })?;
        info!(requested = ids.len(), changed, "datasets archived");
        Ok(())
    }

    pub fn restore(&self, ids: &[Uuid]) -> Result<(), CatalogError> {
        let changed = self.db.with_transaction("dataset.restore", |conn| {
            let mut changed = 0;
            for id in ids {
                if records::restore_dataset(conn, id)? {
                    changed += 1;
                }
            }
            Ok(changed)
        })?;
        info!(requested = ids.len(), changed, "datasets restored");
        Ok(())
    }

    pub fn get_archived_time(&self, id: &Uuid) -> Result<Option<DateTime<Utc>>, CatalogError> {
        self.db.with_conn("dataset.get_archived_time", |conn| {
            Ok(records::get_dataset_row(conn, id)?.and_then(|row| row.archived))
        })
    }

    /// Active datasets matching every predicate, fully read before returning.
    pub fn search_eager(&self, predicates: &[Predicate]) -> Result<Vec<Dataset>, CatalogError> {
        self.db.with_conn("dataset.search_eager", |conn| {
            let rows = search::search_dataset_rows(conn, predicates)?;
            let mut resolver = Resolver::new(conn);
            rows.into_iter()
                .map(|row| resolver.dataset(row, false))
                .collect()
        })
    }

    pub fn count(&self, predicates: &[Predicate]) -> Result<u64, CatalogError> {
        self.db.with_conn("dataset.count", |conn| {
            search::count_datasets(conn, predicates)
        })
    }

    /// Datasets that list `id` among their sources.
    pub fn get_derived(&self, id: &Uuid) -> Result<Vec<Dataset>, CatalogError> {
        self.db.with_conn("dataset.get_derived", |conn| {
            let mut resolver = Resolver::new(conn);
            let mut out = Vec::new();
            for derived in lineage::get_derived_ids(conn, id)? {
                if let Some(row) = records::get_dataset_row(conn, &derived)? {
                    out.push(resolver.dataset(row, false)?);
                }
            }
            Ok(out)
        })
    }

    pub fn get_locations(&self, id: &Uuid) -> Result<Vec<String>, CatalogError> {
        self.db.with_conn("dataset.get_locations", |conn| {
            locations::get_locations(conn, id)
        })
    }

    pub fn get_archived_locations(&self, id: &Uuid) -> Result<Vec<String>, CatalogError> {
        self.db.with_conn("dataset.get_archived_locations", |conn| {
            locations::get_archived_locations(conn, id)
        })
    }

    pub fn get_archived_location_times(
        &self,
        id: &Uuid,
    ) -> Result<Vec<(String, DateTime<Utc>)>, CatalogError> {
        self.db.with_conn("dataset.get_archived_location_times", |conn| {
            locations::get_archived_location_times(conn, id)
        })
    }

    pub fn add_location(&self, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
        self.db.with_transaction("location.add", |conn| {
            locations::add_location(conn, id, uri)
        })
    }

    pub fn remove_location(&self, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
        self.db.with_transaction("location.remove", |conn| {
            locations::remove_location(conn, id, uri)
        })
    }

    pub fn archive_location(&self, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
        self.db.with_transaction("location.archive", |conn| {
            locations::archive_location(conn, id, uri)
        })
    }

    pub fn restore_location(&self, id: &Uuid, uri: &str) -> Result<bool, CatalogError> {
        self.db.with_transaction("location.restore", |conn| {
            locations::restore_location(conn, id, uri)
        })
    }

    /// Datasets with an active location at exactly `uri`.
    pub fn get_datasets_for_location(&self, uri: &str) -> Result<Vec<Dataset>, CatalogError> {
        self.db.with_conn("location.datasets", |conn| {
            let mut resolver = Resolver::new(conn);
            let mut out = Vec::new();
            for id in locations::get_dataset_ids_for_location(conn, uri)? {
                if let Some(row) = records::get_dataset_row(conn, &id)? {
                    out.push(resolver.dataset(row, false)?);
                }
            }
            Ok(out)
        })
    }
}
