//! cubeindex: a transactional metadata catalog for scientific datasets.
//!
//! **cubeindex records what a dataset is, where it came from, and where its
//! data lives.**
//!
//! # Core Guarantees
//!
//! - **Unique identity**: every dataset is keyed by its UUID; re-indexing an
//!   identical document is a no-op, a conflicting one is an error
//! - **Acyclic lineage**: source edges never dangle and never loop
//! - **Auditable locations**: URIs are added, archived, restored or removed,
//!   with history kept for everything except removal
//! - **All-or-nothing writes**: a dataset, its ancestors, its edges and its
//!   initial locations commit together or not at all
//!
//! # Architecture
//!
//! - [`core`]: configuration, errors, SQLite connections and transactions,
//!   schema and migrations
//! - [`index`]: the catalog itself, reached through [`index::Index`]
//!
//! ```no_run
//! use cubeindex::core::config::CatalogConfig;
//! use cubeindex::index::Index;
//!
//! # fn main() -> Result<(), cubeindex::core::error::CatalogError> {
//! let index = Index::new(CatalogConfig::for_path("/tmp/catalog.db"));
//! index.init_db(true)?;
//! for metadata_type in index.metadata_types().list()? {
//!     println!("{}", metadata_type.name);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # CLI
//!
//! ```bash
//! cubeindex database init
//! cubeindex product add ls8_telemetry.json
//! cubeindex dataset add scene.json --product ls8_telemetry --location file:///data/scene.json
//! cubeindex dataset search platform=LANDSAT_8
//! ```

mod cli;
pub mod core;
pub mod index;

use crate::cli::{
    Cli, Command, DatabaseCommand, DatasetCommand, LocationCommand, MetadataTypeCommand,
    ProductCommand,
};
use crate::core::config::CatalogConfig;
use crate::core::error::CatalogError;
use crate::core::{migration, time};
use crate::index::Index;
use crate::index::datasets::parse_id;
use crate::index::model::{Dataset, Predicate};
use clap::Parser;
use serde_json::{Map, Value, json};
use std::fs;
use std::path::Path;
use uuid::Uuid;

fn emit(cmd: &str, status: &str, extra: Value) -> Result<(), CatalogError> {
    let envelope = time::command_envelope(cmd, status, extra);
    println!("{}", serde_json::to_string_pretty(&envelope)?);
    Ok(())
}

fn read_json(path: &Path) -> Result<Value, CatalogError> {
    let content = fs::read_to_string(path).map_err(|e| {
        CatalogError::ValidationError(format!("cannot read {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        CatalogError::ValidationError(format!(
            "{} is not a JSON document (only JSON input is read): {}",
            path.display(),
            e
        ))
    })
}

fn parse_ids(raw: &[String]) -> Result<Vec<Uuid>, CatalogError> {
    raw.iter().map(|id| parse_id(id)).collect()
}

/// JSON view of a dataset, with its resolved sources nested by classifier.
pub fn dataset_view(dataset: &Dataset) -> Value {
    let sources: Map<String, Value> = dataset
        .sources
        .iter()
        .map(|(classifier, source)| (classifier.clone(), dataset_view(source)))
        .collect();
    json!({
        "id": dataset.id.to_string(),
        "product": dataset.product.name,
        "metadata_type": dataset.metadata_type().name,
        "locations": dataset.uris,
        "local_path": dataset.local_path().map(|p| p.display().to_string()),
        "indexed_time": dataset.indexed_time.map(time::format_ts),
        "archived_time": dataset.archived_time.map(time::format_ts),
        "sources": sources,
        "document": dataset.metadata_doc(),
    })
}

fn load_config(cli: &Cli) -> Result<CatalogConfig, CatalogError> {
    let mut config = CatalogConfig::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.db_path = db.clone();
    }
    Ok(config)
}

pub fn run() -> Result<(), CatalogError> {
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Command::Database(db_cli) => match db_cli.command {
            DatabaseCommand::Init { no_default_types } => {
                let index = Index::new(config);
                let created = index.init_db(!no_default_types)?;
                emit(
                    "database.init",
                    "ok",
                    json!({
                        "path": index.db().path().display().to_string(),
                        "created": created,
                        "default_types": !no_default_types,
                    }),
                )
            }
        },
        Command::Check => {
            let index = Index::connect(config)?;
            let version = index
                .db()
                .with_conn("check.version", migration::stored_version)?;
            emit(
                "check",
                "ok",
                json!({
                    "path": index.db().path().display().to_string(),
                    "schema_version": version,
                    "metadata_types": index.metadata_types().list()?.len(),
                    "products": index.products().list()?.len(),
                    "active_datasets": index.datasets().count(&[])?,
                }),
            )
        }
        Command::MetadataType(mt_cli) => {
            let index = Index::connect(config)?;
            match mt_cli.command {
                MetadataTypeCommand::Add { files } => {
                    let mut added = Vec::new();
                    for file in &files {
                        let metadata_type = index.metadata_types().add(&read_json(file)?)?;
                        added.push(json!({"id": metadata_type.id, "name": metadata_type.name}));
                    }
                    emit("metadata_type.add", "ok", json!({ "metadata_types": added }))
                }
                MetadataTypeCommand::List => {
                    let listed: Vec<Value> = index
                        .metadata_types()
                        .list()?
                        .into_iter()
                        .map(|mt| {
                            json!({
                                "id": mt.id,
                                "name": mt.name,
                                "description": mt.description(),
                                "search_fields": mt.search_field_names(),
                            })
                        })
                        .collect();
                    emit("metadata_type.list", "ok", json!({ "metadata_types": listed }))
                }
            }
        }
        Command::Product(product_cli) => {
            let index = Index::connect(config)?;
            match product_cli.command {
                ProductCommand::Add { files } => {
                    let mut added = Vec::new();
                    for file in &files {
                        let product = index.products().add_document(&read_json(file)?)?;
                        added.push(json!({
                            "id": product.id,
                            "name": product.name,
                            "metadata_type": product.metadata_type.name,
                        }));
                    }
                    emit("product.add", "ok", json!({ "products": added }))
                }
                ProductCommand::List => {
                    let listed: Vec<Value> = index
                        .products()
                        .list()?
                        .into_iter()
                        .map(|p| {
                            json!({
                                "id": p.id,
                                "name": p.name,
                                "metadata_type": p.metadata_type.name,
                                "description": p.description(),
                            })
                        })
                        .collect();
                    emit("product.list", "ok", json!({ "products": listed }))
                }
            }
        }
        Command::Dataset(dataset_cli) => run_dataset(Index::connect(config)?, dataset_cli.command),
        Command::Location(location_cli) => {
            run_location(Index::connect(config)?, location_cli.command)
        }
    }
}

fn run_dataset(index: Index, command: DatasetCommand) -> Result<(), CatalogError> {
    let datasets = index.datasets();
    match command {
        DatasetCommand::Add {
            file,
            product,
            locations,
            sources_policy,
        } => {
            let product = index.products().get_by_name(&product)?.ok_or_else(|| {
                CatalogError::MissingRecord {
                    kind: "product",
                    id: product.clone(),
                }
            })?;
            let mut dataset = Dataset::from_document_tree(product, read_json(&file)?, None)?;
            for uri in &locations {
                dataset = dataset.with_uri(uri);
            }
            let stored = datasets.add(&dataset, sources_policy)?;
            emit(
                "dataset.add",
                "ok",
                json!({ "sources_policy": sources_policy.as_str(), "dataset": dataset_view(&stored) }),
            )
        }
        DatasetCommand::Info { id } => match datasets.get(&parse_id(&id)?)? {
            Some(dataset) => emit("dataset.info", "ok", json!({ "dataset": dataset_view(&dataset) })),
            None => emit("dataset.info", "not_found", json!({ "id": id })),
        },
        DatasetCommand::Search { expressions, count } => {
            let predicates = expressions
                .iter()
                .map(|expr| Predicate::parse(expr))
                .collect::<Result<Vec<_>, _>>()?;
            if count {
                let n = datasets.count(&predicates)?;
                return emit("dataset.search", "ok", json!({ "count": n }));
            }
            let found = datasets.search_eager(&predicates)?;
            let views: Vec<Value> = found.iter().map(dataset_view).collect();
            emit(
                "dataset.search",
                "ok",
                json!({ "count": views.len(), "datasets": views }),
            )
        }
        DatasetCommand::Archive { ids } => {
            let parsed = parse_ids(&ids)?;
            datasets.archive(&parsed)?;
            emit("dataset.archive", "ok", json!({ "ids": ids }))
        }
        DatasetCommand::Restore { ids } => {
            let parsed = parse_ids(&ids)?;
            datasets.restore(&parsed)?;
            emit("dataset.restore", "ok", json!({ "ids": ids }))
        }
    }
}

fn run_location(index: Index, command: LocationCommand) -> Result<(), CatalogError> {
    let datasets = index.datasets();
    match command {
        LocationCommand::List { id, archived } => {
            let parsed = parse_id(&id)?;
            let uris = if archived {
                datasets.get_archived_locations(&parsed)?
            } else {
                datasets.get_locations(&parsed)?
            };
            emit(
                "location.list",
                "ok",
                json!({ "id": id, "archived": archived, "locations": uris }),
            )
        }
        LocationCommand::Add { id, uri } => {
            let changed = datasets.add_location(&parse_id(&id)?, &uri)?;
            emit("location.add", "ok", json!({ "id": id, "uri": uri, "changed": changed }))
        }
        LocationCommand::Remove { id, uri } => {
            let changed = datasets.remove_location(&parse_id(&id)?, &uri)?;
            emit("location.remove", "ok", json!({ "id": id, "uri": uri, "changed": changed }))
        }
        LocationCommand::Archive { id, uri } => {
            let changed = datasets.archive_location(&parse_id(&id)?, &uri)?;
            emit("location.archive", "ok", json!({ "id": id, "uri": uri, "changed": changed }))
        }
        LocationCommand::Restore { id, uri } => {
            let changed = datasets.restore_location(&parse_id(&id)?, &uri)?;
            emit("location.restore", "ok", json!({ "id": id, "uri": uri, "changed": changed }))
        }
        LocationCommand::Datasets { uri } => {
            let found = datasets.get_datasets_for_location(&uri)?;
            let ids: Vec<String> = found.iter().map(|d| d.id.to_string()).collect();
            emit("location.datasets", "ok", json!({ "uri": uri, "ids": ids }))
        }
    }
}
