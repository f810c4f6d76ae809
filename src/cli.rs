//! CLI struct definitions for the `cubeindex` command-line interface.
//!
//! All clap-derived types live here. Dispatch logic lives in `lib.rs`.

use crate::index::model::SourcesPolicy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    name = "cubeindex",
    version = env!("CARGO_PKG_VERSION"),
    about = "Transactional metadata catalog for scientific datasets: identity, lineage and storage-location history."
)]
pub(crate) struct Cli {
    /// Configuration file (TOML). Defaults to $CUBEINDEX_CONFIG when set.
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,
    /// Database file; overrides the configuration.
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Database lifecycle
    Database(DatabaseCli),
    /// Verify the database is initialised and report its contents
    Check,
    /// Metadata type definitions
    MetadataType(MetadataTypeCli),
    /// Products (dataset types)
    Product(ProductCli),
    /// Indexed datasets
    Dataset(DatasetCli),
    /// Dataset storage locations
    Location(LocationCli),
}

#[derive(clap::Args, Debug)]
pub(crate) struct DatabaseCli {
    #[clap(subcommand)]
    pub command: DatabaseCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DatabaseCommand {
    /// Create (or migrate) the schema
    Init {
        /// Do not install the built-in `eo` and `telemetry` metadata types.
        #[clap(long)]
        no_default_types: bool,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct MetadataTypeCli {
    #[clap(subcommand)]
    pub command: MetadataTypeCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum MetadataTypeCommand {
    /// Add metadata type definitions from JSON files
    Add {
        /// Metadata type definitions, one JSON document per file (YAML is not read).
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// List indexed metadata types
    List,
}

#[derive(clap::Args, Debug)]
pub(crate) struct ProductCli {
    #[clap(subcommand)]
    pub command: ProductCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum ProductCommand {
    /// Add product definitions from JSON files
    Add {
        /// Product definitions, one JSON document per file (YAML is not read).
        #[clap(required = true)]
        files: Vec<PathBuf>,
    },
    /// List indexed products
    List,
}

#[derive(clap::Args, Debug)]
pub(crate) struct DatasetCli {
    #[clap(subcommand)]
    pub command: DatasetCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum DatasetCommand {
    /// Index a dataset document (JSON) with its embedded lineage
    Add {
        /// Dataset document as JSON (YAML is not read).
        file: PathBuf,
        /// Product the dataset and its embedded sources belong to.
        #[clap(long)]
        product: String,
        /// Storage location URI; repeat for several, newest first.
        #[clap(long = "location")]
        locations: Vec<String>,
        /// How to treat declared source datasets.
        #[clap(long, value_enum, default_value_t = SourcesPolicy::Verify)]
        sources_policy: SourcesPolicy,
    },
    /// Show one dataset with its lineage and locations
    Info { id: String },
    /// Search active datasets: FIELD=VALUE or FIELD=LOW..HIGH
    Search {
        expressions: Vec<String>,
        /// Print only the number of matches.
        #[clap(long)]
        count: bool,
    },
    /// Archive datasets
    Archive {
        #[clap(required = true)]
        ids: Vec<String>,
    },
    /// Restore archived datasets
    Restore {
        #[clap(required = true)]
        ids: Vec<String>,
    },
}

#[derive(clap::Args, Debug)]
pub(crate) struct LocationCli {
    #[clap(subcommand)]
    pub command: LocationCommand,
}

#[derive(Subcommand, Debug)]
pub(crate) enum LocationCommand {
    /// List a dataset's locations, newest first
    List {
        id: String,
        /// List archived locations instead of active ones.
        #[clap(long)]
        archived: bool,
    },
    /// Add an active location
    Add { id: String, uri: String },
    /// Permanently remove an active location
    Remove { id: String, uri: String },
    /// Archive an active location
    Archive { id: String, uri: String },
    /// Restore an archived location
    Restore { id: String, uri: String },
    /// Datasets with an active location at exactly URI
    Datasets { uri: String },
}
