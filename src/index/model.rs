//! In-memory catalog records.
//!
//! A [`Dataset`] carries its classification ([`Product`] → [`MetadataType`]),
//! its raw document, the URIs it lives at and a map of named source datasets.
//! The sources map is how callers *declare* lineage; once stored, lineage is
//! kept as separate edges and the stored document has its sources emptied.

use crate::core::error::CatalogError;
use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;
use uuid::Uuid;

const DEFAULT_ID_OFFSET: &[&str] = &["id"];
const DEFAULT_SOURCES_OFFSET: &[&str] = &["lineage", "source_datasets"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetadataType {
    pub id: i64,
    pub name: String,
    pub definition: Value,
}

impl MetadataType {
    pub fn description(&self) -> Option<&str> {
        self.definition.get("description").and_then(Value::as_str)
    }

    fn dataset_section(&self) -> Option<&Value> {
        self.definition.get("dataset")
    }

    fn offset(&self, key: &str, default: &[&str]) -> Vec<String> {
        self.dataset_section()
            .and_then(|d| d.get(key))
            .and_then(offset_from_value)
            .unwrap_or_else(|| default.iter().map(|s| s.to_string()).collect())
    }

    /// Where a dataset document keeps its UUID.
    pub fn id_offset(&self) -> Vec<String> {
        self.offset("id", DEFAULT_ID_OFFSET)
    }

    /// Where a dataset document keeps its `classifier -> document` lineage map.
    pub fn sources_offset(&self) -> Vec<String> {
        self.offset("sources", DEFAULT_SOURCES_OFFSET)
    }

    pub fn search_field_names(&self) -> Vec<String> {
        self.dataset_section()
            .and_then(|d| d.get("search_fields"))
            .and_then(Value::as_object)
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn search_field_offset(&self, name: &str) -> Option<Vec<String>> {
        self.dataset_section()?
            .get("search_fields")?
            .get(name)?
            .get("offset")
            .and_then(offset_from_value)
    }
}

fn offset_from_value(value: &Value) -> Option<Vec<String>> {
    let parts = value.as_array()?;
    let offset: Option<Vec<String>> = parts
        .iter()
        .map(|p| p.as_str().map(str::to_string))
        .collect();
    offset.filter(|o| !o.is_empty())
}

/// A named dataset classification ("dataset type").
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub metadata_type: MetadataType,
    pub definition: Value,
}

impl Product {
    pub fn description(&self) -> Option<&str> {
        self.definition.get("description").and_then(Value::as_str)
    }

    /// Document fragment that member datasets are expected to match.
    pub fn metadata(&self) -> Option<&Value> {
        self.definition.get("metadata")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SourcesPolicy {
    /// Insert any missing ancestors first.
    Ensure,
    /// Reference ancestors only if already indexed.
    Skip,
    /// Require every ancestor to be indexed with identical content.
    #[default]
    Verify,
}

impl SourcesPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourcesPolicy::Ensure => "ensure",
            SourcesPolicy::Skip => "skip",
            SourcesPolicy::Verify => "verify",
        }
    }
}

impl fmt::Display for SourcesPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourcesPolicy {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ensure" => Ok(SourcesPolicy::Ensure),
            "skip" => Ok(SourcesPolicy::Skip),
            "verify" => Ok(SourcesPolicy::Verify),
            other => Err(CatalogError::ValidationError(format!(
                "unknown sources policy '{}' (expected ensure, skip or verify)",
                other
            ))),
        }
    }
}

/// State of one location row. Removed locations have no row at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocationState {
    Active,
    Archived,
}

#[derive(Debug, Clone, Serialize)]
pub struct Dataset {
    pub id: Uuid,
    pub product: Product,
    pub document: Value,
    /// Active locations, most recent first.
    pub uris: Vec<String>,
    pub sources: BTreeMap<String, Dataset>,
    pub indexed_time: Option<DateTime<Utc>>,
    pub archived_time: Option<DateTime<Utc>>,
}

impl Dataset {
    /// Builds a dataset to be added; the id is read from the document.
    pub fn new(product: Product, document: Value, uri: Option<&str>) -> Result<Self, CatalogError> {
        let id = read_id(&product.metadata_type, &document)?;
        Ok(Self {
            id,
            product,
            document,
            uris: uri.map(|u| vec![u.to_string()]).unwrap_or_default(),
            sources: BTreeMap::new(),
            indexed_time: None,
            archived_time: None,
        })
    }

    /// Builds a dataset and its whole declared lineage from the embedded
    /// source documents, classifying every ancestor under `product`.
    pub fn from_document_tree(
        product: Product,
        document: Value,
        uri: Option<&str>,
    ) -> Result<Self, CatalogError> {
        let offset = product.metadata_type.sources_offset();
        let mut sources = BTreeMap::new();
        if let Some(embedded) = value_at(&document, &offset).and_then(Value::as_object) {
            for (classifier, source_doc) in embedded {
                let source =
                    Dataset::from_document_tree(product.clone(), source_doc.clone(), None)?;
                sources.insert(classifier.clone(), source);
            }
        }
        Ok(Dataset::new(product, document, uri)?.with_sources(sources))
    }

    pub fn with_sources(mut self, sources: BTreeMap<String, Dataset>) -> Self {
        self.sources = sources;
        self
    }

    pub fn with_source(mut self, classifier: &str, source: Dataset) -> Self {
        self.sources.insert(classifier.to_string(), source);
        self
    }

    pub fn with_uri(mut self, uri: &str) -> Self {
        self.uris.push(uri.to_string());
        self
    }

    pub fn metadata_type(&self) -> &MetadataType {
        &self.product.metadata_type
    }

    pub fn is_archived(&self) -> bool {
        self.archived_time.is_some()
    }

    /// The canonical location: the most recently added active URI.
    pub fn local_uri(&self) -> Option<&str> {
        self.uris.first().map(String::as_str)
    }

    /// Filesystem path of the canonical location, when it is a `file://` URI.
    pub fn local_path(&self) -> Option<PathBuf> {
        let url = Url::parse(self.local_uri()?).ok()?;
        if url.scheme() != "file" {
            return None;
        }
        url.to_file_path().ok()
    }

    /// The document as stored: lineage sub-document emptied.
    pub fn stored_document(&self) -> Value {
        strip_sources(&self.document, &self.metadata_type().sources_offset())
    }

    /// The stored document with each source's own document re-embedded.
    pub fn metadata_doc(&self) -> Value {
        let mut doc = self.stored_document();
        if self.sources.is_empty() {
            return doc;
        }
        let embedded: Map<String, Value> = self
            .sources
            .iter()
            .map(|(classifier, source)| (classifier.clone(), source.metadata_doc()))
            .collect();
        set_value_at(&mut doc, &self.metadata_type().sources_offset(), Value::Object(embedded));
        doc
    }
}

fn read_id(metadata_type: &MetadataType, document: &Value) -> Result<Uuid, CatalogError> {
    let offset = metadata_type.id_offset();
    let raw = value_at(document, &offset)
        .and_then(Value::as_str)
        .ok_or_else(|| {
            CatalogError::ValidationError(format!(
                "dataset document has no string id at '{}'",
                offset.join(".")
            ))
        })?;
    Ok(Uuid::parse_str(raw)?)
}

pub fn value_at<'a>(doc: &'a Value, offset: &[String]) -> Option<&'a Value> {
    offset.iter().try_fold(doc, |node, key| node.get(key))
}

fn set_value_at(doc: &mut Value, offset: &[String], value: Value) {
    let Some((leaf, parents)) = offset.split_last() else {
        return;
    };
    let mut node = doc;
    for key in parents {
        if !node.is_object() {
            *node = Value::Object(Map::new());
        }
        node = match node {
            Value::Object(map) => map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new())),
            _ => return,
        };
    }
    match node {
        Value::Object(map) => {
            map.insert(leaf.clone(), value);
        }
        other => {
            let mut map = Map::new();
            map.insert(leaf.clone(), value);
            *other = Value::Object(map);
        }
    }
}

/// Empties the lineage map at `offset`, if the document has one.
pub fn strip_sources(document: &Value, offset: &[String]) -> Value {
    let mut doc = document.clone();
    if value_at(&doc, offset).is_some() {
        set_value_at(&mut doc, offset, Value::Object(Map::new()));
    }
    doc
}

/// SHA-256 over the canonical (key-sorted) JSON encoding.
pub fn document_checksum(document: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(document.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

/// A simple search condition on a named field.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Eq {
        field: String,
        value: Value,
    },
    /// Inclusive on both ends; an open end is unbounded.
    Range {
        field: String,
        low: Option<Value>,
        high: Option<Value>,
    },
}

impl Predicate {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Predicate::Eq {
            field: field.to_string(),
            value: value.into(),
        }
    }

    pub fn range(field: &str, low: Option<Value>, high: Option<Value>) -> Self {
        Predicate::Range {
            field: field.to_string(),
            low,
            high,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Predicate::Eq { field, .. } | Predicate::Range { field, .. } => field,
        }
    }

    /// Parses `field=value` or `field=low..high` (either end may be empty).
    pub fn parse(expr: &str) -> Result<Self, CatalogError> {
        let (field, raw) = expr.split_once('=').ok_or_else(|| {
            CatalogError::ValidationError(format!("expected FIELD=VALUE, got '{}'", expr))
        })?;
        let field = field.trim();
        if field.is_empty() {
            return Err(CatalogError::ValidationError(format!(
                "missing field name in '{}'",
                expr
            )));
        }
        match raw.split_once("..") {
            Some((low, high)) => Ok(Predicate::range(
                field,
                (!low.is_empty()).then(|| scalar_from_str(low)),
                (!high.is_empty()).then(|| scalar_from_str(high)),
            )),
            None => Ok(Predicate::eq(field, scalar_from_str(raw))),
        }
    }
}

fn scalar_from_str(raw: &str) -> Value {
    if let Ok(i) = raw.parse::<i64>() {
        return Value::from(i);
    }
    match raw.parse::<f64>() {
        Ok(f) if f.is_finite() => Value::from(f),
        _ => Value::String(raw.to_string()),
    }
}
