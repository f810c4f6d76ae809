//! Lineage: the directed acyclic graph of dataset → source dataset edges.
//!
//! A dataset declares its sources as a nested in-memory map. Before anything
//! is written that tree is flattened into a [`LineageGraph`] keyed by id, so
//! repeated ancestors, conflicting duplicates and cycles are caught as data
//! problems up front. The graph is then resolved against the catalog under a
//! [`SourcesPolicy`], parents strictly before children, inside the caller's
//! transaction.

use crate::core::error::{CatalogError, ConstraintKind, constraint_kind};
use crate::index::model::{Dataset, SourcesPolicy, document_checksum};
use crate::index::records;
use rusqlite::{Connection, OptionalExtension, params};
use rustc_hash::{FxHashMap, FxHashSet};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageEdge {
    pub child: Uuid,
    pub classifier: String,
    pub parent: Uuid,
}

struct LineageNode<'a> {
    dataset: &'a Dataset,
    stored_document: Value,
    checksum: String,
    parents: Vec<(String, Uuid)>,
}

/// A dataset and all of its declared ancestors, flattened by id.
pub struct LineageGraph<'a> {
    root: Uuid,
    nodes: FxHashMap<Uuid, LineageNode<'a>>,
    /// Post-order: every node appears after all of its ancestors.
    order: Vec<Uuid>,
}

impl<'a> LineageGraph<'a> {
    pub fn build(root: &'a Dataset) -> Result<Self, CatalogError> {
        let mut graph = LineageGraph {
            root: root.id,
            nodes: FxHashMap::default(),
            order: Vec::new(),
        };
        let mut path = Vec::new();
        graph.visit(root, &mut path)?;
        Ok(graph)
    }

    fn visit(&mut self, dataset: &'a Dataset, path: &mut Vec<Uuid>) -> Result<(), CatalogError> {
        if path.contains(&dataset.id) {
            return Err(CatalogError::LineageCycle {
                child: path.last().map(Uuid::to_string).unwrap_or_default(),
                parent: dataset.id.to_string(),
            });
        }
        let stored_document = dataset.stored_document();
        let checksum = document_checksum(&stored_document);
        let parents: Vec<(String, Uuid)> = dataset
            .sources
            .iter()
            .map(|(classifier, source)| (classifier.clone(), source.id))
            .collect();

        if let Some(seen) = self.nodes.get(&dataset.id) {
            if seen.checksum != checksum || seen.parents != parents {
                return Err(CatalogError::DocumentMismatch {
                    kind: "dataset",
                    id: dataset.id.to_string(),
                    detail: "declared more than once in the lineage with different content"
                        .to_string(),
                });
            }
            return Ok(());
        }

        path.push(dataset.id);
        for source in dataset.sources.values() {
            self.visit(source, path)?;
        }
        path.pop();

        self.nodes.insert(
            dataset.id,
            LineageNode {
                dataset,
                stored_document,
                checksum,
                parents,
            },
        );
        self.order.push(dataset.id);
        Ok(())
    }

    pub fn root(&self) -> Uuid {
        self.root
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Ids in dependency order, root last.
    pub fn order(&self) -> &[Uuid] {
        &self.order
    }

    pub fn edges(&self) -> Vec<LineageEdge> {
        self.order
            .iter()
            .flat_map(|id| self.edges_from(id))
            .collect()
    }

    pub fn edges_from(&self, id: &Uuid) -> Vec<LineageEdge> {
        self.nodes
            .get(id)
            .map(|node| {
                node.parents
                    .iter()
                    .map(|(classifier, parent)| LineageEdge {
                        child: *id,
                        classifier: classifier.clone(),
                        parent: *parent,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn stored_document(&self, id: &Uuid) -> Option<&Value> {
        self.nodes.get(id).map(|n| &n.stored_document)
    }

    pub fn checksum(&self, id: &Uuid) -> Option<&str> {
        self.nodes.get(id).map(|n| n.checksum.as_str())
    }

    fn node(&self, id: &Uuid) -> Result<&LineageNode<'a>, CatalogError> {
        self.nodes.get(id).ok_or_else(|| CatalogError::MissingRecord {
            kind: "lineage node",
            id: id.to_string(),
        })
    }
}

/// Makes the root's ancestors consistent with the catalog under `policy`.
///
/// Writes (for `ensure`) happen on `conn`; callers run this inside the same
/// transaction as the root insert so a failure leaves nothing behind.
pub fn resolve_sources(
    conn: &Connection,
    graph: &LineageGraph<'_>,
    policy: SourcesPolicy,
) -> Result<(), CatalogError> {
    let root = graph.root();
    let mut done = FxHashSet::default();
    for (_, parent) in &graph.node(&root)?.parents {
        match policy {
            SourcesPolicy::Skip => require_present(conn, parent)?,
            SourcesPolicy::Verify => verify_ancestor(conn, graph, parent, &mut done)?,
            SourcesPolicy::Ensure => ensure_ancestor(conn, graph, parent, &mut done)?,
        }
    }
    Ok(())
}

fn require_present(conn: &Connection, id: &Uuid) -> Result<(), CatalogError> {
    if records::contains_dataset(conn, id)? {
        Ok(())
    } else {
        Err(CatalogError::MissingRecord {
            kind: "source dataset",
            id: id.to_string(),
        })
    }
}

fn verify_ancestor(
    conn: &Connection,
    graph: &LineageGraph<'_>,
    id: &Uuid,
    done: &mut FxHashSet<Uuid>,
) -> Result<(), CatalogError> {
    if !done.insert(*id) {
        return Ok(());
    }
    let node = graph.node(id)?;
    match records::stored_checksum(conn, id)? {
        None => {
            return Err(CatalogError::MissingRecord {
                kind: "source dataset",
                id: id.to_string(),
            });
        }
        Some(stored) if stored != node.checksum => {
            return Err(CatalogError::DocumentMismatch {
                kind: "source dataset",
                id: id.to_string(),
                detail: "indexed document differs from the one declared in the lineage"
                    .to_string(),
            });
        }
        Some(_) if !stored_edges_match(conn, graph, id)? => {
            return Err(CatalogError::DocumentMismatch {
                kind: "source dataset",
                id: id.to_string(),
                detail: "indexed sources differ from the ones declared in the lineage"
                    .to_string(),
            });
        }
        Some(_) => {}
    }
    for (_, parent) in &node.parents {
        verify_ancestor(conn, graph, parent, done)?;
    }
    Ok(())
}

fn ensure_ancestor(
    conn: &Connection,
    graph: &LineageGraph<'_>,
    id: &Uuid,
    done: &mut FxHashSet<Uuid>,
) -> Result<(), CatalogError> {
    if !done.insert(*id) {
        return Ok(());
    }
    if records::contains_dataset(conn, id)? {
        return require_stored_edges(conn, graph, id);
    }
    let node = graph.node(id)?;
    for (_, parent) in &node.parents {
        ensure_ancestor(conn, graph, parent, done)?;
    }
    records::insert_dataset(conn, &node.stored_document, id, &node.dataset.product)?;
    record_edges(conn, graph, id)?;
    debug!(dataset = %id, "ancestor indexed by ensure policy");
    Ok(())
}

/// Whether the stored sources of `id` are exactly the ones `graph` declares.
pub fn stored_edges_match(
    conn: &Connection,
    graph: &LineageGraph<'_>,
    id: &Uuid,
) -> Result<bool, CatalogError> {
    // Both sides are ordered by classifier.
    Ok(get_source_edges(conn, id)? == graph.node(id)?.parents)
}

/// Fails with [`CatalogError::DuplicateRecord`] when an already indexed
/// dataset is declared with sources other than the stored ones.
pub fn require_stored_edges(
    conn: &Connection,
    graph: &LineageGraph<'_>,
    id: &Uuid,
) -> Result<(), CatalogError> {
    if stored_edges_match(conn, graph, id)? {
        Ok(())
    } else {
        Err(CatalogError::DuplicateRecord {
            kind: "dataset",
            id: id.to_string(),
        })
    }
}

/// Records the declared edges of `id`. Existing identical edges are left alone.
pub fn record_edges(
    conn: &Connection,
    graph: &LineageGraph<'_>,
    id: &Uuid,
) -> Result<usize, CatalogError> {
    let mut added = 0;
    for edge in graph.edges_from(id) {
        if insert_edge(conn, &edge)? {
            added += 1;
        }
    }
    Ok(added)
}

/// Inserts one edge. Returns `false` when the identical edge already exists.
pub fn insert_edge(conn: &Connection, edge: &LineageEdge) -> Result<bool, CatalogError> {
    if detect_cycle(conn, &edge.child, &edge.parent)? {
        return Err(CatalogError::LineageCycle {
            child: edge.child.to_string(),
            parent: edge.parent.to_string(),
        });
    }
    let inserted = conn
        .execute(
            "INSERT INTO dataset_source(dataset_ref, classifier, source_dataset_ref)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(dataset_ref, classifier) DO NOTHING",
            params![
                edge.child.to_string(),
                edge.classifier,
                edge.parent.to_string()
            ],
        )
        .map_err(|e| match constraint_kind(&e) {
            Some(ConstraintKind::ForeignKey) => CatalogError::MissingRecord {
                kind: "source dataset",
                id: edge.parent.to_string(),
            },
            _ => CatalogError::RusqliteError(e),
        })?;
    if inserted == 1 {
        return Ok(true);
    }
    let stored: Option<String> = conn
        .query_row(
            "SELECT source_dataset_ref FROM dataset_source WHERE dataset_ref = ?1 AND classifier = ?2",
            params![edge.child.to_string(), edge.classifier],
            |row| row.get(0),
        )
        .optional()?;
    if stored.as_deref() == Some(edge.parent.to_string().as_str()) {
        Ok(false)
    } else {
        Err(CatalogError::DuplicateRecord {
            kind: "lineage edge",
            id: format!("{}/{}", edge.child, edge.classifier),
        })
    }
}

/// Whether adding `child -> parent` would make `child` its own ancestor.
pub fn detect_cycle(conn: &Connection, child: &Uuid, parent: &Uuid) -> Result<bool, CatalogError> {
    if child == parent {
        return Ok(true);
    }
    let target = child.to_string();
    let mut stmt =
        conn.prepare("SELECT source_dataset_ref FROM dataset_source WHERE dataset_ref = ?1")?;
    let mut visited = FxHashSet::default();
    let mut stack = vec![parent.to_string()];

    while let Some(current) = stack.pop() {
        if current == target {
            return Ok(true);
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        let rows = stmt.query_map(params![current], |row| row.get::<_, String>(0))?;
        for row in rows {
            stack.push(row?);
        }
    }
    Ok(false)
}

/// Stored `(classifier, parent)` edges of a dataset, by classifier.
pub fn get_source_edges(conn: &Connection, id: &Uuid) -> Result<Vec<(String, Uuid)>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT classifier, source_dataset_ref FROM dataset_source
         WHERE dataset_ref = ?1 ORDER BY classifier",
    )?;
    let rows = stmt.query_map(params![id.to_string()], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;
    let mut out = Vec::new();
    for row in rows {
        let (classifier, parent) = row?;
        out.push((classifier, Uuid::parse_str(&parent)?));
    }
    Ok(out)
}

/// Ids of datasets that list `id` as a source.
pub fn get_derived_ids(conn: &Connection, id: &Uuid) -> Result<Vec<Uuid>, CatalogError> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT dataset_ref FROM dataset_source
         WHERE source_dataset_ref = ?1 ORDER BY dataset_ref",
    )?;
    let rows = stmt.query_map(params![id.to_string()], |row| row.get::<_, String>(0))?;
    let mut out = Vec::new();
    for row in rows {
        out.push(Uuid::parse_str(&row?)?);
    }
    Ok(out)
}
