//
//  persistence.rs
//  Symgraph
//
//  Created by hak (tharun)
//

//! Graph snapshots on disk (bincode).

use petgraph::stable_graph::NodeIndex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use tracing::info;

use super::store::SymbolGraph;
use super::types::*;
use crate::entities::FrameworkEntity;
use crate::error::{Result, SymgraphError};

const SNAPSHOT_VERSION: u32 = 1;

/// Dense, index-free form of a [`SymbolGraph`].
#[derive(Serialize, Deserialize)]
struct GraphSnapshot {
    version: u32,
    nodes: Vec<NodeData>,
    edges: Vec<(usize, usize, EdgeData)>,
    dependencies: Vec<PendingDependency>,
    unresolved: usize,
    entities: Vec<(PathBuf, FrameworkEntity)>,
}

impl SymbolGraph {
    /// Write a snapshot to `path`, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let snapshot = self.to_snapshot();
        let writer = BufWriter::new(File::create(path)?);
        bincode::serialize_into(writer, &snapshot)?;
        info!(
            path = %path.display(),
            nodes = snapshot.nodes.len(),
            edges = snapshot.edges.len(),
            "saved graph snapshot"
        );
        Ok(())
    }

    /// Read a snapshot written by [`save`](Self::save).
    pub fn load(path: &Path) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: GraphSnapshot = bincode::deserialize_from(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(SymgraphError::InvalidConfig(format!(
                "snapshot version {} is not supported (expected {})",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(Self::from_snapshot(snapshot))
    }

    fn to_snapshot(&self) -> GraphSnapshot {
        let mut position: HashMap<NodeIndex, usize> = HashMap::new();
        let mut nodes = Vec::with_capacity(self.graph.node_count());
        for idx in self.graph.node_indices() {
            position.insert(idx, nodes.len());
            nodes.push(self.graph[idx].clone());
        }
        let edges = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (source, target) = self.graph.edge_endpoints(e)?;
                let from = *position.get(&source)?;
                let to = *position.get(&target)?;
                Some((from, to, self.graph.edge_weight(e)?.clone()))
            })
            .collect();
        GraphSnapshot {
            version: SNAPSHOT_VERSION,
            nodes,
            edges,
            dependencies: self.dependencies.clone(),
            unresolved: self.unresolved,
            entities: self.entities.clone(),
        }
    }

    fn from_snapshot(snapshot: GraphSnapshot) -> Self {
        let mut graph = SymbolGraph::new();
        let mut indexes = Vec::with_capacity(snapshot.nodes.len());
        for node in snapshot.nodes {
            let path = node.file_path.clone();
            let name = node.name.clone();
            let simple = node.simple_name().to_string();
            let kind = node.kind;
            let idx = graph.graph.add_node(node);
            match kind {
                NodeKind::Repository => {
                    graph.repository_index.insert(path, idx);
                }
                NodeKind::File => {
                    graph.file_index.insert(path, idx);
                }
                NodeKind::Symbol { .. } => {
                    graph.qualified_index.entry(name).or_default().push(idx);
                    graph.simple_index.entry(simple).or_default().push(idx);
                }
            }
            indexes.push(idx);
        }
        for (from, to, data) in snapshot.edges {
            let (Some(&from), Some(&to)) = (indexes.get(from), indexes.get(to)) else {
                continue;
            };
            let kind = data.kind;
            let edge = graph.graph.add_edge(from, to, data);
            if let EdgeKind::Depends(dep_kind) = kind {
                graph.dependency_index.insert((from, to, dep_kind), edge);
            }
        }
        graph.dependencies = snapshot.dependencies;
        graph.unresolved = snapshot.unresolved;
        graph.entities = snapshot.entities;
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::*;
    use tempfile::tempdir;

    fn sample() -> SymbolGraph {
        let mut graph = SymbolGraph::new();
        let repo = graph.add_repository(PathBuf::from("/repo"));
        let symbols = vec![
            Symbol {
                name: "Run".into(),
                qualified_name: "App.Run".into(),
                kind: SymbolKind::Method,
                start_line: 2,
                end_line: 4,
                is_exported: true,
                visibility: Visibility::Public,
                signature: Some("public void Run()".into()),
            },
            Symbol {
                name: "Stop".into(),
                qualified_name: "App.Stop".into(),
                kind: SymbolKind::Method,
                start_line: 6,
                end_line: 6,
                is_exported: false,
                visibility: Visibility::Private,
                signature: None,
            },
        ];
        let result = ParseResult {
            symbols,
            dependencies: vec![Dependency::new("App.Run", "App.Stop", DependencyKind::Calls, 3, 0.9)],
            ..ParseResult::default()
        };
        let entity = FrameworkEntity {
            framework: "unity".into(),
            kind: "component".into(),
            symbol: "App".into(),
            line: 1,
        };
        graph.ingest(Some(repo), Path::new("/repo/App.cs"), &result, vec![entity]);
        graph.link();
        graph
    }

    #[test]
    fn test_snapshot_restores_graph_and_indexes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("snapshots").join("graph.bin");
        let graph = sample();
        graph.save(&path).unwrap();

        let mut loaded = SymbolGraph::load(&path).unwrap();
        assert_eq!(loaded.stats(), graph.stats());
        assert_eq!(loaded.find("App.Run")[0].signature.as_deref(), Some("public void Run()"));
        let deps = loaded.dependencies_of("App.Run");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0.name, "App.Stop");
        assert_eq!(loaded.entities().count(), 1);

        // Indexes survive: relinking and file removal still work.
        assert_eq!(loaded.link(), 0);
        loaded.remove_file(Path::new("/repo/App.cs"));
        assert_eq!(loaded.stats().symbols, 0);
        assert_eq!(loaded.stats().entities, 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("graph.bin");
        fs::write(&path, b"not a snapshot").unwrap();
        assert!(SymbolGraph::load(&path).is_err());
        assert!(matches!(
            SymbolGraph::load(&dir.path().join("missing.bin")),
            Err(SymgraphError::Io(_))
        ));
    }
}
