//
//  store.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableDiGraph};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::types::*;
use crate::entities::FrameworkEntity;
use crate::parser::types::{DependencyKind, ParseResult};

/// Repository → file → symbol containment plus dependency edges between
/// symbols.
///
/// Dependencies are recorded as declared by the parser and turned into
/// edges by [`SymbolGraph::link`], so files can be ingested in any order.
#[derive(Debug, Clone, Default)]
pub struct SymbolGraph {
    pub(crate) graph: StableDiGraph<NodeData, EdgeData>,
    pub(crate) repository_index: HashMap<PathBuf, NodeIndex>,
    pub(crate) file_index: HashMap<PathBuf, NodeIndex>,
    /// Qualified name -> symbol nodes (partial types can repeat a name).
    pub(crate) qualified_index: HashMap<String, Vec<NodeIndex>>,
    /// Last name segment -> symbol nodes.
    pub(crate) simple_index: HashMap<String, Vec<NodeIndex>>,
    /// One edge per `(from, to, kind)`.
    pub(crate) dependency_index: HashMap<(NodeIndex, NodeIndex, DependencyKind), EdgeIndex>,
    pub(crate) dependencies: Vec<PendingDependency>,
    pub(crate) unresolved: usize,
    pub(crate) entities: Vec<(PathBuf, FrameworkEntity)>,
}

impl SymbolGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_repository(&mut self, root: PathBuf) -> NodeIndex {
        if let Some(&idx) = self.repository_index.get(&root) {
            return idx;
        }
        let idx = self.graph.add_node(NodeData::new_repository(root.clone()));
        self.repository_index.insert(root, idx);
        idx
    }

    /// Repository whose root contains `path`, longest root first.
    pub fn repository_of(&self, path: &Path) -> Option<NodeIndex> {
        self.repository_index
            .iter()
            .filter(|(root, _)| path.starts_with(root))
            .max_by_key(|(root, _)| root.components().count())
            .map(|(_, &idx)| idx)
    }

    /// Add one parsed file. A file already in the graph is replaced.
    /// Call [`link`](Self::link) once all files are in.
    pub fn ingest(
        &mut self,
        repository: Option<NodeIndex>,
        path: &Path,
        result: &ParseResult,
        entities: Vec<FrameworkEntity>,
    ) -> NodeIndex {
        self.remove_file(path);

        let file_idx = self.graph.add_node(NodeData::new_file(path.to_path_buf()));
        self.file_index.insert(path.to_path_buf(), file_idx);
        if let Some(repo) = repository {
            self.graph.add_edge(repo, file_idx, EdgeData::contains());
        }

        for symbol in &result.symbols {
            let node = NodeData::new_symbol(symbol, path.to_path_buf());
            let simple = node.simple_name().to_string();
            let idx = self.graph.add_node(node);
            self.graph.add_edge(file_idx, idx, EdgeData::contains());
            self.qualified_index
                .entry(symbol.qualified_name.clone())
                .or_default()
                .push(idx);
            self.simple_index.entry(simple).or_default().push(idx);
        }

        self.dependencies
            .extend(result.dependencies.iter().map(|d| PendingDependency {
                file_path: path.to_path_buf(),
                from_symbol: d.from_symbol.clone(),
                to_symbol: d.to_symbol.clone(),
                kind: d.kind,
                line: d.line_number,
                confidence: d.confidence,
            }));
        self.entities
            .extend(entities.into_iter().map(|e| (path.to_path_buf(), e)));

        debug!(
            file = %path.display(),
            symbols = result.symbols.len(),
            dependencies = result.dependencies.len(),
            "ingested file"
        );
        file_idx
    }

    /// Drop a file with its symbols, declared dependencies and entities.
    /// Edges into its symbols disappear with them.
    pub fn remove_file(&mut self, path: &Path) {
        let Some(file_idx) = self.file_index.remove(path) else {
            return;
        };
        let children: Vec<NodeIndex> = self
            .graph
            .edges_directed(file_idx, Direction::Outgoing)
            .filter(|e| e.weight().kind == EdgeKind::Contains)
            .map(|e| e.target())
            .collect();
        for idx in children {
            if let Some(node) = self.graph.remove_node(idx) {
                let simple = node.simple_name().to_string();
                unindex(&mut self.qualified_index, &node.name, idx);
                unindex(&mut self.simple_index, &simple, idx);
            }
        }
        self.graph.remove_node(file_idx);

        let graph = &self.graph;
        self.dependency_index
            .retain(|_, edge| graph.edge_weight(*edge).is_some());
        self.dependencies.retain(|d| d.file_path != path);
        self.entities.retain(|(p, _)| p != path);
    }

    /// Turn declared dependencies into edges. Rebuilds every dependency
    /// edge and returns how many declared dependencies stay unresolved.
    pub fn link(&mut self) -> usize {
        let stale: Vec<EdgeIndex> = self
            .graph
            .edge_indices()
            .filter(|&e| {
                self.graph
                    .edge_weight(e)
                    .is_some_and(|w| matches!(w.kind, EdgeKind::Depends(_)))
            })
            .collect();
        for edge in stale {
            self.graph.remove_edge(edge);
        }
        self.dependency_index.clear();

        let mut unresolved = 0;
        let dependencies = std::mem::take(&mut self.dependencies);
        for dep in &dependencies {
            let from = self
                .lookup_exact(&dep.from_symbol, &dep.file_path)
                .or_else(|| self.file_index.get(&dep.file_path).copied());
            let to = self.resolve_target(&dep.to_symbol, &dep.file_path);
            match (from, to) {
                (Some(from), Some(to)) if from != to => self.connect(from, to, dep),
                _ => unresolved += 1,
            }
        }
        self.dependencies = dependencies;
        self.unresolved = unresolved;
        debug!(
            edges = self.dependency_index.len(),
            unresolved, "linked dependencies"
        );
        unresolved
    }

    fn connect(&mut self, from: NodeIndex, to: NodeIndex, dep: &PendingDependency) {
        let key = (from, to, dep.kind);
        if let Some(edge) = self
            .dependency_index
            .get(&key)
            .and_then(|&e| self.graph.edge_weight_mut(e))
        {
            edge.confidence = edge.confidence.max(dep.confidence);
            edge.line = edge.line.min(dep.line);
            return;
        }
        let edge = self.graph.add_edge(
            from,
            to,
            EdgeData {
                kind: EdgeKind::Depends(dep.kind),
                line: dep.line,
                confidence: dep.confidence,
            },
        );
        self.dependency_index.insert(key, edge);
    }

    /// Exact qualified name, same file first.
    fn lookup_exact(&self, name: &str, file: &Path) -> Option<NodeIndex> {
        let candidates = self.qualified_index.get(name)?;
        self.prefer_file(candidates.iter().copied(), file)
    }

    /// Exact qualified name, then a qualified suffix (`Helper.Apply` for
    /// `Game.Helper.Apply`), then the bare last segment.
    fn resolve_target(&self, target: &str, file: &Path) -> Option<NodeIndex> {
        if let Some(idx) = self.lookup_exact(target, file) {
            return Some(idx);
        }
        let simple = target.rsplit('.').next().unwrap_or(target);
        let candidates = self.simple_index.get(simple)?;
        if simple != target {
            let suffix = format!(".{target}");
            let by_suffix = candidates
                .iter()
                .copied()
                .filter(|&idx| self.graph[idx].name.ends_with(&suffix));
            if let Some(idx) = self.prefer_file(by_suffix, file) {
                return Some(idx);
            }
        }
        self.prefer_file(candidates.iter().copied(), file)
    }

    fn prefer_file(&self, candidates: impl Iterator<Item = NodeIndex>, file: &Path) -> Option<NodeIndex> {
        let mut first = None;
        for idx in candidates {
            if self.graph[idx].file_path == file {
                return Some(idx);
            }
            first.get_or_insert(idx);
        }
        first
    }

    // ─── Queries ────────────────────────────────────────────────

    pub fn find(&self, qualified_name: &str) -> Vec<&NodeData> {
        self.qualified_index
            .get(qualified_name)
            .map(|v| v.iter().map(|&idx| &self.graph[idx]).collect())
            .unwrap_or_default()
    }

    /// Outgoing dependency edges of every symbol named `qualified_name`.
    pub fn dependencies_of(&self, qualified_name: &str) -> Vec<(&NodeData, &EdgeData)> {
        self.neighbors(qualified_name, Direction::Outgoing)
    }

    /// Incoming dependency edges of every symbol named `qualified_name`.
    pub fn dependents_of(&self, qualified_name: &str) -> Vec<(&NodeData, &EdgeData)> {
        self.neighbors(qualified_name, Direction::Incoming)
    }

    fn neighbors(&self, qualified_name: &str, direction: Direction) -> Vec<(&NodeData, &EdgeData)> {
        let Some(nodes) = self.qualified_index.get(qualified_name) else {
            return Vec::new();
        };
        nodes
            .iter()
            .flat_map(|&idx| self.graph.edges_directed(idx, direction))
            .filter(|e| matches!(e.weight().kind, EdgeKind::Depends(_)))
            .map(|e| {
                let other = match direction {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (&self.graph[other], e.weight())
            })
            .collect()
    }

    pub fn entities(&self) -> impl Iterator<Item = &FrameworkEntity> {
        self.entities.iter().map(|(_, e)| e)
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            dependency_edges: self.dependency_index.len(),
            unresolved_dependencies: self.unresolved,
            entities: self.entities.len(),
            ..GraphStats::default()
        };
        for idx in self.graph.node_indices() {
            match self.graph[idx].kind {
                NodeKind::Repository => stats.repositories += 1,
                NodeKind::File => stats.files += 1,
                NodeKind::Symbol { .. } => stats.symbols += 1,
            }
        }
        stats
    }
}

fn unindex(index: &mut HashMap<String, Vec<NodeIndex>>, key: &str, idx: NodeIndex) {
    if let Some(list) = index.get_mut(key) {
        list.retain(|&i| i != idx);
        if list.is_empty() {
            index.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::types::*;

    fn symbol(q: &str, kind: SymbolKind, line: usize) -> Symbol {
        Symbol {
            name: q.rsplit('.').next().unwrap().to_string(),
            qualified_name: q.to_string(),
            kind,
            start_line: line,
            end_line: line + 3,
            is_exported: true,
            visibility: Visibility::Public,
            signature: None,
        }
    }

    fn result(symbols: Vec<Symbol>, dependencies: Vec<Dependency>) -> ParseResult {
        ParseResult {
            symbols,
            dependencies,
            ..ParseResult::default()
        }
    }

    fn two_files() -> SymbolGraph {
        let mut graph = SymbolGraph::new();
        let repo = graph.add_repository(PathBuf::from("/repo"));
        graph.ingest(
            Some(repo),
            Path::new("/repo/Player.cs"),
            &result(
                vec![
                    symbol("Game.Player", SymbolKind::Type, 1),
                    symbol("Game.Player.Tick", SymbolKind::Method, 3),
                ],
                vec![
                    Dependency::new("Game.Player.Tick", "Helper.Apply", DependencyKind::Calls, 4, 0.9),
                    Dependency::new("Game.Player.Tick", "Helper.Apply", DependencyKind::Calls, 5, 0.95),
                    Dependency::new("Game.Player.Tick", "Missing.Call", DependencyKind::Calls, 6, 0.5),
                ],
            ),
            Vec::new(),
        );
        graph.ingest(
            Some(repo),
            Path::new("/repo/Helper.cs"),
            &result(
                vec![
                    symbol("Game.Helper", SymbolKind::Type, 1),
                    symbol("Game.Helper.Apply", SymbolKind::Method, 2),
                ],
                vec![],
            ),
            Vec::new(),
        );
        graph
    }

    #[test]
    fn test_containment_and_stats() {
        let mut graph = two_files();
        graph.link();
        let stats = graph.stats();
        assert_eq!(stats.repositories, 1);
        assert_eq!(stats.files, 2);
        assert_eq!(stats.symbols, 4);
        assert_eq!(stats.dependency_edges, 1);
        assert_eq!(stats.unresolved_dependencies, 1);
    }

    #[test]
    fn test_link_collapses_edges_and_keeps_best_confidence() {
        let mut graph = two_files();
        assert_eq!(graph.link(), 1);
        let deps = graph.dependencies_of("Game.Player.Tick");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0.name, "Game.Helper.Apply");
        assert_eq!(deps[0].1.confidence, 0.95);
        assert_eq!(deps[0].1.line, 4);

        let dependents = graph.dependents_of("Game.Helper.Apply");
        assert_eq!(dependents.len(), 1);
        assert_eq!(dependents[0].0.name, "Game.Player.Tick");

        // Linking again rebuilds the same edges.
        assert_eq!(graph.link(), 1);
        assert_eq!(graph.stats().dependency_edges, 1);
    }

    #[test]
    fn test_simple_name_prefers_same_file() {
        let mut graph = SymbolGraph::new();
        graph.ingest(
            None,
            Path::new("A.cs"),
            &result(vec![symbol("A.Run", SymbolKind::Method, 1)], vec![]),
            Vec::new(),
        );
        graph.ingest(
            None,
            Path::new("B.cs"),
            &result(
                vec![
                    symbol("B.Run", SymbolKind::Method, 1),
                    symbol("B.Start", SymbolKind::Method, 5),
                ],
                vec![Dependency::new("B.Start", "Run", DependencyKind::Calls, 6, 0.7)],
            ),
            Vec::new(),
        );
        graph.link();
        let deps = graph.dependencies_of("B.Start");
        assert_eq!(deps.len(), 1);
        assert_eq!(deps[0].0.name, "B.Run");
    }

    #[test]
    fn test_reingest_replaces_file() {
        let mut graph = two_files();
        graph.link();
        graph.ingest(
            None,
            Path::new("/repo/Helper.cs"),
            &result(vec![symbol("Game.Helper", SymbolKind::Type, 1)], vec![]),
            Vec::new(),
        );
        graph.link();
        assert!(graph.find("Game.Helper.Apply").is_empty());
        assert_eq!(graph.find("Game.Helper").len(), 1);
        let stats = graph.stats();
        assert_eq!(stats.files, 2);
        assert_eq!(stats.symbols, 3);
        assert_eq!(stats.dependency_edges, 0);
        assert_eq!(stats.unresolved_dependencies, 3);
    }
}
