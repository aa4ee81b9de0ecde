//
//  types.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::parser::types::{DependencyKind, Symbol, SymbolKind, Visibility};

/// What a graph node stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Repository,
    File,
    Symbol { kind: SymbolKind },
}

/// Data stored on each node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    /// Qualified name for symbols, path for files and repositories.
    pub name: String,
    pub kind: NodeKind,
    pub file_path: PathBuf,
    pub line_start: usize,
    pub line_end: usize,
    pub visibility: Option<Visibility>,
    pub is_exported: bool,
    pub signature: Option<String>,
}

impl NodeData {
    pub fn new_repository(root: PathBuf) -> Self {
        Self {
            name: root.display().to_string(),
            kind: NodeKind::Repository,
            file_path: root,
            line_start: 0,
            line_end: 0,
            visibility: None,
            is_exported: false,
            signature: None,
        }
    }

    pub fn new_file(path: PathBuf) -> Self {
        Self {
            name: path.display().to_string(),
            kind: NodeKind::File,
            file_path: path,
            line_start: 0,
            line_end: 0,
            visibility: None,
            is_exported: false,
            signature: None,
        }
    }

    pub fn new_symbol(symbol: &Symbol, file_path: PathBuf) -> Self {
        Self {
            name: symbol.qualified_name.clone(),
            kind: NodeKind::Symbol { kind: symbol.kind },
            file_path,
            line_start: symbol.start_line,
            line_end: symbol.end_line,
            visibility: Some(symbol.visibility),
            is_exported: symbol.is_exported,
            signature: symbol.signature.clone(),
        }
    }

    pub fn is_symbol(&self) -> bool {
        matches!(self.kind, NodeKind::Symbol { .. })
    }

    /// Last segment of a qualified name.
    pub fn simple_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }
}

/// Types of relationships between nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    /// Repository contains file, file contains symbol.
    Contains,
    Depends(DependencyKind),
}

/// Data stored on each edge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeData {
    pub kind: EdgeKind,
    /// First line the relationship was seen on; 0 for containment.
    pub line: usize,
    pub confidence: f32,
}

impl EdgeData {
    pub fn contains() -> Self {
        Self {
            kind: EdgeKind::Contains,
            line: 0,
            confidence: 1.0,
        }
    }
}

/// A dependency waiting for [`SymbolGraph::link`](super::SymbolGraph::link).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingDependency {
    pub file_path: PathBuf,
    pub from_symbol: String,
    pub to_symbol: String,
    pub kind: DependencyKind,
    pub line: usize,
    pub confidence: f32,
}

/// Summary numbers for a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphStats {
    pub repositories: usize,
    pub files: usize,
    pub symbols: usize,
    pub dependency_edges: usize,
    pub unresolved_dependencies: usize,
    pub entities: usize,
}
