//! Symbol graph: where parse results end up.
//!
//! Provides the graph data model, the petgraph-backed store with linking,
//! bincode snapshots, and repository scanning.

pub mod builder;
pub mod persistence;
pub mod store;
pub mod types;

pub use builder::{build_graph, collect_files, rebuild_file, ScanReport};
pub use store::SymbolGraph;
pub use types::{EdgeData, EdgeKind, GraphStats, NodeData, NodeKind, PendingDependency};
