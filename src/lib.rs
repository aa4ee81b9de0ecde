//! # symgraph
//!
//! Symbol and dependency graph extraction for C# repositories.
//!
//! Every file is parsed with tree-sitter into symbols (types, methods,
//! fields, ...), imports, exports and dependency edges (calls, inherits,
//! implements, references). Files too large for a single parse are split
//! into overlapping, syntactically coherent chunks, parsed in parallel and
//! merged back into one result with file-global line numbers.
//!
//! ## Key Features
//!
//! - **Chunked parsing**: declaration-aware boundaries with a token-level
//!   fallback, so no chunk starts inside a string or comment
//! - **Qualified names**: each chunk is parsed behind a one-line prelude
//!   that reopens the namespaces, types and members it starts in
//! - **Receiver typing**: `_repo.Save()` points at `Repository.Save` when
//!   `_repo` is declared as `IRepository`
//! - **Graph store**: petgraph-backed, with bincode snapshots
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use symgraph::{ChunkedParser, SymgraphConfig};
//!
//! let parser = ChunkedParser::new(SymgraphConfig::default());
//! let result = parser.parse_file(Path::new("src/Player.cs")).unwrap();
//! for symbol in &result.symbols {
//!     println!("{} {}", symbol.kind, symbol.qualified_name);
//! }
//! ```

pub mod chunking;
pub mod config;
pub mod entities;
pub mod error;
pub mod graph;
pub mod parser;

// Re-exports for convenience
pub use chunking::{ChunkedParser, SourceChunk};
pub use config::SymgraphConfig;
pub use entities::{EntityDetector, FrameworkEntity};
pub use error::{Result, SymgraphError};
pub use graph::{build_graph, SymbolGraph};
pub use parser::{Dependency, DependencyKind, ParseResult, Symbol, SymbolKind};

use std::path::Path;

/// Parse one file's contents with the default configuration.
pub fn parse_source(path: &Path, source: &str) -> Result<ParseResult> {
    ChunkedParser::default().parse_source(path, source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source_with_defaults() {
        let result = parse_source(
            Path::new("Shop.cs"),
            "namespace Shop\n{\n    public class Cart\n    {\n        public void Add() { }\n    }\n}\n",
        )
        .unwrap();
        assert_eq!(result.find_symbol("Shop.Cart").unwrap().kind, SymbolKind::Type);
        assert_eq!(result.find_symbol("Shop.Cart.Add").unwrap().start_line, 5);
        assert_eq!(result.metadata.chunks_processed, 1);
    }
}
