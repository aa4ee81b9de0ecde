//
//  types.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a declared symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolKind {
    Namespace,
    Type,
    Interface,
    Method,
    Property,
    Field,
    Constant,
    Event,
    TypeAlias,
    Variable,
}

impl SymbolKind {
    /// Kinds that other symbols nest inside.
    pub fn is_container(self) -> bool {
        matches!(
            self,
            SymbolKind::Namespace | SymbolKind::Type | SymbolKind::Interface
        )
    }
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SymbolKind::Namespace => "namespace",
            SymbolKind::Type => "type",
            SymbolKind::Interface => "interface",
            SymbolKind::Method => "method",
            SymbolKind::Property => "property",
            SymbolKind::Field => "field",
            SymbolKind::Constant => "constant",
            SymbolKind::Event => "event",
            SymbolKind::TypeAlias => "type_alias",
            SymbolKind::Variable => "variable",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

/// A declaration found in a file. Lines are 1-based and inclusive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Symbol {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub start_line: usize,
    pub end_line: usize,
    pub is_exported: bool,
    pub visibility: Visibility,
    pub signature: Option<String>,
}

impl Symbol {
    pub fn line_span(&self) -> usize {
        self.end_line.saturating_sub(self.start_line) + 1
    }

    pub fn has_signature(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyKind {
    Calls,
    Inherits,
    Implements,
    References,
}

impl fmt::Display for DependencyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DependencyKind::Calls => "calls",
            DependencyKind::Inherits => "inherits",
            DependencyKind::Implements => "implements",
            DependencyKind::References => "references",
        };
        f.write_str(s)
    }
}

/// A directed edge between two symbols, named by qualified name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependency {
    pub from_symbol: String,
    pub to_symbol: String,
    pub kind: DependencyKind,
    pub line_number: usize,
    /// Certainty in `[0, 1]` that the edge is correct.
    pub confidence: f32,
    pub calling_object: Option<String>,
    pub resolved_receiver_type: Option<String>,
    pub qualified_context: Option<String>,
    pub parameter_context: Option<String>,
}

impl Dependency {
    pub fn new(
        from_symbol: impl Into<String>,
        to_symbol: impl Into<String>,
        kind: DependencyKind,
        line_number: usize,
        confidence: f32,
    ) -> Self {
        Self {
            from_symbol: from_symbol.into(),
            to_symbol: to_symbol.into(),
            kind,
            line_number,
            confidence: confidence.clamp(0.0, 1.0),
            calling_object: None,
            resolved_receiver_type: None,
            qualified_context: None,
            parameter_context: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportKind {
    /// `using System.Text;`
    Namespace,
    /// `using static System.Math;`
    Static,
    /// `using Json = Newtonsoft.Json;`
    Alias,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Import {
    pub source: String,
    pub alias: Option<String>,
    pub kind: ImportKind,
    pub is_global: bool,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Export {
    pub name: String,
    pub qualified_name: String,
    pub kind: SymbolKind,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

/// A problem recorded while parsing. Never aborts the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
    pub severity: Severity,
}

impl ParseError {
    pub fn error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column,
            severity: Severity::Error,
        }
    }

    pub fn warning(message: impl Into<String>, line: usize) -> Self {
        Self {
            message: message.into(),
            line,
            column: 1,
            severity: Severity::Warning,
        }
    }
}

/// Chunk accounting attached to every result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkStats {
    pub chunks_processed: usize,
    pub duplicates_removed: usize,
    pub cross_chunk_references_found: usize,
}

/// Everything extracted from one logical file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParseResult {
    pub symbols: Vec<Symbol>,
    pub dependencies: Vec<Dependency>,
    pub imports: Vec<Import>,
    pub exports: Vec<Export>,
    pub errors: Vec<ParseError>,
    pub metadata: ChunkStats,
}

impl ParseResult {
    /// Result for a file or chunk where no tree could be built at all. It
    /// still counts as one processed chunk.
    pub fn failed(message: impl Into<String>, line: usize) -> Self {
        Self {
            errors: vec![ParseError::error(message, line, 1)],
            metadata: ChunkStats {
                chunks_processed: 1,
                ..ChunkStats::default()
            },
            ..Self::default()
        }
    }

    pub fn has_errors(&self) -> bool {
        self.errors.iter().any(|e| e.severity == Severity::Error)
    }

    pub fn find_symbol(&self, qualified_name: &str) -> Option<&Symbol> {
        self.symbols
            .iter()
            .find(|s| s.qualified_name == qualified_name)
    }

    /// Shift every line number by `offset`, turning chunk-local lines into
    /// file-global ones.
    pub fn shift_lines(mut self, offset: usize) -> Self {
        if offset == 0 {
            return self;
        }
        for sym in &mut self.symbols {
            sym.start_line += offset;
            sym.end_line += offset;
        }
        for dep in &mut self.dependencies {
            dep.line_number += offset;
        }
        for import in &mut self.imports {
            import.line += offset;
        }
        for export in &mut self.exports {
            export.line += offset;
        }
        for err in &mut self.errors {
            err.line += offset;
        }
        self
    }

    /// Drop private symbols. Exports are never private, so they are kept.
    pub fn without_private_symbols(mut self) -> Self {
        self.symbols.retain(|s| s.visibility != Visibility::Private);
        self
    }
}
