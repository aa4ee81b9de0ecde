//
//  pipeline.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use tree_sitter::Tree;

use super::boundary::{BoundaryDetector, BoundaryPlan};
use super::lexer::{self, LexicalMap};
use super::merge::merge_results;
use super::splitter::{ChunkSplitter, SourceChunk};
use super::structure::{Scope, ScopeKind, StructureMap};
use crate::config::SymgraphConfig;
use crate::error::{Result, SymgraphError};
use crate::parser::extractor::{extract_source, extract_tree, syntax_errors, ExtractOptions};
use crate::parser::language::SupportedLanguage;
use crate::parser::types::*;

/// Files with at least this many non-blank lines are expected to declare
/// something.
const EMPTY_FILE_MIN_LINES: usize = 20;

/// Framework names that are almost never used without a `using`.
const BCL_MARKERS: &[&str] = &["Console.", "List<", "Dictionary<", "Task<"];

/// How a file would be cut, for inspection.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkPlan {
    pub plan: BoundaryPlan,
    pub chunks: Vec<SourceChunk>,
}

/// Parses one file at a time, chunking it when it is too large for a single
/// parse.
#[derive(Debug, Clone, Default)]
pub struct ChunkedParser {
    config: SymgraphConfig,
}

impl ChunkedParser {
    pub fn new(config: SymgraphConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SymgraphConfig {
        &self.config
    }

    pub fn parse_file(&self, path: &Path) -> Result<ParseResult> {
        let source = fs::read_to_string(path)?;
        self.parse_source(path, &source)
    }

    /// Parse `source` as the contents of `path`.
    ///
    /// Only caller-level problems are errors: an unknown extension, a file
    /// above `max_file_size`, a parser that cannot be built. Everything
    /// found inside the file lands in [`ParseResult::errors`].
    pub fn parse_source(&self, path: &Path, source: &str) -> Result<ParseResult> {
        let language = self.check(path, source)?;
        let mut parser = language.new_parser(path)?;
        let tree = parser.parse(source, None);
        let chunking = &self.config.chunking;

        let result = if !chunking.enable_chunking || source.len() <= chunking.max_chunk_bytes {
            self.parse_whole(path, tree.as_ref(), source)
        } else {
            let map = lexer::scan(source);
            match BoundaryDetector::new(chunking, &map).detect(tree.as_ref()) {
                BoundaryPlan::Unchunked { reason } => {
                    info!(path = %path.display(), %reason, "parsing oversized file whole");
                    self.parse_whole(path, tree.as_ref(), source)
                }
                BoundaryPlan::Split {
                    boundaries,
                    strategy,
                } => {
                    debug!(
                        path = %path.display(),
                        boundaries = boundaries.len(),
                        ?strategy,
                        "chunked parse"
                    );
                    let structure = structure_for(tree.as_ref(), source, &map);
                    let chunks =
                        ChunkSplitter::new(chunking).split(source, &boundaries, &structure, &map);
                    self.parse_chunks(path, language, source, tree.as_ref(), &chunks, &structure)
                }
            }
        };

        Ok(self.finish(result, source))
    }

    /// Boundary plan and chunks for a file, without extracting anything.
    pub fn plan(&self, path: &Path, source: &str) -> Result<ChunkPlan> {
        let language = self.check(path, source)?;
        let chunking = &self.config.chunking;
        if !chunking.enable_chunking {
            return Ok(ChunkPlan {
                plan: BoundaryPlan::Unchunked {
                    reason: "chunking disabled".to_string(),
                },
                chunks: Vec::new(),
            });
        }
        let mut parser = language.new_parser(path)?;
        let tree = parser.parse(source, None);
        let map = lexer::scan(source);
        let plan = BoundaryDetector::new(chunking, &map).detect(tree.as_ref());
        let chunks = match &plan {
            BoundaryPlan::Split { boundaries, .. } => {
                let structure = structure_for(tree.as_ref(), source, &map);
                ChunkSplitter::new(chunking).split(source, boundaries, &structure, &map)
            }
            BoundaryPlan::Unchunked { .. } => Vec::new(),
        };
        Ok(ChunkPlan { plan, chunks })
    }

    fn check(&self, path: &Path, source: &str) -> Result<SupportedLanguage> {
        let language = SupportedLanguage::from_path(path)
            .ok_or_else(|| SymgraphError::UnsupportedLanguage(path.to_path_buf()))?;
        let limit = self.config.parser.max_file_size;
        if source.len() > limit {
            return Err(SymgraphError::FileTooLarge {
                path: path.to_path_buf(),
                size: source.len(),
                limit,
            });
        }
        Ok(language)
    }

    fn options(&self, synthetic_prefix: usize, chunk_mode: bool) -> ExtractOptions<'_> {
        ExtractOptions {
            synthetic_prefix,
            chunk_mode,
            resolver: &self.config.resolver,
            regex_fallback: self.config.parser.regex_fallback,
        }
    }

    fn parse_whole(&self, path: &Path, tree: Option<&Tree>, source: &str) -> ParseResult {
        let Some(tree) = tree else {
            warn!(path = %path.display(), "no syntax tree for file");
            return ParseResult::failed(
                SymgraphError::TreeSitterParseFailed(path.to_path_buf()).to_string(),
                1,
            );
        };
        let partial = extract_tree(tree, source, &self.options(0, false));
        merge_results(vec![partial])
    }

    fn parse_chunks(
        &self,
        path: &Path,
        language: SupportedLanguage,
        source: &str,
        tree: Option<&Tree>,
        chunks: &[SourceChunk],
        structure: &StructureMap,
    ) -> ParseResult {
        let mut parts: Vec<ParseResult> = chunks
            .par_iter()
            .map(|chunk| {
                let wrapped = chunk.parse_text();
                let options = self.options(wrapped.synthetic_prefix, true);
                let partial = extract_source(path, language, &wrapped.text, &options);
                if partial.has_errors() {
                    warn!(
                        path = %path.display(),
                        chunk = chunk.index,
                        start_line = chunk.start_line,
                        "chunk failed to parse"
                    );
                }
                place_chunk(partial, chunk, wrapped.line_offset)
            })
            .collect();

        // Syntax errors come from the whole-file tree, in file lines.
        if let Some(tree) = tree {
            parts.push(ParseResult {
                errors: syntax_errors(tree, source),
                ..ParseResult::default()
            });
        }

        let mut merged = merge_results(parts);
        for symbol in merged.symbols.iter_mut().filter(|s| s.kind.is_container()) {
            if let Some((start, end)) = structure.span_of(&symbol.qualified_name) {
                symbol.start_line = start;
                symbol.end_line = end;
            }
        }
        let restored = restore_containers(&mut merged, structure);
        debug!(
            path = %path.display(),
            chunks = merged.metadata.chunks_processed,
            duplicates = merged.metadata.duplicates_removed,
            cross_chunk = merged.metadata.cross_chunk_references_found,
            restored,
            "merged chunks"
        );
        merged
    }

    fn finish(&self, mut result: ParseResult, source: &str) -> ParseResult {
        result.errors.extend(structural_warnings(&result, source));
        if !self.config.parser.include_private_symbols {
            result = result.without_private_symbols();
        }
        result
    }
}

fn structure_for(tree: Option<&Tree>, source: &str, map: &LexicalMap) -> StructureMap {
    match tree {
        Some(tree) => StructureMap::from_tree(tree, source),
        None => StructureMap::from_lexical(map),
    }
}

/// Move a chunk's result into file lines and drop what its overlap repeats.
/// A chunk that produced no tree reports one error on its first line.
fn place_chunk(partial: ParseResult, chunk: &SourceChunk, line_offset: usize) -> ParseResult {
    if partial.has_errors() {
        let reason = partial
            .errors
            .first()
            .map(|e| e.message.as_str())
            .unwrap_or("no syntax tree");
        return ParseResult::failed(
            format!(
                "chunk {} (lines {}-{}) failed: {reason}",
                chunk.index, chunk.start_line, chunk.end_line
            ),
            chunk.start_line,
        );
    }
    drop_overlap_echoes(partial.shift_lines(line_offset), chunk)
}

/// Add namespaces and types the structure map knows but no chunk reported,
/// which happens when a cut separates a header from its body. Returns how
/// many were added.
fn restore_containers(result: &mut ParseResult, structure: &StructureMap) -> usize {
    let mut known: HashSet<String> = result
        .symbols
        .iter()
        .filter(|s| s.kind.is_container())
        .map(|s| s.qualified_name.clone())
        .collect();
    let missing: Vec<&Scope> = structure
        .containers()
        .filter(|scope| known.insert(scope.qualified_name.clone()))
        .collect();
    for scope in &missing {
        let (start_line, end_line) = structure
            .span_of(&scope.qualified_name)
            .unwrap_or((scope.start_line, scope.end_line));
        let nested = structure.containers().any(|outer| {
            outer.kind == ScopeKind::Type
                && scope
                    .qualified_name
                    .strip_prefix(outer.qualified_name.as_str())
                    .is_some_and(|rest| rest.starts_with('.'))
        });
        let (kind, visibility) = match (scope.kind, scope.keyword.as_str()) {
            (ScopeKind::Namespace, _) => (SymbolKind::Namespace, Visibility::Public),
            (_, "interface") => (SymbolKind::Interface, Visibility::Public),
            _ if nested => (SymbolKind::Type, Visibility::Private),
            _ => (SymbolKind::Type, Visibility::Public),
        };
        result.symbols.push(Symbol {
            name: scope.name.clone(),
            qualified_name: scope.qualified_name.clone(),
            kind,
            start_line,
            end_line,
            is_exported: false,
            visibility,
            signature: Some(format!("{} {}", scope.keyword, scope.name)),
        });
    }
    missing.len()
}

/// Drop what a chunk re-read from its predecessor. Lines in the overlap were
/// already extracted by the previous chunk, with more context. Symbols that
/// run past the overlap stay, so the merger can join them.
fn drop_overlap_echoes(mut partial: ParseResult, chunk: &SourceChunk) -> ParseResult {
    if chunk.core_start_line <= chunk.start_line {
        return partial;
    }
    partial.symbols.retain(|s| !chunk.in_overlap(s.end_line));
    partial.dependencies.retain(|d| !chunk.in_overlap(d.line_number));
    let symbols = &partial.symbols;
    partial
        .exports
        .retain(|e| symbols.iter().any(|s| s.qualified_name == e.qualified_name));
    partial
}

/// Heuristic sanity checks on a finished file.
fn structural_warnings(result: &ParseResult, source: &str) -> Vec<ParseError> {
    let mut warnings = Vec::new();

    let non_blank = source.lines().filter(|l| !l.trim().is_empty()).count();
    if non_blank >= EMPTY_FILE_MIN_LINES && result.symbols.is_empty() {
        warnings.push(ParseError::warning(
            format!("{non_blank} non-blank lines but no symbols were extracted"),
            1,
        ));
    }

    if result.imports.is_empty() {
        let map = lexer::scan(source);
        let first = BCL_MARKERS
            .iter()
            .filter_map(|marker| map.masked.find(marker).map(|at| (at, *marker)))
            .min();
        if let Some((at, marker)) = first {
            warnings.push(ParseError::warning(
                format!("uses `{marker}` but has no using directives"),
                map.line_of(at),
            ));
        }
    }
    warnings
}
