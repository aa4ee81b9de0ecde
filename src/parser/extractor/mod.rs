//
//  mod.rs
//  Symgraph
//
//  Created by hak (tharun)
//

pub mod csharp;
mod fallback;
pub mod helpers;

use std::path::Path;

use super::language::SupportedLanguage;
use super::types::ParseResult;
use crate::config::ResolverConfig;

pub use csharp::{extract_tree, syntax_errors};
pub use fallback::MemberSpan;

/// Knobs for one extraction call.
#[derive(Debug, Clone, Copy)]
pub struct ExtractOptions<'a> {
    /// Leading bytes of `source` that only reopen enclosing scopes. Nothing
    /// declared there is reported.
    pub synthetic_prefix: usize,
    /// Set when `source` is a chunk: no recursion into chunking, no size
    /// gate, and syntax errors are left to the whole-file tree.
    pub chunk_mode: bool,
    pub resolver: &'a ResolverConfig,
    pub regex_fallback: bool,
}

/// Parse `source` with a fresh parser and extract it. Never fails: when no
/// tree can be built the result carries a single error on line 1.
pub fn extract_source(
    path: &Path,
    language: SupportedLanguage,
    source: &str,
    options: &ExtractOptions<'_>,
) -> ParseResult {
    let mut parser = match language.new_parser(path) {
        Ok(parser) => parser,
        Err(e) => return ParseResult::failed(e.to_string(), 1),
    };
    match parser.parse(source, None) {
        Some(tree) => extract_tree(&tree, source, options),
        None => ParseResult::failed(
            format!("failed to parse {} as {}", path.display(), language.name()),
            1,
        ),
    }
}
