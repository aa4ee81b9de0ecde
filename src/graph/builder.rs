//
//  builder.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use ignore::WalkBuilder;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::store::SymbolGraph;
use crate::chunking::ChunkedParser;
use crate::entities::{detect_all, EntityDetector};
use crate::error::Result;
use crate::parser::{ParseResult, SupportedLanguage};

/// Directories that should never be indexed, even without .gitignore.
const BUILTIN_IGNORE: &[&str] = &[
    "bin",
    "obj",
    "packages",
    "node_modules",
    ".git",
    ".svn",
    ".hg",
    ".vs",
    ".idea",
    "TestResults",
    "artifacts",
    "Library",
    "Temp",
];

/// Check if a path contains any built-in ignored directory.
fn is_builtin_ignored(path: &Path) -> bool {
    path.components().any(|c| {
        if let std::path::Component::Normal(name) = c {
            BUILTIN_IGNORE.contains(&name.to_str().unwrap_or(""))
        } else {
            false
        }
    })
}

/// Per-scan counters.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub files_parsed: usize,
    /// Files rejected before parsing (too large, unreadable).
    pub files_skipped: usize,
    pub chunked_files: usize,
    pub symbols: usize,
    pub dependencies: usize,
    pub errors: usize,
    pub warnings: usize,
    pub unresolved_dependencies: usize,
}

/// Supported source files under `roots`, honoring .gitignore and
/// `.symgraphignore`.
pub fn collect_files(roots: &[&Path]) -> Vec<(PathBuf, PathBuf)> {
    roots
        .iter()
        .flat_map(|&root| {
            WalkBuilder::new(root)
                .hidden(true)
                .git_ignore(true)
                .git_global(true)
                .git_exclude(true)
                .add_custom_ignore_filename(".symgraphignore")
                .build()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_some_and(|ft| ft.is_file()))
                .filter(move |entry| {
                    !is_builtin_ignored(entry.path().strip_prefix(root).unwrap_or(entry.path()))
                })
                .filter(|entry| SupportedLanguage::from_path(entry.path()).is_some())
                .map(move |entry| (root.to_path_buf(), entry.into_path()))
        })
        .collect()
}

/// Build a symbol graph from every supported file under `roots`.
///
/// Files are parsed in parallel; ingestion and linking run once all
/// results are in, in walk order.
pub fn build_graph(
    roots: &[&Path],
    parser: &ChunkedParser,
    detectors: &[Box<dyn EntityDetector>],
) -> (SymbolGraph, ScanReport) {
    let files = collect_files(roots);
    info!(files = files.len(), roots = roots.len(), "scanning");

    let parsed: Vec<(PathBuf, PathBuf, Result<ParseResult>)> = files
        .into_par_iter()
        .map(|(root, path)| {
            let result = parser.parse_file(&path);
            (root, path, result)
        })
        .collect();

    let mut graph = SymbolGraph::new();
    let mut report = ScanReport::default();
    for (root, path, result) in parsed {
        let result = match result {
            Ok(result) => result,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping file");
                report.files_skipped += 1;
                continue;
            }
        };
        tally(&mut report, &result);
        let repo = graph.add_repository(root);
        let entities = detect_all(detectors, &result);
        graph.ingest(Some(repo), &path, &result, entities);
    }
    report.unresolved_dependencies = graph.link();

    info!(
        parsed = report.files_parsed,
        skipped = report.files_skipped,
        chunked = report.chunked_files,
        symbols = report.symbols,
        unresolved = report.unresolved_dependencies,
        "scan complete"
    );
    (graph, report)
}

/// Re-parse one file and relink the graph.
pub fn rebuild_file(
    graph: &mut SymbolGraph,
    parser: &ChunkedParser,
    detectors: &[Box<dyn EntityDetector>],
    file_path: &Path,
) -> Result<()> {
    let result = parser.parse_file(file_path)?;
    let entities = detect_all(detectors, &result);
    let repo = graph.repository_of(file_path);
    graph.ingest(repo, file_path, &result, entities);
    graph.link();
    Ok(())
}

fn tally(report: &mut ScanReport, result: &ParseResult) {
    use crate::parser::Severity;

    report.files_parsed += 1;
    if result.metadata.chunks_processed > 1 {
        report.chunked_files += 1;
    }
    report.symbols += result.symbols.len();
    report.dependencies += result.dependencies.len();
    for error in &result.errors {
        match error.severity {
            Severity::Error => report.errors += 1,
            Severity::Warning => report.warnings += 1,
        }
    }
}
