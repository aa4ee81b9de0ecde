//
//  error.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use std::path::PathBuf;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, SymgraphError>;

/// Caller-level failures.
///
/// Problems found *inside* a file (syntax errors, failed chunks, structural
/// warnings) never surface here; they are accumulated in
/// [`ParseResult::errors`](crate::parser::ParseResult) instead.
#[derive(Debug, thiserror::Error)]
pub enum SymgraphError {
    #[error("unsupported language for {0}")]
    UnsupportedLanguage(PathBuf),

    #[error("failed to initialize parser for {0}: {1}")]
    ParserInitError(PathBuf, String),

    #[error("tree-sitter produced no tree for {0}")]
    TreeSitterParseFailed(PathBuf),

    #[error("{path} is {size} bytes, above the {limit} byte limit")]
    FileTooLarge {
        path: PathBuf,
        size: usize,
        limit: usize,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("config parse error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("snapshot error: {0}")]
    Snapshot(#[from] bincode::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
