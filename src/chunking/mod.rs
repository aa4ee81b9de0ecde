//! Chunked parsing of files too large for one parse.
//!
//! A file is scanned once ([`lexer`]), cut at safe places ([`boundary`]),
//! sliced into overlapping chunks that know their enclosing scopes
//! ([`structure`], [`splitter`]), extracted chunk by chunk and merged back
//! into a single result ([`merge`]). [`ChunkedParser`] runs the whole thing.

pub mod boundary;
pub mod lexer;
pub mod merge;
pub mod pipeline;
pub mod splitter;
pub mod structure;

pub use boundary::{BoundaryDetector, BoundaryPlan, BoundaryStrategy};
pub use merge::{merge_results, CROSS_CHUNK_BUCKET_LINES};
pub use pipeline::{ChunkPlan, ChunkedParser};
pub use splitter::{ChunkSplitter, ChunkText, SourceChunk};
pub use structure::{EnclosingContext, ScopeFrame, ScopeKind, StructureMap};
