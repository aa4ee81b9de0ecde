//! Boundary detection: where a large file may be cut.
//!
//! The primary strategy packs whole top-level declarations into chunks of
//! at most `max_chunk_bytes`. Declarations that are too large on their own
//! are cut with the token-level fallback, which ranks line ends by how
//! cleanly they close a block or statement. Every boundary is the byte
//! offset of a line start.

use serde::Serialize;
use tracing::debug;
use tree_sitter::{Node, Tree};

use super::lexer::LexicalMap;
use crate::config::ChunkingConfig;
use crate::parser::syntax::SyntaxKind;

/// Which strategy produced a plan's boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundaryStrategy {
    /// Whole top-level declarations only.
    Declarations,
    /// Declarations, with oversized ones cut by the token scan.
    Mixed,
    /// Token scan only: no tree, or no declarations in it.
    TokenScan,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "plan")]
pub enum BoundaryPlan {
    Split {
        boundaries: Vec<usize>,
        strategy: BoundaryStrategy,
    },
    /// Parse the file as one unit regardless of its size.
    Unchunked { reason: String },
}

/// A ranked place to cut, at the start of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub offset: usize,
    pub score: i32,
}

const CLOSE_TOP_LEVEL: i32 = 100;
const STATEMENT_TOP_LEVEL: i32 = 80;
const CLOSE_NESTED: i32 = 60;
const CLOSE_DEEP: i32 = 40;
const STATEMENT_NESTED: i32 = 30;
const BLANK_LINE: i32 = 15;
const LONE_TOKEN_BONUS: i32 = 5;
const DEPTH_PENALTY: i32 = 3;

pub struct BoundaryDetector<'a> {
    config: &'a ChunkingConfig,
    map: &'a LexicalMap,
    candidates: Vec<Candidate>,
}

impl<'a> BoundaryDetector<'a> {
    pub fn new(config: &'a ChunkingConfig, map: &'a LexicalMap) -> Self {
        let candidates = scan_candidates(map, config.max_boundary_depth);
        Self {
            config,
            map,
            candidates,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Plan the cuts for a file. `tree` is the whole-file parse, if any.
    pub fn detect(&self, tree: Option<&Tree>) -> BoundaryPlan {
        let len = self.map.len();
        let max = self.config.max_chunk_bytes.max(1);
        if len <= max {
            return BoundaryPlan::Split {
                boundaries: Vec::new(),
                strategy: BoundaryStrategy::Declarations,
            };
        }

        let declarations = tree
            .map(|t| top_level_declarations(t.root_node()))
            .unwrap_or_default();
        if declarations.is_empty() {
            let boundaries = self.fallback_range(0, len);
            debug!(count = boundaries.len(), "token scan boundaries");
            return BoundaryPlan::Split {
                boundaries,
                strategy: BoundaryStrategy::TokenScan,
            };
        }

        let oversized: usize = declarations
            .iter()
            .map(|(s, e)| e - s)
            .filter(|size| *size > max)
            .sum();
        if oversized as f64 > self.config.oversized_ratio * len as f64 {
            debug!(oversized, len, "oversized declarations dominate the file");
            return BoundaryPlan::Unchunked {
                reason: format!(
                    "oversized declarations cover {oversized} of {len} bytes"
                ),
            };
        }

        let mut boundaries = Vec::new();
        let mut chunk_start = 0;
        let mut prev_end: Option<usize> = None;
        let mut used_fallback = false;

        for &(start, end) in &declarations {
            if let Some(pe) = prev_end {
                if self.line_after(end).saturating_sub(chunk_start) > max {
                    let cut = self.line_after(pe);
                    if cut > chunk_start && cut <= self.line_start_of(start) {
                        boundaries.push(cut);
                        chunk_start = cut;
                    }
                }
            }
            if end - start > max {
                let cuts = self.fallback_range(chunk_start, end);
                used_fallback |= !cuts.is_empty();
                if let Some(&last) = cuts.last() {
                    chunk_start = last;
                }
                boundaries.extend(cuts);
            }
            prev_end = Some(end);
        }

        // Trailing text after the last declaration.
        let tail = self.fallback_range(chunk_start, len);
        used_fallback |= !tail.is_empty();
        boundaries.extend(tail);

        let strategy = if used_fallback {
            BoundaryStrategy::Mixed
        } else {
            BoundaryStrategy::Declarations
        };
        debug!(count = boundaries.len(), ?strategy, "declaration boundaries");
        BoundaryPlan::Split {
            boundaries,
            strategy,
        }
    }

    /// Token-scan boundaries covering `[start, limit)` in pieces of at most
    /// `max_chunk_bytes`.
    pub fn fallback_range(&self, start: usize, limit: usize) -> Vec<usize> {
        let max = self.config.max_chunk_bytes.max(1);
        let mut cuts = Vec::new();
        let mut from = start;
        while limit.saturating_sub(from) > max {
            let cut = self.fallback_boundary(from, limit);
            if cut <= from || cut >= limit {
                break;
            }
            cuts.push(cut);
            from = cut;
        }
        cuts
    }

    /// Best single boundary after `start`, no further than `max_chunk_bytes`
    /// and never at or past `limit`.
    pub fn fallback_boundary(&self, start: usize, limit: usize) -> usize {
        let max = self.config.max_chunk_bytes.max(1);
        let hi = (start + max).min(limit.saturating_sub(1));
        let floor = (max as f64 * self.config.boundary_search_floor) as usize;
        let lo = start + floor.min(max);

        let first = self.candidates.partition_point(|c| c.offset < lo.max(start + 1));
        let best = self.candidates[first..]
            .iter()
            .take_while(|c| c.offset <= hi)
            .fold(None::<Candidate>, |best, c| match best {
                Some(b) if b.score > c.score => Some(b),
                _ => Some(*c),
            });
        if let Some(best) = best {
            return best.offset;
        }
        self.emergency_boundary(start, hi)
    }

    /// Last line start in `(start, hi]`, or `hi` itself snapped back to a
    /// char boundary when the window holds a single long line.
    fn emergency_boundary(&self, start: usize, hi: usize) -> usize {
        let starts = &self.map.line_starts;
        let idx = starts.partition_point(|&s| s <= hi);
        if idx > 0 && starts[idx - 1] > start {
            return starts[idx - 1];
        }
        let mut cut = hi;
        while cut > start + 1 && !self.map.masked.is_char_boundary(cut) {
            cut -= 1;
        }
        debug!(start, cut, "forced emergency boundary");
        cut
    }

    fn line_start_of(&self, offset: usize) -> usize {
        let starts = &self.map.line_starts;
        let idx = starts.partition_point(|&s| s <= offset);
        starts[idx.saturating_sub(1)]
    }

    /// Start of the line following the one containing `offset`.
    fn line_after(&self, offset: usize) -> usize {
        let starts = &self.map.line_starts;
        let idx = starts.partition_point(|&s| s <= offset);
        starts.get(idx).copied().unwrap_or(self.map.len())
    }
}

/// Byte spans of the outermost type-level declarations, looking through
/// namespaces. Leading attributes are part of the node.
pub fn top_level_declarations(root: Node<'_>) -> Vec<(usize, usize)> {
    let mut out = Vec::new();
    collect_declarations(root, &mut out);
    out
}

fn collect_declarations(node: Node<'_>, out: &mut Vec<(usize, usize)>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        let kind = SyntaxKind::of(&child);
        if kind.is_top_level_declaration() {
            out.push((child.start_byte(), child.end_byte()));
        } else if kind.is_namespace() {
            match child.child_by_field_name("body") {
                Some(body) => collect_declarations(body, out),
                None => collect_declarations(child, out),
            }
        } else if child.kind() == "declaration_list" {
            collect_declarations(child, out);
        }
    }
}

/// Rank every line end in the mask. Only line ends that are live code, at
/// zero paren/bracket depth and brace depth ≤ `max_depth`, qualify.
fn scan_candidates(map: &LexicalMap, max_depth: usize) -> Vec<Candidate> {
    let bytes = map.masked.as_bytes();
    let mut out = Vec::new();
    let mut braces: usize = 0;
    let mut parens: usize = 0;
    let mut brackets: usize = 0;
    let mut last: Option<u8> = None;
    let mut tokens_on_line = 0usize;
    let mut indent = 0usize;
    let mut at_indent = true;

    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\n' => {
                if map.is_code(i) && parens == 0 && brackets == 0 && braces <= max_depth {
                    let depth = braces as i32;
                    let base = match last {
                        Some(b'}') => match braces {
                            0 => Some(CLOSE_TOP_LEVEL),
                            1 => Some(CLOSE_NESTED),
                            _ => Some(CLOSE_DEEP),
                        },
                        Some(b';') if braces == 0 => Some(STATEMENT_TOP_LEVEL),
                        Some(b';') => Some(STATEMENT_NESTED - 5 * depth),
                        None => Some(BLANK_LINE),
                        _ => None,
                    };
                    if let Some(base) = base {
                        let mut score = base - DEPTH_PENALTY * depth;
                        if tokens_on_line == 1 {
                            score += LONE_TOKEN_BONUS;
                        }
                        score += match indent {
                            0..=4 => 10,
                            5..=8 => 5,
                            _ => 0,
                        };
                        out.push(Candidate {
                            offset: i + 1,
                            score,
                        });
                    }
                }
                last = None;
                tokens_on_line = 0;
                indent = 0;
                at_indent = true;
            }
            b' ' | b'\t' | b'\r' => {
                if at_indent {
                    indent += if b == b'\t' { 4 } else { 1 };
                }
            }
            _ => {
                at_indent = false;
                tokens_on_line += 1;
                last = Some(b);
                match b {
                    b'{' => braces += 1,
                    b'}' => braces = braces.saturating_sub(1),
                    b'(' => parens += 1,
                    b')' => parens = parens.saturating_sub(1),
                    b'[' => brackets += 1,
                    b']' => brackets = brackets.saturating_sub(1),
                    _ => {}
                }
            }
        }
    }
    out
}
