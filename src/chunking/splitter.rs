//! Turns boundary offsets into overlapping, line-aligned chunks.

use serde::Serialize;
use tracing::debug;

use super::lexer::LexicalMap;
use super::structure::{EnclosingContext, StructureMap};
use crate::config::ChunkingConfig;

/// A slice of a file parsed on its own. Lines are 1-based, inclusive and
/// file-global.
#[derive(Debug, Clone, Serialize)]
pub struct SourceChunk {
    pub content: String,
    pub start_line: usize,
    pub end_line: usize,
    /// First line the previous chunk did not already cover.
    pub core_start_line: usize,
    pub index: usize,
    pub is_final: bool,
    /// Scopes and blocks open where the chunk starts.
    pub context: EnclosingContext,
    /// Braces still open where the chunk ends, counting the ones its
    /// prelude reopens.
    pub closing_braces: usize,
}

/// What actually goes to the parser for one chunk.
#[derive(Debug, Clone)]
pub struct ChunkText {
    pub text: String,
    /// Bytes of `text` before the chunk's own content.
    pub synthetic_prefix: usize,
    /// Amount to add to a line of `text` to get the file line.
    pub line_offset: usize,
}

impl SourceChunk {
    /// Amount to add to a chunk-local line to get the file line.
    pub fn line_offset(&self) -> usize {
        self.start_line - 1
    }

    pub fn line_count(&self) -> usize {
        self.end_line - self.start_line + 1
    }

    /// Whether file line `line` was also part of the previous chunk.
    pub fn in_overlap(&self, line: usize) -> bool {
        line < self.core_start_line
    }

    /// The content wrapped so it parses with the nesting it has in the
    /// file: a one-line prelude reopening the enclosing scopes, and a line
    /// of `}` closing whatever is still open at the end.
    pub fn parse_text(&self) -> ChunkText {
        let prelude = self.context.prelude();
        let mut text = String::with_capacity(prelude.len() + self.content.len() + self.closing_braces + 2);
        text.push_str(&prelude);
        text.push_str(&self.content);
        if self.closing_braces > 0 {
            if !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&"}".repeat(self.closing_braces));
            text.push('\n');
        }
        let prelude_lines = usize::from(!prelude.is_empty());
        ChunkText {
            synthetic_prefix: prelude.len(),
            line_offset: self.line_offset().saturating_sub(prelude_lines),
            text,
        }
    }
}

pub struct ChunkSplitter<'a> {
    config: &'a ChunkingConfig,
}

impl<'a> ChunkSplitter<'a> {
    pub fn new(config: &'a ChunkingConfig) -> Self {
        Self { config }
    }

    /// Slice `source` at `boundaries` (byte offsets of line starts).
    ///
    /// Each chunk after the first repeats up to `overlap_lines` lines of its
    /// predecessor. A chunk over `max_chunk_bytes` loses about a tenth of
    /// its lines from the end per step until it fits, down to a single line;
    /// the lines it drops start the next chunk.
    pub fn split(
        &self,
        source: &str,
        boundaries: &[usize],
        structure: &StructureMap,
        map: &LexicalMap,
    ) -> Vec<SourceChunk> {
        let mut line_starts: Vec<usize> = std::iter::once(0)
            .chain(
                source
                    .bytes()
                    .enumerate()
                    .filter(|(_, b)| *b == b'\n')
                    .map(|(i, _)| i + 1),
            )
            .collect();
        if line_starts.last() != Some(&source.len()) {
            line_starts.push(source.len());
        }
        // line_starts[k]..line_starts[k + 1] is line k (0-based).
        let total = line_starts.len() - 1;
        if total == 0 {
            return Vec::new();
        }

        let mut cut_lines: Vec<usize> = boundaries
            .iter()
            .map(|&b| line_starts.partition_point(|&s| s <= b).saturating_sub(1))
            .filter(|&l| l > 0 && l < total)
            .collect();
        cut_lines.sort_unstable();
        cut_lines.dedup();

        let max = self.config.max_chunk_bytes.max(1);
        let bytes = |from: usize, to: usize| line_starts[to] - line_starts[from];

        let mut chunks: Vec<SourceChunk> = Vec::new();
        let mut core_start = 0;
        let mut prev_start: Option<usize> = None;
        let mut next_cut = 0;

        while core_start < total {
            while next_cut < cut_lines.len() && cut_lines[next_cut] <= core_start {
                next_cut += 1;
            }
            let mut core_end = cut_lines.get(next_cut).copied().unwrap_or(total);

            let mut start = match prev_start {
                Some(prev) => core_start
                    .saturating_sub(self.config.overlap_lines)
                    .max(prev + 1)
                    .min(core_start),
                None => core_start,
            };
            // Overlap never takes more than half of max_chunk_bytes.
            while start < core_start && bytes(start, core_start) > max / 2 {
                start += 1;
            }

            while bytes(start, core_end) > max {
                let core_len = core_end - core_start;
                if core_len > 1 {
                    let trim = ((core_end - start) / 10).max(1).min(core_len - 1);
                    core_end -= trim;
                } else if start < core_start {
                    start = core_start;
                } else {
                    // A single line over the limit goes through as is.
                    break;
                }
            }

            let (from, to) = (line_starts[start], line_starts[core_end]);
            let depth = map.brace_depth(from);
            let mut context = structure.context_at(from);
            context.open_blocks = depth.saturating_sub(context.scope_braces());
            let closing_braces = (context.opened_braces() + map.brace_depth(to)).saturating_sub(depth);

            chunks.push(SourceChunk {
                content: source[from..to].to_string(),
                start_line: start + 1,
                end_line: core_end,
                core_start_line: core_start + 1,
                index: chunks.len(),
                is_final: false,
                context,
                closing_braces,
            });
            prev_start = Some(start);
            core_start = core_end;
        }

        if let Some(last) = chunks.last_mut() {
            last.is_final = true;
        }
        debug!(chunks = chunks.len(), lines = total, "split source");
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::lexer;

    fn split(source: &str, cfg: &ChunkingConfig, boundaries: &[usize]) -> Vec<SourceChunk> {
        ChunkSplitter::new(cfg).split(source, boundaries, &StructureMap::default(), &lexer::scan(source))
    }

    fn config(max: usize, overlap: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chunk_bytes: max,
            overlap_lines: overlap,
            ..ChunkingConfig::default()
        }
    }

    fn numbered(lines: usize) -> String {
        (1..=lines).map(|i| format!("line {i:04}\n")).collect()
    }

    fn assert_covers(chunks: &[SourceChunk], total: usize, overlap: usize) {
        assert_eq!(chunks.first().unwrap().start_line, 1);
        assert_eq!(chunks.last().unwrap().end_line, total);
        assert!(chunks.last().unwrap().is_final);
        for pair in chunks.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert_eq!(b.index, a.index + 1);
            assert!(b.start_line > a.start_line);
            assert!(b.start_line <= a.end_line + 1, "gap between chunks");
            assert!(a.end_line + 1 - b.start_line <= overlap, "overlap too wide");
            assert_eq!(b.core_start_line, a.end_line + 1);
            assert!(!a.is_final);
        }
    }

    #[test]
    fn test_boundaries_with_overlap() {
        let source = numbered(100); // 10 bytes per line
        let cfg = config(600, 5);
        let boundaries = vec![40 * 10, 80 * 10];
        let chunks = split(&source, &cfg, &boundaries);

        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[0].start_line, chunks[0].end_line), (1, 40));
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (36, 80));
        assert_eq!((chunks[2].start_line, chunks[2].end_line), (76, 100));
        assert!(chunks[1].content.starts_with("line 0036\n"));
        assert_eq!(chunks[1].line_offset(), 35);
        assert!(chunks[1].in_overlap(40));
        assert!(!chunks[1].in_overlap(41));
        assert_covers(&chunks, 100, 5);
    }

    #[test]
    fn test_oversized_chunk_is_trimmed_and_progress_continues() {
        let source = numbered(100);
        let cfg = config(250, 3);
        // No boundaries at all: everything is shrunk from the end.
        let chunks = split(&source, &cfg, &[]);
        assert!(chunks.len() > 4);
        for chunk in &chunks {
            assert!(chunk.content.len() <= 250);
            assert_eq!(chunk.content.lines().count(), chunk.line_count());
        }
        assert_covers(&chunks, 100, 3);
    }

    #[test]
    fn test_single_huge_line_is_its_own_chunk() {
        let source = format!("a\n{}\nb\n", "x".repeat(500));
        let cfg = config(100, 10);
        let chunks = split(&source, &cfg, &[]);
        assert_eq!(chunks.len(), 3);
        assert_eq!((chunks[1].start_line, chunks[1].end_line), (2, 2));
        assert_covers(&chunks, 3, 10);
    }

    #[test]
    fn test_last_line_without_newline() {
        let source = "one\ntwo\nthree";
        let cfg = config(8, 0);
        let chunks = split(source, &cfg, &[]);
        let joined: String = chunks.iter().map(|c| c.content.as_str()).collect();
        assert_eq!(joined, source);
        assert_covers(&chunks, 3, 0);
    }

    #[test]
    fn test_chunk_inside_a_class_is_wrapped() {
        let source = "namespace Game\n{\n    class Big\n    {\n        void A() { }\n        void B()\n        {\n            Go();\n        }\n    }\n}\n";
        let tree = {
            let mut parser = tree_sitter::Parser::new();
            parser
                .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
                .unwrap();
            parser.parse(source, None).unwrap()
        };
        let structure = StructureMap::from_tree(&tree, source);
        let cfg = config(10_000, 0);
        let cut = source.find("        void B()").unwrap();
        let chunks =
            ChunkSplitter::new(&cfg).split(source, &[cut], &structure, &lexer::scan(source));
        assert_eq!(chunks.len(), 2);

        let first = chunks[0].parse_text();
        assert_eq!(first.synthetic_prefix, 0);
        assert_eq!(first.line_offset, 0);
        assert!(first.text.ends_with("void A() { }\n}}\n"));

        let second = chunks[1].parse_text();
        assert_eq!(chunks[1].context.qualified_path(), "Game.Big");
        assert_eq!(chunks[1].closing_braces, 0);
        assert!(second.text.starts_with("namespace Game { class Big {\n        void B()"));
        assert_eq!(second.synthetic_prefix, "namespace Game { class Big {\n".len());
        // `void B()` is file line 6 and line 2 of the wrapped text.
        assert_eq!(second.line_offset + 2, 6);
        assert_eq!(chunks[1].start_line, 6);
    }

    #[test]
    fn test_chunk_inside_a_method_reopens_its_blocks() {
        let source = "class C\n{\n    void Run()\n    {\n        if (x)\n        {\n            A();\n            B();\n        }\n    }\n}\n";
        let cfg = config(10_000, 0);
        let cut = source.find("            B();").unwrap();
        let map = lexer::scan(source);
        // Without a tree only the class is known; the method and the `if`
        // come back as plain blocks under a synthetic body.
        let structure = StructureMap::from_lexical(&map);
        let chunks = ChunkSplitter::new(&cfg).split(source, &[cut], &structure, &map);
        assert_eq!(chunks[1].context.open_blocks, 2);
        assert_eq!(chunks[0].closing_braces, 3);
        let text = chunks[1].parse_text().text;
        assert!(text.starts_with(&format!(
            "class C {{ void {}() {{ {{\n",
            crate::chunking::structure::SYNTHETIC_BODY
        )));
        assert_eq!(chunks[1].closing_braces, 0);
    }
}
