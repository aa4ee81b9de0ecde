//! Whole-file nesting map of namespaces, types and member bodies.
//!
//! Computed once per file and queried per chunk, so a chunk that begins in
//! the middle of `namespace A { class B { void F() {` can be parsed behind
//! a prelude that reopens exactly those scopes.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;
use tree_sitter::{Node, Tree};

use super::lexer::LexicalMap;
use crate::parser::syntax::SyntaxKind;

/// Name of the method a prelude opens when a chunk starts inside a block
/// that belongs to no recorded member.
pub const SYNTHETIC_BODY: &str = "__chunk_body";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ScopeKind {
    Namespace,
    Type,
    /// Method, constructor, property, indexer, event or accessor body.
    Member,
}

/// An open scope, valid up to and including `end_line` (file-global).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScopeFrame {
    pub name: String,
    pub kind: ScopeKind,
    /// Declaration keyword: `namespace`, `class`, `record struct`, ...,
    /// or `method`, `property`, `indexer`, `event`, `accessor` for members.
    pub keyword: String,
    pub file_scoped: bool,
    /// The header came before the chunk but its `{` is part of it.
    pub pending: bool,
    pub end_line: usize,
}

impl ScopeFrame {
    pub fn new(name: impl Into<String>, kind: ScopeKind, keyword: impl Into<String>, end_line: usize) -> Self {
        Self {
            name: name.into(),
            kind,
            keyword: keyword.into(),
            file_scoped: false,
            pending: false,
            end_line,
        }
    }

    /// Source text that reopens this scope. A pending scope gets its
    /// header only.
    pub fn opener(&self) -> String {
        let full = self.full_opener();
        match full.strip_suffix(" {") {
            Some(header) if self.pending => header.to_string(),
            _ => full,
        }
    }

    fn full_opener(&self) -> String {
        let name = &self.name;
        match (self.kind, self.keyword.as_str()) {
            (ScopeKind::Namespace, _) if self.file_scoped => format!("namespace {name};"),
            (ScopeKind::Namespace, _) => format!("namespace {name} {{"),
            (ScopeKind::Type, keyword) => format!("{keyword} {name} {{"),
            (ScopeKind::Member, "property") => format!("object {name} {{"),
            (ScopeKind::Member, "indexer") => "object this[object index] {".to_string(),
            (ScopeKind::Member, "event") => format!("event System.Action {name} {{"),
            (ScopeKind::Member, "accessor") => format!("{name} {{"),
            (ScopeKind::Member, _) => format!("void {name}() {{"),
        }
    }

    fn braces(&self) -> usize {
        usize::from(!self.file_scoped && !self.pending)
    }
}

/// Scopes already open where a chunk starts, outermost first, plus the
/// plain blocks (`if`, loops, lambdas) open inside the innermost one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EnclosingContext {
    pub frames: Vec<ScopeFrame>,
    pub open_blocks: usize,
}

impl EnclosingContext {
    /// Dotted name of the enclosing namespaces.
    pub fn namespace_name(&self) -> Option<String> {
        let names: Vec<&str> = self
            .frames
            .iter()
            .filter(|f| f.kind == ScopeKind::Namespace)
            .map(|f| f.name.as_str())
            .collect();
        (!names.is_empty()).then(|| names.join("."))
    }

    pub fn type_names(&self) -> Vec<&str> {
        self.frames
            .iter()
            .filter(|f| f.kind == ScopeKind::Type)
            .map(|f| f.name.as_str())
            .collect()
    }

    /// `Namespace.Type.Nested` path of the innermost type, or the
    /// namespace when no type is open.
    pub fn qualified_path(&self) -> String {
        self.namespace_name()
            .into_iter()
            .chain(self.type_names().into_iter().map(str::to_string))
            .collect::<Vec<_>>()
            .join(".")
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() && self.open_blocks == 0
    }

    /// Braces the recorded scopes open.
    pub fn scope_braces(&self) -> usize {
        self.frames.iter().map(ScopeFrame::braces).sum()
    }

    /// Braces the prelude opens in total.
    pub fn opened_braces(&self) -> usize {
        self.scope_braces() + self.open_blocks
    }

    /// One line of source that reopens every enclosing scope and block.
    /// Empty when nothing is open.
    pub fn prelude(&self) -> String {
        if self.is_empty() {
            return String::new();
        }
        let mut parts: Vec<String> = self.frames.iter().map(ScopeFrame::opener).collect();
        if self.open_blocks > 0 {
            let mut blocks = self.open_blocks;
            let innermost = self.frames.last().map(|f| f.kind);
            if innermost == Some(ScopeKind::Type) {
                parts.push(format!("void {SYNTHETIC_BODY}() {{"));
                blocks -= 1;
            }
            parts.extend(std::iter::repeat("{".to_string()).take(blocks));
        }
        let mut line = parts.join(" ");
        line.push('\n');
        line
    }
}

/// One namespace, type or member body. Lines are 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scope {
    pub name: String,
    pub qualified_name: String,
    pub kind: ScopeKind,
    pub keyword: String,
    pub file_scoped: bool,
    /// Line of the declaration's name.
    pub header_line: usize,
    pub start_line: usize,
    pub end_line: usize,
    /// First byte inside the scope: just past `{`, or past the name of a
    /// file-scoped namespace.
    pub open_byte: usize,
    /// Byte of the closing `}`; end of source for a file-scoped namespace.
    pub close_byte: usize,
    /// First byte of the declaration.
    pub start_byte: usize,
}

impl Scope {
    fn frame(&self, pending: bool) -> ScopeFrame {
        ScopeFrame {
            name: self.name.clone(),
            kind: self.kind,
            keyword: self.keyword.clone(),
            file_scoped: self.file_scoped,
            pending,
            end_line: self.end_line,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StructureMap {
    scopes: Vec<Scope>,
}

impl StructureMap {
    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Build from a full tree.
    pub fn from_tree(tree: &Tree, source: &str) -> Self {
        let mut scopes = Vec::new();
        let mut walker = TreeWalker {
            source: source.as_bytes(),
            last_line: source.lines().count().max(1),
            path: Vec::new(),
            out: &mut scopes,
        };
        walker.walk(tree.root_node());
        Self { scopes }
    }

    /// Build from the code mask when no usable tree exists. Member bodies
    /// are not recorded.
    pub fn from_lexical(map: &LexicalMap) -> Self {
        let text = map.masked.as_str();
        let last_line = map.line_starts.len();
        let mut found: Vec<Scope> = Vec::new();
        let Some(pattern) = declaration_pattern() else {
            return Self::default();
        };

        for caps in pattern.captures_iter(text) {
            let (Some(keyword), Some(name)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let kind = if keyword.as_str() == "namespace" {
                ScopeKind::Namespace
            } else {
                ScopeKind::Type
            };
            let after = name.end();
            let rest = &text[after..];
            let brace = rest.find('{');
            let semi = rest.find(';');
            let file_scoped = match (brace, semi) {
                (Some(b), Some(s)) if s < b => true,
                (None, Some(_)) => true,
                (Some(_), _) => false,
                (None, None) => continue,
            };
            let (open_byte, close_byte, end_line) = if file_scoped {
                if kind != ScopeKind::Namespace {
                    continue;
                }
                (after, text.len(), last_line)
            } else {
                let open = after + brace.unwrap_or_default();
                let close = map
                    .matching_brace(open)
                    .unwrap_or(text.len().saturating_sub(1));
                (open + 1, close, map.line_of(close))
            };
            found.push(Scope {
                name: name.as_str().to_string(),
                qualified_name: String::new(),
                kind,
                keyword: keyword.as_str().to_string(),
                file_scoped,
                header_line: map.line_of(name.start()),
                start_line: map.line_of(keyword.start()),
                end_line,
                open_byte,
                close_byte,
                start_byte: keyword.start(),
            });
        }

        // Qualify by containment, outermost first.
        let qualified: Vec<String> = (0..found.len())
            .map(|idx| {
                let inner = &found[idx];
                found
                    .iter()
                    .take(idx)
                    .filter(|p| p.open_byte <= inner.open_byte && inner.open_byte <= p.close_byte)
                    .map(|p| p.name.as_str())
                    .chain(std::iter::once(inner.name.as_str()))
                    .collect::<Vec<_>>()
                    .join(".")
            })
            .collect();
        for (scope, name) in found.iter_mut().zip(qualified) {
            scope.qualified_name = name;
        }
        Self { scopes: found }
    }

    /// Scopes open at byte `offset`, outermost first. A scope whose header
    /// starts before `offset` but whose `{` does not is included as
    /// pending.
    pub fn context_at(&self, offset: usize) -> EnclosingContext {
        let frames = self
            .scopes
            .iter()
            .filter_map(|s| {
                if s.open_byte <= offset && offset <= s.close_byte {
                    Some(s.frame(false))
                } else if s.start_byte < offset && offset < s.open_byte {
                    Some(s.frame(true))
                } else {
                    None
                }
            })
            .collect();
        EnclosingContext {
            frames,
            open_blocks: 0,
        }
    }

    /// True span of a namespace or type, by qualified name. Repeated
    /// declarations (partial types, reopened namespaces) are joined.
    pub fn span_of(&self, qualified_name: &str) -> Option<(usize, usize)> {
        self.containers()
            .filter(|s| s.qualified_name == qualified_name)
            .map(|s| (s.start_line, s.end_line))
            .reduce(|(s1, e1), (s2, e2)| (s1.min(s2), e1.max(e2)))
    }

    /// Namespace and type scopes in source order.
    pub fn containers(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.iter().filter(|s| s.kind != ScopeKind::Member)
    }
}

fn declaration_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r"\b(namespace|class|struct|interface|enum|record)\s+(?:(?:class|struct)\s+)?([A-Za-z_][\w.]*)",
            )
            .ok()
        })
        .as_ref()
}

struct TreeWalker<'s, 'o> {
    source: &'s [u8],
    last_line: usize,
    path: Vec<String>,
    out: &'o mut Vec<Scope>,
}

impl TreeWalker<'_, '_> {
    fn walk(&mut self, node: Node<'_>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
        let mut file_scoped_pushed = 0;
        for child in children {
            let kind = SyntaxKind::of(&child);
            if kind.is_member_scope() || kind == SyntaxKind::EventDeclaration {
                self.member(child, kind);
                continue;
            }
            let scope_kind = if kind.is_namespace() {
                ScopeKind::Namespace
            } else if kind.is_type_declaration() {
                ScopeKind::Type
            } else {
                if matches!(
                    kind,
                    SyntaxKind::Error | SyntaxKind::GlobalStatement | SyntaxKind::Other
                ) {
                    self.walk(child);
                }
                continue;
            };
            let Some(name_node) = child.child_by_field_name("name") else {
                continue;
            };
            let name = name_node.utf8_text(self.source).unwrap_or("").trim().to_string();
            if name.is_empty() {
                continue;
            }
            let file_scoped = kind == SyntaxKind::FileScopedNamespace;
            let body = child.child_by_field_name("body").or_else(|| {
                let mut cursor = child.walk();
                let found = child.named_children(&mut cursor).find(|c| {
                    matches!(c.kind(), "declaration_list" | "enum_member_declaration_list")
                });
                found
            });
            let (open_byte, close_byte, end_line) = if file_scoped {
                (name_node.end_byte(), usize::MAX, self.last_line)
            } else {
                match body {
                    Some(body) => (
                        body.start_byte() + 1,
                        body.end_byte().saturating_sub(1),
                        child.end_position().row + 1,
                    ),
                    None => continue,
                }
            };
            let keyword = match child.kind() {
                "namespace_declaration" | "file_scoped_namespace_declaration" => "namespace",
                "class_declaration" => "class",
                "struct_declaration" => "struct",
                "interface_declaration" => "interface",
                "enum_declaration" => "enum",
                "record_struct_declaration" => "record struct",
                _ => "record",
            };
            self.path.push(name.clone());
            self.out.push(Scope {
                name,
                qualified_name: self.path.join("."),
                kind: scope_kind,
                keyword: keyword.to_string(),
                file_scoped,
                header_line: name_node.start_position().row + 1,
                start_line: child.start_position().row + 1,
                end_line,
                open_byte,
                close_byte: close_byte.min(self.source.len()),
                start_byte: child.start_byte(),
            });
            match body {
                Some(body) => self.walk(body),
                None => self.walk(child),
            }
            if file_scoped {
                // Covers the remaining siblings.
                file_scoped_pushed += 1;
            } else {
                self.path.pop();
            }
        }
        for _ in 0..file_scoped_pushed {
            self.path.pop();
        }
    }

    /// Record a member with a braced body, and the braced accessors of a
    /// property, indexer or event.
    fn member(&mut self, node: Node<'_>, kind: SyntaxKind) {
        let keyword = match kind {
            SyntaxKind::PropertyDeclaration => "property",
            SyntaxKind::IndexerDeclaration => "indexer",
            SyntaxKind::EventDeclaration => "event",
            _ => "method",
        };
        let name = if kind == SyntaxKind::IndexerDeclaration {
            "this".to_string()
        } else {
            match node.child_by_field_name("name") {
                Some(n) => n.utf8_text(self.source).unwrap_or("").trim().to_string(),
                None => return,
            }
        };
        let body = node
            .child_by_field_name("body")
            .or_else(|| node.child_by_field_name("accessors"))
            .or_else(|| {
                let mut cursor = node.walk();
                let found = node
                    .named_children(&mut cursor)
                    .find(|c| matches!(c.kind(), "block" | "accessor_list"));
                found
            });
        let Some(body) = body.filter(|b| matches!(b.kind(), "block" | "accessor_list")) else {
            return;
        };
        self.push_member(&name, keyword, node, body);

        if body.kind() == "accessor_list" {
            let mut cursor = body.walk();
            let accessors: Vec<Node<'_>> = body.named_children(&mut cursor).collect();
            for accessor in accessors {
                let mut cursor = accessor.walk();
                let children: Vec<Node<'_>> = accessor.children(&mut cursor).collect();
                let Some(block) = children.iter().find(|c| c.kind() == "block") else {
                    continue;
                };
                let Some(word) = children
                    .iter()
                    .find(|c| matches!(c.kind(), "get" | "set" | "init" | "add" | "remove"))
                else {
                    continue;
                };
                let word = word.kind().to_string();
                self.path.push(name.clone());
                self.push_member(&word, "accessor", accessor, *block);
                self.path.pop();
            }
        }
    }

    fn push_member(&mut self, name: &str, keyword: &str, node: Node<'_>, body: Node<'_>) {
        let qualified_name = self
            .path
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name))
            .collect::<Vec<_>>()
            .join(".");
        self.out.push(Scope {
            name: name.to_string(),
            qualified_name,
            kind: ScopeKind::Member,
            keyword: keyword.to_string(),
            file_scoped: false,
            header_line: node.start_position().row + 1,
            start_line: node.start_position().row + 1,
            end_line: node.end_position().row + 1,
            open_byte: body.start_byte() + 1,
            close_byte: body.end_byte().saturating_sub(1),
            start_byte: node.start_byte(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::lexer;

    const SOURCE: &str = "using System;\n\
namespace Game.Core\n\
{\n\
    public class Player\n\
    {\n\
        class Stats\n\
        {\n\
            int hp;\n\
        }\n\
        void Run() { var s = \"class Fake {\"; }\n\
    }\n\
}\n";

    fn parse(source: &str) -> Tree {
        let mut parser = tree_sitter::Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    fn line_start(src: &str, line: usize) -> usize {
        src.split_inclusive('\n').take(line - 1).map(str::len).sum()
    }

    fn check(map: &StructureMap) {
        let at = |line| map.context_at(line_start(SOURCE, line));
        let ctx = at(8);
        assert_eq!(ctx.namespace_name().as_deref(), Some("Game.Core"));
        assert_eq!(ctx.type_names(), vec!["Player", "Stats"]);
        assert_eq!(ctx.frames[2].end_line, 9);
        assert_eq!(ctx.scope_braces(), 3);

        // Run's body opens on line 10 itself.
        let ctx = at(10);
        assert_eq!(ctx.type_names(), vec!["Player"]);
        assert_eq!(ctx.frames.len(), 2);

        // Player's brace sits on line 5, so a chunk starting at its header
        // reopens only the namespace.
        assert!(at(4).type_names().is_empty());
        assert_eq!(at(1), EnclosingContext::default());

        assert_eq!(map.span_of("Game.Core.Player"), Some((4, 11)));
        assert_eq!(map.span_of("Game.Core.Player.Stats"), Some((6, 9)));
    }

    #[test]
    fn test_tree_structure() {
        let tree = parse(SOURCE);
        let map = StructureMap::from_tree(&tree, SOURCE);
        check(&map);
        let run = map.scopes().iter().find(|s| s.name == "Run").unwrap();
        assert_eq!(run.kind, ScopeKind::Member);
        assert_eq!(run.qualified_name, "Game.Core.Player.Run");
        assert_eq!(map.span_of("Game.Core.Player.Run"), None);
    }

    #[test]
    fn test_lexical_structure_ignores_strings() {
        let map = StructureMap::from_lexical(&lexer::scan(SOURCE));
        assert_eq!(map.scopes().len(), 3);
        check(&map);
    }

    #[test]
    fn test_file_scoped_namespace_runs_to_end() {
        let src = "namespace App;\n\nclass A\n{\n}\n\nclass B { }\n";
        let tree = parse(src);
        let map = StructureMap::from_tree(&tree, src);
        let ctx = map.context_at(line_start(src, 6));
        assert_eq!(ctx.namespace_name().as_deref(), Some("App"));
        assert!(ctx.type_names().is_empty());
        assert_eq!(ctx.scope_braces(), 0);
        assert_eq!(ctx.prelude(), "namespace App;\n");
        assert_eq!(map.span_of("App.B"), Some((7, 7)));

        let lexical = StructureMap::from_lexical(&lexer::scan(src));
        let ctx = lexical.context_at(line_start(src, 6));
        assert_eq!(ctx.namespace_name().as_deref(), Some("App"));
        assert!(ctx.frames[0].file_scoped);
    }

    #[test]
    fn test_member_bodies_and_accessors_reopen() {
        let src = "namespace N\n{\n    class C\n    {\n        int P\n        {\n            get\n            {\n                return 1;\n            }\n        }\n        void Run()\n        {\n            if (x)\n            {\n                Go();\n            }\n        }\n    }\n}\n";
        let tree = parse(src);
        let map = StructureMap::from_tree(&tree, src);

        let ctx = map.context_at(line_start(src, 9));
        assert_eq!(ctx.prelude(), "namespace N { class C { object P { get {\n");
        assert_eq!(ctx.qualified_path(), "N.C");

        let offset = line_start(src, 16);
        let mut ctx = map.context_at(offset);
        assert_eq!(ctx.scope_braces(), 3);
        ctx.open_blocks = lexer::scan(src).brace_depth(offset) - ctx.scope_braces();
        assert_eq!(ctx.open_blocks, 1);
        assert_eq!(ctx.prelude(), "namespace N { class C { void Run() { {\n");
        assert_eq!(ctx.opened_braces(), 4);
    }

    #[test]
    fn test_header_before_the_chunk_reopens_without_its_brace() {
        let src = "class C\n    : Base\n{\n    void Run()\n    {\n        Go();\n    }\n}\n";
        let tree = parse(src);
        let map = StructureMap::from_tree(&tree, src);

        let ctx = map.context_at(line_start(src, 5));
        assert!(ctx.frames[1].pending);
        assert_eq!(ctx.scope_braces(), 1);
        assert_eq!(ctx.prelude(), "class C { void Run()\n");

        let ctx = map.context_at(line_start(src, 2));
        assert_eq!(ctx.prelude(), "class C\n");
        assert_eq!(ctx.scope_braces(), 0);
    }

    #[test]
    fn test_blocks_outside_members_get_a_synthetic_body() {
        let ctx = EnclosingContext {
            frames: vec![
                ScopeFrame::new("N", ScopeKind::Namespace, "namespace", 40),
                ScopeFrame::new("Cfg", ScopeKind::Type, "record struct", 30),
            ],
            open_blocks: 2,
        };
        assert_eq!(
            ctx.prelude(),
            format!("namespace N {{ record struct Cfg {{ void {SYNTHETIC_BODY}() {{ {{\n")
        );
        assert_eq!(EnclosingContext::default().prelude(), "");
    }
}
