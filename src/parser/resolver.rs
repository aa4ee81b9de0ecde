//! Calling-object type resolution.
//!
//! Given the identifier a method is invoked on (`_repo` in `_repo.Save()`),
//! find its declared type by searching the file's own declarations:
//! fields, then locals of the enclosing member, then its parameters, then
//! properties. Whatever the first strategy returns (including "nothing") is
//! memoized for the rest of the file.
//!
//! A resolver lives for exactly one parse of one text; build a new one for
//! the next file or chunk.

use std::collections::HashMap;

use tree_sitter::Node;

use super::extractor::helpers::{base_type_name, node_text};
use super::syntax::SyntaxKind;
use crate::config::ResolverConfig;

/// Type name used when a local exists but its type can't be inferred.
pub const UNKNOWN_TYPE: &str = "unknown";

const UNKNOWN_CONFIDENCE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingSource {
    Field,
    Local,
    Parameter,
    Property,
}

/// A name bound to a declared (or inferred) type.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeBinding {
    pub name: String,
    pub type_name: String,
    pub confidence: f32,
    pub source: BindingSource,
    pub namespace: Option<String>,
}

impl TypeBinding {
    pub fn is_known(&self) -> bool {
        self.type_name != UNKNOWN_TYPE
    }
}

type CacheKey = (Option<usize>, String);

pub struct TypeResolver<'a> {
    root: Node<'a>,
    source: &'a [u8],
    config: &'a ResolverConfig,
    fields: Option<HashMap<String, TypeBinding>>,
    properties: Option<HashMap<String, TypeBinding>>,
    cache: HashMap<CacheKey, Option<TypeBinding>>,
    hits: usize,
}

impl<'a> TypeResolver<'a> {
    pub fn new(root: Node<'a>, source: &'a [u8], config: &'a ResolverConfig) -> Self {
        Self {
            root,
            source,
            config,
            fields: None,
            properties: None,
            cache: HashMap::new(),
            hits: 0,
        }
    }

    /// Resolve `name` as seen from `site`.
    pub fn resolve(&mut self, name: &str, site: Node<'a>) -> Option<TypeBinding> {
        let name = name.trim_start_matches('@');
        let scope = enclosing_scope(site);
        let key = (scope.map(|s| s.id()), name.to_string());
        if let Some(hit) = self.cache.get(&key) {
            self.hits += 1;
            return hit.clone();
        }

        let found = self
            .from_fields(name)
            .or_else(|| self.from_locals(name, site))
            .or_else(|| self.from_parameters(name, site))
            .or_else(|| self.from_properties(name));

        self.cache.insert(key, found.clone());
        found
    }

    /// Number of lookups answered from the memo table.
    pub fn cache_hits(&self) -> usize {
        self.hits
    }

    /// `IFoo` → `Foo` when interface stripping is enabled.
    pub fn normalize_type(&self, type_name: &str) -> String {
        let base = base_type_name(type_name);
        if self.config.strip_interface_prefix {
            normalize_interface_name(&base, self.config.interface_prefix)
        } else {
            base
        }
    }

    fn from_fields(&mut self, name: &str) -> Option<TypeBinding> {
        if self.fields.is_none() {
            let mut table = HashMap::new();
            collect_fields(self.root, self.source, self.config, &mut table);
            self.fields = Some(table);
        }
        self.fields.as_ref().and_then(|t| t.get(name).cloned())
    }

    fn from_properties(&mut self, name: &str) -> Option<TypeBinding> {
        if self.properties.is_none() {
            let mut table = HashMap::new();
            collect_properties(self.root, self.source, self.config, &mut table);
            self.properties = Some(table);
        }
        self.properties.as_ref().and_then(|t| t.get(name).cloned())
    }

    fn from_locals(&self, name: &str, site: Node<'a>) -> Option<TypeBinding> {
        let mut scope = enclosing_scope(site);
        while let Some(member) = scope {
            let mut candidates = Vec::new();
            collect_locals(member, self.source, name, &mut candidates);
            // Closest declaration before the call site, else the first one.
            let chosen = candidates
                .iter()
                .filter(|(decl, _)| decl.start_byte() < site.start_byte())
                .last()
                .or_else(|| candidates.first());
            if let Some((decl, declared)) = chosen {
                return Some(self.local_binding(name, *decl, declared.as_deref()));
            }
            scope = member.parent().and_then(enclosing_scope_inclusive);
        }
        None
    }

    fn local_binding(&self, name: &str, decl: Node<'a>, declared: Option<&str>) -> TypeBinding {
        let namespace = namespace_of(decl, self.source);
        let explicit = declared.filter(|t| *t != "var" && !t.is_empty());
        let (type_name, confidence) = match explicit {
            Some(t) => (base_type_name(t), self.config.local_confidence),
            None => match initializer_of(decl).and_then(|init| infer_expression_type(init, self.source)) {
                Some(t) => (t, self.config.inferred_confidence),
                None => (UNKNOWN_TYPE.to_string(), UNKNOWN_CONFIDENCE),
            },
        };
        TypeBinding {
            name: name.to_string(),
            type_name,
            confidence,
            source: BindingSource::Local,
            namespace,
        }
    }

    fn from_parameters(&self, name: &str, site: Node<'a>) -> Option<TypeBinding> {
        let mut scope = enclosing_scope(site);
        while let Some(member) = scope {
            if let Some(params) = member.child_by_field_name("parameters") {
                let mut cursor = params.walk();
                for param in params.named_children(&mut cursor) {
                    if SyntaxKind::of(&param) != SyntaxKind::Parameter {
                        continue;
                    }
                    let matches = param
                        .child_by_field_name("name")
                        .is_some_and(|n| node_text(&n, self.source).trim() == name);
                    if !matches {
                        continue;
                    }
                    let type_name = param
                        .child_by_field_name("type")
                        .map(|t| base_type_name(&node_text(&t, self.source)))
                        .filter(|t| !t.is_empty())?;
                    return Some(TypeBinding {
                        name: name.to_string(),
                        type_name,
                        confidence: self.config.parameter_confidence,
                        source: BindingSource::Parameter,
                        namespace: namespace_of(param, self.source),
                    });
                }
            }
            scope = member.parent().and_then(enclosing_scope_inclusive);
        }
        None
    }
}

/// `IRepository` → `Repository`. Only a single prefix letter followed by an
/// uppercase letter and at least one lowercase letter is stripped, so names
/// like `IO` or `Item` are left alone.
pub fn normalize_interface_name(name: &str, prefix: char) -> String {
    let mut chars = name.chars();
    match (chars.next(), chars.next()) {
        (Some(p), Some(second)) if p == prefix && second.is_uppercase() => {
            let rest = &name[p.len_utf8()..];
            if rest.chars().any(|c| c.is_lowercase()) {
                rest.to_string()
            } else {
                name.to_string()
            }
        }
        _ => name.to_string(),
    }
}

/// Innermost member (method, constructor, accessor owner, local function)
/// containing `node`, found by walking the parent chain.
pub fn enclosing_scope(node: Node<'_>) -> Option<Node<'_>> {
    node.parent().and_then(enclosing_scope_inclusive)
}

fn enclosing_scope_inclusive(node: Node<'_>) -> Option<Node<'_>> {
    let mut current = Some(node);
    while let Some(n) = current {
        let kind = SyntaxKind::of(&n);
        if kind.is_member_scope() {
            return Some(n);
        }
        if kind.is_type_declaration() || kind.is_namespace() {
            return None;
        }
        current = n.parent();
    }
    None
}

fn namespace_of(node: Node<'_>, source: &[u8]) -> Option<String> {
    let mut parts = Vec::new();
    let mut current = node.parent();
    while let Some(n) = current {
        if SyntaxKind::of(&n).is_namespace() {
            if let Some(name) = n.child_by_field_name("name") {
                parts.push(node_text(&name, source));
            }
        }
        current = n.parent();
    }
    if parts.is_empty() {
        // File-scoped namespaces are siblings of the declarations they cover.
        let root = {
            let mut r = node;
            while let Some(p) = r.parent() {
                r = p;
            }
            r
        };
        let mut cursor = root.walk();
        let found = root
            .named_children(&mut cursor)
            .find(|c| SyntaxKind::of(c) == SyntaxKind::FileScopedNamespace)
            .and_then(|ns| ns.child_by_field_name("name"))
            .map(|n| node_text(&n, source));
        return found;
    }
    parts.reverse();
    Some(parts.join("."))
}

fn collect_fields(
    node: Node<'_>,
    source: &[u8],
    config: &ResolverConfig,
    table: &mut HashMap<String, TypeBinding>,
) {
    if SyntaxKind::of(&node) == SyntaxKind::FieldDeclaration {
        let mut cursor = node.walk();
        for decl in node.named_children(&mut cursor) {
            if SyntaxKind::of(&decl) != SyntaxKind::VariableDeclaration {
                continue;
            }
            let declared = decl
                .child_by_field_name("type")
                .map(|t| node_text(&t, source))
                .unwrap_or_default();
            let mut inner = decl.walk();
            for declarator in decl.named_children(&mut inner) {
                if SyntaxKind::of(&declarator) != SyntaxKind::VariableDeclarator {
                    continue;
                }
                let Some(name) = declarator_name(declarator, source) else {
                    continue;
                };
                let type_name = if declared.trim() == "var" || declared.trim().is_empty() {
                    initializer_of(declarator)
                        .and_then(|init| infer_expression_type(init, source))
                        .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
                } else {
                    base_type_name(&declared)
                };
                let confidence = if type_name == UNKNOWN_TYPE {
                    UNKNOWN_CONFIDENCE
                } else {
                    config.field_confidence
                };
                table.entry(name.clone()).or_insert(TypeBinding {
                    name,
                    type_name,
                    confidence,
                    source: BindingSource::Field,
                    namespace: namespace_of(node, source),
                });
            }
        }
        return;
    }

    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_fields(child, source, config, table);
    }
}

fn collect_properties(
    node: Node<'_>,
    source: &[u8],
    config: &ResolverConfig,
    table: &mut HashMap<String, TypeBinding>,
) {
    if SyntaxKind::of(&node) == SyntaxKind::PropertyDeclaration {
        let name = node
            .child_by_field_name("name")
            .map(|n| node_text(&n, source).trim().to_string());
        let type_name = node
            .child_by_field_name("type")
            .map(|t| base_type_name(&node_text(&t, source)));
        if let (Some(name), Some(type_name)) = (name, type_name) {
            if !name.is_empty() && !type_name.is_empty() {
                table.entry(name.clone()).or_insert(TypeBinding {
                    name,
                    type_name,
                    confidence: config.property_confidence,
                    source: BindingSource::Property,
                    namespace: namespace_of(node, source),
                });
            }
        }
        return;
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_properties(child, source, config, table);
    }
}

/// Collect `(declarator-or-pattern, declared type)` pairs for `name` inside
/// a member, without descending into nested members.
fn collect_locals<'t>(
    node: Node<'t>,
    source: &[u8],
    name: &str,
    out: &mut Vec<(Node<'t>, Option<String>)>,
) {
    match node.kind() {
        "variable_declaration" => {
            let declared = node
                .child_by_field_name("type")
                .map(|t| node_text(&t, source).trim().to_string());
            let mut cursor = node.walk();
            for declarator in node.named_children(&mut cursor) {
                if SyntaxKind::of(&declarator) == SyntaxKind::VariableDeclarator
                    && declarator_name(declarator, source).as_deref() == Some(name)
                {
                    out.push((declarator, declared.clone()));
                }
            }
            return;
        }
        "foreach_statement" => {
            let matches = node
                .child_by_field_name("left")
                .is_some_and(|l| node_text(&l, source).trim() == name);
            if matches {
                let declared = node
                    .child_by_field_name("type")
                    .map(|t| node_text(&t, source).trim().to_string());
                out.push((node, declared));
            }
        }
        "declaration_expression" | "declaration_pattern" => {
            let matches = node
                .child_by_field_name("name")
                .is_some_and(|n| node_text(&n, source).trim() == name);
            if matches {
                let declared = node
                    .child_by_field_name("type")
                    .map(|t| node_text(&t, source).trim().to_string());
                out.push((node, declared));
            }
        }
        _ => {}
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if SyntaxKind::of(&child) == SyntaxKind::LocalFunction {
            continue;
        }
        collect_locals(child, source, name, out);
    }
}

fn declarator_name(declarator: Node<'_>, source: &[u8]) -> Option<String> {
    declarator
        .child_by_field_name("name")
        .or_else(|| {
            let mut cursor = declarator.walk();
            let first = declarator
                .named_children(&mut cursor)
                .find(|c| c.kind() == "identifier");
            first
        })
        .map(|n| node_text(&n, source).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Initializer expression of a variable declarator, across grammar versions
/// (`= expr` inline, or wrapped in `equals_value_clause`).
fn initializer_of(declarator: Node<'_>) -> Option<Node<'_>> {
    if declarator.kind() != "variable_declarator" {
        return None;
    }
    let name_id = declarator.child_by_field_name("name").map(|n| n.id());
    let mut cursor = declarator.walk();
    let mut found = None;
    for child in declarator.named_children(&mut cursor) {
        if Some(child.id()) == name_id || child.kind() == "bracketed_argument_list" {
            continue;
        }
        if child.kind() == "identifier" && name_id.is_none() && found.is_none() {
            // Name without a field tag.
            found = Some(None);
            continue;
        }
        if child.kind() == "equals_value_clause" {
            let mut inner = child.walk();
            let value = child.named_children(&mut inner).next();
            return value;
        }
        return Some(child);
    }
    found.flatten()
}

/// Best-effort static type of an expression. `None` when not confidently
/// derivable.
pub fn infer_expression_type(expr: Node<'_>, source: &[u8]) -> Option<String> {
    match expr.kind() {
        "object_creation_expression" | "array_creation_expression" => expr
            .child_by_field_name("type")
            .map(|t| base_type_name(&node_text(&t, source)))
            .filter(|t| !t.is_empty()),
        "integer_literal" => {
            let text = node_text(&expr, source).to_ascii_lowercase();
            let ty = if text.ends_with("ul") || text.ends_with("lu") {
                "ulong"
            } else if text.ends_with('l') {
                "long"
            } else if text.ends_with('u') {
                "uint"
            } else {
                "int"
            };
            Some(ty.to_string())
        }
        "real_literal" => {
            let text = node_text(&expr, source).to_ascii_lowercase();
            let ty = if text.ends_with('f') {
                "float"
            } else if text.ends_with('m') {
                "decimal"
            } else {
                "double"
            };
            Some(ty.to_string())
        }
        "string_literal"
        | "verbatim_string_literal"
        | "raw_string_literal"
        | "interpolated_string_expression" => Some("string".to_string()),
        "character_literal" => Some("char".to_string()),
        "boolean_literal" => Some("bool".to_string()),
        "cast_expression" | "default_expression" => expr
            .child_by_field_name("type")
            .map(|t| base_type_name(&node_text(&t, source)))
            .filter(|t| !t.is_empty()),
        "as_expression" => {
            let target = expr.child_by_field_name("right").or_else(|| {
                let count = expr.named_child_count();
                if count == 0 {
                    None
                } else {
                    expr.named_child(count - 1)
                }
            });
            target
                .map(|t| base_type_name(&node_text(&t, source)))
                .filter(|t| !t.is_empty())
        }
        "parenthesized_expression" => {
            let mut cursor = expr.walk();
            let inner = expr.named_children(&mut cursor).next();
            inner.and_then(|i| infer_expression_type(i, source))
        }
        "invocation_expression" => generic_call_type(expr, source),
        "binary_expression" => infer_binary(expr, source),
        "conditional_expression" => {
            let then = expr.child_by_field_name("consequence");
            let other = expr.child_by_field_name("alternative");
            let then_ty = then.and_then(|n| infer_expression_type(n, source));
            let other_ty = other.and_then(|n| infer_expression_type(n, source));
            let then_null = then.is_some_and(|n| n.kind() == "null_literal");
            let other_null = other.is_some_and(|n| n.kind() == "null_literal");
            match (then_ty, other_ty) {
                (Some(a), Some(b)) if a == b => Some(a),
                (Some(a), None) if other_null => Some(a),
                (None, Some(b)) if then_null => Some(b),
                _ => None,
            }
        }
        "typeof_expression" => Some("Type".to_string()),
        _ => None,
    }
}

/// `GetComponent<Foo>()` / `services.Get<Foo>()` → `Foo`.
fn generic_call_type(invocation: Node<'_>, source: &[u8]) -> Option<String> {
    let function = invocation.child_by_field_name("function")?;
    let generic = match function.kind() {
        "generic_name" => function,
        "member_access_expression" => function
            .child_by_field_name("name")
            .filter(|n| n.kind() == "generic_name")?,
        _ => return None,
    };
    let mut cursor = generic.walk();
    let args = generic
        .named_children(&mut cursor)
        .find(|c| c.kind() == "type_argument_list")?;
    let mut inner = args.walk();
    let first = args.named_children(&mut inner).next()?;
    let ty = base_type_name(&node_text(&first, source));
    if ty.is_empty() {
        None
    } else {
        Some(ty)
    }
}

const NUMERIC_RANK: &[&str] = &["int", "uint", "long", "ulong", "float", "double", "decimal"];

fn infer_binary(expr: Node<'_>, source: &[u8]) -> Option<String> {
    let left = expr.child_by_field_name("left")?;
    let right = expr.child_by_field_name("right")?;
    let op = expr
        .child_by_field_name("operator")
        .map(|o| node_text(&o, source))
        .or_else(|| {
            let text = node_text(&expr, source);
            let start = left.end_byte().saturating_sub(expr.start_byte());
            let end = right.start_byte().saturating_sub(expr.start_byte());
            text.get(start..end).map(|s| s.trim().to_string())
        })?;
    let op = op.trim();

    if matches!(op, "==" | "!=" | "<" | ">" | "<=" | ">=" | "&&" | "||") {
        return Some("bool".to_string());
    }
    let l = infer_expression_type(left, source);
    let r = infer_expression_type(right, source);
    if op == "??" {
        return l.or(r);
    }
    if op == "+" && (l.as_deref() == Some("string") || r.as_deref() == Some("string")) {
        return Some("string".to_string());
    }
    let (l, r) = (l?, r?);
    let lr = NUMERIC_RANK.iter().position(|t| *t == l)?;
    let rr = NUMERIC_RANK.iter().position(|t| *t == r)?;
    Some(NUMERIC_RANK[lr.max(rr)].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tree_sitter::{Parser, Tree};

    fn parse(source: &str) -> Tree {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_c_sharp::LANGUAGE.into())
            .unwrap();
        parser.parse(source, None).unwrap()
    }

    /// Identifier nodes whose text is exactly `text`, in document order.
    fn identifiers<'t>(node: Node<'t>, source: &str, text: &str) -> Vec<Node<'t>> {
        let mut stack = vec![node];
        let mut found = Vec::new();
        while let Some(n) = stack.pop() {
            if n.kind() == "identifier" && n.utf8_text(source.as_bytes()).ok() == Some(text) {
                found.push(n);
            }
            let mut cursor = n.walk();
            let children: Vec<_> = n.named_children(&mut cursor).collect();
            for c in children.into_iter().rev() {
                stack.push(c);
            }
        }
        found
    }

    fn find_identifier<'t>(node: Node<'t>, source: &str, text: &str, skip: usize) -> Option<Node<'t>> {
        identifiers(node, source, text).get(skip).copied()
    }

    fn resolve_last(source: &str, ident: &str) -> Option<TypeBinding> {
        let tree = parse(source);
        let config = ResolverConfig::default();
        let site = *identifiers(tree.root_node(), source, ident).last()?;
        let mut resolver = TypeResolver::new(tree.root_node(), source.as_bytes(), &config);
        resolver.resolve(ident, site)
    }

    #[test]
    fn test_identifiers_match_whole_names_only() {
        let src = "class A { Rigidbody body; Logger Log; void F() { body.Move(); } }";
        let tree = parse(src);
        assert_eq!(identifiers(tree.root_node(), src, "body").len(), 2);
        assert_eq!(identifiers(tree.root_node(), src, "Log").len(), 1);
    }

    #[test]
    fn test_field_binding_wins() {
        let src = r#"
namespace Game {
    class Player {
        private Foo _x;
        void Tick() { _x?.Bar(); }
    }
}"#;
        let binding = resolve_last(src, "_x").unwrap();
        assert_eq!(binding.type_name, "Foo");
        assert_eq!(binding.source, BindingSource::Field);
        assert_eq!(binding.namespace.as_deref(), Some("Game"));
        assert!(binding.confidence > 0.8);
    }

    #[test]
    fn test_local_inference_from_new_and_generic_call() {
        let src = r#"
class A {
    void Run() {
        var repo = new UserRepository();
        var body = GetComponent<Rigidbody>();
        repo.Save();
        body.Move();
    }
}"#;
        let repo = resolve_last(src, "repo").unwrap();
        assert_eq!(repo.type_name, "UserRepository");
        assert_eq!(repo.source, BindingSource::Local);

        let body = resolve_last(src, "body").unwrap();
        assert_eq!(body.type_name, "Rigidbody");
    }

    #[test]
    fn test_local_inference_from_literals_cast_and_as() {
        let src = r#"
class A {
    void Run(object o) {
        var count = 1 + 2.5;
        var label = "n=" + count;
        var svc = (IService)o;
        var other = o as Widget;
        var flag = count > 3 ? true : false;
        count.ToString();
        label.Trim();
        svc.Start();
        other.Draw();
        flag.ToString();
    }
}"#;
        assert_eq!(resolve_last(src, "count").unwrap().type_name, "double");
        assert_eq!(resolve_last(src, "label").unwrap().type_name, "string");
        assert_eq!(resolve_last(src, "svc").unwrap().type_name, "IService");
        assert_eq!(resolve_last(src, "other").unwrap().type_name, "Widget");
        assert_eq!(resolve_last(src, "flag").unwrap().type_name, "bool");
    }

    #[test]
    fn test_unknown_local_still_binds() {
        let src = r#"
class A {
    void Run() {
        var thing = Factory.Make();
        thing.Go();
    }
}"#;
        let binding = resolve_last(src, "thing").unwrap();
        assert_eq!(binding.type_name, UNKNOWN_TYPE);
        assert!(!binding.is_known());
    }

    #[test]
    fn test_parameter_then_property() {
        let src = r#"
class A {
    public Logger Log { get; set; }
    void Run(Mailer mailer) {
        mailer.Send();
        Log.Write();
    }
}"#;
        let mailer = resolve_last(src, "mailer").unwrap();
        assert_eq!(mailer.type_name, "Mailer");
        assert_eq!(mailer.source, BindingSource::Parameter);

        let log = resolve_last(src, "Log").unwrap();
        assert_eq!(log.type_name, "Logger");
        assert_eq!(log.source, BindingSource::Property);
    }

    #[test]
    fn test_memoizes_misses_and_hits() {
        let src = r#"
class A {
    void Run() { nothing.Go(); nothing.Stop(); }
}"#;
        let tree = parse(src);
        let config = ResolverConfig::default();
        let first = find_identifier(tree.root_node(), src, "nothing", 0).unwrap();
        let second = find_identifier(tree.root_node(), src, "nothing", 1).unwrap();
        let mut resolver = TypeResolver::new(tree.root_node(), src.as_bytes(), &config);
        assert!(resolver.resolve("nothing", first).is_none());
        assert!(resolver.resolve("nothing", second).is_none());
        assert_eq!(resolver.cache_hits(), 1);
    }

    #[test]
    fn test_normalize_interface_name() {
        assert_eq!(normalize_interface_name("IRepository", 'I'), "Repository");
        assert_eq!(normalize_interface_name("IO", 'I'), "IO");
        assert_eq!(normalize_interface_name("Item", 'I'), "Item");
        assert_eq!(normalize_interface_name("Foo", 'I'), "Foo");
    }
}
