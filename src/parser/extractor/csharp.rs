//
//  csharp.rs
//  Symgraph
//
//  Created by hak (tharun)
//

//! C# symbol, dependency and import extraction over a tree-sitter tree.
//!
//! One [`ExtractionContext`] is built per parse. It tracks the namespace and
//! type path seen in the tree. A chunk arrives wrapped in a prelude that
//! reopens its enclosing scopes, so members cut from the middle of a class
//! still qualify as `Namespace.Class.Member`; declarations inside the
//! prelude itself are not reported.

use std::collections::HashSet;

use tree_sitter::{Node, Tree};

use super::fallback::{regex_calls, MemberSpan};
use super::helpers::{
    base_type_name, clip, declaration_signature, end_line, field_text, modifiers, node_text,
    start_line, visibility_from_modifiers,
};
use super::ExtractOptions;
use crate::chunking::lexer;
use crate::chunking::structure::SYNTHETIC_BODY;
use crate::parser::resolver::{normalize_interface_name, TypeResolver};
use crate::parser::syntax::SyntaxKind;
use crate::parser::types::*;

const THIS_CALL_CONFIDENCE: f32 = 0.95;
const LOCAL_METHOD_CONFIDENCE: f32 = 0.9;
const BARE_CALL_CONFIDENCE: f32 = 0.7;
const STATIC_CALL_CONFIDENCE: f32 = 0.75;
const CONSTRUCTION_CONFIDENCE: f32 = 0.9;
const DECLARED_BASE_CONFIDENCE: f32 = 1.0;
const GUESSED_BASE_CONFIDENCE: f32 = 0.9;

const ARGUMENT_CONTEXT_CHARS: usize = 80;
const RECEIVER_CONTEXT_CHARS: usize = 60;

/// Extract everything from an already-parsed tree. Lines in the result are
/// local to `source`.
pub fn extract_tree(tree: &Tree, source: &str, options: &ExtractOptions<'_>) -> ParseResult {
    let root = tree.root_node();
    let mut ctx = ExtractionContext::new(root, source.as_bytes(), options);
    ctx.visit(root);

    if options.regex_fallback && !ctx.members.is_empty() {
        let map = lexer::scan(source);
        let extra = regex_calls(
            &map.masked,
            &ctx.members,
            &ctx.result.dependencies,
            options.resolver.regex_confidence,
        );
        ctx.result.dependencies.extend(extra);
    }

    let mut result = ctx.result;
    if !options.chunk_mode {
        result.errors.extend(syntax_errors(tree, source));
    }
    result.exports = result
        .symbols
        .iter()
        .filter(|s| s.is_exported)
        .map(|s| Export {
            name: s.name.clone(),
            qualified_name: s.qualified_name.clone(),
            kind: s.kind,
            line: s.start_line,
        })
        .collect();
    result.metadata.chunks_processed = 1;
    result
}

/// One error per `ERROR` node and per missing token, in the tree's own
/// line coordinates.
pub fn syntax_errors(tree: &Tree, source: &str) -> Vec<ParseError> {
    let mut errors = Vec::new();
    if !tree.root_node().has_error() {
        return errors;
    }
    let bytes = source.as_bytes();
    let mut cursor = tree.walk();
    loop {
        let node = cursor.node();
        let pos = node.start_position();
        if node.is_error() {
            let snippet = clip(&node_text(&node, bytes), 40);
            errors.push(ParseError::error(
                format!("Syntax error near `{snippet}`"),
                pos.row + 1,
                pos.column + 1,
            ));
        } else if node.is_missing() {
            errors.push(ParseError::error(
                format!("Missing `{}`", node.kind()),
                pos.row + 1,
                pos.column + 1,
            ));
        }

        // Only descend into subtrees that contain errors.
        if node.has_error() && cursor.goto_first_child() {
            continue;
        }
        loop {
            if cursor.goto_next_sibling() {
                break;
            }
            if !cursor.goto_parent() {
                return errors;
            }
        }
    }
}

/// Per-parse state. Nothing here outlives one call to [`extract_tree`].
struct ExtractionContext<'a> {
    source: &'a [u8],
    options: &'a ExtractOptions<'a>,
    namespaces: Vec<String>,
    types: Vec<(String, SyntaxKind)>,
    member: Option<String>,
    declared_methods: HashSet<String>,
    resolver: TypeResolver<'a>,
    members: Vec<MemberSpan>,
    result: ParseResult,
}

enum Receiver<'t> {
    Implicit,
    This,
    Named(String, Node<'t>),
    Expression(String),
}

impl<'a> ExtractionContext<'a> {
    fn new(root: Node<'a>, source: &'a [u8], options: &'a ExtractOptions<'a>) -> Self {
        let mut declared_methods = HashSet::new();
        collect_method_names(root, source, &mut declared_methods);
        Self {
            source,
            options,
            namespaces: Vec::new(),
            types: Vec::new(),
            member: None,
            declared_methods,
            resolver: TypeResolver::new(root, source, options.resolver),
            members: Vec::new(),
            result: ParseResult::default(),
        }
    }

    fn visit(&mut self, node: Node<'a>) {
        let kind = SyntaxKind::of(&node);
        match kind {
            SyntaxKind::UsingDirective => self.using_directive(node),
            SyntaxKind::NamespaceDeclaration => self.namespace(node, false),
            SyntaxKind::FileScopedNamespace => self.namespace(node, true),
            k if k.is_type_declaration() => self.type_declaration(node, k),
            SyntaxKind::DelegateDeclaration => self.delegate(node),
            SyntaxKind::EnumMember => self.enum_member(node),
            SyntaxKind::MethodDeclaration | SyntaxKind::ConstructorDeclaration => self.method(node),
            SyntaxKind::PropertyDeclaration | SyntaxKind::IndexerDeclaration => {
                self.property(node, kind)
            }
            SyntaxKind::FieldDeclaration => self.field(node),
            SyntaxKind::EventFieldDeclaration | SyntaxKind::EventDeclaration => {
                self.event(node, kind)
            }
            SyntaxKind::Invocation => {
                self.invocation(node);
                self.visit_children(node);
            }
            SyntaxKind::ObjectCreation => {
                self.object_creation(node);
                self.visit_children(node);
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_children(&mut self, node: Node<'a>) {
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
        for child in children {
            self.visit(child);
        }
    }

    // ---- qualification -------------------------------------------------

    /// Container path: every namespace and type the tree has opened.
    fn prefix(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .cloned()
            .chain(self.types.iter().map(|(name, _)| name.clone()))
            .collect()
    }

    fn qualify(&self, name: &str) -> String {
        let mut parts = self.prefix();
        parts.push(name.to_string());
        parts.join(".")
    }

    fn container(&self) -> Option<String> {
        let parts = self.prefix();
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("."))
        }
    }

    fn in_type(&self) -> bool {
        !self.types.is_empty()
    }

    /// Part of a chunk's prelude rather than its own content.
    fn is_synthetic(&self, node: &Node) -> bool {
        node.start_byte() < self.options.synthetic_prefix
    }

    fn in_interface(&self) -> bool {
        self.types
            .last()
            .is_some_and(|(_, k)| *k == SyntaxKind::InterfaceDeclaration)
    }

    fn push_symbol(
        &mut self,
        node: &Node,
        name: &str,
        kind: SymbolKind,
        visibility: Visibility,
        is_exported: bool,
        signature: Option<String>,
    ) -> String {
        let line = start_line(node);
        let qualified_name = self.qualify(name);
        if self.is_synthetic(node) {
            return qualified_name;
        }
        self.result.symbols.push(Symbol {
            name: name.to_string(),
            qualified_name: qualified_name.clone(),
            kind,
            start_line: line,
            end_line: end_line(node),
            is_exported,
            visibility,
            signature,
        });
        qualified_name
    }

    // ---- declarations ----------------------------------------------------

    fn using_directive(&mut self, node: Node<'a>) {
        let text = node_text(&node, self.source);
        let mut rest = text.trim().trim_end_matches(';').trim();
        let is_global = rest.starts_with("global ");
        if is_global {
            rest = rest["global ".len()..].trim_start();
        }
        let Some(body) = rest.strip_prefix("using") else {
            return;
        };
        let body = body.trim();
        let line = start_line(&node);

        let (source, alias, kind) = if let Some(target) = body.strip_prefix("static ") {
            (target.trim().to_string(), None, ImportKind::Static)
        } else if let Some((alias, target)) = body.split_once('=') {
            let alias = alias.trim().to_string();
            self.push_symbol(
                &node,
                &alias,
                SymbolKind::TypeAlias,
                Visibility::Private,
                false,
                Some(format!("using {} = {}", alias, target.trim())),
            );
            (target.trim().to_string(), Some(alias), ImportKind::Alias)
        } else {
            (body.to_string(), None, ImportKind::Namespace)
        };
        if source.is_empty() {
            return;
        }
        self.result.imports.push(Import {
            source,
            alias,
            kind,
            is_global,
            line,
        });
    }

    fn namespace(&mut self, node: Node<'a>, file_scoped: bool) {
        let Some(name) = field_text(&node, "name", self.source) else {
            self.visit_children(node);
            return;
        };
        self.push_symbol(
            &node,
            &name,
            SymbolKind::Namespace,
            Visibility::Public,
            false,
            Some(format!("namespace {name}")),
        );
        self.namespaces.push(name);
        let mut cursor = node.walk();
        let children: Vec<Node<'a>> = node.named_children(&mut cursor).collect();
        for child in children {
            if Some(child.id()) != node.child_by_field_name("name").map(|n| n.id()) {
                self.visit(child);
            }
        }
        // A file-scoped namespace covers every later sibling as well.
        if !file_scoped {
            self.namespaces.pop();
        }
    }

    fn type_declaration(&mut self, node: Node<'a>, kind: SyntaxKind) {
        let Some(name) = field_text(&node, "name", self.source) else {
            self.visit_children(node);
            return;
        };
        let mods = modifiers(&node, self.source);
        let default = if self.in_type() {
            Visibility::Private
        } else {
            Visibility::Public
        };
        let symbol_kind = if kind == SyntaxKind::InterfaceDeclaration {
            SymbolKind::Interface
        } else {
            SymbolKind::Type
        };
        let qualified = self.push_symbol(
            &node,
            &name,
            symbol_kind,
            visibility_from_modifiers(&mods, default),
            mods.iter().any(|m| m == "public"),
            declaration_signature(&node, self.source),
        );
        self.base_types(node, kind, &qualified);

        self.types.push((name, kind));
        let outer_member = self.member.take();
        match body_of(node) {
            Some(body) => self.visit(body),
            None => self.visit_children(node),
        }
        self.member = outer_member;
        self.types.pop();
    }

    fn base_types(&mut self, node: Node<'a>, kind: SyntaxKind, qualified: &str) {
        if kind == SyntaxKind::EnumDeclaration {
            return;
        }
        let mut cursor = node.walk();
        let Some(bases) = node
            .named_children(&mut cursor)
            .find(|c| SyntaxKind::of(c) == SyntaxKind::BaseList)
        else {
            return;
        };
        let line = start_line(&bases);
        let prefix = self.options.resolver.interface_prefix;
        let mut inner = bases.walk();
        let entries: Vec<Node<'a>> = bases.named_children(&mut inner).collect();
        let mut position = 0;
        for entry in entries {
            let type_node = match entry.kind() {
                "argument_list" => continue,
                "primary_constructor_base_type" => entry
                    .child_by_field_name("type")
                    .or_else(|| entry.named_child(0))
                    .unwrap_or(entry),
                _ => entry,
            };
            let target = base_type_name(&node_text(&type_node, self.source));
            if target.is_empty() {
                continue;
            }
            let simple = target.rsplit('.').next().unwrap_or(&target);
            let interface_like = normalize_interface_name(simple, prefix) != simple;
            let (dep_kind, confidence) = match kind {
                SyntaxKind::InterfaceDeclaration => (DependencyKind::Inherits, DECLARED_BASE_CONFIDENCE),
                SyntaxKind::StructDeclaration => (
                    DependencyKind::Implements,
                    if interface_like { DECLARED_BASE_CONFIDENCE } else { GUESSED_BASE_CONFIDENCE },
                ),
                _ if interface_like => (DependencyKind::Implements, DECLARED_BASE_CONFIDENCE),
                _ if position == 0 => (DependencyKind::Inherits, GUESSED_BASE_CONFIDENCE),
                _ => (DependencyKind::Implements, GUESSED_BASE_CONFIDENCE),
            };
            let mut dep = Dependency::new(qualified, target, dep_kind, line, confidence);
            dep.qualified_context = Some(qualified.to_string());
            self.result.dependencies.push(dep);
            position += 1;
        }
    }

    fn delegate(&mut self, node: Node<'a>) {
        let Some(name) = field_text(&node, "name", self.source) else {
            return;
        };
        let mods = modifiers(&node, self.source);
        let default = if self.in_type() {
            Visibility::Private
        } else {
            Visibility::Public
        };
        self.push_symbol(
            &node,
            &name,
            SymbolKind::Type,
            visibility_from_modifiers(&mods, default),
            mods.iter().any(|m| m == "public"),
            declaration_signature(&node, self.source),
        );
    }

    fn enum_member(&mut self, node: Node<'a>) {
        let Some(name) = field_text(&node, "name", self.source) else {
            return;
        };
        self.push_symbol(
            &node,
            &name,
            SymbolKind::Constant,
            Visibility::Public,
            false,
            None,
        );
    }

    fn member_visibility(&self, mods: &[String]) -> Visibility {
        let default = if self.in_interface() {
            Visibility::Public
        } else {
            Visibility::Private
        };
        visibility_from_modifiers(mods, default)
    }

    fn method(&mut self, node: Node<'a>) {
        let Some(name) = field_text(&node, "name", self.source) else {
            self.visit_children(node);
            return;
        };
        if name == SYNTHETIC_BODY && self.is_synthetic(&node) {
            // Blocks reopened outside any member belong to the type.
            let outer = self.member.take();
            self.visit_children(node);
            self.member = outer;
            return;
        }
        let mods = modifiers(&node, self.source);
        let qualified = self.push_symbol(
            &node,
            &name,
            SymbolKind::Method,
            self.member_visibility(&mods),
            mods.iter().any(|m| m == "public"),
            declaration_signature(&node, self.source),
        );
        self.enter_member(node, qualified);
    }

    fn property(&mut self, node: Node<'a>, kind: SyntaxKind) {
        let name = if kind == SyntaxKind::IndexerDeclaration {
            "this[]".to_string()
        } else {
            match field_text(&node, "name", self.source) {
                Some(name) => name,
                None => {
                    self.visit_children(node);
                    return;
                }
            }
        };
        let mods = modifiers(&node, self.source);
        let qualified = self.push_symbol(
            &node,
            &name,
            SymbolKind::Property,
            self.member_visibility(&mods),
            mods.iter().any(|m| m == "public"),
            declaration_signature(&node, self.source),
        );
        self.enter_member(node, qualified);
    }

    /// Visit a member body with `qualified` as the caller of every edge
    /// found inside.
    fn enter_member(&mut self, node: Node<'a>, qualified: String) {
        // Only the body: headers like `void IFoo.Bar()` look like calls.
        if let Some(body) = member_body(node) {
            self.members.push(MemberSpan {
                qualified_name: qualified.clone(),
                start_byte: body.start_byte(),
                end_byte: body.end_byte(),
                start_line: start_line(&body),
            });
        }
        let outer = self.member.replace(qualified);
        self.visit_children(node);
        self.member = outer;
    }

    fn field(&mut self, node: Node<'a>) {
        let mods = modifiers(&node, self.source);
        let is_const = mods.iter().any(|m| m == "const");
        let visibility = self.member_visibility(&mods);
        let exported = mods.iter().any(|m| m == "public");
        let kind = if is_const {
            SymbolKind::Constant
        } else {
            SymbolKind::Field
        };
        for (name, type_text) in declarators(node, self.source) {
            let mut signature = mods.clone();
            signature.push(type_text);
            signature.push(name.clone());
            self.push_symbol(&node, &name, kind, visibility, exported, Some(signature.join(" ")));
        }
        // Initializers run in the type's context.
        let outer = self.member.take();
        self.visit_children(node);
        self.member = outer;
    }

    fn event(&mut self, node: Node<'a>, kind: SyntaxKind) {
        let mods = modifiers(&node, self.source);
        let visibility = self.member_visibility(&mods);
        let exported = mods.iter().any(|m| m == "public");
        if kind == SyntaxKind::EventDeclaration {
            if let Some(name) = field_text(&node, "name", self.source) {
                let qualified = self.push_symbol(
                    &node,
                    &name,
                    SymbolKind::Event,
                    visibility,
                    exported,
                    declaration_signature(&node, self.source),
                );
                self.enter_member(node, qualified);
            }
            return;
        }
        for (name, type_text) in declarators(node, self.source) {
            let signature = format!("event {type_text} {name}");
            self.push_symbol(&node, &name, SymbolKind::Event, visibility, exported, Some(signature));
        }
    }

    // ---- dependencies ------------------------------------------------------

    fn caller(&self) -> Option<String> {
        self.member.clone().or_else(|| self.container())
    }

    fn type_path(&self) -> Option<String> {
        if self.in_type() {
            self.container()
        } else {
            None
        }
    }

    fn invocation(&mut self, node: Node<'a>) {
        let line = start_line(&node);
        let Some(from) = self.caller() else {
            return;
        };
        let Some(function) = node.child_by_field_name("function") else {
            return;
        };
        let Some((receiver, name)) = self.call_shape(function) else {
            return;
        };
        if name == "nameof" {
            return;
        }
        let type_path = self.type_path();
        let config = self.options.resolver;

        let mut dep = match receiver {
            Receiver::Implicit => {
                if self.declared_methods.contains(&name) {
                    let to = match &type_path {
                        Some(path) => format!("{path}.{name}"),
                        None => name.clone(),
                    };
                    Dependency::new(&from, to, DependencyKind::Calls, line, LOCAL_METHOD_CONFIDENCE)
                } else {
                    Dependency::new(&from, &name, DependencyKind::Calls, line, BARE_CALL_CONFIDENCE)
                }
            }
            Receiver::This => {
                let to = match &type_path {
                    Some(path) => format!("{path}.{name}"),
                    None => name.clone(),
                };
                let mut dep =
                    Dependency::new(&from, to, DependencyKind::Calls, line, THIS_CALL_CONFIDENCE);
                dep.calling_object = Some("this".to_string());
                dep.resolved_receiver_type = type_path
                    .as_deref()
                    .and_then(|p| p.rsplit('.').next())
                    .map(str::to_string);
                dep
            }
            Receiver::Named(ident, site) => {
                let mut dep = match self.resolver.resolve(&ident, site) {
                    Some(binding) if binding.is_known() => {
                        let target = self.resolver.normalize_type(&binding.type_name);
                        let mut dep = Dependency::new(
                            &from,
                            format!("{target}.{name}"),
                            DependencyKind::Calls,
                            line,
                            binding.confidence,
                        );
                        dep.resolved_receiver_type = Some(binding.type_name);
                        dep
                    }
                    Some(binding) => {
                        Dependency::new(&from, &name, DependencyKind::Calls, line, binding.confidence)
                    }
                    None if ident.starts_with(|c: char| c.is_uppercase()) => {
                        let mut dep = Dependency::new(
                            &from,
                            format!("{ident}.{name}"),
                            DependencyKind::Calls,
                            line,
                            STATIC_CALL_CONFIDENCE,
                        );
                        dep.resolved_receiver_type = Some(ident.clone());
                        dep
                    }
                    None => Dependency::new(
                        &from,
                        &name,
                        DependencyKind::Calls,
                        line,
                        config.unresolved_confidence,
                    ),
                };
                dep.calling_object = Some(ident);
                dep
            }
            Receiver::Expression(text) => {
                let mut dep = Dependency::new(
                    &from,
                    &name,
                    DependencyKind::Calls,
                    line,
                    config.unresolved_confidence,
                );
                dep.calling_object = Some(text);
                dep
            }
        };
        dep.parameter_context = node
            .child_by_field_name("arguments")
            .map(|a| clip(&node_text(&a, self.source), ARGUMENT_CONTEXT_CHARS));
        dep.qualified_context = type_path;
        self.result.dependencies.push(dep);
    }

    /// Split a call's `function` node into receiver and method name.
    fn call_shape(&self, function: Node<'a>) -> Option<(Receiver<'a>, String)> {
        match function.kind() {
            "identifier" => Some((Receiver::Implicit, node_text(&function, self.source))),
            "generic_name" => Some((Receiver::Implicit, simple_name(function, self.source)?)),
            "member_access_expression" => {
                let name = simple_name(function.child_by_field_name("name")?, self.source)?;
                let expr = function.child_by_field_name("expression")?;
                Some((self.receiver(expr), name))
            }
            "member_binding_expression" => {
                let name_node = function
                    .child_by_field_name("name")
                    .or_else(|| last_named_child(function))?;
                let name = simple_name(name_node, self.source)?;
                let receiver = conditional_target(function)
                    .map(|cond| self.receiver(cond))
                    .unwrap_or(Receiver::Expression(String::new()));
                Some((receiver, name))
            }
            "conditional_access_expression" => {
                let cond = function
                    .child_by_field_name("condition")
                    .or_else(|| function.named_child(0))?;
                let mut cursor = function.walk();
                let binding = function
                    .named_children(&mut cursor)
                    .filter(|c| c.kind() == "member_binding_expression")
                    .last()?;
                let name_node = binding
                    .child_by_field_name("name")
                    .or_else(|| last_named_child(binding))?;
                let name = simple_name(name_node, self.source)?;
                Some((self.receiver(cond), name))
            }
            _ => {
                // Shapes the grammar nests differently, e.g. `a?.b.C`.
                let text = node_text(&function, self.source);
                let (head, tail) = text.rsplit_once('.')?;
                let name = tail.trim();
                if !is_identifier(name) {
                    return None;
                }
                let head = head.trim_end_matches('?').trim();
                Some((Receiver::Expression(clip(head, RECEIVER_CONTEXT_CHARS)), name.to_string()))
            }
        }
    }

    fn receiver(&self, expr: Node<'a>) -> Receiver<'a> {
        let text = node_text(&expr, self.source);
        match expr.kind() {
            "this_expression" | "this" => Receiver::This,
            "identifier" => Receiver::Named(text, expr),
            "member_access_expression" => {
                let owner = expr.child_by_field_name("expression");
                let name = expr.child_by_field_name("name");
                match (owner, name) {
                    (Some(owner), Some(name))
                        if matches!(owner.kind(), "this_expression" | "this")
                            && name.kind() == "identifier" =>
                    {
                        Receiver::Named(node_text(&name, self.source), name)
                    }
                    _ => Receiver::Expression(clip(&text, RECEIVER_CONTEXT_CHARS)),
                }
            }
            _ if text.trim() == "this" => Receiver::This,
            _ => Receiver::Expression(clip(&text, RECEIVER_CONTEXT_CHARS)),
        }
    }

    fn object_creation(&mut self, node: Node<'a>) {
        let line = start_line(&node);
        let Some(from) = self.caller() else {
            return;
        };
        let Some(type_node) = node.child_by_field_name("type") else {
            return;
        };
        let target = base_type_name(&node_text(&type_node, self.source));
        if target.is_empty() {
            return;
        }
        let mut dep = Dependency::new(
            from,
            target,
            DependencyKind::References,
            line,
            CONSTRUCTION_CONFIDENCE,
        );
        dep.parameter_context = node
            .child_by_field_name("arguments")
            .map(|a| clip(&node_text(&a, self.source), ARGUMENT_CONTEXT_CHARS));
        dep.qualified_context = self.type_path();
        self.result.dependencies.push(dep);
    }
}

/// Names of every method and local function in the tree.
fn collect_method_names(node: Node<'_>, source: &[u8], out: &mut HashSet<String>) {
    if matches!(
        SyntaxKind::of(&node),
        SyntaxKind::MethodDeclaration | SyntaxKind::LocalFunction
    ) {
        if let Some(name) = field_text(&node, "name", source) {
            out.insert(name);
        }
    }
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        collect_method_names(child, source, out);
    }
}

fn body_of(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("body").or_else(|| {
        let mut cursor = node.walk();
        let found = node
            .named_children(&mut cursor)
            .find(|c| matches!(c.kind(), "declaration_list" | "enum_member_declaration_list"));
        found
    })
}

fn member_body(node: Node<'_>) -> Option<Node<'_>> {
    node.child_by_field_name("body").or_else(|| {
        let mut cursor = node.walk();
        let found = node.named_children(&mut cursor).find(|c| {
            matches!(
                c.kind(),
                "block" | "accessor_list" | "arrow_expression_clause"
            )
        });
        found
    })
}

/// `(name, declared type)` for each declarator of a field-like node.
fn declarators(node: Node<'_>, source: &[u8]) -> Vec<(String, String)> {
    let mut out = Vec::new();
    let mut cursor = node.walk();
    for decl in node.named_children(&mut cursor) {
        if SyntaxKind::of(&decl) != SyntaxKind::VariableDeclaration {
            continue;
        }
        let type_text = field_text(&decl, "type", source).unwrap_or_default();
        let mut inner = decl.walk();
        for declarator in decl.named_children(&mut inner) {
            if SyntaxKind::of(&declarator) != SyntaxKind::VariableDeclarator {
                continue;
            }
            let name = field_text(&declarator, "name", source).or_else(|| {
                let mut c = declarator.walk();
                let ident = declarator
                    .named_children(&mut c)
                    .find(|n| n.kind() == "identifier")
                    .map(|n| node_text(&n, source));
                ident
            });
            if let Some(name) = name {
                out.push((name, type_text.clone()));
            }
        }
    }
    out
}

fn simple_name(node: Node<'_>, source: &[u8]) -> Option<String> {
    let name = match node.kind() {
        "generic_name" => {
            let mut cursor = node.walk();
            let ident = node
                .named_children(&mut cursor)
                .find(|c| c.kind() == "identifier")
                .map(|c| node_text(&c, source));
            ident.or_else(|| {
                let text = node_text(&node, source);
                text.split('<').next().map(|s| s.trim().to_string())
            })?
        }
        _ => node_text(&node, source).trim().to_string(),
    };
    if is_identifier(&name) {
        Some(name)
    } else {
        None
    }
}

fn last_named_child(node: Node<'_>) -> Option<Node<'_>> {
    let count = node.named_child_count();
    if count == 0 {
        None
    } else {
        node.named_child(count - 1)
    }
}

/// Receiver of a `?.` member binding: the condition of the nearest
/// enclosing conditional access.
fn conditional_target(binding: Node<'_>) -> Option<Node<'_>> {
    let mut current = binding.parent();
    while let Some(n) = current {
        if n.kind() == "conditional_access_expression" {
            return n
                .child_by_field_name("condition")
                .or_else(|| n.named_child(0));
        }
        current = n.parent();
    }
    None
}

fn is_identifier(text: &str) -> bool {
    let text = text.trim_start_matches('@');
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => chars.all(|c| c.is_alphanumeric() || c == '_'),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::parser::language::SupportedLanguage;
    use std::path::Path;

    fn extract_with(source: &str, synthetic_prefix: usize, chunk_mode: bool) -> ParseResult {
        let config = ResolverConfig::default();
        let options = ExtractOptions {
            synthetic_prefix,
            chunk_mode,
            resolver: &config,
            regex_fallback: true,
        };
        let mut parser = SupportedLanguage::CSharp.new_parser(Path::new("t.cs")).unwrap();
        let tree = parser.parse(source, None).unwrap();
        extract_tree(&tree, source, &options)
    }

    fn extract(source: &str) -> ParseResult {
        extract_with(source, 0, false)
    }

    fn calls_to<'r>(result: &'r ParseResult, to: &str) -> Vec<&'r Dependency> {
        result
            .dependencies
            .iter()
            .filter(|d| d.kind == DependencyKind::Calls && d.to_symbol == to)
            .collect()
    }

    #[test]
    fn test_symbols_are_qualified_and_classified() {
        let src = r#"using System;
using static System.Math;
using Json = Newtonsoft.Json;

namespace Game.Core
{
    public interface IMover { void Move(); }

    public class Player : Entity, IMover
    {
        public const int MaxHp = 100;
        private int _hp;
        public string Name { get; set; }
        public event Action Died;

        public Player() { }
        public void Move() { }
        void Heal() { }
    }

    enum Team { Red, Blue }
}
"#;
        let result = extract(src);
        let find = |q: &str| result.find_symbol(q).unwrap_or_else(|| panic!("missing {q}"));

        assert_eq!(find("Game.Core").kind, SymbolKind::Namespace);
        assert_eq!(find("Game.Core.IMover").kind, SymbolKind::Interface);
        assert_eq!(find("Game.Core.IMover.Move").visibility, Visibility::Public);
        let player = find("Game.Core.Player");
        assert_eq!(player.kind, SymbolKind::Type);
        assert!(player.is_exported);
        assert_eq!(player.start_line, 9);
        assert_eq!(player.end_line, 19);
        assert_eq!(find("Game.Core.Player.MaxHp").kind, SymbolKind::Constant);
        assert_eq!(find("Game.Core.Player._hp").kind, SymbolKind::Field);
        assert_eq!(find("Game.Core.Player._hp").visibility, Visibility::Private);
        assert_eq!(find("Game.Core.Player.Name").kind, SymbolKind::Property);
        assert_eq!(find("Game.Core.Player.Died").kind, SymbolKind::Event);
        assert_eq!(find("Game.Core.Player.Heal").visibility, Visibility::Private);
        assert_eq!(
            find("Game.Core.Player.Move").signature.as_deref(),
            Some("public void Move()")
        );
        assert_eq!(find("Game.Core.Team.Blue").kind, SymbolKind::Constant);
        assert_eq!(find("Json").kind, SymbolKind::TypeAlias);

        assert_eq!(result.imports.len(), 3);
        assert_eq!(result.imports[1].kind, ImportKind::Static);
        assert_eq!(result.imports[1].source, "System.Math");
        assert_eq!(result.imports[2].alias.as_deref(), Some("Json"));

        let inherits = result
            .dependencies
            .iter()
            .find(|d| d.kind == DependencyKind::Inherits)
            .unwrap();
        assert_eq!(inherits.from_symbol, "Game.Core.Player");
        assert_eq!(inherits.to_symbol, "Entity");
        assert!(result
            .dependencies
            .iter()
            .any(|d| d.kind == DependencyKind::Implements && d.to_symbol == "IMover"));

        assert!(result.exports.iter().any(|e| e.qualified_name == "Game.Core.Player.Move"));
        assert!(!result.exports.iter().any(|e| e.qualified_name == "Game.Core.Player.Heal"));
        assert!(result.errors.is_empty());
        assert_eq!(result.metadata.chunks_processed, 1);
    }

    #[test]
    fn test_conditional_call_on_field_resolves_receiver() {
        let src = r#"
namespace App {
    class Holder {
        private Foo _x = new Foo();
        void Tick() {
            _x?.Bar();
        }
    }
}"#;
        let result = extract(src);
        let dep = result
            .dependencies
            .iter()
            .find(|d| d.kind == DependencyKind::Calls && d.to_symbol.contains("Bar"))
            .expect("call to Bar");
        assert_eq!(dep.from_symbol, "App.Holder.Tick");
        assert_eq!(dep.resolved_receiver_type.as_deref(), Some("Foo"));
        assert_eq!(dep.to_symbol, "Foo.Bar");
        assert!(dep.confidence > 0.8);
        assert_eq!(dep.calling_object.as_deref(), Some("_x"));
    }

    #[test]
    fn test_interface_receiver_points_at_class() {
        let src = r#"
class Service {
    private readonly IRepository _repo;
    public void Save(IMailer mailer) {
        _repo.Store(1);
        mailer.Send("hi");
        this.Log();
        Log();
        Console.WriteLine("x");
    }
    void Log() { }
}"#;
        let result = extract(src);

        let store = calls_to(&result, "Repository.Store");
        assert_eq!(store.len(), 1);
        assert_eq!(store[0].resolved_receiver_type.as_deref(), Some("IRepository"));
        assert_eq!(store[0].parameter_context.as_deref(), Some("(1)"));

        let send = calls_to(&result, "Mailer.Send");
        assert_eq!(send.len(), 1);
        assert_eq!(send[0].confidence, 0.9);

        let logs = calls_to(&result, "Service.Log");
        assert_eq!(logs.len(), 2);
        assert!(logs.iter().any(|d| d.confidence == THIS_CALL_CONFIDENCE));
        assert!(logs.iter().any(|d| d.confidence == LOCAL_METHOD_CONFIDENCE));

        let console = calls_to(&result, "Console.WriteLine");
        assert_eq!(console[0].confidence, STATIC_CALL_CONFIDENCE);
    }

    #[test]
    fn test_object_creation_is_a_reference() {
        let src = "class A { void Run() { var b = new Builder<int>(); } }";
        let result = extract(src);
        let dep = result
            .dependencies
            .iter()
            .find(|d| d.kind == DependencyKind::References)
            .unwrap();
        assert_eq!(dep.from_symbol, "A.Run");
        assert_eq!(dep.to_symbol, "Builder");
    }

    #[test]
    fn test_prelude_qualifies_chunk_members() {
        // The tail of `class Player` inside `namespace Game`, behind a
        // prelude that reopens both.
        let prelude = "namespace Game { class Player {\n";
        let chunk = format!(
            "{prelude}        public void Jump() {{ Land(); }}\n        void Land() {{ }}\n    }}\n\n    public class Enemy {{ }}\n}}\n"
        );
        let result = extract_with(&chunk, prelude.len(), true);

        let jump = result.find_symbol("Game.Player.Jump").expect("qualified member");
        assert_eq!(jump.start_line, 2);
        assert!(result.find_symbol("Game.Player.Land").is_some());
        assert!(result.find_symbol("Game.Enemy").is_some());
        // The reopened scopes are not declarations of this chunk.
        assert!(result.find_symbol("Game").is_none());
        assert!(result.find_symbol("Game.Player").is_none());
        assert!(result.exports.iter().all(|e| e.qualified_name != "Game.Player"));
        assert!(calls_to(&result, "Game.Player.Land").len() == 1);
        // Chunk mode never reports syntax errors.
        assert!(result.errors.is_empty());
    }

    #[test]
    fn test_synthetic_body_attributes_calls_to_the_type() {
        let prelude = format!("namespace Game {{ class Player {{ void {SYNTHETIC_BODY}() {{\n");
        let chunk = format!("{prelude}            Respawn();\n        }}\n    }}\n}}\n");
        let result = extract_with(&chunk, prelude.len(), true);

        assert!(result.symbols.is_empty());
        let calls = calls_to(&result, "Respawn");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].from_symbol, "Game.Player");
        assert_eq!(calls[0].line_number, 2);
    }

    #[test]
    fn test_syntax_errors_are_reported_once_per_node() {
        let src = "class A {\n    void Run( {\n}\n";
        let result = extract(src);
        assert!(result.has_errors());
        assert!(result.errors.iter().all(|e| e.severity == Severity::Error));
    }

    #[test]
    fn test_regex_pass_does_not_duplicate_ast_calls() {
        let src = "class A { void Run() { _a.Go(); } }";
        let result = extract(src);
        let go: Vec<_> = result
            .dependencies
            .iter()
            .filter(|d| d.to_symbol.ends_with("Go"))
            .collect();
        assert_eq!(go.len(), 1);
    }
}
