//
//  helpers.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use tree_sitter::Node;

use crate::parser::types::Visibility;

/// Get the full text of a node.
pub fn node_text(node: &Node, source: &[u8]) -> String {
    node.utf8_text(source).unwrap_or("").to_string()
}

/// Text of a named field, trimmed, if present and non-empty.
pub fn field_text(node: &Node, field: &str, source: &[u8]) -> Option<String> {
    node.child_by_field_name(field)
        .map(|n| node_text(&n, source).trim().to_string())
        .filter(|s| !s.is_empty())
}

/// 1-based start line.
pub fn start_line(node: &Node) -> usize {
    node.start_position().row + 1
}

/// 1-based end line.
pub fn end_line(node: &Node) -> usize {
    node.end_position().row + 1
}

/// Modifier keywords (`public`, `static`, `partial`, ...) on a declaration.
pub fn modifiers(node: &Node, source: &[u8]) -> Vec<String> {
    let mut cursor = node.walk();
    node.children(&mut cursor)
        .filter(|c| c.kind() == "modifier")
        .map(|c| node_text(&c, source))
        .collect()
}

/// Map C# accessibility onto the three-level model. `internal` counts as
/// public; missing modifiers use `default`.
pub fn visibility_from_modifiers(mods: &[String], default: Visibility) -> Visibility {
    if mods.iter().any(|m| m == "public" || m == "internal") {
        if mods.iter().any(|m| m == "protected" || m == "private") {
            Visibility::Protected
        } else {
            Visibility::Public
        }
    } else if mods.iter().any(|m| m == "protected") {
        Visibility::Protected
    } else if mods.iter().any(|m| m == "private") {
        Visibility::Private
    } else {
        default
    }
}

/// Declaration header: attributes and body stripped, whitespace collapsed.
pub fn declaration_signature(node: &Node, source: &[u8]) -> Option<String> {
    let mut start = node.start_byte();
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "attribute_list" {
            start = start.max(child.end_byte());
        }
    }
    let end = node
        .child_by_field_name("body")
        .map(|b| b.start_byte())
        .unwrap_or_else(|| node.end_byte())
        .max(start);
    let text = std::str::from_utf8(source.get(start..end).unwrap_or_default()).unwrap_or("");
    let head = match (text.find('{'), text.find("=>")) {
        (Some(a), Some(b)) => &text[..a.min(b)],
        (Some(a), None) => &text[..a],
        (None, Some(b)) => &text[..b],
        (None, None) => text,
    };
    let collapsed = head.split_whitespace().collect::<Vec<_>>().join(" ");
    let collapsed = collapsed.trim_end_matches(';').trim().to_string();
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Strip generic arguments, nullable markers and array ranks from a type name.
pub fn base_type_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let no_generic = match trimmed.find('<') {
        Some(pos) => &trimmed[..pos],
        None => trimmed,
    };
    no_generic
        .trim_end_matches('?')
        .trim_end_matches("[]")
        .trim()
        .to_string()
}

/// Truncate long argument lists kept as dependency context.
pub fn clip(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let mut clipped: String = collapsed.chars().take(max_chars).collect();
        clipped.push('…');
        clipped
    }
}
