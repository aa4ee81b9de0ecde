//! Secondary call pass over code-masked member bodies.
//!
//! The grammar occasionally under-reports chained or conditional calls
//! inside malformed or partial code. This pass finds `.Name(` / `?.Name(`
//! shapes with a regex and adds them at low confidence, skipping any line
//! where the tree already produced a matching call.

use std::sync::OnceLock;

use regex::Regex;

use crate::parser::types::{Dependency, DependencyKind};

/// Byte range of one member, as seen by the tree walk.
#[derive(Debug, Clone)]
pub struct MemberSpan {
    pub qualified_name: String,
    pub start_byte: usize,
    pub end_byte: usize,
    pub start_line: usize,
}

fn call_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(r"(?:([A-Za-z_]\w*)\s*)?(?:\?\.|\.)\s*([A-Za-z_]\w*)\s*(?:<[^<>()]*>)?\s*\(")
                .ok()
        })
        .as_ref()
}

/// Calls found in `masked` member bodies that `existing` does not cover.
/// `masked` must be byte-aligned with the parsed source.
pub fn regex_calls(
    masked: &str,
    members: &[MemberSpan],
    existing: &[Dependency],
    confidence: f32,
) -> Vec<Dependency> {
    let mut found: Vec<Dependency> = Vec::new();
    let Some(pattern) = call_pattern() else {
        return found;
    };
    for member in members {
        let Some(body) = masked.get(member.start_byte..member.end_byte) else {
            continue;
        };
        for caps in pattern.captures_iter(body) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                continue;
            };
            let name = name.as_str();
            let line = member.start_line + body[..whole.start()].matches('\n').count();

            let covered = existing.iter().chain(found.iter()).any(|d| {
                d.kind == DependencyKind::Calls
                    && d.line_number == line
                    && d.from_symbol.starts_with(&member.qualified_name)
                    && (d.to_symbol == name || d.to_symbol.ends_with(&format!(".{name}")))
            });
            if covered {
                continue;
            }

            let mut dep = Dependency::new(
                &member.qualified_name,
                name,
                DependencyKind::Calls,
                line,
                confidence,
            );
            dep.calling_object = caps.get(1).map(|m| m.as_str().to_string());
            found.push(dep);
        }
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(name: &str, body: &str) -> MemberSpan {
        MemberSpan {
            qualified_name: name.to_string(),
            start_byte: 0,
            end_byte: body.len(),
            start_line: 10,
        }
    }

    #[test]
    fn test_finds_chained_and_conditional_calls() {
        let body = "void Run() {\n  a?.First().Second();\n  b.Third<int>(1);\n}";
        let deps = regex_calls(body, &[span("A.Run", body)], &[], 0.4);
        let names: Vec<_> = deps.iter().map(|d| d.to_symbol.as_str()).collect();
        assert_eq!(names, vec!["First", "Second", "Third"]);
        assert_eq!(deps[0].line_number, 11);
        assert_eq!(deps[0].calling_object.as_deref(), Some("a"));
        assert_eq!(deps[2].line_number, 12);
        assert!(deps.iter().all(|d| d.confidence == 0.4));
    }

    #[test]
    fn test_skips_calls_the_tree_already_found() {
        let body = "{\n  repo.Save();\n}";
        let existing = vec![Dependency::new(
            "A.Run",
            "Repository.Save",
            DependencyKind::Calls,
            11,
            0.95,
        )];
        let deps = regex_calls(body, &[span("A.Run", body)], &existing, 0.4);
        assert!(deps.is_empty());
    }
}
