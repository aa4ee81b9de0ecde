//
//  merge.rs
//  Symgraph
//
//  Created by hak (tharun)
//

//! Reassembles per-chunk results into one file result.
//!
//! Overlapping chunks see the same declarations and calls more than once,
//! and a type can be split over several chunks. Symbols are keyed by
//! `(qualified_name, kind)`, dependencies by `(from, to, kind, line)`.
//! Merging is idempotent: feeding a merged result back in changes nothing.

use std::collections::HashMap;

use crate::parser::types::*;

/// Line bucket width used to flag dependencies that cross chunk-sized
/// distances.
pub const CROSS_CHUNK_BUCKET_LINES: usize = 500;

/// Merge chunk results (already in file-global lines) in chunk order.
pub fn merge_results(parts: Vec<ParseResult>) -> ParseResult {
    let mut merged = ParseResult::default();
    let mut removed = 0;

    let mut symbol_index: HashMap<(String, SymbolKind), usize> = HashMap::new();
    let mut dep_index: HashMap<(String, String, DependencyKind, usize), usize> = HashMap::new();
    let mut import_index: HashMap<(String, Option<String>, ImportKind), usize> = HashMap::new();
    let mut export_index: HashMap<String, usize> = HashMap::new();
    let mut error_index: HashMap<(usize, usize, String), ()> = HashMap::new();

    for part in parts {
        merged.metadata.chunks_processed += part.metadata.chunks_processed;
        removed += part.metadata.duplicates_removed;

        for symbol in part.symbols {
            let key = (symbol.qualified_name.clone(), symbol.kind);
            match symbol_index.get(&key) {
                Some(&idx) => {
                    reconcile_symbol(&mut merged.symbols[idx], symbol);
                    removed += 1;
                }
                None => {
                    symbol_index.insert(key, merged.symbols.len());
                    merged.symbols.push(symbol);
                }
            }
        }

        for dep in part.dependencies {
            let key = (
                dep.from_symbol.clone(),
                dep.to_symbol.clone(),
                dep.kind,
                dep.line_number,
            );
            match dep_index.get(&key) {
                Some(&idx) => {
                    if dep.confidence > merged.dependencies[idx].confidence {
                        merged.dependencies[idx] = dep;
                    }
                    removed += 1;
                }
                None => {
                    dep_index.insert(key, merged.dependencies.len());
                    merged.dependencies.push(dep);
                }
            }
        }

        for import in part.imports {
            let key = (import.source.clone(), import.alias.clone(), import.kind);
            match import_index.get(&key) {
                Some(&idx) => {
                    let kept = &mut merged.imports[idx];
                    kept.is_global |= import.is_global;
                    kept.line = kept.line.min(import.line);
                }
                None => {
                    import_index.insert(key, merged.imports.len());
                    merged.imports.push(import);
                }
            }
        }

        for export in part.exports {
            match export_index.get(&export.qualified_name) {
                Some(&idx) => {
                    let kept = &mut merged.exports[idx];
                    kept.line = kept.line.min(export.line);
                }
                None => {
                    export_index.insert(export.qualified_name.clone(), merged.exports.len());
                    merged.exports.push(export);
                }
            }
        }

        for error in part.errors {
            let key = (error.line, error.column, error.message.clone());
            if error_index.insert(key, ()).is_none() {
                merged.errors.push(error);
            }
        }
    }

    merged.metadata.duplicates_removed = removed;
    merged.metadata.cross_chunk_references_found = count_cross_chunk(&merged);
    merged
}

/// Fold `other` into `kept`, both keyed by the same `(qualified_name, kind)`.
fn reconcile_symbol(kept: &mut Symbol, other: Symbol) {
    let touching = other.start_line <= kept.end_line + 1 && kept.start_line <= other.end_line + 1;
    if kept.kind.is_container() || touching {
        // One declaration seen in pieces: union of the pieces.
        kept.start_line = kept.start_line.min(other.start_line);
        kept.end_line = kept.end_line.max(other.end_line);
        if !kept.has_signature() && other.has_signature() {
            kept.signature = other.signature;
        }
        kept.is_exported |= other.is_exported;
        kept.visibility = wider(kept.visibility, other.visibility);
    } else if completeness(&other) > completeness(kept) {
        *kept = other;
    }
}

fn completeness(symbol: &Symbol) -> (bool, bool, usize) {
    (symbol.has_signature(), symbol.is_exported, symbol.line_span())
}

fn wider(a: Visibility, b: Visibility) -> Visibility {
    let rank = |v: Visibility| match v {
        Visibility::Public => 2,
        Visibility::Protected => 1,
        Visibility::Private => 0,
    };
    if rank(b) > rank(a) {
        b
    } else {
        a
    }
}

/// Dependencies whose call site and target declaration sit in different
/// line buckets. Targets not declared in this file are skipped.
fn count_cross_chunk(result: &ParseResult) -> usize {
    let mut targets: HashMap<&str, usize> = HashMap::new();
    for symbol in &result.symbols {
        targets
            .entry(symbol.qualified_name.as_str())
            .or_insert(symbol.start_line);
    }
    result
        .dependencies
        .iter()
        .filter(|dep| {
            targets.get(dep.to_symbol.as_str()).is_some_and(|&line| {
                bucket(line) != bucket(dep.line_number)
            })
        })
        .count()
}

fn bucket(line: usize) -> usize {
    line.saturating_sub(1) / CROSS_CHUNK_BUCKET_LINES
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(q: &str, kind: SymbolKind, start: usize, end: usize) -> Symbol {
        Symbol {
            name: q.rsplit('.').next().unwrap().to_string(),
            qualified_name: q.to_string(),
            kind,
            start_line: start,
            end_line: end,
            is_exported: false,
            visibility: Visibility::Private,
            signature: None,
        }
    }

    fn part(symbols: Vec<Symbol>, dependencies: Vec<Dependency>) -> ParseResult {
        ParseResult {
            symbols,
            dependencies,
            metadata: ChunkStats {
                chunks_processed: 1,
                ..ChunkStats::default()
            },
            ..ParseResult::default()
        }
    }

    #[test]
    fn test_split_type_takes_union_of_ranges() {
        let mut first = symbol("App.Player", SymbolKind::Type, 10, 300);
        first.signature = Some("public class Player".into());
        let second = symbol("App.Player", SymbolKind::Type, 250, 900);

        let merged = merge_results(vec![part(vec![first], vec![]), part(vec![second], vec![])]);
        assert_eq!(merged.symbols.len(), 1);
        let player = &merged.symbols[0];
        assert_eq!((player.start_line, player.end_line), (10, 900));
        assert_eq!(player.signature.as_deref(), Some("public class Player"));
        assert_eq!(merged.metadata.chunks_processed, 2);
        assert_eq!(merged.metadata.duplicates_removed, 1);
    }

    #[test]
    fn test_disjoint_collision_keeps_more_complete() {
        let bare = symbol("App.A.Run", SymbolKind::Method, 10, 12);
        let mut full = symbol("App.A.Run", SymbolKind::Method, 40, 41);
        full.signature = Some("void Run(int x)".into());
        let merged = merge_results(vec![part(vec![bare, full], vec![])]);
        assert_eq!(merged.symbols.len(), 1);
        assert_eq!(merged.symbols[0].start_line, 40);

        // Same signature presence: exported wins over wider.
        let wide = symbol("App.B", SymbolKind::Field, 1, 1);
        let mut exported = symbol("App.B", SymbolKind::Field, 9, 9);
        exported.is_exported = true;
        let merged = merge_results(vec![part(vec![wide, exported], vec![])]);
        assert!(merged.symbols[0].is_exported);
    }

    #[test]
    fn test_same_kind_only_collides() {
        let merged = merge_results(vec![part(
            vec![
                symbol("App.Thing", SymbolKind::Type, 1, 5),
                symbol("App.Thing", SymbolKind::Method, 1, 5),
            ],
            vec![],
        )]);
        assert_eq!(merged.symbols.len(), 2);
    }

    #[test]
    fn test_higher_confidence_dependency_wins() {
        let low = Dependency::new("A.Run", "B.Go", DependencyKind::Calls, 7, 0.5);
        let high = Dependency::new("A.Run", "B.Go", DependencyKind::Calls, 7, 0.9);
        let other_line = Dependency::new("A.Run", "B.Go", DependencyKind::Calls, 8, 0.4);
        let merged = merge_results(vec![
            part(vec![], vec![low, other_line]),
            part(vec![], vec![high]),
        ]);
        assert_eq!(merged.dependencies.len(), 2);
        assert_eq!(merged.dependencies[0].confidence, 0.9);
        assert_eq!(merged.dependencies[1].line_number, 8);
    }

    #[test]
    fn test_imports_exports_errors_dedup() {
        let import = Import {
            source: "System".into(),
            alias: None,
            kind: ImportKind::Namespace,
            is_global: false,
            line: 1,
        };
        let export = Export {
            name: "A".into(),
            qualified_name: "App.A".into(),
            kind: SymbolKind::Type,
            line: 3,
        };
        let mut a = part(vec![], vec![]);
        a.imports.push(import.clone());
        a.exports.push(export.clone());
        a.errors.push(ParseError::error("bad", 5, 1));
        let mut b = a.clone();
        b.imports.push(Import {
            alias: Some("Sys".into()),
            kind: ImportKind::Alias,
            ..import
        });

        let merged = merge_results(vec![a, b]);
        assert_eq!(merged.imports.len(), 2);
        assert_eq!(merged.exports.len(), 1);
        assert_eq!(merged.errors.len(), 1);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let parts = vec![
            part(
                vec![
                    symbol("App.A", SymbolKind::Type, 1, 400),
                    symbol("App.A.Run", SymbolKind::Method, 390, 395),
                ],
                vec![Dependency::new("App.A.Run", "App.B.Go", DependencyKind::Calls, 392, 0.9)],
            ),
            part(
                vec![
                    symbol("App.A.Run", SymbolKind::Method, 390, 395),
                    symbol("App.B", SymbolKind::Type, 700, 900),
                    symbol("App.B.Go", SymbolKind::Method, 800, 805),
                ],
                vec![
                    Dependency::new("App.A.Run", "App.B.Go", DependencyKind::Calls, 392, 0.9),
                    Dependency::new("App.B.Go", "App.A.Run", DependencyKind::Calls, 801, 0.9),
                ],
            ),
        ];
        let once = merge_results(parts);
        let twice = merge_results(vec![once.clone()]);
        assert_eq!(once, twice);
        assert_eq!(once.metadata.duplicates_removed, 2);
        // 392 -> 800 crosses a bucket, and so does 801 -> 390.
        assert_eq!(once.metadata.cross_chunk_references_found, 2);
    }
}
