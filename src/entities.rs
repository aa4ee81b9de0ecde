//
//  entities.rs
//  Symgraph
//
//  Created by hak (tharun)
//

//! Framework entities layered on top of a finished parse.
//!
//! Detectors only read a [`ParseResult`]. What they find is stored next to
//! the core symbols, never merged into them.

use serde::{Deserialize, Serialize};

use crate::parser::types::{DependencyKind, ParseResult, SymbolKind};

/// A domain object recognized in a file, e.g. a Unity component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameworkEntity {
    /// Detector that produced it.
    pub framework: String,
    /// Entity category within the framework (`component`, `controller`, ...).
    pub kind: String,
    /// Qualified name of the symbol the entity is anchored to.
    pub symbol: String,
    pub line: usize,
}

pub trait EntityDetector: Send + Sync {
    fn name(&self) -> &'static str;

    fn detect(&self, result: &ParseResult) -> Vec<FrameworkEntity>;
}

/// Types whose declared base is one of `bases`.
fn types_deriving_from(result: &ParseResult, bases: &[&str]) -> Vec<(String, usize)> {
    result
        .dependencies
        .iter()
        .filter(|d| d.kind == DependencyKind::Inherits)
        .filter(|d| {
            let simple = d.to_symbol.rsplit('.').next().unwrap_or(&d.to_symbol);
            bases.contains(&simple)
        })
        .map(|d| (d.from_symbol.clone(), d.line_number))
        .collect()
}

/// Unity `MonoBehaviour` components and `ScriptableObject` assets.
pub struct UnityDetector;

impl EntityDetector for UnityDetector {
    fn name(&self) -> &'static str {
        "unity"
    }

    fn detect(&self, result: &ParseResult) -> Vec<FrameworkEntity> {
        let mut found = Vec::new();
        for (base, kind) in [
            ("MonoBehaviour", "component"),
            ("ScriptableObject", "asset"),
        ] {
            for (symbol, line) in types_deriving_from(result, &[base]) {
                found.push(FrameworkEntity {
                    framework: self.name().to_string(),
                    kind: kind.to_string(),
                    symbol,
                    line,
                });
            }
        }
        found
    }
}

/// ASP.NET controllers, by base class or by naming convention.
pub struct AspNetDetector;

impl EntityDetector for AspNetDetector {
    fn name(&self) -> &'static str {
        "aspnet"
    }

    fn detect(&self, result: &ParseResult) -> Vec<FrameworkEntity> {
        let mut controllers = types_deriving_from(result, &["Controller", "ControllerBase"]);
        for symbol in &result.symbols {
            if symbol.kind == SymbolKind::Type
                && symbol.name.ends_with("Controller")
                && symbol.name != "Controller"
                && !controllers.iter().any(|(q, _)| *q == symbol.qualified_name)
            {
                controllers.push((symbol.qualified_name.clone(), symbol.start_line));
            }
        }
        controllers
            .into_iter()
            .map(|(symbol, line)| FrameworkEntity {
                framework: self.name().to_string(),
                kind: "controller".to_string(),
                symbol,
                line,
            })
            .collect()
    }
}

/// Detectors run on every scanned file.
pub fn default_detectors() -> Vec<Box<dyn EntityDetector>> {
    vec![Box::new(UnityDetector), Box::new(AspNetDetector)]
}

/// Run every detector over one result.
pub fn detect_all(detectors: &[Box<dyn EntityDetector>], result: &ParseResult) -> Vec<FrameworkEntity> {
    detectors.iter().flat_map(|d| d.detect(result)).collect()
}
