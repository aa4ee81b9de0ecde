//
//  config.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Result, SymgraphError};

/// Top-level configuration, usually read from `symgraph.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SymgraphConfig {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub resolver: ResolverConfig,
}

/// How oversized files are split.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Files above this many bytes are parsed in chunks.
    #[serde(default = "default_max_chunk_bytes")]
    pub max_chunk_bytes: usize,
    /// Lines each chunk repeats from the end of the previous one.
    #[serde(default = "default_overlap_lines")]
    pub overlap_lines: usize,
    #[serde(default = "default_true")]
    pub enable_chunking: bool,
    /// Lower edge of the fallback search window, as a fraction of `max_chunk_bytes`.
    #[serde(default = "default_boundary_search_floor")]
    pub boundary_search_floor: f64,
    /// Deepest brace nesting at which the fallback scanner records a boundary.
    #[serde(default = "default_max_boundary_depth")]
    pub max_boundary_depth: usize,
    /// Share of the file taken by oversized declarations above which the
    /// file is parsed as a single unit.
    #[serde(default = "default_oversized_ratio")]
    pub oversized_ratio: f64,
}

/// Extraction settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// When false, private symbols are dropped from the final result.
    #[serde(default = "default_true")]
    pub include_private_symbols: bool,
    /// Hard reject threshold, independent of chunking.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: usize,
    /// Run the lower-confidence regex call pass after AST extraction.
    #[serde(default = "default_true")]
    pub regex_fallback: bool,
}

/// Receiver type resolution tunables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Point `IFoo.Bar` call edges at `Foo.Bar`.
    #[serde(default = "default_true")]
    pub strip_interface_prefix: bool,
    #[serde(default = "default_interface_prefix")]
    pub interface_prefix: char,
    #[serde(default = "default_field_confidence")]
    pub field_confidence: f32,
    #[serde(default = "default_local_confidence")]
    pub local_confidence: f32,
    #[serde(default = "default_inferred_confidence")]
    pub inferred_confidence: f32,
    #[serde(default = "default_parameter_confidence")]
    pub parameter_confidence: f32,
    #[serde(default = "default_property_confidence")]
    pub property_confidence: f32,
    /// Confidence for calls whose receiver could not be typed.
    #[serde(default = "default_unresolved_confidence")]
    pub unresolved_confidence: f32,
    #[serde(default = "default_regex_confidence")]
    pub regex_confidence: f32,
}

fn default_true() -> bool {
    true
}

fn default_max_chunk_bytes() -> usize {
    28_000
}

fn default_overlap_lines() -> usize {
    100
}

fn default_boundary_search_floor() -> f64 {
    0.7
}

fn default_max_boundary_depth() -> usize {
    3
}

fn default_oversized_ratio() -> f64 {
    0.8
}

fn default_max_file_size() -> usize {
    5_000_000
}

fn default_interface_prefix() -> char {
    'I'
}

fn default_field_confidence() -> f32 {
    0.95
}

fn default_local_confidence() -> f32 {
    0.9
}

fn default_inferred_confidence() -> f32 {
    0.85
}

fn default_parameter_confidence() -> f32 {
    0.9
}

fn default_property_confidence() -> f32 {
    0.85
}

fn default_unresolved_confidence() -> f32 {
    0.5
}

fn default_regex_confidence() -> f32 {
    0.4
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chunk_bytes: default_max_chunk_bytes(),
            overlap_lines: default_overlap_lines(),
            enable_chunking: true,
            boundary_search_floor: default_boundary_search_floor(),
            max_boundary_depth: default_max_boundary_depth(),
            oversized_ratio: default_oversized_ratio(),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            include_private_symbols: true,
            max_file_size: default_max_file_size(),
            regex_fallback: true,
        }
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            strip_interface_prefix: true,
            interface_prefix: default_interface_prefix(),
            field_confidence: default_field_confidence(),
            local_confidence: default_local_confidence(),
            inferred_confidence: default_inferred_confidence(),
            parameter_confidence: default_parameter_confidence(),
            property_confidence: default_property_confidence(),
            unresolved_confidence: default_unresolved_confidence(),
            regex_confidence: default_regex_confidence(),
        }
    }
}

impl SymgraphConfig {
    /// Load config from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_toml_str(&contents).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the chunking engine cannot make progress with.
    pub fn validate(&self) -> Result<()> {
        let c = &self.chunking;
        if c.max_chunk_bytes == 0 {
            return Err(SymgraphError::InvalidConfig(
                "chunking.max_chunk_bytes must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&c.boundary_search_floor) {
            return Err(SymgraphError::InvalidConfig(format!(
                "chunking.boundary_search_floor must be within [0, 1], got {}",
                c.boundary_search_floor
            )));
        }
        if !(0.0..=1.0).contains(&c.oversized_ratio) {
            return Err(SymgraphError::InvalidConfig(format!(
                "chunking.oversized_ratio must be within [0, 1], got {}",
                c.oversized_ratio
            )));
        }
        let r = &self.resolver;
        for (name, value) in [
            ("field_confidence", r.field_confidence),
            ("local_confidence", r.local_confidence),
            ("inferred_confidence", r.inferred_confidence),
            ("parameter_confidence", r.parameter_confidence),
            ("property_confidence", r.property_confidence),
            ("unresolved_confidence", r.unresolved_confidence),
            ("regex_confidence", r.regex_confidence),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(SymgraphError::InvalidConfig(format!(
                    "resolver.{name} must be within [0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = SymgraphConfig::default();
        assert_eq!(config.chunking.max_chunk_bytes, 28_000);
        assert_eq!(config.chunking.overlap_lines, 100);
        assert!(config.chunking.enable_chunking);
        assert!(config.parser.include_private_symbols);
        assert_eq!(config.parser.max_file_size, 5_000_000);
        assert_eq!(config.resolver.interface_prefix, 'I');
    }

    #[test]
    fn test_partial_toml_keeps_other_defaults() {
        let config = SymgraphConfig::from_toml_str(
            "[chunking]\nmax_chunk_bytes = 4096\n\n[parser]\ninclude_private_symbols = false\n",
        )
        .unwrap();
        assert_eq!(config.chunking.max_chunk_bytes, 4096);
        assert_eq!(config.chunking.overlap_lines, 100);
        assert!(!config.parser.include_private_symbols);
        assert!(config.parser.regex_fallback);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = SymgraphConfig::from_toml_str("[chunking]\nmax_chunk_bytes = 0\n");
        assert!(matches!(err, Err(SymgraphError::InvalidConfig(_))));

        let err = SymgraphConfig::from_toml_str("[resolver]\nfield_confidence = 1.5\n");
        assert!(matches!(err, Err(SymgraphError::InvalidConfig(_))));
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = SymgraphConfig::load(&dir.path().join("missing.toml"));
        assert_eq!(config.chunking.max_chunk_bytes, 28_000);
    }
}
