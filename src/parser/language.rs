//
//  language.rs
//  Symgraph
//
//  Created by hak (tharun)
//

use std::path::Path;

use tree_sitter::{Language, Parser};

use crate::error::{Result, SymgraphError};

/// Languages with a grammar binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SupportedLanguage {
    CSharp,
}

impl SupportedLanguage {
    /// Detect the language from a file extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?;
        match ext.to_ascii_lowercase().as_str() {
            "cs" => Some(SupportedLanguage::CSharp),
            _ => None,
        }
    }

    pub fn tree_sitter_language(self) -> Language {
        match self {
            SupportedLanguage::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        }
    }

    /// Build a parser ready for this language. Parsers are cheap and not
    /// `Sync`, so every chunk gets its own.
    pub fn new_parser(self, path: &Path) -> Result<Parser> {
        let mut parser = Parser::new();
        parser
            .set_language(&self.tree_sitter_language())
            .map_err(|e| SymgraphError::ParserInitError(path.to_path_buf(), e.to_string()))?;
        Ok(parser)
    }

    pub fn name(self) -> &'static str {
        match self {
            SupportedLanguage::CSharp => "csharp",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_path() {
        assert_eq!(
            SupportedLanguage::from_path(Path::new("src/Player.cs")),
            Some(SupportedLanguage::CSharp)
        );
        assert_eq!(
            SupportedLanguage::from_path(Path::new("Legacy.CS")),
            Some(SupportedLanguage::CSharp)
        );
        assert_eq!(SupportedLanguage::from_path(Path::new("main.rs")), None);
        assert_eq!(SupportedLanguage::from_path(Path::new("Makefile")), None);
    }

    #[test]
    fn test_parser_parses_csharp() {
        let mut parser = SupportedLanguage::CSharp
            .new_parser(Path::new("a.cs"))
            .unwrap();
        let tree = parser.parse("class A {}", None).unwrap();
        assert_eq!(tree.root_node().kind(), "compilation_unit");
    }
}
