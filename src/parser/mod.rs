//
//  mod.rs
//  Symgraph
//
//  Created by hak (tharun)
//

pub mod extractor;
pub mod language;
pub mod resolver;
pub mod syntax;
pub mod types;

pub use extractor::{extract_source, extract_tree, ExtractOptions};
pub use language::SupportedLanguage;
pub use resolver::{BindingSource, TypeBinding, TypeResolver};
pub use types::*;
