//! Parser module: dispatch by file extension.

pub mod extract;
pub mod jsdoc;
pub mod lexer;
pub mod merge;
pub mod types;

use crate::error::{GenerateError, Result};
use crate::scan::SourceFile;
use extract::Extraction;

/// Extensions the extractor understands.
pub const SOURCE_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"];

/// Extract documented entities from a source file based on its extension.
pub fn parse_file(file: &SourceFile, content: &str, include_internal: bool) -> Result<Extraction> {
    match file.path.extension().and_then(|e| e.to_str()) {
        Some(ext) if SOURCE_EXTENSIONS.contains(&ext) => {
            Ok(extract::extract(file, content, include_internal))
        }
        _ => Err(GenerateError::UnsupportedFile(file.path.clone())),
    }
}
