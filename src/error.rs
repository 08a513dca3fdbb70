//! Fatal error taxonomy. Recoverable problems are [`crate::report::Diagnostic`]s instead.

use std::path::PathBuf;

pub type Result<T, E = GenerateError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("no package named '{name}' in configuration (available: {available})")]
    UnknownPackage { name: String, available: String },

    #[error("failed to read configuration {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid configuration {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("unknown format: {0}. Use mdx or json")]
    UnknownFormat(String),

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFile(PathBuf),

    #[error("package '{package}': no source files found under configured roots")]
    NoSources { package: String },

    #[error(transparent)]
    Emit(#[from] EmitError),

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("refusing to overwrite directory {0} with a generated file")]
    TargetIsDirectory(PathBuf),

    #[error("failed to read navigation document {path}: {source}")]
    NavigationRead {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("navigation document {path} is not valid JSON: {source}")]
    NavigationParse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("navigation document {path}: {reason}")]
    NavigationShape { path: PathBuf, reason: String },
}

/// A fragment could not be produced for one entity.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("fragment for {symbol} is not well-formed: {reason}")]
    Malformed { symbol: String, reason: String },

    #[error("failed to serialize {symbol}: {source}")]
    Serialize {
        symbol: String,
        source: serde_json::Error,
    },
}
