//! Source scanner: expand a package's glob patterns into sorted file lists.

use crate::config::PackageConfig;
use crate::error::{GenerateError, Result};
use crate::report::{Diagnostic, Stage};
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// A file found under one of the package roots.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to its root, `/`-separated, for display and links.
    pub relative: String,
}

/// Everything the scanner found for one package.
#[derive(Debug, Default)]
pub struct ScanResult {
    pub sources: Vec<SourceFile>,
    pub declarations: Vec<SourceFile>,
    pub diagnostics: Vec<Diagnostic>,
    /// At least one configured root was missing or unreadable.
    pub root_unreadable: bool,
}

const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// Scan every root of `package`. Missing roots are reported and skipped.
pub fn scan(package: &PackageConfig) -> Result<ScanResult> {
    let excludes = package
        .exclude
        .iter()
        .map(|p| compile(p))
        .collect::<Result<Vec<_>>>()?;

    let mut result = ScanResult::default();
    for root in &package.roots {
        if !root.is_dir() {
            tracing::warn!(root = %root.display(), "source root missing, skipping");
            result.root_unreadable = true;
            result.diagnostics.push(
                Diagnostic::warning(Stage::Scanning, "source root does not exist or is not a directory")
                    .in_file(root),
            );
            continue;
        }

        let mut root_failed = false;
        for pattern in &package.include {
            for file in expand(root, pattern, &excludes, &mut result.diagnostics, &mut root_failed)? {
                if is_declaration(&file.path) {
                    result.declarations.push(file);
                } else {
                    result.sources.push(file);
                }
            }
        }
        for pattern in &package.types {
            let found = expand(root, pattern, &excludes, &mut result.diagnostics, &mut root_failed)?;
            result.declarations.extend(found);
        }
        result.root_unreadable |= root_failed;
    }

    // Sort for deterministic output
    result.sources.sort();
    result.sources.dedup();
    result.declarations.sort();
    result.declarations.dedup();

    tracing::debug!(
        sources = result.sources.len(),
        declarations = result.declarations.len(),
        "scan complete"
    );
    Ok(result)
}

/// True for TypeScript declaration files (`.d.ts`, `.d.mts`, `.d.cts`).
pub fn is_declaration(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
    name.ends_with(".d.ts") || name.ends_with(".d.mts") || name.ends_with(".d.cts")
}

fn compile(pattern: &str) -> Result<Pattern> {
    Pattern::new(pattern).map_err(|e| GenerateError::Pattern {
        pattern: pattern.to_string(),
        source: e,
    })
}

fn expand(
    root: &Path,
    pattern: &str,
    excludes: &[Pattern],
    diagnostics: &mut Vec<Diagnostic>,
    root_failed: &mut bool,
) -> Result<Vec<SourceFile>> {
    // Validate the pattern on its own so errors name what the user wrote.
    compile(pattern)?;
    // The root is a literal path; only the pattern may hold wildcards.
    let full = Path::new(&Pattern::escape(&root.to_string_lossy())).join(pattern);
    let full = full.to_string_lossy();
    let entries = glob::glob_with(&full, MATCH_OPTIONS).map_err(|e| GenerateError::Pattern {
        pattern: pattern.to_string(),
        source: e,
    })?;

    let mut files = Vec::new();
    for entry in entries {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!(path = %e.path().display(), "unreadable path while scanning");
                *root_failed = true;
                diagnostics.push(
                    Diagnostic::warning(Stage::Scanning, format!("unreadable: {}", e.error()))
                        .in_file(e.path()),
                );
                continue;
            }
        };
        if !path.is_file() {
            continue;
        }
        let relative = relative_to(&path, root);
        if excludes.iter().any(|ex| ex.matches_with(&relative, MATCH_OPTIONS)) {
            tracing::trace!(file = %relative, "excluded");
            continue;
        }
        files.push(SourceFile { path, relative });
    }
    if files.is_empty() {
        tracing::debug!(root = %root.display(), pattern, "no files matched");
    }
    Ok(files)
}

fn relative_to(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
