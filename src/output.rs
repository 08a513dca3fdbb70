//! Staged file output: every file is written to a temp file beside its
//! target first, and nothing is moved into place until all of them staged.

use crate::error::{GenerateError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// A file the run wants to exist with exactly these contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedFile {
    pub path: PathBuf,
    pub contents: String,
}

impl PlannedFile {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct WriteOutcome {
    pub written: Vec<PathBuf>,
    pub unchanged: Vec<PathBuf>,
}

/// Write all `files`, or none of them.
///
/// Byte-identical targets are left alone. A target that is a directory fails
/// the whole batch; staged temp files are removed when dropped.
pub fn write_all(files: &[PlannedFile]) -> Result<WriteOutcome> {
    let mut outcome = WriteOutcome::default();
    let mut staged: Vec<(NamedTempFile, &Path)> = Vec::new();

    for file in files {
        if file.path.is_dir() {
            return Err(GenerateError::TargetIsDirectory(file.path.clone()));
        }
        if is_unchanged(&file.path, &file.contents) {
            tracing::debug!(path = %file.path.display(), "unchanged");
            outcome.unchanged.push(file.path.clone());
            continue;
        }
        staged.push((stage(file)?, &file.path));
    }

    for (tmp, path) in staged {
        tmp.persist(path).map_err(|e| GenerateError::Write {
            path: path.to_path_buf(),
            source: e.error,
        })?;
        tracing::debug!(path = %path.display(), "wrote");
        outcome.written.push(path.to_path_buf());
    }
    Ok(outcome)
}

fn is_unchanged(path: &Path, contents: &str) -> bool {
    fs::read(path).is_ok_and(|existing| existing == contents.as_bytes())
}

fn stage(file: &PlannedFile) -> Result<NamedTempFile> {
    let write_error = |source| GenerateError::Write {
        path: file.path.clone(),
        source,
    };
    let dir = file
        .path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    fs::create_dir_all(dir).map_err(write_error)?;
    let mut tmp = NamedTempFile::new_in(dir).map_err(write_error)?;
    tmp.write_all(file.contents.as_bytes())
        .map_err(write_error)?;
    tmp.as_file().sync_all().map_err(write_error)?;
    Ok(tmp)
}
