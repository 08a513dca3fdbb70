//! Run diagnostics and the end-of-run summary.

use std::fmt;
use std::path::{Path, PathBuf};

/// Pipeline stage a diagnostic was raised in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Scanning,
    Extracting,
    Resolving,
    Emitting,
    UpdatingNavigation,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Scanning => "scanning",
            Stage::Extracting => "extracting",
            Stage::Resolving => "resolving",
            Stage::Emitting => "emitting",
            Stage::UpdatingNavigation => "updating-navigation",
            Stage::Done => "done",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

/// A recoverable problem, located well enough to find it again.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    pub stage: Stage,
    pub file: Option<PathBuf>,
    pub line: Option<usize>,
    pub symbol: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn warning(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            stage,
            file: None,
            line: None,
            symbol: None,
            message: message.into(),
        }
    }

    pub fn error(stage: Stage, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            ..Self::warning(stage, message)
        }
    }

    pub fn in_file(mut self, file: impl AsRef<Path>) -> Self {
        self.file = Some(file.as_ref().to_path_buf());
        self
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line = Some(line);
        self
    }

    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: ", label)?;
        if let Some(ref file) = self.file {
            write!(f, "{}", file.display())?;
            if let Some(line) = self.line {
                write!(f, ":{}", line)?;
            }
            f.write_str(": ")?;
        }
        if let Some(ref symbol) = self.symbol {
            write!(f, "{}: ", symbol)?;
        }
        f.write_str(&self.message)
    }
}

/// Outcome of one package run.
#[derive(Debug, Default)]
pub struct PackageReport {
    pub package: String,
    pub entities: usize,
    pub files_written: usize,
    pub files_unchanged: usize,
    pub nav_entries_added: usize,
    /// A configured root was missing or unreadable.
    pub root_unreadable: bool,
    pub diagnostics: Vec<Diagnostic>,
}

impl PackageReport {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    pub fn extend(&mut self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.diagnostics.extend(diagnostics);
    }

    pub fn warnings(&self) -> usize {
        self.count(Severity::Warning)
    }

    pub fn errors(&self) -> usize {
        self.count(Severity::Error)
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }

    /// Multi-line summary: one headline, then every diagnostic.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "{}: {} entities, {} files written ({} unchanged), {} navigation entries added, {} warnings, {} errors\n",
            self.package,
            self.entities,
            self.files_written,
            self.files_unchanged,
            self.nav_entries_added,
            self.warnings(),
            self.errors()
        );
        for diagnostic in &self.diagnostics {
            out.push_str("  ");
            out.push_str(&diagnostic.to_string());
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn diagnostic_display_includes_location_and_symbol() {
        let d = Diagnostic::warning(Stage::Extracting, "unterminated type expression")
            .in_file("src/session.js")
            .at_line(12)
            .for_symbol("Session.join");
        assert_eq!(
            d.to_string(),
            "warning: src/session.js:12: Session.join: unterminated type expression"
        );
    }

    #[test]
    fn diagnostic_display_without_location() {
        let d = Diagnostic::error(Stage::Scanning, "root missing");
        assert_eq!(d.to_string(), "error: root missing");
    }

    #[test]
    fn summary_counts_by_severity() {
        let mut report = PackageReport::new("client");
        report.entities = 3;
        report.push(Diagnostic::warning(Stage::Scanning, "a"));
        report.push(Diagnostic::warning(Stage::Extracting, "b"));
        report.push(Diagnostic::error(Stage::Emitting, "c"));
        assert_eq!(report.warnings(), 2);
        assert_eq!(report.errors(), 1);
        let summary = report.summary();
        assert!(summary.starts_with("client: 3 entities"));
        assert!(summary.contains("2 warnings, 1 errors"));
        assert!(summary.contains("  error: c\n"));
    }
}
