//! Generator configuration: `mintdoc.toml` discovery and package definitions.
//!
//! Lookup order:
//! 1. `--config <path>`
//! 2. `./mintdoc.toml`
//! 3. the embedded defaults (`defaults/mintdoc.default.toml`)
//!
//! Relative paths are resolved against the directory holding the config file
//! (the working directory for the embedded defaults).

use crate::error::{GenerateError, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

const CONFIG_FILENAME: &str = "mintdoc.toml";
const DEFAULT_TOML: &str = include_str!("../defaults/mintdoc.default.toml");

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default, rename = "package")]
    pub packages: Vec<PackageConfig>,
    /// Where this configuration came from, for messages.
    #[serde(skip)]
    pub origin: Option<PathBuf>,
}

/// The Mintlify site the packages are generated into.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SiteConfig {
    #[serde(default = "default_site_root")]
    pub root: PathBuf,
    /// Navigation document, relative to `root`.
    #[serde(default = "default_navigation")]
    pub navigation: PathBuf,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            root: default_site_root(),
            navigation: default_navigation(),
        }
    }
}

impl SiteConfig {
    pub fn navigation_path(&self) -> PathBuf {
        self.root.join(&self.navigation)
    }
}

/// How generated fragments are laid out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// One standalone page per entity.
    #[default]
    Pages,
    /// One snippet per entity plus a single page importing them all.
    Import,
}

/// One source package and where its documentation goes.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PackageConfig {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    pub roots: Vec<PathBuf>,
    #[serde(default = "default_include")]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Declaration file patterns (`.d.ts`) for the type pass.
    #[serde(default)]
    pub types: Vec<String>,
    /// Output path relative to the site root; doubles as the navigation path.
    pub output: String,
    #[serde(default)]
    pub group: Option<String>,
    #[serde(default)]
    pub mode: OutputMode,
    /// Snippet directory for import mode, relative to the site root.
    #[serde(default)]
    pub fragments: Option<String>,
    /// Write and navigate an overview page in pages mode.
    #[serde(default)]
    pub index: bool,
    #[serde(default)]
    pub include_internal: bool,
    /// Old URL prefix to redirect from, e.g. `/api/client`.
    #[serde(default)]
    pub legacy_prefix: Option<String>,
    /// Base URL for "view source" links, e.g. a GitHub blob URL.
    #[serde(default)]
    pub source_url: Option<String>,
    /// Fence language for examples and signatures.
    #[serde(default = "default_language")]
    pub language: String,
}

impl PackageConfig {
    pub fn title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn group(&self) -> &str {
        self.group.as_deref().unwrap_or_else(|| self.title())
    }

    /// Output path without leading/trailing slashes.
    pub fn output_path(&self) -> &str {
        self.output.trim_matches('/')
    }

    pub fn fragments_path(&self) -> String {
        match self.fragments {
            Some(ref f) => f.trim_matches('/').to_string(),
            None => format!("snippets/{}", self.name),
        }
    }
}

fn default_site_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_navigation() -> PathBuf {
    PathBuf::from("mint.json")
}

fn default_include() -> Vec<String> {
    vec!["**/*.js".to_string()]
}

fn default_language() -> String {
    "javascript".to_string()
}

impl Config {
    /// Load from an explicit path, `./mintdoc.toml`, or the embedded defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let local = PathBuf::from(CONFIG_FILENAME);
        if local.is_file() {
            return Self::from_file(&local);
        }
        tracing::debug!("no {} found, using built-in defaults", CONFIG_FILENAME);
        Self::from_toml_str(DEFAULT_TOML, Path::new("."), None)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| GenerateError::ConfigRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        let base = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        let config = Self::from_toml_str(&contents, base, Some(path))?;
        tracing::debug!(path = %path.display(), packages = config.packages.len(), "loaded configuration");
        Ok(config)
    }

    /// Parse TOML and resolve relative paths against `base`.
    pub fn from_toml_str(contents: &str, base: &Path, origin: Option<&Path>) -> Result<Self> {
        let mut config: Config = toml::from_str(contents).map_err(|e| GenerateError::ConfigParse {
            path: origin
                .map(Path::to_path_buf)
                .unwrap_or_else(|| PathBuf::from("<built-in defaults>")),
            source: e,
        })?;
        config.origin = origin.map(Path::to_path_buf);
        config.resolve_paths(base);
        config.validate()?;
        Ok(config)
    }

    fn resolve_paths(&mut self, base: &Path) {
        self.site.root = base.join(&self.site.root);
        for package in &mut self.packages {
            package.roots = package.roots.iter().map(|r| base.join(r)).collect();
        }
    }

    fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for package in &self.packages {
            if !seen.insert(package.name.as_str()) {
                return Err(GenerateError::ConfigInvalid(format!(
                    "package '{}' is defined more than once",
                    package.name
                )));
            }
            if package.output_path().is_empty() {
                return Err(GenerateError::ConfigInvalid(format!(
                    "package '{}' has an empty output path",
                    package.name
                )));
            }
            if package.roots.is_empty() {
                return Err(GenerateError::ConfigInvalid(format!(
                    "package '{}' has no source roots",
                    package.name
                )));
            }
        }
        Ok(())
    }

    /// Look up a package by name.
    pub fn package(&self, name: &str) -> Result<&PackageConfig> {
        self.packages
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| GenerateError::UnknownPackage {
                name: name.to_string(),
                available: self.package_names().join(", "),
            })
    }

    pub fn package_names(&self) -> Vec<&str> {
        self.packages.iter().map(|p| p.name.as_str()).collect()
    }
}
