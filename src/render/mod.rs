//! Renderer module: trait-based format dispatch.

pub mod escape;
pub mod json;
pub mod mdx;

use crate::error::{EmitError, GenerateError, Result};
use crate::model::DocumentedEntity;
use std::collections::BTreeMap;

/// Where a fragment ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Standalone page: frontmatter, members at `##`.
    Page,
    /// Imported snippet: entity heading at `##`, members at `###`.
    Fragment,
}

/// Symbol name to site URL, for `{@link}` and see-also references.
#[derive(Debug, Clone, Default)]
pub struct Links {
    targets: BTreeMap<String, String>,
}

impl Links {
    pub fn new(targets: BTreeMap<String, String>) -> Self {
        Self { targets }
    }

    pub fn insert(&mut self, name: impl Into<String>, href: impl Into<String>) {
        self.targets.entry(name.into()).or_insert_with(|| href.into());
    }

    /// `Session`, `Session.join` and `Session#join` all resolve.
    pub fn resolve(&self, target: &str) -> Option<&str> {
        let normalized = target.replace('#', ".");
        let normalized = normalized.trim_end_matches("()");
        self.targets.get(normalized).map(String::as_str)
    }
}

/// Per-package settings a renderer needs besides the entity itself.
#[derive(Debug, Clone)]
pub struct RenderContext<'a> {
    pub layout: Layout,
    /// Fence language for signatures and examples.
    pub language: &'a str,
    /// Base URL for "view source" links.
    pub source_url: Option<&'a str>,
    pub links: &'a Links,
}

/// Trait for rendering one entity into a specific output format.
pub trait Renderer {
    fn render_entity(
        &self,
        entity: &DocumentedEntity,
        ctx: &RenderContext,
    ) -> Result<String, EmitError>;
    fn file_extension(&self) -> &str;
}

/// Create a renderer for the given format name.
pub fn create_renderer(format: &str) -> Result<Box<dyn Renderer>> {
    match format {
        "mdx" => Ok(Box::new(mdx::MdxRenderer)),
        "json" => Ok(Box::new(json::JsonRenderer)),
        _ => Err(GenerateError::UnknownFormat(format.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_renderer_by_name() {
        assert_eq!(create_renderer("mdx").unwrap().file_extension(), "mdx");
        assert_eq!(create_renderer("json").unwrap().file_extension(), "json");
        let err = create_renderer("html").err().unwrap();
        assert_eq!(err.to_string(), "unknown format: html. Use mdx or json");
    }

    #[test]
    fn links_accept_member_separators() {
        let mut links = Links::default();
        links.insert("Session", "/api/session");
        links.insert("Session.join", "/api/session#join");
        assert_eq!(links.resolve("Session"), Some("/api/session"));
        assert_eq!(links.resolve("Session#join"), Some("/api/session#join"));
        assert_eq!(links.resolve("Session.join()"), Some("/api/session#join"));
        assert_eq!(links.resolve("Other"), None);
    }
}
