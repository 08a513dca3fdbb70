//! Navigation merge for Mintlify's `mint.json` and `docs.json`.
//!
//! `mint.json` keeps an array of groups under `navigation`; `docs.json` nests
//! groups under `groups`, `tabs` or `anchors`. Both are walked as plain JSON
//! so unknown keys and key order survive untouched.

use crate::error::{GenerateError, Result};
use crate::output::{self, PlannedFile};
use serde_json::{json, Map, Value};
use std::collections::HashSet;
use std::path::Path;

/// Entries one package wants in the navigation.
#[derive(Debug, Clone, Default)]
pub struct NavPatch {
    pub group: String,
    /// Page paths without extension, e.g. `api-reference/client/session`.
    pub pages: Vec<String>,
    /// `(source, destination)` redirect pairs.
    pub redirects: Vec<(String, String)>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NavOutcome {
    pub pages_added: usize,
    pub redirects_added: usize,
}

impl NavOutcome {
    pub fn is_empty(&self) -> bool {
        self.pages_added == 0 && self.redirects_added == 0
    }
}

/// Read, merge and atomically rewrite the navigation document at `path`.
/// Nothing is written when the patch adds nothing.
pub fn update(path: &Path, patch: &NavPatch) -> Result<NavOutcome> {
    let text = std::fs::read_to_string(path).map_err(|e| GenerateError::NavigationRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    let mut doc: Value = serde_json::from_str(&text).map_err(|e| GenerateError::NavigationParse {
        path: path.to_path_buf(),
        source: e,
    })?;
    let outcome = merge(&mut doc, patch).map_err(|reason| GenerateError::NavigationShape {
        path: path.to_path_buf(),
        reason,
    })?;
    if outcome.is_empty() {
        tracing::debug!(path = %path.display(), "navigation already up to date");
        return Ok(outcome);
    }
    let mut contents = format!("{:#}", doc);
    contents.push('\n');
    output::write_all(&[PlannedFile::new(path, contents)])?;
    tracing::info!(
        path = %path.display(),
        pages = outcome.pages_added,
        redirects = outcome.redirects_added,
        "updated navigation"
    );
    Ok(outcome)
}

/// Merge `patch` into a parsed document. Never removes or reorders entries.
pub fn merge(doc: &mut Value, patch: &NavPatch) -> Result<NavOutcome, String> {
    let root = doc
        .as_object_mut()
        .ok_or_else(|| "top level must be an object".to_string())?;
    let mut outcome = NavOutcome::default();

    if !patch.pages.is_empty() {
        let navigation = root
            .entry("navigation")
            .or_insert_with(|| Value::Array(Vec::new()));
        if !navigation.is_array() && !navigation.is_object() {
            return Err("`navigation` must be an array or an object".to_string());
        }

        let mut present = HashSet::new();
        collect_pages(navigation, &mut present);
        let new_pages: Vec<&String> = patch
            .pages
            .iter()
            .filter(|page| present.insert((*page).clone()))
            .collect();

        if !new_pages.is_empty() {
            if find_group(navigation, &patch.group).is_none() {
                top_level_groups(navigation)?.push(json!({ "group": patch.group, "pages": [] }));
            }
            let group = find_group(navigation, &patch.group)
                .ok_or_else(|| format!("group '{}' could not be created", patch.group))?;
            let pages = group
                .entry("pages")
                .or_insert_with(|| Value::Array(Vec::new()))
                .as_array_mut()
                .ok_or_else(|| format!("`pages` of group '{}' must be an array", patch.group))?;
            outcome.pages_added = new_pages.len();
            pages.extend(new_pages.into_iter().map(|page| Value::String(page.clone())));
        }
    }

    if !patch.redirects.is_empty() {
        let redirects = root
            .entry("redirects")
            .or_insert_with(|| Value::Array(Vec::new()))
            .as_array_mut()
            .ok_or_else(|| "`redirects` must be an array".to_string())?;
        let mut sources: HashSet<String> = redirects
            .iter()
            .filter_map(|r| r.get("source").and_then(Value::as_str))
            .map(str::to_string)
            .collect();
        for (source, destination) in &patch.redirects {
            if sources.insert(source.clone()) {
                redirects.push(json!({ "source": source, "destination": destination }));
                outcome.redirects_added += 1;
            }
        }
    }

    Ok(outcome)
}

/// Every page string listed anywhere below `value`.
fn collect_pages(value: &Value, out: &mut HashSet<String>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("pages", Value::Array(items)) => {
                        for item in items {
                            match item {
                                Value::String(page) => {
                                    out.insert(page.clone());
                                }
                                nested => collect_pages(nested, out),
                            }
                        }
                    }
                    _ => collect_pages(child, out),
                }
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_pages(item, out)),
        _ => {}
    }
}

/// First object anywhere below `value` whose `group` is `name`.
fn find_group<'v>(value: &'v mut Value, name: &str) -> Option<&'v mut Map<String, Value>> {
    match value {
        Value::Object(map) => {
            if map.get("group").and_then(Value::as_str) == Some(name) {
                return Some(map);
            }
            for child in map.values_mut() {
                if let Some(found) = find_group(child, name) {
                    return Some(found);
                }
            }
            None
        }
        Value::Array(items) => items.iter_mut().find_map(|item| find_group(item, name)),
        _ => None,
    }
}

/// The list new groups are appended to.
fn top_level_groups(navigation: &mut Value) -> Result<&mut Vec<Value>, String> {
    let container = match navigation {
        Value::Array(groups) => return Ok(groups),
        Value::Object(map) => map,
        _ => return Err("`navigation` must be an array or an object".to_string()),
    };
    // docs.json without top-level groups: use the first tab or anchor
    let nested = if container.contains_key("groups") {
        None
    } else {
        ["tabs", "anchors"].into_iter().find(|key| {
            container
                .get(*key)
                .and_then(Value::as_array)
                .and_then(|items| items.first())
                .is_some_and(Value::is_object)
        })
    };
    let owner = match nested {
        Some(key) => container
            .get_mut(key)
            .and_then(Value::as_array_mut)
            .and_then(|items| items.first_mut())
            .and_then(Value::as_object_mut)
            .ok_or_else(|| format!("first entry of `{}` must be an object", key))?,
        None => container,
    };
    owner
        .entry("groups")
        .or_insert_with(|| Value::Array(Vec::new()))
        .as_array_mut()
        .ok_or_else(|| "`groups` must be an array".to_string())
}
