//! File slugs, heading anchors and import component names.

use heck::{ToKebabCase, ToUpperCamelCase};
use std::collections::HashSet;

/// Kebab-case file slug for an entity name (`useSession` → `use-session`).
pub fn page_slug(name: &str) -> String {
    let kebab: String = name
        .to_kebab_case()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-')
        .collect();
    let slug = kebab
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "entity".to_string()
    } else {
        slug
    }
}

/// UpperCamelCase identifier usable as a JSX component name.
pub fn component_name(name: &str) -> String {
    let camel: String = name
        .to_upper_camel_case()
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect();
    match camel.chars().next() {
        Some(c) if c.is_ascii_alphabetic() => camel,
        _ => format!("Api{}", camel),
    }
}

/// GitHub heading anchor slug generation, which Mintlify follows:
/// - lowercase
/// - remove all chars that aren't alphanumeric, space, or hyphen
/// - replace spaces with hyphens
pub fn github_slug(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    for c in text.to_lowercase().chars() {
        if c.is_alphanumeric() || c == ' ' || c == '-' {
            slug.push(c);
        }
    }
    slug.trim().replace(' ', "-")
}

/// Hands out unique names, suffixing repeats with 2, 3, ...
#[derive(Debug)]
pub struct Allocator {
    separator: &'static str,
    taken: HashSet<String>,
}

impl Allocator {
    /// `separator` goes between a name and its counter (`-` for slugs).
    pub fn new(separator: &'static str) -> Self {
        Self {
            separator,
            taken: HashSet::new(),
        }
    }

    /// Make `name` unavailable without handing it out.
    pub fn reserve(&mut self, name: &str) {
        self.taken.insert(name.to_string());
    }

    pub fn claim(&mut self, base: String) -> String {
        if self.taken.insert(base.clone()) {
            return base;
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}{}{}", base, self.separator, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_from_names() {
        assert_eq!(page_slug("Session"), "session");
        assert_eq!(page_slug("useSession"), "use-session");
        assert_eq!(page_slug("HTTPClient"), "http-client");
        assert_eq!(page_slug("Model.View"), "model-view");
        assert_eq!(page_slug("$"), "entity");
    }

    #[test]
    fn component_names() {
        assert_eq!(component_name("useSession"), "UseSession");
        assert_eq!(component_name("join_session"), "JoinSession");
        assert_eq!(component_name("3d"), "Api3d");
    }

    #[test]
    fn slug_anchor() {
        assert_eq!(github_slug("join()"), "join");
        assert_eq!(github_slug("static create()"), "static-create");
        assert_eq!(github_slug("Session"), "session");
    }

    #[test]
    fn collisions_are_numbered_in_order() {
        let mut slugs = Allocator::new("-");
        slugs.reserve("index");
        assert_eq!(slugs.claim("session".to_string()), "session");
        assert_eq!(slugs.claim("session".to_string()), "session-2");
        assert_eq!(slugs.claim("session".to_string()), "session-3");
        assert_eq!(slugs.claim("index".to_string()), "index-2");

        let mut components = Allocator::new("");
        components.reserve("Note");
        assert_eq!(components.claim("Note".to_string()), "Note2");
    }
}
