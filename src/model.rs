//! Data model for extracted documentation: format-agnostic.

use serde::Serialize;

/// What kind of symbol an entity documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Class,
    Function,
    Hook,
    Component,
    Constant,
    Type,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            EntityKind::Class => "class",
            EntityKind::Function => "function",
            EntityKind::Hook => "hook",
            EntityKind::Component => "component",
            EntityKind::Constant => "constant",
            EntityKind::Type => "type",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberKind {
    Constructor,
    Method,
    Property,
}

/// Where a symbol was declared. `file` is relative to its package root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Location {
    pub file: String,
    pub line: usize,
}

/// One class, function, hook, component, constant or type.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentedEntity {
    pub name: String,
    pub kind: EntityKind,
    pub doc: Doc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Members in declaration order (constructor first once built).
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<Member>,
    /// Enum members, union variants or interface fields.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub variants: Vec<String>,
    pub location: Location,
}

impl DocumentedEntity {
    pub fn new(name: impl Into<String>, kind: EntityKind, location: Location) -> Self {
        Self {
            name: name.into(),
            kind,
            doc: Doc::default(),
            signature: None,
            extends: None,
            members: Vec::new(),
            variants: Vec::new(),
            location,
        }
    }

    /// Qualified name of one of this entity's members.
    pub fn member_path(&self, member: &Member) -> String {
        format!("{}.{}", self.name, member.name)
    }
}

/// A method, property or constructor of a class.
#[derive(Debug, Clone, Serialize)]
pub struct Member {
    pub name: String,
    pub kind: MemberKind,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_static: bool,
    pub doc: Doc,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    pub location: Location,
}

/// The documentation body shared by entities and members.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Doc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<Param>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub returns: Option<ReturnDoc>,
    /// `@template` names plus generics recovered from declarations.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub type_params: Vec<String>,
    /// Everything else, in source order.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

impl Doc {
    /// Split parsed tags into the structured fields.
    pub fn from_tags(description: Option<String>, tags: Vec<Tag>) -> Self {
        let mut doc = Doc {
            description,
            ..Default::default()
        };
        for tag in tags {
            match tag {
                Tag::Param(p) => doc.params.push(p),
                // A second @returns is unusual; keep it rather than drop it.
                Tag::Returns(r) if doc.returns.is_none() => doc.returns = Some(r),
                Tag::Template(t) => doc.type_params.push(t),
                other => doc.tags.push(other),
            }
        }
        doc
    }

    pub fn is_deprecated(&self) -> bool {
        self.tags.iter().any(|t| matches!(t, Tag::Deprecated(_)))
    }

    pub fn is_internal(&self) -> bool {
        self.tags.iter().any(|t| matches!(t, Tag::Internal { .. }))
    }

    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.params.is_empty()
            && self.returns.is_none()
            && self.type_params.is_empty()
            && self.tags.is_empty()
    }

    /// First sentence of the description, for index pages and frontmatter.
    pub fn summary(&self) -> Option<String> {
        let desc = self.description.as_deref()?;
        let para = desc.split("\n\n").next().unwrap_or(desc);
        let flat = para.split_whitespace().collect::<Vec<_>>().join(" ");
        let end = flat
            .find(". ")
            .map(|i| i + 1)
            .unwrap_or(flat.len());
        let summary = flat[..end].trim().to_string();
        (!summary.is_empty()).then_some(summary)
    }
}

/// Parsed `@param` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Param {
    pub name: String,
    /// Type written in the comment (`{string}`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_type: Option<String>,
    /// Type recovered from a declaration file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_type: Option<String>,
    pub optional: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Param {
    /// Resolved type wins; the comment type is the fallback.
    pub fn display_type(&self) -> Option<&str> {
        self.resolved_type
            .as_deref()
            .or(self.comment_type.as_deref())
    }
}

/// Parsed `@returns` entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReturnDoc {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ReturnDoc {
    pub fn display_type(&self) -> Option<&str> {
        self.resolved_type
            .as_deref()
            .or(self.comment_type.as_deref())
    }
}

/// `@example` body with optional `<caption>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Example {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    pub code: String,
}

/// A single comment tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "tag", content = "value", rename_all = "lowercase")]
pub enum Tag {
    Param(Param),
    Returns(ReturnDoc),
    Example(Example),
    Deprecated(Option<String>),
    Since(String),
    Throws {
        #[serde(skip_serializing_if = "Option::is_none")]
        ty: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    See(String),
    Fires(String),
    Listens(String),
    Template(String),
    /// `@internal`, `@private` or `@ignore`, with any reason the author gave.
    Internal { name: String, text: String },
    /// Any tag without a dedicated variant, kept verbatim.
    Extra { name: String, text: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_tags_splits_structured_fields() {
        let doc = Doc::from_tags(
            Some("Joins a session.".to_string()),
            vec![
                Tag::Param(Param {
                    name: "id".to_string(),
                    ..Default::default()
                }),
                Tag::Since("1.2".to_string()),
                Tag::Returns(ReturnDoc::default()),
                Tag::Template("T".to_string()),
            ],
        );
        assert_eq!(doc.params.len(), 1);
        assert!(doc.returns.is_some());
        assert_eq!(doc.type_params, vec!["T"]);
        assert_eq!(doc.tags, vec![Tag::Since("1.2".to_string())]);
    }

    #[test]
    fn second_returns_is_kept_as_tag() {
        let doc = Doc::from_tags(
            None,
            vec![Tag::Returns(ReturnDoc::default()), Tag::Returns(ReturnDoc::default())],
        );
        assert!(doc.returns.is_some());
        assert_eq!(doc.tags.len(), 1);
    }

    #[test]
    fn summary_takes_first_sentence() {
        let doc = Doc {
            description: Some("Joins a session. Then waits\nfor sync.".to_string()),
            ..Default::default()
        };
        assert_eq!(doc.summary().as_deref(), Some("Joins a session."));
    }

    #[test]
    fn resolved_type_wins_for_display() {
        let mut p = Param {
            name: "x".to_string(),
            comment_type: Some("Object".to_string()),
            ..Default::default()
        };
        assert_eq!(p.display_type(), Some("Object"));
        p.resolved_type = Some("SessionOptions".to_string());
        assert_eq!(p.display_type(), Some("SessionOptions"));
    }
}
