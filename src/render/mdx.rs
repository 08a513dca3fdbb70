//! Mintlify MDX renderer.
//!
//! Each entity becomes one fragment. In [`Layout::Page`] it is a standalone
//! page with frontmatter; in [`Layout::Fragment`] it is a snippet that starts
//! with its own heading and can be imported anywhere.

use super::escape::{self, attr, code_block, inline_code};
use crate::error::EmitError;
use crate::model::*;
use crate::render::{Layout, RenderContext, Renderer};

pub struct MdxRenderer;

impl Renderer for MdxRenderer {
    fn render_entity(
        &self,
        entity: &DocumentedEntity,
        ctx: &RenderContext,
    ) -> Result<String, EmitError> {
        let out = render_entity(entity, ctx);
        escape::validate_fragment(&out).map_err(|reason| EmitError::Malformed {
            symbol: entity.name.clone(),
            reason,
        })?;
        Ok(out)
    }

    fn file_extension(&self) -> &str {
        "mdx"
    }
}

/// Heading text for a member; also the source of its anchor.
pub fn member_heading(member: &Member) -> String {
    let name = match member.kind {
        MemberKind::Constructor => "constructor()".to_string(),
        MemberKind::Method => format!("{}()", member.name),
        MemberKind::Property => member.name.clone(),
    };
    if member.is_static {
        format!("static {}", name)
    } else {
        name
    }
}

fn render_entity(entity: &DocumentedEntity, ctx: &RenderContext) -> String {
    let mut sections: Vec<String> = Vec::new();
    let member_level = match ctx.layout {
        Layout::Page => {
            sections.push(frontmatter(&entity.name, entity.doc.summary().as_deref()));
            2
        }
        Layout::Fragment => {
            sections.push(format!("## {}", escape::text(&entity.name)));
            3
        }
    };

    sections.extend(doc_blocks(
        &entity.doc,
        entity.signature.as_deref(),
        &entity.location,
        ctx,
    ));
    if !entity.variants.is_empty() {
        sections.push(list(
            variants_label(entity),
            entity.variants.iter().map(|v| inline_code(v)),
        ));
    }

    // Declaration order, constructor first
    let mut members: Vec<&Member> = entity.members.iter().collect();
    members.sort_by_key(|m| m.kind != MemberKind::Constructor);
    for member in members {
        sections.push(format!(
            "{} {}",
            "#".repeat(member_level),
            escape::text(&member_heading(member))
        ));
        sections.extend(doc_blocks(
            &member.doc,
            member.signature.as_deref(),
            &member.location,
            ctx,
        ));
    }

    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}

fn frontmatter(title: &str, description: Option<&str>) -> String {
    let mut out = String::from("---\n");
    out.push_str(&format!("title: {}\n", yaml_string(title)));
    if let Some(description) = description {
        out.push_str(&format!("description: {}\n", yaml_string(description)));
    }
    out.push_str("---");
    out
}

/// JSON string literals are valid YAML scalars.
fn yaml_string(value: &str) -> String {
    serde_json::Value::String(value.to_string()).to_string()
}

fn variants_label(entity: &DocumentedEntity) -> &'static str {
    match entity.signature.as_deref() {
        Some(s) if s.starts_with("interface") => "Properties",
        Some(s) if s.starts_with("enum") => "Members",
        _ => "Values",
    }
}

/// Everything below the heading for one entity or member, in fixed order.
fn doc_blocks(
    doc: &Doc,
    signature: Option<&str>,
    location: &Location,
    ctx: &RenderContext,
) -> Vec<String> {
    let mut blocks = Vec::new();

    for tag in &doc.tags {
        if let Tag::Deprecated(reason) = tag {
            let text = match reason {
                Some(reason) => {
                    let reason = escape::prose(reason, ctx.links);
                    let gap = if escape::starts_with_fence(&reason) { "\n\n" } else { " " };
                    format!("**Deprecated.**{}{}", gap, reason)
                }
                None => "**Deprecated.**".to_string(),
            };
            blocks.push(format!("<Warning>\n{}\n</Warning>", text));
        }
    }
    for tag in &doc.tags {
        if let Tag::Since(version) = tag {
            blocks.push(format!(
                "<Info>\nAvailable since {}\n</Info>",
                escape::text(version)
            ));
        }
    }

    if let Some(ref description) = doc.description {
        blocks.push(escape::prose(description, ctx.links));
    }
    if let Some(signature) = signature {
        blocks.push(code_block(ctx.language, signature, None));
    }

    for param in &doc.params {
        blocks.push(param_field(param, ctx));
    }
    let extra_returns = doc.tags.iter().filter_map(|t| match t {
        Tag::Returns(r) => Some(r),
        _ => None,
    });
    for returns in doc.returns.iter().chain(extra_returns) {
        blocks.push(response_field(returns, ctx));
    }

    let throws: Vec<String> = doc
        .tags
        .iter()
        .filter_map(|t| match t {
            Tag::Throws { ty, description } => {
                let description = description.as_deref().map(|d| item_prose(d, ctx));
                match (ty.as_deref(), description) {
                    (Some(ty), Some(d)) => Some(format!("{}: {}", inline_code(ty), d)),
                    (Some(ty), None) => Some(inline_code(ty)),
                    (None, Some(d)) => Some(d),
                    (None, None) => None,
                }
            }
            _ => None,
        })
        .collect();
    if !throws.is_empty() {
        blocks.push(list("Throws", throws.into_iter()));
    }

    if let Some(examples) = examples(doc, ctx) {
        blocks.push(examples);
    }

    let see: Vec<String> = doc
        .tags
        .iter()
        .filter_map(|t| match t {
            Tag::See(text) => Some(see_item(text, ctx)),
            _ => None,
        })
        .collect();
    if !see.is_empty() {
        blocks.push(list("See also", see.into_iter()));
    }

    if let Some(events) = events(doc, ctx) {
        blocks.push(events);
    }

    if !doc.type_params.is_empty() {
        let generics: Vec<String> = doc.type_params.iter().map(|t| inline_code(t)).collect();
        blocks.push(format!("**Type parameters:** {}", generics.join(", ")));
    }

    let extras: Vec<String> = doc
        .tags
        .iter()
        .filter_map(|t| match t {
            Tag::Extra { name, text } | Tag::Internal { name, text } if text.is_empty() => {
                Some(format!("**@{}**", escape::text(name)))
            }
            Tag::Extra { name, text } | Tag::Internal { name, text } => Some(format!(
                "**@{}** {}",
                escape::text(name),
                item_prose(text, ctx)
            )),
            _ => None,
        })
        .collect();
    if !extras.is_empty() {
        let items: Vec<String> = extras.iter().map(|e| format!("- {}", e)).collect();
        blocks.push(format!(
            "<Accordion title=\"Additional tags\">\n{}\n</Accordion>",
            items.join("\n")
        ));
    }

    if let Some(base) = ctx.source_url {
        if !location.file.is_empty() {
            let href = format!(
                "{}/{}#L{}",
                base.trim_end_matches('/'),
                location.file,
                location.line
            );
            blocks.push(format!("[View source]({})", url_escape(&href)));
        }
    }

    blocks
}

fn param_field(param: &Param, ctx: &RenderContext) -> String {
    let mut open = format!("<ParamField path=\"{}\"", attr(&param.name));
    if let Some(ty) = param.display_type() {
        open.push_str(&format!(" type=\"{}\"", attr(ty)));
    }
    if !param.optional {
        open.push_str(" required");
    }
    if let Some(ref default) = param.default {
        open.push_str(&format!(" default=\"{}\"", attr(default)));
    }
    open.push('>');
    match param.description {
        Some(ref d) => format!("{}\n{}\n</ParamField>", open, escape::prose(d, ctx.links)),
        None => format!("{}\n</ParamField>", open),
    }
}

fn response_field(returns: &ReturnDoc, ctx: &RenderContext) -> String {
    let mut open = String::from("<ResponseField name=\"returns\"");
    if let Some(ty) = returns.display_type() {
        open.push_str(&format!(" type=\"{}\"", attr(ty)));
    }
    open.push('>');
    match returns.description {
        Some(ref d) => format!(
            "{}\n{}\n</ResponseField>",
            open,
            escape::prose(d, ctx.links)
        ),
        None => format!("{}\n</ResponseField>", open),
    }
}

fn examples(doc: &Doc, ctx: &RenderContext) -> Option<String> {
    let examples: Vec<&Example> = doc
        .tags
        .iter()
        .filter_map(|t| match t {
            Tag::Example(e) => Some(e),
            _ => None,
        })
        .collect();
    match examples.as_slice() {
        [] => None,
        [only] => Some(format!(
            "**Example**\n\n{}",
            code_block(ctx.language, &only.code, only.caption.as_deref())
        )),
        many => {
            let blocks: Vec<String> = many
                .iter()
                .enumerate()
                .map(|(i, e)| {
                    let title = e
                        .caption
                        .clone()
                        .unwrap_or_else(|| format!("Example {}", i + 1));
                    code_block(ctx.language, &e.code, Some(&title))
                })
                .collect();
            Some(format!(
                "**Examples**\n\n<CodeGroup>\n{}\n</CodeGroup>",
                blocks.join("\n\n")
            ))
        }
    }
}

fn events(doc: &Doc, ctx: &RenderContext) -> Option<String> {
    let mut fires = Vec::new();
    let mut listens = Vec::new();
    for tag in &doc.tags {
        match tag {
            Tag::Fires(event) => fires.push(event_item(event, ctx)),
            Tag::Listens(event) => listens.push(event_item(event, ctx)),
            _ => {}
        }
    }
    let mut parts = Vec::new();
    if !fires.is_empty() {
        parts.push(list("Fires", fires.into_iter()));
    }
    if !listens.is_empty() {
        parts.push(list("Listens to", listens.into_iter()));
    }
    (!parts.is_empty()).then(|| format!("<Note>\n{}\n</Note>", parts.join("\n\n")))
}

/// `Session#sync when the view catches up`: name as code, rest as prose.
fn event_item(text: &str, ctx: &RenderContext) -> String {
    let text = text.trim();
    match text.split_once(char::is_whitespace) {
        Some((name, rest)) => format!(
            "{}: {}",
            inline_code(name),
            item_prose(rest.trim_start_matches(['-', ' ']), ctx)
        ),
        None => inline_code(text),
    }
}

fn see_item(text: &str, ctx: &RenderContext) -> String {
    let text = text.trim();
    if let Some(href) = ctx.links.resolve(text) {
        return format!("[{}]({})", inline_code(text), href);
    }
    if (text.starts_with("http://") || text.starts_with("https://"))
        && !text.contains(char::is_whitespace)
    {
        return format!("[{}]({})", escape::text(text), url_escape(text));
    }
    item_prose(text, ctx)
}

/// Percent-encode what markdown or MDX would read as syntax in a URL.
fn url_escape(url: &str) -> String {
    let mut out = String::with_capacity(url.len());
    for c in url.chars() {
        match c {
            ' ' | '(' | ')' | '<' | '>' | '{' | '}' | '`' | '"' => {
                out.push_str(&format!("%{:02X}", c as u32))
            }
            _ => out.push(c),
        }
    }
    out
}

/// Prose that continues inside a list item.
fn item_prose(text: &str, ctx: &RenderContext) -> String {
    let mut prose = escape::prose(text, ctx.links);
    // A fence has to start its own line
    if escape::starts_with_fence(&prose) {
        prose.insert(0, '\n');
    }
    escape::indent_continuation(&prose, 2)
}

fn list(label: &str, items: impl Iterator<Item = String>) -> String {
    let mut out = format!("**{}**\n", label);
    for item in items {
        out.push_str("\n- ");
        out.push_str(&item);
    }
    out
}

/// One row of a package overview page.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub name: String,
    pub kind: EntityKind,
    pub href: String,
    pub summary: Option<String>,
    pub deprecated: bool,
}

const INDEX_SECTIONS: &[(EntityKind, &str)] = &[
    (EntityKind::Class, "Classes"),
    (EntityKind::Function, "Functions"),
    (EntityKind::Hook, "Hooks"),
    (EntityKind::Component, "Components"),
    (EntityKind::Constant, "Constants"),
    (EntityKind::Type, "Types"),
];

/// Overview page linking every entity page with its summary.
pub fn index_page(title: &str, entries: &[IndexEntry], ctx: &RenderContext) -> String {
    let mut sections = vec![frontmatter(
        title,
        Some(&format!("API reference for {}", title)),
    )];
    for (kind, heading) in INDEX_SECTIONS {
        let rows: Vec<String> = entries
            .iter()
            .filter(|e| e.kind == *kind)
            .map(|e| {
                let mut row = format!("- [{}]({})", inline_code(&e.name), e.href);
                if let Some(ref summary) = e.summary {
                    row.push_str(": ");
                    row.push_str(&item_prose(summary, ctx));
                }
                if e.deprecated {
                    row.push_str(" *(deprecated)*");
                }
                row
            })
            .collect();
        if !rows.is_empty() {
            sections.push(format!("## {}\n\n{}", heading, rows.join("\n")));
        }
    }
    let mut out = sections.join("\n\n");
    out.push('\n');
    out
}

/// Aggregating page for import mode: `(component, snippet path)` pairs.
pub fn import_page(title: &str, snippets: &[(String, String)]) -> String {
    let mut out = frontmatter(title, None);
    out.push_str("\n\n");
    for (component, path) in snippets {
        out.push_str(&format!("import {} from '{}';\n", component, path));
    }
    for (component, _) in snippets {
        out.push_str(&format!("\n<{} />\n", component));
    }
    out
}
