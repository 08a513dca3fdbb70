//! MDX escaping and fragment validation.
//!
//! MDX parses `<` as JSX and `{` as an expression, and a line starting with
//! `import`/`export` as ESM. Prose from comments must never reach the page
//! with any of those intact, while code spans and fenced blocks the author
//! wrote must survive verbatim.

use super::Links;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static RE_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{@(?:link|linkcode|linkplain)\s+([^}|\s]+)(?:\s*\|\s*|\s+)?([^}]*)\}").unwrap()
});

static RE_AUTOLINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(https?://[^>\s]+)>").unwrap());

static RE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}(`{3,}|~{3,})").unwrap());

static RE_QUOTE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^ {0,3}(?:> ?)+").unwrap());

static RE_COMPONENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<(/?)([A-Z][A-Za-z]*)((?:\s+[A-Za-z_][\w-]*(?:="[^"]*")?)*)\s*(/?)>"#).unwrap()
});

/// Components a fragment may use.
pub const COMPONENTS: &[&str] = &[
    "Warning",
    "Info",
    "Note",
    "Tip",
    "ParamField",
    "ResponseField",
    "CodeGroup",
    "Accordion",
    "AccordionGroup",
    "Expandable",
];

/// Escape comment prose for MDX, rewriting `{@link}` tags on the way.
pub fn prose(text: &str, links: &Links) -> String {
    let text = rewrite_links(text, links);
    let text = RE_AUTOLINK.replace_all(&text, "[$1]($1)");

    let mut out = String::with_capacity(text.len());
    let mut fence: Option<(char, usize)> = None;
    for (n, line) in text.lines().enumerate() {
        if n > 0 {
            out.push('\n');
        }
        if let Some((ch, len)) = fence {
            out.push_str(line);
            if closes_fence(line, ch, len) {
                fence = None;
            }
            continue;
        }
        if let Some(open) = opens_fence(line) {
            fence = Some(open);
            out.push_str(line);
            continue;
        }

        let (quote, rest) = match RE_QUOTE.find(line) {
            Some(m) => line.split_at(m.end()),
            None => ("", line),
        };
        out.push_str(quote);
        let body = rest.trim_start();
        if quote.is_empty() && is_esm(body) {
            // Not ESM: hide the keyword's first letter behind an entity
            out.push_str(&rest[..rest.len() - body.len()]);
            let first = body.chars().next().map(|c| c as u32).unwrap_or(0);
            out.push_str(&format!("&#{};", first));
            escape_line(&body[1..], &mut out);
        } else {
            escape_line(rest, &mut out);
        }
    }
    if let Some((ch, len)) = fence {
        out.push('\n');
        out.push_str(&ch.to_string().repeat(len));
    }
    out
}

/// Whether the first line of `text` opens a code fence.
pub fn starts_with_fence(text: &str) -> bool {
    text.lines().next().is_some_and(|l| opens_fence(l).is_some())
}

/// Indent every line after the first by `width` spaces. Fence markers lose
/// their own indentation so they stay fences inside a list item.
pub fn indent_continuation(text: &str, width: usize) -> String {
    let pad = " ".repeat(width);
    let mut out = String::with_capacity(text.len());
    let mut fence: Option<(char, usize)> = None;
    for (n, line) in text.lines().enumerate() {
        let marker = match fence {
            Some((ch, len)) => {
                let closed = closes_fence(line, ch, len);
                if closed {
                    fence = None;
                }
                closed
            }
            None => {
                fence = opens_fence(line);
                fence.is_some()
            }
        };
        if n > 0 {
            out.push('\n');
            out.push_str(&pad);
        }
        out.push_str(if marker { line.trim_start() } else { line });
    }
    out
}

/// Escape a short label (heading, list item) with no markup of its own.
pub fn text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        push_escaped(c, &mut out);
    }
    out
}

/// Inline code whose fence is one backtick longer than any run inside.
pub fn inline_code(value: &str) -> String {
    let value = value.split_whitespace().collect::<Vec<_>>().join(" ");
    let fence = "`".repeat(longest_run(&value, '`') + 1);
    let pad = if value.starts_with('`') || value.ends_with('`') {
        " "
    } else {
        ""
    };
    format!("{fence}{pad}{value}{pad}{fence}")
}

/// Fenced code block; the fence is at least three backticks and longer than
/// any backtick run in `code`.
pub fn code_block(language: &str, code: &str, title: Option<&str>) -> String {
    let fence = "`".repeat(longest_run(code, '`').max(2) + 1);
    let mut info = language.to_string();
    if let Some(title) = title {
        let title = title
            .replace('`', "")
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if !title.is_empty() {
            info.push(' ');
            info.push_str(&title);
        }
    }
    format!("{fence}{info}\n{code}\n{fence}")
}

/// JSX attribute value (inside double quotes).
pub fn attr(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace('&', "&amp;")
        .replace('"', "&quot;")
}

/// Check that a fragment renders on its own: closed fences, balanced known
/// components, no ESM lines, and no stray `{`, `}` or `<` in prose.
pub fn validate_fragment(fragment: &str) -> Result<(), String> {
    let mut lines = fragment.lines().enumerate().peekable();

    // Frontmatter is YAML, not MDX
    if lines.peek().is_some_and(|(_, l)| *l == "---") {
        lines.next();
        for (_, line) in lines.by_ref() {
            if line == "---" {
                break;
            }
        }
    }

    let mut fence: Option<(char, usize)> = None;
    let mut stack: Vec<String> = Vec::new();
    for (n, line) in lines {
        let lineno = n + 1;
        if let Some((ch, len)) = fence {
            if closes_fence(line, ch, len) {
                fence = None;
            }
            continue;
        }
        if let Some(open) = opens_fence(line) {
            fence = Some(open);
            continue;
        }
        if is_esm(line.trim_start()) {
            return Err(format!("line {}: import/export is not allowed", lineno));
        }

        let stripped = strip_code(line);
        let mut prose = String::new();
        let mut last = 0;
        for caps in RE_COMPONENT.captures_iter(&stripped) {
            let Some(whole) = caps.get(0) else {
                continue;
            };
            prose.push_str(&stripped[last..whole.start()]);
            last = whole.end();

            let name = &caps[2];
            if !COMPONENTS.contains(&name) {
                return Err(format!("line {}: unknown component <{}>", lineno, name));
            }
            if &caps[4] == "/" {
                continue;
            }
            if &caps[1] == "/" {
                match stack.pop() {
                    Some(ref open) if open == name => {}
                    Some(open) => {
                        return Err(format!("line {}: </{}> closes <{}>", lineno, name, open))
                    }
                    None => return Err(format!("line {}: </{}> was never opened", lineno, name)),
                }
            } else {
                stack.push(name.to_string());
            }
        }
        prose.push_str(&stripped[last..]);
        if let Some(c) = prose.chars().find(|c| matches!(c, '{' | '}' | '<')) {
            return Err(format!("line {}: unescaped '{}'", lineno, c));
        }
    }

    if fence.is_some() {
        return Err("unclosed code fence".to_string());
    }
    if let Some(open) = stack.pop() {
        return Err(format!("unclosed <{}>", open));
    }
    Ok(())
}

fn rewrite_links(text: &str, links: &Links) -> String {
    RE_LINK
        .replace_all(text, |caps: &Captures| {
            let target = &caps[1];
            let label = caps[2].trim();
            if target.contains("://") {
                let label = if label.is_empty() { target } else { label };
                return format!("[{}]({})", label, target);
            }
            match links.resolve(target) {
                Some(href) if label.is_empty() => format!("[{}]({})", inline_code(target), href),
                Some(href) => format!("[{}]({})", label, href),
                None if label.is_empty() => inline_code(target),
                None => label.to_string(),
            }
        })
        .into_owned()
}

fn is_esm(line: &str) -> bool {
    ["import", "export"].iter().any(|kw| {
        line.strip_prefix(kw)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with([' ', '\t', '{', '*']))
    })
}

fn push_escaped(c: char, out: &mut String) {
    match c {
        '<' => out.push_str("&lt;"),
        '>' => out.push_str("&gt;"),
        '{' => out.push_str("&#123;"),
        '}' => out.push_str("&#125;"),
        '`' => out.push_str("\\`"),
        _ => out.push(c),
    }
}

/// Escape one prose line, keeping matched code spans and backslash escapes.
fn escape_line(line: &str, out: &mut String) {
    let mut i = 0;
    while let Some(c) = line[i..].chars().next() {
        if let Some(len) = backslash_escape(&line[i..]) {
            out.push_str(&line[i..i + len]);
            i += len;
            continue;
        }
        if c == '`' {
            let run = run_length(&line[i..], '`');
            match closing_run(&line[i + run..], run) {
                Some(close) => {
                    let end = i + run + close + run;
                    out.push_str(&line[i..end]);
                    i = end;
                }
                None => {
                    out.push_str(&"\\`".repeat(run));
                    i += run;
                }
            }
            continue;
        }
        push_escaped(c, out);
        i += c.len_utf8();
    }
}

/// `line` with matched code spans and backslash escapes removed.
fn strip_code(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut i = 0;
    while let Some(c) = line[i..].chars().next() {
        if let Some(len) = backslash_escape(&line[i..]) {
            i += len;
            continue;
        }
        if c == '`' {
            let run = run_length(&line[i..], '`');
            match closing_run(&line[i + run..], run) {
                Some(close) => i += run + close + run,
                None => i += run,
            }
            continue;
        }
        out.push(c);
        i += c.len_utf8();
    }
    out
}

/// Length of a `\` + ASCII punctuation pair at the start of `s`.
fn backslash_escape(s: &str) -> Option<usize> {
    let mut chars = s.chars();
    match (chars.next(), chars.next()) {
        (Some('\\'), Some(c)) if c.is_ascii_punctuation() => Some(2),
        _ => None,
    }
}

fn run_length(s: &str, c: char) -> usize {
    s.len() - s.trim_start_matches(c).len()
}

/// Offset in `s` of a backtick run of exactly `run` characters.
fn closing_run(s: &str, run: usize) -> Option<usize> {
    let mut i = 0;
    while let Some(offset) = s[i..].find('`') {
        let start = i + offset;
        let len = run_length(&s[start..], '`');
        if len == run {
            return Some(start);
        }
        i = start + len;
    }
    None
}

fn longest_run(s: &str, c: char) -> usize {
    let mut longest = 0;
    let mut current = 0;
    for ch in s.chars() {
        if ch == c {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    longest
}

fn opens_fence(line: &str) -> Option<(char, usize)> {
    let caps = RE_FENCE.captures(line)?;
    let marker = caps.get(1)?.as_str();
    let ch = marker.chars().next()?;
    Some((ch, marker.len()))
}

fn closes_fence(line: &str, ch: char, len: usize) -> bool {
    let trimmed = line.trim();
    run_length(trimmed, ch) >= len && trimmed.chars().all(|c| c == ch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn links() -> Links {
        let mut map = BTreeMap::new();
        map.insert("Session".to_string(), "/api/client/session".to_string());
        Links::new(map)
    }

    #[test]
    fn prose_escapes_jsx_and_expressions() {
        assert_eq!(
            prose("Returns a Map<string, {id}> value", &links()),
            "Returns a Map&lt;string, &#123;id&#125;&gt; value"
        );
    }

    #[test]
    fn prose_keeps_code_spans() {
        assert_eq!(
            prose("Call `view.publish({ a: 1 })` now", &links()),
            "Call `view.publish({ a: 1 })` now"
        );
        assert_eq!(prose("Use ``a ` b`` here", &links()), "Use ``a ` b`` here");
    }

    #[test]
    fn prose_escapes_unmatched_backticks() {
        assert_eq!(prose("a stray ` tick", &links()), "a stray \\` tick");
    }

    #[test]
    fn prose_keeps_fences_and_closes_open_ones() {
        let input = "Example:\n```js\nif (a < b) { go(); }\n```\nafter <b>";
        assert_eq!(
            prose(input, &links()),
            "Example:\n```js\nif (a < b) { go(); }\n```\nafter &lt;b&gt;"
        );
        assert_eq!(prose("```\nopen {", &links()), "```\nopen {\n```");
    }

    #[test]
    fn prose_keeps_blockquote_markers() {
        assert_eq!(prose("> note: a > b", &links()), "> note: a &gt; b");
    }

    #[test]
    fn prose_neutralizes_esm_lines() {
        let out = prose("import the module first", &links());
        assert_eq!(out, "&#105;mport the module first");
        assert!(validate_fragment(&out).is_ok());
    }

    #[test]
    fn links_are_rewritten() {
        assert_eq!(
            prose("See {@link Session} and {@link Other}.", &links()),
            "See [`Session`](/api/client/session) and `Other`."
        );
        assert_eq!(
            prose("{@link https://multisynq.io|the site}", &links()),
            "[the site](https://multisynq.io)"
        );
        assert_eq!(
            prose("{@link Session the session class}", &links()),
            "[the session class](/api/client/session)"
        );
    }

    #[test]
    fn autolinks_become_markdown_links() {
        assert_eq!(
            prose("Docs at <https://multisynq.io/docs>.", &links()),
            "Docs at [https://multisynq.io/docs](https://multisynq.io/docs)."
        );
    }

    #[test]
    fn continuation_keeps_fences_at_item_indent() {
        let text = "intro\n   ```js\n  a < b\n   ```\nafter";
        assert_eq!(
            indent_continuation(text, 2),
            "intro\n  ```js\n    a < b\n  ```\n  after"
        );
        assert_eq!(indent_continuation("\n```\nx\n```", 2), "\n  ```\n  x\n  ```");
    }

    #[test]
    fn inline_code_fence_grows() {
        assert_eq!(inline_code("a"), "`a`");
        assert_eq!(inline_code("a`b"), "``a`b``");
        assert_eq!(inline_code("`x`"), "`` `x` ``");
    }

    #[test]
    fn code_block_fence_outgrows_content() {
        assert_eq!(code_block("js", "x", None), "```js\nx\n```");
        assert_eq!(
            code_block("md", "```\ninner\n```", Some("Nested fence")),
            "````md Nested fence\n```\ninner\n```\n````"
        );
    }

    #[test]
    fn attr_escapes_quotes_and_ampersands() {
        assert_eq!(attr("Map<\"a\" & b,\n  c>"), "Map<&quot;a&quot; &amp; b, c>");
    }

    #[test]
    fn validate_accepts_balanced_components() {
        let ok = "---\ntitle: \"{x}\"\n---\n\n<ParamField path=\"a\" type=\"Map<K, V>\" required>\nText\n</ParamField>\n\n<CodeGroup>\n```js A\n{ }\n```\n</CodeGroup>\n";
        assert_eq!(validate_fragment(ok), Ok(()));
    }

    #[test]
    fn validate_rejects_problems() {
        assert!(validate_fragment("<Warning>\nx\n").unwrap_err().contains("unclosed <Warning>"));
        assert!(validate_fragment("<Note>\n</Warning>")
            .unwrap_err()
            .contains("closes <Note>"));
        assert!(validate_fragment("```js\nopen").unwrap_err().contains("fence"));
        assert!(validate_fragment("export const a = 1;").is_err());
        assert!(validate_fragment("raw {expr}").unwrap_err().contains("'{'"));
        assert!(validate_fragment("<Card>x</Card>").unwrap_err().contains("unknown component"));
    }

    #[test]
    fn validate_ignores_code_spans() {
        assert_eq!(validate_fragment("Use `<Warning>` and `{x}`"), Ok(()));
    }
}
