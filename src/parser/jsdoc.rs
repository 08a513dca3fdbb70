//! JSDoc comment parser: `/** ... */` text to description plus [`Tag`]s.
//!
//! Every tag the author wrote ends up somewhere: recognized tags get a
//! dedicated variant, anything else (or anything that fails its grammar) is
//! kept verbatim as [`Tag::Extra`].

use crate::model::*;
use regex::Regex;
use std::sync::LazyLock;

static RE_TAG_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*@([A-Za-z][A-Za-z0-9_-]*)(?:\s+|$)(.*)$").unwrap());

static RE_FENCE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*(```|~~~)").unwrap());

static RE_CAPTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^\s*<caption>(.*?)</caption>[ \t]*\n?").unwrap());

/// Result of parsing one comment.
#[derive(Debug, Default, PartialEq)]
pub struct ParsedComment {
    pub description: Option<String>,
    pub tags: Vec<Tag>,
    /// Grammar failures; each one's raw text is also kept as `Tag::Extra`.
    pub problems: Vec<String>,
}

/// Parse a raw `/** ... */` comment.
pub fn parse(raw: &str) -> ParsedComment {
    let lines = comment_lines(raw);
    let mut parsed = ParsedComment::default();

    let mut description: Vec<String> = Vec::new();
    let mut current: Option<(String, Vec<String>)> = None;
    let mut in_fence = false;

    for line in lines {
        if !in_fence {
            // Unfenced example code may itself start with `@`.
            let in_example = matches!(current, Some((ref name, _)) if name == "example");
            let tag = RE_TAG_LINE
                .captures(&line)
                .map(|caps| (caps[1].to_string(), caps[2].to_string()))
                .filter(|(name, _)| !in_example || is_known_tag(name));
            if let Some((name, rest)) = tag {
                if let Some((prev, body)) = current.take() {
                    finish_tag(&mut parsed, &prev, body);
                }
                current = Some((name, vec![rest]));
                continue;
            }
        }
        if RE_FENCE.is_match(&line) {
            in_fence = !in_fence;
        }
        match current {
            Some((_, ref mut body)) => body.push(line),
            None => description.push(line),
        }
    }
    if let Some((name, body)) = current.take() {
        finish_tag(&mut parsed, &name, body);
    }

    let desc = block_text(&description);
    if !desc.is_empty() {
        match parsed.description {
            // `@description` already supplied text; the leading prose comes first.
            Some(ref mut existing) => *existing = format!("{}\n\n{}", desc, existing),
            None => parsed.description = Some(desc),
        }
    }
    parsed
}

/// Strip `/**`, `*/` and the leading ` * ` gutter, keeping relative indentation.
fn comment_lines(raw: &str) -> Vec<String> {
    let inner = raw.trim();
    let inner = inner.strip_prefix("/**").unwrap_or(inner);
    let inner = inner.strip_suffix("*/").unwrap_or(inner);

    inner
        .lines()
        .map(|line| {
            let trimmed = line.trim_start();
            match trimmed.strip_prefix('*') {
                Some(rest) => rest.strip_prefix(' ').unwrap_or(rest).trim_end().to_string(),
                None => trimmed.trim_end().to_string(),
            }
        })
        .collect()
}

fn finish_tag(parsed: &mut ParsedComment, name: &str, body: Vec<String>) {
    let raw = block_text(&body);
    match parse_tag(name, &body) {
        Ok(Some(tag)) => parsed.tags.push(tag),
        Ok(None) => {
            // @description / @desc / @summary
            if !raw.is_empty() {
                parsed.description = Some(match parsed.description.take() {
                    Some(prev) => format!("{}\n\n{}", prev, raw),
                    None => raw,
                });
            }
        }
        Err(problem) => {
            parsed.problems.push(format!("@{}: {}", name, problem));
            parsed.tags.push(Tag::Extra {
                name: name.to_string(),
                text: raw,
            });
        }
    }
}

/// `Ok(None)` means the tag contributes to the description.
fn parse_tag(name: &str, body: &[String]) -> Result<Option<Tag>, String> {
    let text = block_text(body);
    let tag = match name {
        "param" | "arg" | "argument" => Tag::Param(parse_param(&text)?),
        "returns" | "return" => {
            let (ty, rest) = take_type(&text)?;
            Tag::Returns(ReturnDoc {
                comment_type: ty,
                resolved_type: None,
                description: non_empty(strip_dash(&rest)),
            })
        }
        "throws" | "exception" => {
            let (ty, rest) = take_type(&text)?;
            Tag::Throws {
                ty,
                description: non_empty(strip_dash(&rest)),
            }
        }
        "example" => Tag::Example(parse_example(body)?),
        "since" => Tag::Since(require(text, "missing version")?),
        "deprecated" => Tag::Deprecated(non_empty(text)),
        "see" => Tag::See(require(text, "missing reference")?),
        "fires" | "emits" => Tag::Fires(require(text, "missing event name")?),
        "listens" => Tag::Listens(require(text, "missing event name")?),
        "template" | "typeParam" | "typeparam" => {
            Tag::Template(require(text, "missing type parameter")?)
        }
        "internal" | "private" | "ignore" => Tag::Internal {
            name: name.to_string(),
            text,
        },
        "description" | "desc" | "summary" => return Ok(None),
        _ => Tag::Extra {
            name: name.to_string(),
            text,
        },
    };
    Ok(Some(tag))
}

/// Tag names that end an unfenced `@example` body.
fn is_known_tag(name: &str) -> bool {
    matches!(
        name,
        "param"
            | "arg"
            | "argument"
            | "returns"
            | "return"
            | "throws"
            | "exception"
            | "example"
            | "since"
            | "deprecated"
            | "see"
            | "fires"
            | "emits"
            | "listens"
            | "template"
            | "typeParam"
            | "typeparam"
            | "internal"
            | "private"
            | "ignore"
            | "description"
            | "desc"
            | "summary"
            | "author"
            | "version"
            | "module"
            | "category"
            | "todo"
    )
}

/// `{type} [name=default] - description`, `name description`, `{type} name.sub`.
fn parse_param(text: &str) -> Result<Param, String> {
    let (comment_type, rest) = take_type(text)?;
    let rest = rest.trim_start();
    if rest.is_empty() {
        return Err("missing parameter name".to_string());
    }

    let mut param = Param {
        comment_type,
        ..Default::default()
    };

    let after_name = if let Some(inner) = rest.strip_prefix('[') {
        let close = matching_bracket(inner).ok_or("unterminated optional parameter name")?;
        let bracketed = &inner[..close];
        param.optional = true;
        match bracketed.split_once('=') {
            Some((n, d)) => {
                param.name = n.trim().to_string();
                param.default = non_empty(d.trim().to_string());
            }
            None => param.name = bracketed.trim().to_string(),
        }
        &inner[close + 1..]
    } else {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        param.name = rest[..end].to_string();
        &rest[end..]
    };

    if param.name.is_empty() {
        return Err("missing parameter name".to_string());
    }
    // Closure-compiler style optional marker: {string=}
    if let Some(ty) = param.comment_type.as_deref() {
        if let Some(stripped) = ty.strip_suffix('=') {
            param.optional = true;
            param.comment_type = Some(stripped.to_string());
        }
    }
    param.description = non_empty(strip_dash(after_name));
    Ok(param)
}

/// Index of the `]` closing an optional-name bracket, allowing `a[].b` inside.
fn matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in s.char_indices() {
        match c {
            '[' => depth += 1,
            ']' if depth == 0 => return Some(i),
            ']' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// Split a leading `{type}` off `text`. Braces nest (`{{a: string}}`).
fn take_type(text: &str) -> Result<(Option<String>, String), String> {
    let trimmed = text.trim_start();
    let Some(inner) = trimmed.strip_prefix('{') else {
        return Ok((None, text.trim().to_string()));
    };
    let mut depth = 1usize;
    for (i, c) in inner.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    let ty = inner[..i].split_whitespace().collect::<Vec<_>>().join(" ");
                    if ty.is_empty() {
                        return Err("empty type expression".to_string());
                    }
                    return Ok((Some(ty), inner[i + 1..].trim().to_string()));
                }
            }
            _ => {}
        }
    }
    Err("unterminated type expression".to_string())
}

fn parse_example(body: &[String]) -> Result<Example, String> {
    let code = unindent(&body.join("\n"));
    let (caption, code) = match RE_CAPTION.captures(&code) {
        Some(caps) => {
            let caption = caps[1].trim().to_string();
            let rest = code[caps[0].len()..].to_string();
            (non_empty(caption), unindent(&rest))
        }
        None => (None, code),
    };
    let code = code.trim_end().to_string();
    if code.trim().is_empty() {
        return Err("empty example".to_string());
    }
    Ok(Example { caption, code })
}

fn strip_dash(text: &str) -> String {
    let t = text.trim_start();
    t.strip_prefix("- ")
        .or_else(|| t.strip_prefix('-').filter(|r| r.is_empty()))
        .unwrap_or(t)
        .trim()
        .to_string()
}

fn require(text: String, problem: &str) -> Result<String, String> {
    if text.is_empty() {
        Err(problem.to_string())
    } else {
        Ok(text)
    }
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

/// Unindent and trim surrounding blank lines.
fn block_text(lines: &[String]) -> String {
    unindent(&lines.join("\n")).trim().to_string()
}

/// Remove common leading indentation from a multi-line string.
///
/// The first line is ignored when computing the indent: it is the text that
/// followed the tag name on the same line.
pub fn unindent(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();

    // Find first non-empty line
    let Some(start) = lines.iter().position(|l| !l.trim().is_empty()) else {
        return String::new();
    };

    let min_indent = lines[start..]
        .iter()
        .skip(1)
        .chain(std::iter::once(&lines[start]).filter(|l| l.starts_with(' ')))
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start_matches(' ').len())
        .min()
        .unwrap_or(0);

    lines[start..]
        .iter()
        .map(|l| {
            let indent = l.len() - l.trim_start_matches(' ').len();
            &l[indent.min(min_indent)..]
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_and_params() {
        let parsed = parse(
            "/**\n * Join a session.\n *\n * Waits for sync.\n * @param {string} name - The session name\n * @param {Object} [options] Join options\n * @param {number} [options.timeout=5000] Timeout in ms\n */",
        );
        assert_eq!(
            parsed.description.as_deref(),
            Some("Join a session.\n\nWaits for sync.")
        );
        let params: Vec<_> = parsed
            .tags
            .iter()
            .filter_map(|t| match t {
                Tag::Param(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(params.len(), 3);
        assert_eq!(params[0].name, "name");
        assert_eq!(params[0].comment_type.as_deref(), Some("string"));
        assert_eq!(params[0].description.as_deref(), Some("The session name"));
        assert!(params[1].optional);
        assert_eq!(params[2].name, "options.timeout");
        assert_eq!(params[2].default.as_deref(), Some("5000"));
        assert!(parsed.problems.is_empty());
    }

    #[test]
    fn returns_and_throws() {
        let parsed = parse("/** @returns {Promise<Session>} the joined session\n * @throws {Error} when offline */");
        assert_eq!(
            parsed.tags[0],
            Tag::Returns(ReturnDoc {
                comment_type: Some("Promise<Session>".to_string()),
                resolved_type: None,
                description: Some("the joined session".to_string()),
            })
        );
        assert_eq!(
            parsed.tags[1],
            Tag::Throws {
                ty: Some("Error".to_string()),
                description: Some("when offline".to_string()),
            }
        );
    }

    #[test]
    fn example_keeps_indentation_and_caption() {
        let parsed = parse(
            "/**\n * @example <caption>Basic use</caption>\n * const s = await join({\n *   name: \"demo\",\n * });\n */",
        );
        assert_eq!(
            parsed.tags[0],
            Tag::Example(Example {
                caption: Some("Basic use".to_string()),
                code: "const s = await join({\n  name: \"demo\",\n});".to_string(),
            })
        );
    }

    #[test]
    fn example_on_following_lines() {
        let parsed = parse("/**\n * @example\n *   view.publish(\"tick\");\n *     nested();\n */");
        assert_eq!(
            parsed.tags[0],
            Tag::Example(Example {
                caption: None,
                code: "view.publish(\"tick\");\n  nested();".to_string(),
            })
        );
    }

    #[test]
    fn unknown_tags_are_preserved() {
        let parsed = parse("/** Thing.\n * @category Sessions\n * @beta */");
        assert_eq!(
            parsed.tags,
            vec![
                Tag::Extra {
                    name: "category".to_string(),
                    text: "Sessions".to_string()
                },
                Tag::Extra {
                    name: "beta".to_string(),
                    text: String::new()
                },
            ]
        );
    }

    #[test]
    fn malformed_param_degrades_to_extra() {
        let parsed = parse("/** Broken.\n * @param {string name oops */");
        assert_eq!(parsed.problems.len(), 1);
        assert!(parsed.problems[0].contains("unterminated type expression"));
        assert_eq!(
            parsed.tags,
            vec![Tag::Extra {
                name: "param".to_string(),
                text: "{string name oops".to_string()
            }]
        );
        assert_eq!(parsed.description.as_deref(), Some("Broken."));
    }

    #[test]
    fn param_without_name_is_a_problem() {
        let parsed = parse("/** @param {string} */");
        assert_eq!(parsed.problems, vec!["@param: missing parameter name"]);
    }

    #[test]
    fn tags_inside_fenced_description_are_not_split() {
        let parsed = parse("/**\n * Usage:\n * ```js\n * @decorator\n * class A {}\n * ```\n */");
        assert!(parsed.tags.is_empty());
        assert!(parsed.description.unwrap().contains("@decorator"));
    }

    #[test]
    fn deprecated_since_and_events() {
        let parsed = parse("/** @deprecated Use join() instead.\n * @since 1.1.0\n * @fires Session#sync\n * @listens view-join */");
        assert_eq!(parsed.tags[0], Tag::Deprecated(Some("Use join() instead.".to_string())));
        assert_eq!(parsed.tags[1], Tag::Since("1.1.0".to_string()));
        assert_eq!(parsed.tags[2], Tag::Fires("Session#sync".to_string()));
        assert_eq!(parsed.tags[3], Tag::Listens("view-join".to_string()));
    }

    #[test]
    fn bare_deprecated_and_internal() {
        let parsed = parse("/** @deprecated\n * @private */");
        assert_eq!(
            parsed.tags,
            vec![
                Tag::Deprecated(None),
                Tag::Internal {
                    name: "private".to_string(),
                    text: String::new()
                }
            ]
        );
    }

    #[test]
    fn internal_keeps_its_reason() {
        let parsed = parse("/** @private kept until v2 migration */");
        assert_eq!(
            parsed.tags,
            vec![Tag::Internal {
                name: "private".to_string(),
                text: "kept until v2 migration".to_string()
            }]
        );
    }

    #[test]
    fn unfenced_example_keeps_decorator_lines() {
        let parsed = parse(
            "/**\n * @example\n * class Store {\n *   @observable x = 1;\n * }\n * @since 2.0.0\n */",
        );
        assert_eq!(
            parsed.tags,
            vec![
                Tag::Example(Example {
                    caption: None,
                    code: "class Store {\n  @observable x = 1;\n}".to_string(),
                }),
                Tag::Since("2.0.0".to_string()),
            ]
        );
        assert!(parsed.problems.is_empty());
    }

    #[test]
    fn closure_optional_type() {
        let parsed = parse("/** @param {number=} count */");
        match &parsed.tags[0] {
            Tag::Param(p) => {
                assert!(p.optional);
                assert_eq!(p.comment_type.as_deref(), Some("number"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn description_tag_appends() {
        let parsed = parse("/** Lead.\n * @description More detail. */");
        assert_eq!(parsed.description.as_deref(), Some("Lead.\n\nMore detail."));
    }

    #[test]
    fn unindent_basic() {
        assert_eq!(unindent("  a\n  b\n  c"), "a\nb\nc");
    }

    #[test]
    fn unindent_mixed() {
        assert_eq!(unindent("  a\n    b\n  c"), "a\n  b\nc");
    }

    #[test]
    fn unindent_empty_first() {
        assert_eq!(unindent("\n  a\n  b"), "a\nb");
    }
}
