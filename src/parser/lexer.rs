//! JavaScript / TypeScript tokenizer.
//!
//! Only as much of the language as declaration association needs: brace
//! nesting must be exact, so string, template and regex literals are consumed
//! whole. Template and regex literals are context-sensitive and are scanned by
//! hand on top of the logos token stream.

use logos::Logos;
use std::ops::Range;

#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum TokenKind {
    /// Any `/* ... */` comment; `/** ... */` is promoted to [`TokenKind::DocComment`].
    /// An unterminated comment runs to the end of input.
    #[token("/*", block_comment)]
    BlockComment,
    DocComment,

    #[regex(r"//[^\n]*")]
    LineComment,

    #[regex(r#""([^"\\\n]|\\.)*""#)]
    #[regex(r"'([^'\\\n]|\\.)*'")]
    String,

    /// Opening backtick; the wrapper extends it to the full template literal.
    #[token("`")]
    Template,

    /// Includes `#private` names.
    #[regex(r"#?[A-Za-z_$][A-Za-z0-9_$]*")]
    Ident,

    #[regex(r"[0-9][0-9A-Za-z_.]*")]
    #[regex(r"\.[0-9][0-9A-Za-z_]*")]
    Number,

    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("<")]
    Lt,
    #[token(">")]
    Gt,
    #[token(";")]
    Semi,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("?")]
    Question,
    #[token(".")]
    Dot,
    #[token("...")]
    Ellipsis,
    #[token("=")]
    Eq,
    #[token("=>")]
    FatArrow,
    #[token("*")]
    Star,
    #[token("@")]
    At,
    #[token("|")]
    Pipe,
    #[token("&")]
    Amp,
    /// Division, or the opening of a regex literal (then extended by the wrapper).
    #[token("/")]
    Slash,
    Regex,
    #[regex(r"[-+%^!~]")]
    Op,

    /// Byte sequence no rule matched.
    Unknown,
}

fn block_comment(lex: &mut logos::Lexer<TokenKind>) {
    let rest = lex.remainder();
    let len = rest.find("*/").map_or(rest.len(), |end| end + 2);
    lex.bump(len);
}

impl TokenKind {
    pub fn is_comment(self) -> bool {
        matches!(
            self,
            TokenKind::BlockComment | TokenKind::LineComment | TokenKind::DocComment
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Range<usize>,
}

impl Token {
    pub fn text<'s>(&self, source: &'s str) -> &'s str {
        &source[self.span.clone()]
    }
}

/// Lazy token stream over a source file.
pub struct Lexer<'s> {
    source: &'s str,
    offset: usize,
    inner: logos::Lexer<'s, TokenKind>,
    prev: Option<(TokenKind, Range<usize>)>,
    /// One entry per open `(`: whether it follows `if`, `while`, `for` or `with`.
    parens: Vec<bool>,
    /// The last `)` closed a statement condition, so a `/` after it opens a regex.
    closed_condition: bool,
}

impl<'s> Lexer<'s> {
    pub fn new(source: &'s str) -> Self {
        // Skip a shebang line; `#!` is not otherwise valid syntax.
        let offset = if source.starts_with("#!") {
            source.find('\n').unwrap_or(source.len())
        } else {
            0
        };
        Self {
            source,
            offset,
            inner: TokenKind::lexer(&source[offset..]),
            prev: None,
            parens: Vec::new(),
            closed_condition: false,
        }
    }

    /// Tokens with plain comments removed; doc comments are kept.
    pub fn significant(source: &'s str) -> Vec<Token> {
        Lexer::new(source)
            .filter(|t| !matches!(t.kind, TokenKind::BlockComment | TokenKind::LineComment))
            .collect()
    }

    /// Whether a `/` at this point starts a regex rather than dividing.
    fn regex_allowed(&self) -> bool {
        let Some((kind, ref span)) = self.prev else {
            return true;
        };
        match kind {
            TokenKind::Ident => matches!(
                &self.source[span.clone()],
                "return"
                    | "typeof"
                    | "instanceof"
                    | "in"
                    | "of"
                    | "new"
                    | "delete"
                    | "void"
                    | "throw"
                    | "case"
                    | "do"
                    | "else"
                    | "yield"
                    | "await"
            ),
            // `</div>` closes a JSX element
            TokenKind::Lt
            | TokenKind::Number
            | TokenKind::String
            | TokenKind::Template
            | TokenKind::Regex
            | TokenKind::RBracket => false,
            TokenKind::RParen => self.closed_condition,
            _ => true,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        let result = self.inner.next()?;
        let local = self.inner.span();
        let base = self.offset;
        let kind = match result {
            Ok(TokenKind::BlockComment) => {
                let text = self.inner.slice();
                if text.starts_with("/**") && text != "/**/" && !text.starts_with("/***") {
                    TokenKind::DocComment
                } else {
                    TokenKind::BlockComment
                }
            }
            Ok(TokenKind::Template) => {
                let end = template_end(self.source, base + local.end);
                self.inner.bump(end - (base + local.end));
                TokenKind::Template
            }
            Ok(TokenKind::Slash) if self.regex_allowed() => {
                match regex_end(self.source, base + local.end) {
                    Some(end) => {
                        self.inner.bump(end - (base + local.end));
                        TokenKind::Regex
                    }
                    None => TokenKind::Slash,
                }
            }
            Ok(kind) => kind,
            Err(()) => TokenKind::Unknown,
        };
        let local = self.inner.span();
        let span = base + local.start..base + local.end;
        match kind {
            TokenKind::LParen => {
                let condition = self.prev.as_ref().is_some_and(|(prev, span)| {
                    *prev == TokenKind::Ident
                        && matches!(&self.source[span.clone()], "if" | "while" | "for" | "with")
                });
                self.parens.push(condition);
            }
            TokenKind::RParen => self.closed_condition = self.parens.pop().unwrap_or(false),
            _ => {}
        }
        if !kind.is_comment() {
            self.prev = Some((kind, span.clone()));
        }
        Some(Token { kind, span })
    }
}

/// `start` points just past an opening backtick; returns the index past the
/// closing one (or the end of input when unterminated).
fn template_end(src: &str, start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'`' => return i + 1,
            b'$' if bytes.get(i + 1) == Some(&b'{') => i = expression_end(src, i + 2),
            _ => i += 1,
        }
    }
    bytes.len()
}

/// `start` points just past `${`; returns the index past the matching `}`.
fn expression_end(src: &str, start: usize) -> usize {
    let bytes = src.as_bytes();
    let mut depth = 1usize;
    let mut i = start;
    while i < bytes.len() {
        match bytes[i] {
            b'{' => {
                depth += 1;
                i += 1;
            }
            b'}' => {
                depth -= 1;
                i += 1;
                if depth == 0 {
                    return i;
                }
            }
            quote @ (b'"' | b'\'') => {
                i += 1;
                while i < bytes.len() && bytes[i] != quote && bytes[i] != b'\n' {
                    i += if bytes[i] == b'\\' { 2 } else { 1 };
                }
                i += 1;
            }
            b'`' => i = template_end(src, i + 1),
            _ => i += 1,
        }
    }
    bytes.len()
}

/// `start` points just past an opening `/`; returns the index past the flags,
/// or `None` if the line ends first (then it was a division after all).
fn regex_end(src: &str, start: usize) -> Option<usize> {
    let bytes = src.as_bytes();
    let mut i = start;
    let mut in_class = false;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => return None,
            b'\\' => i += 1,
            b'[' => in_class = true,
            b']' => in_class = false,
            b'/' if !in_class => {
                i += 1;
                while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                return Some(i);
            }
            _ => {}
        }
        i += 1;
    }
    None
}

/// Byte offset to 1-based line number.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line(&self, offset: usize) -> usize {
        match self.starts.binary_search(&offset) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        Lexer::new(src).map(|t| t.kind).collect()
    }

    #[test]
    fn doc_comment_is_distinguished() {
        assert_eq!(
            kinds("/** doc */ /* plain */ /**/ // line"),
            vec![
                TokenKind::DocComment,
                TokenKind::BlockComment,
                TokenKind::BlockComment,
                TokenKind::LineComment
            ]
        );
    }

    #[test]
    fn comment_bodies_may_contain_stars_and_slashes() {
        let src = "/** a * b / c ** d */ x /* 1/2 **/ y";
        let toks: Vec<_> = Lexer::new(src).collect();
        let kinds: Vec<_> = toks.iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::DocComment,
                TokenKind::Ident,
                TokenKind::BlockComment,
                TokenKind::Ident
            ]
        );
        assert_eq!(toks[0].text(src), "/** a * b / c ** d */");
        assert_eq!(toks[2].text(src), "/* 1/2 **/");
    }

    #[test]
    fn unterminated_comment_runs_to_end_of_input() {
        let src = "a /** never closed { }";
        let toks: Vec<_> = Lexer::new(src).collect();
        assert_eq!(toks.len(), 2);
        assert_eq!(toks[1].kind, TokenKind::DocComment);
        assert_eq!(toks[1].text(src), "/** never closed { }");
    }

    #[test]
    fn regex_after_statement_condition() {
        let src = "if (x) /[{]/.test(s); (a) / b";
        let toks = kinds(src);
        assert_eq!(toks.iter().filter(|k| **k == TokenKind::Regex).count(), 1);
        assert!(!toks.contains(&TokenKind::LBrace));
        assert!(toks.contains(&TokenKind::Slash));
    }

    #[test]
    fn braces_inside_strings_are_not_tokens() {
        let toks = kinds(r#"const a = "{"; const b = '}';"#);
        assert!(!toks.contains(&TokenKind::LBrace));
        assert!(!toks.contains(&TokenKind::RBrace));
    }

    #[test]
    fn template_literal_with_nested_expression() {
        let src = "const s = `a ${ {x: `}`}.x } b`; next";
        let toks: Vec<_> = Lexer::new(src).collect();
        let template = toks.iter().find(|t| t.kind == TokenKind::Template).unwrap();
        assert_eq!(template.text(src), "`a ${ {x: `}`}.x } b`");
        assert_eq!(toks.last().unwrap().text(src), "next");
    }

    #[test]
    fn regex_literal_after_operator() {
        let src = "const re = /[{}]\\//g; a / b";
        let toks: Vec<_> = Lexer::new(src).collect();
        let re = toks.iter().find(|t| t.kind == TokenKind::Regex).unwrap();
        assert_eq!(re.text(src), "/[{}]\\//g");
        assert!(toks.iter().any(|t| t.kind == TokenKind::Slash));
        assert!(!toks.iter().any(|t| t.kind == TokenKind::LBrace));
    }

    #[test]
    fn division_after_identifier() {
        assert_eq!(
            kinds("a / b / c"),
            vec![
                TokenKind::Ident,
                TokenKind::Slash,
                TokenKind::Ident,
                TokenKind::Slash,
                TokenKind::Ident
            ]
        );
    }

    #[test]
    fn jsx_closing_tag_is_not_a_regex() {
        let src = "<p>{a}</p>; <b>{c}</b>";
        let toks = kinds(src);
        assert!(!toks.contains(&TokenKind::Regex));
        assert_eq!(toks.iter().filter(|k| **k == TokenKind::LBrace).count(), 2);
    }

    #[test]
    fn shebang_is_skipped() {
        let src = "#!/usr/bin/env node\nfoo";
        let toks: Vec<_> = Lexer::new(src).collect();
        assert_eq!(toks.len(), 1);
        assert_eq!(toks[0].text(src), "foo");
    }

    #[test]
    fn fat_arrow_and_private_names() {
        assert_eq!(
            kinds("#count => x"),
            vec![TokenKind::Ident, TokenKind::FatArrow, TokenKind::Ident]
        );
    }

    #[test]
    fn numbers_with_and_without_fractions() {
        assert_eq!(
            kinds("1. + 0.5 + .25 + 0xff"),
            vec![
                TokenKind::Number,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::Op,
                TokenKind::Number,
                TokenKind::Op,
                TokenKind::Number
            ]
        );
    }

    #[test]
    fn line_index_maps_offsets() {
        let idx = LineIndex::new("a\nbb\nccc");
        assert_eq!(idx.line(0), 1);
        assert_eq!(idx.line(2), 2);
        assert_eq!(idx.line(3), 2);
        assert_eq!(idx.line(5), 3);
    }
}
