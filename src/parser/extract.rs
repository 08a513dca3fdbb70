//! Declaration association: pair each doc comment with the declaration that
//! follows it, then group the pairs into entities.
//!
//! Only statement positions in module scope, namespace bodies and class
//! bodies are considered. Anything inside a function body, object literal or
//! argument list is skipped wholesale, so comments there never attach.

use super::jsdoc;
use super::lexer::{Lexer, LineIndex, Token, TokenKind};
use crate::model::*;
use crate::report::{Diagnostic, Stage};
use crate::scan::SourceFile;
use std::collections::{HashMap, HashSet};

const MODIFIERS: &[&str] = &[
    "export",
    "default",
    "declare",
    "abstract",
    "async",
    "static",
    "public",
    "private",
    "protected",
    "readonly",
    "override",
    "get",
    "set",
    "accessor",
];

/// Modifiers shown as part of a signature.
const SIGNATURE_MODIFIERS: &[&str] = &["async", "static", "get", "set", "abstract", "readonly"];

const WRAPPERS: &[&str] = &["memo", "forwardRef"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclKind {
    Class,
    Function,
    /// `const`/`let`/`var`. `callable` when initialized with a function,
    /// `wrapped` when that function sits inside `memo`/`forwardRef`.
    Constant { callable: bool, wrapped: bool },
    Interface,
    TypeAlias,
    Enum,
    Constructor,
    Method,
    Accessor,
    Property,
}

impl DeclKind {
    /// Classes, interfaces and enums: reported even without a comment so
    /// their members have an owner.
    pub fn is_container(self) -> bool {
        matches!(self, DeclKind::Class | DeclKind::Interface | DeclKind::Enum)
    }

    fn member_kind(self) -> Option<MemberKind> {
        match self {
            DeclKind::Constructor => Some(MemberKind::Constructor),
            DeclKind::Method => Some(MemberKind::Method),
            DeclKind::Accessor | DeclKind::Property => Some(MemberKind::Property),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclKind,
    pub name: String,
    /// Enclosing class, interface or enum, for members.
    pub owner: Option<String>,
    /// Enclosing `namespace` path, dot-separated.
    pub namespace: Option<String>,
    pub is_static: bool,
    /// `#name` or a TypeScript `private` member.
    pub is_private: bool,
    pub signature: Option<String>,
    pub extends: Option<String>,
    pub line: usize,
}

/// A doc comment and the declaration it documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocBlock {
    /// Raw `/** ... */` text. `None` only for containers, or for every
    /// declaration with [`DocBlocks::all`].
    pub comment: Option<String>,
    pub comment_line: usize,
    pub decl: Declaration,
}

#[derive(Debug, Clone)]
enum Scope {
    /// Top level or a namespace body; namespaces carry their name.
    Module(Option<String>),
    Class(String),
    Block,
}

#[derive(Debug)]
struct Frame {
    scope: Scope,
    /// Open parens/brackets inside this brace level.
    depth: usize,
}

#[derive(Debug, Default)]
struct Modifiers {
    is_static: bool,
    is_private: bool,
    is_default: bool,
    accessor: bool,
    signature_start: Option<usize>,
}

struct Callable {
    params: String,
    wrapped: bool,
}

/// Lazy iterator of [`DocBlock`]s over one source file.
pub struct DocBlocks<'s> {
    source: &'s str,
    tokens: Vec<Token>,
    lines: LineIndex,
    pos: usize,
    frames: Vec<Frame>,
    /// Token index of the doc comment waiting for a declaration.
    pending: Option<usize>,
    /// Report undocumented declarations too.
    all: bool,
}

impl<'s> DocBlocks<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            tokens: Lexer::significant(source),
            lines: LineIndex::new(source),
            pos: 0,
            frames: vec![Frame {
                scope: Scope::Module(None),
                depth: 0,
            }],
            pending: None,
            all: false,
        }
    }

    /// Every declaration, documented or not. Used for declaration files.
    pub fn all(source: &'s str) -> Self {
        Self {
            all: true,
            ..Self::new(source)
        }
    }

    fn namespace(&self) -> Option<String> {
        let names: Vec<&str> = self
            .frames
            .iter()
            .filter_map(|f| match f.scope {
                Scope::Module(Some(ref name)) => Some(name.as_str()),
                _ => None,
            })
            .collect();
        (!names.is_empty()).then(|| names.join("."))
    }

    fn kind(&self, i: usize) -> Option<TokenKind> {
        self.tokens.get(i).map(|t| t.kind)
    }

    fn prev_kind(&self, i: usize) -> Option<TokenKind> {
        i.checked_sub(1).and_then(|p| self.kind(p))
    }

    fn text(&self, i: usize) -> &'s str {
        self.tokens
            .get(i)
            .map(|t| t.text(self.source))
            .unwrap_or("")
    }

    fn is_word(&self, i: usize, word: &str) -> bool {
        self.kind(i) == Some(TokenKind::Ident) && self.text(i) == word
    }

    fn line(&self, i: usize) -> usize {
        self.tokens
            .get(i)
            .map(|t| self.lines.line(t.span.start))
            .unwrap_or(0)
    }

    /// Token `i` starts on a later line than token `i - 1` ends.
    fn breaks_line(&self, i: usize) -> bool {
        match (i.checked_sub(1).and_then(|p| self.tokens.get(p)), self.tokens.get(i)) {
            (Some(prev), Some(tok)) => {
                self.lines.line(prev.span.end.saturating_sub(1)) < self.lines.line(tok.span.start)
            }
            _ => false,
        }
    }

    /// Source text of tokens `from..to`, whitespace collapsed.
    fn span_text(&self, from: usize, to: usize) -> String {
        if to <= from || to > self.tokens.len() {
            return String::new();
        }
        let raw = &self.source[self.tokens[from].span.start..self.tokens[to - 1].span.end];
        let flat = raw.split_whitespace().collect::<Vec<_>>().join(" ");
        flat.replace("( ", "(")
            .replace(" )", ")")
            .replace("[ ", "[")
            .replace(" ]", "]")
            .replace(",)", ")")
    }

    fn spans_lines(&self, from: usize, to: usize) -> bool {
        (from + 1..to).any(|i| self.breaks_line(i))
    }

    fn declarative(&self) -> bool {
        self.frames
            .last()
            .is_some_and(|f| f.depth == 0 && !matches!(f.scope, Scope::Block))
    }

    fn class_scope(&self) -> Option<String> {
        match self.frames.last() {
            Some(Frame {
                scope: Scope::Class(name),
                ..
            }) => Some(name.clone()),
            _ => None,
        }
    }

    fn open(&mut self, scope: Scope) {
        self.frames.push(Frame { scope, depth: 0 });
    }

    fn close(&mut self) {
        if self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn nest(&mut self, open: bool) {
        if let Some(frame) = self.frames.last_mut() {
            frame.depth = if open {
                frame.depth + 1
            } else {
                frame.depth.saturating_sub(1)
            };
        }
    }

    fn at_statement_start(&self) -> bool {
        match self.prev_kind(self.pos) {
            None => true,
            Some(TokenKind::Semi | TokenKind::LBrace | TokenKind::RBrace | TokenKind::DocComment) => {
                true
            }
            // Interface and enum members may be comma-separated
            Some(TokenKind::Comma) if self.class_scope().is_some() => true,
            Some(kind) if continues(kind) => false,
            Some(_) => self.breaks_line(self.pos),
        }
    }

    fn block(&self, comment: Option<usize>, decl: Declaration) -> DocBlock {
        DocBlock {
            comment: comment.map(|i| self.text(i).to_string()),
            comment_line: comment.map(|i| self.line(i)).unwrap_or(decl.line),
            decl,
        }
    }

    /// Skip a bracketed group starting at `pos`, counting only its own bracket kind.
    fn skip_group(&mut self) {
        let Some(open) = self.kind(self.pos) else {
            return;
        };
        let close = match open {
            TokenKind::LParen => TokenKind::RParen,
            TokenKind::LBracket => TokenKind::RBracket,
            TokenKind::LBrace => TokenKind::RBrace,
            TokenKind::Lt => TokenKind::Gt,
            _ => {
                self.pos += 1;
                return;
            }
        };
        let mut depth = 0usize;
        while let Some(kind) = self.kind(self.pos) {
            self.pos += 1;
            if kind == open {
                depth += 1;
            } else if kind == close {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return;
                }
            }
        }
    }

    /// Advance to the first token satisfying `stop`, skipping groups. Gives up
    /// (returns false) at the end of the statement or input.
    fn skip_until(&mut self, stop: impl Fn(&Self, usize) -> bool) -> bool {
        while let Some(kind) = self.kind(self.pos) {
            if stop(self, self.pos) {
                return true;
            }
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::Lt => self.skip_group(),
                TokenKind::Semi
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket
                | TokenKind::LBrace => return false,
                _ => self.pos += 1,
            }
        }
        false
    }

    /// Skip a type annotation, stopping before a body brace, `;`, `=` or the
    /// line break that ends it.
    fn skip_type(&mut self, stop_at_arrow: bool) {
        while let Some(kind) = self.kind(self.pos) {
            let prev = self.prev_kind(self.pos);
            match kind {
                TokenKind::Semi
                | TokenKind::Eq
                | TokenKind::Comma
                | TokenKind::RBrace
                | TokenKind::RParen
                | TokenKind::RBracket => return,
                TokenKind::FatArrow if stop_at_arrow => return,
                TokenKind::LBrace => {
                    // Object type literal, not a body
                    if matches!(
                        prev,
                        Some(
                            TokenKind::Colon
                                | TokenKind::Pipe
                                | TokenKind::Amp
                                | TokenKind::Lt
                                | TokenKind::FatArrow
                        )
                    ) {
                        self.skip_group();
                    } else {
                        return;
                    }
                }
                TokenKind::LParen | TokenKind::LBracket | TokenKind::Lt => self.skip_group(),
                _ => {
                    if self.breaks_line(self.pos)
                        && !prev.is_some_and(continues)
                        && !continues_line(kind)
                    {
                        return;
                    }
                    self.pos += 1;
                }
            }
        }
    }

    /// Index just past the statement starting at `from`. In type position
    /// angle brackets nest too.
    fn statement_end(&self, from: usize, types: bool) -> usize {
        let mut depth = 0usize;
        let mut i = from;
        while let Some(kind) = self.kind(i) {
            match kind {
                TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                TokenKind::Lt if types => depth += 1,
                TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                    if depth == 0 {
                        return i;
                    }
                    depth -= 1;
                }
                TokenKind::Gt if types => depth = depth.saturating_sub(1),
                TokenKind::Semi | TokenKind::Comma | TokenKind::DocComment if depth == 0 => {
                    return i
                }
                _ if depth == 0
                    && i > from
                    && self.breaks_line(i)
                    && !self.prev_kind(i).is_some_and(continues)
                    && !continues_line(kind) =>
                {
                    return i
                }
                _ => {}
            }
            i += 1;
        }
        i
    }

    /// `namespace X {`, `module "x" {`, `declare global {`: bodies stay declarative.
    fn module_block(&mut self) -> bool {
        let mut i = self.pos;
        if self.is_word(i, "export") {
            i += 1;
        }
        if self.is_word(i, "declare") {
            i += 1;
        }
        let block = if self.is_word(i, "global") && self.kind(i + 1) == Some(TokenKind::LBrace) {
            Some((i + 1, None))
        } else if (self.is_word(i, "namespace") || self.is_word(i, "module"))
            && matches!(self.kind(i + 1), Some(TokenKind::Ident | TokenKind::String))
        {
            let mut j = i + 2;
            while self.kind(j) == Some(TokenKind::Dot) && self.kind(j + 1) == Some(TokenKind::Ident) {
                j += 2;
            }
            // `declare module "x"` bodies describe the module itself, unprefixed.
            let name = (self.kind(i + 1) == Some(TokenKind::Ident)).then(|| self.span_text(i + 1, j));
            (self.kind(j) == Some(TokenKind::LBrace)).then_some((j, name))
        } else {
            None
        };
        match block {
            Some((brace, name)) => {
                self.pos = brace + 1;
                self.open(Scope::Module(name));
                true
            }
            None => false,
        }
    }

    /// Parse a declaration at `pos`; on failure `pos` is left unchanged.
    fn declaration(&mut self) -> Option<Declaration> {
        let start = self.pos;
        let decl = self.parse_declaration();
        if decl.is_none() {
            self.pos = start;
        }
        decl
    }

    fn parse_declaration(&mut self) -> Option<Declaration> {
        self.skip_decorators();
        let mods = self.skip_modifiers();
        match self.class_scope() {
            Some(owner) => self.class_member(&owner, &mods),
            None => self.module_item(&mods),
        }
    }

    fn skip_decorators(&mut self) {
        while self.kind(self.pos) == Some(TokenKind::At) && self.kind(self.pos + 1) == Some(TokenKind::Ident) {
            self.pos += 2;
            while self.kind(self.pos) == Some(TokenKind::Dot) && self.kind(self.pos + 1) == Some(TokenKind::Ident) {
                self.pos += 2;
            }
            if self.kind(self.pos) == Some(TokenKind::LParen) {
                self.skip_group();
            }
        }
    }

    /// A modifier only counts when a name follows; `get() {}` is a method named `get`.
    fn skip_modifiers(&mut self) -> Modifiers {
        let mut mods = Modifiers::default();
        while self.kind(self.pos) == Some(TokenKind::Ident)
            && MODIFIERS.contains(&self.text(self.pos))
            && matches!(
                self.kind(self.pos + 1),
                Some(
                    TokenKind::Ident
                        | TokenKind::String
                        | TokenKind::Number
                        | TokenKind::LBracket
                        | TokenKind::Star
                )
            )
        {
            let word = self.text(self.pos);
            match word {
                "static" => mods.is_static = true,
                "private" => mods.is_private = true,
                "default" => mods.is_default = true,
                "get" | "set" => mods.accessor = true,
                _ => {}
            }
            if SIGNATURE_MODIFIERS.contains(&word) && mods.signature_start.is_none() {
                mods.signature_start = Some(self.pos);
            }
            self.pos += 1;
        }
        mods
    }

    fn module_item(&mut self, mods: &Modifiers) -> Option<Declaration> {
        if self.kind(self.pos) != Some(TokenKind::Ident) {
            return None;
        }
        let sig_start = mods.signature_start.unwrap_or(self.pos);
        match self.text(self.pos) {
            "class" => self.class_declaration(None, mods.is_default),
            "function" => self.function_declaration(sig_start, mods.is_default),
            "const" | "let" | "var" => self.binding(),
            "interface" => self.interface_declaration(),
            "type" => self.type_alias(),
            "enum" => self.enum_declaration(),
            _ => None,
        }
    }

    /// At `class`. Opens the class body scope on success.
    fn class_declaration(&mut self, binding: Option<&str>, is_default: bool) -> Option<Declaration> {
        let line = self.line(self.pos);
        self.pos += 1;
        let own = match self.kind(self.pos) {
            Some(TokenKind::Ident) if !matches!(self.text(self.pos), "extends" | "implements") => {
                self.pos += 1;
                Some(self.text(self.pos - 1))
            }
            _ => None,
        };
        let name = match (binding, own) {
            (Some(b), _) => b.to_string(),
            (None, Some(own)) => own.to_string(),
            (None, None) if is_default => "default".to_string(),
            (None, None) => return None,
        };
        let generics_from = self.pos;
        if self.kind(self.pos) == Some(TokenKind::Lt) {
            self.skip_group();
        }
        let generics = self.span_text(generics_from, self.pos);

        let mut extends = None;
        if self.is_word(self.pos, "extends") {
            self.pos += 1;
            let from = self.pos;
            if !self.skip_until(|s, i| s.kind(i) == Some(TokenKind::LBrace) || s.is_word(i, "implements")) {
                return None;
            }
            extends = Some(self.span_text(from, self.pos)).filter(|e| !e.is_empty());
        }
        if self.is_word(self.pos, "implements") {
            self.pos += 1;
            if !self.skip_until(|s, i| s.kind(i) == Some(TokenKind::LBrace)) {
                return None;
            }
        }
        if self.kind(self.pos) != Some(TokenKind::LBrace) {
            return None;
        }
        self.pos += 1;
        self.open(Scope::Class(name.clone()));

        let signature = match extends {
            Some(ref base) => format!("class {}{} extends {}", name, generics, base),
            None => format!("class {}{}", name, generics),
        };
        Some(Declaration {
            signature: Some(signature),
            extends,
            ..plain(DeclKind::Class, name, line)
        })
    }

    /// At `function`.
    fn function_declaration(&mut self, sig_start: usize, is_default: bool) -> Option<Declaration> {
        let line = self.line(self.pos);
        self.pos += 1;
        if self.kind(self.pos) == Some(TokenKind::Star) {
            self.pos += 1;
        }
        let name = match self.kind(self.pos) {
            Some(TokenKind::Ident) => {
                self.pos += 1;
                self.text(self.pos - 1).to_string()
            }
            _ if is_default => "default".to_string(),
            _ => return None,
        };
        if self.kind(self.pos) == Some(TokenKind::Lt) {
            self.skip_group();
        }
        if self.kind(self.pos) != Some(TokenKind::LParen) {
            return None;
        }
        self.skip_group();
        if self.kind(self.pos) == Some(TokenKind::Colon) {
            self.pos += 1;
            self.skip_type(false);
        }
        Some(Declaration {
            signature: Some(self.span_text(sig_start, self.pos)),
            ..plain(DeclKind::Function, name, line)
        })
    }

    /// At `const`/`let`/`var`. Leaves the initializer for the main loop.
    fn binding(&mut self) -> Option<Declaration> {
        let keyword = self.pos;
        let line = self.line(keyword);
        self.pos += 1;
        if self.is_word(self.pos, "enum") {
            return self.enum_declaration();
        }
        if self.kind(self.pos) != Some(TokenKind::Ident) {
            // destructuring
            return None;
        }
        let name = self.text(self.pos).to_string();
        self.pos += 1;
        if self.kind(self.pos) == Some(TokenKind::Op) && self.text(self.pos) == "!" {
            self.pos += 1;
        }
        if self.kind(self.pos) == Some(TokenKind::Colon) {
            self.pos += 1;
            self.skip_type(false);
        }
        let head_end = self.pos;
        let constant = DeclKind::Constant {
            callable: false,
            wrapped: false,
        };
        if self.kind(self.pos) != Some(TokenKind::Eq) {
            return Some(Declaration {
                signature: Some(self.span_text(keyword, head_end)),
                ..plain(constant, name, line)
            });
        }
        self.pos += 1;
        let init = self.pos;

        if self.is_word(init, "class") {
            return self.class_declaration(Some(&name), false);
        }
        if let Some(callable) = self.callable_at(init) {
            return Some(Declaration {
                signature: Some(format!("{}{}", name, callable.params)),
                ..plain(
                    DeclKind::Constant {
                        callable: true,
                        wrapped: callable.wrapped,
                    },
                    name,
                    line,
                )
            });
        }

        let end = self.statement_end(init, false);
        let full = self.span_text(keyword, end);
        let signature = if end > init && !self.spans_lines(keyword, end) && full.len() <= 80 {
            full
        } else {
            self.span_text(keyword, head_end)
        };
        Some(Declaration {
            signature: Some(signature),
            ..plain(constant, name, line)
        })
    }

    fn callable_at(&mut self, at: usize) -> Option<Callable> {
        let saved = self.pos;
        self.pos = at;
        let found = self.callable(false);
        self.pos = saved;
        found
    }

    /// Recognize a function-valued expression at `pos`.
    fn callable(&mut self, wrapped: bool) -> Option<Callable> {
        if self.is_word(self.pos, "async") {
            self.pos += 1;
        }
        if self.is_word(self.pos, "function") {
            self.pos += 1;
            if self.kind(self.pos) == Some(TokenKind::Star) {
                self.pos += 1;
            }
            if self.kind(self.pos) == Some(TokenKind::Ident) {
                self.pos += 1;
            }
            return self.parameters(wrapped, false);
        }
        match self.kind(self.pos)? {
            TokenKind::LParen | TokenKind::Lt => self.parameters(wrapped, true),
            TokenKind::Ident if self.kind(self.pos + 1) == Some(TokenKind::FatArrow) => Some(Callable {
                params: format!("({})", self.text(self.pos)),
                wrapped,
            }),
            TokenKind::Ident => {
                // memo(...), React.forwardRef(...), possibly nested
                let mut i = self.pos;
                while self.kind(i) == Some(TokenKind::Ident) && self.kind(i + 1) == Some(TokenKind::Dot) {
                    i += 2;
                }
                if self.kind(i) == Some(TokenKind::Ident)
                    && WRAPPERS.contains(&self.text(i))
                    && self.kind(i + 1) == Some(TokenKind::LParen)
                {
                    self.pos = i + 2;
                    return self.callable(true).or(Some(Callable {
                        params: String::new(),
                        wrapped: true,
                    }));
                }
                None
            }
            _ => None,
        }
    }

    /// At `<` or `(`: generics, parameter list and return annotation.
    fn parameters(&mut self, wrapped: bool, arrow: bool) -> Option<Callable> {
        let from = self.pos;
        if self.kind(self.pos) == Some(TokenKind::Lt) {
            self.skip_group();
        }
        if self.kind(self.pos) != Some(TokenKind::LParen) {
            return None;
        }
        self.skip_group();
        if self.kind(self.pos) == Some(TokenKind::Colon) {
            self.pos += 1;
            self.skip_type(arrow);
        }
        if arrow && self.kind(self.pos) != Some(TokenKind::FatArrow) {
            return None;
        }
        Some(Callable {
            params: self.span_text(from, self.pos),
            wrapped,
        })
    }

    fn interface_declaration(&mut self) -> Option<Declaration> {
        let keyword = self.pos;
        let line = self.line(keyword);
        self.pos += 1;
        if self.kind(self.pos) != Some(TokenKind::Ident) {
            return None;
        }
        let name = self.text(self.pos).to_string();
        self.pos += 1;
        if !self.skip_until(|s, i| s.kind(i) == Some(TokenKind::LBrace)) {
            return None;
        }
        let signature = self.span_text(keyword, self.pos);
        self.pos += 1;
        self.open(Scope::Class(name.clone()));
        Some(Declaration {
            signature: Some(signature),
            ..plain(DeclKind::Interface, name, line)
        })
    }

    fn type_alias(&mut self) -> Option<Declaration> {
        let keyword = self.pos;
        let line = self.line(keyword);
        self.pos += 1;
        if self.kind(self.pos) != Some(TokenKind::Ident) {
            return None;
        }
        let name = self.text(self.pos).to_string();
        self.pos += 1;
        if self.kind(self.pos) == Some(TokenKind::Lt) {
            self.skip_group();
        }
        if self.kind(self.pos) != Some(TokenKind::Eq) {
            return None;
        }
        self.pos += 1;
        let end = self.statement_end(self.pos, true);
        Some(Declaration {
            signature: Some(self.span_text(keyword, end)),
            ..plain(DeclKind::TypeAlias, name, line)
        })
    }

    fn enum_declaration(&mut self) -> Option<Declaration> {
        let keyword = self.pos;
        let line = self.line(keyword);
        self.pos += 1;
        if self.kind(self.pos) != Some(TokenKind::Ident) || self.kind(self.pos + 1) != Some(TokenKind::LBrace) {
            return None;
        }
        let name = self.text(self.pos).to_string();
        self.pos += 1;
        let signature = self.span_text(keyword, self.pos);
        self.pos += 1;
        self.open(Scope::Class(name.clone()));
        Some(Declaration {
            signature: Some(signature),
            ..plain(DeclKind::Enum, name, line)
        })
    }

    fn class_member(&mut self, owner: &str, mods: &Modifiers) -> Option<Declaration> {
        let start = self.pos;
        let sig_start = mods.signature_start.unwrap_or(start);
        let line = self.line(start);
        let member = |kind: DeclKind, name: String, signature: String| Declaration {
            kind,
            is_private: mods.is_private || name.starts_with('#'),
            name,
            owner: Some(owner.to_string()),
            namespace: None,
            is_static: mods.is_static,
            signature: Some(signature),
            extends: None,
            line,
        };

        if self.is_word(start, "constructor") && self.kind(start + 1) == Some(TokenKind::LParen) {
            self.pos += 1;
            self.skip_group();
            let signature = self.span_text(start, self.pos);
            return Some(member(DeclKind::Constructor, "constructor".to_string(), signature));
        }

        let name = match self.kind(start)? {
            TokenKind::Ident | TokenKind::Number => {
                self.pos += 1;
                self.text(start).to_string()
            }
            TokenKind::String => {
                self.pos += 1;
                self.text(start).trim_matches(|c| c == '"' || c == '\'').to_string()
            }
            TokenKind::LBracket => {
                self.skip_group();
                self.span_text(start, self.pos)
            }
            _ => return None,
        };
        if self.kind(self.pos) == Some(TokenKind::Question)
            || (self.kind(self.pos) == Some(TokenKind::Op) && self.text(self.pos) == "!")
        {
            self.pos += 1;
        }

        match self.kind(self.pos) {
            Some(TokenKind::LParen | TokenKind::Lt) => {
                if self.kind(self.pos) == Some(TokenKind::Lt) {
                    self.skip_group();
                }
                if self.kind(self.pos) != Some(TokenKind::LParen) {
                    return None;
                }
                self.skip_group();
                if self.kind(self.pos) == Some(TokenKind::Colon) {
                    self.pos += 1;
                    self.skip_type(false);
                }
                let kind = if mods.accessor {
                    DeclKind::Accessor
                } else {
                    DeclKind::Method
                };
                let signature = self.span_text(sig_start, self.pos);
                Some(member(kind, name, signature))
            }
            Some(TokenKind::Colon | TokenKind::Eq) => {
                if self.kind(self.pos) == Some(TokenKind::Colon) {
                    self.pos += 1;
                    self.skip_type(false);
                }
                let head_end = self.pos;
                if self.kind(self.pos) == Some(TokenKind::Eq) {
                    self.pos += 1;
                    if let Some(callable) = self.callable_at(self.pos) {
                        let prefix = if mods.is_static { "static " } else { "" };
                        let signature = format!("{}{}{}", prefix, name, callable.params);
                        return Some(member(DeclKind::Method, name, signature));
                    }
                    let end = self.statement_end(self.pos, false);
                    let full = self.span_text(sig_start, end);
                    let signature = if !self.spans_lines(sig_start, end) && full.len() <= 80 {
                        full
                    } else {
                        self.span_text(sig_start, head_end)
                    };
                    return Some(member(DeclKind::Property, name, signature));
                }
                let signature = self.span_text(sig_start, head_end);
                Some(member(DeclKind::Property, name, signature))
            }
            Some(TokenKind::Semi | TokenKind::RBrace) | None => {
                let signature = self.span_text(sig_start, self.pos);
                Some(member(DeclKind::Property, name, signature))
            }
            Some(_) if self.breaks_line(self.pos) => {
                let signature = self.span_text(sig_start, self.pos);
                Some(member(DeclKind::Property, name, signature))
            }
            Some(_) => None,
        }
    }
}

impl Iterator for DocBlocks<'_> {
    type Item = DocBlock;

    fn next(&mut self) -> Option<DocBlock> {
        while let Some(kind) = self.kind(self.pos) {
            match kind {
                TokenKind::DocComment => {
                    // Nearest comment wins
                    if self.declarative() {
                        self.pending = Some(self.pos);
                    }
                    self.pos += 1;
                    continue;
                }
                TokenKind::LBrace => self.open(Scope::Block),
                TokenKind::RBrace => self.close(),
                TokenKind::LParen | TokenKind::LBracket => self.nest(true),
                TokenKind::RParen | TokenKind::RBracket => self.nest(false),
                TokenKind::Ident | TokenKind::At if self.declarative() => {
                    let start = self.pos;
                    let statement = self.at_statement_start();
                    if statement && self.module_block() {
                        self.pending = None;
                        continue;
                    }
                    let decl = if statement {
                        self.declaration()
                    } else if self.is_word(start, "class") && self.prev_kind(start) != Some(TokenKind::Dot) {
                        // `module.exports = class Session {`
                        let decl = self.class_declaration(None, false);
                        if decl.is_none() {
                            self.pos = start;
                        }
                        decl
                    } else {
                        None
                    };
                    if let Some(mut decl) = decl {
                        let comment = if statement { self.pending.take() } else { None };
                        self.pending = None;
                        if comment.is_some() || decl.kind.is_container() || self.all {
                            if decl.owner.is_none() {
                                decl.namespace = self.namespace();
                            }
                            return Some(self.block(comment, decl));
                        }
                        continue;
                    }
                }
                _ => {}
            }
            self.pending = None;
            self.pos += 1;
        }
        None
    }
}

fn plain(kind: DeclKind, name: impl Into<String>, line: usize) -> Declaration {
    Declaration {
        kind,
        name: name.into(),
        owner: None,
        namespace: None,
        is_static: false,
        is_private: false,
        signature: None,
        extends: None,
        line,
    }
}

/// A line break after this token does not end the statement.
fn continues(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Eq
            | TokenKind::Comma
            | TokenKind::Op
            | TokenKind::Dot
            | TokenKind::Colon
            | TokenKind::Question
            | TokenKind::FatArrow
            | TokenKind::Pipe
            | TokenKind::Amp
            | TokenKind::LParen
            | TokenKind::LBracket
            | TokenKind::Lt
            | TokenKind::Star
            | TokenKind::Slash
            | TokenKind::Ellipsis
            | TokenKind::At
    )
}

/// A line starting with this token continues the previous one.
fn continues_line(kind: TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Dot
            | TokenKind::Pipe
            | TokenKind::Amp
            | TokenKind::Question
            | TokenKind::Colon
            | TokenKind::FatArrow
            | TokenKind::Eq
            | TokenKind::Comma
            | TokenKind::Star
            | TokenKind::Slash
    )
}

/// Hook, component or plain function, from the name and context.
pub fn callable_kind(name: &str, jsx: bool, wrapped: bool) -> EntityKind {
    let pascal = name.chars().next().is_some_and(|c| c.is_ascii_uppercase());
    if name.starts_with("use") && name[3..].chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
        EntityKind::Hook
    } else if pascal && (jsx || wrapped) {
        EntityKind::Component
    } else {
        EntityKind::Function
    }
}

fn entity_kind(kind: DeclKind, name: &str, jsx: bool) -> EntityKind {
    match kind {
        DeclKind::Class => EntityKind::Class,
        DeclKind::Function => callable_kind(name, jsx, false),
        DeclKind::Constant {
            callable: true,
            wrapped,
        } => callable_kind(name, jsx, wrapped),
        DeclKind::Constant { .. } => EntityKind::Constant,
        DeclKind::Interface | DeclKind::TypeAlias | DeclKind::Enum => EntityKind::Type,
        // Members never reach here; they attach to their class.
        DeclKind::Constructor | DeclKind::Method | DeclKind::Accessor | DeclKind::Property => {
            EntityKind::Function
        }
    }
}

/// Entities of one file plus the problems met on the way.
#[derive(Debug, Default)]
pub struct Extraction {
    pub entities: Vec<DocumentedEntity>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract every documented entity from one source file.
pub fn extract(file: &SourceFile, source: &str, include_internal: bool) -> Extraction {
    let jsx = matches!(
        file.path.extension().and_then(|e| e.to_str()),
        Some("jsx" | "tsx")
    );
    let mut out = Extraction::default();
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut hidden: HashSet<String> = HashSet::new();

    for block in DocBlocks::new(source) {
        let decl = block.decl;
        let symbol = match decl.owner {
            Some(ref owner) => format!("{}.{}", owner, decl.name),
            None => decl.name.clone(),
        };
        let doc = match block.comment {
            Some(ref raw) => {
                let parsed = jsdoc::parse(raw);
                for problem in parsed.problems {
                    tracing::warn!(file = %file.relative, line = block.comment_line, symbol = %symbol, "{}", problem);
                    out.diagnostics.push(
                        Diagnostic::warning(Stage::Extracting, problem)
                            .in_file(&file.path)
                            .at_line(block.comment_line)
                            .for_symbol(&symbol),
                    );
                }
                Doc::from_tags(parsed.description, parsed.tags)
            }
            None => Doc::default(),
        };
        let location = Location {
            file: file.relative.clone(),
            line: decl.line,
        };
        let internal = doc.is_internal() || decl.is_private;

        match (decl.owner, decl.kind.member_kind()) {
            (Some(owner), Some(member_kind)) => {
                if hidden.contains(&owner) || (internal && !include_internal) {
                    tracing::trace!(symbol = %symbol, "skipping internal member");
                    continue;
                }
                let idx = *index.entry(owner.clone()).or_insert_with(|| {
                    out.entities.push(DocumentedEntity::new(
                        owner.clone(),
                        EntityKind::Class,
                        location.clone(),
                    ));
                    out.entities.len() - 1
                });
                let class = &mut out.entities[idx];
                // A getter/setter pair documents one property
                if decl.kind == DeclKind::Accessor && class.members.iter().any(|m| m.name == decl.name) {
                    continue;
                }
                class.members.push(Member {
                    name: decl.name,
                    kind: member_kind,
                    is_static: decl.is_static,
                    doc,
                    signature: decl.signature,
                    location,
                });
            }
            _ => {
                if internal && !include_internal {
                    tracing::trace!(symbol = %symbol, "skipping internal symbol");
                    hidden.insert(decl.name);
                    continue;
                }
                if let Some(&idx) = index.get(&decl.name) {
                    // Overload signatures: the first documented one wins.
                    let existing = &mut out.entities[idx];
                    if existing.doc.is_empty() && !doc.is_empty() {
                        existing.doc = doc;
                    }
                    continue;
                }
                let kind = entity_kind(decl.kind, &decl.name, jsx);
                let mut entity = DocumentedEntity::new(decl.name.clone(), kind, location);
                entity.doc = doc;
                entity.signature = decl.signature;
                entity.extends = decl.extends;
                index.insert(decl.name, out.entities.len());
                out.entities.push(entity);
            }
        }
    }

    out.entities.retain(|e| {
        !(matches!(e.kind, EntityKind::Class | EntityKind::Type) && e.doc.is_empty() && e.members.is_empty())
    });
    for entity in &mut out.entities {
        // Stable: constructor first, everything else in declaration order
        entity
            .members
            .sort_by_key(|m| m.kind != MemberKind::Constructor);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn blocks(src: &str) -> Vec<DocBlock> {
        DocBlocks::new(src).collect()
    }

    fn documented(src: &str) -> Vec<(String, DeclKind)> {
        blocks(src)
            .into_iter()
            .filter(|b| b.comment.is_some())
            .map(|b| (b.decl.name, b.decl.kind))
            .collect()
    }

    fn file(name: &str) -> SourceFile {
        SourceFile {
            path: PathBuf::from(name),
            relative: name.to_string(),
        }
    }

    #[test]
    fn blank_lines_and_line_comments_keep_association() {
        let src = "/** Adds. */\n\n// helper\n\nexport function add(a, b) { return a + b; }";
        let found = blocks(src);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].decl.name, "add");
        assert_eq!(found[0].decl.signature.as_deref(), Some("function add(a, b)"));
        assert_eq!(found[0].comment_line, 1);
        assert_eq!(found[0].decl.line, 5);
    }

    #[test]
    fn intervening_statement_discards_comment() {
        let src = "/** Orphan. */\nconsole.log(1);\nfunction later() {}";
        assert!(documented(src).is_empty());
    }

    #[test]
    fn nearest_comment_wins() {
        let src = "/** First. */\n/** Second. */\nfunction f() {}";
        let found = blocks(src);
        assert_eq!(found.len(), 1);
        assert!(found[0].comment.as_deref().unwrap().contains("Second"));
    }

    #[test]
    fn comments_in_function_bodies_are_ignored() {
        let src = "function outer() {\n  /** Inner. */\n  function inner() {}\n}\n";
        assert!(documented(src).is_empty());
    }

    #[test]
    fn class_members_and_modifiers() {
        let src = r#"
/** A session. */
export class Session extends EventEmitter {
  /** Current id. */
  static count = 0;

  /** Leave. */
  async leave() {
    const x = { a: 1 };
  }

  /** The id. */
  get id() { return this._id; }

  /** Handler. */
  onTick = (delta) => {};

  /** Make one. */
  constructor(options) { super(); }

  #secret() {}
}
"#;
        let found = blocks(src);
        let names: Vec<_> = found.iter().map(|b| (b.decl.name.as_str(), b.decl.kind)).collect();
        assert_eq!(
            names,
            vec![
                ("Session", DeclKind::Class),
                ("count", DeclKind::Property),
                ("leave", DeclKind::Method),
                ("id", DeclKind::Accessor),
                ("onTick", DeclKind::Method),
                ("constructor", DeclKind::Constructor),
            ]
        );
        assert_eq!(found[0].decl.extends.as_deref(), Some("EventEmitter"));
        assert!(found[1].decl.is_static);
        assert_eq!(found[1].decl.signature.as_deref(), Some("static count = 0"));
        assert_eq!(found[2].decl.signature.as_deref(), Some("async leave()"));
        assert_eq!(found[4].decl.signature.as_deref(), Some("onTick(delta)"));
        assert!(found.iter().skip(1).all(|b| b.decl.owner.as_deref() == Some("Session")));
    }

    #[test]
    fn undocumented_class_is_still_reported() {
        let src = "class Plain {\n  /** Go. */\n  go() {}\n}";
        let found = blocks(src);
        assert_eq!(found.len(), 2);
        assert!(found[0].comment.is_none());
        assert_eq!(found[1].decl.owner.as_deref(), Some("Plain"));
    }

    #[test]
    fn bindings_are_classified() {
        let src = r#"
/** Arrow. */
export const useSession = (id) => {};
/** Wrapped. */
export const Panel = React.memo(function Panel(props) { return null; });
/** Limit. */
export const MAX_PEERS = 8;
/** Plain function expression. */
const helper = async function () {};
/** Class expression. */
const Model = class extends Base {};
"#;
        let found = documented(src);
        assert_eq!(
            found,
            vec![
                (
                    "useSession".to_string(),
                    DeclKind::Constant {
                        callable: true,
                        wrapped: false
                    }
                ),
                (
                    "Panel".to_string(),
                    DeclKind::Constant {
                        callable: true,
                        wrapped: true
                    }
                ),
                (
                    "MAX_PEERS".to_string(),
                    DeclKind::Constant {
                        callable: false,
                        wrapped: false
                    }
                ),
                (
                    "helper".to_string(),
                    DeclKind::Constant {
                        callable: true,
                        wrapped: false
                    }
                ),
                ("Model".to_string(), DeclKind::Class),
            ]
        );
    }

    #[test]
    fn constant_signature_includes_short_initializer() {
        let found = blocks("/** Limit. */\nexport const MAX_PEERS = 8;");
        assert_eq!(found[0].decl.signature.as_deref(), Some("const MAX_PEERS = 8"));
    }

    #[test]
    fn typescript_declarations() {
        let src = r#"
/** Options. */
export interface JoinOptions<T> extends Base { name: string }
/** Status. */
export type Status = "open" | "closed";
/** Colors. */
export enum Color { Red, Green }
/** Typed. */
export function join<T>(opts: JoinOptions<T>): Promise<Session<T>> { return x; }
"#;
        let found = blocks(src);
        let kinds: Vec<_> = found.iter().map(|b| b.decl.kind).collect();
        assert_eq!(
            kinds,
            vec![DeclKind::Interface, DeclKind::TypeAlias, DeclKind::Enum, DeclKind::Function]
        );
        assert_eq!(
            found[1].decl.signature.as_deref(),
            Some("type Status = \"open\" | \"closed\"")
        );
        assert_eq!(
            found[3].decl.signature.as_deref(),
            Some("function join<T>(opts: JoinOptions<T>): Promise<Session<T>>")
        );
    }

    #[test]
    fn decorators_and_default_exports() {
        let src = "/** Widget. */\n@Component({ selector: 'x' })\nexport default class {\n}\n";
        let found = blocks(src);
        assert_eq!(found[0].decl.name, "default");
        assert!(found[0].comment.is_some());
    }

    #[test]
    fn namespace_bodies_stay_declarative() {
        let src = "declare namespace Multisynq {\n  /** Join. */\n  function join(): void;\n}\n";
        assert_eq!(documented(src), vec![("join".to_string(), DeclKind::Function)]);
    }

    #[test]
    fn commonjs_class_assignment() {
        let src = "module.exports = class Session {\n  /** Go. */\n  go() {}\n};";
        let found = blocks(src);
        assert_eq!(found[0].decl.name, "Session");
        assert_eq!(found[1].decl.owner.as_deref(), Some("Session"));
    }

    #[test]
    fn extract_orders_constructor_first() {
        let src = r#"
/** A view. */
class View {
  /** Zed. */
  zed() {}
  /** Alpha. */
  alpha() {}
  /** Build it. */
  constructor() {}
}
"#;
        let out = extract(&file("view.js"), src, false);
        assert_eq!(out.entities.len(), 1);
        let names: Vec<_> = out.entities[0].members.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["constructor", "zed", "alpha"]);
    }

    #[test]
    fn extract_refines_callable_kinds() {
        let src = "/** Hook. */\nexport function useView() {}\n/** Card. */\nexport function Card(props) {}\n/** Util. */\nexport function Format() {}\n";
        let out = extract(&file("card.tsx"), src, false);
        let kinds: Vec<_> = out.entities.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntityKind::Hook, EntityKind::Component, EntityKind::Component]
        );

        let out = extract(&file("util.js"), src, false);
        assert_eq!(out.entities[2].kind, EntityKind::Function);
    }

    #[test]
    fn extract_filters_internal() {
        let src = "/** @internal */\nclass Hidden {\n  /** M. */\n  m() {}\n}\n/** Shown. */\nclass Shown {\n  /** @private */\n  secret() {}\n  /** Public. */\n  open() {}\n}\n";
        let out = extract(&file("a.js"), src, false);
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].name, "Shown");
        assert_eq!(out.entities[0].members.len(), 1);

        let all = extract(&file("a.js"), src, true);
        assert_eq!(all.entities.len(), 2);
        assert_eq!(all.entities[1].members.len(), 2);
    }

    #[test]
    fn extract_documents_a_single_line_comment_block() {
        let src = "/** Adds. */\nexport function add(a, b) { return a + b; }";
        let out = extract(&file("add.js"), src, true);
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.entities[0].name, "add");
        assert_eq!(out.entities[0].doc.description.as_deref(), Some("Adds."));
    }

    #[test]
    fn extract_drops_undocumented_empty_classes() {
        let out = extract(&file("a.js"), "class Bare {}\nclass AlsoBare { m() {} }", false);
        assert!(out.entities.is_empty());
    }

    #[test]
    fn extract_records_tag_problems() {
        let src = "/**\n * Join.\n * @param {string name\n */\nfunction join(name) {}";
        let out = extract(&file("join.js"), src, false);
        assert_eq!(out.entities.len(), 1);
        assert_eq!(out.diagnostics.len(), 1);
        let d = &out.diagnostics[0];
        assert_eq!(d.line, Some(1));
        assert_eq!(d.symbol.as_deref(), Some("join"));
        assert!(matches!(out.entities[0].doc.tags[0], Tag::Extra { .. }));
    }
}
