//! Declaration-file resolver: `.d.ts` text to a [`TypeIndex`].
//!
//! Declarations are found with the same association machinery as sources
//! ([`DocBlocks::all`]); their signature text is then split into generics,
//! parameters and return types.

use super::extract::{DeclKind, DocBlocks};
use super::jsdoc;
use crate::model::{Doc, Location};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    Class,
    Function,
    Constructor,
    Method,
    Property,
    Interface,
    TypeAlias,
    Enum,
    Constant,
}

impl SymbolKind {
    fn from_decl(kind: DeclKind) -> Self {
        match kind {
            DeclKind::Class => SymbolKind::Class,
            DeclKind::Function => SymbolKind::Function,
            DeclKind::Constant { .. } => SymbolKind::Constant,
            DeclKind::Interface => SymbolKind::Interface,
            DeclKind::TypeAlias => SymbolKind::TypeAlias,
            DeclKind::Enum => SymbolKind::Enum,
            DeclKind::Constructor => SymbolKind::Constructor,
            DeclKind::Method => SymbolKind::Method,
            DeclKind::Accessor | DeclKind::Property => SymbolKind::Property,
        }
    }

    /// Interfaces, type aliases and enums: rendered as `Type` entities.
    pub fn is_type(self) -> bool {
        matches!(
            self,
            SymbolKind::Interface | SymbolKind::TypeAlias | SymbolKind::Enum
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedParam {
    pub name: String,
    pub ty: Option<String>,
    pub optional: bool,
}

#[derive(Debug, Clone)]
pub struct ResolvedSymbol {
    pub kind: SymbolKind,
    pub generics: Vec<String>,
    pub params: Vec<ResolvedParam>,
    pub returns: Option<String>,
    /// Declared type of a property or constant.
    pub ty: Option<String>,
    /// Union members, enum members or interface fields.
    pub variants: Vec<String>,
    pub signature: Option<String>,
    pub doc: Doc,
    pub location: Location,
}

/// Qualified symbol name to resolved declaration.
#[derive(Debug, Default)]
pub struct TypeIndex {
    symbols: BTreeMap<String, ResolvedSymbol>,
    /// Top-level names in declaration order.
    order: Vec<String>,
    /// Unqualified name to qualified name; `None` when ambiguous.
    short: HashMap<String, Option<String>>,
}

impl TypeIndex {
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Look up by qualified name, falling back to an unambiguous short name.
    pub fn get(&self, name: &str) -> Option<&ResolvedSymbol> {
        self.symbols.get(name).or_else(|| match self.short.get(name) {
            Some(Some(qualified)) => self.symbols.get(qualified),
            _ => None,
        })
    }

    pub fn member(&self, owner: &str, member: &str) -> Option<&ResolvedSymbol> {
        let qualified = self.qualify(owner);
        self.symbols.get(&format!("{}.{}", qualified, member))
    }

    /// Top-level symbols in declaration order.
    pub fn top_level(&self) -> impl Iterator<Item = (&str, &ResolvedSymbol)> {
        self.order
            .iter()
            .filter_map(|name| self.symbols.get(name).map(|s| (name.as_str(), s)))
    }

    /// Add another file's symbols; names already present keep their first definition.
    pub fn extend(&mut self, other: TypeIndex) {
        let TypeIndex {
            mut symbols, order, ..
        } = other;
        let top: Vec<(String, ResolvedSymbol)> = order
            .into_iter()
            .filter_map(|name| symbols.remove(&name).map(|s| (name, s)))
            .collect();
        for (name, symbol) in top {
            self.insert(name, symbol, true);
        }
        for (name, symbol) in symbols {
            self.insert(name, symbol, false);
        }
    }

    fn qualify(&self, name: &str) -> String {
        if self.symbols.contains_key(name) {
            return name.to_string();
        }
        match self.short.get(name) {
            Some(Some(qualified)) => qualified.clone(),
            _ => name.to_string(),
        }
    }

    fn insert(&mut self, name: String, symbol: ResolvedSymbol, top_level: bool) {
        if self.symbols.contains_key(&name) {
            // First overload wins
            return;
        }
        if top_level {
            if let Some((_, short)) = name.rsplit_once('.') {
                self.short
                    .entry(short.to_string())
                    .and_modify(|q| *q = None)
                    .or_insert_with(|| Some(name.clone()));
            }
            self.order.push(name.clone());
        }
        self.symbols.insert(name, symbol);
    }
}

/// Resolve one declaration file. `file` is its package-relative path.
pub fn resolve(source: &str, file: &str) -> TypeIndex {
    let mut index = TypeIndex::default();
    // Container short name -> qualified name, for members.
    let mut owners: HashMap<String, String> = HashMap::new();

    for block in DocBlocks::all(source) {
        let decl = block.decl;
        let doc = block
            .comment
            .as_deref()
            .map(|raw| {
                let parsed = jsdoc::parse(raw);
                Doc::from_tags(parsed.description, parsed.tags)
            })
            .unwrap_or_default();
        let signature = decl.signature.clone().unwrap_or_default();
        let mut symbol = build_symbol(decl.kind, &decl.name, &signature, doc);
        symbol.location = Location {
            file: file.to_string(),
            line: decl.line,
        };

        match decl.owner {
            Some(ref owner) => {
                let owner = owners.get(owner).cloned().unwrap_or_else(|| owner.clone());
                if let Some(parent) = index.symbols.get_mut(&owner) {
                    match parent.kind {
                        SymbolKind::Interface => parent.variants.push(signature.clone()),
                        SymbolKind::Enum => parent.variants.push(signature.clone()),
                        _ => {}
                    }
                }
                index.insert(format!("{}.{}", owner, decl.name), symbol, false);
            }
            None => {
                let qualified = match decl.namespace {
                    Some(ref ns) => format!("{}.{}", ns, decl.name),
                    None => decl.name.clone(),
                };
                if decl.kind.is_container() {
                    owners.insert(decl.name.clone(), qualified.clone());
                }
                index.insert(qualified, symbol, true);
            }
        }
    }
    tracing::trace!(file, symbols = index.len(), "resolved declarations");
    index
}

fn build_symbol(kind: DeclKind, name: &str, signature: &str, doc: Doc) -> ResolvedSymbol {
    let mut symbol = ResolvedSymbol {
        kind: SymbolKind::from_decl(kind),
        generics: generics_after(signature, name),
        params: Vec::new(),
        returns: None,
        ty: None,
        variants: Vec::new(),
        signature: (!signature.is_empty()).then(|| signature.to_string()),
        doc,
        location: Location::default(),
    };
    match kind {
        DeclKind::Function | DeclKind::Method | DeclKind::Constructor => {
            if let Some((params, returns)) = parse_callable(signature) {
                symbol.params = params;
                symbol.returns = returns;
            }
        }
        DeclKind::Accessor => {
            symbol.ty = parse_callable(signature).and_then(|(_, returns)| returns);
        }
        DeclKind::Constant { .. } | DeclKind::Property => {
            symbol.ty = annotation(signature);
            // `declare const useThing: (id: string) => Thing`
            if let Some(ty) = symbol.ty.as_deref().filter(|t| t.starts_with('(')) {
                if let Some((params, returns)) = parse_callable(ty) {
                    symbol.params = params;
                    symbol.returns = returns;
                }
            }
        }
        DeclKind::TypeAlias => {
            if let Some(eq) = find_top(signature, '=') {
                let parts: Vec<String> = split_top(&signature[eq + 1..], '|')
                    .into_iter()
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(str::to_string)
                    .collect();
                if parts.len() > 1 {
                    symbol.variants = parts;
                }
            }
        }
        DeclKind::Class | DeclKind::Interface | DeclKind::Enum => {}
    }
    symbol
}

/// Positions of characters at bracket depth zero (outside string literals).
/// Openers and closers of depth-one groups are included; `=>` is not.
fn top_level(s: &str) -> Vec<(usize, char)> {
    let mut out: Vec<(usize, char)> = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut prev = '\0';
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            prev = c;
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' | '<' => {
                if depth == 0 {
                    out.push((i, c));
                }
                depth += 1;
            }
            '>' if prev == '=' => {
                if i > 0 && out.last() == Some(&(i - 1, '=')) {
                    out.pop();
                }
            }
            ')' | ']' | '}' | '>' => {
                depth -= 1;
                if depth == 0 {
                    out.push((i, c));
                }
            }
            _ if depth == 0 => out.push((i, c)),
            _ => {}
        }
        prev = c;
    }
    out
}

fn find_top(s: &str, target: char) -> Option<usize> {
    top_level(s)
        .into_iter()
        .find(|&(_, c)| c == target)
        .map(|(i, _)| i)
}

fn split_top(s: &str, sep: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    for (i, c) in top_level(s) {
        if c == sep {
            parts.push(&s[start..i]);
            start = i + c.len_utf8();
        }
    }
    parts.push(&s[start..]);
    parts
}

/// `<T, U extends X>` directly after `name`.
fn generics_after(signature: &str, name: &str) -> Vec<String> {
    let Some(rest) = declaration_head(signature, name) else {
        return Vec::new();
    };
    if !rest.starts_with('<') {
        return Vec::new();
    }
    let marks = top_level(rest);
    match marks.iter().find(|&&(_, c)| c == '>') {
        Some(&(close, _)) => split_top(&rest[1..close], ',')
            .into_iter()
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string)
            .collect(),
        None => Vec::new(),
    }
}

/// Text right after the declared `name`, which must appear as a whole word
/// before any `:`, `=` or `(` of the signature.
fn declaration_head<'s>(signature: &'s str, name: &str) -> Option<&'s str> {
    let is_word = |c: char| c.is_alphanumeric() || c == '_' || c == '$' || c == '#';
    let mut from = 0;
    while let Some(found) = signature[from..].find(name) {
        let at = from + found;
        let end = at + name.len();
        if signature[..at].contains([':', '=', '(']) {
            return None;
        }
        let before = signature[..at].chars().next_back();
        let after = signature[end..].chars().next();
        if !before.is_some_and(is_word) && !after.is_some_and(is_word) {
            return Some(&signature[end..]);
        }
        from = end;
    }
    None
}

/// Parameters and return type of `name(a: A, b?: B): R` or `(a: A) => R`.
fn parse_callable(signature: &str) -> Option<(Vec<ResolvedParam>, Option<String>)> {
    let marks = top_level(signature);
    let open = marks.iter().position(|&(_, c)| c == '(')?;
    let open_at = marks[open].0;
    let close_at = marks[open..].iter().find(|&&(_, c)| c == ')')?.0;

    let params = split_top(&signature[open_at + 1..close_at], ',')
        .into_iter()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(parse_param)
        .collect();

    let rest = signature[close_at + 1..].trim();
    let returns = rest
        .strip_prefix("=>")
        .or_else(|| rest.strip_prefix(':'))
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    Some((params, returns))
}

fn parse_param(text: &str) -> ResolvedParam {
    let mut text = text;
    for modifier in ["public ", "private ", "protected ", "readonly ", "override "] {
        text = text.strip_prefix(modifier).unwrap_or(text).trim_start();
    }
    let marks = top_level(text);
    let colon = marks.iter().find(|&&(_, c)| c == ':').map(|&(i, _)| i);
    let eq = marks.iter().find(|&&(_, c)| c == '=').map(|&(i, _)| i);
    let name_end = [colon, eq].into_iter().flatten().min().unwrap_or(text.len());

    let mut name = text[..name_end].trim();
    let mut optional = eq.is_some();
    if let Some(stripped) = name.strip_suffix('?') {
        name = stripped.trim_end();
        optional = true;
    }
    let ty = colon
        .map(|c| {
            let end = eq.filter(|&e| e > c).unwrap_or(text.len());
            text[c + 1..end].trim().to_string()
        })
        .filter(|t| !t.is_empty());
    ResolvedParam {
        name: name.to_string(),
        ty,
        optional,
    }
}

/// Type after the first top-level `:` of a property or constant signature.
fn annotation(signature: &str) -> Option<String> {
    let colon = find_top(signature, ':')?;
    let rest = &signature[colon + 1..];
    let end = find_top(rest, '=').unwrap_or(rest.len());
    let ty = rest[..end].trim();
    (!ty.is_empty()).then(|| ty.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DTS: &str = r#"
/** Options for joining. */
export interface JoinOptions {
  /** Session name. */
  name: string;
  timeout?: number;
}

export type Status = "open" | "closed" | "error";

export enum Color { Red = "red", Green = "green" }

export declare class Session<T = unknown> extends EventEmitter {
  constructor(options: JoinOptions);
  join(name: string, options?: JoinOptions): Promise<Session<T>>;
  join(name: string): Promise<Session<T>>;
  readonly id: string;
  get size(): number;
}

export declare function useSession<T>(id: string, { strict }: { strict: boolean }): Session<T>;
export declare const useView: (selector: (v: View) => number) => number;

declare namespace Multisynq {
  function version(): string;
}
"#;

    #[test]
    fn resolves_functions_with_generics() {
        let index = resolve(DTS, "index.d.ts");
        let f = index.get("useSession").unwrap();
        assert_eq!(f.kind, SymbolKind::Function);
        assert_eq!(f.generics, vec!["T"]);
        assert_eq!(f.params.len(), 2);
        assert_eq!(f.params[0].ty.as_deref(), Some("string"));
        assert_eq!(f.params[1].name, "{ strict }");
        assert_eq!(f.returns.as_deref(), Some("Session<T>"));
    }

    #[test]
    fn first_overload_wins() {
        let index = resolve(DTS, "index.d.ts");
        let join = index.member("Session", "join").unwrap();
        assert_eq!(join.params.len(), 2);
        assert!(join.params[1].optional);
        assert_eq!(join.params[1].name, "options");
        assert_eq!(join.returns.as_deref(), Some("Promise<Session<T>>"));
    }

    #[test]
    fn class_members_and_generics() {
        let index = resolve(DTS, "index.d.ts");
        let class = index.get("Session").unwrap();
        assert_eq!(class.generics, vec!["T = unknown"]);
        let ctor = index.member("Session", "constructor").unwrap();
        assert_eq!(ctor.params[0].ty.as_deref(), Some("JoinOptions"));
        assert_eq!(
            index.member("Session", "id").unwrap().ty.as_deref(),
            Some("string")
        );
        assert_eq!(
            index.member("Session", "size").unwrap().ty.as_deref(),
            Some("number")
        );
    }

    #[test]
    fn generics_come_from_the_declared_name_only() {
        let src = "export declare class Box<T> {\n  y: Array<string>;\n  map<U>(f: (t: T) => U): Box<U>;\n  by: Map<string, T>;\n}\n";
        let index = resolve(src, "box.d.ts");
        assert_eq!(index.get("Box").unwrap().generics, vec!["T"]);
        assert!(index.member("Box", "y").unwrap().generics.is_empty());
        assert!(index.member("Box", "by").unwrap().generics.is_empty());
        assert_eq!(index.member("Box", "map").unwrap().generics, vec!["U"]);
    }

    #[test]
    fn types_collect_variants() {
        let index = resolve(DTS, "index.d.ts");
        let status = index.get("Status").unwrap();
        assert_eq!(status.kind, SymbolKind::TypeAlias);
        assert_eq!(status.variants, vec!["\"open\"", "\"closed\"", "\"error\""]);

        let opts = index.get("JoinOptions").unwrap();
        assert_eq!(opts.doc.description.as_deref(), Some("Options for joining."));
        assert_eq!(opts.variants, vec!["name: string", "timeout?: number"]);

        let color = index.get("Color").unwrap();
        assert_eq!(color.variants, vec!["Red = \"red\"", "Green = \"green\""]);
    }

    #[test]
    fn arrow_typed_constant_is_callable() {
        let index = resolve(DTS, "index.d.ts");
        let view = index.get("useView").unwrap();
        assert_eq!(view.params.len(), 1);
        assert_eq!(view.params[0].ty.as_deref(), Some("(v: View) => number"));
        assert_eq!(view.returns.as_deref(), Some("number"));
    }

    #[test]
    fn namespaces_prefix_names() {
        let index = resolve(DTS, "index.d.ts");
        assert!(index.get("Multisynq.version").is_some());
        assert_eq!(
            index.get("version").unwrap().returns.as_deref(),
            Some("string")
        );
    }

    #[test]
    fn top_level_keeps_declaration_order() {
        let index = resolve(DTS, "index.d.ts");
        let names: Vec<_> = index.top_level().map(|(n, _)| n).collect();
        assert_eq!(
            names,
            vec![
                "JoinOptions",
                "Status",
                "Color",
                "Session",
                "useSession",
                "useView",
                "Multisynq.version"
            ]
        );
    }

    #[test]
    fn extend_keeps_first_definition() {
        let mut index = resolve("export declare function f(a: string): void;", "a.d.ts");
        index.extend(resolve("export declare function f(a: number): void;", "b.d.ts"));
        assert_eq!(index.get("f").unwrap().params[0].ty.as_deref(), Some("string"));
        assert_eq!(index.get("f").unwrap().location.file, "a.d.ts");
    }

    #[test]
    fn split_respects_nesting() {
        assert_eq!(
            split_top("a: Map<K, V>, b: (x, y) => void", ','),
            vec!["a: Map<K, V>", " b: (x, y) => void"]
        );
    }
}
