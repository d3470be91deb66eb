//! Span-tracking S-expression trees for KiCad schematic and symbol files.
//!
//! Every parsed node remembers the byte range it came from, which lets
//! [`lossless`] reproduce untouched regions of a file exactly while
//! [`formatter`] lays out nodes built in memory.

pub mod formatter;
pub mod kicad;
pub mod lossless;

use std::fmt;

/// First direct child `(name ...)` of `items`, returned as its item slice.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    items
        .iter()
        .filter_map(Sexpr::as_list)
        .find(|child| child.first().and_then(Sexpr::as_sym) == Some(name))
}

/// Numeric value of an int or float atom.
pub fn number_as_f64(node: &Sexpr) -> Option<f64> {
    match node.kind {
        SexprKind::Int(n) => Some(n as f64),
        SexprKind::F64(f) => Some(f),
        _ => None,
    }
}

/// Where a node sits while [`Sexpr::walk`] visits it.
#[derive(Debug, Clone)]
pub struct WalkCtx<'a> {
    /// Enclosing lists, outermost first.
    pub ancestors: &'a [&'a Sexpr],
}

impl<'a> WalkCtx<'a> {
    pub fn parent(&self) -> Option<&'a Sexpr> {
        self.ancestors.last().copied()
    }

    pub fn parent_tag(&self) -> Option<&'a str> {
        self.parent()?.tag()
    }
}

/// Half-open byte range `[start, end)` into the parsed text.
///
/// Nodes built in memory carry the empty range at offset zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn synthetic() -> Self {
        Self::default()
    }

    pub fn is_synthetic(&self) -> bool {
        *self == Self::default()
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SexprKind {
    /// Bare word such as `wire`, `yes` or `Device:R`.
    Symbol(String),
    /// Quoted text with escapes already resolved.
    String(String),
    Int(i64),
    F64(f64),
    List(Vec<Sexpr>),
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sexpr {
    pub kind: SexprKind,
    pub span: Span,
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        // Spans are positional only.
        self.kind == other.kind
    }
}

impl Sexpr {
    pub fn with_span(kind: SexprKind, span: Span) -> Self {
        Self { kind, span }
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        Self::with_span(SexprKind::Symbol(s.into()), Span::synthetic())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::with_span(SexprKind::String(s.into()), Span::synthetic())
    }

    pub fn int(n: i64) -> Self {
        Self::with_span(SexprKind::Int(n), Span::synthetic())
    }

    pub fn float(f: f64) -> Self {
        Self::with_span(SexprKind::F64(f), Span::synthetic())
    }

    pub fn list(items: Vec<Sexpr>) -> Self {
        Self::with_span(SexprKind::List(items), Span::synthetic())
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, SexprKind::List(_))
    }

    /// Text of a symbol or string atom.
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) | SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            SexprKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.kind {
            SexprKind::F64(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match &self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_list_mut(&mut self) -> Option<&mut Vec<Sexpr>> {
        match &mut self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Head symbol of a list, e.g. `wire` for `(wire ...)`.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    pub fn find_list(&self, name: &str) -> Option<&[Sexpr]> {
        find_child_list(self.as_list()?, name)
    }

    /// Source text covered by this node, if it was parsed from `source`.
    pub fn source_text<'s>(&self, source: &'s str) -> Option<&'s str> {
        if self.span.is_synthetic() {
            return None;
        }
        source.get(self.span.start..self.span.end)
    }

    /// Reset every span in the subtree to synthetic.
    ///
    /// Nodes moved from one document into another must be detached, otherwise
    /// their spans would index into the wrong source text.
    pub fn detach(&mut self) {
        self.span = Span::synthetic();
        if let SexprKind::List(items) = &mut self.kind {
            items.iter_mut().for_each(Sexpr::detach);
        }
    }

    /// Deep copy of this node with all spans reset.
    pub fn detached(&self) -> Sexpr {
        let mut copy = self.clone();
        copy.detach();
        copy
    }

    /// Visit every node depth-first, parents before children.
    ///
    /// ```
    /// use schem_sexpr::parse;
    ///
    /// let tree = parse("(pin (number \"1\"))").unwrap();
    /// let mut tags = Vec::new();
    /// tree.walk(|node, ctx| {
    ///     if let Some(tag) = node.tag() {
    ///         tags.push((tag.to_string(), ctx.ancestors.len()));
    ///     }
    /// });
    /// assert_eq!(tags, vec![("pin".to_string(), 0), ("number".to_string(), 1)]);
    /// ```
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&Sexpr, WalkCtx<'_>),
    {
        fn visit<'a, F>(node: &'a Sexpr, stack: &mut Vec<&'a Sexpr>, f: &mut F)
        where
            F: FnMut(&Sexpr, WalkCtx<'_>),
        {
            f(node, WalkCtx { ancestors: stack });
            if let Some(children) = node.as_list() {
                stack.push(node);
                for child in children {
                    visit(child, stack, f);
                }
                stack.pop();
            }
        }

        visit(self, &mut Vec::new(), &mut f);
    }
}

/// Create a key-value pair list
pub fn kv<K: Into<String>, V: Into<Sexpr>>(k: K, v: V) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol(k), v.into()])
}

/// A builder for constructing lists incrementally
#[derive(Debug, Default)]
pub struct ListBuilder {
    items: Vec<Sexpr>,
}

impl ListBuilder {
    /// Create a new builder with a node name
    pub fn node<N: Into<Sexpr>>(name: N) -> Self {
        Self {
            items: vec![name.into()],
        }
    }

    pub fn push<V: Into<Sexpr>>(&mut self, v: V) -> &mut Self {
        self.items.push(v.into());
        self
    }

    /// Conditionally push a value to the list
    pub fn push_if<V: Into<Sexpr>>(&mut self, cond: bool, v: V) -> &mut Self {
        if cond {
            self.items.push(v.into());
        }
        self
    }

    pub fn extend<I, V>(&mut self, iter: I) -> &mut Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Sexpr>,
    {
        self.items.extend(iter.into_iter().map(Into::into));
        self
    }

    pub fn build(self) -> Sexpr {
        Sexpr::list(self.items)
    }
}

impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Self::symbol(s)
    }
}

impl From<String> for Sexpr {
    fn from(s: String) -> Self {
        Self::symbol(s)
    }
}

impl From<i64> for Sexpr {
    fn from(n: i64) -> Self {
        Sexpr::int(n)
    }
}

impl From<u32> for Sexpr {
    fn from(n: u32) -> Self {
        Sexpr::int(n as i64)
    }
}

impl From<f64> for Sexpr {
    fn from(n: f64) -> Self {
        Sexpr::float(n)
    }
}

impl From<bool> for Sexpr {
    fn from(b: bool) -> Self {
        Self::symbol(if b { "yes" } else { "no" })
    }
}

/// Cursor over the input bytes. Multi-byte UTF-8 sequences never contain
/// ASCII bytes, so scanning for delimiters byte-wise keeps slices on char
/// boundaries.
struct Reader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn skip_trivia(&mut self) {
        while let Some(b) = self.peek() {
            match b {
                b';' => {
                    let rest = &self.text[self.pos..];
                    self.pos += rest.find('\n').map_or(rest.len(), |i| i + 1);
                }
                b if b.is_ascii_whitespace() => self.pos += 1,
                _ => break,
            }
        }
    }

    fn at_end(&mut self) -> bool {
        self.skip_trivia();
        self.pos >= self.text.len()
    }

    fn node(&mut self) -> Result<Sexpr, ParseError> {
        self.skip_trivia();
        match self.peek() {
            None => Err(ParseError::UnexpectedEof { offset: self.pos }),
            Some(b'(') => self.list(),
            Some(b')') => Err(ParseError::UnexpectedChar {
                found: ')',
                expected: '(',
                offset: self.pos,
            }),
            Some(b'"') => self.quoted(),
            Some(_) => Ok(self.word()),
        }
    }

    fn list(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            match self.peek() {
                None => return Err(ParseError::UnclosedList { start }),
                Some(b')') => {
                    self.pos += 1;
                    break;
                }
                Some(_) => items.push(self.node()?),
            }
        }
        if items.len() > 10_000 {
            log::trace!("list at byte {start} holds {} items", items.len());
        }
        Ok(Sexpr::with_span(
            SexprKind::List(items),
            Span::new(start, self.pos),
        ))
    }

    fn quoted(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        let mut run = self.pos;
        loop {
            match self.peek() {
                None => return Err(ParseError::UnterminatedString { start }),
                Some(b'"') => {
                    value.push_str(&self.text[run..self.pos]);
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    value.push_str(&self.text[run..self.pos]);
                    self.pos += 1;
                    let Some(escaped) = self.text[self.pos..].chars().next() else {
                        return Err(ParseError::UnterminatedString { start });
                    };
                    value.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                    self.pos += escaped.len_utf8();
                    run = self.pos;
                }
                Some(_) => self.pos += 1,
            }
        }
        Ok(Sexpr::with_span(
            SexprKind::String(value),
            Span::new(start, self.pos),
        ))
    }

    fn word(&mut self) -> Sexpr {
        let start = self.pos;
        while let Some(b) = self.peek() {
            if b.is_ascii_whitespace() || matches!(b, b'(' | b')' | b'"') {
                break;
            }
            self.pos += 1;
        }
        let word = &self.text[start..self.pos];
        let span = Span::new(start, self.pos);
        let kind = if looks_numeric(word) {
            word.parse::<i64>()
                .map(SexprKind::Int)
                .or_else(|_| word.parse::<f64>().map(SexprKind::F64))
                .unwrap_or_else(|_| SexprKind::Symbol(word.to_string()))
        } else {
            SexprKind::Symbol(word.to_string())
        };
        Sexpr::with_span(kind, span)
    }
}

/// Numbers must start like one; this keeps symbols such as `inf` or `nan` symbolic.
fn looks_numeric(atom: &str) -> bool {
    let mut chars = atom.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('-' | '+' | '.') => chars.next().is_some_and(|c| c.is_ascii_digit() || c == '.'),
        _ => false,
    }
}

/// Parse the first expression in `input`.
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    Reader::new(input).node()
}

/// Parse every top-level expression in `input`.
pub fn parse_all(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    let mut reader = Reader::new(input);
    let mut roots = Vec::new();
    while !reader.at_end() {
        roots.push(reader.node()?);
    }
    log::trace!("parsed {} top-level expressions from {} bytes", roots.len(), input.len());
    Ok(roots)
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParseError {
    #[error("unexpected end of input at byte {offset}")]
    UnexpectedEof { offset: usize },
    #[error("expected '{expected}', found '{found}' at byte {offset}")]
    UnexpectedChar {
        found: char,
        expected: char,
        offset: usize,
    },
    #[error("list opened at byte {start} is never closed")]
    UnclosedList { start: usize },
    #[error("string opened at byte {start} is never closed")]
    UnterminatedString { start: usize },
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = formatter::format_tree(self, formatter::FormatMode::Normal);
        write!(f, "{}", formatted.trim_end_matches('\n'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(text: &str) -> Vec<SexprKind> {
        parse(text)
            .unwrap()
            .as_list()
            .unwrap()
            .iter()
            .map(|node| node.kind.clone())
            .collect()
    }

    #[test]
    fn atoms_keep_their_types() {
        assert_eq!(
            kinds(r#"(at 12 -2.54 Device:R "R1")"#),
            vec![
                SexprKind::Symbol("at".into()),
                SexprKind::Int(12),
                SexprKind::F64(-2.54),
                SexprKind::Symbol("Device:R".into()),
                SexprKind::String("R1".into()),
            ]
        );
    }

    #[test]
    fn numeric_looking_words_stay_symbols() {
        for word in ["inf", "NaN", "infinity", "-", "e5", "1-2"] {
            assert_eq!(
                parse(word).unwrap().kind,
                SexprKind::Symbol(word.to_string()),
                "{word}"
            );
        }
        assert_eq!(parse(".5").unwrap().kind, SexprKind::F64(0.5));
        assert_eq!(parse("+3").unwrap().kind, SexprKind::Int(3));
    }

    #[test]
    fn string_escapes_are_resolved() {
        assert_eq!(
            kinds(r#"(text "say \"hi\"" "a\nb" "back\\slash")"#)[1..],
            [
                SexprKind::String("say \"hi\"".into()),
                SexprKind::String("a\nb".into()),
                SexprKind::String("back\\slash".into()),
            ]
        );
    }

    #[test]
    fn reads_a_library_pin() {
        let pin = parse(r#"(pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1"))"#)
            .unwrap();
        assert_eq!(pin.tag(), Some("pin"));
        let at = pin.find_list("at").unwrap();
        assert_eq!(number_as_f64(&at[2]), Some(3.81));
        assert_eq!(number_as_f64(&at[3]), Some(270.0));
        assert_eq!(pin.find_list("number").unwrap()[1].as_str(), Some("1"));
        assert!(pin.find_list("alternate").is_none());
    }

    #[test]
    fn comments_are_skipped() {
        let roots = parse_all("; header\n(wire) ; trailing\n(junction)\n; end").unwrap();
        let tags: Vec<_> = roots.iter().filter_map(Sexpr::tag).collect();
        assert_eq!(tags, vec!["wire", "junction"]);
    }

    #[test]
    fn errors_carry_offsets() {
        assert_eq!(
            parse("(a (b c)").unwrap_err(),
            ParseError::UnclosedList { start: 0 }
        );
        assert_eq!(
            parse("(a \"open)").unwrap_err(),
            ParseError::UnterminatedString { start: 3 }
        );
        assert_eq!(
            parse("   ").unwrap_err(),
            ParseError::UnexpectedEof { offset: 3 }
        );
        assert!(matches!(
            parse(")").unwrap_err(),
            ParseError::UnexpectedChar { found: ')', .. }
        ));
        assert!(parse_all("(kicad_sch) )").is_err());
    }

    #[test]
    fn formatted_trees_parse_back() {
        for text in [
            "(junction (at 10.16 20.32) (diameter 0) (color 0 0 0 0))",
            r#"(label "SDA" (at 1 2 0) (effects (font (size 1.27 1.27)) (justify left bottom)))"#,
            "(wire (pts (xy 0 0) (xy 10.16 0)) (stroke (width 0) (type default)))",
        ] {
            let tree = parse(text).unwrap();
            let formatted = formatter::format_tree(&tree, formatter::FormatMode::Normal);
            assert_eq!(parse(&formatted).unwrap(), tree, "{text}");
        }
    }

    #[test]
    fn spans_cover_multibyte_text() {
        let text = r#"(label "Résistance" "日本語")"#;
        let tree = parse(text).unwrap();
        assert_eq!(tree.span, Span::new(0, text.len()));
        let items = tree.as_list().unwrap();
        assert_eq!(items[0].source_text(text), Some("label"));
        assert_eq!(items[1].as_str(), Some("Résistance"));
        assert_eq!(items[2].source_text(text), Some("\"日本語\""));
    }

    #[test]
    fn detached_copies_lose_their_spans() {
        let tree = parse("(symbol \"R\" (pin passive line (at 0 0 0)))").unwrap();
        let copy = tree.detached();
        assert_eq!(copy, tree);
        assert!(copy.source_text("anything").is_none());
        copy.walk(|node, _| assert!(node.span.is_synthetic()));
    }

    #[test]
    fn walk_reports_parents() {
        let tree = parse("(symbol \"R_1_1\" (pin passive line (number \"1\")))").unwrap();
        let mut parents = Vec::new();
        tree.walk(|node, ctx| {
            if let Some(tag) = node.tag() {
                parents.push((tag.to_string(), ctx.parent_tag().map(str::to_string)));
            }
        });
        assert_eq!(
            parents,
            vec![
                ("symbol".to_string(), None),
                ("pin".to_string(), Some("symbol".to_string())),
                ("number".to_string(), Some("pin".to_string())),
            ]
        );
    }
}
