//! Layout for nodes that have no source text to copy.
//!
//! [`prettify`] reproduces the indentation eeschema applies when it saves a
//! schematic, so freshly inserted wires, labels and symbols sit next to
//! hand-edited ones without looking out of place.

use crate::{Sexpr, SexprKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Normal,
    /// `font`, `stroke`, `fill` and `color` stay on one line, as in `.kicad_sch` files.
    CompactTextProperties,
}

/// Points per line before a `pts` run wraps.
const XY_COLUMN_LIMIT: usize = 99;
/// Atoms per line before a long list wraps.
const WRAP_COLUMN: usize = 72;

#[derive(Default)]
struct Layout {
    out: Vec<u8>,
    depth: usize,
    column: usize,
    last: u8,
    quoted: bool,
    backslashes: usize,
    spaced: bool,
    wrapped: bool,
    in_xy: bool,
    /// Depth at which the current single-line text property began.
    inline_from: Option<usize>,
}

impl Layout {
    fn newline(&mut self) {
        self.out.push(b'\n');
        self.out.extend(std::iter::repeat_n(b'\t', self.depth));
        self.column = self.depth;
    }

    fn separator(&mut self, next: u8) {
        if self.spaced || self.depth == 0 || self.last == b'(' || matches!(next, b'(' | b')') {
            return;
        }
        if self.in_xy || self.inline_from.is_some() || self.column < WRAP_COLUMN {
            self.out.push(b' ');
            self.column += 1;
        } else {
            self.newline();
            self.wrapped = true;
        }
        self.spaced = true;
    }

    fn open(&mut self, xy: bool, inline: bool) {
        if self.out.is_empty() {
            self.out.push(b'(');
            self.column += 1;
        } else if (self.in_xy && xy && self.column < XY_COLUMN_LIMIT) || self.inline_from.is_some() {
            self.out.extend_from_slice(b" (");
            self.column += 2;
        } else {
            self.newline();
            self.out.push(b'(');
            self.column += 1;
        }
        self.in_xy = xy;
        if inline && self.inline_from.is_none() {
            self.inline_from = Some(self.depth);
        }
        self.depth += 1;
    }

    fn close(&mut self) {
        self.depth = self.depth.saturating_sub(1);
        if self.inline_from.is_none() && (self.last == b')' || self.wrapped) {
            self.newline();
            self.wrapped = false;
        }
        self.out.push(b')');
        self.column += 1;
        if self.inline_from == Some(self.depth) {
            self.inline_from = None;
        }
    }

    fn atom_byte(&mut self, b: u8) {
        if b == b'\\' {
            self.backslashes += 1;
        } else {
            if b == b'"' && self.backslashes % 2 == 0 {
                self.quoted = !self.quoted;
            }
            self.backslashes = 0;
        }
        self.out.push(b);
        self.column += 1;
    }
}

/// Re-indent S-expression text the way eeschema writes it.
///
/// Whitespace outside strings is normalized, nesting is indented with tabs
/// and runs of `(xy ..)` points share a line. The result ends in a newline.
pub fn prettify(source: &str, mode: FormatMode) -> String {
    let bytes = source.as_bytes();
    let mut layout = Layout {
        out: Vec::with_capacity(bytes.len()),
        ..Layout::default()
    };

    for (i, &b) in bytes.iter().enumerate() {
        if layout.quoted {
            layout.atom_byte(b);
        } else if is_space(b) {
            layout.separator(next_token_byte(bytes, i + 1));
            continue;
        } else if b == b'(' {
            let inline = mode == FormatMode::CompactTextProperties && is_inline_property(bytes, i);
            layout.open(bytes.get(i + 1..i + 4) == Some(b"xy ".as_slice()), inline);
        } else if b == b')' {
            layout.close();
        } else {
            layout.atom_byte(b);
        }
        layout.spaced = false;
        layout.last = b;
    }
    layout.out.push(b'\n');

    // Only ASCII is inserted between whole characters of `source`.
    String::from_utf8(layout.out)
        .unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned())
}

/// Render a freshly built tree. The result ends in a newline.
pub fn format_tree(sexpr: &Sexpr, mode: FormatMode) -> String {
    prettify(&format_compact(sexpr), mode)
}

/// Single-line rendering, `(a (b c))`.
pub fn format_compact(sexpr: &Sexpr) -> String {
    let mut out = String::new();
    write_compact(sexpr, &mut out);
    out
}

fn write_compact(sexpr: &Sexpr, out: &mut String) {
    match &sexpr.kind {
        SexprKind::Symbol(s) => out.push_str(s),
        SexprKind::String(s) => write_quoted(s, out),
        SexprKind::Int(n) => out.push_str(&n.to_string()),
        SexprKind::F64(f) => out.push_str(&format_number(*f)),
        SexprKind::List(items) => {
            out.push('(');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(' ');
                }
                write_compact(item, out);
            }
            out.push(')');
        }
    }
}

fn write_quoted(value: &str, out: &mut String) {
    out.push('"');
    for ch in value.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            _ => out.push(ch),
        }
    }
    out.push('"');
}

/// Coordinates as eeschema writes them: up to four decimals, trailing zeros
/// dropped, never `-0`.
pub fn format_number(value: f64) -> String {
    let fixed = format!("{value:.4}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

fn is_space(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}

fn next_token_byte(bytes: &[u8], from: usize) -> u8 {
    bytes
        .get(from..)
        .and_then(|rest| rest.iter().copied().find(|&b| !is_space(b)))
        .unwrap_or(0)
}

fn is_inline_property(bytes: &[u8], open: usize) -> bool {
    let rest = bytes.get(open + 1..).unwrap_or_default();
    let len = rest.iter().take_while(|b| b.is_ascii_alphabetic()).count();
    matches!(&rest[..len], b"font" | b"stroke" | b"fill" | b"color")
}
