//! Span-preserving writer.
//!
//! A node whose span still describes exactly what the tree holds is copied
//! byte-for-byte from the source text. Lists that gained, lost or replaced
//! children are rebuilt around their untouched children, reusing the original
//! separators, and synthetic nodes go through [`crate::formatter`] with their
//! indentation matched to the surrounding siblings.

use crate::formatter::{FormatMode, format_compact, format_tree};
use crate::{Sexpr, SexprKind};

/// Render `node` against the `source` it was parsed from.
pub fn render_preserving(node: &Sexpr, source: &str) -> String {
    let mut out = String::with_capacity((node.span.end - node.span.start).max(64));
    write_preserving(node, source, &mut out);
    out
}

/// Append the rendering of `node` to `out`; see [`render_preserving`].
pub fn write_preserving(node: &Sexpr, source: &str, out: &mut String) {
    let indent = if node.span.is_synthetic() {
        String::new()
    } else {
        line_indent(source, node.span.start).to_string()
    };
    write_node(node, source, &indent, out);
}

/// True when the node and all of its descendants are unchanged since parsing.
pub fn is_pristine(node: &Sexpr, source: &str) -> bool {
    let Some(text) = node.source_text(source) else {
        return false;
    };

    match &node.kind {
        SexprKind::Symbol(s) => text == s,
        SexprKind::String(_) | SexprKind::Int(_) | SexprKind::F64(_) => {
            crate::parse(text).is_ok_and(|reparsed| reparsed.kind == node.kind)
        }
        SexprKind::List(items) => {
            if !(text.starts_with('(') && text.ends_with(')')) {
                return false;
            }
            let mut cursor = node.span.start + 1;
            for child in items {
                if child.span.is_synthetic() || child.span.start < cursor {
                    return false;
                }
                if !source
                    .get(cursor..child.span.start)
                    .is_some_and(is_trivia)
                {
                    return false;
                }
                if !is_pristine(child, source) {
                    return false;
                }
                cursor = child.span.end;
            }
            node.span.end > cursor
                && source.get(cursor..node.span.end - 1).is_some_and(is_trivia)
        }
    }
}

fn write_node(node: &Sexpr, source: &str, indent: &str, out: &mut String) {
    if is_pristine(node, source) {
        out.push_str(&source[node.span.start..node.span.end]);
        return;
    }

    let Some(items) = node.as_list() else {
        out.push_str(&format_compact(node));
        return;
    };

    if node.span.is_synthetic() {
        write_fresh(node, indent, "\t", out);
        return;
    }

    let original = &source[node.span.start..node.span.end];
    // A one-line list that gains a nested fresh child is opened up.
    let grew_multiline = !original.contains('\n')
        && items.iter().any(|child| {
            child.span.is_synthetic()
                && child.as_list().is_some_and(|l| l.iter().any(Sexpr::is_list))
        });
    let multiline = original.contains('\n') || grew_multiline;
    let child_indent = child_indent(items, source, indent);
    let unit = child_indent
        .strip_prefix(indent)
        .filter(|unit| !unit.is_empty())
        .unwrap_or("\t")
        .to_string();

    out.push('(');
    let mut cursor = node.span.start + 1;
    let mut seen_source_child = false;
    for (idx, child) in items.iter().enumerate() {
        let in_order = !child.span.is_synthetic()
            && child.span.start >= cursor
            && child.span.end <= node.span.end;

        if in_order {
            let gap = &source[cursor..child.span.start];
            if is_trivia(gap) {
                out.push_str(gap);
            } else {
                push_separator(out, idx, gap_tail(gap), multiline, &child_indent);
            }
            write_node(child, source, line_indent(source, child.span.start), out);
            cursor = child.span.end;
            seen_source_child = true;
        } else {
            push_separator(out, idx, "", multiline, &child_indent);
            if child.is_list() && child.span.is_synthetic() {
                write_fresh(child, &child_indent, &unit, out);
            } else {
                write_node(child, source, &child_indent, out);
            }
        }
    }

    let closing_gap = source.get(cursor..node.span.end - 1).unwrap_or_default();
    if seen_source_child && is_trivia(closing_gap) && !grew_multiline {
        out.push_str(closing_gap);
    } else if multiline && items.len() > 1 {
        out.push('\n');
        out.push_str(indent);
    }
    out.push(')');
}

fn push_separator(out: &mut String, idx: usize, tail: &str, multiline: bool, indent: &str) {
    if !tail.is_empty() {
        out.push_str(tail);
        return;
    }
    if idx == 0 {
        return;
    }
    if multiline {
        out.push('\n');
        out.push_str(indent);
    } else {
        out.push(' ');
    }
}

/// Prettify a synthetic list and re-indent its continuation lines.
fn write_fresh(node: &Sexpr, indent: &str, unit: &str, out: &mut String) {
    let formatted = format_tree(node, FormatMode::CompactTextProperties);
    for (line_no, line) in formatted.trim_end_matches('\n').lines().enumerate() {
        if line_no > 0 {
            out.push('\n');
            out.push_str(indent);
            let depth = line.len() - line.trim_start_matches('\t').len();
            out.push_str(&unit.repeat(depth));
            out.push_str(&line[depth..]);
        } else {
            out.push_str(line);
        }
    }
}

/// Indentation used by the children of a list: taken from the first source
/// child that starts its own line, else one tab deeper than the list.
fn child_indent(items: &[Sexpr], source: &str, indent: &str) -> String {
    items
        .iter()
        .filter(|child| !child.span.is_synthetic())
        .find_map(|child| {
            let line_start = source[..child.span.start].rfind('\n')? + 1;
            let prefix = &source[line_start..child.span.start];
            prefix
                .chars()
                .all(|c| c == ' ' || c == '\t')
                .then(|| prefix.to_string())
        })
        .unwrap_or_else(|| format!("{indent}\t"))
}

/// Leading whitespace of the line containing byte `pos`.
fn line_indent(source: &str, pos: usize) -> &str {
    let line_start = source[..pos].rfind('\n').map_or(0, |idx| idx + 1);
    let line = &source[line_start..];
    let len = line.len() - line.trim_start_matches([' ', '\t']).len();
    &line[..len.min(pos - line_start)]
}

/// Whitespace after the last non-whitespace byte of a gap.
fn gap_tail(gap: &str) -> &str {
    let trimmed = gap.trim_end();
    &gap[trimmed.len()..]
}

/// Whitespace and `;` comments only.
fn is_trivia(text: &str) -> bool {
    let mut in_comment = false;
    for ch in text.chars() {
        if in_comment {
            in_comment = ch != '\n';
        } else if ch == ';' {
            in_comment = true;
        } else if !ch.is_whitespace() {
            return false;
        }
    }
    true
}
