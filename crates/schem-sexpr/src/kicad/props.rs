//! Lookups for the small `(tag value)` lists KiCad uses as fields, such as
//! `(lib_id "Device:R")`, `(unit 1)` or `(in_bom yes)`.

use crate::{Sexpr, SexprKind};

/// Items of the first `(tag ...)` child.
pub fn child_list<'a>(list: &'a [Sexpr], tag: &str) -> Option<&'a [Sexpr]> {
    crate::find_child_list(list, tag)
}

fn first_value<'a>(list: &'a [Sexpr], tag: &str) -> Option<&'a Sexpr> {
    child_list(list, tag)?.get(1)
}

/// `(tag "text")`; bare words do not count.
pub fn string_prop(list: &[Sexpr], tag: &str) -> Option<String> {
    first_value(list, tag)?.as_str().map(str::to_owned)
}

/// `(tag word)`; quoted text does not count.
pub fn sym_prop(list: &[Sexpr], tag: &str) -> Option<String> {
    first_value(list, tag)?.as_sym().map(str::to_owned)
}

/// `(number "1")` and `(number 1)` alike.
pub fn atom_prop(list: &[Sexpr], tag: &str) -> Option<String> {
    atom_to_string(first_value(list, tag)?)
}

/// `(tag yes)` / `(tag no)`.
pub fn yes_no_prop(list: &[Sexpr], tag: &str) -> Option<bool> {
    match first_value(list, tag)?.as_sym()? {
        "yes" => Some(true),
        "no" => Some(false),
        _ => None,
    }
}

pub fn number_prop(list: &[Sexpr], tag: &str) -> Option<f64> {
    crate::number_as_f64(first_value(list, tag)?)
}

/// Text of any atom; numbers are rendered back to their decimal form.
pub fn atom_to_string(node: &Sexpr) -> Option<String> {
    match &node.kind {
        SexprKind::Symbol(s) | SexprKind::String(s) => Some(s.clone()),
        SexprKind::Int(n) => Some(n.to_string()),
        SexprKind::F64(f) => Some(f.to_string()),
        SexprKind::List(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse;

    #[test]
    fn reads_mixed_property_shapes() {
        let node = parse(r#"(symbol (lib_id "Device:R") (unit 1) (in_bom yes) (dnp no) (length 2.54) (number 4))"#)
            .unwrap();
        let items = node.as_list().unwrap();
        assert_eq!(string_prop(items, "lib_id").as_deref(), Some("Device:R"));
        assert_eq!(yes_no_prop(items, "in_bom"), Some(true));
        assert_eq!(yes_no_prop(items, "dnp"), Some(false));
        assert_eq!(number_prop(items, "length"), Some(2.54));
        assert_eq!(number_prop(items, "unit"), Some(1.0));
        assert_eq!(atom_prop(items, "number").as_deref(), Some("4"));
        assert_eq!(sym_prop(items, "lib_id"), None);
    }
}
