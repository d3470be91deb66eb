//! Placed symbols as they appear at the top level of a `.kicad_sch`.

use std::collections::BTreeMap;

use crate::{Sexpr, number_as_f64};

use super::props::{child_list, string_prop, sym_prop};

fn property_parts(node: &Sexpr) -> Option<(&str, &[Sexpr])> {
    let items = node.as_list()?;
    if node.tag() != Some("property") {
        return None;
    }
    Some((items.get(1)?.as_str()?, items))
}

/// `(property "NAME" "VALUE" ...)` pairs of a placed symbol. A repeated name
/// keeps its first value.
pub fn schematic_properties(symbol: &[Sexpr]) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, items) in symbol.iter().skip(1).filter_map(property_parts) {
        let value = items.get(2).and_then(Sexpr::as_str).unwrap_or_default();
        out.entry(name.to_string()).or_insert_with(|| value.to_string());
    }
    out
}

/// `(at x y [rotation])`.
pub fn schematic_at(symbol: &[Sexpr]) -> Option<(f64, f64, Option<f64>)> {
    match child_list(symbol, "at")? {
        [_, x, y, rest @ ..] => Some((
            number_as_f64(x)?,
            number_as_f64(y)?,
            rest.first().and_then(number_as_f64),
        )),
        _ => None,
    }
}

/// `(lib_id "Lib:Name")`; older files write the id unquoted.
pub fn schematic_lib_id(symbol: &[Sexpr]) -> Option<String> {
    string_prop(symbol, "lib_id").or_else(|| sym_prop(symbol, "lib_id"))
}

/// `(mirror x)` or `(mirror y)`.
pub fn schematic_mirror(symbol: &[Sexpr]) -> Option<String> {
    sym_prop(symbol, "mirror")
}

/// Set the value of `(property "NAME" ...)`.
///
/// Returns `false` when the symbol has no such property; the caller decides
/// how a new property node should be placed.
pub fn set_schematic_property(symbol: &mut [Sexpr], name: &str, value: &str) -> bool {
    let Some(node) = symbol
        .iter_mut()
        .skip(1)
        .find(|node| property_parts(node).is_some_and(|(found, _)| found == name))
    else {
        return false;
    };
    let Some(items) = node.as_list_mut() else {
        return false;
    };
    match items.get_mut(2) {
        Some(slot) => *slot = Sexpr::string(value),
        None => items.push(Sexpr::string(value)),
    }
    true
}
