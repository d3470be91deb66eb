//! Definitions as they appear in `.kicad_sym` files and in a schematic's
//! `lib_symbols` section.

use std::collections::BTreeMap;

use crate::Sexpr;

use super::props::atom_to_string;

/// Items of a `(kicad_symbol_lib ...)` root, or `None` for any other root.
pub fn kicad_symbol_lib_items(sexpr: &Sexpr) -> Option<&[Sexpr]> {
    (sexpr.tag() == Some("kicad_symbol_lib")).then(|| sexpr.as_list()).flatten()
}

/// Name of a `(symbol "<name>" ...)` list.
pub fn symbol_name(symbol: &[Sexpr]) -> Option<String> {
    match symbol {
        [head, name, ..] if head.as_sym() == Some("symbol") => atom_to_string(name),
        _ => None,
    }
}

/// `Device:R` -> `R`; bare names are returned unchanged.
pub fn bare_name(name: &str) -> &str {
    name.rsplit_once(':').map_or(name, |(_, bare)| bare)
}

pub fn symbol_names(kicad_symbol_lib: &[Sexpr]) -> Vec<String> {
    kicad_symbol_lib
        .iter()
        .filter_map(Sexpr::as_list)
        .filter_map(symbol_name)
        .collect()
}

/// Top-level definition called `name`, matching either side of a `Lib:`
/// prefix so that `R`, `Device:R` and an entry stored as `Device:R` all meet.
pub fn find_symbol_by_bare_name<'a>(
    kicad_symbol_lib: &'a [Sexpr],
    name: &str,
) -> Option<&'a [Sexpr]> {
    let wanted = bare_name(name);
    kicad_symbol_lib
        .iter()
        .filter_map(Sexpr::as_list)
        .find(|list| symbol_name(list).is_some_and(|found| bare_name(&found) == wanted))
}

/// Parent named by `(extends "...")`.
pub fn symbol_extends(symbol: &[Sexpr]) -> Option<String> {
    atom_to_string(crate::find_child_list(symbol.get(2..)?, "extends")?.get(1)?)
}

/// Direct `(property "<name>" "<value>" ...)` pairs of a definition.
pub fn symbol_properties(symbol: &[Sexpr]) -> BTreeMap<String, String> {
    symbol
        .iter()
        .skip(2)
        .filter(|child| child.tag() == Some("property"))
        .filter_map(|child| match child.as_list()? {
            [_, name, value, ..] => Some((atom_to_string(name)?, atom_to_string(value)?)),
            _ => None,
        })
        .collect()
}

/// Rename a definition and the `Name_<unit>_<style>` blocks nested in it.
pub fn rename_symbol(symbol_items: &mut [Sexpr], new_name: &str) {
    let Some(old_name) = symbol_name(symbol_items) else {
        return;
    };
    let old_bare = bare_name(&old_name).to_string();
    let new_bare = bare_name(new_name);
    symbol_items[1] = Sexpr::string(new_name);

    for unit in symbol_items.iter_mut().skip(2).filter_map(Sexpr::as_list_mut) {
        let renamed = symbol_name(unit).and_then(|unit_name| {
            let suffix = unit_name.strip_prefix(old_bare.as_str())?;
            suffix.starts_with('_').then(|| format!("{new_bare}{suffix}"))
        });
        if let Some(renamed) = renamed {
            unit[1] = Sexpr::string(renamed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIBRARY: &str = r#"(kicad_symbol_lib
        (symbol "R"
            (property "Reference" "R" (at 0 0 0))
            (property "Value" "R" (at 0 0 0))
            (symbol "R_0_1" (rectangle (start -1.016 -2.54) (end 1.016 2.54)))
            (symbol "R_1_1" (pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1")))
        )
        (symbol "Device:C"
            (property "Reference" "C" (at 0 0 0))
        )
        (symbol "R_US" (extends "R")
            (property "Value" "R_US" (at 0 0 0))
        )
    )"#;

    #[test]
    fn finds_symbols_and_properties() {
        let parsed = crate::parse(LIBRARY).unwrap();
        let root = kicad_symbol_lib_items(&parsed).unwrap();
        assert_eq!(symbol_names(root), vec!["R", "Device:C", "R_US"]);

        let r = find_symbol_by_bare_name(root, "R").unwrap();
        let props = symbol_properties(r);
        assert_eq!(props.get("Reference").map(String::as_str), Some("R"));
        assert_eq!(symbol_extends(r), None);
        assert_eq!(
            symbol_extends(find_symbol_by_bare_name(root, "R_US").unwrap()).as_deref(),
            Some("R")
        );
    }

    #[test]
    fn bare_name_lookup_accepts_prefixed_entries() {
        let parsed = crate::parse(LIBRARY).unwrap();
        let root = kicad_symbol_lib_items(&parsed).unwrap();
        assert!(find_symbol_by_bare_name(root, "Resistor").is_none());
        let c = find_symbol_by_bare_name(root, "C").unwrap();
        assert_eq!(symbol_name(c).as_deref(), Some("Device:C"));
        assert!(find_symbol_by_bare_name(root, "Device:R").is_some());
    }

    #[test]
    fn rename_updates_unit_blocks() {
        let parsed = crate::parse(LIBRARY).unwrap();
        let root = kicad_symbol_lib_items(&parsed).unwrap();
        let mut r = find_symbol_by_bare_name(root, "R").unwrap().to_vec();
        rename_symbol(&mut r, "Device:R_US");

        assert_eq!(symbol_name(&r).as_deref(), Some("Device:R_US"));
        let units: Vec<String> = r
            .iter()
            .filter_map(Sexpr::as_list)
            .filter_map(symbol_name)
            .collect();
        assert_eq!(units, vec!["R_US_0_1", "R_US_1_1"]);
    }
}
