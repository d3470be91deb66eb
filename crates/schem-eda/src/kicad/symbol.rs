use schem_sexpr::kicad::symbol::{symbol_extends, symbol_name, symbol_properties};
use schem_sexpr::kicad::{atom_prop, child_list, number_prop};
use schem_sexpr::{Sexpr, number_as_f64};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

/// KiCad pin electrical types, as written in `(pin <type> <style> ...)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ElectricalType {
    Input,
    Output,
    Bidirectional,
    TriState,
    Passive,
    Free,
    Unspecified,
    PowerIn,
    PowerOut,
    OpenCollector,
    OpenEmitter,
    NoConnect,
}

impl ElectricalType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Input => "input",
            Self::Output => "output",
            Self::Bidirectional => "bidirectional",
            Self::TriState => "tri_state",
            Self::Passive => "passive",
            Self::Free => "free",
            Self::Unspecified => "unspecified",
            Self::PowerIn => "power_in",
            Self::PowerOut => "power_out",
            Self::OpenCollector => "open_collector",
            Self::OpenEmitter => "open_emitter",
            Self::NoConnect => "no_connect",
        }
    }
}

impl FromStr for ElectricalType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "input" => Self::Input,
            "output" => Self::Output,
            "bidirectional" => Self::Bidirectional,
            "tri_state" => Self::TriState,
            "passive" => Self::Passive,
            "free" => Self::Free,
            "unspecified" => Self::Unspecified,
            "power_in" => Self::PowerIn,
            "power_out" => Self::PowerOut,
            "open_collector" => Self::OpenCollector,
            "open_emitter" => Self::OpenEmitter,
            "no_connect" => Self::NoConnect,
            other => return Err(format!("unknown pin electrical type '{other}'")),
        })
    }
}

impl fmt::Display for ElectricalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pin placement relative to the symbol origin.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct PinAt {
    pub x: f64,
    pub y: f64,
    /// Orientation in degrees.
    pub rotation: f64,
}

/// A pin as declared inside a symbol definition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinDefinition {
    pub number: String,
    pub name: String,
    pub electrical_type: ElectricalType,
    pub graphical_style: Option<String>,
    pub at: PinAt,
    pub length: f64,
    pub hidden: bool,
    /// Unit from the enclosing `Name_<unit>_<style>` block; 0 means shared by all units.
    pub unit: u32,
}

/// Pins of one definition keyed by number, in source order.
#[derive(Debug, Default, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PinTable {
    pins: Vec<PinDefinition>,
    #[serde(skip)]
    by_number: HashMap<String, usize>,
}

impl PinTable {
    /// Insert unless the number is already present; the first declaration wins.
    fn insert(&mut self, pin: PinDefinition) -> bool {
        if self.by_number.contains_key(&pin.number) {
            return false;
        }
        self.by_number.insert(pin.number.clone(), self.pins.len());
        self.pins.push(pin);
        true
    }

    pub fn get(&self, number: &str) -> Option<&PinDefinition> {
        self.by_number.get(number).map(|&idx| &self.pins[idx])
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PinDefinition> {
        self.pins.iter()
    }

    pub fn numbers(&self) -> impl Iterator<Item = &str> {
        self.pins.iter().map(|pin| pin.number.as_str())
    }

    pub fn len(&self) -> usize {
        self.pins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pins.is_empty()
    }
}

impl<'a> IntoIterator for &'a PinTable {
    type Item = &'a PinDefinition;
    type IntoIter = std::slice::Iter<'a, PinDefinition>;

    fn into_iter(self) -> Self::IntoIter {
        self.pins.iter()
    }
}

/// Collect every pin of a `(symbol ...)` definition, at any nesting depth.
///
/// The walk is depth-first in source order, so when a number is declared more
/// than once (alternate body styles, stacked pins) the first declaration is
/// the one kept.
pub fn extract_pins(definition: &Sexpr) -> PinTable {
    let mut table = PinTable::default();
    definition.walk(|node, ctx| {
        if node.tag() != Some("pin") || ctx.parent_tag() != Some("symbol") {
            return;
        }
        let Some(items) = node.as_list() else {
            return;
        };
        let unit = ctx
            .parent()
            .and_then(Sexpr::as_list)
            .filter(|_| ctx.ancestors.len() > 1)
            .map(|parent| nested_symbol_unit_style(parent).0)
            .unwrap_or(0);
        let Some(pin) = parse_pin(items, unit) else {
            return;
        };
        let number = pin.number.clone();
        if !table.insert(pin) {
            tracing::debug!("Ignoring repeated declaration of pin {number}");
        }
    });
    table
}

/// Parse `(pin <electrical_type> <graphical_style> (at X Y R) (length L) (name "N") (number "1"))`.
///
/// Instance pins `(pin "1" (uuid ...))` carry no `(number ...)` and are
/// skipped. A definition pin without a type token is passive.
fn parse_pin(pin_data: &[Sexpr], unit: u32) -> Option<PinDefinition> {
    let number = atom_prop(pin_data, "number")?;
    let type_token = pin_data.get(1).and_then(Sexpr::as_sym);

    let electrical_type = match type_token {
        None => ElectricalType::Passive,
        Some(token) => token.parse().unwrap_or_else(|err| {
            tracing::warn!("{err}, treating pin {number} as unspecified");
            ElectricalType::Unspecified
        }),
    };
    let graphical_style = type_token
        .and_then(|_| pin_data.get(2)?.as_sym())
        .map(str::to_string);

    let at = child_list(pin_data, "at")
        .map(|at| PinAt {
            x: at.get(1).and_then(number_as_f64).unwrap_or(0.0),
            y: at.get(2).and_then(number_as_f64).unwrap_or(0.0),
            rotation: at.get(3).and_then(number_as_f64).unwrap_or(0.0),
        })
        .unwrap_or_default();

    let hidden = pin_data.iter().skip(3).any(|item| {
        item.as_sym() == Some("hide")
            || item
                .as_list()
                .is_some_and(|l| l.first().and_then(Sexpr::as_sym) == Some("hide")
                    && l.get(1).and_then(Sexpr::as_sym) != Some("no"))
    });

    Some(PinDefinition {
        number,
        name: atom_prop(pin_data, "name").unwrap_or_default(),
        electrical_type,
        graphical_style,
        at,
        length: number_prop(pin_data, "length").unwrap_or(0.0),
        hidden,
        unit,
    })
}

/// Trailing `_<unit>_<style>` of a nested unit block name.
fn nested_symbol_unit_style(section_data: &[Sexpr]) -> (u32, u32) {
    symbol_name(section_data)
        .map(|name| {
            let mut parts = name.rsplitn(3, '_');
            let style = parts
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            let unit = parts
                .next()
                .and_then(|s| s.parse().ok())
                .unwrap_or_default();
            (unit, style)
        })
        .unwrap_or((0, 0))
}

/// A symbol definition: the shared template a placed instance refers to by `lib_id`.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolDefinition {
    pub name: String,
    pub extends: Option<String>,
    pub properties: BTreeMap<String, String>,
    pub pins: PinTable,
}

impl SymbolDefinition {
    /// Read a `(symbol "<name>" ...)` node; `None` if it is not a symbol list.
    pub fn from_sexpr(node: &Sexpr) -> Option<Self> {
        let items = node.as_list()?;
        Some(Self {
            name: symbol_name(items)?,
            extends: symbol_extends(items),
            properties: symbol_properties(items),
            pins: extract_pins(node),
        })
    }

    pub fn property(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str)
    }
}
