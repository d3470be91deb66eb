//! Typed read-only views over schematic sections.

use std::collections::BTreeMap;

use schem_sexpr::kicad::{
    child_list, number_prop, schematic_at, schematic_lib_id, schematic_mirror,
    schematic_properties, string_prop, sym_prop, yes_no_prop,
};
use schem_sexpr::{Sexpr, number_as_f64};
use serde::Serialize;

use crate::TEMPLATE_PREFIX;
use crate::document::Document;
use crate::position::{MirrorAxis, Point};

/// A placed `(symbol (lib_id ...) ...)` section.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolInstance {
    /// Section index in the owning document.
    #[serde(skip)]
    pub index: usize,
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub datasheet: String,
    pub lib_id: String,
    pub position: Point,
    pub rotation: f64,
    pub mirror: Option<MirrorAxis>,
    pub unit: u32,
    pub in_bom: bool,
    pub on_board: bool,
    pub dnp: bool,
    pub properties: BTreeMap<String, String>,
    pub uuid: Option<String>,
}

impl SymbolInstance {
    pub fn from_section(index: usize, node: &Sexpr) -> Option<Self> {
        let items = node.as_list()?;
        if node.tag() != Some("symbol") {
            return None;
        }
        let lib_id = schematic_lib_id(items)?;
        let (x, y, rotation) = schematic_at(items).unwrap_or((0.0, 0.0, None));
        let properties = schematic_properties(items);
        let prop = |name: &str| properties.get(name).cloned().unwrap_or_default();

        Some(Self {
            index,
            reference: prop("Reference"),
            value: prop("Value"),
            footprint: prop("Footprint"),
            datasheet: prop("Datasheet"),
            lib_id,
            position: Point::new(x, y),
            rotation: rotation.unwrap_or(0.0),
            mirror: schematic_mirror(items).as_deref().and_then(MirrorAxis::parse),
            unit: number_prop(items, "unit").map_or(1, |u| u as u32),
            in_bom: yes_no_prop(items, "in_bom").unwrap_or(true),
            on_board: yes_no_prop(items, "on_board").unwrap_or(true),
            dnp: yes_no_prop(items, "dnp").unwrap_or(false),
            uuid: string_prop(items, "uuid").or_else(|| sym_prop(items, "uuid")),
            properties,
        })
    }

    /// Off-canvas placeholder holding a definition for cloning.
    ///
    /// `prefix` is the configured template prefix; the fixed `_TEMPLATE_*`
    /// references of well-known kinds always count.
    pub fn is_template(&self, prefix: &str) -> bool {
        (!prefix.is_empty() && self.reference.starts_with(prefix))
            || self.reference.starts_with(TEMPLATE_PREFIX)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wire {
    #[serde(skip)]
    pub index: usize,
    pub points: Vec<Point>,
    pub stroke_width: f64,
    pub stroke_type: String,
    pub uuid: Option<String>,
}

impl Wire {
    pub fn from_section(index: usize, node: &Sexpr) -> Option<Self> {
        if node.tag() != Some("wire") {
            return None;
        }
        let items = node.as_list()?;
        let points = child_list(items, "pts")
            .map(|pts| pts.iter().filter_map(xy_point).collect())
            .unwrap_or_default();
        let stroke = child_list(items, "stroke").unwrap_or_default();
        Some(Self {
            index,
            points,
            stroke_width: number_prop(stroke, "width").unwrap_or(0.0),
            stroke_type: sym_prop(stroke, "type").unwrap_or_else(|| "default".to_string()),
            uuid: string_prop(items, "uuid"),
        })
    }
}

fn xy_point(node: &Sexpr) -> Option<Point> {
    let xy = node.as_list()?;
    if node.tag() != Some("xy") {
        return None;
    }
    Some(Point::new(
        number_as_f64(xy.get(1)?)?,
        number_as_f64(xy.get(2)?)?,
    ))
}

fn at_point(items: &[Sexpr]) -> Option<(Point, f64)> {
    let at = child_list(items, "at")?;
    let point = Point::new(number_as_f64(at.get(1)?)?, number_as_f64(at.get(2)?)?);
    Some((point, at.get(3).and_then(number_as_f64).unwrap_or(0.0)))
}

/// The three label flavours. All of them name the net they touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelKind {
    Local,
    Global,
    Hierarchical,
}

impl LabelKind {
    pub const ALL: [LabelKind; 3] = [LabelKind::Local, LabelKind::Global, LabelKind::Hierarchical];

    pub fn tag(self) -> &'static str {
        match self {
            LabelKind::Local => "label",
            LabelKind::Global => "global_label",
            LabelKind::Hierarchical => "hierarchical_label",
        }
    }

    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.tag() == tag)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetLabel {
    #[serde(skip)]
    pub index: usize,
    pub text: String,
    pub position: Point,
    pub rotation: f64,
    pub kind: LabelKind,
}

impl NetLabel {
    pub fn from_section(index: usize, node: &Sexpr) -> Option<Self> {
        let kind = LabelKind::from_tag(node.tag()?)?;
        let items = node.as_list()?;
        let text = items.get(1)?.as_atom()?.to_string();
        let (position, rotation) = at_point(items).unwrap_or_default();
        Some(Self {
            index,
            text,
            position,
            rotation,
            kind,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Junction {
    #[serde(skip)]
    pub index: usize,
    pub position: Point,
    pub diameter: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoConnect {
    #[serde(skip)]
    pub index: usize,
    pub position: Point,
}

impl Document {
    /// Every placed symbol, templates included, in document order.
    pub fn symbol_instances(&self) -> Vec<SymbolInstance> {
        self.find_sections("symbol")
            .filter_map(|(idx, node)| SymbolInstance::from_section(idx, node))
            .collect()
    }

    /// First instance whose Reference is `reference`.
    pub fn instance(&self, reference: &str) -> Option<SymbolInstance> {
        self.find_sections("symbol")
            .filter_map(|(idx, node)| SymbolInstance::from_section(idx, node))
            .find(|inst| inst.reference == reference)
    }

    pub fn wires(&self) -> Vec<Wire> {
        self.find_sections("wire")
            .filter_map(|(idx, node)| Wire::from_section(idx, node))
            .collect()
    }

    /// Labels of every kind, in document order.
    pub fn labels(&self) -> Vec<NetLabel> {
        self.sections()
            .iter()
            .enumerate()
            .filter_map(|(idx, node)| NetLabel::from_section(idx, node))
            .collect()
    }

    pub fn junctions(&self) -> Vec<Junction> {
        self.find_sections("junction")
            .filter_map(|(index, node)| {
                let items = node.as_list()?;
                Some(Junction {
                    index,
                    position: at_point(items)?.0,
                    diameter: number_prop(items, "diameter").unwrap_or(0.0),
                })
            })
            .collect()
    }

    pub fn no_connects(&self) -> Vec<NoConnect> {
        self.find_sections("no_connect")
            .filter_map(|(index, node)| {
                Some(NoConnect {
                    index,
                    position: at_point(node.as_list()?)?.0,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"(kicad_sch (version 20231120)
        (lib_symbols)
        (symbol (lib_id "Device:R") (at 50.8 30.48 90) (mirror x) (unit 1)
            (in_bom yes) (on_board yes) (dnp no)
            (uuid "aaaa")
            (property "Reference" "R1" (at 0 0 0))
            (property "Value" "10k" (at 0 0 0))
            (property "Footprint" "Resistor_SMD:R_0603" (at 0 0 0))
        )
        (symbol (lib_id "Device:C") (at -100 -100 0) (in_bom no) (on_board no) (dnp yes)
            (property "Reference" "_TEMPLATE_C" (at 0 0 0))
        )
        (wire (pts (xy 0 0) (xy 10.16 0) (xy 10.16 5)) (stroke (width 0.2) (type dash)) (uuid "w1"))
        (label "VCC" (at 10.16 0 0))
        (global_label "GND" (at 1 2 180) (shape input))
        (hierarchical_label "SDA" (at 3 4 0))
        (text "not a label" (at 0 0 0))
        (junction (at 10.16 0) (diameter 0.9))
        (no_connect (at 7 7))
        (sheet_instances (path "/" (page "1")))
    )"#;

    #[test]
    fn reads_instances() {
        let doc = Document::parse(SHEET).unwrap();
        let instances = doc.symbol_instances();
        assert_eq!(instances.len(), 2);

        let r1 = &instances[0];
        assert_eq!(r1.reference, "R1");
        assert_eq!(r1.value, "10k");
        assert_eq!(r1.footprint, "Resistor_SMD:R_0603");
        assert_eq!(r1.lib_id, "Device:R");
        assert_eq!(r1.position, Point::new(50.8, 30.48));
        assert_eq!(r1.rotation, 90.0);
        assert_eq!(r1.mirror, Some(MirrorAxis::X));
        assert_eq!(r1.uuid.as_deref(), Some("aaaa"));
        assert!(!r1.is_template(TEMPLATE_PREFIX));
        assert!(!r1.is_template(""));

        let template = doc.instance("_TEMPLATE_C").unwrap();
        assert!(template.is_template(TEMPLATE_PREFIX));
        assert!(template.is_template("_TPL"));
        assert!(template.dnp && !template.in_bom && !template.on_board);
        assert!(doc.instance("R2").is_none());
    }

    #[test]
    fn reads_wires_and_labels() {
        let doc = Document::parse(SHEET).unwrap();
        let wires = doc.wires();
        assert_eq!(wires.len(), 1);
        assert_eq!(wires[0].points.len(), 3);
        assert_eq!(wires[0].stroke_width, 0.2);
        assert_eq!(wires[0].stroke_type, "dash");

        let labels: Vec<(String, LabelKind)> = doc
            .labels()
            .into_iter()
            .map(|l| (l.text, l.kind))
            .collect();
        assert_eq!(
            labels,
            vec![
                ("VCC".to_string(), LabelKind::Local),
                ("GND".to_string(), LabelKind::Global),
                ("SDA".to_string(), LabelKind::Hierarchical),
            ]
        );
        assert_eq!(doc.labels()[1].rotation, 180.0);

        assert_eq!(doc.junctions()[0].diameter, 0.9);
        assert_eq!(doc.no_connects()[0].position, Point::new(7.0, 7.0));
    }
}
