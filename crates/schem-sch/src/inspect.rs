//! Serialisable overview of a schematic.

use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::Serialize;

use crate::config::Config;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::geometry::{PinResolver, place_pin};
use crate::natural::natural_cmp;
use crate::netlist::{
    Connection, ConnectivityOptions, UnconnectedPin, net_connections, net_names, unconnected_pins,
};
use crate::position::Point;
use crate::schematic::SymbolInstance;

#[derive(Debug, Clone, PartialEq)]
pub struct InspectOptions {
    pub include_components: bool,
    /// Per-pin details on each component; needs `include_components`.
    pub include_pins: bool,
    pub include_nets: bool,
    pub include_unconnected: bool,
    /// Case-insensitive regex matched at the start of each reference.
    pub reference_filter: Option<String>,
    pub exclude_templates: bool,
    pub connectivity: ConnectivityOptions,
}

impl Default for InspectOptions {
    fn default() -> Self {
        Self {
            include_components: true,
            include_pins: false,
            include_nets: true,
            include_unconnected: false,
            reference_filter: None,
            exclude_templates: true,
            connectivity: ConnectivityOptions::default(),
        }
    }
}

impl From<&Config> for InspectOptions {
    fn from(config: &Config) -> Self {
        Self {
            exclude_templates: !config.connectivity.include_templates,
            connectivity: ConnectivityOptions::from(config),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn around(points: impl IntoIterator<Item = Point>) -> Option<Self> {
        points.into_iter().fold(None, |bbox, p| {
            Some(match bbox {
                None => BoundingBox {
                    min_x: p.x,
                    min_y: p.y,
                    max_x: p.x,
                    max_y: p.y,
                },
                Some(b) => BoundingBox {
                    min_x: b.min_x.min(p.x),
                    min_y: b.min_y.min(p.y),
                    max_x: b.max_x.max(p.x),
                    max_y: b.max_y.max(p.y),
                },
            })
        })
    }

    fn rounded(self) -> Self {
        let min = Point::new(self.min_x, self.min_y).rounded(2);
        let max = Point::new(self.max_x, self.max_y).rounded(2);
        Self {
            min_x: min.x,
            min_y: min.y,
            max_x: max.x,
            max_y: max.y,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub component_count: usize,
    pub wire_count: usize,
    pub net_count: usize,
    /// Over component origins; `None` for an empty sheet.
    pub bounding_box: Option<BoundingBox>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PinReport {
    pub number: String,
    pub name: String,
    pub electrical_type: String,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentReport {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub lib_id: String,
    pub position: Point,
    pub rotation: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pins: Option<Vec<PinReport>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetReport {
    pub name: String,
    pub connections: Vec<Connection>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchematicReport {
    pub summary: Summary,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Vec<ComponentReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nets: Option<Vec<NetReport>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unconnected: Option<Vec<UnconnectedPin>>,
}

fn reference_regex(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(&format!("^(?:{pattern})"))
        .case_insensitive(true)
        .build()
        .map_err(|e| Error::InvalidInput(format!("invalid reference filter '{pattern}': {e}")))
}

fn rounded_rotation(rotation: f64) -> f64 {
    (rotation * 10.0).round() / 10.0
}

pub fn inspect(doc: &Document, resolver: &PinResolver, options: &InspectOptions) -> Result<SchematicReport> {
    let filter = options
        .reference_filter
        .as_deref()
        .map(reference_regex)
        .transpose()?;
    options.connectivity.validate()?;
    let connectivity = ConnectivityOptions {
        include_templates: !options.exclude_templates,
        ..options.connectivity.clone()
    };

    let instances: Vec<SymbolInstance> = doc
        .symbol_instances()
        .into_iter()
        .filter(|inst| !(options.exclude_templates && connectivity.is_template(inst)))
        .collect();
    let nets = net_names(doc);

    let summary = Summary {
        component_count: instances.len(),
        wire_count: doc.wires().len(),
        net_count: nets.len(),
        bounding_box: BoundingBox::around(instances.iter().map(|inst| inst.position))
            .map(BoundingBox::rounded),
    };

    let components = options.include_components.then(|| {
        let mut components: Vec<ComponentReport> = instances
            .iter()
            .filter(|inst| filter.as_ref().is_none_or(|re| re.is_match(&inst.reference)))
            .map(|inst| ComponentReport {
                reference: inst.reference.clone(),
                value: inst.value.clone(),
                footprint: inst.footprint.clone(),
                lib_id: inst.lib_id.clone(),
                position: inst.position.rounded(2),
                rotation: rounded_rotation(inst.rotation),
                pins: options.include_pins.then(|| pin_reports(doc, resolver, inst)),
            })
            .collect();
        components.sort_by(|a, b| natural_cmp(&a.reference, &b.reference));
        components
    });

    let nets = options.include_nets.then(|| {
        nets.into_iter()
            .map(|name| NetReport {
                connections: net_connections(doc, resolver, &name, &connectivity),
                name,
            })
            .collect::<Vec<_>>()
    });

    let unconnected = options.include_unconnected.then(|| {
        unconnected_pins(doc, resolver, &connectivity)
            .into_iter()
            .map(|pin| UnconnectedPin {
                position: pin.position.rounded(2),
                ..pin
            })
            .collect::<Vec<_>>()
    });

    log::debug!(
        "Inspected {} components, {} wires, {} nets",
        summary.component_count,
        summary.wire_count,
        summary.net_count
    );
    Ok(SchematicReport {
        summary,
        components,
        nets,
        unconnected,
    })
}

fn pin_reports(doc: &Document, resolver: &PinResolver, instance: &SymbolInstance) -> Vec<PinReport> {
    let pins = match resolver.pins_for(doc, &instance.lib_id) {
        Ok(pins) => pins,
        Err(err) => {
            log::warn!("No pin details for {}: {err}", instance.reference);
            return Vec::new();
        }
    };
    let mut reports: Vec<PinReport> = pins
        .iter()
        .map(|pin| PinReport {
            number: pin.number.clone(),
            name: pin.name.clone(),
            electrical_type: pin.electrical_type.to_string(),
            position: place_pin(instance, pin).rounded(2),
        })
        .collect();
    reports.sort_by(|a, b| natural_cmp(&a.number, &b.number));
    reports
}

/// [`inspect`] on the schematic at `path`.
pub fn inspect_file(path: &Path, resolver: &PinResolver, options: &InspectOptions) -> Result<SchematicReport> {
    let doc = Document::load(path)?;
    inspect(&doc, resolver, options)
}
