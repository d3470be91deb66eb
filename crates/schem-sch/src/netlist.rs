//! Connectivity derived from geometry.
//!
//! A schematic stores no explicit nets. A net is named by its labels; a wire
//! belongs to it when one of its points sits on a label, and a pin belongs to
//! it when the pin lands on a point of one of those wires.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::TEMPLATE_PREFIX;
use crate::config::{Config, ConnectivityConfig};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::geometry::{PinResolver, place_pin};
use crate::natural::natural_cmp;
use crate::position::Point;
use crate::schematic::{SymbolInstance, Wire};
use crate::spatial::PointIndex;

/// Pin name reported for proximity matches, where pin geometry is unknown.
pub const UNKNOWN_PIN: &str = "unknown";

#[derive(Debug, Clone, PartialEq)]
pub struct ConnectivityOptions {
    pub tolerance: f64,
    pub proximity_radius: f64,
    pub follow_wire_chains: bool,
    pub include_templates: bool,
    /// Reference prefix of injected template instances.
    pub template_prefix: String,
}

impl Default for ConnectivityOptions {
    fn default() -> Self {
        Self::from(&ConnectivityConfig::default())
    }
}

impl From<&ConnectivityConfig> for ConnectivityOptions {
    fn from(config: &ConnectivityConfig) -> Self {
        Self {
            tolerance: config.tolerance,
            proximity_radius: config.proximity_radius,
            follow_wire_chains: config.follow_wire_chains,
            include_templates: config.include_templates,
            template_prefix: TEMPLATE_PREFIX.to_string(),
        }
    }
}

impl From<&Config> for ConnectivityOptions {
    fn from(config: &Config) -> Self {
        Self {
            template_prefix: config.templates.prefix.clone(),
            ..Self::from(&config.connectivity)
        }
    }
}

impl ConnectivityOptions {
    /// Tolerance must be positive and finite, the proximity radius finite and
    /// not negative.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance.is_finite() && self.tolerance > 0.0) {
            return Err(Error::InvalidInput(format!(
                "coincidence tolerance must be positive, got {}",
                self.tolerance
            )));
        }
        if !(self.proximity_radius.is_finite() && self.proximity_radius >= 0.0) {
            return Err(Error::InvalidInput(format!(
                "proximity radius must not be negative, got {}",
                self.proximity_radius
            )));
        }
        Ok(())
    }

    pub(crate) fn is_template(&self, instance: &SymbolInstance) -> bool {
        instance.is_template(&self.template_prefix)
    }

    fn includes(&self, instance: &SymbolInstance) -> bool {
        self.include_templates || !self.is_template(instance)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Connection {
    pub reference: String,
    pub pin: String,
}

impl Connection {
    fn new(reference: &str, pin: &str) -> Self {
        Self {
            reference: reference.to_string(),
            pin: pin.to_string(),
        }
    }
}

/// Distinct label texts, sorted.
pub fn net_names(doc: &Document) -> Vec<String> {
    doc.labels()
        .into_iter()
        .map(|label| label.text)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Wires whose points touch the net, grown through touching wires when
/// `follow_wire_chains` is set.
fn net_wires(wires: &[Wire], seeds: &PointIndex, options: &ConnectivityOptions) -> Vec<usize> {
    let touches = |wire: &Wire, index: &PointIndex| wire.points.iter().any(|p| index.contains_near(*p));

    let mut members: Vec<usize> = (0..wires.len())
        .filter(|&i| touches(&wires[i], seeds))
        .collect();
    if !options.follow_wire_chains {
        return members;
    }

    let mut reached = PointIndex::new(options.tolerance);
    reached.extend(members.iter().flat_map(|&i| wires[i].points.iter().copied()));
    loop {
        let added: Vec<usize> = (0..wires.len())
            .filter(|i| !members.contains(i))
            .filter(|&i| touches(&wires[i], &reached))
            .collect();
        if added.is_empty() {
            break;
        }
        for &i in &added {
            reached.extend(wires[i].points.iter().copied());
        }
        members.extend(added);
    }
    members.sort_unstable();
    members
}

/// Pins on the net named `net`, in document order.
///
/// Instances whose pins cannot be resolved count as connected, with pin
/// [`UNKNOWN_PIN`], when their origin lies within `proximity_radius` of a
/// net wire point. A net with no labels or no wires has no connections.
pub fn net_connections(
    doc: &Document,
    resolver: &PinResolver,
    net: &str,
    options: &ConnectivityOptions,
) -> Vec<Connection> {
    if let Err(err) = options.validate() {
        log::warn!("Skipping net '{net}': {err}");
        return Vec::new();
    }
    let mut labels = PointIndex::new(options.tolerance);
    labels.extend(
        doc.labels()
            .into_iter()
            .filter(|label| label.text == net)
            .map(|label| label.position),
    );
    if labels.is_empty() {
        log::debug!("Net '{net}' has no labels");
        return Vec::new();
    }

    let wires = doc.wires();
    let mut points = PointIndex::new(options.tolerance);
    for i in net_wires(&wires, &labels, options) {
        points.extend(wires[i].points.iter().copied());
    }
    if points.is_empty() {
        log::debug!("Net '{net}' has no wires");
        return Vec::new();
    }

    let mut connections = Vec::new();
    for instance in doc.symbol_instances() {
        if !options.includes(&instance) {
            continue;
        }
        match resolver.resolve_all_pins(doc, &instance) {
            Ok(pins) if !pins.is_empty() => connections.extend(
                pins.iter()
                    .filter(|(_, at)| points.contains_near(*at))
                    .map(|(number, _)| Connection::new(&instance.reference, number)),
            ),
            resolved => {
                if let Err(err) = resolved {
                    log::warn!("Pins of {} unavailable: {err}", instance.reference);
                }
                if points.any_within(instance.position, options.proximity_radius) {
                    connections.push(Connection::new(&instance.reference, UNKNOWN_PIN));
                }
            }
        }
    }
    log::debug!("Net '{net}': {} connections", connections.len());
    connections
}

/// A pin with no wire point on it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnconnectedPin {
    pub reference: String,
    pub pin: String,
    pub name: String,
    pub electrical_type: String,
    pub position: Point,
    /// A `(no_connect ...)` flag sits on the pin.
    pub marked_no_connect: bool,
}

/// Every resolvable pin that no wire point touches, in document order.
pub fn unconnected_pins(
    doc: &Document,
    resolver: &PinResolver,
    options: &ConnectivityOptions,
) -> Vec<UnconnectedPin> {
    if let Err(err) = options.validate() {
        log::warn!("Skipping unconnected pin check: {err}");
        return Vec::new();
    }
    let mut wire_points = PointIndex::new(options.tolerance);
    wire_points.extend(doc.wires().into_iter().flat_map(|wire| wire.points));
    let mut flags = PointIndex::new(options.tolerance);
    flags.extend(doc.no_connects().into_iter().map(|nc| nc.position));

    let mut unconnected = Vec::new();
    for instance in doc.symbol_instances() {
        if !options.includes(&instance) {
            continue;
        }
        let pins = match resolver.pins_for(doc, &instance.lib_id) {
            Ok(pins) => pins,
            Err(err) => {
                log::warn!("Skipping {}: {err}", instance.reference);
                continue;
            }
        };
        for pin in pins.iter() {
            let position = place_pin(&instance, pin);
            if wire_points.contains_near(position) {
                continue;
            }
            unconnected.push(UnconnectedPin {
                reference: instance.reference.clone(),
                pin: pin.number.clone(),
                name: pin.name.clone(),
                electrical_type: pin.electrical_type.to_string(),
                position,
                marked_no_connect: flags.contains_near(position),
            });
        }
    }
    unconnected
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NetlistComponent {
    pub reference: String,
    pub value: String,
    pub footprint: String,
    pub lib_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Netlist {
    /// Net name to its connections; nets without connections are left out.
    pub nets: BTreeMap<String, Vec<Connection>>,
    /// Components in natural reference order.
    pub components: Vec<NetlistComponent>,
}

impl Netlist {
    /// Nets `reference` takes part in, with the pin it joins them by.
    pub fn nets_of<'a>(&'a self, reference: &'a str) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        self.nets.iter().flat_map(move |(net, connections)| {
            connections
                .iter()
                .filter(move |c| c.reference == reference)
                .map(move |c| (net.as_str(), c.pin.as_str()))
        })
    }
}

pub fn generate_netlist(
    doc: &Document,
    resolver: &PinResolver,
    options: &ConnectivityOptions,
) -> Netlist {
    let nets: BTreeMap<String, Vec<Connection>> = net_names(doc)
        .into_iter()
        .filter_map(|net| {
            let connections = net_connections(doc, resolver, &net, options);
            (!connections.is_empty()).then_some((net, connections))
        })
        .collect();

    let mut components: Vec<NetlistComponent> = doc
        .symbol_instances()
        .into_iter()
        .filter(|inst| options.includes(inst))
        .map(|inst| NetlistComponent {
            reference: inst.reference,
            value: inst.value,
            footprint: inst.footprint,
            lib_id: inst.lib_id,
        })
        .collect();
    components.sort_by(|a, b| natural_cmp(&a.reference, &b.reference));

    log::info!(
        "Netlist: {} nets, {} components",
        nets.len(),
        components.len()
    );
    Netlist { nets, components }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHEET: &str = r#"(kicad_sch (version 20231120)
    (lib_symbols
        (symbol "Device:R"
            (symbol "R_1_1"
                (pin passive line (at 0 3.81 270) (length 1.27) (name "~") (number "1"))
                (pin passive line (at 0 -3.81 90) (length 1.27) (name "~") (number "2"))
            )
        )
    )
    (symbol (lib_id "Device:R") (at 10 10 0) (property "Reference" "R1" (at 0 0 0)) (property "Value" "1k" (at 0 0 0)))
    (symbol (lib_id "Device:R") (at 30 10 0) (property "Reference" "R2" (at 0 0 0)))
    (symbol (lib_id "Device:R") (at 50 10 0) (property "Reference" "R10" (at 0 0 0)))
    (symbol (lib_id "Missing:X") (at 0 25 0) (property "Reference" "U1" (at 0 0 0)))
    (symbol (lib_id "Device:R") (at -100 -100 0) (property "Reference" "_TEMPLATE_Device_R" (at 0 0 0)))
    (wire (pts (xy 10 13.81) (xy 20 13.81)))
    (wire (pts (xy 20 13.81) (xy 30 13.81)))
    (wire (pts (xy 0 20) (xy 5 20)))
    (wire (pts (xy 30 6.19) (xy 50 6.19)))
    (label "VCC" (at 20 13.81 0))
    (global_label "GND" (at 5 20 0))
    (label "NC_NET" (at 90 90 0))
    (no_connect (at 10 6.19))
    (sheet_instances (path "/" (page "1")))
)"#;

    fn conns(list: &[Connection]) -> Vec<String> {
        list.iter()
            .map(|c| format!("{}.{}", c.reference, c.pin))
            .collect()
    }

    #[test]
    fn single_hop_by_default() {
        let doc = Document::parse(SHEET).unwrap();
        let resolver = PinResolver::default();
        let options = ConnectivityOptions::default();

        // Both VCC wires touch the label at (20, 13.81).
        let vcc = net_connections(&doc, &resolver, "VCC", &options);
        assert_eq!(conns(&vcc), vec!["R1.1", "R2.1"]);

        let gnd = net_connections(&doc, &resolver, "GND", &options);
        assert_eq!(conns(&gnd), vec![format!("U1.{UNKNOWN_PIN}")]);

        assert!(net_connections(&doc, &resolver, "NC_NET", &options).is_empty());
        assert!(net_connections(&doc, &resolver, "NOPE", &options).is_empty());
    }

    #[test]
    fn wire_chains_are_followed_on_request() {
        let doc = Document::parse(
            r#"(kicad_sch
            (lib_symbols (symbol "Device:R" (symbol "R_1_1"
                (pin passive line (at 0 3.81 270) (length 1.27) (number "1"))
                (pin passive line (at 0 -3.81 90) (length 1.27) (number "2")))))
            (symbol (lib_id "Device:R") (at 40 0 0) (property "Reference" "R5" (at 0 0 0)))
            (wire (pts (xy 0 3.81) (xy 20 3.81)))
            (wire (pts (xy 20 3.81) (xy 40 3.81)))
            (label "SIG" (at 0 3.81 0))
            (sheet_instances))"#,
        )
        .unwrap();
        let resolver = PinResolver::default();
        let mut options = ConnectivityOptions::default();
        assert!(net_connections(&doc, &resolver, "SIG", &options).is_empty());

        options.follow_wire_chains = true;
        let sig = net_connections(&doc, &resolver, "SIG", &options);
        assert_eq!(conns(&sig), vec!["R5.1"]);
    }

    #[test]
    fn reports_unconnected_pins() {
        let doc = Document::parse(SHEET).unwrap();
        let unconnected = unconnected_pins(&doc, &PinResolver::default(), &ConnectivityOptions::default());
        let found: Vec<(String, bool)> = unconnected
            .iter()
            .map(|u| (format!("{}.{}", u.reference, u.pin), u.marked_no_connect))
            .collect();
        assert_eq!(
            found,
            vec![
                ("R1.2".to_string(), true),
                ("R10.1".to_string(), false),
            ]
        );
        assert_eq!(unconnected[1].electrical_type, "passive");
        assert!(unconnected[1].position.coincides(Point::new(50.0, 13.81), 1e-9));
    }

    #[test]
    fn netlist_skips_empty_nets_and_templates() {
        let doc = Document::parse(SHEET).unwrap();
        let netlist = generate_netlist(&doc, &PinResolver::default(), &ConnectivityOptions::default());
        assert_eq!(
            netlist.nets.keys().map(String::as_str).collect::<Vec<_>>(),
            vec!["GND", "VCC"]
        );
        let refs: Vec<&str> = netlist
            .components
            .iter()
            .map(|c| c.reference.as_str())
            .collect();
        assert_eq!(refs, vec!["R1", "R2", "R10", "U1"]);
        assert_eq!(netlist.nets_of("R2").collect::<Vec<_>>(), vec![("VCC", "1")]);
        assert_eq!(net_names(&doc), vec!["GND", "NC_NET", "VCC"]);
    }

    #[test]
    fn unusable_tolerances_are_rejected() {
        let doc = Document::parse(SHEET).unwrap();
        let resolver = PinResolver::default();
        for tolerance in [0.0, -0.5, f64::INFINITY, f64::NAN] {
            let options = ConnectivityOptions {
                tolerance,
                ..ConnectivityOptions::default()
            };
            assert!(matches!(options.validate(), Err(Error::InvalidInput(_))));
            assert!(net_connections(&doc, &resolver, "VCC", &options).is_empty());
            assert!(unconnected_pins(&doc, &resolver, &options).is_empty());
        }
        let options = ConnectivityOptions {
            proximity_radius: -1.0,
            ..ConnectivityOptions::default()
        };
        assert!(options.validate().is_err());
        assert!(ConnectivityOptions::default().validate().is_ok());
    }

    #[test]
    fn template_prefix_comes_from_config() {
        let doc = Document::parse(&SHEET.replace("_TEMPLATE_Device_R", "_TPL_Device_R")).unwrap();
        let resolver = PinResolver::default();
        let mut config = Config::default();
        config.templates.prefix = "_TPL".to_string();
        let options = ConnectivityOptions::from(&config);
        assert_eq!(options.template_prefix, "_TPL");

        let refs = |options: &ConnectivityOptions| -> Vec<String> {
            generate_netlist(&doc, &resolver, options)
                .components
                .into_iter()
                .map(|c| c.reference)
                .collect()
        };
        assert_eq!(refs(&options), vec!["R1", "R2", "R10", "U1"]);
        assert!(refs(&ConnectivityOptions::default()).contains(&"_TPL_Device_R".to_string()));
    }
}
