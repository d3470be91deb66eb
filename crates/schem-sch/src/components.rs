//! Placing, editing and finding components.
//!
//! New parts are clones of a template instance (see [`crate::inject`]), so
//! they carry whatever property layout and per-unit data the template has.

use std::collections::BTreeMap;

use schem_sexpr::kicad::set_schematic_property;
use schem_sexpr::{Sexpr, kv, number_as_f64};

use crate::document::Document;
use crate::error::{Error, NotFound, Result};
use crate::geometry::instance_or_not_found;
use crate::inject::property;
use crate::position::{MirrorAxis, Point};
use crate::schematic::SymbolInstance;

/// What a new component looks like.
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentSpec {
    pub reference: String,
    pub value: String,
    /// `None` keeps the template's footprint.
    pub footprint: Option<String>,
    /// `None` keeps the template's datasheet.
    pub datasheet: Option<String>,
    pub position: Point,
    pub rotation: f64,
    pub mirror: Option<MirrorAxis>,
    pub in_bom: bool,
    pub on_board: bool,
    pub dnp: bool,
    /// Further properties, added hidden at the component origin.
    pub properties: BTreeMap<String, String>,
}

impl ComponentSpec {
    pub fn new(reference: impl Into<String>, value: impl Into<String>, position: Point) -> Self {
        Self {
            reference: reference.into(),
            value: value.into(),
            footprint: None,
            datasheet: None,
            position,
            rotation: 0.0,
            mirror: None,
            in_bom: true,
            on_board: true,
            dnp: false,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_footprint(mut self, footprint: impl Into<String>) -> Self {
        self.footprint = Some(footprint.into());
        self
    }

    pub fn with_rotation(mut self, rotation: f64) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_mirror(mut self, mirror: MirrorAxis) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }
}

/// Place a copy of the instance `template_ref` described by `spec`.
///
/// Property labels keep their offsets from the instance origin. Returns the
/// section index of the new instance.
pub fn add_component(doc: &mut Document, template_ref: &str, spec: &ComponentSpec) -> Result<usize> {
    if spec.reference.is_empty() {
        return Err(Error::InvalidInput("component reference is empty".to_string()));
    }
    if !spec.position.x.is_finite() || !spec.position.y.is_finite() {
        return Err(Error::InvalidInput(format!(
            "non-finite position for {}",
            spec.reference
        )));
    }
    if doc.instance(&spec.reference).is_some() {
        return Err(Error::InvalidInput(format!(
            "reference {} is already in use",
            spec.reference
        )));
    }

    let template = doc
        .instance(template_ref)
        .ok_or_else(|| NotFound::Instance(template_ref.to_string()))?;
    let mut node = doc
        .section(template.index)
        .map(Sexpr::detached)
        .ok_or_else(|| NotFound::Instance(template_ref.to_string()))?;
    let items = node
        .as_list_mut()
        .ok_or_else(|| Error::Format(format!("instance {template_ref} is not a list")))?;

    let delta = Point::new(
        spec.position.x - template.position.x,
        spec.position.y - template.position.y,
    );
    for prop in items.iter_mut().filter(|n| n.tag() == Some("property")) {
        if let Some(prop_items) = prop.as_list_mut() {
            shift_at(prop_items, delta);
        }
    }

    set_at(items, spec.position, spec.rotation);
    set_mirror(items, spec.mirror);
    set_flag(items, "in_bom", spec.in_bom);
    set_flag(items, "on_board", spec.on_board);
    set_flag(items, "dnp", spec.dnp);
    set_child(items, "uuid", Sexpr::string(crate::new_uuid()));
    refresh_instance_data(items, &spec.reference);

    let mut props = vec![
        ("Reference", spec.reference.as_str(), false),
        ("Value", spec.value.as_str(), false),
    ];
    if let Some(footprint) = &spec.footprint {
        props.push(("Footprint", footprint.as_str(), true));
    }
    if let Some(datasheet) = &spec.datasheet {
        props.push(("Datasheet", datasheet.as_str(), true));
    }
    props.extend(spec.properties.iter().map(|(k, v)| (k.as_str(), v.as_str(), true)));
    for (name, value, hidden) in props {
        set_or_append_property(items, name, value, spec.position, hidden);
    }

    let index = doc.insert_before_anchor(node)?;
    log::info!(
        "Added {} ({}) from {template_ref} at ({}, {})",
        spec.reference,
        spec.value,
        spec.position.x,
        spec.position.y
    );
    Ok(index)
}

/// Remove the instance with `reference`. Returns whether one was removed.
pub fn remove_component(doc: &mut Document, reference: &str) -> bool {
    let Some(instance) = doc.instance(reference) else {
        log::warn!("No component {reference} to remove");
        return false;
    };
    let removed = doc.remove_section(instance.index).is_some();
    if removed {
        log::info!("Removed {reference}");
    }
    removed
}

/// Set `properties` on `reference`, rewriting existing values and appending
/// the rest hidden at the instance origin.
///
/// Returns `false` when there is no such instance.
pub fn update_component(
    doc: &mut Document,
    reference: &str,
    properties: &BTreeMap<String, String>,
) -> Result<bool> {
    let Some(instance) = doc.instance(reference) else {
        return Ok(false);
    };
    if let Some(renamed) = properties.get("Reference")
        && renamed != reference
    {
        if renamed.is_empty() {
            return Err(Error::InvalidInput("component reference is empty".to_string()));
        }
        if doc.instance(renamed).is_some() {
            return Err(Error::InvalidInput(format!("reference {renamed} is already in use")));
        }
    }
    let items = doc
        .section_mut(instance.index)
        .and_then(Sexpr::as_list_mut)
        .ok_or_else(|| Error::Format(format!("instance {reference} is not a list")))?;
    for (name, value) in properties {
        set_or_append_property(items, name, value, instance.position, true);
        if name == "Reference" {
            refresh_instance_data(items, value);
        }
    }
    log::info!("Updated {} properties on {reference}", properties.len());
    Ok(true)
}

pub fn find_component(doc: &Document, reference: &str) -> Result<SymbolInstance> {
    instance_or_not_found(doc, reference)
}

/// Non-template instances whose reference, lib_id or value contains `query`,
/// ignoring case. Templates are recognised by `template_prefix`.
pub fn search_components(doc: &Document, query: &str, template_prefix: &str) -> Vec<SymbolInstance> {
    let needle = query.to_lowercase();
    doc.symbol_instances()
        .into_iter()
        .filter(|inst| !inst.is_template(template_prefix))
        .filter(|inst| {
            [&inst.reference, &inst.lib_id, &inst.value]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .collect()
}

fn set_or_append_property(items: &mut Vec<Sexpr>, name: &str, value: &str, at: Point, hidden: bool) {
    if set_schematic_property(items, name, value) {
        return;
    }
    let at_node = Sexpr::list(vec![
        Sexpr::symbol("at"),
        Sexpr::float(at.x),
        Sexpr::float(at.y),
        Sexpr::int(0),
    ]);
    items.push(property(name, value, at_node, hidden));
}

fn set_child(items: &mut Vec<Sexpr>, tag: &str, value: Sexpr) {
    match items
        .iter_mut()
        .skip(1)
        .find(|n| n.tag() == Some(tag))
        .and_then(Sexpr::as_list_mut)
    {
        Some(child) => {
            child.truncate(1);
            child.push(value);
        }
        None => items.push(kv(tag, value)),
    }
}

fn set_flag(items: &mut Vec<Sexpr>, tag: &str, value: bool) {
    set_child(items, tag, Sexpr::from(value));
}

fn set_at(items: &mut Vec<Sexpr>, position: Point, rotation: f64) {
    let at = Sexpr::list(vec![
        Sexpr::symbol("at"),
        Sexpr::float(position.x),
        Sexpr::float(position.y),
        Sexpr::float(rotation),
    ]);
    match items.iter().position(|n| n.tag() == Some("at")) {
        Some(idx) => items[idx] = at,
        // after lib_id
        None => items.insert(2.min(items.len()), at),
    }
}

fn set_mirror(items: &mut Vec<Sexpr>, mirror: Option<MirrorAxis>) {
    items.retain(|n| n.tag() != Some("mirror"));
    if let Some(axis) = mirror {
        let after_at = items
            .iter()
            .position(|n| n.tag() == Some("at"))
            .map_or(items.len(), |idx| idx + 1);
        items.insert(after_at, kv("mirror", axis.as_str()));
    }
}

fn shift_at(items: &mut [Sexpr], delta: Point) {
    let Some(at) = items
        .iter_mut()
        .find(|n| n.tag() == Some("at"))
        .and_then(Sexpr::as_list_mut)
    else {
        return;
    };
    for (slot, d) in [(1, delta.x), (2, delta.y)] {
        if let Some(v) = at.get(slot).and_then(number_as_f64) {
            at[slot] = Sexpr::float(v + d);
        }
    }
}

/// Fresh pin uuids and the new reference in every `(instances ...)` path.
fn refresh_instance_data(items: &mut [Sexpr], reference: &str) {
    for node in items.iter_mut() {
        match node.tag() {
            Some("pin") => {
                if let Some(pin) = node.as_list_mut() {
                    set_child(pin, "uuid", Sexpr::string(crate::new_uuid()));
                }
            }
            Some("instances") => rewrite_references(node, reference),
            _ => {}
        }
    }
}

fn rewrite_references(node: &mut Sexpr, reference: &str) {
    let Some(items) = node.as_list_mut() else {
        return;
    };
    if items.first().and_then(Sexpr::as_sym) == Some("reference") && items.len() > 1 {
        items[1] = Sexpr::string(reference);
        return;
    }
    for child in items.iter_mut().skip(1) {
        rewrite_references(child, reference);
    }
}
