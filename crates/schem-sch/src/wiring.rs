//! Adding wires, labels, junctions and no-connect flags.
//!
//! Every node is inserted right before `(sheet_instances ...)` with a fresh
//! uuid, and the inserted section index is returned.

use schem_sexpr::{ListBuilder, Sexpr, kv};

use crate::document::Document;
use crate::error::{Error, Result};
use crate::geometry::PinResolver;
use crate::position::Point;
use crate::schematic::LabelKind;

/// Grid pitch used for the stub wire of [`connect_to_net`].
pub const STUB_LENGTH: f64 = 2.54;

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub width: f64,
    pub kind: String,
}

impl Default for Stroke {
    fn default() -> Self {
        Self {
            width: 0.0,
            kind: "default".to_string(),
        }
    }
}

/// How [`connect_pins`] draws the wire between two pins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Routing {
    /// One straight, possibly diagonal, segment.
    #[default]
    Direct,
    /// Horizontal leg first, then vertical.
    OrthogonalHorizontal,
    /// Vertical leg first, then horizontal.
    OrthogonalVertical,
}

fn xy(p: Point) -> Sexpr {
    Sexpr::list(vec![Sexpr::symbol("xy"), Sexpr::float(p.x), Sexpr::float(p.y)])
}

fn at(p: Point, rotation: Option<f64>) -> Sexpr {
    let mut node = ListBuilder::node("at");
    node.push(p.x).push(p.y);
    if let Some(rotation) = rotation {
        node.push(rotation);
    }
    node.build()
}

fn uuid_node() -> Sexpr {
    kv("uuid", Sexpr::string(crate::new_uuid()))
}

fn check_finite(p: Point) -> Result<()> {
    if p.x.is_finite() && p.y.is_finite() {
        Ok(())
    } else {
        Err(Error::InvalidInput(format!("non-finite coordinate ({}, {})", p.x, p.y)))
    }
}

/// `(wire (pts ...) (stroke ...) (uuid ...))` through `points`.
pub fn wire_node(points: &[Point], stroke: &Stroke) -> Sexpr {
    let mut pts = ListBuilder::node("pts");
    pts.extend(points.iter().copied().map(xy));

    let mut stroke_node = ListBuilder::node("stroke");
    stroke_node
        .push(kv("width", stroke.width))
        .push(kv("type", Sexpr::symbol(&stroke.kind)));

    let mut wire = ListBuilder::node("wire");
    wire.push(pts.build()).push(stroke_node.build()).push(uuid_node());
    wire.build()
}

pub fn label_node(text: &str, position: Point, kind: LabelKind, rotation: f64) -> Sexpr {
    let mut font = ListBuilder::node("font");
    font.push(Sexpr::list(vec![
        Sexpr::symbol("size"),
        Sexpr::float(1.27),
        Sexpr::float(1.27),
    ]));
    let mut effects = ListBuilder::node("effects");
    effects.push(font.build()).push(Sexpr::list(vec![
        Sexpr::symbol("justify"),
        Sexpr::symbol("left"),
        Sexpr::symbol("bottom"),
    ]));

    let mut label = ListBuilder::node(kind.tag());
    label
        .push(Sexpr::string(text))
        .push_if(kind != LabelKind::Local, kv("shape", "passive"))
        .push(at(position, Some(rotation)))
        .push(kv("fields_autoplaced", true))
        .push(effects.build())
        .push(uuid_node());
    label.build()
}

/// Add a wire through `points`; a single segment needs two.
pub fn add_wire(doc: &mut Document, points: &[Point], stroke: &Stroke) -> Result<usize> {
    if points.len() < 2 {
        return Err(Error::InvalidInput(format!(
            "a wire needs at least 2 points, got {}",
            points.len()
        )));
    }
    points.iter().copied().try_for_each(check_finite)?;
    let idx = doc.insert_before_anchor(wire_node(points, stroke))?;
    log::info!("Added wire with {} points", points.len());
    Ok(idx)
}

pub fn add_label(
    doc: &mut Document,
    text: &str,
    position: Point,
    kind: LabelKind,
    rotation: f64,
) -> Result<usize> {
    if text.is_empty() {
        return Err(Error::InvalidInput("label text is empty".to_string()));
    }
    check_finite(position)?;
    let idx = doc.insert_before_anchor(label_node(text, position, kind, rotation))?;
    log::info!("Added {} '{text}' at ({}, {})", kind.tag(), position.x, position.y);
    Ok(idx)
}

pub fn add_junction(doc: &mut Document, position: Point, diameter: f64) -> Result<usize> {
    check_finite(position)?;
    let mut node = ListBuilder::node("junction");
    node.push(at(position, None))
        .push(kv("diameter", diameter))
        .push(Sexpr::list(vec![
            Sexpr::symbol("color"),
            Sexpr::int(0),
            Sexpr::int(0),
            Sexpr::int(0),
            Sexpr::int(0),
        ]))
        .push(uuid_node());
    doc.insert_before_anchor(node.build())
}

pub fn add_no_connect(doc: &mut Document, position: Point) -> Result<usize> {
    check_finite(position)?;
    let mut node = ListBuilder::node("no_connect");
    node.push(at(position, None)).push(uuid_node());
    doc.insert_before_anchor(node.build())
}

/// Path from `start` to `end` made of axis-aligned segments.
///
/// Aligned points are joined directly; otherwise the corner sits at
/// `(end.x, start.y)` when horizontal-first, else at `(start.x, end.y)`.
pub fn orthogonal_path(start: Point, end: Point, prefer_horizontal: bool) -> Vec<Point> {
    if start.x == end.x || start.y == end.y {
        return vec![start, end];
    }
    let corner = if prefer_horizontal {
        Point::new(end.x, start.y)
    } else {
        Point::new(start.x, end.y)
    };
    vec![start, corner, end]
}

/// Wire pin `from.1` of `from.0` to pin `to.1` of `to.0`. Returns the path drawn.
pub fn connect_pins(
    doc: &mut Document,
    resolver: &PinResolver,
    from: (&str, &str),
    to: (&str, &str),
    routing: Routing,
) -> Result<Vec<Point>> {
    let start = resolver.pin_location(doc, from.0, from.1)?;
    let end = resolver.pin_location(doc, to.0, to.1)?;
    let path = match routing {
        Routing::Direct => vec![start, end],
        Routing::OrthogonalHorizontal => orthogonal_path(start, end, true),
        Routing::OrthogonalVertical => orthogonal_path(start, end, false),
    };
    add_wire(doc, &path, &Stroke::default())?;
    log::info!("Connected {}/{} to {}/{} ({routing:?})", from.0, from.1, to.0, to.1);
    Ok(path)
}

/// Attach a pin to `net` with a short stub to the right and a label at its end.
///
/// Returns the label position.
pub fn connect_to_net(
    doc: &mut Document,
    resolver: &PinResolver,
    reference: &str,
    pin: &str,
    net: &str,
) -> Result<Point> {
    let pin_at = resolver.pin_location(doc, reference, pin)?;
    let stub_end = Point::new(pin_at.x + STUB_LENGTH, pin_at.y);
    add_wire(doc, &[pin_at, stub_end], &Stroke::default())?;
    add_label(doc, net, stub_end, LabelKind::Local, 0.0)?;
    log::info!("Connected {reference}/{pin} to net '{net}'");
    Ok(stub_end)
}
