//! Editing and connectivity analysis for KiCad `.kicad_sch` schematics.
//!
//! A [`Document`] is a parsed schematic that can be mutated in memory and
//! written back with every untouched section preserved byte-for-byte. On top
//! of it:
//!
//! * [`geometry`] resolves where each pin of a placed symbol ends up.
//! * [`inject`] pulls symbol definitions out of `.kicad_sym` libraries and
//!   parks off-canvas template instances for them.
//! * [`components`] clones templates into real parts and edits them.
//! * [`wiring`] adds wires, labels, junctions and no-connect flags.
//! * [`netlist`] derives nets from geometric coincidence, since the file
//!   stores no explicit connectivity.
//! * [`inspect`] produces serialisable reports of all of the above.

pub mod components;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod inject;
pub mod inspect;
pub mod natural;
pub mod netlist;
pub mod position;
pub mod schematic;
mod spatial;
pub mod wiring;

pub use config::Config;
pub use document::{Document, DocumentId};
pub use error::{Error, NotFound, Result};
pub use geometry::PinResolver;
pub use inject::{SymbolInjector, TemplateSource};
pub use position::{MirrorAxis, Point};
pub use schematic::{Junction, LabelKind, NetLabel, NoConnect, SymbolInstance, Wire};

/// Reference prefix marking off-canvas template instances.
pub const TEMPLATE_PREFIX: &str = "_TEMPLATE";

/// Fresh uuid in the hyphenated form eeschema writes.
pub(crate) fn new_uuid() -> String {
    uuid::Uuid::new_v4().to_string()
}
