//! Shared fixtures for schematic tests.
//!
//! - [`fixtures`] builds `.kicad_sch` / `.kicad_sym` text
//! - [`sandbox`] lays those files out in a temporary directory

pub mod fixtures;
pub mod sandbox;

pub use fixtures::{Instance, SchematicBuilder};
pub use sandbox::Sandbox;
