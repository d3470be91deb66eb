//! Readers for the KiCad node shapes shared by schematics and symbol libraries.

pub mod props;
pub mod schematic;
pub mod symbol;

pub use props::{atom_prop, child_list, number_prop, string_prop, sym_prop, yes_no_prop};
pub use schematic::{
    schematic_at, schematic_lib_id, schematic_mirror, schematic_properties,
    set_schematic_property,
};
