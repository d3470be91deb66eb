//! KiCad symbol definitions and symbol library access.
//!
//! - [`kicad::symbol`] reads pins and properties out of a `(symbol ...)` definition
//! - [`kicad::symbol_library`] parses `.kicad_sym` files and flattens `extends`
//! - [`kicad::discovery`] finds library files on disk
//! - [`kicad::cache`] keeps parsed libraries around between lookups

pub mod kicad;

use std::path::PathBuf;

pub use kicad::cache::LibraryCache;
pub use kicad::defaults::default_symbol_for;
pub use kicad::discovery::{LibraryEntry, LibraryLocator, SearchConfig};
pub use kicad::symbol::{
    ElectricalType, PinAt, PinDefinition, PinTable, SymbolDefinition, extract_pins,
};
pub use kicad::symbol_library::SymbolLibrary;

/// Errors raised while finding or reading symbol libraries.
#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("library '{library}' not found (tried {})", display_paths(.attempted))]
    LibraryNotFound {
        library: String,
        attempted: Vec<PathBuf>,
    },

    #[error("symbol '{symbol}' not found in library '{library}' ({})", .path.display())]
    SymbolNotFound {
        library: String,
        symbol: String,
        path: PathBuf,
    },

    #[error("symbol '{symbol}' extends unknown parent '{parent}'")]
    MissingParent { symbol: String, parent: String },

    #[error("symbol '{symbol}' has a cyclic extends chain")]
    ExtendsCycle { symbol: String },

    #[error("failed to parse {}: {source}", display_opt(.path))]
    Parse {
        path: Option<PathBuf>,
        #[source]
        source: schem_sexpr::ParseError,
    },

    #[error("invalid symbol library {}: {message}", display_opt(.path))]
    Format {
        path: Option<PathBuf>,
        message: String,
    },

    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

fn display_paths(paths: &[PathBuf]) -> String {
    if paths.is_empty() {
        return "no search directories".to_string();
    }
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "<memory>".to_string())
}
