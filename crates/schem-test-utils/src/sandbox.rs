//! Throwaway project directory for schematic and library tests.
//!
//! Everything lives under an `assert_fs::TempDir` and is cleaned up on drop.
//!
//! ```no_run
//! use schem_test_utils::{Sandbox, SchematicBuilder};
//! use schem_test_utils::fixtures::device_library;
//!
//! let sb = Sandbox::new();
//! sb.write_library("Device", &device_library());
//! let sch = sb.write_schematic("board.kicad_sch", &SchematicBuilder::new().build());
//! assert!(sch.exists());
//! ```

use assert_fs::TempDir;
use assert_fs::fixture::PathChild;
use std::fs;
use std::path::{Path, PathBuf};

pub struct Sandbox {
    root: TempDir,
    symbol_dir: PathBuf,
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Sandbox {
    pub fn new() -> Self {
        let root = TempDir::new().expect("create sandbox TempDir");
        let symbol_dir = root.child("symbols").to_path_buf();
        fs::create_dir_all(&symbol_dir).expect("create symbols dir");
        Self { root, symbol_dir }
    }

    pub fn root_path(&self) -> &Path {
        self.root.path()
    }

    /// Directory that library files are written to.
    pub fn symbol_dir(&self) -> &Path {
        &self.symbol_dir
    }

    /// Write `<name>.kicad_sym` into [`Self::symbol_dir`].
    pub fn write_library(&self, name: &str, text: &str) -> PathBuf {
        let path = self.symbol_dir.join(format!("{name}.kicad_sym"));
        fs::write(&path, text).expect("write symbol library");
        path
    }

    /// Write a file relative to the sandbox root, creating parents.
    pub fn write_schematic(&self, relative: impl AsRef<Path>, text: &str) -> PathBuf {
        let path = self.root.path().join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create schematic dir");
        }
        fs::write(&path, text).expect("write schematic");
        path
    }

    pub fn read(&self, path: impl AsRef<Path>) -> String {
        fs::read_to_string(self.root.path().join(path)).expect("read sandbox file")
    }
}
