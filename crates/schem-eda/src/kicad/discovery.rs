//! Locating `.kicad_sym` library files on disk.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use walkdir::WalkDir;

use crate::LibraryError;

/// Environment variables naming a symbol directory, in lookup order.
pub const SYMBOL_DIR_ENV_VARS: &[&str] = &[
    "KICAD9_SYMBOL_DIR",
    "KICAD8_SYMBOL_DIR",
    "KICAD7_SYMBOL_DIR",
    "KICAD_SYMBOL_DIR",
];

pub const LIBRARY_EXTENSION: &str = "kicad_sym";

/// Where symbol libraries are searched for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Searched before anything else, in order.
    pub symbol_dirs: Vec<PathBuf>,
    /// Honour [`SYMBOL_DIR_ENV_VARS`].
    pub use_environment: bool,
    /// Append the usual KiCad install and user directories for this platform.
    pub use_default_dirs: bool,
    /// Parsed libraries kept in memory.
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            symbol_dirs: Vec::new(),
            use_environment: true,
            use_default_dirs: true,
            cache_capacity: 16,
        }
    }
}

impl SearchConfig {
    /// Candidate directories: configured ones, then environment overrides,
    /// then platform defaults. Duplicates are dropped, order is kept.
    pub fn search_dirs_with<F>(&self, env: F) -> Vec<PathBuf>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut dirs = self.symbol_dirs.clone();
        if self.use_environment {
            dirs.extend(
                SYMBOL_DIR_ENV_VARS
                    .iter()
                    .filter_map(|&var| env(var))
                    .filter(|value| !value.is_empty())
                    .map(PathBuf::from),
            );
        }
        if self.use_default_dirs {
            dirs.extend(default_symbol_dirs());
        }

        let mut unique = Vec::with_capacity(dirs.len());
        for dir in dirs {
            if !unique.contains(&dir) {
                unique.push(dir);
            }
        }
        unique
    }

    pub fn search_dirs(&self) -> Vec<PathBuf> {
        self.search_dirs_with(|var| std::env::var(var).ok())
    }
}

/// Usual KiCad symbol directories for the current platform.
pub fn default_symbol_dirs() -> Vec<PathBuf> {
    let home = dirs::home_dir();
    let documents = dirs::document_dir();

    let mut paths = if cfg!(target_os = "macos") {
        vec![
            PathBuf::from("/Applications/KiCad/KiCad.app/Contents/SharedSupport/symbols"),
            PathBuf::from("/Library/Application Support/kicad/symbols"),
        ]
    } else if cfg!(target_os = "windows") {
        vec![
            PathBuf::from("C:\\Program Files\\KiCad\\9.0\\share\\kicad\\symbols"),
            PathBuf::from("C:\\Program Files\\KiCad\\8.0\\share\\kicad\\symbols"),
            PathBuf::from("C:\\Program Files\\KiCad\\share\\kicad\\symbols"),
            PathBuf::from("C:\\Program Files (x86)\\KiCad\\share\\kicad\\symbols"),
        ]
    } else {
        vec![
            PathBuf::from("/usr/share/kicad/symbols"),
            PathBuf::from("/usr/local/share/kicad/symbols"),
            PathBuf::from("/opt/kicad/share/kicad/symbols"),
        ]
    };

    if cfg!(target_os = "macos") {
        paths.extend(home.iter().map(|h| h.join("Library/Application Support/kicad/symbols")));
    } else if cfg!(target_os = "windows") {
        paths.extend(dirs::config_dir().map(|c| c.join("kicad\\symbols")));
    } else {
        paths.extend(home.iter().flat_map(|h| {
            ["9.0", "8.0"]
                .into_iter()
                .map(move |version| h.join(".local/share/kicad").join(version).join("symbols"))
                .chain(std::iter::once(h.join(".local/share/kicad/symbols")))
        }));
    }
    paths.extend(documents.map(|d| d.join("KiCad").join("9.0").join("3rdparty").join("symbols")));
    paths
}

/// A library file found in one of the search directories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LibraryEntry {
    pub name: String,
    pub path: PathBuf,
}

/// Resolves library names to files, remembering each answer.
#[derive(Debug)]
pub struct LibraryLocator {
    dirs: Vec<PathBuf>,
    located: Mutex<HashMap<String, PathBuf>>,
}

impl LibraryLocator {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self {
            dirs,
            located: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &SearchConfig) -> Self {
        Self::new(config.search_dirs())
    }

    pub fn search_dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// Path of `<library>.kicad_sym` in the first search directory holding it.
    pub fn locate(&self, library: &str) -> Result<PathBuf, LibraryError> {
        let mut located = self.located.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(path) = located.get(library) {
            if path.is_file() {
                return Ok(path.clone());
            }
            tracing::debug!("Library {library} vanished from {}", path.display());
            located.remove(library);
        }

        let file_name = format!("{library}.{LIBRARY_EXTENSION}");
        let mut attempted = Vec::with_capacity(self.dirs.len());
        for dir in &self.dirs {
            let candidate = dir.join(&file_name);
            if candidate.is_file() {
                tracing::debug!("Located library {library} at {}", candidate.display());
                located.insert(library.to_string(), candidate.clone());
                return Ok(candidate);
            }
            attempted.push(candidate);
        }

        Err(LibraryError::LibraryNotFound {
            library: library.to_string(),
            attempted,
        })
    }

    /// Every library across the search directories, sorted by name. When a
    /// name appears in several directories the first directory wins.
    pub fn available_libraries(&self) -> Vec<LibraryEntry> {
        let mut found: HashMap<String, PathBuf> = HashMap::new();
        for dir in self.dirs.iter().filter(|d| d.is_dir()) {
            for entry in WalkDir::new(dir)
                .min_depth(1)
                .max_depth(1)
                .into_iter()
                .filter_map(Result::ok)
            {
                let path = entry.path();
                if !entry.file_type().is_file() || !is_library_file(path) {
                    continue;
                }
                let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().into_owned())
                else {
                    continue;
                };
                found.entry(stem).or_insert_with(|| path.to_path_buf());
            }
        }

        let mut entries: Vec<LibraryEntry> = found
            .into_iter()
            .map(|(name, path)| LibraryEntry { name, path })
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        entries
    }

    /// Drop remembered locations.
    pub fn forget(&self) {
        self.located
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

fn is_library_file(path: &Path) -> bool {
    path.extension().and_then(|e| e.to_str()) == Some(LIBRARY_EXTENSION)
}
