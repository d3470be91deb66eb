//! Parsed-library cache keyed by file identity.

use lru::LruCache;
use schem_sexpr::Sexpr;
use std::collections::HashMap;
use std::fs;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

use super::symbol_library::SymbolLibrary;
use crate::LibraryError;

/// Modification time and size; a change in either invalidates the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileStamp {
    modified: Option<SystemTime>,
    len: u64,
}

impl FileStamp {
    fn of(path: &Path) -> Result<Self, LibraryError> {
        let meta = fs::metadata(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            modified: meta.modified().ok(),
            len: meta.len(),
        })
    }
}

struct CachedLibrary {
    stamp: FileStamp,
    library: Arc<SymbolLibrary>,
    definitions: HashMap<String, Arc<Sexpr>>,
}

/// Bounded cache of parsed `.kicad_sym` files and the definitions pulled
/// out of them.
pub struct LibraryCache {
    entries: Mutex<LruCache<PathBuf, CachedLibrary>>,
}

impl Default for LibraryCache {
    fn default() -> Self {
        Self::new(16)
    }
}

impl LibraryCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    fn with_entry<T>(
        &self,
        path: &Path,
        f: impl FnOnce(&mut CachedLibrary) -> Result<T, LibraryError>,
    ) -> Result<T, LibraryError> {
        let stamp = FileStamp::of(path)?;
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);

        let fresh = entries.get(path).is_some_and(|entry| entry.stamp == stamp);
        if !fresh {
            tracing::debug!("Parsing symbol library {}", path.display());
            let library = SymbolLibrary::from_file(path)?;
            entries.put(
                path.to_path_buf(),
                CachedLibrary {
                    stamp,
                    library: Arc::new(library),
                    definitions: HashMap::new(),
                },
            );
        }

        match entries.get_mut(path) {
            Some(entry) => f(entry),
            None => Err(LibraryError::Format {
                path: Some(path.to_path_buf()),
                message: "library evicted while in use".to_string(),
            }),
        }
    }

    /// The parsed library at `path`, reparsed when the file changed.
    pub fn library(&self, path: &Path) -> Result<Arc<SymbolLibrary>, LibraryError> {
        self.with_entry(path, |entry| Ok(entry.library.clone()))
    }

    /// Flattened definition of `symbol` from the library at `path`.
    pub fn definition(&self, path: &Path, symbol: &str) -> Result<Arc<Sexpr>, LibraryError> {
        self.with_entry(path, |entry| {
            if let Some(found) = entry.definitions.get(symbol) {
                return Ok(found.clone());
            }
            let node = Arc::new(entry.library.definition(symbol)?);
            entry.definitions.insert(symbol.to_string(), node.clone());
            Ok(node)
        })
    }

    pub fn symbol_names(&self, path: &Path) -> Result<Vec<String>, LibraryError> {
        self.with_entry(path, |entry| Ok(entry.library.symbol_names()))
    }

    pub fn invalidate(&self, path: &Path) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop(path);
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
