use schem_sexpr::kicad::symbol::{
    bare_name, find_symbol_by_bare_name, kicad_symbol_lib_items, rename_symbol, symbol_extends,
    symbol_name, symbol_names,
};
use schem_sexpr::{Sexpr, parse};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::symbol::SymbolDefinition;
use crate::LibraryError;

/// A parsed `.kicad_sym` file.
#[derive(Debug, Clone)]
pub struct SymbolLibrary {
    path: Option<PathBuf>,
    root: Sexpr,
}

impl SymbolLibrary {
    /// Parse a KiCad symbol library from a string
    pub fn from_string(content: &str) -> Result<Self, LibraryError> {
        Self::from_parts(content, None)
    }

    /// Parse a KiCad symbol library from a file
    pub fn from_file(path: &Path) -> Result<Self, LibraryError> {
        let content = fs::read_to_string(path).map_err(|source| LibraryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_parts(&content, Some(path.to_path_buf()))
    }

    fn from_parts(content: &str, path: Option<PathBuf>) -> Result<Self, LibraryError> {
        let root = parse(content).map_err(|source| LibraryError::Parse {
            path: path.clone(),
            source,
        })?;
        if kicad_symbol_lib_items(&root).is_none() {
            return Err(LibraryError::Format {
                path,
                message: "expected a (kicad_symbol_lib ...) root".to_string(),
            });
        }
        // Spans are meaningless once the source text is dropped.
        let root = root.detached();
        Ok(Self { path, root })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn items(&self) -> &[Sexpr] {
        kicad_symbol_lib_items(&self.root).unwrap_or_default()
    }

    /// Get the names of all symbols in the library
    pub fn symbol_names(&self) -> Vec<String> {
        symbol_names(self.items())
    }

    /// The `(symbol ...)` node for `name` with any `extends` chain flattened.
    ///
    /// `name` may be bare (`R`) or library qualified (`Device:R`); entries in
    /// the file may be written either way too.
    pub fn definition(&self, name: &str) -> Result<Sexpr, LibraryError> {
        let items = find_symbol_by_bare_name(self.items(), name)
            .ok_or_else(|| self.symbol_not_found(name))?;
        self.flatten(items, &mut HashSet::new())
    }

    /// Parsed view of [`Self::definition`].
    pub fn symbol(&self, name: &str) -> Result<SymbolDefinition, LibraryError> {
        let node = self.definition(name)?;
        SymbolDefinition::from_sexpr(&node).ok_or_else(|| self.symbol_not_found(name))
    }

    /// Derived symbols carry no graphics or pins of their own: start from the
    /// flattened parent, take over its unit blocks under the child's name and
    /// let the child's properties replace the parent's.
    fn flatten(&self, items: &[Sexpr], seen: &mut HashSet<String>) -> Result<Sexpr, LibraryError> {
        let name = symbol_name(items).unwrap_or_default();
        let Some(parent_name) = symbol_extends(items) else {
            return Ok(Sexpr::list(items.to_vec()));
        };
        if !seen.insert(bare_name(&name).to_string()) {
            return Err(LibraryError::ExtendsCycle { symbol: name });
        }
        let parent = find_symbol_by_bare_name(self.items(), &parent_name).ok_or_else(|| {
            LibraryError::MissingParent {
                symbol: name.clone(),
                parent: parent_name.clone(),
            }
        })?;

        tracing::debug!("Flattening {name} onto parent {parent_name}");
        let mut merged = self.flatten(parent, seen)?;
        let Some(merged_items) = merged.as_list_mut() else {
            return Ok(merged);
        };
        rename_symbol(merged_items, &name);

        let child_properties: Vec<&Sexpr> = items
            .iter()
            .skip(2)
            .filter(|node| node.tag() == Some("property"))
            .collect();
        let overridden: HashSet<&str> = items
            .iter()
            .skip(2)
            .filter(|node| node.tag() == Some("property"))
            .filter_map(|node| node.as_list()?.get(1)?.as_atom())
            .collect();
        merged_items.retain(|node| {
            node.tag() != Some("property")
                || !node
                    .as_list()
                    .and_then(|l| l.get(1))
                    .and_then(Sexpr::as_atom)
                    .is_some_and(|key| overridden.contains(key))
        });

        let insert_at = merged_items
            .iter()
            .enumerate()
            .skip(2)
            .find_map(|(idx, node)| (node.tag() == Some("symbol")).then_some(idx))
            .unwrap_or(merged_items.len());
        merged_items.splice(
            insert_at..insert_at,
            child_properties.into_iter().cloned(),
        );
        Ok(merged)
    }

    fn symbol_not_found(&self, name: &str) -> LibraryError {
        let library = self
            .path
            .as_deref()
            .and_then(Path::file_stem)
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        LibraryError::SymbolNotFound {
            library,
            symbol: name.to_string(),
            path: self.path.clone().unwrap_or_default(),
        }
    }
}
