//! A parsed `.kicad_sch` file that can be edited and written back.
//!
//! Top-level children of `(kicad_sch ...)` are called sections and are
//! addressed by their position in [`Document::sections`]. New sections are
//! always inserted right before `(sheet_instances ...)`, which is how
//! eeschema orders its output.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use atomicwrites::{AtomicFile, OverwriteBehavior};
use schem_sexpr::formatter::format_compact;
use schem_sexpr::lossless::render_preserving;
use schem_sexpr::{ListBuilder, Sexpr, kv, parse_all};

use crate::error::{Error, Result};

pub const ROOT_TAG: &str = "kicad_sch";
pub const ANCHOR_TAG: &str = "sheet_instances";
pub const LIB_SYMBOLS_TAG: &str = "lib_symbols";

static NEXT_REVISION: AtomicU64 = AtomicU64::new(1);

/// Identity used to key derived caches.
///
/// `content` is the hash of the text the document was parsed from.
/// `revision` is zero until `lib_symbols` is first edited, then takes a fresh
/// process-wide value on every edit, so two documents parsed from the same
/// text never share an id once either of them changes its definitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId {
    pub content: blake3::Hash,
    pub revision: u64,
}

#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    root: Sexpr,
    content_hash: blake3::Hash,
    revision: u64,
}

impl Document {
    /// Parse schematic text.
    pub fn parse(text: &str) -> Result<Self> {
        let mut roots = parse_all(text)?;
        if roots.len() != 1 {
            return Err(Error::Format(format!(
                "expected a single root expression, found {}",
                roots.len()
            )));
        }
        let root = roots.remove(0);
        if root.tag() != Some(ROOT_TAG) {
            return Err(Error::Format(format!("root is not a ({ROOT_TAG} ...) list")));
        }
        log::trace!("Parsed schematic with {} sections", root.as_list().map_or(0, |l| l.len() - 1));
        Ok(Self {
            source: text.to_string(),
            root,
            content_hash: blake3::hash(text.as_bytes()),
            revision: 0,
        })
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| Error::Format(format!("schematic is not valid UTF-8: {e}")))?;
        Self::parse(text)
    }

    /// A blank A4 sheet with empty `lib_symbols` and the anchor in place.
    pub fn new_empty() -> Self {
        let mut page = ListBuilder::node("path");
        page.push(Sexpr::string("/")).push(kv("page", Sexpr::string("1")));
        let mut anchor = ListBuilder::node(ANCHOR_TAG);
        anchor.push(page.build());

        let mut root = ListBuilder::node(ROOT_TAG);
        root.push(kv("version", 20230121i64))
            .push(kv("generator", Sexpr::string("schem")))
            .push(kv("uuid", Sexpr::string(crate::new_uuid())))
            .push(kv("paper", Sexpr::string("A4")))
            .push(Sexpr::list(vec![Sexpr::symbol(LIB_SYMBOLS_TAG)]))
            .push(anchor.build());

        let root = root.build();
        let content_hash = blake3::hash(format_compact(&root).as_bytes());
        Self {
            source: String::new(),
            content_hash,
            root,
            revision: 0,
        }
    }

    pub fn id(&self) -> DocumentId {
        DocumentId {
            content: self.content_hash,
            revision: self.revision,
        }
    }

    pub fn root(&self) -> &Sexpr {
        &self.root
    }

    /// Top-level children, excluding the `kicad_sch` tag itself.
    pub fn sections(&self) -> &[Sexpr] {
        self.root.as_list().map(|items| &items[1..]).unwrap_or_default()
    }

    pub fn section(&self, index: usize) -> Option<&Sexpr> {
        self.sections().get(index)
    }

    /// Mutable access to one section.
    pub fn section_mut(&mut self, index: usize) -> Option<&mut Sexpr> {
        if self.section(index).is_some_and(|s| s.tag() == Some(LIB_SYMBOLS_TAG)) {
            self.touch_lib_symbols();
        }
        self.root.as_list_mut()?.get_mut(index + 1)
    }

    /// Index of the first section tagged `tag`.
    pub fn find_section(&self, tag: &str) -> Option<usize> {
        self.sections().iter().position(|s| s.tag() == Some(tag))
    }

    /// Every section tagged `tag`, in document order.
    pub fn find_sections<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = (usize, &'a Sexpr)> + 'a {
        self.sections()
            .iter()
            .enumerate()
            .filter(move |(_, s)| s.tag() == Some(tag))
    }

    /// Insert `node` immediately before `(sheet_instances ...)`.
    ///
    /// Returns the index the node now occupies.
    pub fn insert_before_anchor(&mut self, mut node: Sexpr) -> Result<usize> {
        let anchor = self.find_section(ANCHOR_TAG).ok_or_else(|| {
            Error::Structure(format!("schematic has no ({ANCHOR_TAG} ...) section"))
        })?;
        node.detach();
        log::debug!("Inserting ({}) at section {anchor}", node.tag().unwrap_or("?"));
        self.items_mut()?.insert(anchor + 1, node);
        Ok(anchor)
    }

    /// Remove and return the section at `index`.
    pub fn remove_section(&mut self, index: usize) -> Option<Sexpr> {
        if index >= self.sections().len() {
            return None;
        }
        let removed = self.root.as_list_mut()?.remove(index + 1);
        if removed.tag() == Some(LIB_SYMBOLS_TAG) {
            self.touch_lib_symbols();
        }
        Some(removed)
    }

    /// Children of `(lib_symbols ...)`, tag included.
    pub fn lib_symbols(&self) -> Result<&[Sexpr]> {
        self.find_section(LIB_SYMBOLS_TAG)
            .and_then(|idx| self.sections()[idx].as_list())
            .ok_or_else(missing_lib_symbols)
    }

    /// Mutable `lib_symbols`; bumps the document revision.
    pub fn lib_symbols_mut(&mut self) -> Result<&mut Vec<Sexpr>> {
        let idx = self.find_section(LIB_SYMBOLS_TAG).ok_or_else(missing_lib_symbols)?;
        self.touch_lib_symbols();
        self.items_mut()?[idx + 1]
            .as_list_mut()
            .ok_or_else(missing_lib_symbols)
    }

    fn touch_lib_symbols(&mut self) {
        self.revision = NEXT_REVISION.fetch_add(1, Ordering::Relaxed);
    }

    fn items_mut(&mut self) -> Result<&mut Vec<Sexpr>> {
        self.root
            .as_list_mut()
            .ok_or_else(|| Error::Format(format!("root is not a ({ROOT_TAG} ...) list")))
    }

    /// Text of the document with every untouched node copied verbatim.
    pub fn serialize(&self) -> String {
        if self.root.span.is_synthetic() {
            let mut out = render_preserving(&self.root, &self.source);
            out.push('\n');
            return out;
        }
        let span = self.root.span;
        let mut out = String::with_capacity(self.source.len() + 256);
        out.push_str(&self.source[..span.start]);
        out.push_str(&render_preserving(&self.root, &self.source));
        out.push_str(&self.source[span.end..]);
        out
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.serialize().into_bytes()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_bytes(&bytes)
    }

    /// Write the document through a temporary file and rename it into place.
    pub fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes();
        AtomicFile::new(path, OverwriteBehavior::AllowOverwrite)
            .write(|f| {
                f.write_all(&bytes)?;
                f.flush()
            })
            .map_err(|err| Error::Io {
                path: path.to_path_buf(),
                source: match err {
                    atomicwrites::Error::Internal(e) | atomicwrites::Error::User(e) => e,
                },
            })?;
        log::info!("Saved schematic {}", path.display());
        Ok(())
    }

    /// Load `path`, apply `edit`, and save only if `edit` succeeded.
    pub fn modify<T>(path: &Path, edit: impl FnOnce(&mut Document) -> Result<T>) -> Result<T> {
        let mut doc = Self::load(path)?;
        let out = edit(&mut doc)?;
        doc.save(path)?;
        Ok(out)
    }
}

fn missing_lib_symbols() -> Error {
    Error::Structure(format!("schematic has no ({LIB_SYMBOLS_TAG} ...) section"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use schem_sexpr::parse;

    const SMALL: &str = "(kicad_sch\n\t(version 20231120)\n\t(lib_symbols)\n\t(wire (pts (xy 0 0) (xy 10 0)))\n\t(sheet_instances\n\t\t(path \"/\" (page \"1\"))\n\t)\n)\n";

    #[test]
    fn unmodified_document_round_trips() {
        let doc = Document::parse(SMALL).unwrap();
        assert_eq!(doc.serialize(), SMALL);
        let with_comment = format!("; leading\n{SMALL}\n\n");
        assert_eq!(Document::parse(&with_comment).unwrap().serialize(), with_comment);
    }

    #[test]
    fn rejects_malformed_text() {
        for bad in ["", "(kicad_sch", "(kicad_sch) (extra)", "kicad_sch", "(kicad_pcb)"] {
            assert!(matches!(Document::parse(bad), Err(Error::Format(_))), "{bad:?}");
        }
        assert!(matches!(
            Document::from_bytes(&[0x28, 0xff, 0x29]),
            Err(Error::Format(_))
        ));
    }

    #[test]
    fn insert_goes_before_anchor() {
        let mut doc = Document::parse(SMALL).unwrap();
        let idx = doc
            .insert_before_anchor(parse("(junction (at 10 0))").unwrap())
            .unwrap();
        assert_eq!(idx, 3);
        assert_eq!(doc.sections()[idx].tag(), Some("junction"));
        assert_eq!(doc.sections()[idx + 1].tag(), Some(ANCHOR_TAG));

        let text = doc.serialize();
        assert!(text.contains("(xy 10 0)))\n\t(junction\n\t\t(at 10 0)\n\t)\n\t(sheet_instances"));
        assert!(text.starts_with("(kicad_sch\n\t(version 20231120)\n\t(lib_symbols)\n"));
    }

    #[test]
    fn insert_without_anchor_is_a_structure_error() {
        let mut doc = Document::parse("(kicad_sch (version 1))").unwrap();
        assert!(matches!(
            doc.insert_before_anchor(Sexpr::list(vec![Sexpr::symbol("junction")])),
            Err(Error::Structure(_))
        ));
        assert!(matches!(doc.lib_symbols(), Err(Error::Structure(_))));
    }

    #[test]
    fn lib_symbol_edits_bump_the_revision() {
        let mut doc = Document::parse(SMALL).unwrap();
        let before = doc.id();
        doc.insert_before_anchor(parse("(no_connect (at 1 1))").unwrap())
            .unwrap();
        assert_eq!(doc.id(), before);

        doc.lib_symbols_mut()
            .unwrap()
            .push(parse("(symbol \"Device:R\")").unwrap());
        assert_ne!(doc.id(), before);
        assert_eq!(doc.id().content, before.content);
        assert_eq!(doc.lib_symbols().unwrap().len(), 2);
    }

    #[test]
    fn remove_section_keeps_neighbours_verbatim() {
        let mut doc = Document::parse(SMALL).unwrap();
        let wire = doc.find_section("wire").unwrap();
        assert!(doc.remove_section(wire).is_some());
        assert_eq!(
            doc.serialize(),
            "(kicad_sch\n\t(version 20231120)\n\t(lib_symbols)\n\t(sheet_instances\n\t\t(path \"/\" (page \"1\"))\n\t)\n)\n"
        );
        assert!(doc.remove_section(99).is_none());
    }

    #[test]
    fn empty_document_has_anchor_and_lib_symbols() {
        let mut doc = Document::new_empty();
        assert!(doc.lib_symbols().is_ok());
        doc.insert_before_anchor(parse("(no_connect (at 1 1))").unwrap())
            .unwrap();
        let reparsed = Document::parse(&doc.serialize()).unwrap();
        assert_eq!(reparsed.find_sections("no_connect").count(), 1);
        assert_eq!(reparsed.find_section(ANCHOR_TAG), Some(6));
    }

    #[test]
    fn modify_leaves_file_untouched_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("board.kicad_sch");
        fs::write(&path, SMALL).unwrap();

        let result: Result<()> = Document::modify(&path, |doc| {
            doc.insert_before_anchor(parse("(junction (at 0 0))").unwrap())?;
            Err(Error::InvalidInput("abort".into()))
        });
        assert!(result.is_err());
        assert_eq!(fs::read_to_string(&path).unwrap(), SMALL);

        Document::modify(&path, |doc| {
            doc.insert_before_anchor(parse("(junction (at 0 0))").unwrap())
        })
        .unwrap();
        assert!(fs::read_to_string(&path).unwrap().contains("(junction"));
    }

    #[test]
    fn load_missing_file_is_io_error() {
        assert!(matches!(
            Document::load(Path::new("/no/such/file.kicad_sch")),
            Err(Error::Io { .. })
        ));
    }
}
