//! Bringing library symbols into a schematic.
//!
//! A component kind resolves to a template instance in one of three ways:
//!
//! 1. a well-known kind (`R`, `LED`, `OpAmp`, ...) whose fixed `_TEMPLATE_*`
//!    instance is already on the sheet,
//! 2. a template created by an earlier injection of the same `library:symbol`,
//! 3. a fresh injection: locate the library file, extract and flatten the
//!    definition, copy it into `lib_symbols` and park an off-canvas,
//!    do-not-populate instance that components are cloned from.

use std::path::PathBuf;
use std::sync::Arc;

use schem_eda::{LibraryCache, LibraryLocator, SymbolDefinition};
use schem_sexpr::kicad::symbol::{rename_symbol, symbol_name};
use schem_sexpr::{ListBuilder, Sexpr, kv};
use serde::Serialize;

use crate::config::{Config, TemplateConfig};
use crate::document::Document;
use crate::error::{Error, Result};

/// Component kinds with a fixed template reference.
pub const STATIC_TEMPLATES: &[(&str, &str)] = &[
    ("R", "_TEMPLATE_R"),
    ("C", "_TEMPLATE_C"),
    ("L", "_TEMPLATE_L"),
    ("Y", "_TEMPLATE_Y"),
    ("Crystal", "_TEMPLATE_Y"),
    ("D", "_TEMPLATE_D"),
    ("LED", "_TEMPLATE_LED"),
    ("Q", "_TEMPLATE_Q_NPN"),
    ("Q_NPN", "_TEMPLATE_Q_NPN"),
    ("Q_NMOS", "_TEMPLATE_Q_NMOS"),
    ("MOSFET", "_TEMPLATE_Q_NMOS"),
    ("U", "_TEMPLATE_U_OPAMP"),
    ("OpAmp", "_TEMPLATE_U_OPAMP"),
    ("IC", "_TEMPLATE_U_OPAMP"),
    ("U_REG", "_TEMPLATE_U_REG"),
    ("Regulator", "_TEMPLATE_U_REG"),
    ("J", "_TEMPLATE_J2"),
    ("J2", "_TEMPLATE_J2"),
    ("J4", "_TEMPLATE_J4"),
    ("Conn_2", "_TEMPLATE_J2"),
    ("Conn_4", "_TEMPLATE_J4"),
    ("SW", "_TEMPLATE_SW"),
    ("Button", "_TEMPLATE_SW"),
    ("Switch", "_TEMPLATE_SW"),
];

pub fn static_template_for(kind: &str) -> Option<&'static str> {
    STATIC_TEMPLATES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, reference)| *reference)
}

/// How [`SymbolInjector::get_or_create_template`] found its template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateSource {
    Static,
    Cached,
    Injected,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Template {
    pub reference: String,
    pub source: TemplateSource,
}

/// Resolves component kinds to template instances, loading library symbols
/// on demand.
pub struct SymbolInjector {
    locator: LibraryLocator,
    libraries: LibraryCache,
    templates: TemplateConfig,
}

impl SymbolInjector {
    pub fn new(locator: LibraryLocator, libraries: LibraryCache, templates: TemplateConfig) -> Self {
        Self {
            locator,
            libraries,
            templates,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            LibraryLocator::from_config(&config.library),
            LibraryCache::new(config.library.cache_capacity),
            config.templates.clone(),
        )
    }

    pub fn locator(&self) -> &LibraryLocator {
        &self.locator
    }

    pub fn libraries(&self) -> &LibraryCache {
        &self.libraries
    }

    /// `_TEMPLATE_<lib>_<sym>` with `-` and `.` replaced by `_`.
    pub fn template_reference(&self, library: &str, symbol: &str) -> String {
        let clean = |s: &str| s.replace(['-', '.'], "_");
        format!("{}_{}_{}", self.templates.prefix, clean(library), clean(symbol))
    }

    /// Template instance to clone a `kind` component from, injecting the
    /// library symbol `library:kind` when nothing suitable is on the sheet.
    ///
    /// `library` defaults to the configured default library.
    pub fn get_or_create_template(
        &self,
        doc: &mut Document,
        kind: &str,
        library: Option<&str>,
    ) -> Result<Template> {
        let instances = doc.symbol_instances();

        if let Some(reference) = static_template_for(kind)
            && instances.iter().any(|inst| inst.reference == reference)
        {
            log::debug!("Using static template {reference} for {kind}");
            return Ok(Template {
                reference: reference.to_string(),
                source: TemplateSource::Static,
            });
        }

        let library = library.unwrap_or(&self.templates.default_library);
        let lib_id = format!("{library}:{kind}");
        let derived = self.template_reference(library, kind);
        if let Some(existing) = instances.iter().find(|inst| {
            inst.reference.starts_with(&self.templates.prefix)
                && (inst.lib_id == lib_id || inst.reference == derived)
        }) {
            log::debug!("Reusing template {} for {lib_id}", existing.reference);
            return Ok(Template {
                reference: existing.reference.clone(),
                source: TemplateSource::Cached,
            });
        }

        let reference = self.load_symbol(doc, library, kind)?;
        Ok(Template {
            reference,
            source: TemplateSource::Injected,
        })
    }

    /// Inject `library:symbol` and create its template instance.
    pub fn load_symbol(&self, doc: &mut Document, library: &str, symbol: &str) -> Result<String> {
        let definition = self.definition(library, symbol)?;
        self.inject_definition(doc, library, symbol, &definition)?;
        let reference = self.create_template_instance(doc, library, symbol, &definition)?;
        log::info!("Loaded {library}:{symbol} as template {reference}");
        Ok(reference)
    }

    /// Flattened library definition of `library:symbol`.
    pub fn definition(&self, library: &str, symbol: &str) -> Result<Arc<Sexpr>> {
        let path = self.library_path(library)?;
        Ok(self.libraries.definition(&path, symbol)?)
    }

    pub fn library_path(&self, library: &str) -> Result<PathBuf> {
        Ok(self.locator.locate(library)?)
    }

    /// Symbol names in `library`.
    pub fn symbols_in(&self, library: &str) -> Result<Vec<String>> {
        let path = self.library_path(library)?;
        Ok(self.libraries.symbol_names(&path)?)
    }

    /// Copy `definition` into `lib_symbols` as `library:symbol`.
    ///
    /// Returns `false` without touching the document when a definition named
    /// `library:symbol` or `symbol` is already present.
    pub fn inject_definition(
        &self,
        doc: &mut Document,
        library: &str,
        symbol: &str,
        definition: &Sexpr,
    ) -> Result<bool> {
        let lib_id = format!("{library}:{symbol}");
        let present = doc.lib_symbols()?.iter().skip(1).any(|node| {
            node.as_list()
                .and_then(symbol_name)
                .is_some_and(|name| name == lib_id || name == symbol)
        });
        if present {
            log::debug!("{lib_id} already in lib_symbols");
            return Ok(false);
        }

        let mut copy = definition.detached();
        let items = copy
            .as_list_mut()
            .ok_or_else(|| Error::Format(format!("definition of {lib_id} is not a list")))?;
        rename_symbol(items, &lib_id);
        doc.lib_symbols_mut()?.push(copy);
        log::info!("Injected {lib_id} into lib_symbols");
        Ok(true)
    }

    /// Park an off-canvas, do-not-populate instance of `library:symbol`.
    ///
    /// Idempotent: an existing instance with the derived reference is reused.
    pub fn create_template_instance(
        &self,
        doc: &mut Document,
        library: &str,
        symbol: &str,
        definition: &Sexpr,
    ) -> Result<String> {
        let reference = self.template_reference(library, symbol);
        let instances = doc.symbol_instances();
        if instances.iter().any(|inst| inst.reference == reference) {
            return Ok(reference);
        }
        let count = instances
            .iter()
            .filter(|inst| inst.reference.starts_with(&self.templates.prefix))
            .count();

        let defaults = SymbolDefinition::from_sexpr(definition);
        let default_prop = |key: &str, fallback: &str| {
            defaults
                .as_ref()
                .and_then(|d| d.property(key))
                .unwrap_or(fallback)
                .to_string()
        };

        let (x, origin_y) = self.templates.origin;
        let y = origin_y - self.templates.spacing * count as f64;
        let node = TemplateInstance {
            lib_id: format!("{library}:{symbol}"),
            reference: reference.clone(),
            value: symbol.to_string(),
            footprint: default_prop("Footprint", ""),
            datasheet: default_prop("Datasheet", "~"),
            x,
            y,
        }
        .to_sexpr();
        doc.insert_before_anchor(node)?;
        log::info!("Created template instance {reference} at ({x}, {y})");
        Ok(reference)
    }
}

struct TemplateInstance {
    lib_id: String,
    reference: String,
    value: String,
    footprint: String,
    datasheet: String,
    x: f64,
    y: f64,
}

impl TemplateInstance {
    fn to_sexpr(&self) -> Sexpr {
        let at = |x: f64, y: f64| Sexpr::list(vec![
            Sexpr::symbol("at"),
            Sexpr::float(x),
            Sexpr::float(y),
            Sexpr::int(0),
        ]);

        let mut symbol = ListBuilder::node("symbol");
        symbol
            .push(kv("lib_id", Sexpr::string(&self.lib_id)))
            .push(at(self.x, self.y))
            .push(kv("unit", 1i64))
            .push(kv("in_bom", false))
            .push(kv("on_board", false))
            .push(kv("dnp", true))
            .push(kv("uuid", Sexpr::string(crate::new_uuid())))
            .push(property("Reference", &self.reference, at(self.x, self.y - 2.54), false))
            .push(property("Value", &self.value, at(self.x, self.y + 2.54), false))
            .push(property("Footprint", &self.footprint, at(self.x, self.y), true))
            .push(property("Datasheet", &self.datasheet, at(self.x, self.y), true));
        symbol.build()
    }
}

pub(crate) fn property(name: &str, value: &str, at: Sexpr, hidden: bool) -> Sexpr {
    let size = Sexpr::list(vec![
        Sexpr::symbol("size"),
        Sexpr::float(1.27),
        Sexpr::float(1.27),
    ]);
    let mut effects = ListBuilder::node("effects");
    effects
        .push(Sexpr::list(vec![Sexpr::symbol("font"), size]))
        .push_if(hidden, kv("hide", true));

    let mut prop = ListBuilder::node("property");
    prop.push(Sexpr::string(name))
        .push(Sexpr::string(value))
        .push(at)
        .push(effects.build());
    prop.build()
}
