//! Absolute pin positions of placed symbols.
//!
//! A pin's position in the definition is relative to the symbol origin. On
//! the sheet it becomes `position + M·R(rotation)·rel`, where rotation is
//! counter-clockwise in degrees and `M` is the optional mirror (`x` flips the
//! y component, `y` flips the x component) applied after the rotation.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

use glam::{DMat2, DVec2};
use lru::LruCache;
use schem_eda::{PinDefinition, PinTable, extract_pins};
use schem_sexpr::Sexpr;
use schem_sexpr::kicad::symbol::{bare_name, symbol_name};

use crate::document::{Document, DocumentId};
use crate::error::{Error, NotFound, Result};
use crate::position::{MirrorAxis, Point};
use crate::schematic::SymbolInstance;

/// Apply rotation, then mirroring, to a definition-relative offset.
pub fn transform(rel: DVec2, rotation: f64, mirror: Option<MirrorAxis>) -> DVec2 {
    if rotation == 0.0 && mirror.is_none() {
        return rel;
    }
    let mirror_mat = match mirror {
        Some(MirrorAxis::X) => DMat2::from_diagonal(DVec2::new(1.0, -1.0)),
        Some(MirrorAxis::Y) => DMat2::from_diagonal(DVec2::new(-1.0, 1.0)),
        None => DMat2::IDENTITY,
    };
    mirror_mat * rotation_matrix(rotation) * rel
}

/// Quarter turns get exact matrices so that grid positions stay on the grid.
fn rotation_matrix(degrees: f64) -> DMat2 {
    let turn = degrees.rem_euclid(360.0);
    if turn == 0.0 {
        DMat2::IDENTITY
    } else if turn == 90.0 {
        DMat2::from_cols(DVec2::new(0.0, 1.0), DVec2::new(-1.0, 0.0))
    } else if turn == 180.0 {
        DMat2::from_diagonal(DVec2::splat(-1.0))
    } else if turn == 270.0 {
        DMat2::from_cols(DVec2::new(0.0, -1.0), DVec2::new(1.0, 0.0))
    } else {
        DMat2::from_angle(degrees.to_radians())
    }
}

/// The `(symbol "<lib_id>" ...)` definition in `lib_symbols`.
///
/// An exact name match wins; otherwise an unqualified definition whose name
/// is the bare symbol name is accepted.
pub fn find_definition<'a>(doc: &'a Document, lib_id: &str) -> Option<&'a Sexpr> {
    let lib_symbols = doc.lib_symbols().ok()?;
    let named = |wanted: &str| {
        lib_symbols.iter().skip(1).find(|node| {
            node.as_list()
                .and_then(symbol_name)
                .is_some_and(|name| name == wanted)
        })
    };
    named(lib_id).or_else(|| named(bare_name(lib_id)))
}

/// Resolves and caches pin tables per (document identity, definition name).
pub struct PinResolver {
    cache: Mutex<LruCache<(DocumentId, String), Arc<PinTable>>>,
}

impl Default for PinResolver {
    fn default() -> Self {
        Self::new(64)
    }
}

impl PinResolver {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Pin table of the definition `lib_id` refers to.
    pub fn pins_for(&self, doc: &Document, lib_id: &str) -> Result<Arc<PinTable>> {
        let key = (doc.id(), lib_id.to_string());
        if let Some(hit) = self
            .cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            log::debug!("Pin table cache hit for {lib_id}");
            return Ok(hit.clone());
        }

        let definition = find_definition(doc, lib_id)
            .ok_or_else(|| NotFound::Definition(lib_id.to_string()))?;
        let table = Arc::new(extract_pins(definition));
        log::debug!("Extracted {} pins for {lib_id}", table.len());
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .put(key, table.clone());
        Ok(table)
    }

    /// Absolute position of `pin` on `instance`.
    pub fn resolve_pin_position(
        &self,
        doc: &Document,
        instance: &SymbolInstance,
        pin: &str,
    ) -> Result<Point> {
        let pins = self.pins_for(doc, &instance.lib_id)?;
        let definition = pins.get(pin).ok_or_else(|| NotFound::Pin {
            owner: instance.reference.clone(),
            pin: pin.to_string(),
            available: pins.numbers().map(str::to_string).collect(),
        })?;
        Ok(place_pin(instance, definition))
    }

    /// Every pin of `instance` with its absolute position, in definition order.
    pub fn resolve_all_pins(
        &self,
        doc: &Document,
        instance: &SymbolInstance,
    ) -> Result<Vec<(String, Point)>> {
        let pins = self.pins_for(doc, &instance.lib_id)?;
        Ok(pins
            .iter()
            .map(|pin| (pin.number.clone(), place_pin(instance, pin)))
            .collect())
    }

    /// [`Self::resolve_pin_position`] for the instance with `reference`.
    pub fn pin_location(&self, doc: &Document, reference: &str, pin: &str) -> Result<Point> {
        let instance = instance_or_not_found(doc, reference)?;
        self.resolve_pin_position(doc, &instance, pin)
    }

    pub fn all_pin_locations(&self, doc: &Document, reference: &str) -> Result<Vec<(String, Point)>> {
        let instance = instance_or_not_found(doc, reference)?;
        self.resolve_all_pins(doc, &instance)
    }

    /// Forget every table derived from `doc`'s content, whatever its revision.
    pub fn invalidate(&self, doc: &Document) {
        let content = doc.id().content;
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        let stale: Vec<(DocumentId, String)> = cache
            .iter()
            .filter(|((id, _), _)| id.content == content)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
    }

    pub fn clear(&self) {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn len(&self) -> usize {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Absolute position of `pin` on `instance`.
pub fn place_pin(instance: &SymbolInstance, pin: &PinDefinition) -> Point {
    let origin = DVec2::from(instance.position);
    let rel = DVec2::new(pin.at.x, pin.at.y);
    (origin + transform(rel, instance.rotation, instance.mirror)).into()
}

pub(crate) fn instance_or_not_found(doc: &Document, reference: &str) -> Result<SymbolInstance> {
    doc.instance(reference)
        .ok_or_else(|| Error::from(NotFound::Instance(reference.to_string())))
}
