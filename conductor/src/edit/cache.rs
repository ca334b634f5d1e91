//! Editable-object cache.
//!
//! During an edit session every object being edited is represented by one
//! editable wrapper holding a working copy of its model. The cache hands out
//! that wrapper for every request concerning the same identifier, so all
//! editors see the same working copy.
//!
//! # Invariants
//!
//! - At most one `EditableObject` exists in the cache per identifier
//! - A wrapper's working copy is built exactly once, when it is first cached
//! - Only cached objects can be marked dirty
//! - `save_all` saves each dirty object exactly once per call

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, PoisonError};

use crate::object::{DomainObject, Identifier, ObjectStore, PersistenceError};

/// Working copy of a domain object under edit.
#[derive(Debug)]
pub struct EditableObject {
    original: Arc<DomainObject>,
    working: Mutex<serde_json::Value>,
}

impl EditableObject {
    fn new(original: Arc<DomainObject>) -> Self {
        let working = Mutex::new(original.model.clone());
        Self { original, working }
    }

    #[must_use]
    pub fn identifier(&self) -> &Identifier {
        &self.original.identifier
    }

    /// The object as it was before editing started.
    #[must_use]
    pub const fn original(&self) -> &Arc<DomainObject> {
        &self.original
    }

    /// Copy of the working model.
    #[must_use]
    pub fn model(&self) -> serde_json::Value {
        self.working
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mutate the working model in place.
    pub fn update<F>(&self, mutate: F)
    where
        F: FnOnce(&mut serde_json::Value),
    {
        let mut working = self.working.lock().unwrap_or_else(PoisonError::into_inner);
        mutate(&mut working);
    }

    /// Discard working changes.
    pub fn reset(&self) {
        *self.working.lock().unwrap_or_else(PoisonError::into_inner) = self.original.model.clone();
    }

    /// The object as it would be persisted now.
    #[must_use]
    pub fn to_domain_object(&self) -> DomainObject {
        DomainObject::new(self.original.identifier.clone(), self.model())
    }
}

/// Something to obtain an editable wrapper for.
#[derive(Debug)]
pub enum EditTarget {
    /// A persisted object.
    Original(Arc<DomainObject>),
    /// An object that is already wrapped.
    Editable(Arc<EditableObject>),
}

impl From<Arc<DomainObject>> for EditTarget {
    fn from(object: Arc<DomainObject>) -> Self {
        Self::Original(object)
    }
}

impl From<DomainObject> for EditTarget {
    fn from(object: DomainObject) -> Self {
        Self::Original(Arc::new(object))
    }
}

impl From<Arc<EditableObject>> for EditTarget {
    fn from(object: Arc<EditableObject>) -> Self {
        Self::Editable(object)
    }
}

/// Cache of editable wrappers plus their dirty flags.
#[derive(Debug, Default)]
pub struct EditableObjectCache {
    editables: BTreeMap<Identifier, Arc<EditableObject>>,
    dirty: BTreeSet<Identifier>,
    constructed: u64,
}

impl EditableObjectCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the single editable wrapper for `target`.
    ///
    /// An already-wrapped target is returned as-is unless the cache holds a
    /// wrapper for the same identifier, in which case the cached wrapper wins.
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn get_editable_object(&mut self, target: impl Into<EditTarget>) -> Arc<EditableObject> {
        match target.into() {
            EditTarget::Editable(editable) => Arc::clone(
                self.editables
                    .entry(editable.identifier().clone())
                    .or_insert(editable),
            ),
            EditTarget::Original(original) => {
                let constructed = &mut self.constructed;
                Arc::clone(
                    self.editables
                        .entry(original.identifier.clone())
                        .or_insert_with(|| {
                            *constructed += 1;
                            tracing::debug!(
                                identifier = %original.identifier,
                                "wrapping object for editing"
                            );
                            Arc::new(EditableObject::new(original))
                        }),
                )
            }
        }
    }

    /// The cached wrapper for `identifier`, if any.
    #[must_use]
    pub fn get(&self, identifier: &Identifier) -> Option<&Arc<EditableObject>> {
        self.editables.get(identifier)
    }

    /// Number of wrappers this cache has built.
    #[must_use]
    pub const fn constructed_count(&self) -> u64 {
        self.constructed
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.editables.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.editables.is_empty()
    }

    /// Flag a cached object as needing a save.
    ///
    /// Returns `false` (and flags nothing) if the object is not cached.
    pub fn mark_dirty(&mut self, identifier: &Identifier) -> bool {
        if !self.editables.contains_key(identifier) {
            tracing::warn!(%identifier, "cannot mark uncached object dirty");
            return false;
        }
        self.dirty.insert(identifier.clone());
        true
    }

    /// Clear an object's dirty flag.
    pub fn mark_clean(&mut self, identifier: &Identifier) {
        self.dirty.remove(identifier);
    }

    #[must_use]
    pub fn is_dirty(&self, identifier: &Identifier) -> bool {
        self.dirty.contains(identifier)
    }

    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    /// Save every dirty object and clear its flag.
    ///
    /// All dirty objects are attempted even if one fails; failed objects
    /// stay dirty. Returns the number of objects saved.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure after all saves were attempted.
    pub async fn save_all(&mut self, store: &dyn ObjectStore) -> Result<usize, PersistenceError> {
        let dirty: Vec<Identifier> = self.dirty.iter().cloned().collect();
        let mut saved = 0;
        let mut first_error = None;

        for identifier in dirty {
            let Some(editable) = self.editables.get(&identifier) else {
                self.dirty.remove(&identifier);
                continue;
            };
            let object = editable.to_domain_object();
            match store.save(&object).await {
                Ok(()) => {
                    self.dirty.remove(&identifier);
                    saved += 1;
                }
                Err(e) => {
                    tracing::warn!(%identifier, error = %e, "failed to save object");
                    first_error.get_or_insert(e);
                }
            }
        }

        first_error.map_or(Ok(saved), Err)
    }

    /// Drop every wrapper and flag.
    pub fn clear(&mut self) {
        self.editables.clear();
        self.dirty.clear();
    }
}
