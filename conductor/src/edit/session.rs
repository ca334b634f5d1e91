//! Edit session: editable-object cache plus transaction stack over a store.
//!
//! Objects are wrapped for editing through the cache. Mutations change the
//! wrapper's working copy, mark it dirty, and (inside a transaction) queue a
//! revert. Committing the outermost transaction runs the queued commit
//! actions and then flushes dirty objects to the store; cancelling it
//! reverts and discards the wrappers.

use std::sync::{Arc, Mutex, PoisonError};

use crate::edit::cache::{EditTarget, EditableObject, EditableObjectCache};
use crate::edit::transaction::{TransactionError, TransactionManager, TransactionScope};
use crate::object::{Identifier, ObjectStore, PersistenceError};

pub struct EditSession {
    store: Arc<dyn ObjectStore>,
    cache: EditableObjectCache,
    transactions: TransactionManager,
    // Objects whose cancelled edits were their only changes; cleaned after cancel.
    reverted: Arc<Mutex<Vec<Identifier>>>,
}

impl EditSession {
    #[must_use]
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            cache: EditableObjectCache::new(),
            transactions: TransactionManager::new(),
            reverted: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[must_use]
    pub const fn cache(&self) -> &EditableObjectCache {
        &self.cache
    }

    pub const fn transactions(&mut self) -> &mut TransactionManager {
        &mut self.transactions
    }

    /// Start a (possibly nested) transaction. Returns the new depth.
    pub fn begin(&mut self) -> usize {
        self.transactions.start_transaction()
    }

    /// Get the editable wrapper for an object.
    pub fn edit(&mut self, target: impl Into<EditTarget>) -> Arc<EditableObject> {
        self.cache.get_editable_object(target)
    }

    /// Load an object from the store and wrap it for editing.
    ///
    /// An object that is already being edited is returned from the cache
    /// without touching the store.
    ///
    /// # Errors
    ///
    /// Returns the store's error if loading fails.
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub async fn load(
        &mut self,
        identifier: &Identifier,
    ) -> Result<Option<Arc<EditableObject>>, PersistenceError> {
        if let Some(editable) = self.cache.get(identifier) {
            return Ok(Some(Arc::clone(editable)));
        }
        let Some(object) = self.store.get(identifier).await? else {
            return Ok(None);
        };
        Ok(Some(self.cache.get_editable_object(object)))
    }

    /// Apply `mutate` to the working copy of an object being edited and
    /// mark it dirty. Inside a transaction, cancelling restores the model and
    /// the dirty flag as they were before this call.
    ///
    /// # Errors
    ///
    /// Returns `EditError::NotEditing` if the object is not in the cache.
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn mutate<F>(&mut self, identifier: &Identifier, mutate: F) -> Result<(), EditError>
    where
        F: FnOnce(&mut serde_json::Value),
    {
        let editable = self
            .cache
            .get(identifier)
            .map(Arc::clone)
            .ok_or_else(|| EditError::NotEditing(identifier.clone()))?;

        if self.transactions.is_active() {
            let previous = editable.model();
            let was_dirty = self.cache.is_dirty(identifier);
            let target = Arc::clone(&editable);
            let reverted = Arc::clone(&self.reverted);
            let reverted_id = identifier.clone();
            self.transactions
                .add_to_transaction(
                    || async { Ok(()) },
                    move || {
                        target.update(|model| *model = previous);
                        if !was_dirty {
                            reverted
                                .lock()
                                .unwrap_or_else(PoisonError::into_inner)
                                .push(reverted_id);
                        }
                    },
                )
                .map_err(EditError::Transaction)?;
        }

        editable.update(mutate);
        self.cache.mark_dirty(identifier);
        Ok(())
    }

    /// Commit the top transaction.
    ///
    /// Closing the outermost transaction saves every dirty object and then
    /// empties the cache. If a commit action failed the flush is skipped and
    /// the dirty objects stay cached.
    ///
    /// # Errors
    ///
    /// - `NoActiveTransaction` if no transaction is active
    /// - `CommitFailed` if a queued commit action failed
    /// - `Persistence` if saving a dirty object failed
    pub async fn commit(&mut self) -> Result<TransactionScope, TransactionError> {
        let scope = self.transactions.commit().await?;
        if scope == TransactionScope::Outermost {
            let saved = self.cache.save_all(self.store.as_ref()).await?;
            tracing::debug!(saved, "edit session flushed");
            self.cache.clear();
        }
        Ok(scope)
    }

    /// Cancel the top transaction.
    ///
    /// Closing the outermost transaction discards every editable wrapper.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTransaction` if no transaction is active.
    pub fn cancel(&mut self) -> Result<TransactionScope, TransactionError> {
        let scope = self.transactions.cancel()?;
        let reverted =
            std::mem::take(&mut *self.reverted.lock().unwrap_or_else(PoisonError::into_inner));
        if scope == TransactionScope::Outermost {
            self.cache.clear();
        } else {
            for identifier in &reverted {
                self.cache.mark_clean(identifier);
            }
        }
        Ok(scope)
    }

    /// Drop every editable wrapper without saving.
    ///
    /// Used to recover after a failed commit, which leaves dirty objects
    /// cached.
    pub fn discard(&mut self) {
        self.cache.clear();
    }

    /// Save dirty objects outside of any transaction.
    ///
    /// # Errors
    ///
    /// Returns the first persistence failure; see
    /// [`EditableObjectCache::save_all`].
    pub async fn save(&mut self) -> Result<usize, PersistenceError> {
        self.cache.save_all(self.store.as_ref()).await
    }
}

/// Errors from edit session mutations.
#[derive(Debug)]
pub enum EditError {
    /// The object is not being edited.
    NotEditing(Identifier),
    /// The revert could not be queued.
    Transaction(TransactionError),
}

impl std::fmt::Display for EditError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotEditing(identifier) => write!(f, "object {identifier} is not being edited"),
            Self::Transaction(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for EditError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NotEditing(_) => None,
            Self::Transaction(e) => Some(e),
        }
    }
}
