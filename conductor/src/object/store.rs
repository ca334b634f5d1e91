//! Object persistence.
//!
//! An `ObjectStore` is the narrow interface to a persistence backend. Two
//! backends are provided: an in-memory map, and a file-backed store that
//! keeps every object in a single JSON document (the local storage
//! backend).
//!
//! # Invariants
//!
//! - `save` followed by `get` of the same identifier returns the saved model
//! - `FileObjectStore` never leaves a partially written document: writes go
//!   to a sibling temporary file that is renamed over the original

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;

use crate::object::identifier::Identifier;

/// A persisted object: its identity plus a JSON model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainObject {
    pub identifier: Identifier,
    pub model: serde_json::Value,
}

impl DomainObject {
    #[must_use]
    pub const fn new(identifier: Identifier, model: serde_json::Value) -> Self {
        Self { identifier, model }
    }
}

/// A persistence backend.
pub trait ObjectStore: Send + Sync {
    /// Load an object, `None` if it was never saved or has been deleted.
    fn get<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Option<DomainObject>, PersistenceError>>;

    /// Create or replace an object.
    fn save<'a>(&'a self, object: &'a DomainObject) -> BoxFuture<'a, Result<(), PersistenceError>>;

    /// Remove an object. Removing a missing object is not an error.
    fn delete<'a>(&'a self, identifier: &'a Identifier)
    -> BoxFuture<'a, Result<(), PersistenceError>>;
}

/// Store backed by a map in memory.
#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: RwLock<BTreeMap<Identifier, DomainObject>>,
}

impl InMemoryObjectStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.objects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn get<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Option<DomainObject>, PersistenceError>> {
        Box::pin(async move {
            let objects = self.objects.read().unwrap_or_else(PoisonError::into_inner);
            Ok(objects.get(identifier).cloned())
        })
    }

    fn save<'a>(&'a self, object: &'a DomainObject) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
            objects.insert(object.identifier.clone(), object.clone());
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            let mut objects = self.objects.write().unwrap_or_else(PoisonError::into_inner);
            objects.remove(identifier);
            Ok(())
        })
    }
}

/// File name of the document inside the store directory.
pub const OBJECTS_FILE_NAME: &str = "objects.json";

/// Store backed by a JSON document on disk, keyed by identifier key string.
///
/// Every mutation rewrites the whole document, which suits the small,
/// user-edited object sets this backend is meant for.
pub struct FileObjectStore {
    path: PathBuf,
    // Serializes read-modify-write cycles on the document.
    lock: AsyncMutex<()>,
}

impl FileObjectStore {
    /// Open a store in `directory`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `PersistenceError::Io` if the directory cannot be created.
    pub async fn open(directory: &Path) -> Result<Self, PersistenceError> {
        tokio::fs::create_dir_all(directory).await?;
        Ok(Self {
            path: directory.join(OBJECTS_FILE_NAME),
            lock: AsyncMutex::new(()),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_document(&self) -> Result<BTreeMap<String, DomainObject>, PersistenceError> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_document(
        &self,
        document: &BTreeMap<String, DomainObject>,
    ) -> Result<(), PersistenceError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let temp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, bytes).await?;
        tokio::fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }
}

impl ObjectStore for FileObjectStore {
    fn get<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<Option<DomainObject>, PersistenceError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut document = self.read_document().await?;
            Ok(document.remove(&identifier.to_key_string()))
        })
    }

    fn save<'a>(&'a self, object: &'a DomainObject) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut document = self.read_document().await?;
            document.insert(object.identifier.to_key_string(), object.clone());
            self.write_document(&document).await?;
            tracing::debug!(identifier = %object.identifier, "saved object");
            Ok(())
        })
    }

    fn delete<'a>(
        &'a self,
        identifier: &'a Identifier,
    ) -> BoxFuture<'a, Result<(), PersistenceError>> {
        Box::pin(async move {
            let _guard = self.lock.lock().await;
            let mut document = self.read_document().await?;
            if document.remove(&identifier.to_key_string()).is_some() {
                self.write_document(&document).await?;
            }
            Ok(())
        })
    }
}

/// Errors from a persistence backend.
#[derive(Debug)]
pub enum PersistenceError {
    /// File I/O failed.
    Io(std::io::Error),
    /// The stored document could not be encoded or decoded.
    Serialization(serde_json::Error),
    /// The backend refused the operation.
    Rejected(String),
}

impl std::fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "I/O error: {e}"),
            Self::Serialization(e) => write!(f, "serialization error: {e}"),
            Self::Rejected(message) => write!(f, "persistence rejected: {message}"),
        }
    }
}

impl std::error::Error for PersistenceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Serialization(e) => Some(e),
            Self::Rejected(_) => None,
        }
    }
}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e)
    }
}
