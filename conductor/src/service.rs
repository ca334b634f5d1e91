//! Request handling behind the HTTP and WebSocket surface.
//!
//! Life of a request:
//! 1. A handler extracts the raw query string or JSON body
//! 2. The service decodes it into conductor or object operations
//! 3. The conductor (or the edit session) validates and applies it
//! 4. The handler renders the resulting state, or the error as a 400/500
//!
//! Keeping this logic out of the handlers lets it be tested without sockets.

use std::sync::Arc;

use tokio::sync::Mutex as AsyncMutex;

use crate::edit::{EditError, EditSession, TransactionError};
use crate::object::{DomainObject, Identifier, IdentifierError, ObjectStore, PersistenceError};
use crate::time::{ConductorEvent, ConductorSnapshot, EventReceiver, TimeConductor};
use crate::url_state::{UrlStateError, UrlTimeState};

/// Shared state of one running server.
pub struct ConductorService {
    conductor: TimeConductor,
    store: Arc<dyn ObjectStore>,
    // One session at a time: each update is a complete transaction.
    session: AsyncMutex<EditSession>,
}

impl ConductorService {
    #[must_use]
    #[allow(clippy::disallowed_methods)] // Arc::clone
    pub fn new(conductor: TimeConductor, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            conductor,
            session: AsyncMutex::new(EditSession::new(Arc::clone(&store))),
            store,
        }
    }

    #[must_use]
    pub const fn conductor(&self) -> &TimeConductor {
        &self.conductor
    }

    #[must_use]
    pub fn snapshot(&self) -> ConductorSnapshot {
        self.conductor.snapshot()
    }

    /// The current state as URL query parameters.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Url` if the parameters cannot be encoded.
    pub fn url_query(&self) -> Result<String, ServiceError> {
        Ok(UrlTimeState::capture(&self.conductor).to_query_string()?)
    }

    /// Apply URL query parameters and return the resulting state.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Url` if the query is malformed or the conductor
    /// rejects it.
    pub fn apply_query(&self, query: &str) -> Result<ConductorSnapshot, ServiceError> {
        let state = UrlTimeState::parse(query)?;
        state.apply(&self.conductor)?;
        tracing::debug!(query, "applied time parameters");
        Ok(self.conductor.snapshot())
    }

    /// Subscribe to conductor events.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        self.conductor.subscribe()
    }

    /// Encode an event as a JSON text frame.
    ///
    /// # Errors
    ///
    /// Returns `ServiceError::Encode` if serialization fails.
    pub fn encode_event(event: &ConductorEvent) -> Result<String, ServiceError> {
        serde_json::to_string(event).map_err(ServiceError::Encode)
    }

    /// Load a persisted object by its key string (`namespace:key`).
    ///
    /// # Errors
    ///
    /// - `Identifier` if the key string is invalid
    /// - `Persistence` if the store fails
    pub async fn get_object(&self, key_string: &str) -> Result<Option<DomainObject>, ServiceError> {
        let identifier = Identifier::parse(key_string)?;
        Ok(self.store.get(&identifier).await?)
    }

    /// Replace an object's model, creating the object if needed.
    ///
    /// The change runs as one transaction of the edit session: on any failure
    /// the edit is discarded and the stored object is left as it was.
    ///
    /// # Errors
    ///
    /// - `Identifier` if the key string is invalid
    /// - `Persistence` if loading fails
    /// - `Edit` / `Transaction` if the edit cannot be applied or saved
    pub async fn update_object(
        &self,
        key_string: &str,
        model: serde_json::Value,
    ) -> Result<DomainObject, ServiceError> {
        let identifier = Identifier::parse(key_string)?;
        let mut session = self.session.lock().await;

        session.begin();
        let result = Self::edit_object(&mut session, &identifier, model).await;
        if let Err(e) = result {
            tracing::warn!(object = %identifier, error = %e, "object update failed");
            // The transaction is still open only if the commit was never reached.
            if session.transactions().is_active() {
                let _ = session.cancel();
            }
            session.discard();
            return Err(e);
        }

        self.store.get(&identifier).await?.ok_or_else(|| {
            ServiceError::Persistence(PersistenceError::Rejected(format!(
                "object {identifier} was not saved"
            )))
        })
    }

    async fn edit_object(
        session: &mut EditSession,
        identifier: &Identifier,
        model: serde_json::Value,
    ) -> Result<(), ServiceError> {
        if session.load(identifier).await?.is_none() {
            session.edit(DomainObject::new(identifier.clone(), serde_json::Value::Null));
        }
        session.mutate(identifier, move |current| *current = model)?;
        session.commit().await?;
        Ok(())
    }

    /// Delete an object. Deleting a missing object is not an error.
    ///
    /// # Errors
    ///
    /// - `Identifier` if the key string is invalid
    /// - `Persistence` if the store fails
    pub async fn delete_object(&self, key_string: &str) -> Result<(), ServiceError> {
        let identifier = Identifier::parse(key_string)?;
        self.store.delete(&identifier).await?;
        Ok(())
    }
}

/// Errors surfaced to HTTP clients.
#[derive(Debug)]
pub enum ServiceError {
    Url(UrlStateError),
    Identifier(IdentifierError),
    Edit(EditError),
    Transaction(TransactionError),
    Persistence(PersistenceError),
    Encode(serde_json::Error),
}

impl ServiceError {
    /// Whether the request itself was at fault (400) rather than the server
    /// (500).
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        matches!(self, Self::Url(_) | Self::Identifier(_))
    }
}

impl std::fmt::Display for ServiceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(e) => write!(f, "{e}"),
            Self::Identifier(e) => write!(f, "invalid identifier: {e}"),
            Self::Edit(e) => write!(f, "{e}"),
            Self::Transaction(e) => write!(f, "{e}"),
            Self::Persistence(e) => write!(f, "{e}"),
            Self::Encode(e) => write!(f, "failed to encode response: {e}"),
        }
    }
}

impl std::error::Error for ServiceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Url(e) => Some(e),
            Self::Identifier(e) => Some(e),
            Self::Edit(e) => Some(e),
            Self::Transaction(e) => Some(e),
            Self::Persistence(e) => Some(e),
            Self::Encode(e) => Some(e),
        }
    }
}

impl From<UrlStateError> for ServiceError {
    fn from(e: UrlStateError) -> Self {
        Self::Url(e)
    }
}

impl From<IdentifierError> for ServiceError {
    fn from(e: IdentifierError) -> Self {
        Self::Identifier(e)
    }
}

impl From<EditError> for ServiceError {
    fn from(e: EditError) -> Self {
        Self::Edit(e)
    }
}

impl From<TransactionError> for ServiceError {
    fn from(e: TransactionError) -> Self {
        Self::Transaction(e)
    }
}

impl From<PersistenceError> for ServiceError {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}
