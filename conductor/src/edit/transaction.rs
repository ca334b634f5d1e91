//! Transaction stack for edit sessions.
//!
//! Mutations register a commit action (usually a persist call) and a cancel
//! action (usually a revert) with the active transaction. Transactions nest:
//! all frames share one ordered queue, and each frame owns the entries added
//! while it was on top.
//!
//! - Committing an inner frame hands its entries to the parent; nothing runs.
//! - Committing the outermost frame runs every commit action in insertion
//!   order.
//! - Cancelling any frame runs the cancel actions of that frame's own entries
//!   in reverse insertion order (newest first, like an undo log) and removes
//!   them; entries of outer frames stay queued.
//!
//! Commit is not atomic: every commit action runs even if an earlier one
//! fails, and actions that succeeded are not undone.

use std::future::Future;

use futures::future::BoxFuture;

use crate::object::PersistenceError;

/// Action run when the outermost transaction commits.
pub type CommitAction =
    Box<dyn FnOnce() -> BoxFuture<'static, Result<(), PersistenceError>> + Send>;

/// Action run when the owning transaction is cancelled.
pub type CancelAction = Box<dyn FnOnce() + Send>;

struct Entry {
    id: u64,
    on_commit: CommitAction,
    on_cancel: CancelAction,
}

/// Which frame a commit or cancel closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionScope {
    /// A nested frame; the parent is still active.
    Inner,
    /// The outermost frame; the stack is now empty.
    Outermost,
}

/// The transaction stack.
#[derive(Default)]
pub struct TransactionManager {
    queue: Vec<Entry>,
    /// Entry ids owned by each frame, outermost first.
    frames: Vec<Vec<u64>>,
    next_id: u64,
}

impl TransactionManager {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a new frame. Returns the new depth.
    pub fn start_transaction(&mut self) -> usize {
        self.frames.push(Vec::new());
        tracing::debug!(depth = self.frames.len(), "transaction started");
        self.frames.len()
    }

    #[must_use]
    pub fn is_active(&self) -> bool {
        !self.frames.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Number of queued entries across all frames.
    #[must_use]
    pub fn size(&self) -> usize {
        self.queue.len()
    }

    /// Queue a commit/cancel pair in the top frame.
    ///
    /// # Errors
    ///
    /// Returns `TransactionError::NoActiveTransaction` if no frame is active.
    pub fn add_to_transaction<C, F, X>(
        &mut self,
        on_commit: C,
        on_cancel: X,
    ) -> Result<(), TransactionError>
    where
        C: FnOnce() -> F + Send + 'static,
        F: Future<Output = Result<(), PersistenceError>> + Send + 'static,
        X: FnOnce() + Send + 'static,
    {
        let Some(frame) = self.frames.last_mut() else {
            tracing::warn!("add_to_transaction called with no active transaction");
            return Err(TransactionError::NoActiveTransaction);
        };
        let id = self.next_id;
        self.next_id += 1;
        frame.push(id);
        self.queue.push(Entry {
            id,
            on_commit: Box::new(move || -> BoxFuture<'static, Result<(), PersistenceError>> {
                Box::pin(on_commit())
            }),
            on_cancel: Box::new(on_cancel),
        });
        Ok(())
    }

    /// Commit the top frame.
    ///
    /// # Errors
    ///
    /// - `NoActiveTransaction` if the stack is empty
    /// - `CommitFailed` if any commit action of the outermost frame failed;
    ///   the remaining actions still ran and nothing is rolled back
    pub async fn commit(&mut self) -> Result<TransactionScope, TransactionError> {
        let Some(frame) = self.frames.pop() else {
            tracing::warn!("commit called with no active transaction");
            return Err(TransactionError::NoActiveTransaction);
        };

        if let Some(parent) = self.frames.last_mut() {
            parent.extend(frame);
            tracing::debug!(depth = self.frames.len(), "nested transaction committed");
            return Ok(TransactionScope::Inner);
        }

        let entries = std::mem::take(&mut self.queue);
        let total = entries.len();
        let mut failures = Vec::new();
        for entry in entries {
            if let Err(e) = (entry.on_commit)().await {
                tracing::warn!(error = %e, "commit action failed");
                failures.push(e);
            }
        }

        if failures.is_empty() {
            tracing::debug!(actions = total, "transaction committed");
            Ok(TransactionScope::Outermost)
        } else {
            Err(TransactionError::CommitFailed {
                succeeded: total - failures.len(),
                failures,
            })
        }
    }

    /// Cancel the top frame.
    ///
    /// # Errors
    ///
    /// Returns `NoActiveTransaction` if the stack is empty.
    pub fn cancel(&mut self) -> Result<TransactionScope, TransactionError> {
        let Some(frame) = self.frames.pop() else {
            tracing::warn!("cancel called with no active transaction");
            return Err(TransactionError::NoActiveTransaction);
        };

        let (cancelled, kept): (Vec<Entry>, Vec<Entry>) = std::mem::take(&mut self.queue)
            .into_iter()
            .partition(|entry| frame.contains(&entry.id));
        self.queue = kept;
        for entry in cancelled.into_iter().rev() {
            (entry.on_cancel)();
        }

        tracing::debug!(depth = self.frames.len(), "transaction cancelled");
        Ok(if self.frames.is_empty() {
            TransactionScope::Outermost
        } else {
            TransactionScope::Inner
        })
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("depth", &self.frames.len())
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// Errors from the transaction stack.
#[derive(Debug)]
pub enum TransactionError {
    /// Commit, cancel or add with an empty stack.
    NoActiveTransaction,
    /// One or more commit actions failed. Successful ones were not undone.
    CommitFailed {
        succeeded: usize,
        failures: Vec<PersistenceError>,
    },
    /// Flushing edited objects after commit failed.
    Persistence(PersistenceError),
}

impl std::fmt::Display for TransactionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoActiveTransaction => write!(f, "no transaction is active"),
            Self::CommitFailed {
                succeeded,
                failures,
            } => {
                write!(
                    f,
                    "{} commit action(s) failed, {succeeded} succeeded",
                    failures.len()
                )?;
                if let Some(first) = failures.first() {
                    write!(f, ": {first}")?;
                }
                Ok(())
            }
            Self::Persistence(e) => write!(f, "failed to save edited objects: {e}"),
        }
    }
}

impl std::error::Error for TransactionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::NoActiveTransaction => None,
            Self::CommitFailed { failures, .. } => failures
                .first()
                .map(|e| e as &(dyn std::error::Error + 'static)),
            Self::Persistence(e) => Some(e),
        }
    }
}

impl From<PersistenceError> for TransactionError {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}
