//! Editing: the editable-object cache, the transaction stack, and the edit
//! session that combines them over an object store.

mod cache;
mod session;
mod transaction;

pub use cache::{EditTarget, EditableObject, EditableObjectCache};
pub use session::{EditError, EditSession};
pub use transaction::{
    CancelAction, CommitAction, TransactionError, TransactionManager, TransactionScope,
};
