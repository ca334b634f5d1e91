//! Domain objects: identity and persistence.

mod identifier;
mod store;

pub use identifier::{Identifier, IdentifierError};
pub use store::{
    DomainObject, FileObjectStore, InMemoryObjectStore, OBJECTS_FILE_NAME, ObjectStore,
    PersistenceError,
};
