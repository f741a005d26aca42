use std::fmt;

use proseql_store::Document;

/// Persistence failure. Surfaces to callers as `OperationError`; it never
/// rolls back in-memory state.
#[derive(Debug, Clone, PartialEq)]
pub struct PersistenceError(pub String);

impl fmt::Display for PersistenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "persistence error: {}", self.0)
    }
}

impl std::error::Error for PersistenceError {}

impl From<std::io::Error> for PersistenceError {
    fn from(e: std::io::Error) -> Self {
        PersistenceError(e.to_string())
    }
}

impl From<serde_json::Error> for PersistenceError {
    fn from(e: serde_json::Error) -> Self {
        PersistenceError(e.to_string())
    }
}

/// Disk collaborator for one collection.
///
/// Two usage modes: a journal driver does real work in `append` (one call
/// per created entity) and treats `flush` as compaction; a full-file driver
/// ignores `append` and rewrites everything on `flush`. The engine calls
/// `load` once at startup, `append` after each committed create, and
/// `flush` from `Database::flush`.
pub trait Persistence: Send + Sync {
    fn load(&self) -> Result<Vec<Document>, PersistenceError>;

    fn append(&self, doc: &Document) -> Result<(), PersistenceError> {
        let _ = doc;
        Ok(())
    }

    fn flush(&self, docs: &[Document]) -> Result<(), PersistenceError>;
}
