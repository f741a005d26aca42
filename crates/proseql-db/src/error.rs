use std::fmt;

use serde_json::Value;

/// One field-level validation diagnostic.
#[derive(Debug, Clone, PartialEq)]
pub struct Issue {
    pub field: String,
    pub message: String,
    pub expected: Option<String>,
    pub received: Option<String>,
}

impl Issue {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            expected: None,
            received: None,
        }
    }

    pub fn typed(
        field: impl Into<String>,
        message: impl Into<String>,
        expected: impl Into<String>,
        received: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            expected: Some(expected.into()),
            received: Some(received.into()),
        }
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.expected, &self.received) {
            (Some(expected), Some(received)) => write!(
                f,
                "{}: {} (expected {expected}, received {received})",
                self.field, self.message
            ),
            _ => write!(f, "{}: {}", self.field, self.message),
        }
    }
}

/// Transaction lifecycle step an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOp {
    Begin,
    Commit,
    Rollback,
}

impl fmt::Display for TxOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxOp::Begin => write!(f, "begin"),
            TxOp::Commit => write!(f, "commit"),
            TxOp::Rollback => write!(f, "rollback"),
        }
    }
}

/// Mutation kind a lifecycle hook ran for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Create,
    Update,
    Delete,
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MutationKind::Create => write!(f, "create"),
            MutationKind::Update => write!(f, "update"),
            MutationKind::Delete => write!(f, "delete"),
        }
    }
}

/// Every failure the engine reports. Errors are values: operations return
/// `Result<T, DbError>` and a failed operation leaves no observable change.
#[derive(Debug, Clone, PartialEq)]
pub enum DbError {
    NotFound {
        collection: String,
        id: String,
    },
    DuplicateKey {
        collection: String,
        field: String,
        value: Value,
        existing_id: String,
    },
    ForeignKey {
        collection: String,
        field: String,
        value: Value,
        target: String,
    },
    Validation {
        issues: Vec<Issue>,
    },
    UniqueConstraint {
        collection: String,
        constraint: String,
        fields: Vec<String>,
        values: Vec<Value>,
        existing_id: String,
    },
    Concurrency {
        collection: String,
        id: Option<String>,
    },
    Operation {
        operation: String,
        reason: String,
    },
    Transaction {
        op: TxOp,
        reason: String,
    },
    Hook {
        hook: String,
        collection: String,
        operation: MutationKind,
        reason: String,
    },
}

impl DbError {
    pub(crate) fn operation(operation: &str, reason: impl Into<String>) -> Self {
        DbError::Operation {
            operation: operation.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unknown_collection(operation: &str, collection: &str) -> Self {
        Self::operation(operation, format!("unknown collection: {collection}"))
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::NotFound { collection, id } => {
                write!(f, "not found in {collection}: {id}")
            }
            DbError::DuplicateKey {
                collection,
                field,
                value,
                existing_id,
            } => write!(
                f,
                "duplicate key in {collection}: {field}={value} (existing id {existing_id})"
            ),
            DbError::ForeignKey {
                collection,
                field,
                value,
                target,
            } => write!(
                f,
                "foreign key violation in {collection}: {field}={value} has no match in {target}"
            ),
            DbError::Validation { issues } => {
                write!(f, "validation failed:")?;
                for issue in issues {
                    write!(f, " [{issue}]")?;
                }
                Ok(())
            }
            DbError::UniqueConstraint {
                collection,
                constraint,
                existing_id,
                ..
            } => write!(
                f,
                "unique constraint {constraint} violated in {collection} (existing id {existing_id})"
            ),
            DbError::Concurrency { collection, id } => match id {
                Some(id) => write!(f, "concurrent modification in {collection}: {id}"),
                None => write!(f, "concurrent modification in {collection}"),
            },
            DbError::Operation { operation, reason } => {
                write!(f, "{operation} failed: {reason}")
            }
            DbError::Transaction { op, reason } => {
                write!(f, "transaction {op} failed: {reason}")
            }
            DbError::Hook {
                hook,
                collection,
                operation,
                reason,
            } => write!(
                f,
                "{hook} hook rejected {operation} on {collection}: {reason}"
            ),
        }
    }
}

impl std::error::Error for DbError {}

impl From<proseql_query::PatchApplyError> for DbError {
    fn from(e: proseql_query::PatchApplyError) -> Self {
        DbError::Operation {
            operation: "update".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<proseql_query::WhereParseError> for DbError {
    fn from(e: proseql_query::WhereParseError) -> Self {
        DbError::Operation {
            operation: "query".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<proseql_query::PatchParseError> for DbError {
    fn from(e: proseql_query::PatchParseError) -> Self {
        DbError::Operation {
            operation: "update".to_string(),
            reason: e.to_string(),
        }
    }
}

impl From<crate::persistence::PersistenceError> for DbError {
    fn from(e: crate::persistence::PersistenceError) -> Self {
        DbError::Operation {
            operation: "persistence".to_string(),
            reason: e.to_string(),
        }
    }
}
