use proseql_query::{Patch, Where};
use proseql_store::Document;

use crate::error::DbError;

/// Options for `create_many`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateManyOptions {
    /// Skip entities that fail with duplicate-key, unique-constraint, or
    /// foreign-key errors instead of aborting the whole batch.
    pub skip_duplicates: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Skipped {
    pub id: Option<String>,
    pub reason: DbError,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CreateManyResult {
    pub created: Vec<Document>,
    pub skipped: Vec<Skipped>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UpdateManyResult {
    pub count: usize,
    pub entities: Vec<Document>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct DeleteManyResult {
    pub count: usize,
    pub entities: Vec<Document>,
}

/// Options for `delete` and `delete_many`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeleteOptions {
    /// Mark with a `deletedAt` timestamp instead of removing. Requires the
    /// schema to declare `deletedAt`.
    pub soft: bool,
}

impl DeleteOptions {
    pub fn soft() -> Self {
        Self { soft: true }
    }
}

/// Input to `upsert`: the identifying where clause, the document to create
/// on zero matches, and the patch to apply on exactly one match.
#[derive(Debug, Clone, PartialEq)]
pub struct UpsertSpec {
    pub filter: Where,
    pub create: Document,
    pub update: Patch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOp {
    Created,
    Updated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpsertResult {
    pub operation: UpsertOp,
    pub entity: Document,
}
