mod aggregate;
mod config;
mod cursor;
mod database;
mod error;
mod exec;
mod hooks;
mod index;
mod mutate;
mod persistence;
mod planner;
mod relations;
mod result;
mod schema;
mod state;
mod transaction;
mod workset;

pub use aggregate::{AggregateResult, AggregateRow, AggregateSpec};
pub use config::{CollectionConfig, DatabaseConfig, DeletePolicy, IndexDef, Relationship};
pub use cursor::Cursor;
pub use database::Database;
pub use error::{DbError, Issue, MutationKind, TxOp};
pub use exec::{Analyzer, matches_where};
pub use hooks::{CollectionHooks, HookFn};
pub use persistence::{Persistence, PersistenceError};
pub use result::{
    CreateManyOptions, CreateManyResult, DeleteManyResult, DeleteOptions, Skipped,
    UpdateManyResult, UpsertOp, UpsertResult, UpsertSpec,
};
pub use schema::{FieldDef, FieldType, Schema, SchemaValidator};
pub use transaction::TxContext;

// The query AST and document types are part of the public surface.
pub use proseql_query::{
    FieldPredicate, FieldUpdate, Patch, Query, Sort, SortDirection, Where, parse_patch,
    parse_where,
};
pub use proseql_store::{Document, Entity};
