use proseql_query::{Patch, Query, Where};
use proseql_store::Document;

use crate::aggregate::{self, AggregateResult, AggregateSpec};
use crate::cursor::Cursor;
use crate::database::Database;
use crate::error::{DbError, TxOp};
use crate::exec;
use crate::mutate;
use crate::result::{
    CreateManyOptions, CreateManyResult, DeleteManyResult, DeleteOptions, UpdateManyResult,
    UpsertResult, UpsertSpec,
};
use crate::workset::WorkingSet;

/// The view a transaction body works against.
///
/// Reads pin each collection to the state it had when the transaction
/// first touched it (repeatable reads); writes stage into working copies.
/// Nothing is visible outside the transaction until commit, and a commit
/// installs every touched collection in one critical section.
pub struct TxContext<'db> {
    ws: WorkingSet<'db>,
}

impl<'db> TxContext<'db> {
    pub(crate) fn new(db: &'db Database) -> Self {
        Self {
            ws: WorkingSet::new(db),
        }
    }

    pub(crate) fn into_workset(self) -> WorkingSet<'db> {
        self.ws
    }

    /// Run a mutation all-or-nothing against the staged state: on error the
    /// working copies roll back to their pre-call checkpoint, so a failed
    /// `update_many` can't leave half its patches inside the transaction.
    fn guarded<T>(
        &mut self,
        f: impl FnOnce(&mut WorkingSet<'db>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let checkpoint = self.ws.checkpoint();
        match f(&mut self.ws) {
            Ok(value) => Ok(value),
            Err(e) => {
                self.ws.restore(checkpoint);
                Err(e)
            }
        }
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn find(&mut self, collection: &str, query: Query) -> Result<Cursor, DbError> {
        let handle = self.ws.handle("find", collection)?;
        let analyzer = self.ws.db.analyzer();
        let data = self.ws.data("find", collection)?;
        Ok(exec::run_query(data, &handle.indexes, &query, analyzer))
    }

    pub fn find_by_id(&mut self, collection: &str, id: &str) -> Result<Document, DbError> {
        self.ws
            .data("find", collection)?
            .get(id)
            .map(|e| e.to_document())
            .ok_or_else(|| DbError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    pub fn find_one(
        &mut self,
        collection: &str,
        mut query: Query,
    ) -> Result<Option<Document>, DbError> {
        query.limit = Some(1);
        Ok(self.find(collection, query)?.next())
    }

    pub fn count(&mut self, collection: &str, filter: Option<&Where>) -> Result<usize, DbError> {
        let handle = self.ws.handle("count", collection)?;
        let analyzer = self.ws.db.analyzer();
        let data = self.ws.data("count", collection)?;
        Ok(exec::filter_entities(data, &handle.indexes, filter, analyzer).count())
    }

    pub fn aggregate(
        &mut self,
        collection: &str,
        spec: &AggregateSpec,
    ) -> Result<AggregateResult, DbError> {
        let handle = self.ws.handle("aggregate", collection)?;
        let analyzer = self.ws.db.analyzer();
        let data = self.ws.data("aggregate", collection)?;
        Ok(aggregate::run(data, &handle.indexes, spec, analyzer))
    }

    // ── Writes ──────────────────────────────────────────────────

    pub fn create(&mut self, collection: &str, input: Document) -> Result<Document, DbError> {
        self.guarded(|ws| mutate::create(ws, collection, input))
    }

    pub fn create_many(
        &mut self,
        collection: &str,
        inputs: Vec<Document>,
        options: CreateManyOptions,
    ) -> Result<CreateManyResult, DbError> {
        self.guarded(|ws| mutate::create_many(ws, collection, inputs, options))
    }

    pub fn update(
        &mut self,
        collection: &str,
        id: &str,
        patch: &Patch,
    ) -> Result<Document, DbError> {
        self.guarded(|ws| mutate::update(ws, collection, id, patch))
    }

    pub fn update_many(
        &mut self,
        collection: &str,
        filter: &Where,
        patch: &Patch,
    ) -> Result<UpdateManyResult, DbError> {
        self.guarded(|ws| mutate::update_many(ws, collection, filter, patch))
    }

    pub fn delete(
        &mut self,
        collection: &str,
        id: &str,
        options: DeleteOptions,
    ) -> Result<Document, DbError> {
        self.guarded(|ws| mutate::delete(ws, collection, id, options))
    }

    pub fn delete_many(
        &mut self,
        collection: &str,
        filter: &Where,
        options: DeleteOptions,
    ) -> Result<DeleteManyResult, DbError> {
        self.guarded(|ws| mutate::delete_many(ws, collection, filter, options))
    }

    pub fn upsert(
        &mut self,
        collection: &str,
        spec: UpsertSpec,
        unique_fields: Option<&[String]>,
    ) -> Result<UpsertResult, DbError> {
        self.guarded(|ws| mutate::upsert(ws, collection, spec, unique_fields))
    }

    // ── Lifecycle ───────────────────────────────────────────────

    /// The distinguished rollback failure. Return it from the transaction
    /// body to abort: `return Err(ctx.rollback())`.
    pub fn rollback(&self) -> DbError {
        DbError::Transaction {
            op: TxOp::Rollback,
            reason: "rolled back by caller".to_string(),
        }
    }
}
