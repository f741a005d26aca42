use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use proseql_query::{Patch, Query, Where};
use proseql_store::{Document, Entity, EntityMap, VersionedCell};

use crate::aggregate::{self, AggregateResult, AggregateSpec};
use crate::config::{CollectionConfig, DatabaseConfig, DeletePolicy};
use crate::cursor::Cursor;
use crate::error::{DbError, Issue, TxOp};
use crate::exec::{self, Analyzer};
use crate::mutate;
use crate::result::{
    CreateManyOptions, CreateManyResult, DeleteManyResult, DeleteOptions, UpdateManyResult,
    UpsertResult, UpsertSpec,
};
use crate::schema::SchemaValidator;
use crate::state::CollectionData;
use crate::transaction::TxContext;
use crate::workset::WorkingSet;

/// Live handle of one collection: config, normalized index declarations
/// (ref-field indexes appended), and the swappable state cell.
pub(crate) struct Collection {
    pub config: CollectionConfig,
    pub indexes: Vec<Vec<String>>,
    pub cell: VersionedCell<CollectionData>,
}

/// Reverse edge of a declared relationship, grouped by target collection.
#[derive(Clone)]
pub(crate) struct IncomingRef {
    pub source: String,
    pub field: String,
    pub policy: DeletePolicy,
}

/// The embedded document store. One value owns every collection; there is
/// no global state. All handles (`find` cursors, snapshots) stay valid as
/// writes land — they keep reading the state they captured.
pub struct Database {
    pub(crate) collections: BTreeMap<String, Collection>,
    incoming: HashMap<String, Vec<IncomingRef>>,
    write_lock: Mutex<()>,
    in_txn: AtomicBool,
    analyzer: Option<Arc<dyn Analyzer>>,
}

impl Database {
    /// Build a database from config and seed data. Seed entities are
    /// validated and deduplicated by id (last wins); persisted entities
    /// load first and seed data lands on top. Every ref in the combined
    /// initial state must resolve.
    pub fn open(config: DatabaseConfig) -> Result<Self, DbError> {
        let DatabaseConfig {
            collections: configs,
            initial_data,
            analyzer,
        } = config;

        for (name, cfg) in &configs {
            for rel in &cfg.relationships {
                if !configs.contains_key(&rel.target) {
                    return Err(DbError::operation(
                        "open",
                        format!(
                            "relationship {name}.{} targets unknown collection {}",
                            rel.field, rel.target
                        ),
                    ));
                }
            }
            for index in &cfg.indexes {
                if index.fields.is_empty() {
                    return Err(DbError::operation(
                        "open",
                        format!("empty index declaration on {name}"),
                    ));
                }
            }
            for constraint in &cfg.unique {
                if constraint.is_empty() {
                    return Err(DbError::operation(
                        "open",
                        format!("empty unique constraint on {name}"),
                    ));
                }
            }
        }

        let mut maps: BTreeMap<String, EntityMap> = BTreeMap::new();
        for (name, cfg) in &configs {
            let mut entities = EntityMap::new();
            if let Some(driver) = &cfg.persistence {
                for doc in driver.load()? {
                    insert_seed(&mut entities, cfg.schema.as_ref(), doc)?;
                }
            }
            if let Some(seed) = initial_data.get(name) {
                for doc in seed.clone() {
                    insert_seed(&mut entities, cfg.schema.as_ref(), doc)?;
                }
            }
            maps.insert(name.clone(), entities);
        }

        // Initial state must satisfy referential integrity at rest.
        for (name, cfg) in &configs {
            for rel in &cfg.relationships {
                let targets = &maps[&rel.target];
                for entity in maps[name].values() {
                    let Some(value) = entity.fields.get(&rel.field) else {
                        continue;
                    };
                    if value.is_null() {
                        continue;
                    }
                    let resolved = value
                        .as_str()
                        .is_some_and(|id| targets.contains_key(id));
                    if !resolved {
                        return Err(DbError::ForeignKey {
                            collection: name.clone(),
                            field: rel.field.clone(),
                            value: value.clone(),
                            target: rel.target.clone(),
                        });
                    }
                }
            }
        }

        let mut collections = BTreeMap::new();
        let mut incoming: HashMap<String, Vec<IncomingRef>> = HashMap::new();
        for (name, cfg) in configs {
            for rel in &cfg.relationships {
                incoming.entry(rel.target.clone()).or_default().push(IncomingRef {
                    source: name.clone(),
                    field: rel.field.clone(),
                    policy: rel.on_delete,
                });
            }
            let indexes = effective_indexes(&cfg);
            let entities = maps.remove(&name).unwrap_or_default();
            let data = CollectionData::build(&indexes, entities);
            collections.insert(
                name,
                Collection {
                    config: cfg,
                    indexes,
                    cell: VersionedCell::new(data),
                },
            );
        }

        Ok(Self {
            collections,
            incoming,
            write_lock: Mutex::new(()),
            in_txn: AtomicBool::new(false),
            analyzer,
        })
    }

    // ── Internal accessors ──────────────────────────────────────

    pub(crate) fn collection(&self, op: &str, name: &str) -> Result<&Collection, DbError> {
        self.collections
            .get(name)
            .ok_or_else(|| DbError::unknown_collection(op, name))
    }

    pub(crate) fn incoming_refs(&self, name: &str) -> &[IncomingRef] {
        self.incoming.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn analyzer(&self) -> Option<Arc<dyn Analyzer>> {
        self.analyzer.clone()
    }

    pub(crate) fn write_guard(&self) -> Result<MutexGuard<'_, ()>, DbError> {
        self.write_lock
            .lock()
            .map_err(|e| DbError::operation("lock", e.to_string()))
    }

    /// Serialize one write operation: lock, stage, swap, then run any
    /// queued journal appends. A persistence failure after the swap
    /// surfaces as an error without undoing the in-memory commit.
    fn write_op<T>(
        &self,
        f: impl FnOnce(&mut WorkingSet<'_>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        let guard = self.write_guard()?;
        let mut ws = WorkingSet::new(self);
        let value = f(&mut ws)?;
        let appends = ws.commit_swap();
        drop(guard);
        self.run_appends(appends)?;
        Ok(value)
    }

    fn run_appends(&self, appends: Vec<(String, Document)>) -> Result<(), DbError> {
        for (name, doc) in appends {
            if let Some(col) = self.collections.get(&name) {
                if let Some(driver) = &col.config.persistence {
                    driver.append(&doc)?;
                }
            }
        }
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────

    pub fn collection_names(&self) -> Vec<&str> {
        self.collections.keys().map(String::as_str).collect()
    }

    pub fn has_collection(&self, name: &str) -> bool {
        self.collections.contains_key(name)
    }

    pub fn len(&self, collection: &str) -> Result<usize, DbError> {
        Ok(self.collection("len", collection)?.cell.snapshot().len())
    }

    pub fn find(&self, collection: &str, query: Query) -> Result<Cursor, DbError> {
        let col = self.collection("find", collection)?;
        let snapshot = col.cell.snapshot();
        Ok(exec::run_query(&snapshot, &col.indexes, &query, self.analyzer()))
    }

    pub fn find_by_id(&self, collection: &str, id: &str) -> Result<Document, DbError> {
        let col = self.collection("find", collection)?;
        col.cell
            .snapshot()
            .get(id)
            .map(|e| e.to_document())
            .ok_or_else(|| DbError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })
    }

    pub fn find_one(&self, collection: &str, mut query: Query) -> Result<Option<Document>, DbError> {
        query.limit = Some(1);
        Ok(self.find(collection, query)?.next())
    }

    pub fn count(&self, collection: &str, filter: Option<&Where>) -> Result<usize, DbError> {
        let col = self.collection("count", collection)?;
        let snapshot = col.cell.snapshot();
        Ok(exec::filter_entities(&snapshot, &col.indexes, filter, self.analyzer()).count())
    }

    pub fn aggregate(
        &self,
        collection: &str,
        spec: &AggregateSpec,
    ) -> Result<AggregateResult, DbError> {
        let col = self.collection("aggregate", collection)?;
        let snapshot = col.cell.snapshot();
        Ok(aggregate::run(&snapshot, &col.indexes, spec, self.analyzer()))
    }

    // ── Writes ──────────────────────────────────────────────────

    pub fn create(&self, collection: &str, input: Document) -> Result<Document, DbError> {
        self.write_op(|ws| mutate::create(ws, collection, input))
    }

    pub fn create_many(
        &self,
        collection: &str,
        inputs: Vec<Document>,
        options: CreateManyOptions,
    ) -> Result<CreateManyResult, DbError> {
        self.write_op(|ws| mutate::create_many(ws, collection, inputs, options))
    }

    pub fn update(&self, collection: &str, id: &str, patch: &Patch) -> Result<Document, DbError> {
        self.write_op(|ws| mutate::update(ws, collection, id, patch))
    }

    pub fn update_many(
        &self,
        collection: &str,
        filter: &Where,
        patch: &Patch,
    ) -> Result<UpdateManyResult, DbError> {
        self.write_op(|ws| mutate::update_many(ws, collection, filter, patch))
    }

    pub fn delete(
        &self,
        collection: &str,
        id: &str,
        options: DeleteOptions,
    ) -> Result<Document, DbError> {
        self.write_op(|ws| mutate::delete(ws, collection, id, options))
    }

    pub fn delete_many(
        &self,
        collection: &str,
        filter: &Where,
        options: DeleteOptions,
    ) -> Result<DeleteManyResult, DbError> {
        self.write_op(|ws| mutate::delete_many(ws, collection, filter, options))
    }

    pub fn upsert(
        &self,
        collection: &str,
        spec: UpsertSpec,
        unique_fields: Option<&[String]>,
    ) -> Result<UpsertResult, DbError> {
        self.write_op(|ws| mutate::upsert(ws, collection, spec, unique_fields))
    }

    // ── Transactions ────────────────────────────────────────────

    /// Run `f` against a staged multi-collection view. On `Ok` the staged
    /// state commits atomically (first committer wins — a concurrent
    /// commit to any touched collection fails this one with
    /// `Concurrency`); on `Err` everything staged is discarded.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut TxContext<'_>) -> Result<T, DbError>,
    ) -> Result<T, DbError> {
        if self.in_txn.swap(true, Ordering::SeqCst) {
            return Err(DbError::Transaction {
                op: TxOp::Begin,
                reason: "nested transactions are not supported".to_string(),
            });
        }

        let result = {
            let mut ctx = TxContext::new(self);
            match f(&mut ctx) {
                Ok(value) => ctx.into_workset().commit_checked().map(|appends| (value, appends)),
                Err(e) => Err(e),
            }
        };
        self.in_txn.store(false, Ordering::SeqCst);

        let (value, appends) = result?;
        self.run_appends(appends)?;
        Ok(value)
    }

    // ── Persistence ─────────────────────────────────────────────

    /// Write every file-backed collection through its driver. Best-effort:
    /// the first failure surfaces, in-memory state is untouched either way.
    pub fn flush(&self) -> Result<(), DbError> {
        for col in self.collections.values() {
            if let Some(driver) = &col.config.persistence {
                let docs: Vec<Document> = col
                    .cell
                    .snapshot()
                    .entities
                    .values()
                    .map(|e| e.to_document())
                    .collect();
                driver.flush(&docs)?;
            }
        }
        Ok(())
    }
}

fn insert_seed(
    entities: &mut EntityMap,
    validator: &dyn SchemaValidator,
    doc: Document,
) -> Result<(), DbError> {
    let entity = Entity::from_document(doc).ok_or_else(|| DbError::Validation {
        issues: vec![Issue::new("id", "entity requires a string id")],
    })?;
    validator
        .validate(&entity.fields)
        .map_err(|issues| DbError::Validation { issues })?;
    entities.insert(entity.id.clone(), Arc::new(entity));
    Ok(())
}

/// Normalized index declarations: the configured ones in order, then an
/// implicit single-field index per ref field — referrer lookups for
/// restrict/cascade go through it like any other index.
fn effective_indexes(config: &CollectionConfig) -> Vec<Vec<String>> {
    let mut indexes: Vec<Vec<String>> = config.indexes.iter().map(|i| i.fields.clone()).collect();
    for rel in &config.relationships {
        let implicit = vec![rel.field.clone()];
        if !indexes.contains(&implicit) {
            indexes.push(implicit);
        }
    }
    indexes
}
