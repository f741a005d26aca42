use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proseql_store::Document;

use crate::database::{Collection, Database};
use crate::error::DbError;
use crate::state::CollectionData;

/// A touched collection: the snapshot it was forked from and the working
/// copy all staged mutations apply to.
#[derive(Clone)]
pub(crate) struct Touched {
    pub base: Arc<CollectionData>,
    pub data: CollectionData,
}

/// Restore point for all-or-nothing multi-entity operations running inside
/// a longer-lived working set. Cloning the touched map is O(1) per
/// collection thanks to structural sharing.
pub(crate) struct Checkpoint {
    touched: HashMap<String, Touched>,
    dirty: HashSet<String>,
    appends: usize,
}

/// Staged view over the database: lazily forks each collection on first
/// touch, routes reads and writes through the fork, and swaps the forks
/// into the live cells on commit. Dropping a working set discards
/// everything — failed operations leave no trace by construction.
pub(crate) struct WorkingSet<'db> {
    pub db: &'db Database,
    touched: HashMap<String, Touched>,
    dirty: HashSet<String>,
    pending_appends: Vec<(String, Document)>,
}

impl<'db> WorkingSet<'db> {
    pub fn new(db: &'db Database) -> Self {
        Self {
            db,
            touched: HashMap::new(),
            dirty: HashSet::new(),
            pending_appends: Vec::new(),
        }
    }

    /// Collection handle (config + index declarations). Lives as long as
    /// the database, not the working set.
    pub fn handle(&self, op: &str, name: &str) -> Result<&'db Collection, DbError> {
        self.db.collection(op, name)
    }

    fn ensure(&mut self, op: &str, name: &str) -> Result<(), DbError> {
        if !self.touched.contains_key(name) {
            let col = self.db.collection(op, name)?;
            let base = col.cell.snapshot();
            let data = (*base).clone();
            self.touched.insert(name.to_string(), Touched { base, data });
        }
        Ok(())
    }

    /// Read view of a collection. Touching a collection pins it for the
    /// lifetime of the working set (repeatable reads).
    pub fn data(&mut self, op: &str, name: &str) -> Result<&CollectionData, DbError> {
        self.ensure(op, name)?;
        self.touched
            .get(name)
            .map(|t| &t.data)
            .ok_or_else(|| DbError::operation(op, "working set desynchronized"))
    }

    /// Write view of a collection; marks it dirty for the commit swap.
    pub fn data_mut(&mut self, op: &str, name: &str) -> Result<&mut CollectionData, DbError> {
        self.ensure(op, name)?;
        self.dirty.insert(name.to_string());
        self.touched
            .get_mut(name)
            .map(|t| &mut t.data)
            .ok_or_else(|| DbError::operation(op, "working set desynchronized"))
    }

    /// Queue a journal append to run after the commit swap.
    pub fn queue_append(&mut self, name: &str, doc: Document) {
        self.pending_appends.push((name.to_string(), doc));
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            touched: self.touched.clone(),
            dirty: self.dirty.clone(),
            appends: self.pending_appends.len(),
        }
    }

    pub fn restore(&mut self, checkpoint: Checkpoint) {
        self.touched = checkpoint.touched;
        self.dirty = checkpoint.dirty;
        self.pending_appends.truncate(checkpoint.appends);
    }

    /// Swap every dirty fork into its live cell. The caller must hold the
    /// database write lock. Returns the queued journal appends.
    pub fn commit_swap(mut self) -> Vec<(String, Document)> {
        for name in self.dirty.drain() {
            if let (Some(col), Some(touched)) =
                (self.db.collections.get(&name), self.touched.remove(&name))
            {
                col.cell.replace(Arc::new(touched.data));
            }
        }
        self.pending_appends
    }

    /// Transaction commit: take the write lock, verify that no touched
    /// collection moved since it was forked, then swap all dirty forks in
    /// one critical section. First committer wins.
    pub fn commit_checked(mut self) -> Result<Vec<(String, Document)>, DbError> {
        let _guard = self.db.write_guard()?;

        for (name, touched) in &self.touched {
            let col = self.db.collection("commit", name)?;
            if !col.cell.is_current(&touched.base) {
                return Err(DbError::Concurrency {
                    collection: name.clone(),
                    id: None,
                });
            }
        }

        for name in self.dirty.drain() {
            if let (Some(col), Some(touched)) =
                (self.db.collections.get(&name), self.touched.remove(&name))
            {
                col.cell.replace(Arc::new(touched.data));
            }
        }
        Ok(self.pending_appends)
    }
}
