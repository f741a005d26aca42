use serde_json::{Number, Value};

use proseql_store::{Entity, EntityMap};

/// Ids in one index bucket, in id order.
pub type IdSet = imbl::OrdSet<String>;

type Buckets = imbl::HashMap<String, IdSet>;

/// Normalize a value for key encoding: integral floats collapse to their
/// integer form so `1` and `1.0` land in the same bucket, matching the
/// matcher's numeric equality.
fn canonical(value: &Value) -> Value {
    if let Value::Number(n) = value {
        if let Some(f) = n.as_f64() {
            if f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
                return Value::Number(Number::from(f as i64));
            }
        }
    }
    value.clone()
}

/// Canonical bucket key for an ordered tuple of values. `None` when any
/// value is null — null and absent fields are not indexed.
pub fn key_for_values(values: &[Value]) -> Option<String> {
    if values.iter().any(Value::is_null) {
        return None;
    }
    let tuple: Vec<Value> = values.iter().map(canonical).collect();
    serde_json::to_string(&tuple).ok()
}

/// Bucket key an entity belongs to under an index on `fields`. `None` when
/// any indexed field is absent or null.
pub fn entity_key(entity: &Entity, fields: &[String]) -> Option<String> {
    let values: Vec<Value> = fields
        .iter()
        .map(|field| entity.get(field).unwrap_or(Value::Null))
        .collect();
    key_for_values(&values)
}

/// All secondary indexes of one collection: declared field tuple → bucket
/// key → id set. Rides inside `CollectionData`, so index state and entity
/// state are always swapped together.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IndexState {
    indexes: imbl::HashMap<Vec<String>, Buckets>,
}

impl IndexState {
    /// Empty index state with an entry per declaration.
    pub fn new(declarations: &[Vec<String>]) -> Self {
        let mut indexes = imbl::HashMap::new();
        for decl in declarations {
            indexes.insert(decl.clone(), Buckets::new());
        }
        Self { indexes }
    }

    /// Build from scratch over an existing entity map.
    pub fn build(declarations: &[Vec<String>], entities: &EntityMap) -> Self {
        let mut state = Self::new(declarations);
        for entity in entities.values() {
            state.on_create(entity);
        }
        state
    }

    fn declarations(&self) -> Vec<Vec<String>> {
        self.indexes.keys().cloned().collect()
    }

    pub fn has_index(&self, fields: &[String]) -> bool {
        self.indexes.contains_key(fields)
    }

    pub fn on_create(&mut self, entity: &Entity) {
        for decl in self.declarations() {
            if let Some(key) = entity_key(entity, &decl) {
                self.add(&decl, key, &entity.id);
            }
        }
    }

    pub fn on_update(&mut self, old: &Entity, new: &Entity) {
        for decl in self.declarations() {
            let old_key = entity_key(old, &decl);
            let new_key = entity_key(new, &decl);
            if old_key == new_key {
                continue;
            }
            if let Some(key) = old_key {
                self.drop_id(&decl, &key, &old.id);
            }
            if let Some(key) = new_key {
                self.add(&decl, key, &new.id);
            }
        }
    }

    pub fn on_delete(&mut self, entity: &Entity) {
        for decl in self.declarations() {
            if let Some(key) = entity_key(entity, &decl) {
                self.drop_id(&decl, &key, &entity.id);
            }
        }
    }

    /// Ids in one bucket.
    pub fn lookup(&self, fields: &[String], key: &str) -> Option<&IdSet> {
        self.indexes.get(fields)?.get(key)
    }

    /// Union of the buckets for several keys.
    pub fn lookup_many(&self, fields: &[String], keys: &[String]) -> IdSet {
        let mut out = IdSet::new();
        for key in keys {
            if let Some(ids) = self.lookup(fields, key) {
                out = out.union(ids.clone());
            }
        }
        out
    }

    /// All buckets of one index, for integrity checks.
    pub fn buckets(&self, fields: &[String]) -> Option<&imbl::HashMap<String, IdSet>> {
        self.indexes.get(fields)
    }

    fn add(&mut self, decl: &[String], key: String, id: &str) {
        if let Some(buckets) = self.indexes.get_mut(decl) {
            let mut ids = buckets.get(&key).cloned().unwrap_or_default();
            ids.insert(id.to_string());
            buckets.insert(key, ids);
        }
    }

    fn drop_id(&mut self, decl: &[String], key: &str, id: &str) {
        if let Some(buckets) = self.indexes.get_mut(decl) {
            if let Some(ids) = buckets.get(key) {
                let mut ids = ids.clone();
                ids.remove(id);
                if ids.is_empty() {
                    buckets.remove(key);
                } else {
                    buckets.insert(key.to_string(), ids);
                }
            }
        }
    }
}
