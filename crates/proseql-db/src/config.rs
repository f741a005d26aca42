use std::collections::BTreeMap;
use std::sync::Arc;

use proseql_store::Document;

use crate::exec::Analyzer;
use crate::hooks::CollectionHooks;
use crate::persistence::Persistence;
use crate::schema::{Schema, SchemaValidator};

/// What happens to referrers when their referent is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePolicy {
    /// Refuse the delete while any referrer exists.
    #[default]
    Restrict,
    /// Recursively delete the referrers.
    Cascade,
    /// Null out the referrers' ref field.
    SetNull,
}

/// A declared foreign-key edge: `field` on this collection holds the id of
/// an entity in `target`. Enforced on write; `on_delete` applies when the
/// referent is deleted.
#[derive(Debug, Clone, PartialEq)]
pub struct Relationship {
    pub field: String,
    pub target: String,
    pub on_delete: DeletePolicy,
}

impl Relationship {
    pub fn new(field: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            target: target.into(),
            on_delete: DeletePolicy::default(),
        }
    }

    pub fn on_delete(mut self, policy: DeletePolicy) -> Self {
        self.on_delete = policy;
        self
    }
}

/// A secondary-index declaration: one field, or an ordered tuple of fields
/// for a composite index. The canonical form is always the ordered tuple.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndexDef {
    pub fields: Vec<String>,
}

impl IndexDef {
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            fields: vec![name.into()],
        }
    }

    pub fn composite<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Clone)]
pub struct CollectionConfig {
    /// Validation capability. `Schema` is the shipped implementation; any
    /// `SchemaValidator` substitutes.
    pub schema: Arc<dyn SchemaValidator>,
    pub relationships: Vec<Relationship>,
    pub indexes: Vec<IndexDef>,
    /// Field sets that must be jointly unique across the collection.
    pub unique: Vec<Vec<String>>,
    /// When set, `update` and `delete` fail; only `create` is allowed.
    pub append_only: bool,
    pub hooks: CollectionHooks,
    pub persistence: Option<Arc<dyn Persistence>>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            schema: Arc::new(Schema::default()),
            relationships: Vec::new(),
            indexes: Vec::new(),
            unique: Vec::new(),
            append_only: false,
            hooks: CollectionHooks::default(),
            persistence: None,
        }
    }
}

impl CollectionConfig {
    pub fn with_schema(schema: Schema) -> Self {
        Self::with_validator(Arc::new(schema))
    }

    pub fn with_validator(validator: Arc<dyn SchemaValidator>) -> Self {
        Self {
            schema: validator,
            ..Self::default()
        }
    }

    /// Whether the schema grants the soft-delete capability.
    pub fn soft_deletes(&self) -> bool {
        self.schema.declares("deletedAt")
    }
}

/// Database bootstrap: per-collection configs plus seed data. Seed arrays
/// are validated and deduplicated by id, last entry winning.
#[derive(Default)]
pub struct DatabaseConfig {
    pub collections: BTreeMap<String, CollectionConfig>,
    pub initial_data: BTreeMap<String, Vec<Document>>,
    /// Optional `$search` matcher. Without one, `$search` is substring
    /// containment.
    pub analyzer: Option<Arc<dyn Analyzer>>,
}

impl DatabaseConfig {
    pub fn collection(mut self, name: impl Into<String>, config: CollectionConfig) -> Self {
        self.collections.insert(name.into(), config);
        self
    }

    pub fn seed(mut self, name: impl Into<String>, docs: Vec<Document>) -> Self {
        self.initial_data.insert(name.into(), docs);
        self
    }
}
