use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The field container of an entity: a JSON object. The `id` field is held
/// separately on `Entity` and never appears inside `Document`.
pub type Document = Map<String, Value>;

/// One collection's id→entity mapping. `imbl::OrdMap` gives O(1) clones
/// with structural sharing and deterministic (id-ordered) enumeration.
pub type EntityMap = imbl::OrdMap<String, Arc<Entity>>;

/// An immutable record keyed by a string id. Updates replace the whole
/// entity; nothing mutates one in place once it is stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub fields: Document,
}

impl Entity {
    /// Build an entity, stripping any `id` key out of the field map so it
    /// lives only on the struct.
    pub fn new(id: impl Into<String>, mut fields: Document) -> Self {
        fields.remove("id");
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Extract the entity from a full document carrying an `id` field.
    /// Returns `None` when `id` is missing or not a string.
    pub fn from_document(mut doc: Document) -> Option<Self> {
        let id = match doc.remove("id") {
            Some(Value::String(s)) => s,
            _ => return None,
        };
        Some(Self { id, fields: doc })
    }

    /// Look up a field; `id` resolves to the entity id.
    pub fn get(&self, field: &str) -> Option<Value> {
        if field == "id" {
            return Some(Value::String(self.id.clone()));
        }
        self.fields.get(field).cloned()
    }

    /// Borrowing variant of [`get`](Self::get) for non-id fields.
    pub fn field(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// The full document form, `id` included.
    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("id".to_string(), Value::String(self.id.clone()));
        doc.extend(self.fields.clone());
        doc
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn fields(value: serde_json::Value) -> Document {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn id_never_duplicates_into_fields() {
        let entity = Entity::new("1", fields(json!({ "id": "1", "title": "Dune" })));
        assert!(entity.fields.get("id").is_none());
        assert_eq!(entity.to_document().get("id"), Some(&json!("1")));
    }

    #[test]
    fn from_document_requires_string_id() {
        assert!(Entity::from_document(fields(json!({ "title": "Dune" }))).is_none());
        assert!(Entity::from_document(fields(json!({ "id": 7 }))).is_none());
        let entity = Entity::from_document(fields(json!({ "id": "1", "title": "Dune" }))).unwrap();
        assert_eq!(entity.id, "1");
        assert_eq!(entity.field("title"), Some(&json!("Dune")));
    }

    #[test]
    fn serializes_flat() {
        let entity = Entity::new("1", fields(json!({ "title": "Dune" })));
        let json = serde_json::to_value(&entity).unwrap();
        assert_eq!(json, json!({ "id": "1", "title": "Dune" }));
        let back: Entity = serde_json::from_value(json).unwrap();
        assert_eq!(back, entity);
    }
}
