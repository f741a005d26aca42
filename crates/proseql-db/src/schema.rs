use serde_json::Value;

use proseql_store::Document;

use crate::error::Issue;

/// Declared type of a schema field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    String,
    Number,
    Bool,
    List(Box<FieldType>),
    Object,
    /// Accepts any JSON value. Useful for free-form payload fields.
    Any,
}

impl FieldType {
    fn name(&self) -> String {
        match self {
            FieldType::String => "string".to_string(),
            FieldType::Number => "number".to_string(),
            FieldType::Bool => "bool".to_string(),
            FieldType::List(inner) => format!("list<{}>", inner.name()),
            FieldType::Object => "object".to_string(),
            FieldType::Any => "any".to_string(),
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match (self, value) {
            (FieldType::Any, _) => true,
            (FieldType::String, Value::String(_)) => true,
            (FieldType::Number, Value::Number(_)) => true,
            (FieldType::Bool, Value::Bool(_)) => true,
            (FieldType::Object, Value::Object(_)) => true,
            (FieldType::List(inner), Value::Array(items)) => {
                items.iter().all(|item| inner.accepts(item))
            }
            _ => false,
        }
    }
}

fn type_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub nullable: bool,
}

impl FieldDef {
    pub fn required(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: true,
            nullable: false,
        }
    }

    pub fn optional(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            required: false,
            nullable: true,
        }
    }
}

/// Validation capability the engine consumes. `Schema` is the shipped
/// implementation; an embedding program may substitute its own.
pub trait SchemaValidator: Send + Sync {
    /// Check a document against the schema. The `id` field is handled by
    /// the engine and is not part of the validated fields.
    fn validate(&self, fields: &Document) -> Result<(), Vec<Issue>>;

    /// Serialize a document to its persisted form.
    fn encode(&self, doc: &Document) -> Result<String, Issue> {
        serde_json::to_string(doc).map_err(|e| Issue::new("", e.to_string()))
    }

    /// Parse a persisted line back into a document.
    fn decode(&self, raw: &str) -> Result<Document, Issue> {
        serde_json::from_str(raw).map_err(|e| Issue::new("", e.to_string()))
    }

    /// Whether the schema declares a field with this name.
    fn declares(&self, field: &str) -> bool;
}

/// Declarative field schema.
///
/// An empty schema is open: any document passes. A non-empty schema is
/// closed: fields not declared are rejected, required fields must be
/// present, and `nullable` controls whether null is accepted in place of
/// the declared type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Schema {
    pub fields: Vec<FieldDef>,
}

impl Schema {
    pub fn new(fields: Vec<FieldDef>) -> Self {
        Self { fields }
    }

    pub fn is_open(&self) -> bool {
        self.fields.is_empty()
    }

    fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }
}

impl SchemaValidator for Schema {
    fn validate(&self, fields: &Document) -> Result<(), Vec<Issue>> {
        if self.is_open() {
            return Ok(());
        }

        let mut issues = Vec::new();

        for def in &self.fields {
            match fields.get(&def.name) {
                None => {
                    if def.required {
                        issues.push(Issue::new(&def.name, "required field is missing"));
                    }
                }
                Some(Value::Null) => {
                    if !def.nullable {
                        issues.push(Issue::typed(
                            &def.name,
                            "field is not nullable",
                            def.field_type.name(),
                            "null",
                        ));
                    }
                }
                Some(value) => {
                    if !def.field_type.accepts(value) {
                        issues.push(Issue::typed(
                            &def.name,
                            "wrong type",
                            def.field_type.name(),
                            type_of(value),
                        ));
                    }
                }
            }
        }

        for name in fields.keys() {
            if self.field(name).is_none() {
                issues.push(Issue::new(name, "field is not declared in the schema"));
            }
        }

        if issues.is_empty() { Ok(()) } else { Err(issues) }
    }

    fn declares(&self, field: &str) -> bool {
        self.field(field).is_some()
    }
}
