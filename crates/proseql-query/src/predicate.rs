use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single predicate applied to one field.
///
/// `Contains` is dual-purpose: substring containment when the field is a
/// string, element equality when the field is an array. `Search` is
/// substring containment unless the database carries an analyzer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldPredicate {
    Eq(Value),
    Ne(Value),
    In(Vec<Value>),
    Nin(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
    StartsWith(String),
    EndsWith(String),
    Contains(Value),
    Search(String),
    All(Vec<Value>),
    Size(u64),
    /// Unknown operator, or a recognized operator with a malformed operand.
    /// Never matches.
    Unsupported(String),
}

/// All predicates for one field. Multiple predicates combine with AND.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub predicates: Vec<FieldPredicate>,
}

/// A conjunction of per-field conditions. Field order is preserved from the
/// source document but carries no semantic weight.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Where {
    pub conditions: Vec<Condition>,
}

impl Where {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shorthand for a single equality condition.
    pub fn eq(field: impl Into<String>, value: Value) -> Self {
        Self {
            conditions: vec![Condition {
                field: field.into(),
                predicates: vec![FieldPredicate::Eq(value)],
            }],
        }
    }

    /// Append a condition, returning self for chaining.
    pub fn and(mut self, field: impl Into<String>, predicate: FieldPredicate) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            predicates: vec![predicate],
        });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }
}
