use std::collections::HashMap;

use serde_json::Value;

use proseql_query::{FieldPredicate, Where};

use crate::index::key_for_values;

/// How a query obtains its candidate entities.
#[derive(Debug, Clone, PartialEq)]
pub enum Plan {
    /// Enumerate the whole collection.
    FullScan,
    /// Union the buckets for `keys` in the index on `fields`, then re-check
    /// each candidate against the full where clause.
    IndexLookup {
        fields: Vec<String>,
        keys: Vec<String>,
    },
}

/// Pick a plan for a where clause given the collection's index
/// declarations (in declaration order).
///
/// An index qualifies when the clause has an equality condition on its
/// single field, equalities on every field of the composite (matched
/// order-insensitively), or `$in` on a single indexed field. Null operands
/// disqualify an index — nulls are never indexed, so only a scan can find
/// them. Ties break toward the composite with the most matched fields,
/// then the index declared first.
pub fn plan(filter: Option<&Where>, indexes: &[Vec<String>]) -> Plan {
    let Some(filter) = filter else {
        return Plan::FullScan;
    };
    if filter.is_empty() || indexes.is_empty() {
        return Plan::FullScan;
    }

    let mut eq: HashMap<&str, &Value> = HashMap::new();
    let mut ins: HashMap<&str, &Vec<Value>> = HashMap::new();
    for condition in &filter.conditions {
        for predicate in &condition.predicates {
            match predicate {
                FieldPredicate::Eq(value) => {
                    eq.entry(condition.field.as_str()).or_insert(value);
                }
                FieldPredicate::In(items) => {
                    ins.entry(condition.field.as_str()).or_insert(items);
                }
                _ => {}
            }
        }
    }

    let mut best: Option<(usize, Plan)> = None;
    for decl in indexes {
        let candidate = match decl.as_slice() {
            [single] => single_field_keys(single, &eq, &ins),
            fields => composite_key(fields, &eq),
        };
        let Some(keys) = candidate else { continue };

        let matched = decl.len();
        let better = match &best {
            None => true,
            Some((best_matched, _)) => matched > *best_matched,
        };
        if better {
            best = Some((
                matched,
                Plan::IndexLookup {
                    fields: decl.clone(),
                    keys,
                },
            ));
        }
    }

    best.map(|(_, plan)| plan).unwrap_or(Plan::FullScan)
}

/// Bucket keys a single-field index can serve: one for an equality, one
/// per member for `$in`.
fn single_field_keys(
    field: &str,
    eq: &HashMap<&str, &Value>,
    ins: &HashMap<&str, &Vec<Value>>,
) -> Option<Vec<String>> {
    if let Some(value) = eq.get(field) {
        return key_for_values(std::slice::from_ref(*value)).map(|key| vec![key]);
    }
    if let Some(items) = ins.get(field) {
        let mut keys = Vec::with_capacity(items.len());
        for item in items.iter() {
            // A null member matches absent fields, which no bucket holds.
            keys.push(key_for_values(std::slice::from_ref(item))?);
        }
        return Some(keys);
    }
    None
}

/// The one bucket key a composite index can serve, when every field has an
/// equality condition.
fn composite_key(fields: &[String], eq: &HashMap<&str, &Value>) -> Option<Vec<String>> {
    let values: Vec<Value> = fields
        .iter()
        .map(|field| eq.get(field.as_str()).map(|v| (*v).clone()))
        .collect::<Option<_>>()?;
    key_for_values(&values).map(|key| vec![key])
}
