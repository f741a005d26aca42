use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value;

use proseql_query::value::{compare, sort_cmp, values_eq};
use proseql_query::{FieldPredicate, Query, Sort, SortDirection, Where};
use proseql_store::{Document, Entity};

use crate::cursor::Cursor;
use crate::planner::{self, Plan};
use crate::state::CollectionData;

/// Host-supplied text matching for `$search`. Without one, `$search` is
/// plain substring containment.
pub trait Analyzer: Send + Sync {
    fn matches(&self, haystack: &str, query: &str) -> bool;
}

// ── Matching ────────────────────────────────────────────────────

/// The reference evaluator: whether an entity satisfies every condition of
/// a where clause. The planner may narrow candidates through an index, but
/// every candidate is re-checked here, so indexed and scanned plans agree.
pub fn matches_where(entity: &Entity, filter: &Where, analyzer: Option<&dyn Analyzer>) -> bool {
    filter.conditions.iter().all(|condition| {
        let id_value;
        let value = if condition.field == "id" {
            id_value = Value::String(entity.id.clone());
            Some(&id_value)
        } else {
            entity.fields.get(&condition.field)
        };
        condition
            .predicates
            .iter()
            .all(|predicate| matches_predicate(value, predicate, analyzer))
    })
}

/// Null operands stand in for "undefined": `Eq(null)` matches an absent
/// field, and a present null field matches a null operand.
fn eq_matches(value: Option<&Value>, operand: &Value) -> bool {
    match value {
        None => operand.is_null(),
        Some(v) => values_eq(v, operand),
    }
}

fn matches_predicate(
    value: Option<&Value>,
    predicate: &FieldPredicate,
    analyzer: Option<&dyn Analyzer>,
) -> bool {
    match predicate {
        FieldPredicate::Eq(operand) => eq_matches(value, operand),
        FieldPredicate::Ne(operand) => !eq_matches(value, operand),
        FieldPredicate::In(items) => items.iter().any(|item| eq_matches(value, item)),
        FieldPredicate::Nin(items) => !items.iter().any(|item| eq_matches(value, item)),
        FieldPredicate::Gt(operand) => ordered(value, operand, |o| o == Ordering::Greater),
        FieldPredicate::Gte(operand) => ordered(value, operand, |o| o != Ordering::Less),
        FieldPredicate::Lt(operand) => ordered(value, operand, |o| o == Ordering::Less),
        FieldPredicate::Lte(operand) => ordered(value, operand, |o| o != Ordering::Greater),
        FieldPredicate::StartsWith(prefix) => {
            value.and_then(Value::as_str).is_some_and(|s| s.starts_with(prefix))
        }
        FieldPredicate::EndsWith(suffix) => {
            value.and_then(Value::as_str).is_some_and(|s| s.ends_with(suffix))
        }
        FieldPredicate::Contains(operand) => contains(value, operand),
        FieldPredicate::Search(needle) => match value.and_then(Value::as_str) {
            Some(haystack) => match analyzer {
                Some(analyzer) => analyzer.matches(haystack, needle),
                None => haystack.contains(needle.as_str()),
            },
            None => false,
        },
        FieldPredicate::All(items) => value.and_then(Value::as_array).is_some_and(|elements| {
            items
                .iter()
                .all(|item| elements.iter().any(|el| values_eq(el, item)))
        }),
        FieldPredicate::Size(n) => value
            .and_then(Value::as_array)
            .is_some_and(|elements| elements.len() as u64 == *n),
        FieldPredicate::Unsupported(_) => false,
    }
}

/// Ordered comparison against a present, comparable value; anything else
/// (absent, null, type mismatch) is false.
fn ordered(value: Option<&Value>, operand: &Value, pred: fn(Ordering) -> bool) -> bool {
    match value {
        Some(v) if !v.is_null() => compare(v, operand).map(pred).unwrap_or(false),
        _ => false,
    }
}

/// String containment or array membership, depending on the field's type.
fn contains(value: Option<&Value>, operand: &Value) -> bool {
    match value {
        Some(Value::String(haystack)) => operand
            .as_str()
            .is_some_and(|needle| haystack.contains(needle)),
        Some(Value::Array(elements)) => elements.iter().any(|el| values_eq(el, operand)),
        _ => false,
    }
}

// ── Sorting and projection ──────────────────────────────────────

pub fn apply_sort(entities: &mut [Arc<Entity>], sorts: &[Sort]) {
    entities.sort_by(|a, b| {
        for sort in sorts {
            let ord = cmp_by_field(a, b, &sort.field);
            let ord = match sort.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

fn cmp_by_field(a: &Entity, b: &Entity, field: &str) -> Ordering {
    if field == "id" {
        return a.id.cmp(&b.id);
    }
    sort_cmp(a.fields.get(field), b.fields.get(field))
}

/// Narrow an entity to the selected fields. `id` is always kept.
pub fn apply_select(entity: &Entity, select: &[String]) -> Document {
    let mut doc = Document::new();
    doc.insert("id".to_string(), Value::String(entity.id.clone()));
    for field in select {
        if field == "id" {
            continue;
        }
        if let Some(value) = entity.fields.get(field) {
            doc.insert(field.clone(), value.clone());
        }
    }
    doc
}

// ── Pipeline ────────────────────────────────────────────────────

/// Filtered entity stream: planner-chosen candidates re-checked against the
/// full where clause. Owns O(1) clones of the snapshot's maps, so it
/// outlives the borrow it was built from.
pub fn filter_entities(
    data: &CollectionData,
    indexes: &[Vec<String>],
    filter: Option<&Where>,
    analyzer: Option<Arc<dyn Analyzer>>,
) -> Box<dyn Iterator<Item = Arc<Entity>> + Send> {
    let candidates: Box<dyn Iterator<Item = Arc<Entity>> + Send> =
        match planner::plan(filter, indexes) {
            Plan::FullScan => Box::new(data.entities.clone().into_iter().map(|(_, e)| e)),
            Plan::IndexLookup { fields, keys } => {
                let ids = data.indexes.lookup_many(&fields, &keys);
                let entities = data.entities.clone();
                Box::new(
                    ids.into_iter()
                        .filter_map(move |id| entities.get(&id).cloned()),
                )
            }
        };

    match filter {
        None => candidates,
        Some(filter) => {
            let filter = filter.clone();
            Box::new(candidates.filter(move |entity| {
                matches_where(entity, &filter, analyzer.as_deref())
            }))
        }
    }
}

/// Matching ids, in candidate order. Used by the multi-entity mutations.
pub fn filter_ids(
    data: &CollectionData,
    indexes: &[Vec<String>],
    filter: Option<&Where>,
    analyzer: Option<Arc<dyn Analyzer>>,
) -> Vec<String> {
    filter_entities(data, indexes, filter, analyzer)
        .map(|entity| entity.id.clone())
        .collect()
}

/// Full query pipeline: candidates → filter → sort → offset/limit →
/// projection. Sorting materializes; everything else streams.
pub fn run_query(
    data: &CollectionData,
    indexes: &[Vec<String>],
    query: &Query,
    analyzer: Option<Arc<dyn Analyzer>>,
) -> Cursor {
    let mut stream = filter_entities(data, indexes, query.filter.as_ref(), analyzer);

    if !query.sort.is_empty() {
        let mut collected: Vec<Arc<Entity>> = stream.collect();
        apply_sort(&mut collected, &query.sort);
        stream = Box::new(collected.into_iter());
    }

    if let Some(offset) = query.offset {
        stream = Box::new(stream.skip(offset));
    }
    if let Some(limit) = query.limit {
        stream = Box::new(stream.take(limit));
    }

    let select = query.select.clone();
    Cursor::new(Box::new(stream.map(move |entity| match &select {
        Some(fields) => apply_select(&entity, fields),
        None => entity.to_document(),
    })))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use proseql_query::parse_where;

    use super::*;

    fn entity(id: &str, fields: serde_json::Value) -> Entity {
        Entity::new(id, fields.as_object().unwrap().clone())
    }

    fn matches(fields: serde_json::Value, filter: serde_json::Value) -> bool {
        let e = entity("1", fields);
        matches_where(&e, &parse_where(&filter).unwrap(), None)
    }

    #[test]
    fn type_mismatches_are_false_not_errors() {
        assert!(!matches(json!({ "active": true }), json!({ "active": { "$gt": 1 } })));
        assert!(!matches(json!({ "year": 1965 }), json!({ "year": { "$startsWith": "19" } })));
        assert!(!matches(json!({ "year": 1965 }), json!({ "year": { "$totallyMadeUp": 1 } })));
    }

    #[test]
    fn null_semantics() {
        assert!(matches(json!({}), json!({ "genre": { "$eq": null } })));
        assert!(matches(json!({ "genre": null }), json!({ "genre": null })));
        assert!(!matches(json!({}), json!({ "genre": { "$ne": null } })));
        assert!(!matches(json!({}), json!({ "genre": { "$gt": "a" } })));
        assert!(matches(json!({}), json!({ "genre": { "$ne": "sci-fi" } })));
    }

    #[test]
    fn string_operators() {
        let fields = json!({ "title": "Neuromancer" });
        assert!(matches(fields.clone(), json!({ "title": { "$startsWith": "Neuro" } })));
        assert!(matches(fields.clone(), json!({ "title": { "$endsWith": "mancer" } })));
        assert!(matches(fields.clone(), json!({ "title": { "$contains": "roman" } })));
        assert!(matches(fields.clone(), json!({ "title": { "$search": "roman" } })));
        assert!(!matches(fields, json!({ "title": { "$contains": "xyz" } })));
    }

    #[test]
    fn array_operators() {
        let fields = json!({ "tags": ["classic", "space", "epic"] });
        assert!(matches(fields.clone(), json!({ "tags": { "$contains": "space" } })));
        assert!(matches(fields.clone(), json!({ "tags": { "$all": ["space", "epic"] } })));
        assert!(!matches(fields.clone(), json!({ "tags": { "$all": ["space", "other"] } })));
        assert!(matches(fields.clone(), json!({ "tags": { "$size": 3 } })));
        assert!(!matches(fields, json!({ "tags": { "$size": 2 } })));
    }

    #[test]
    fn in_and_ranges_combine_with_and() {
        let fields = json!({ "year": 1984, "genre": "sci-fi" });
        assert!(matches(
            fields.clone(),
            json!({ "year": { "$gte": 1960, "$lte": 1985 }, "genre": { "$in": ["sci-fi", "fantasy"] } })
        ));
        assert!(!matches(
            fields,
            json!({ "year": { "$gte": 1990 }, "genre": "sci-fi" })
        ));
    }

    #[test]
    fn sort_is_stable_and_multi_key() {
        let mut entities = vec![
            Arc::new(entity("2", json!({ "genre": "sci-fi", "year": 1984 }))),
            Arc::new(entity("1", json!({ "genre": "sci-fi", "year": 1965 }))),
            Arc::new(entity("3", json!({ "genre": "fantasy", "year": 1937 }))),
        ];
        apply_sort(
            &mut entities,
            &[Sort::asc("genre"), Sort::desc("year")],
        );
        let ids: Vec<_> = entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["3", "2", "1"]);
    }

    #[test]
    fn select_always_keeps_id() {
        let e = entity("1", json!({ "title": "Dune", "year": 1965 }));
        let doc = apply_select(&e, &["title".to_string()]);
        assert_eq!(doc.get("id"), Some(&json!("1")));
        assert_eq!(doc.get("title"), Some(&json!("Dune")));
        assert!(doc.get("year").is_none());
    }
}
