use serde_json::Value;

use crate::predicate::{Condition, FieldPredicate, Where};

/// Parse error for where-clause documents.
#[derive(Debug, Clone, PartialEq)]
pub struct WhereParseError(pub String);

impl std::fmt::Display for WhereParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "where parse error: {}", self.0)
    }
}

impl std::error::Error for WhereParseError {}

/// Parse a JSON where-clause document into a `Where`.
///
/// - Top-level document is an implicit AND of all entries
/// - `{ "field": value }` is implicit `$eq`
/// - `{ "field": { "$gt": v, "$lte": w } }` ANDs operator conditions
///
/// Unknown operators and malformed operands parse to
/// `FieldPredicate::Unsupported`, which never matches — a bad operator
/// shrinks the result set, it does not fail the query.
pub fn parse_where(value: &Value) -> Result<Where, WhereParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| WhereParseError("where clause must be an object".into()))?;

    let mut conditions = Vec::with_capacity(map.len());
    for (field, condition) in map {
        conditions.push(parse_condition(field, condition));
    }
    Ok(Where { conditions })
}

/// Parse one field entry: implicit `$eq` or an operator map.
fn parse_condition(field: &str, value: &Value) -> Condition {
    if let Value::Object(ops) = value {
        // An object whose first key starts with '$' is an operator map.
        if ops.keys().next().is_some_and(|k| k.starts_with('$')) {
            let predicates = ops
                .iter()
                .map(|(op, operand)| parse_operator(op, operand))
                .collect();
            return Condition {
                field: field.to_string(),
                predicates,
            };
        }
    }

    Condition {
        field: field.to_string(),
        predicates: vec![FieldPredicate::Eq(value.clone())],
    }
}

fn parse_operator(op: &str, operand: &Value) -> FieldPredicate {
    match op {
        "$eq" => FieldPredicate::Eq(operand.clone()),
        "$ne" => FieldPredicate::Ne(operand.clone()),
        "$in" => match operand.as_array() {
            Some(items) => FieldPredicate::In(items.clone()),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        "$nin" => match operand.as_array() {
            Some(items) => FieldPredicate::Nin(items.clone()),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        "$gt" => FieldPredicate::Gt(operand.clone()),
        "$gte" => FieldPredicate::Gte(operand.clone()),
        "$lt" => FieldPredicate::Lt(operand.clone()),
        "$lte" => FieldPredicate::Lte(operand.clone()),
        "$startsWith" => match operand.as_str() {
            Some(s) => FieldPredicate::StartsWith(s.to_string()),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        "$endsWith" => match operand.as_str() {
            Some(s) => FieldPredicate::EndsWith(s.to_string()),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        "$contains" => FieldPredicate::Contains(operand.clone()),
        "$search" => match operand.as_str() {
            Some(s) => FieldPredicate::Search(s.to_string()),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        "$all" => match operand.as_array() {
            Some(items) => FieldPredicate::All(items.clone()),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        "$size" => match operand.as_u64() {
            Some(n) => FieldPredicate::Size(n),
            None => FieldPredicate::Unsupported(op.to_string()),
        },
        other => FieldPredicate::Unsupported(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn bare_value_is_implicit_eq() {
        let w = parse_where(&json!({ "genre": "sci-fi" })).unwrap();
        assert_eq!(w.conditions.len(), 1);
        assert_eq!(w.conditions[0].field, "genre");
        assert_eq!(
            w.conditions[0].predicates,
            vec![FieldPredicate::Eq(json!("sci-fi"))]
        );
    }

    #[test]
    fn operator_map_ands_operators() {
        let w = parse_where(&json!({ "year": { "$gte": 1960, "$lte": 1985 } })).unwrap();
        assert_eq!(
            w.conditions[0].predicates,
            vec![
                FieldPredicate::Gte(json!(1960)),
                FieldPredicate::Lte(json!(1985)),
            ]
        );
    }

    #[test]
    fn nested_object_without_dollar_keys_is_eq() {
        let w = parse_where(&json!({ "address": { "city": "Berlin" } })).unwrap();
        assert_eq!(
            w.conditions[0].predicates,
            vec![FieldPredicate::Eq(json!({ "city": "Berlin" }))]
        );
    }

    #[test]
    fn unknown_operator_parses_as_unsupported() {
        let w = parse_where(&json!({ "year": { "$between": [1, 2] } })).unwrap();
        assert_eq!(
            w.conditions[0].predicates,
            vec![FieldPredicate::Unsupported("$between".into())]
        );
    }

    #[test]
    fn malformed_in_operand_parses_as_unsupported() {
        let w = parse_where(&json!({ "genre": { "$in": "sci-fi" } })).unwrap();
        assert_eq!(
            w.conditions[0].predicates,
            vec![FieldPredicate::Unsupported("$in".into())]
        );
    }

    #[test]
    fn non_object_clause_is_rejected() {
        assert!(parse_where(&json!([1, 2])).is_err());
    }
}
