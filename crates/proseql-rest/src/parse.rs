use serde_json::{Map, Number, Value};

use proseql_db::{AggregateSpec, Query, Sort, SortDirection, parse_where};

use crate::error::ApiError;

/// Keys the URL syntax claims for itself. They are never treated as field
/// filters; the in-process API has no such restriction.
const RESERVED: [&str; 10] = [
    "sort", "limit", "offset", "select", "count", "sum", "avg", "min", "max", "groupBy",
];

/// Operators whose operand is a comma-separated list.
const LIST_OPERATORS: [&str; 3] = ["$in", "$nin", "$all"];

/// Map decoded query-string pairs onto a `Query`.
///
/// `field=value` is equality; `field[$op]=value` is an operator condition;
/// `sort=year:desc,title:asc`, `limit=N`, `offset=N` (invalid numbers are
/// ignored), `select=f1,f2`.
pub fn parse_query(pairs: &[(String, String)]) -> Result<Query, ApiError> {
    let mut query = Query {
        filter: filter_from_pairs(pairs)?,
        ..Query::default()
    };

    for (key, value) in pairs {
        match key.as_str() {
            "sort" => query.sort = parse_sort(value),
            "limit" => query.limit = value.parse().ok(),
            "offset" => query.offset = value.parse().ok(),
            "select" => query.select = Some(split_list(value)),
            _ => {}
        }
    }
    Ok(query)
}

/// Map decoded query-string pairs onto an `AggregateSpec`. The reserved
/// aggregate keys name fields; everything else filters.
pub fn parse_aggregate(pairs: &[(String, String)]) -> Result<AggregateSpec, ApiError> {
    let mut spec = AggregateSpec {
        filter: filter_from_pairs(pairs)?,
        ..AggregateSpec::default()
    };

    for (key, value) in pairs {
        match key.as_str() {
            "count" => spec.count = value == "true",
            "sum" => spec.sum = split_list(value),
            "avg" => spec.avg = split_list(value),
            "min" => spec.min = split_list(value),
            "max" => spec.max = split_list(value),
            "groupBy" => spec.group_by = split_list(value),
            _ => {}
        }
    }
    Ok(spec)
}

/// Build the where-clause document from the non-reserved pairs, then reuse
/// the engine's parser.
fn filter_from_pairs(pairs: &[(String, String)]) -> Result<Option<proseql_db::Where>, ApiError> {
    let mut filter_doc = Map::new();

    for (key, value) in pairs {
        if RESERVED.contains(&key.as_str()) {
            continue;
        }

        match split_operator_key(key) {
            Some((field, op)) => {
                let operand = if LIST_OPERATORS.contains(&op) {
                    Value::Array(split_list(value).iter().map(|s| coerce(s)).collect())
                } else {
                    coerce(value)
                };
                let entry = filter_doc
                    .entry(field.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                match entry {
                    Value::Object(ops) => {
                        ops.insert(op.to_string(), operand);
                    }
                    // A bare equality on the same field came first; the
                    // operator condition wins over re-stating it.
                    other => {
                        let mut ops = Map::new();
                        ops.insert("$eq".to_string(), other.clone());
                        ops.insert(op.to_string(), operand);
                        *other = Value::Object(ops);
                    }
                }
            }
            None => match filter_doc.get_mut(key) {
                // An operator condition on this field came first.
                Some(Value::Object(ops))
                    if ops.keys().next().is_some_and(|k| k.starts_with('$')) =>
                {
                    ops.insert("$eq".to_string(), coerce(value));
                }
                _ => {
                    filter_doc.insert(key.clone(), coerce(value));
                }
            },
        }
    }

    if filter_doc.is_empty() {
        return Ok(None);
    }
    parse_where(&Value::Object(filter_doc))
        .map(Some)
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Split `field[$op]` into its parts.
fn split_operator_key(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let close = key.strip_suffix(']')?;
    let op = &close[open + 1..];
    if !op.starts_with('$') {
        return None;
    }
    Some((&key[..open], op))
}

fn parse_sort(value: &str) -> Vec<Sort> {
    value
        .split(',')
        .filter_map(|part| {
            let part = part.trim();
            if part.is_empty() {
                return None;
            }
            let (field, direction) = match part.split_once(':') {
                Some((field, "desc")) => (field, SortDirection::Desc),
                Some((field, _)) => (field, SortDirection::Asc),
                None => (part, SortDirection::Asc),
            };
            Some(Sort {
                field: field.to_string(),
                direction,
            })
        })
        .collect()
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Type coercion for query-string values: exact "true"/"false" become
/// booleans; a string whose number parse round-trips to itself becomes a
/// number; everything else stays a string.
fn coerce(value: &str) -> Value {
    match value {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(i) = value.parse::<i64>() {
        if i.to_string() == value {
            return Value::Number(Number::from(i));
        }
    }
    if let Ok(f) = value.parse::<f64>() {
        if f.to_string() == value {
            if let Some(n) = Number::from_f64(f) {
                return Value::Number(n);
            }
        }
    }
    Value::String(value.to_string())
}
