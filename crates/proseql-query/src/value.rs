//! Value algebra shared by the where-clause matcher, sort, and aggregation.

use std::cmp::Ordering;

use serde_json::Value;

/// Numeric-aware equality. Numbers compare by value (`1 == 1.0`); everything
/// else is deep equality.
pub fn values_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        },
        _ => a == b,
    }
}

/// Ordered comparison for the range operators. Defined for number/number
/// and string/string pairs only; anything else is incomparable and the
/// operator evaluates to false.
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort comparator. Missing and null values sort greatest; numbers compare
/// numerically, strings lexicographically; incomparable pairs tie so the
/// sort stays stable.
pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => compare(a, b).unwrap_or(Ordering::Equal),
    }
}

/// Numeric view of a value, for aggregation and the numeric patch
/// operators.
pub fn as_number(v: &Value) -> Option<f64> {
    v.as_f64()
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn numbers_compare_across_representations() {
        assert!(values_eq(&json!(1), &json!(1.0)));
        assert!(!values_eq(&json!(1), &json!("1")));
        assert_eq!(compare(&json!(2), &json!(10)), Some(Ordering::Less));
        assert_eq!(compare(&json!("2"), &json!("10")), Some(Ordering::Greater));
        assert_eq!(compare(&json!(2), &json!("10")), None);
    }

    #[test]
    fn nulls_sort_greatest() {
        let a = json!(5);
        assert_eq!(sort_cmp(Some(&a), None), Ordering::Less);
        assert_eq!(sort_cmp(Some(&a), Some(&Value::Null)), Ordering::Less);
        assert_eq!(sort_cmp(None, Some(&Value::Null)), Ordering::Equal);
    }
}
