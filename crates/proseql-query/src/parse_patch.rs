use serde_json::Value;

use crate::patch::{FieldUpdate, Patch};

/// Parse error for patch documents.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchParseError(pub String);

impl std::fmt::Display for PatchParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "patch parse error: {}", self.0)
    }
}

impl std::error::Error for PatchParseError {}

/// Parse a JSON patch document into a validated `Patch`.
///
/// Each field maps either to a bare value (implicit `$set`) or to an
/// operator object like `{ "$increment": 2 }`. Patching `id` is rejected.
///
/// Unlike where-clause parsing, a malformed patch is an error: a query
/// with a bad operator returns nothing, but a write with a bad operator
/// must not silently do nothing.
pub fn parse_patch(value: &Value) -> Result<Patch, PatchParseError> {
    let map = value
        .as_object()
        .ok_or_else(|| PatchParseError("patch must be an object".into()))?;

    let mut updates = Vec::with_capacity(map.len());
    for (field, spec) in map {
        if field == "id" {
            return Err(PatchParseError("cannot patch the id field".into()));
        }
        parse_field(field, spec, &mut updates)?;
    }
    Ok(Patch { updates })
}

fn parse_field(
    field: &str,
    spec: &Value,
    updates: &mut Vec<(String, FieldUpdate)>,
) -> Result<(), PatchParseError> {
    if let Value::Object(ops) = spec {
        if ops.keys().next().is_some_and(|k| k.starts_with('$')) {
            for (op, operand) in ops {
                updates.push((field.to_string(), parse_operator(field, op, operand)?));
            }
            return Ok(());
        }
    }

    updates.push((field.to_string(), FieldUpdate::Set(spec.clone())));
    Ok(())
}

fn parse_operator(
    field: &str,
    op: &str,
    operand: &Value,
) -> Result<FieldUpdate, PatchParseError> {
    let numeric = |update: fn(f64) -> FieldUpdate| {
        operand
            .as_f64()
            .map(update)
            .ok_or_else(|| PatchParseError(format!("{op} on {field} requires a numeric operand")))
    };

    match op {
        "$set" => Ok(FieldUpdate::Set(operand.clone())),
        "$increment" => numeric(FieldUpdate::Increment),
        "$decrement" => numeric(FieldUpdate::Decrement),
        "$multiply" => numeric(FieldUpdate::Multiply),
        "$append" => Ok(FieldUpdate::Append(operand.clone())),
        "$remove" => Ok(FieldUpdate::Remove(operand.clone())),
        "$toggle" => match operand {
            Value::Bool(true) | Value::Null => Ok(FieldUpdate::Toggle),
            _ => Err(PatchParseError(format!(
                "$toggle on {field} takes no meaningful operand"
            ))),
        },
        other => Err(PatchParseError(format!("unknown patch operator: {other}"))),
    }
}
