use serde_json::{Map, Number, Value};

use crate::value::as_number;

/// A single field-level update operator.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldUpdate {
    /// Set a field to a value. Creates the field if it doesn't exist.
    Set(Value),
    /// Increment a numeric field by the given amount.
    Increment(f64),
    /// Decrement a numeric field by the given amount.
    Decrement(f64),
    /// Multiply a numeric field by the given factor.
    Multiply(f64),
    /// Append to a string (concatenation) or an array (push). Creates a
    /// single-element array if the field is missing.
    Append(Value),
    /// Remove every array element equal to the operand. No-op when the
    /// field is missing.
    Remove(Value),
    /// Flip a boolean field.
    Toggle,
}

/// A complete patch: a list of (field, operator) pairs applied in order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Patch {
    pub updates: Vec<(String, FieldUpdate)>,
}

/// Raised when an operator is applied to a field of the wrong type, e.g.
/// `$increment` on a string.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchApplyError {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for PatchApplyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "cannot patch field {}: {}", self.field, self.reason)
    }
}

impl std::error::Error for PatchApplyError {}

impl Patch {
    pub fn set(field: impl Into<String>, value: Value) -> Self {
        Self {
            updates: vec![(field.into(), FieldUpdate::Set(value))],
        }
    }

    pub fn and(mut self, field: impl Into<String>, update: FieldUpdate) -> Self {
        self.updates.push((field.into(), update));
        self
    }

    /// Apply every update to `fields` in order.
    pub fn apply(&self, fields: &mut Map<String, Value>) -> Result<(), PatchApplyError> {
        for (field, update) in &self.updates {
            apply_one(fields, field, update)?;
        }
        Ok(())
    }
}

fn apply_one(
    fields: &mut Map<String, Value>,
    field: &str,
    update: &FieldUpdate,
) -> Result<(), PatchApplyError> {
    let err = |reason: &str| PatchApplyError {
        field: field.to_string(),
        reason: reason.to_string(),
    };

    match update {
        FieldUpdate::Set(value) => {
            fields.insert(field.to_string(), value.clone());
        }
        FieldUpdate::Increment(amount) => {
            numeric_update(fields, field, |n| n + amount).map_err(|r| err(&r))?;
        }
        FieldUpdate::Decrement(amount) => {
            numeric_update(fields, field, |n| n - amount).map_err(|r| err(&r))?;
        }
        FieldUpdate::Multiply(factor) => {
            numeric_update(fields, field, |n| n * factor).map_err(|r| err(&r))?;
        }
        FieldUpdate::Append(value) => match fields.get_mut(field) {
            Some(Value::String(s)) => match value {
                Value::String(suffix) => s.push_str(suffix),
                _ => return Err(err("cannot append a non-string to a string")),
            },
            Some(Value::Array(items)) => items.push(value.clone()),
            Some(_) => return Err(err("append target must be a string or array")),
            None => {
                fields.insert(field.to_string(), Value::Array(vec![value.clone()]));
            }
        },
        FieldUpdate::Remove(value) => {
            if let Some(existing) = fields.get_mut(field) {
                match existing {
                    Value::Array(items) => {
                        items.retain(|item| !crate::value::values_eq(item, value));
                    }
                    _ => return Err(err("remove target must be an array")),
                }
            }
        }
        FieldUpdate::Toggle => match fields.get_mut(field) {
            Some(Value::Bool(b)) => *b = !*b,
            Some(_) => return Err(err("toggle target must be a boolean")),
            None => return Err(err("toggle target is missing")),
        },
    }
    Ok(())
}

/// Replace a numeric field with `f(current)`. Integer-valued results keep an
/// integer representation so they round-trip through the index key encoding.
fn numeric_update(
    fields: &mut Map<String, Value>,
    field: &str,
    f: impl Fn(f64) -> f64,
) -> Result<(), String> {
    let current = match fields.get(field) {
        Some(value) => as_number(value).ok_or("numeric operator on a non-numeric field")?,
        None => return Err("numeric operator on a missing field".into()),
    };
    let result = f(current);
    let number = if result.fract() == 0.0 && result.abs() < i64::MAX as f64 {
        Number::from(result as i64)
    } else {
        Number::from_f64(result).ok_or("numeric result is not representable")?
    };
    fields.insert(field.to_string(), Value::Number(number));
    Ok(())
}
