use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::{Number, Value};

use proseql_query::Where;
use proseql_query::value::{as_number, compare};
use proseql_store::{Document, Entity};

use crate::exec::{self, Analyzer};
use crate::state::CollectionData;

/// What to compute over the filtered entities, in one pass.
#[derive(Debug, Clone, Default)]
pub struct AggregateSpec {
    pub filter: Option<Where>,
    pub count: bool,
    pub sum: Vec<String>,
    pub avg: Vec<String>,
    pub min: Vec<String>,
    pub max: Vec<String>,
    pub group_by: Vec<String>,
}

impl AggregateSpec {
    pub fn count_all() -> Self {
        Self {
            count: true,
            ..Self::default()
        }
    }

    pub fn filtered(mut self, filter: Where) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn grouped_by(mut self, field: impl Into<String>) -> Self {
        self.group_by.push(field.into());
        self
    }

    pub fn summing(mut self, field: impl Into<String>) -> Self {
        self.sum.push(field.into());
        self
    }

    pub fn averaging(mut self, field: impl Into<String>) -> Self {
        self.avg.push(field.into());
        self
    }

    pub fn min_of(mut self, field: impl Into<String>) -> Self {
        self.min.push(field.into());
        self
    }

    pub fn max_of(mut self, field: impl Into<String>) -> Self {
        self.max.push(field.into());
        self
    }
}

/// One aggregate record. `group` is present only for grouped runs; the
/// other fields mirror what the spec requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateRow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub group: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sum: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avg: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<Document>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<Document>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AggregateResult {
    Single(AggregateRow),
    Grouped(Vec<AggregateRow>),
}

impl AggregateResult {
    pub fn single(&self) -> Option<&AggregateRow> {
        match self {
            AggregateResult::Single(row) => Some(row),
            AggregateResult::Grouped(_) => None,
        }
    }

    pub fn rows(&self) -> &[AggregateRow] {
        match self {
            AggregateResult::Single(row) => std::slice::from_ref(row),
            AggregateResult::Grouped(rows) => rows,
        }
    }
}

pub(crate) fn run(
    data: &CollectionData,
    indexes: &[Vec<String>],
    spec: &AggregateSpec,
    analyzer: Option<Arc<dyn Analyzer>>,
) -> AggregateResult {
    let entities = exec::filter_entities(data, indexes, spec.filter.as_ref(), analyzer);

    if spec.group_by.is_empty() {
        let mut acc = Accumulator::new(spec);
        for entity in entities {
            acc.observe(&entity);
        }
        return AggregateResult::Single(acc.into_row(None));
    }

    let mut groups: BTreeMap<String, (Document, Accumulator)> = BTreeMap::new();
    for entity in entities {
        let mut group = Document::new();
        let mut key_values = Vec::with_capacity(spec.group_by.len());
        for field in &spec.group_by {
            let value = entity.get(field).unwrap_or(Value::Null);
            group.insert(field.clone(), value.clone());
            key_values.push(value);
        }
        let key = serde_json::to_string(&key_values).unwrap_or_default();
        groups
            .entry(key)
            .or_insert_with(|| (group, Accumulator::new(spec)))
            .1
            .observe(&entity);
    }

    AggregateResult::Grouped(
        groups
            .into_values()
            .map(|(group, acc)| acc.into_row(Some(group)))
            .collect(),
    )
}

/// Single-pass accumulator for one group.
struct Accumulator<'s> {
    spec: &'s AggregateSpec,
    count: u64,
    sums: Vec<f64>,
    avgs: Vec<(f64, u64)>,
    mins: Vec<Option<Value>>,
    maxs: Vec<Option<Value>>,
}

impl<'s> Accumulator<'s> {
    fn new(spec: &'s AggregateSpec) -> Self {
        Self {
            spec,
            count: 0,
            sums: vec![0.0; spec.sum.len()],
            avgs: vec![(0.0, 0); spec.avg.len()],
            mins: vec![None; spec.min.len()],
            maxs: vec![None; spec.max.len()],
        }
    }

    fn observe(&mut self, entity: &Entity) {
        self.count += 1;

        for (i, field) in self.spec.sum.iter().enumerate() {
            if let Some(n) = entity.fields.get(field).and_then(as_number) {
                self.sums[i] += n;
            }
        }
        for (i, field) in self.spec.avg.iter().enumerate() {
            if let Some(n) = entity.fields.get(field).and_then(as_number) {
                self.avgs[i].0 += n;
                self.avgs[i].1 += 1;
            }
        }
        for (i, field) in self.spec.min.iter().enumerate() {
            if let Some(value) = entity.fields.get(field) {
                replace_extreme(&mut self.mins[i], value, std::cmp::Ordering::Less);
            }
        }
        for (i, field) in self.spec.max.iter().enumerate() {
            if let Some(value) = entity.fields.get(field) {
                replace_extreme(&mut self.maxs[i], value, std::cmp::Ordering::Greater);
            }
        }
    }

    fn into_row(self, group: Option<Document>) -> AggregateRow {
        let field_doc = |fields: &[String], values: Vec<Value>| -> Option<Document> {
            if fields.is_empty() {
                return None;
            }
            Some(fields.iter().cloned().zip(values).collect())
        };

        AggregateRow {
            group,
            count: self.spec.count.then_some(self.count),
            sum: field_doc(
                &self.spec.sum,
                self.sums.into_iter().map(number_value).collect(),
            ),
            avg: field_doc(
                &self.spec.avg,
                self.avgs
                    .into_iter()
                    .map(|(total, n)| {
                        if n == 0 {
                            Value::Null
                        } else {
                            number_value(total / n as f64)
                        }
                    })
                    .collect(),
            ),
            min: field_doc(
                &self.spec.min,
                self.mins
                    .into_iter()
                    .map(|v| v.unwrap_or(Value::Null))
                    .collect(),
            ),
            max: field_doc(
                &self.spec.max,
                self.maxs
                    .into_iter()
                    .map(|v| v.unwrap_or(Value::Null))
                    .collect(),
            ),
        }
    }
}

/// Track a running min/max. Null and incomparable values are skipped.
fn replace_extreme(current: &mut Option<Value>, candidate: &Value, keep: std::cmp::Ordering) {
    if !matches!(candidate, Value::Number(_) | Value::String(_)) {
        return;
    }
    match current {
        None => *current = Some(candidate.clone()),
        Some(existing) => {
            if compare(candidate, existing) == Some(keep) {
                *current = Some(candidate.clone());
            }
        }
    }
}

/// Integral results collapse to integers so `sum` of integer fields stays
/// an integer.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
        Value::Number(Number::from(n as i64))
    } else {
        Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null)
    }
}
