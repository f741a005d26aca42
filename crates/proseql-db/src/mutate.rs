use std::collections::HashSet;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;

use proseql_query::value::values_eq;
use proseql_query::{FieldPredicate, Patch, Where};
use proseql_store::{Document, Entity};

use crate::error::{DbError, Issue, MutationKind};
use crate::exec;
use crate::hooks;
use crate::relations;
use crate::result::{
    CreateManyOptions, CreateManyResult, DeleteManyResult, DeleteOptions, Skipped,
    UpdateManyResult, UpsertOp, UpsertResult, UpsertSpec,
};
use crate::schema::SchemaValidator;
use crate::workset::WorkingSet;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn soft_deleted(entity: &Entity) -> bool {
    entity
        .fields
        .get("deletedAt")
        .is_some_and(|v| !v.is_null())
}

// ── create ──────────────────────────────────────────────────────

/// Create one entity. Order: hook, schema validation, duplicate id,
/// unique constraints, foreign keys, then the state and index write.
pub(crate) fn create(
    ws: &mut WorkingSet,
    collection: &str,
    input: Document,
) -> Result<Document, DbError> {
    let handle = ws.handle("create", collection)?;

    hooks::run(
        handle.config.hooks.before_create.as_ref(),
        "before_create",
        collection,
        MutationKind::Create,
        &input,
    )?;

    let mut input = input;
    let id = match input.remove("id") {
        None => uuid::Uuid::new_v4().to_string(),
        Some(Value::String(id)) => id,
        Some(_) => {
            return Err(DbError::Validation {
                issues: vec![Issue::new("id", "id must be a string")],
            });
        }
    };
    let entity = Entity::new(id, input);

    handle
        .config
        .schema
        .validate(&entity.fields)
        .map_err(|issues| DbError::Validation { issues })?;

    if ws.data("create", collection)?.contains(&entity.id) {
        return Err(DbError::DuplicateKey {
            collection: collection.to_string(),
            field: "id".to_string(),
            value: Value::String(entity.id.clone()),
            existing_id: entity.id.clone(),
        });
    }

    for constraint in &handle.config.unique {
        check_unique(ws, collection, &entity, constraint, None)?;
    }

    relations::check_refs(ws, collection, &entity)?;

    let entity = Arc::new(entity);
    ws.data_mut("create", collection)?.set(entity.clone());

    let doc = entity.to_document();
    if handle.config.persistence.is_some() {
        ws.queue_append(collection, doc.clone());
    }
    Ok(doc)
}

pub(crate) fn create_many(
    ws: &mut WorkingSet,
    collection: &str,
    inputs: Vec<Document>,
    options: CreateManyOptions,
) -> Result<CreateManyResult, DbError> {
    let mut result = CreateManyResult::default();

    for input in inputs {
        let id_hint = input
            .get("id")
            .and_then(Value::as_str)
            .map(String::from);
        match create(ws, collection, input) {
            Ok(doc) => result.created.push(doc),
            Err(reason) if options.skip_duplicates && skippable(&reason) => {
                result.skipped.push(Skipped {
                    id: id_hint,
                    reason,
                });
            }
            Err(e) => return Err(e),
        }
    }
    Ok(result)
}

fn skippable(error: &DbError) -> bool {
    matches!(
        error,
        DbError::DuplicateKey { .. } | DbError::UniqueConstraint { .. } | DbError::ForeignKey { .. }
    )
}

// ── update ──────────────────────────────────────────────────────

/// Patch one entity. Soft-deleted entities are invisible to update.
pub(crate) fn update(
    ws: &mut WorkingSet,
    collection: &str,
    id: &str,
    patch: &Patch,
) -> Result<Document, DbError> {
    let handle = ws.handle("update", collection)?;
    if handle.config.append_only {
        return Err(DbError::operation("update", "collection is append-only"));
    }

    let not_found = || DbError::NotFound {
        collection: collection.to_string(),
        id: id.to_string(),
    };
    let current = ws
        .data("update", collection)?
        .get(id)
        .cloned()
        .ok_or_else(not_found)?;
    if soft_deleted(&current) {
        return Err(not_found());
    }

    hooks::run(
        handle.config.hooks.before_update.as_ref(),
        "before_update",
        collection,
        MutationKind::Update,
        &current.to_document(),
    )?;

    if patch.updates.iter().any(|(field, _)| field == "id") {
        return Err(DbError::operation("update", "cannot patch the id field"));
    }

    let mut fields = current.fields.clone();
    patch.apply(&mut fields)?;

    handle
        .config
        .schema
        .validate(&fields)
        .map_err(|issues| DbError::Validation { issues })?;

    let updated = Entity::new(id, fields);

    for constraint in &handle.config.unique {
        check_unique(ws, collection, &updated, constraint, Some(id))?;
    }

    relations::check_changed_refs(ws, collection, &current, &updated)?;

    let updated = Arc::new(updated);
    ws.data_mut("update", collection)?.set(updated.clone());
    Ok(updated.to_document())
}

pub(crate) fn update_many(
    ws: &mut WorkingSet,
    collection: &str,
    filter: &Where,
    patch: &Patch,
) -> Result<UpdateManyResult, DbError> {
    let ids = candidate_ids(ws, "update", collection, filter)?;

    let mut result = UpdateManyResult::default();
    for id in ids {
        // Entities the filter matched but a previous patch soft-hid would
        // fail with NotFound and abort the batch, as all-or-nothing asks.
        let doc = update(ws, collection, &id, patch)?;
        result.entities.push(doc);
    }
    result.count = result.entities.len();
    Ok(result)
}

// ── delete ──────────────────────────────────────────────────────

pub(crate) fn delete(
    ws: &mut WorkingSet,
    collection: &str,
    id: &str,
    options: DeleteOptions,
) -> Result<Document, DbError> {
    let handle = ws.handle("delete", collection)?;

    if options.soft {
        if handle.config.append_only {
            return Err(DbError::operation("delete", "collection is append-only"));
        }
        if !handle.config.soft_deletes() {
            return Err(DbError::operation(
                "delete",
                "soft delete requires a deletedAt field in the schema",
            ));
        }

        let not_found = || DbError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        };
        let current = ws
            .data("delete", collection)?
            .get(id)
            .cloned()
            .ok_or_else(not_found)?;
        if soft_deleted(&current) {
            return Err(not_found());
        }

        hooks::run(
            handle.config.hooks.before_delete.as_ref(),
            "before_delete",
            collection,
            MutationKind::Delete,
            &current.to_document(),
        )?;

        let stamped = ws
            .data_mut("delete", collection)?
            .update(id, |entity| {
                let mut fields = entity.fields.clone();
                fields.insert("deletedAt".to_string(), Value::from(now_millis()));
                Entity::new(entity.id.clone(), fields)
            })
            .ok_or_else(not_found)?;
        return Ok(stamped.to_document());
    }

    let mut marked = HashSet::new();
    let deleted = relations::delete_entity(ws, collection, id, &mut marked)?;
    Ok(deleted.to_document())
}

pub(crate) fn delete_many(
    ws: &mut WorkingSet,
    collection: &str,
    filter: &Where,
    options: DeleteOptions,
) -> Result<DeleteManyResult, DbError> {
    let ids = candidate_ids(ws, "delete", collection, filter)?;

    let mut result = DeleteManyResult::default();
    for id in ids {
        // A cascade from an earlier delete in this batch may have removed
        // this candidate already.
        if !ws.data("delete", collection)?.contains(&id) {
            continue;
        }
        let doc = delete(ws, collection, &id, options)?;
        result.entities.push(doc);
    }
    result.count = result.entities.len();
    Ok(result)
}

// ── upsert ──────────────────────────────────────────────────────

pub(crate) fn upsert(
    ws: &mut WorkingSet,
    collection: &str,
    spec: UpsertSpec,
    unique_fields: Option<&[String]>,
) -> Result<UpsertResult, DbError> {
    let identifying = match unique_fields {
        None => spec.filter.clone(),
        Some(fields) => Where {
            conditions: spec
                .filter
                .conditions
                .iter()
                .filter(|c| fields.contains(&c.field))
                .cloned()
                .collect(),
        },
    };

    let ids = candidate_ids(ws, "upsert", collection, &identifying)?;
    match ids.as_slice() {
        [] => {
            let mut input = spec.create;
            // Identifying equality values flow into the new entity unless
            // the create document already pins them.
            for condition in &spec.filter.conditions {
                if input.contains_key(&condition.field) {
                    continue;
                }
                if let Some(FieldPredicate::Eq(value)) = condition.predicates.first() {
                    input.insert(condition.field.clone(), value.clone());
                }
            }
            let entity = create(ws, collection, input)?;
            Ok(UpsertResult {
                operation: UpsertOp::Created,
                entity,
            })
        }
        [id] => {
            let entity = update(ws, collection, id, &spec.update)?;
            Ok(UpsertResult {
                operation: UpsertOp::Updated,
                entity,
            })
        }
        many => Err(DbError::operation(
            "upsert",
            format!("where clause matched {} entities", many.len()),
        )),
    }
}

// ── shared checks ───────────────────────────────────────────────

fn candidate_ids(
    ws: &mut WorkingSet,
    op: &str,
    collection: &str,
    filter: &Where,
) -> Result<Vec<String>, DbError> {
    let handle = ws.handle(op, collection)?;
    let analyzer = ws.db.analyzer();
    let data = ws.data(op, collection)?;
    Ok(exec::filter_ids(
        data,
        &handle.indexes,
        Some(filter),
        analyzer,
    ))
}

/// Enforce one jointly-unique field set. Entities missing any constraint
/// field (or holding null there) are exempt.
fn check_unique(
    ws: &mut WorkingSet,
    collection: &str,
    entity: &Entity,
    constraint: &[String],
    exclude: Option<&str>,
) -> Result<(), DbError> {
    let values: Vec<Value> = constraint
        .iter()
        .map(|field| entity.get(field).unwrap_or(Value::Null))
        .collect();
    if values.iter().any(Value::is_null) {
        return Ok(());
    }

    let data = ws.data("unique", collection)?;

    let existing = if data.indexes.has_index(constraint) {
        match crate::index::key_for_values(&values) {
            Some(key) => data
                .indexes
                .lookup(constraint, &key)
                .and_then(|ids| ids.iter().find(|id| Some(id.as_str()) != exclude).cloned()),
            None => None,
        }
    } else {
        data.entities
            .values()
            .find(|candidate| {
                Some(candidate.id.as_str()) != exclude
                    && constraint.iter().zip(&values).all(|(field, value)| {
                        candidate
                            .get(field)
                            .is_some_and(|actual| values_eq(&actual, value))
                    })
            })
            .map(|candidate| candidate.id.clone())
    };

    match existing {
        Some(existing_id) if Some(existing_id.as_str()) != exclude => {
            Err(DbError::UniqueConstraint {
                collection: collection.to_string(),
                constraint: constraint.join("+"),
                fields: constraint.to_vec(),
                values,
                existing_id,
            })
        }
        _ => Ok(()),
    }
}
