use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;

use proseql_store::Entity;

use crate::config::DeletePolicy;
use crate::error::{DbError, MutationKind};
use crate::hooks;
use crate::index::key_for_values;
use crate::schema::SchemaValidator;
use crate::workset::WorkingSet;

/// Validate every declared ref field of an entity: a non-null value must be
/// the id of an existing entity in the target collection.
pub(crate) fn check_refs(
    ws: &mut WorkingSet,
    collection: &str,
    entity: &Entity,
) -> Result<(), DbError> {
    let handle = ws.handle("create", collection)?;
    for rel in &handle.config.relationships {
        check_ref(ws, collection, entity, &rel.field, &rel.target)?;
    }
    Ok(())
}

/// Re-validate only the ref fields an update actually changed.
pub(crate) fn check_changed_refs(
    ws: &mut WorkingSet,
    collection: &str,
    old: &Entity,
    new: &Entity,
) -> Result<(), DbError> {
    let handle = ws.handle("update", collection)?;
    for rel in &handle.config.relationships {
        if old.fields.get(&rel.field) == new.fields.get(&rel.field) {
            continue;
        }
        check_ref(ws, collection, new, &rel.field, &rel.target)?;
    }
    Ok(())
}

fn check_ref(
    ws: &mut WorkingSet,
    collection: &str,
    entity: &Entity,
    field: &str,
    target: &str,
) -> Result<(), DbError> {
    let Some(value) = entity.fields.get(field) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }

    let violation = || DbError::ForeignKey {
        collection: collection.to_string(),
        field: field.to_string(),
        value: value.clone(),
        target: target.to_string(),
    };

    let id = value.as_str().ok_or_else(|| violation())?;
    if !ws.data("create", target)?.contains(id) {
        return Err(violation());
    }
    Ok(())
}

/// Delete an entity, enforcing every incoming relationship's policy first.
///
/// Cascades mark each (collection, id) they visit and never re-enter a
/// marked pair, so cyclic relationship graphs terminate: an entity moves
/// `present → marked → removed` at most once per top-level delete.
pub(crate) fn delete_entity(
    ws: &mut WorkingSet,
    collection: &str,
    id: &str,
    marked: &mut HashSet<(String, String)>,
) -> Result<Arc<Entity>, DbError> {
    let handle = ws.handle("delete", collection)?;
    if handle.config.append_only {
        return Err(DbError::operation("delete", "collection is append-only"));
    }

    let entity = ws
        .data("delete", collection)?
        .get(id)
        .cloned()
        .ok_or_else(|| DbError::NotFound {
            collection: collection.to_string(),
            id: id.to_string(),
        })?;

    hooks::run(
        handle.config.hooks.before_delete.as_ref(),
        "before_delete",
        collection,
        MutationKind::Delete,
        &entity.to_document(),
    )?;

    marked.insert((collection.to_string(), id.to_string()));

    let incoming = ws.db.incoming_refs(collection).to_vec();
    for inc in incoming {
        let referrers = referrer_ids(ws, &inc.source, &inc.field, id)?;
        let live: Vec<String> = referrers
            .into_iter()
            .filter(|rid| !marked.contains(&(inc.source.clone(), rid.clone())))
            .collect();
        if live.is_empty() {
            continue;
        }

        match inc.policy {
            DeletePolicy::Restrict => {
                return Err(DbError::ForeignKey {
                    collection: inc.source.clone(),
                    field: inc.field.clone(),
                    value: Value::String(id.to_string()),
                    target: collection.to_string(),
                });
            }
            DeletePolicy::Cascade => {
                for rid in live {
                    // An earlier branch of this cascade may have gotten here.
                    if !marked.contains(&(inc.source.clone(), rid.clone())) {
                        delete_entity(ws, &inc.source, &rid, marked)?;
                    }
                }
            }
            DeletePolicy::SetNull => {
                let source_handle = ws.handle("delete", &inc.source)?;
                for rid in live {
                    let data = ws.data_mut("delete", &inc.source)?;
                    let Some(current) = data.get(&rid).cloned() else {
                        continue;
                    };
                    let mut fields = current.fields.clone();
                    fields.insert(inc.field.clone(), Value::Null);
                    source_handle
                        .config
                        .schema
                        .validate(&fields)
                        .map_err(|issues| DbError::Validation { issues })?;
                    data.set(Arc::new(Entity::new(rid.clone(), fields)));
                }
            }
        }
    }

    ws.data_mut("delete", collection)?
        .remove(id)
        .ok_or_else(|| DbError::operation("delete", "entity vanished during cascade"))
}

/// Ids in `source` whose ref `field` holds `id`. Served by the implicit
/// index on every ref field; falls back to a scan when no index exists.
fn referrer_ids(
    ws: &mut WorkingSet,
    source: &str,
    field: &str,
    id: &str,
) -> Result<Vec<String>, DbError> {
    let data = ws.data("delete", source)?;
    let fields = vec![field.to_string()];

    if data.indexes.has_index(&fields) {
        let Some(key) = key_for_values(&[Value::String(id.to_string())]) else {
            return Ok(Vec::new());
        };
        return Ok(data
            .indexes
            .lookup(&fields, &key)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default());
    }

    Ok(data
        .entities
        .values()
        .filter(|e| e.fields.get(field).and_then(Value::as_str) == Some(id))
        .map(|e| e.id.clone())
        .collect())
}
