use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::Value;

use proseql_db::{CreateManyOptions, DeleteOptions, Document, parse_patch};

use crate::error::ApiError;
use crate::parse;
use crate::routes::ensure_collection;
use crate::state::AppState;

type Pairs = Query<Vec<(String, String)>>;

fn body_object(value: Value) -> Result<Document, ApiError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::BadRequest("request body must be a JSON object".into())),
    }
}

pub async fn list(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(pairs): Pairs,
) -> Result<Json<Vec<Document>>, ApiError> {
    ensure_collection(&state, &collection)?;
    let query = parse::parse_query(&pairs)?;
    Ok(Json(state.db.find(&collection, query)?.collect_all()))
}

pub async fn get_by_id(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(pairs): Pairs,
) -> Result<Json<Document>, ApiError> {
    ensure_collection(&state, &collection)?;
    let mut doc = state.db.find_by_id(&collection, &id)?;
    if let Some(select) = parse::parse_query(&pairs)?.select {
        doc.retain(|field, _| field == "id" || select.contains(field));
    }
    Ok(Json(doc))
}

pub async fn create(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<Document>), ApiError> {
    ensure_collection(&state, &collection)?;
    let created = state.db.create(&collection, body_object(body)?)?;
    Ok((StatusCode::CREATED, Json(created)))
}

pub async fn update(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> Result<Json<Document>, ApiError> {
    ensure_collection(&state, &collection)?;
    let patch = parse_patch(&body).map_err(|e| ApiError::BadRequest(e.to_string()))?;
    Ok(Json(state.db.update(&collection, &id, &patch)?))
}

#[derive(Deserialize)]
pub struct DeleteParams {
    #[serde(default)]
    soft: bool,
}

pub async fn delete(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Query(params): Query<DeleteParams>,
) -> Result<Json<Document>, ApiError> {
    ensure_collection(&state, &collection)?;
    let options = DeleteOptions { soft: params.soft };
    Ok(Json(state.db.delete(&collection, &id, options)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    pub entities: Vec<Value>,
    #[serde(default)]
    pub skip_duplicates: bool,
}

pub async fn batch(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(body): Json<BatchRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    ensure_collection(&state, &collection)?;

    let inputs = body
        .entities
        .into_iter()
        .map(body_object)
        .collect::<Result<Vec<_>, _>>()?;
    let options = CreateManyOptions {
        skip_duplicates: body.skip_duplicates,
    };
    let result = state.db.create_many(&collection, inputs, options)?;

    let skipped: Vec<Value> = result
        .skipped
        .iter()
        .map(|s| serde_json::json!({ "id": s.id, "error": s.reason.to_string() }))
        .collect();
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "created": result.created, "skipped": skipped })),
    ))
}
