use axum::Json;
use axum::extract::{Path, Query, State};

use proseql_db::AggregateResult;

use crate::error::ApiError;
use crate::parse;
use crate::routes::ensure_collection;
use crate::state::AppState;

pub async fn aggregate(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<AggregateResult>, ApiError> {
    ensure_collection(&state, &collection)?;
    let spec = parse::parse_aggregate(&pairs)?;
    Ok(Json(state.db.aggregate(&collection, &spec)?))
}
