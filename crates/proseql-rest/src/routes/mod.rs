mod aggregate;
mod entities;

use axum::Router;
use axum::routing::{get, post};

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{collection}", get(entities::list).post(entities::create))
        .route("/{collection}/batch", post(entities::batch))
        .route("/{collection}/aggregate", get(aggregate::aggregate))
        .route(
            "/{collection}/{id}",
            get(entities::get_by_id)
                .patch(entities::update)
                .delete(entities::delete),
        )
}

/// Unknown collections are a 404 at the HTTP boundary, before any engine
/// call runs.
pub(crate) fn ensure_collection(state: &AppState, name: &str) -> Result<(), ApiError> {
    if state.db.has_collection(name) {
        Ok(())
    } else {
        Err(ApiError::UnknownCollection(name.to_string()))
    }
}
