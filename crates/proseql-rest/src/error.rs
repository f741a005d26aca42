use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use proseql_db::DbError;

#[derive(Debug)]
pub enum ApiError {
    Db(DbError),
    UnknownCollection(String),
    BadRequest(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::UnknownCollection(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Db(e) => status_for(e),
        }
    }

    fn message(&self) -> String {
        match self {
            ApiError::UnknownCollection(name) => format!("unknown collection: {name}"),
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Db(e) => e.to_string(),
        }
    }
}

/// The contract's status mapping: 404 for missing entities, 400 for
/// rejected input, 409 for key/constraint/reference conflicts, 500 for
/// anything that shouldn't happen.
pub fn status_for(error: &DbError) -> StatusCode {
    match error {
        DbError::NotFound { .. } => StatusCode::NOT_FOUND,
        DbError::Validation { .. } | DbError::Operation { .. } | DbError::Hook { .. } => {
            StatusCode::BAD_REQUEST
        }
        DbError::DuplicateKey { .. }
        | DbError::UniqueConstraint { .. }
        | DbError::ForeignKey { .. }
        | DbError::Concurrency { .. } => StatusCode::CONFLICT,
        DbError::Transaction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        ApiError::Db(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message() });
        (self.status(), Json(body)).into_response()
    }
}
