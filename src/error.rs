use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Request},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use crate::storage::StoreError;

/// Failures surfaced by the services and handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Client-fixable input problem.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    /// Bad credentials or a bad, expired or revoked token. Never says which.
    #[error("authentication failed")]
    Authentication,

    #[error("{0}")]
    NotFound(String),

    #[error("persistence error: {0}")]
    Persistence(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AppError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict(what) => AppError::Conflict(format!("{what} already registered")),
            other => AppError::Persistence(other),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        warn!(status = %rejection.status(), "rejected request body");
        AppError::Validation(rejection.body_text())
    }
}

/// `Json` whose rejections go through [`AppError`], so a malformed or
/// mistyped body is a 400 with the usual `{"error": ...}` shape.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Authentication => StatusCode::UNAUTHORIZED.into_response(),
            AppError::Validation(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Conflict(msg) => {
                (StatusCode::CONFLICT, Json(json!({ "error": msg }))).into_response()
            }
            AppError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
            }
            AppError::Persistence(ref e) => {
                error!(error = %e, "store failure");
                internal_response()
            }
            AppError::Internal(ref e) => {
                error!(error = %e, "internal failure");
                internal_response()
            }
        }
    }
}

fn internal_response() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}
