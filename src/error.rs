//! Error taxonomy and HTTP mapping
//!
//! Validation failures never mutate state and map to 400 with a field-keyed
//! body; unknown ids map to 404; state-machine violations to 409; storage
//! faults to 500 with the detail kept out of the response. Notification
//! failures have no variant here on purpose: they are swallowed inside the
//! dispatcher and never reach a caller.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;
use uuid::Uuid;
use validator::ValidationErrors;

use crate::catalog::CatalogError;
use crate::domain::TransitionError;
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(#[from] ValidationErrors),
    #[error("unknown sku {0}")]
    UnknownSku(String),
    #[error("order {0} not found")]
    NotFound(Uuid),
    #[error(transparent)]
    InvalidTransition(#[from] TransitionError),
    #[error("unauthorized")]
    Unauthorized,
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
    #[error("catalog error: {0}")]
    Catalog(#[from] CatalogError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "validation failed", "fields": errors })),
            )
                .into_response(),
            AppError::UnknownSku(sku) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("unknown sku {sku}") })),
            )
                .into_response(),
            AppError::NotFound(id) => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("order {id} not found") })),
            )
                .into_response(),
            AppError::InvalidTransition(err) => (
                StatusCode::CONFLICT,
                Json(json!({ "error": err.to_string() })),
            )
                .into_response(),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                Json(json!({ "error": "unauthorized" })),
            )
                .into_response(),
            AppError::Storage(err) => {
                error!(error = %err, "storage fault");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "storage error" })),
                )
                    .into_response()
            }
            AppError::Catalog(err) => {
                error!(error = %err, "catalog fault");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "error": "catalog error" })),
                )
                    .into_response()
            }
        }
    }
}
