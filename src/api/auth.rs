//! Bearer-credential gate for admin operations
//!
//! Checks a static token from configuration; an unset token disables the
//! gate for local development. The storefront's create-order call is not
//! behind this: customers place orders without credentials.

use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;

use super::AppState;
use crate::error::AppError;

pub async fn require_admin(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(next.run(request).await);
    };
    let presented = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));
    match presented {
        Some(token) if token == expected => Ok(next.run(request).await),
        _ => Err(AppError::Unauthorized),
    }
}
