//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use document_store::StoreError;
use domain::{DomainError, InventoryError};
use fulfillment::FulfillmentError;
use serde_json::json;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed request.
    #[error("{0}")]
    Validation(String),
    /// Missing or invalid bearer token.
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated but not allowed.
    #[error("{0}")]
    Forbidden(String),
    /// Resource not found.
    #[error("{0}")]
    NotFound(String),
    /// Domain rule or lookup failure.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Cross-service failure.
    #[error(transparent)]
    Fulfillment(#[from] FulfillmentError),
    /// Internal server error.
    #[error("{0}")]
    Internal(String),
}

/// Status, client message and underlying error of a failed request.
///
/// Attached to error responses so [`attach_error_details`] can add the
/// underlying error in diagnostic mode.
#[derive(Debug, Clone)]
pub struct ErrorDetails {
    pub message: String,
    pub error: String,
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Domain(err) => domain_status(err),
            ApiError::Fulfillment(err) => fulfillment_status(err),
            ApiError::Internal(_) => internal(),
        }
    }
}

fn internal() -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Internal server error".to_string(),
    )
}

fn store_status(err: &StoreError) -> (StatusCode, String) {
    match err {
        StoreError::NotFound { .. } => (StatusCode::NOT_FOUND, "Resource not found".to_string()),
        StoreError::ConcurrencyConflict { .. } => (
            StatusCode::CONFLICT,
            "Resource was modified concurrently, please retry".to_string(),
        ),
        StoreError::AlreadyExists { .. } => {
            (StatusCode::CONFLICT, "Resource already exists".to_string())
        }
        _ => internal(),
    }
}

fn domain_status(err: &DomainError) -> (StatusCode, String) {
    match err {
        DomainError::Store(e) => store_status(e),
        DomainError::NotFound { .. } => (StatusCode::NOT_FOUND, err.to_string()),
        DomainError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        DomainError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        DomainError::Order(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        DomainError::Payment(e) => (StatusCode::BAD_REQUEST, e.to_string()),
        DomainError::Inventory(e @ InventoryError::NotFound { .. }) => {
            (StatusCode::NOT_FOUND, e.to_string())
        }
        DomainError::Inventory(e) => (StatusCode::BAD_REQUEST, e.to_string()),
    }
}

fn fulfillment_status(err: &FulfillmentError) -> (StatusCode, String) {
    match err {
        FulfillmentError::Domain(e) => domain_status(e),
        FulfillmentError::Store(e) => store_status(e),
        FulfillmentError::ProductNotFound(_) | FulfillmentError::OrderNotFound(_) => {
            (StatusCode::BAD_REQUEST, err.to_string())
        }
        FulfillmentError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
        FulfillmentError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        FulfillmentError::Upstream { .. } => (StatusCode::SERVICE_UNAVAILABLE, err.to_string()),
        FulfillmentError::Rejected { status, .. } if *status >= 500 => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        FulfillmentError::Rejected { .. } => (StatusCode::BAD_REQUEST, err.to_string()),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            tracing::error!(error = %self, %status, "request failed");
        } else {
            tracing::debug!(error = %self, %status, "request rejected");
        }

        let body = json!({ "success": false, "message": message });
        let mut response = (status, Json(body)).into_response();
        response.extensions_mut().insert(ErrorDetails {
            message,
            error: self.to_string(),
        });
        response
    }
}

/// Adds the underlying error to error bodies when `diagnostics` is on.
pub async fn attach_error_details(
    State(diagnostics): State<bool>,
    request: Request,
    next: Next,
) -> Response {
    let response = next.run(request).await;
    if !diagnostics {
        return response;
    }
    match response.extensions().get::<ErrorDetails>().cloned() {
        Some(details) => {
            let body = json!({
                "success": false,
                "message": details.message,
                "error": details.error,
            });
            (response.status(), Json(body)).into_response()
        }
        None => response,
    }
}
