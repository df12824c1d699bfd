//! Shared error shape for every endpoint: `{"error": code, "message": text}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use storefront_infra::cart_service::CartServiceError;

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

/// Maps a service failure onto the HTTP surface.
///
/// Conflicts only show up here after the retry budget inside the service is
/// spent; a 409 tells the client to re-read the cart and resubmit.
pub fn service_error_to_response(err: CartServiceError) -> Response {
    match err {
        CartServiceError::InvalidQuantity(msg) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invalid_quantity", msg)
        }
        CartServiceError::OutOfStock {
            requested,
            available,
        } => json_error(
            StatusCode::UNPROCESSABLE_ENTITY,
            "out_of_stock",
            format!("insufficient stock: requested {requested}, available {available}"),
        ),
        CartServiceError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        CartServiceError::Validation(msg) => {
            json_error(StatusCode::BAD_REQUEST, "validation_error", msg)
        }
        CartServiceError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        CartServiceError::Storage(msg) => {
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", msg)
        }
    }
}

pub fn json_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: code,
            message: message.into(),
        }),
    )
        .into_response()
}
