//! JSON surface: order lookup and the HTTP ingress endpoint.

mod error;

pub use error::{ApiError, ApiErrorBody, ApiErrorMessage, codes};

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Path, State, rejection::BytesRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use bytes::Bytes;
use tracing::debug;

use super::HttpState;
use crate::domain::entities::Order;

pub(super) fn router(max_message_bytes: usize) -> Router<HttpState> {
    Router::new()
        .route("/order/{order_uid}", get(get_order))
        .route(
            "/orders",
            post(enqueue_order).layer(DefaultBodyLimit::max(max_message_bytes)),
        )
}

async fn get_order(
    State(state): State<HttpState>,
    Path(order_uid): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get_order(&order_uid).await?;
    Ok(Json(order))
}

/// Queues the raw body for the ingestion pipeline. Validation happens there.
async fn enqueue_order(
    State(state): State<HttpState>,
    body: Result<Bytes, BytesRejection>,
) -> Result<Response, ApiError> {
    let body = body.map_err(|rejection| {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large(state.max_message_bytes)
        } else {
            ApiError::bad_request("Unreadable request body", Some(rejection.body_text()))
        }
    })?;

    if body.is_empty() {
        return Err(ApiError::bad_request("Request body is empty", None));
    }
    if body.len() > state.max_message_bytes {
        return Err(ApiError::payload_too_large(state.max_message_bytes));
    }

    let bytes = body.len();
    state.ingress.try_enqueue(body)?;
    debug!(bytes, "Order payload queued");
    Ok(StatusCode::ACCEPTED.into_response())
}
