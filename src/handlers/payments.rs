use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::{
    errors::ServiceError,
    services::payments::WebhookPayload,
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/payments/init", get(init_payment))
        .route("/payments/callback", get(payment_callback))
        .route("/payments/webhook", post(payment_webhook))
}

#[derive(Deserialize)]
struct InitQuery {
    #[serde(rename = "orderNumber")]
    order_number: String,
}

/// Starts a hosted payment and sends the browser to the gateway's page.
async fn init_payment(
    State(state): State<AppState>,
    Query(query): Query<InitQuery>,
) -> Result<Redirect, ServiceError> {
    let link = state.payments.init_payment(&query.order_number).await?;
    Ok(Redirect::to(&link))
}

#[derive(Deserialize)]
struct CallbackQuery {
    #[serde(rename = "orderNumber")]
    order_number: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    transaction_id: Option<String>,
}

/// Browser redirect back from the gateway. The outcome page is decided by a
/// fresh verification against the gateway, never by the query parameters.
async fn payment_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Result<Redirect, ServiceError> {
    let path = state
        .payments
        .handle_callback(
            &query.order_number,
            &query.status,
            query.transaction_id.as_deref(),
        )
        .await?;
    Ok(Redirect::to(&path))
}

/// Gateway webhook. This endpoint speaks the gateway's ack dialect
/// (`{status, message}`) rather than the storefront envelope, and it maps
/// rejections to the status codes the gateway's retry policy expects.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(payload): Json<WebhookPayload>,
) -> Response {
    let provided_hash = headers
        .get("verif-hash")
        .and_then(|value| value.to_str().ok());

    match state.payments.handle_webhook(provided_hash, payload).await {
        Ok(ack) => (StatusCode::OK, Json(ack)).into_response(),
        Err(error) => {
            let status = match &error {
                ServiceError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::ValidationError(_) | ServiceError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            };
            warn!(%error, "webhook rejected");
            let body = json!({
                "status": "error",
                "message": error.public_message(),
            });
            (status, Json(body)).into_response()
        }
    }
}
