use axum::{extract::State, routing::post, Json, Router};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Serialize;

use super::common::ApiResponse;
use crate::{
    errors::ServiceError,
    models::OrderWithItems,
    services::{CartService, CheckoutOutcome, CheckoutRequest},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/checkout", post(checkout))
}

#[derive(Serialize)]
struct CheckoutResponse {
    order: OrderWithItems,
    /// Present for online payment: where the browser goes next.
    #[serde(skip_serializing_if = "Option::is_none")]
    redirect_url: Option<String>,
    /// Present for pay on delivery: ready-made WhatsApp handoff.
    #[serde(skip_serializing_if = "Option::is_none")]
    whatsapp_url: Option<String>,
}

/// Converts the cookie cart into an order. The cart cookie is cleared only
/// when the order was persisted, so a failed checkout keeps the cart intact.
async fn checkout(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(request): Json<CheckoutRequest>,
) -> Result<(SignedCookieJar, Json<ApiResponse<CheckoutResponse>>), ServiceError> {
    let cart = CartService::read(&jar);
    let outcome = state.checkout.process_checkout(&cart, request).await?;
    let jar = CartService::clear(jar);

    let response = match outcome {
        CheckoutOutcome::Redirect {
            order,
            redirect_url,
        } => CheckoutResponse {
            order,
            redirect_url: Some(redirect_url),
            whatsapp_url: None,
        },
        CheckoutOutcome::PayOnDelivery {
            order,
            whatsapp_url,
        } => CheckoutResponse {
            order,
            redirect_url: None,
            whatsapp_url: Some(whatsapp_url),
        },
    };
    Ok((jar, ApiResponse::ok(response)))
}
