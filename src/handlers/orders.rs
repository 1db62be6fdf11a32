use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use super::common::ApiResponse;
use crate::{errors::ServiceError, models::OrderWithItems, AppState};

pub fn routes() -> Router<AppState> {
    Router::new().route("/orders/:order_number", get(get_order))
}

/// Customer-facing order lookup by the human-readable order number (the one
/// in the confirmation email and WhatsApp message).
async fn get_order(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderWithItems>>, ServiceError> {
    let order = state.orders.get_by_number(&order_number).await?;
    Ok(ApiResponse::ok(order))
}
