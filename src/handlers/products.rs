use std::str::FromStr;

use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::common::ApiResponse;
use crate::{
    errors::ServiceError,
    models::{Category, DeliveryLocation, ProductWithVariants},
    AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/delivery-locations", get(list_delivery_locations))
        .route("/settings", get(public_settings))
}

#[derive(Deserialize)]
struct ListQuery {
    category: Option<String>,
    search: Option<String>,
}

async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<Vec<ProductWithVariants>>>, ServiceError> {
    let category = match query.category.as_deref() {
        Some(raw) => Some(
            Category::from_str(raw)
                .map_err(|_| ServiceError::InvalidInput(format!("Unknown category '{raw}'")))?,
        ),
        None => None,
    };
    let products = state
        .catalog
        .list_active(category, query.search.as_deref())
        .await?;
    Ok(ApiResponse::ok(products))
}

async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductWithVariants>>, ServiceError> {
    Ok(ApiResponse::ok(state.catalog.get(id).await?))
}

async fn list_delivery_locations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DeliveryLocation>>>, ServiceError> {
    let locations = state.delivery.list_all().await?;
    Ok(ApiResponse::ok(locations))
}

/// Public subset of the site settings: contact details and which payment
/// options are live. Admin-only fields never leave through this route.
#[derive(Serialize)]
struct PublicSettings {
    contact_email: String,
    contact_phone_display: String,
    instagram_handle: String,
    tiktok_handle: String,
    whatsapp_e164: String,
    payments_enabled: bool,
    pay_on_delivery_enabled: bool,
}

async fn public_settings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PublicSettings>>, ServiceError> {
    let settings = state.settings.merged().await?;
    Ok(ApiResponse::ok(PublicSettings {
        contact_email: settings.contact_email,
        contact_phone_display: settings.contact_phone_display,
        instagram_handle: settings.instagram_handle,
        tiktok_handle: settings.tiktok_handle,
        whatsapp_e164: settings.whatsapp_e164,
        payments_enabled: settings.payments_enabled,
        pay_on_delivery_enabled: settings.pay_on_delivery_enabled,
    }))
}
