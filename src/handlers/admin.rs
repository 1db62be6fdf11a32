use std::collections::BTreeMap;
use std::str::FromStr;

use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use super::common::ApiResponse;
use crate::{
    errors::ServiceError,
    models::{
        Category, DeliveryLocation, Order, OrderStatus, OrderWithItems, Product,
        ProductWithVariants, SiteSettings, Variant,
    },
    AppState,
};

/// Routes reachable without a session: just login.
pub fn public_routes() -> Router<AppState> {
    Router::new().route("/login", post(login))
}

/// Everything behind the session middleware.
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/logout", post(logout))
        .route("/orders", get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", put(update_order_status))
        .route("/products", get(list_products).post(create_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id/variants", post(create_variant))
        .route("/variants/:id", put(update_variant))
        .route("/settings", get(get_settings).put(update_settings))
        .route(
            "/delivery-locations",
            get(list_delivery_locations).put(upsert_delivery_location),
        )
        .route("/delivery-locations/:key", delete(delete_delivery_location))
}

#[derive(Deserialize)]
struct LoginRequest {
    username: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<ApiResponse<()>>), ServiceError> {
    state
        .auth
        .verify_credentials(&request.username, &request.password)?;
    let token = state.auth.create_session_token()?;
    let jar = jar.add(state.auth.session_cookie(token));
    Ok((jar, ApiResponse::message("Logged in")))
}

async fn logout(
    State(state): State<AppState>,
    jar: CookieJar,
) -> (CookieJar, Json<ApiResponse<()>>) {
    let jar = jar.add(state.auth.clear_session_cookie());
    (jar, ApiResponse::message("Logged out"))
}

async fn list_orders(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Order>>>, ServiceError> {
    Ok(ApiResponse::ok(state.orders.list_orders().await?))
}

async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderWithItems>>, ServiceError> {
    Ok(ApiResponse::ok(state.orders.get_by_id(id).await?))
}

#[derive(Deserialize)]
struct StatusRequest {
    status: String,
}

/// Manual status change from the back office. Moving an order into PAID goes
/// through the same idempotent transition as the payment paths, so stock and
/// emails fire at most once no matter how the order got paid.
async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<StatusRequest>,
) -> Result<Json<ApiResponse<OrderWithItems>>, ServiceError> {
    let new_status = OrderStatus::from_str(&request.status)
        .map_err(|_| ServiceError::InvalidInput(format!("Unknown status '{}'", request.status)))?;

    if new_status == OrderStatus::Paid {
        state.payments.confirm_paid(id, "manual").await?;
    } else {
        let (order, previous) = state.orders.update_status(id, new_status).await?;
        if new_status == OrderStatus::Delivered && previous != OrderStatus::Delivered {
            let items = state.orders.get_by_id(order.id).await?.items;
            state.notifications.order_delivered(&order, &items).await;
        }
    }
    Ok(ApiResponse::ok(state.orders.get_by_id(id).await?))
}

async fn list_products(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<ProductWithVariants>>>, ServiceError> {
    Ok(ApiResponse::ok(state.catalog.list_all().await?))
}

#[derive(Deserialize, Validate)]
struct ProductRequest {
    #[validate(length(min = 1, message = "SKU is required"))]
    sku: String,
    category: String,
    #[validate(length(min = 1, message = "Name is required"))]
    name: String,
    #[serde(default)]
    description: String,
    #[validate(range(min = 0, message = "Price cannot be negative"))]
    price: i64,
    #[serde(default)]
    images: Vec<String>,
    #[serde(default = "default_true")]
    active: bool,
}

fn default_true() -> bool {
    true
}

impl ProductRequest {
    fn into_product(self, id: Uuid) -> Result<Product, ServiceError> {
        let category = Category::from_str(&self.category).map_err(|_| {
            ServiceError::InvalidInput(format!("Unknown category '{}'", self.category))
        })?;
        let now = Utc::now();
        Ok(Product {
            id,
            sku: self.sku,
            category,
            name: self.name,
            description: self.description,
            price: self.price,
            images: self.images,
            active: self.active,
            created_at: now,
            updated_at: now,
        })
    }
}

async fn create_product(
    State(state): State<AppState>,
    Json(request): Json<ProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let product = request.into_product(Uuid::new_v4())?;
    Ok(ApiResponse::ok(state.catalog.create_product(product).await?))
}

async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<ProductRequest>,
) -> Result<Json<ApiResponse<Product>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let product = request.into_product(id)?;
    Ok(ApiResponse::ok(state.catalog.update_product(product).await?))
}

#[derive(Deserialize, Validate)]
struct VariantRequest {
    #[serde(default)]
    size: String,
    #[validate(length(min = 1, message = "Color is required"))]
    color: String,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    stock: i64,
    #[validate(range(min = 0, message = "Threshold cannot be negative"))]
    #[serde(default)]
    low_stock_threshold: i64,
    #[serde(default = "default_true")]
    active: bool,
}

impl VariantRequest {
    fn into_variant(self, id: Uuid, product_id: Uuid) -> Variant {
        Variant {
            id,
            product_id,
            size: self.size,
            color: self.color,
            stock: self.stock,
            low_stock_threshold: self.low_stock_threshold,
            active: self.active,
            updated_at: Utc::now(),
        }
    }
}

async fn create_variant(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(request): Json<VariantRequest>,
) -> Result<Json<ApiResponse<Variant>>, ServiceError> {
    request
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let variant = request.into_variant(Uuid::new_v4(), product_id);
    Ok(ApiResponse::ok(state.catalog.create_variant(variant).await?))
}

#[derive(Deserialize)]
struct VariantUpdateRequest {
    product_id: Uuid,
    #[serde(flatten)]
    fields: VariantRequest,
}

async fn update_variant(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<VariantUpdateRequest>,
) -> Result<Json<ApiResponse<Variant>>, ServiceError> {
    request
        .fields
        .validate()
        .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
    let variant = request.fields.into_variant(id, request.product_id);
    Ok(ApiResponse::ok(state.catalog.update_variant(variant).await?))
}

async fn get_settings(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SiteSettings>>, ServiceError> {
    Ok(ApiResponse::ok(state.settings.merged().await?))
}

/// Accepts a flat key/value object. Only known settings keys are persisted;
/// the rest are silently dropped, same as on read.
async fn update_settings(
    State(state): State<AppState>,
    Json(request): Json<BTreeMap<String, String>>,
) -> Result<Json<ApiResponse<SiteSettings>>, ServiceError> {
    let known: Vec<(&str, &str)> = request
        .iter()
        .filter(|(key, _)| SiteSettings::is_known_key(key))
        .map(|(key, value)| (key.as_str(), value.as_str()))
        .collect();
    state.settings.set_many(known).await?;
    Ok(ApiResponse::ok(state.settings.merged().await?))
}

async fn list_delivery_locations(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<DeliveryLocation>>>, ServiceError> {
    Ok(ApiResponse::ok(state.delivery.list_all().await?))
}

async fn upsert_delivery_location(
    State(state): State<AppState>,
    Json(location): Json<DeliveryLocation>,
) -> Result<Json<ApiResponse<Vec<DeliveryLocation>>>, ServiceError> {
    if location.location_key.is_empty() || location.fee < 0 {
        return Err(ServiceError::ValidationError(
            "A location key and a non-negative fee are required".to_string(),
        ));
    }
    state.delivery.upsert(&location).await?;
    Ok(ApiResponse::ok(state.delivery.list_all().await?))
}

async fn delete_delivery_location(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<ApiResponse<Vec<DeliveryLocation>>>, ServiceError> {
    state.delivery.delete(&key).await?;
    Ok(ApiResponse::ok(state.delivery.list_all().await?))
}
