use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use axum_extra::extract::cookie::SignedCookieJar;
use serde::Deserialize;
use uuid::Uuid;

use super::common::ApiResponse;
use crate::{errors::ServiceError, models::Cart, services::CartService, AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/cart", get(get_cart).delete(clear_cart))
        .route("/cart/items", post(add_item))
        .route("/cart/items/:variant_id", put(update_item).delete(remove_item))
}

async fn get_cart(jar: SignedCookieJar) -> Json<ApiResponse<Cart>> {
    ApiResponse::ok(CartService::read(&jar))
}

#[derive(Deserialize)]
struct AddItemRequest {
    product_id: Uuid,
    variant_id: Uuid,
    qty: u32,
}

async fn add_item(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Json(request): Json<AddItemRequest>,
) -> Result<(SignedCookieJar, Json<ApiResponse<Cart>>), ServiceError> {
    let mut cart = CartService::read(&jar);
    state
        .cart
        .add_item(&mut cart, request.product_id, request.variant_id, request.qty)
        .await?;
    let jar = CartService::write(jar, &cart)?;
    Ok((jar, ApiResponse::ok(cart)))
}

#[derive(Deserialize)]
struct UpdateItemRequest {
    qty: u32,
}

async fn update_item(
    State(state): State<AppState>,
    jar: SignedCookieJar,
    Path(variant_id): Path<Uuid>,
    Json(request): Json<UpdateItemRequest>,
) -> Result<(SignedCookieJar, Json<ApiResponse<Cart>>), ServiceError> {
    let mut cart = CartService::read(&jar);
    state
        .cart
        .update_qty(&mut cart, variant_id, request.qty)
        .await?;
    let jar = CartService::write(jar, &cart)?;
    Ok((jar, ApiResponse::ok(cart)))
}

async fn remove_item(
    jar: SignedCookieJar,
    Path(variant_id): Path<Uuid>,
) -> Result<(SignedCookieJar, Json<ApiResponse<Cart>>), ServiceError> {
    let mut cart = CartService::read(&jar);
    CartService::remove_item(&mut cart, variant_id);
    let jar = CartService::write(jar, &cart)?;
    Ok((jar, ApiResponse::ok(cart)))
}

async fn clear_cart(jar: SignedCookieJar) -> (SignedCookieJar, Json<ApiResponse<Cart>>) {
    (CartService::clear(jar), ApiResponse::ok(Cart::default()))
}
