//! HTTP surface. Each module exposes a `routes()` builder; the full router
//! is assembled in [`app_router`].

use axum::{middleware, Router};

use crate::{auth::require_admin, AppState};

pub mod admin;
pub mod cart;
pub mod checkout;
pub mod common;
pub mod health;
pub mod orders;
pub mod payments;
pub mod products;

pub fn app_router(state: AppState) -> Router {
    let admin_routes = admin::protected_routes().route_layer(middleware::from_fn_with_state(
        state.clone(),
        require_admin,
    ));

    Router::new()
        .merge(health::routes())
        .nest(
            "/api",
            Router::new()
                .merge(products::routes())
                .merge(cart::routes())
                .merge(checkout::routes())
                .merge(orders::routes())
                .merge(payments::routes())
                .nest("/admin", admin::public_routes().merge(admin_routes)),
        )
        .with_state(state)
}
