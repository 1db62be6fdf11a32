pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod services;
pub mod store;
pub mod util;

use std::sync::Arc;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;

use crate::{
    auth::AuthService,
    config::AppConfig,
    repositories::{DeliveryRepo, OrderRepo, ProductRepo, SettingsRepo, VariantRepo},
    services::{
        CartService, CatalogService, CheckoutService, InventoryService, Mailer,
        NotificationService, OrderService, PaymentGateway, PaymentService,
    },
    store::RowStore,
};

/// Shared application state; everything inside is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub cookie_key: Key,
    pub auth: AuthService,
    pub catalog: CatalogService,
    pub cart: CartService,
    pub checkout: CheckoutService,
    pub orders: OrderService,
    pub payments: PaymentService,
    pub notifications: NotificationService,
    pub delivery: DeliveryRepo,
    pub settings: SettingsRepo,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Key {
        state.cookie_key.clone()
    }
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn RowStore>,
        gateway: Arc<dyn PaymentGateway>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let products = ProductRepo::new(store.clone());
        let variants = VariantRepo::new(store.clone());
        let delivery = DeliveryRepo::new(store.clone());
        let settings = SettingsRepo::new(store.clone());
        let order_repo = OrderRepo::new(store);

        let orders = OrderService::new(order_repo, config.order_number_prefix.clone());
        let inventory = InventoryService::new(variants.clone());
        let notifications = NotificationService::new(mailer, config.notification_email.clone());
        let payments = PaymentService::new(
            orders.clone(),
            inventory.clone(),
            notifications.clone(),
            gateway,
            config.public_base_url.clone(),
            config.currency.clone(),
            config.payment_webhook_secret.clone(),
        );
        let checkout = CheckoutService::new(
            products.clone(),
            delivery.clone(),
            settings.clone(),
            orders.clone(),
            inventory,
            notifications.clone(),
        );
        let catalog = CatalogService::new(products.clone(), variants.clone());
        let cart = CartService::new(products, variants);
        let auth = AuthService::new(
            config.admin_username.clone(),
            config.admin_password_hash.clone(),
            &config.session_secret,
            config.session_ttl_secs,
        );
        let cookie_key = Key::derive_from(config.session_secret.as_bytes());

        Self {
            config: Arc::new(config),
            cookie_key,
            auth,
            catalog,
            cart,
            checkout,
            orders,
            payments,
            notifications,
            delivery,
            settings,
        }
    }
}
