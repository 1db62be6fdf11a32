use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Method, Request},
    response::Response,
    Router,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use uuid::Uuid;

use atelier_api::{
    config::AppConfig,
    errors::ServiceError,
    handlers,
    models::{Category, DeliveryLocation, Product, Variant},
    repositories::{DeliveryRepo, ProductRepo, VariantRepo},
    services::{
        payments::{HostedPayment, HostedPaymentRequest, VerifiedTransaction},
        Mailer, PaymentGateway,
    },
    store::{memory::MemoryRowStore, RowStore},
    AppState,
};

pub const WEBHOOK_SECRET: &str = "test-webhook-secret";

/// Test harness: the full router over an in-memory row store, with a
/// scripted payment gateway and a recording mailer.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub store: Arc<MemoryRowStore>,
    pub gateway: Arc<MockGateway>,
    pub mailer: Arc<RecordingMailer>,
}

impl TestApp {
    pub async fn new() -> Self {
        let config = test_config();
        let store = Arc::new(MemoryRowStore::new());
        let gateway = Arc::new(MockGateway::default());
        let mailer = Arc::new(RecordingMailer::default());

        let state = AppState::new(
            config,
            store.clone() as Arc<dyn RowStore>,
            gateway.clone() as Arc<dyn PaymentGateway>,
            mailer.clone() as Arc<dyn Mailer>,
        );
        let router = handlers::app_router(state.clone());

        Self {
            router,
            state,
            store,
            gateway,
            mailer,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
    ) -> Response {
        self.request_with_headers(method, uri, body, &[]).await
    }

    pub async fn request_with_headers(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let request = match body {
            Some(json) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .expect("request"),
            None => builder.body(Body::empty()).expect("request"),
        };
        self.router.clone().oneshot(request).await.expect("response")
    }

    /// Seeds one active product with one variant and a delivery location,
    /// returning the pair for use in cart and checkout payloads.
    pub async fn seed_catalog(&self, price: i64, stock: i64) -> (Product, Variant) {
        let store = self.store.clone() as Arc<dyn RowStore>;
        let products = ProductRepo::new(store.clone());
        let variants = VariantRepo::new(store.clone());
        let delivery = DeliveryRepo::new(store);

        let product = Product {
            id: Uuid::new_v4(),
            sku: "BAG-001".into(),
            category: Category::Handbags,
            name: "Leather Tote".into(),
            description: "Full-grain leather".into(),
            price,
            images: vec!["https://cdn.example/tote.jpg".into()],
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let variant = Variant {
            id: Uuid::new_v4(),
            product_id: product.id,
            size: String::new(),
            color: "Black".into(),
            stock,
            low_stock_threshold: 1,
            active: true,
            updated_at: Utc::now(),
        };
        products.insert(&product).await.expect("seed product");
        variants.insert(&variant).await.expect("seed variant");
        delivery
            .upsert(&DeliveryLocation {
                location_key: "nairobi-cbd".into(),
                label: "Nairobi CBD".into(),
                fee: 300,
                eta_days: "1-2".into(),
            })
            .await
            .expect("seed delivery location");
        (product, variant)
    }

    /// Rewrites a variant's stock behind the API's back, for staleness tests.
    pub async fn set_variant_stock(&self, variant_id: Uuid, stock: i64) {
        let variants = VariantRepo::new(self.store.clone() as Arc<dyn RowStore>);
        let mut variant = variants
            .find(variant_id)
            .await
            .expect("store")
            .expect("variant")
            .variant;
        variant.stock = stock;
        variants.update(&variant).await.expect("update variant");
    }

    pub async fn variant_stock(&self, variant_id: Uuid) -> i64 {
        let variants = VariantRepo::new(self.store.clone() as Arc<dyn RowStore>);
        variants
            .find(variant_id)
            .await
            .expect("store")
            .expect("variant")
            .variant
            .stock
    }
}

pub async fn response_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

/// Collects Set-Cookie headers so a later request can carry the session or
/// cart forward.
pub fn cookies_from(response: &Response) -> String {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

fn test_config() -> AppConfig {
    use argon2::password_hash::{rand_core::OsRng, SaltString};
    use argon2::{Argon2, PasswordHasher};

    let salt = SaltString::generate(&mut OsRng);
    let admin_hash = Argon2::default()
        .hash_password(b"atelier-test-password", &salt)
        .expect("hash")
        .to_string();

    serde_json::from_value(serde_json::json!({
        "host": "127.0.0.1",
        "port": 0,
        "environment": "test",
        "log_level": "debug",
        "session_secret": "test-session-secret-test-session-secret",
        "admin_username": "admin",
        "admin_password_hash": admin_hash,
        "payment_webhook_secret": WEBHOOK_SECRET,
        "public_base_url": "http://localhost:8080",
    }))
    .expect("test config")
}

/// Scripted gateway: hands out a fixed hosted-payment link and verifies
/// transactions from a preloaded table.
#[derive(Default)]
pub struct MockGateway {
    pub created: Mutex<Vec<HostedPaymentRequest>>,
    pub verifications: Mutex<Vec<(String, VerifiedTransaction)>>,
}

impl MockGateway {
    pub fn script_verification(&self, transaction_id: &str, verified: VerifiedTransaction) {
        self.verifications
            .lock()
            .unwrap()
            .push((transaction_id.to_string(), verified));
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_hosted_payment(
        &self,
        request: &HostedPaymentRequest,
    ) -> Result<HostedPayment, ServiceError> {
        self.created.lock().unwrap().push(request.clone());
        Ok(HostedPayment {
            link: "https://pay.example/hosted/abc123".to_string(),
        })
    }

    async fn verify_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<VerifiedTransaction, ServiceError> {
        self.verifications
            .lock()
            .unwrap()
            .iter()
            .find(|(id, _)| id == transaction_id)
            .map(|(_, verified)| verified.clone())
            .ok_or_else(|| {
                ServiceError::PaymentVerification("transaction not found at gateway".into())
            })
    }
}

#[derive(Default)]
pub struct RecordingMailer {
    pub sent: Mutex<Vec<(String, String)>>,
}

impl RecordingMailer {
    pub fn subjects_for(&self, to: &str) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(recipient, _)| recipient == to)
            .map(|(_, subject)| subject.clone())
            .collect()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), ServiceError> {
        self.sent
            .lock()
            .unwrap()
            .push((to.to_string(), subject.to_string()));
        Ok(())
    }
}
