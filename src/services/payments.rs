use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{OrderStatus, PaymentMethod},
    services::{InventoryService, NotificationService, OrderService},
};

/// Everything the hosted-payment page needs.
#[derive(Debug, Clone)]
pub struct HostedPaymentRequest {
    pub tx_ref: String,
    pub amount: i64,
    pub currency: String,
    pub redirect_url: String,
    pub customer_email: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub order_id: Uuid,
    pub order_number: String,
}

#[derive(Debug, Clone)]
pub struct HostedPayment {
    pub link: String,
}

#[derive(Debug, Clone)]
pub struct VerifiedTransaction {
    pub status: String,
    pub amount: i64,
    pub currency: String,
    pub tx_ref: String,
    /// Gateway-side transaction id, stored as the order's payment_ref.
    pub payment_ref: String,
}

/// Hosted-payment provider. The production implementation talks to
/// Flutterwave; tests script this trait.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_hosted_payment(
        &self,
        request: &HostedPaymentRequest,
    ) -> Result<HostedPayment, ServiceError>;

    async fn verify_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<VerifiedTransaction, ServiceError>;
}

pub struct FlutterwaveGateway {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl FlutterwaveGateway {
    pub fn new(http: reqwest::Client, api_base: String, secret_key: String) -> Self {
        Self {
            http,
            api_base,
            secret_key,
        }
    }
}

#[derive(Serialize)]
struct FlwPaymentRequest<'a> {
    tx_ref: &'a str,
    amount: i64,
    currency: &'a str,
    redirect_url: &'a str,
    customer: FlwCustomer<'a>,
    meta: FlwMeta<'a>,
    customizations: FlwCustomizations<'a>,
}

#[derive(Serialize)]
struct FlwCustomer<'a> {
    email: &'a str,
    name: &'a str,
    phonenumber: &'a str,
}

#[derive(Serialize)]
struct FlwMeta<'a> {
    order_id: &'a str,
    order_number: &'a str,
}

#[derive(Serialize)]
struct FlwCustomizations<'a> {
    title: &'a str,
}

#[derive(Deserialize)]
struct FlwPaymentResponse {
    status: String,
    data: Option<FlwPaymentLink>,
}

#[derive(Deserialize)]
struct FlwPaymentLink {
    link: String,
}

#[derive(Deserialize)]
struct FlwVerifyResponse {
    status: String,
    data: Option<FlwVerifyData>,
}

#[derive(Deserialize)]
struct FlwVerifyData {
    id: i64,
    status: String,
    amount: f64,
    currency: String,
    tx_ref: String,
}

#[async_trait]
impl PaymentGateway for FlutterwaveGateway {
    #[instrument(skip(self, request), fields(tx_ref = %request.tx_ref))]
    async fn create_hosted_payment(
        &self,
        request: &HostedPaymentRequest,
    ) -> Result<HostedPayment, ServiceError> {
        let order_id = request.order_id.to_string();
        let body = FlwPaymentRequest {
            tx_ref: &request.tx_ref,
            amount: request.amount,
            currency: &request.currency,
            redirect_url: &request.redirect_url,
            customer: FlwCustomer {
                email: &request.customer_email,
                name: &request.customer_name,
                phonenumber: &request.customer_phone,
            },
            meta: FlwMeta {
                order_id: &order_id,
                order_number: &request.order_number,
            },
            customizations: FlwCustomizations {
                title: "ATELIER",
            },
        };
        let response = self
            .http
            .post(format!("{}/payments", self.api_base))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentFailed(format!("gateway unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(ServiceError::PaymentFailed(format!(
                "gateway returned {}",
                response.status()
            )));
        }
        let parsed: FlwPaymentResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentFailed(format!("bad gateway response: {e}")))?;
        match parsed.data {
            Some(data) if parsed.status == "success" => Ok(HostedPayment { link: data.link }),
            _ => Err(ServiceError::PaymentFailed(
                "gateway rejected payment request".to_string(),
            )),
        }
    }

    #[instrument(skip(self))]
    async fn verify_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<VerifiedTransaction, ServiceError> {
        let response = self
            .http
            .get(format!(
                "{}/transactions/{}/verify",
                self.api_base, transaction_id
            ))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| ServiceError::PaymentVerification(format!("gateway unreachable: {e}")))?;
        if !response.status().is_success() {
            return Err(ServiceError::PaymentVerification(format!(
                "gateway returned {}",
                response.status()
            )));
        }
        let parsed: FlwVerifyResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::PaymentVerification(format!("bad gateway response: {e}")))?;
        match parsed.data {
            Some(data) if parsed.status == "success" => Ok(VerifiedTransaction {
                status: data.status,
                amount: data.amount as i64,
                currency: data.currency,
                tx_ref: data.tx_ref,
                payment_ref: data.id.to_string(),
            }),
            _ => Err(ServiceError::PaymentVerification(
                "transaction not found at gateway".to_string(),
            )),
        }
    }
}

/// Webhook body shape shared by the gateway's `charge.completed` events.
#[derive(Debug, Deserialize)]
pub struct WebhookPayload {
    pub event: String,
    pub data: WebhookData,
}

#[derive(Debug, Deserialize)]
pub struct WebhookData {
    pub id: i64,
    pub tx_ref: String,
    pub status: String,
    pub amount: f64,
    pub currency: String,
    #[serde(default)]
    pub meta: Option<WebhookMeta>,
}

#[derive(Debug, Deserialize)]
pub struct WebhookMeta {
    #[serde(default)]
    pub order_id: Option<String>,
}

/// What the webhook handler returns to the gateway. Redeliveries and ignored
/// events both get a 200 with an explanatory message so the gateway stops
/// retrying.
#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl WebhookAck {
    fn ok(message: impl Into<String>) -> Self {
        Self {
            status: "ok",
            message: Some(message.into()),
        }
    }

    fn processed() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }
}

/// Orchestrates hosted payments end to end: init, browser callback, webhook,
/// and the single idempotent PAID transition they all funnel into.
#[derive(Clone)]
pub struct PaymentService {
    orders: OrderService,
    inventory: InventoryService,
    notifications: NotificationService,
    gateway: Arc<dyn PaymentGateway>,
    public_base_url: String,
    currency: String,
    webhook_secret: String,
}

impl PaymentService {
    pub fn new(
        orders: OrderService,
        inventory: InventoryService,
        notifications: NotificationService,
        gateway: Arc<dyn PaymentGateway>,
        public_base_url: String,
        currency: String,
        webhook_secret: String,
    ) -> Self {
        Self {
            orders,
            inventory,
            notifications,
            gateway,
            public_base_url,
            currency,
            webhook_secret,
        }
    }

    /// Creates a hosted-payment session for a pending order and returns the
    /// redirect target: the gateway's payment page, or the confirmation page
    /// when the order is already paid.
    #[instrument(skip(self))]
    pub async fn init_payment(&self, order_number: &str) -> Result<String, ServiceError> {
        let found = self.orders.get_by_number(order_number).await?;
        let order = found.order;
        if order.status == OrderStatus::Paid {
            return Ok(confirmation_path(order_number));
        }
        if order.payment_method == PaymentMethod::Pod {
            return Err(ServiceError::InvalidInput(
                "Order does not use online payment".to_string(),
            ));
        }

        let tx_ref = format!("{}-{}", order.id, Utc::now().timestamp_millis());
        let redirect_url = format!(
            "{}/api/payments/callback?orderNumber={}",
            self.public_base_url, order.order_number
        );
        let hosted = self
            .gateway
            .create_hosted_payment(&HostedPaymentRequest {
                tx_ref,
                amount: order.total,
                currency: self.currency.clone(),
                redirect_url,
                customer_email: order.customer_email.clone(),
                customer_name: order.customer_name.clone(),
                customer_phone: order.customer_phone.clone(),
                order_id: order.id,
                order_number: order.order_number.clone(),
            })
            .await?;
        Ok(hosted.link)
    }

    /// Handles a gateway webhook delivery. The caller passes the raw
    /// `verif-hash` header value; anything that does not match the shared
    /// secret is rejected before the payload is looked at.
    #[instrument(skip(self, provided_hash, payload))]
    pub async fn handle_webhook(
        &self,
        provided_hash: Option<&str>,
        payload: WebhookPayload,
    ) -> Result<WebhookAck, ServiceError> {
        let provided = provided_hash
            .ok_or_else(|| ServiceError::Unauthorized("missing webhook signature".to_string()))?;
        if self.webhook_secret.is_empty()
            || !constant_time_eq(provided.as_bytes(), self.webhook_secret.as_bytes())
        {
            return Err(ServiceError::Unauthorized(
                "invalid webhook signature".to_string(),
            ));
        }

        if payload.event != "charge.completed" || payload.data.status != "successful" {
            return Ok(WebhookAck::ok("Ignored"));
        }

        let order_id = extract_order_id(&payload.data).ok_or_else(|| {
            ServiceError::ValidationError("webhook has no resolvable order reference".to_string())
        })?;
        let found = self.orders.get_by_id(order_id).await?;
        let order = found.order;

        if order.status == OrderStatus::Paid {
            return Ok(WebhookAck::ok("Already processed"));
        }
        if payload.data.amount < order.total as f64
            || !payload.data.currency.eq_ignore_ascii_case(&self.currency)
        {
            return Err(ServiceError::ValidationError(
                "amount or currency mismatch".to_string(),
            ));
        }

        self.confirm_paid(order.id, &payload.data.id.to_string())
            .await?;
        Ok(WebhookAck::processed())
    }

    /// Handles the browser redirect back from the gateway. The transaction is
    /// re-verified against the gateway's verify API; the redirect parameters
    /// alone are never trusted. Returns the storefront path to redirect to.
    #[instrument(skip(self, transaction_id))]
    pub async fn handle_callback(
        &self,
        order_number: &str,
        status: &str,
        transaction_id: Option<&str>,
    ) -> Result<String, ServiceError> {
        let found = match self.orders.get_by_number(order_number).await {
            Ok(found) => found,
            Err(ServiceError::NotFound(_)) => {
                warn!(%order_number, "callback for unknown order");
                return Ok("/checkout?error=order_not_found".to_string());
            }
            Err(other) => return Err(other),
        };
        let order = found.order;

        if order.status == OrderStatus::Paid {
            return Ok(confirmation_path(order_number));
        }
        // Only an explicit cancelled/failed status sends the customer back to
        // checkout. A verification problem leaves the order pending and lands
        // on the order page, where the webhook may still settle it.
        if status != "successful" && status != "completed" {
            return Ok(failure_path(order_number));
        }
        let Some(transaction_id) = transaction_id else {
            warn!(%order_number, "successful callback without a transaction id");
            return Ok(order_path(order_number));
        };

        let verified = match self.gateway.verify_transaction(transaction_id).await {
            Ok(verified) => verified,
            Err(error) => {
                warn!(%order_number, %error, "callback verification failed");
                return Ok(order_path(order_number));
            }
        };

        let order_id_prefix = order.id.to_string();
        if verified.status != "successful"
            || verified.amount < order.total
            || !verified.currency.eq_ignore_ascii_case(&self.currency)
            || !verified.tx_ref.starts_with(&order_id_prefix)
        {
            warn!(%order_number, "callback transaction does not match order");
            return Ok(order_path(order_number));
        }

        self.confirm_paid(order.id, &verified.payment_ref).await?;
        Ok(confirmation_path(order_number))
    }

    /// The single PAID transition. Exactly one caller wins the conditional
    /// write; only the winner runs the side effects (stock decrement and
    /// confirmation email). Returns whether this call was the winner.
    pub async fn confirm_paid(
        &self,
        order_id: Uuid,
        payment_ref: &str,
    ) -> Result<bool, ServiceError> {
        let Some(paid) = self.orders.mark_paid(order_id, payment_ref).await? else {
            return Ok(false);
        };

        let items = match self.orders.get_by_id(order_id).await {
            Ok(with_items) => with_items.items,
            Err(error) => {
                error!(%order_id, %error, "paid order has unreadable items");
                Vec::new()
            }
        };

        // The order is PAID regardless; a line that fails to decrement here
        // was sold elsewhere and needs manual reconciliation. Remaining lines
        // still get their decrement.
        for item in &items {
            if let Err(error) = self
                .inventory
                .decrement_stock(item.variant_id, item.qty, &item.name)
                .await
            {
                error!(
                    order_number = %paid.order_number,
                    variant_id = %item.variant_id,
                    %error,
                    "stock decrement failed after payment"
                );
            }
        }

        self.notifications.payment_confirmed(&paid, &items).await;
        info!(order_number = %paid.order_number, "payment confirmed");
        Ok(true)
    }
}

fn confirmation_path(order_number: &str) -> String {
    format!("/order/{order_number}/confirmation")
}

fn order_path(order_number: &str) -> String {
    format!("/order/{order_number}")
}

fn failure_path(order_number: &str) -> String {
    format!("/checkout?error=payment_failed&orderNumber={order_number}")
}

/// Resolves the order id from webhook metadata, falling back to the tx_ref
/// prefix (`{order_id}-{millis}`).
fn extract_order_id(data: &WebhookData) -> Option<Uuid> {
    if let Some(meta) = &data.meta {
        if let Some(id) = meta.order_id.as_deref().and_then(|s| Uuid::parse_str(s).ok()) {
            return Some(id);
        }
    }
    data.tx_ref
        .rsplit_once('-')
        .and_then(|(prefix, _)| Uuid::parse_str(prefix).ok())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
