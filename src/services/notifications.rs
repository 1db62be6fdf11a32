use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{
    errors::ServiceError,
    models::{Order, OrderItem},
    util::format_kes,
};

/// Outbound email. Implementations must be safe to call concurrently.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ServiceError>;
}

/// Sends through the Resend REST API.
pub struct ResendMailer {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    from: String,
}

impl ResendMailer {
    pub fn new(http: reqwest::Client, api_base: String, api_key: String, from: String) -> Self {
        Self {
            http,
            api_base,
            api_key,
            from,
        }
    }
}

#[derive(Serialize)]
struct ResendRequest<'a> {
    from: &'a str,
    to: [&'a str; 1],
    subject: &'a str,
    html: &'a str,
}

#[async_trait]
impl Mailer for ResendMailer {
    async fn send(&self, to: &str, subject: &str, html: &str) -> Result<(), ServiceError> {
        let response = self
            .http
            .post(format!("{}/emails", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&ResendRequest {
                from: &self.from,
                to: [to],
                subject,
                html,
            })
            .send()
            .await
            .map_err(|e| ServiceError::InternalError(format!("mail send: {e}")))?;
        if !response.status().is_success() {
            return Err(ServiceError::InternalError(format!(
                "mail send: status {}",
                response.status()
            )));
        }
        Ok(())
    }
}

/// Drops mail on the floor; used when no API key is configured.
pub struct NoopMailer;

#[async_trait]
impl Mailer for NoopMailer {
    async fn send(&self, to: &str, subject: &str, _html: &str) -> Result<(), ServiceError> {
        info!(%to, %subject, "mailer disabled, skipping email");
        Ok(())
    }
}

/// Order lifecycle emails. Send failures are logged and swallowed: email is
/// best-effort and must never fail a checkout or a payment confirmation.
#[derive(Clone)]
pub struct NotificationService {
    mailer: Arc<dyn Mailer>,
    store_contact_email: String,
}

impl NotificationService {
    pub fn new(mailer: Arc<dyn Mailer>, store_contact_email: String) -> Self {
        Self {
            mailer,
            store_contact_email,
        }
    }

    #[instrument(skip_all, fields(order_number = %order.order_number))]
    pub async fn order_received(&self, order: &Order, items: &[OrderItem]) {
        let subject = format!("Order {} received", order.order_number);
        let html = order_email_body(
            order,
            items,
            "Thank you for your order! We will be in touch to arrange delivery.",
        );
        self.deliver(&order.customer_email, &subject, &html).await;
        self.deliver(
            &self.store_contact_email,
            &format!("New order {}", order.order_number),
            &html,
        )
        .await;
    }

    #[instrument(skip_all, fields(order_number = %order.order_number))]
    pub async fn payment_confirmed(&self, order: &Order, items: &[OrderItem]) {
        let subject = format!("Payment confirmed for order {}", order.order_number);
        let html = order_email_body(
            order,
            items,
            "Your payment has been confirmed. Your order is being prepared.",
        );
        self.deliver(&order.customer_email, &subject, &html).await;
        self.deliver(
            &self.store_contact_email,
            &format!("Payment received for {}", order.order_number),
            &html,
        )
        .await;
    }

    #[instrument(skip_all, fields(order_number = %order.order_number))]
    pub async fn order_delivered(&self, order: &Order, items: &[OrderItem]) {
        let subject = format!("Order {} delivered", order.order_number);
        let html = order_email_body(
            order,
            items,
            "Your order has been delivered. Exchanges within 24 hours; no returns.",
        );
        self.deliver(&order.customer_email, &subject, &html).await;
    }

    async fn deliver(&self, to: &str, subject: &str, html: &str) {
        if to.is_empty() {
            return;
        }
        if let Err(error) = self.mailer.send(to, subject, html).await {
            warn!(%to, %error, "email delivery failed");
        }
    }
}

fn order_email_body(order: &Order, items: &[OrderItem], lead: &str) -> String {
    let mut rows = String::new();
    for item in items {
        let attrs = if item.size.is_empty() {
            item.color.clone()
        } else {
            format!("{}, {}", item.color, item.size)
        };
        rows.push_str(&format!(
            "<tr><td>{} ({})</td><td>x{}</td><td>{}</td></tr>",
            item.name,
            attrs,
            item.qty,
            format_kes(item.line_total)
        ));
    }
    format!(
        "<p>{lead}</p>\
         <p>Order <strong>{}</strong></p>\
         <table>{rows}</table>\
         <p>Delivery: {} ({})</p>\
         <p>Total: <strong>{}</strong></p>",
        order.order_number,
        order.delivery_address,
        format_kes(order.delivery_fee),
        format_kes(order.total),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderStatus, PaymentMethod, PaymentProvider};
    use chrono::Utc;
    use std::sync::Mutex;
    use uuid::Uuid;

    struct RecordingMailer {
        sent: Mutex<Vec<(String, String)>>,
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

    struct FailingMailer;

    #[async_trait]
    impl Mailer for FailingMailer {
        async fn send(&self, _: &str, _: &str, _: &str) -> Result<(), ServiceError> {
            Err(ServiceError::InternalError("smtp down".into()))
        }
    }

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: "ATELIER-20260823-A1B2".into(),
            created_at: Utc::now(),
            status: OrderStatus::Paid,
            customer_name: "Wanjiku M.".into(),
            customer_email: "wanjiku@example.com".into(),
            customer_phone: "+254712345678".into(),
            delivery_location_key: "nairobi-cbd".into(),
            delivery_address: "Kimathi St".into(),
            delivery_fee: 300,
            subtotal: 25000,
            total: 25300,
            payment_method: PaymentMethod::Card,
            payment_provider: PaymentProvider::Flutterwave,
            payment_ref: "flw-1".into(),
            notes: String::new(),
            whatsapp_prefill: String::new(),
        }
    }

    #[tokio::test]
    async fn notifies_customer_and_store() {
        let mailer = Arc::new(RecordingMailer {
            sent: Mutex::new(Vec::new()),
        });
        let service = NotificationService::new(mailer.clone(), "hello@atelier.co.ke".into());
        service.payment_confirmed(&sample_order(), &[]).await;

        let sent = mailer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "wanjiku@example.com");
        assert_eq!(sent[1].0, "hello@atelier.co.ke");
    }

    #[tokio::test]
    async fn send_failures_are_swallowed() {
        let service = NotificationService::new(Arc::new(FailingMailer), "hello@atelier.co.ke".into());
        // Must not panic or propagate.
        service.order_received(&sample_order(), &[]).await;
    }
}
