//! Domain types persisted in the row store or carried in the cart cookie.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Category {
    Handbags,
    Shoes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PendingPayment,
    Paid,
    PayOnDelivery,
    Processing,
    Delivered,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    Card,
    Mpesa,
    Airtel,
    Pod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentProvider {
    Flutterwave,
    None,
}

/// Catalog product. Never hard-deleted; `active` is flipped instead so
/// historical order items keep resolving.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub category: Category,
    pub name: String,
    pub description: String,
    /// Whole-KES amount.
    pub price: i64,
    pub images: Vec<String>,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Sellable variant of a product. `stock` must never go negative; decrements
/// that would violate this are rejected at the inventory guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    /// Empty for non-sized categories (handbags).
    pub size: String,
    pub color: String,
    pub stock: i64,
    pub low_stock_threshold: i64,
    pub active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProductWithVariants {
    #[serde(flatten)]
    pub product: Product,
    pub variants: Vec<Variant>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryLocation {
    pub location_key: String,
    pub label: String,
    pub fee: i64,
    pub eta_days: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub created_at: DateTime<Utc>,
    pub status: OrderStatus,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_location_key: String,
    pub delivery_address: String,
    pub delivery_fee: i64,
    pub subtotal: i64,
    pub total: i64,
    pub payment_method: PaymentMethod,
    pub payment_provider: PaymentProvider,
    /// External transaction id; empty until paid.
    pub payment_ref: String,
    pub notes: String,
    /// URL-encoded customer-service message, generated at order creation.
    pub whatsapp_prefill: String,
}

/// Line-item snapshot copied at order creation so later catalog edits never
/// retroactively alter historical orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub size: String,
    pub color: String,
    pub qty: u32,
    pub unit_price: i64,
    pub line_total: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub size: String,
    pub color: String,
    pub qty: u32,
    pub unit_price: i64,
    pub image: String,
}

/// Session-scoped cart, persisted in a signed cookie. `subtotal` is derived
/// and recomputed on every mutation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub subtotal: i64,
}

/// Site settings merged from the `settings` sheet over compiled-in defaults.
/// Only the keys below are ever recognized; anything else in the sheet is
/// ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteSettings {
    pub contact_email: String,
    pub contact_phone_display: String,
    pub contact_phone_e164: String,
    pub instagram_handle: String,
    pub tiktok_handle: String,
    pub whatsapp_e164: String,
    pub payments_enabled: bool,
    pub pay_on_delivery_enabled: bool,
    pub payment_provider: String,
    pub checkout_whatsapp_template: String,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            contact_email: "hello@atelier.co.ke".to_string(),
            contact_phone_display: "0700 000 000".to_string(),
            contact_phone_e164: "+254700000000".to_string(),
            instagram_handle: "shopatelier".to_string(),
            tiktok_handle: "shopatelier".to_string(),
            whatsapp_e164: "+254700000000".to_string(),
            payments_enabled: true,
            pay_on_delivery_enabled: true,
            payment_provider: "flutterwave".to_string(),
            checkout_whatsapp_template: String::new(),
        }
    }
}

impl SiteSettings {
    pub const KNOWN_KEYS: &'static [&'static str] = &[
        "contact_email",
        "contact_phone_display",
        "contact_phone_e164",
        "instagram_handle",
        "tiktok_handle",
        "whatsapp_e164",
        "payments_enabled",
        "pay_on_delivery_enabled",
        "payment_provider",
        "checkout_whatsapp_template",
    ];

    pub fn is_known_key(key: &str) -> bool {
        Self::KNOWN_KEYS.contains(&key)
    }

    /// Merges key/value rows over the defaults. Unknown keys are dropped;
    /// boolean keys accept "true"/"false" case-insensitively.
    pub fn merge_rows<'a, I>(rows: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut settings = Self::default();
        for (key, value) in rows {
            match key {
                "contact_email" => settings.contact_email = value.to_string(),
                "contact_phone_display" => settings.contact_phone_display = value.to_string(),
                "contact_phone_e164" => settings.contact_phone_e164 = value.to_string(),
                "instagram_handle" => settings.instagram_handle = value.to_string(),
                "tiktok_handle" => settings.tiktok_handle = value.to_string(),
                "whatsapp_e164" => settings.whatsapp_e164 = value.to_string(),
                "payments_enabled" => settings.payments_enabled = value.eq_ignore_ascii_case("true"),
                "pay_on_delivery_enabled" => {
                    settings.pay_on_delivery_enabled = value.eq_ignore_ascii_case("true")
                }
                "payment_provider" => settings.payment_provider = value.to_string(),
                "checkout_whatsapp_template" => {
                    settings.checkout_whatsapp_template = value.to_string()
                }
                _ => {}
            }
        }
        settings
    }
}
