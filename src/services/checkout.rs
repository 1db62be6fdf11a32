use std::str::FromStr;

use serde::Deserialize;
use tracing::{instrument, warn};
use validator::Validate;

use crate::{
    errors::ServiceError,
    models::{Cart, OrderStatus, OrderWithItems, PaymentMethod, PaymentProvider},
    repositories::{DeliveryRepo, ProductRepo, SettingsRepo},
    services::{
        orders::{NewOrder, NewOrderItem},
        InventoryService, NotificationService, OrderService,
    },
    util::{format_phone_e164, is_valid_kenyan_phone, whatsapp_link},
};

#[derive(Debug, Deserialize, Validate)]
pub struct CheckoutRequest {
    #[validate(length(min = 2, message = "Name is required"))]
    pub customer_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub customer_email: String,
    pub customer_phone: String,
    #[validate(length(min = 1, message = "Delivery location is required"))]
    pub delivery_location_key: String,
    #[validate(length(min = 5, message = "Delivery address is required"))]
    pub delivery_address: String,
    /// CARD, MPESA, AIRTEL, POD, or WHATSAPP (treated as POD with a note).
    pub payment_method: String,
    #[serde(default)]
    pub notes: String,
}

/// What the storefront does next after a successful checkout.
#[derive(Debug)]
pub enum CheckoutOutcome {
    /// Online payment: browser follows `redirect_url` to start the hosted
    /// payment. Stock is decremented only once the payment confirms.
    Redirect {
        order: OrderWithItems,
        redirect_url: String,
    },
    /// Pay on delivery: order confirmed immediately, stock already
    /// decremented, WhatsApp handoff link ready.
    PayOnDelivery {
        order: OrderWithItems,
        whatsapp_url: String,
    },
}

/// Turns a cart plus customer details into a persisted order.
#[derive(Clone)]
pub struct CheckoutService {
    products: ProductRepo,
    delivery: DeliveryRepo,
    settings: SettingsRepo,
    orders: OrderService,
    inventory: InventoryService,
    notifications: NotificationService,
}

impl CheckoutService {
    pub fn new(
        products: ProductRepo,
        delivery: DeliveryRepo,
        settings: SettingsRepo,
        orders: OrderService,
        inventory: InventoryService,
        notifications: NotificationService,
    ) -> Self {
        Self {
            products,
            delivery,
            settings,
            orders,
            inventory,
            notifications,
        }
    }

    #[instrument(skip(self, cart, request), fields(lines = cart.items.len()))]
    pub async fn process_checkout(
        &self,
        cart: &Cart,
        request: CheckoutRequest,
    ) -> Result<CheckoutOutcome, ServiceError> {
        if cart.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "Your cart is empty".to_string(),
            ));
        }
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if !is_valid_kenyan_phone(&request.customer_phone) {
            return Err(ServiceError::ValidationError(
                "A valid Kenyan phone number is required".to_string(),
            ));
        }
        // WhatsApp-arranged orders ride the pay-on-delivery path with a note
        // so the back office can tell them apart.
        let (payment_method, notes) = if request.payment_method == "WHATSAPP" {
            let notes = if request.notes.is_empty() {
                "WhatsApp order".to_string()
            } else {
                format!("WhatsApp order. {}", request.notes)
            };
            (PaymentMethod::Pod, notes)
        } else {
            let method = PaymentMethod::from_str(&request.payment_method)
                .map_err(|_| ServiceError::InvalidInput("Unknown payment method".to_string()))?;
            (method, request.notes.clone())
        };

        let settings = self.settings.merged().await?;
        match payment_method {
            PaymentMethod::Pod if !settings.pay_on_delivery_enabled => {
                return Err(ServiceError::ValidationError(
                    "Pay on delivery is currently unavailable".to_string(),
                ));
            }
            PaymentMethod::Card | PaymentMethod::Mpesa | PaymentMethod::Airtel
                if !settings.payments_enabled =>
            {
                return Err(ServiceError::ValidationError(
                    "Online payments are currently unavailable".to_string(),
                ));
            }
            _ => {}
        }

        let location = self
            .delivery
            .get_by_key(&request.delivery_location_key)
            .await?
            .ok_or_else(|| {
                ServiceError::InvalidInput("Unknown delivery location".to_string())
            })?;

        // Re-verify every line against the live catalog: cookie carts can be
        // stale on both price and stock.
        let mut subtotal = 0i64;
        let mut lines = Vec::with_capacity(cart.items.len());
        for item in &cart.items {
            let product = self
                .products
                .find(item.product_id)
                .await?
                .filter(|p| p.active)
                .ok_or_else(|| {
                    ServiceError::InsufficientStock(format!(
                        "{} is no longer available",
                        item.name
                    ))
                })?;
            self.inventory
                .check_availability(item.variant_id, item.qty, &product.name)
                .await?;
            subtotal += product.price * i64::from(item.qty);
            lines.push(NewOrderItem {
                product_id: item.product_id,
                variant_id: item.variant_id,
                sku: product.sku.clone(),
                name: product.name.clone(),
                size: item.size.clone(),
                color: item.color.clone(),
                qty: item.qty,
                unit_price: product.price,
            });
        }

        let (initial_status, provider) = match payment_method {
            PaymentMethod::Pod => (OrderStatus::PayOnDelivery, PaymentProvider::None),
            _ => (OrderStatus::PendingPayment, PaymentProvider::Flutterwave),
        };

        let created = self
            .orders
            .create_order(
                NewOrder {
                    customer_name: request.customer_name,
                    customer_email: request.customer_email,
                    customer_phone: format_phone_e164(&request.customer_phone),
                    delivery_location_key: location.location_key,
                    delivery_address: request.delivery_address,
                    delivery_fee: location.fee,
                    subtotal,
                    payment_method,
                    payment_provider: provider,
                    notes,
                    items: lines,
                },
                initial_status,
            )
            .await?;

        if payment_method == PaymentMethod::Pod {
            // Pay-on-delivery commits the sale now, so stock comes out now.
            // If a line raced to zero since the availability check, the order
            // is cancelled instead of overselling.
            if let Err(error) = self.inventory.decrement_for_items(&created.items).await {
                warn!(
                    order_number = %created.order.order_number,
                    %error,
                    "cancelling order, stock ran out during checkout"
                );
                self.orders
                    .update_status(created.order.id, OrderStatus::Cancelled)
                    .await?;
                return Err(error);
            }
        }

        // Every surviving order gets the received email, paid or not.
        self.notifications
            .order_received(&created.order, &created.items)
            .await;

        if payment_method == PaymentMethod::Pod {
            let whatsapp_url =
                whatsapp_link(&settings.whatsapp_e164, &created.order.whatsapp_prefill);
            Ok(CheckoutOutcome::PayOnDelivery {
                order: created,
                whatsapp_url,
            })
        } else {
            let redirect_url = format!(
                "/api/payments/init?orderNumber={}",
                created.order.order_number
            );
            Ok(CheckoutOutcome::Redirect {
                order: created,
                redirect_url,
            })
        }
    }
}
