use chrono::Utc;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{Order, OrderItem, OrderStatus, OrderWithItems, PaymentMethod, PaymentProvider},
    repositories::OrderRepo,
    util::{format_kes, generate_order_number},
};

const MAX_CAS_ATTEMPTS: usize = 32;

/// Everything needed to persist a new order; totals are computed by the
/// caller (checkout) against the live catalog.
pub struct NewOrder {
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: String,
    pub delivery_location_key: String,
    pub delivery_address: String,
    pub delivery_fee: i64,
    pub subtotal: i64,
    pub payment_method: PaymentMethod,
    pub payment_provider: PaymentProvider,
    pub notes: String,
    pub items: Vec<NewOrderItem>,
}

/// One order line before persistence; snapshot fields come from the catalog
/// at checkout time.
pub struct NewOrderItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub sku: String,
    pub name: String,
    pub size: String,
    pub color: String,
    pub qty: u32,
    pub unit_price: i64,
}

#[derive(Clone)]
pub struct OrderService {
    orders: OrderRepo,
    order_number_prefix: String,
}

impl OrderService {
    pub fn new(orders: OrderRepo, order_number_prefix: String) -> Self {
        Self {
            orders,
            order_number_prefix,
        }
    }

    /// Persists a new order with its line-item snapshots and a generated
    /// order number. The internal id is the uniqueness key; the order number
    /// is display-only.
    #[instrument(skip(self, new_order), fields(items = new_order.items.len()))]
    pub async fn create_order(
        &self,
        new_order: NewOrder,
        initial_status: OrderStatus,
    ) -> Result<OrderWithItems, ServiceError> {
        let order_id = Uuid::new_v4();
        let items: Vec<OrderItem> = new_order
            .items
            .into_iter()
            .map(|line| OrderItem {
                id: Uuid::new_v4(),
                order_id,
                product_id: line.product_id,
                variant_id: line.variant_id,
                sku: line.sku,
                name: line.name,
                size: line.size,
                color: line.color,
                qty: line.qty,
                unit_price: line.unit_price,
                line_total: line.unit_price * i64::from(line.qty),
            })
            .collect();

        let order = Order {
            id: order_id,
            order_number: generate_order_number(&self.order_number_prefix),
            created_at: Utc::now(),
            status: initial_status,
            customer_name: new_order.customer_name,
            customer_email: new_order.customer_email,
            customer_phone: new_order.customer_phone,
            delivery_location_key: new_order.delivery_location_key,
            delivery_address: new_order.delivery_address,
            delivery_fee: new_order.delivery_fee,
            subtotal: new_order.subtotal,
            total: new_order.subtotal + new_order.delivery_fee,
            payment_method: new_order.payment_method,
            payment_provider: new_order.payment_provider,
            payment_ref: String::new(),
            notes: new_order.notes,
            whatsapp_prefill: String::new(),
        };

        let mut order = order;
        order.whatsapp_prefill = build_whatsapp_prefill(&order, &items);

        self.orders.insert(&order, &items).await?;
        info!(order_number = %order.order_number, total = order.total, "order created");
        Ok(OrderWithItems { order, items })
    }

    pub async fn get_by_number(&self, order_number: &str) -> Result<OrderWithItems, ServiceError> {
        let found = self
            .orders
            .find_by_number(order_number)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_number} not found")))?;
        let items = self.orders.items_for(found.order.id).await?;
        Ok(OrderWithItems {
            order: found.order,
            items,
        })
    }

    pub async fn get_by_id(&self, order_id: Uuid) -> Result<OrderWithItems, ServiceError> {
        let found = self
            .orders
            .find_by_id(order_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        let items = self.orders.items_for(order_id).await?;
        Ok(OrderWithItems {
            order: found.order,
            items,
        })
    }

    /// Most recent first.
    pub async fn list_orders(&self) -> Result<Vec<Order>, ServiceError> {
        let mut orders = self.orders.list_all().await?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Sets the order status, returning the updated order and the status it
    /// held before. Retries on concurrent modification.
    #[instrument(skip(self), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
    ) -> Result<(Order, OrderStatus), ServiceError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let found = self
                .orders
                .find_by_id(order_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
            let previous = found.order.status;
            if previous == new_status {
                return Ok((found.order, previous));
            }
            let mut updated = found.order.clone();
            updated.status = new_status;
            if self
                .orders
                .compare_and_swap(found.index, &found.order, &updated)
                .await?
            {
                return Ok((updated, previous));
            }
        }
        Err(ServiceError::Conflict(
            "Order is being updated, please retry".to_string(),
        ))
    }

    /// Transitions the order to PAID, but only if it is not PAID already.
    /// Returns `Some(order)` when this call performed the transition and
    /// `None` when another caller already had. Side effects (stock decrement,
    /// confirmation email) must be gated on `Some`.
    #[instrument(skip(self, payment_ref), fields(order_id = %order_id))]
    pub async fn mark_paid(
        &self,
        order_id: Uuid,
        payment_ref: &str,
    ) -> Result<Option<Order>, ServiceError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let found = self
                .orders
                .find_by_id(order_id)
                .await?
                .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
            if found.order.status == OrderStatus::Paid {
                return Ok(None);
            }
            let mut paid = found.order.clone();
            paid.status = OrderStatus::Paid;
            paid.payment_ref = payment_ref.to_string();
            if self
                .orders
                .compare_and_swap(found.index, &found.order, &paid)
                .await?
            {
                info!(order_number = %paid.order_number, "order marked paid");
                return Ok(Some(paid));
            }
        }
        Err(ServiceError::Conflict(
            "Order is being updated, please retry".to_string(),
        ))
    }
}

/// Customer-service message prefilled into a wa.me link, URL-encoded.
fn build_whatsapp_prefill(order: &Order, items: &[OrderItem]) -> String {
    let mut lines = Vec::with_capacity(items.len());
    for item in items {
        let attrs = if item.size.is_empty() {
            format!("({})", item.color)
        } else {
            format!("({}, {})", item.color, item.size)
        };
        lines.push(format!("{} {} x{}", item.name, attrs, item.qty));
    }
    let message = format!(
        "Hi! I just placed order {}.\n\nItems:\n{}\n\nTotal: {}\n\nDelivery to: {}\n\nExchanges within 24 hours; no returns.",
        order.order_number,
        lines.join("\n"),
        format_kes(order.total),
        order.delivery_address,
    );
    urlencoding::encode(&message).into_owned()
}
