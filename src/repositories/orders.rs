use std::str::FromStr;
use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use super::{cell, parse_datetime, parse_i64, parse_u32, parse_uuid};
use crate::{
    errors::ServiceError,
    models::{Order, OrderItem, OrderStatus, PaymentMethod, PaymentProvider},
    store::{sheet, Row, RowStore},
};

/// An order together with its data-row index, needed for conditional writes.
#[derive(Debug, Clone)]
pub struct IndexedOrder {
    pub index: usize,
    pub order: Order,
}

/// Owns the `orders` and `order_items` sheets.
///
/// Order columns: id, order_number, created_at, status, customer_name,
/// customer_email, customer_phone, delivery_location_key, delivery_address,
/// delivery_fee, subtotal, total, payment_method, payment_provider,
/// payment_ref, notes, whatsapp_prefill.
///
/// Item columns: id, order_id, product_id, variant_id, sku, name, size,
/// color, qty, unit_price, line_total.
#[derive(Clone)]
pub struct OrderRepo {
    store: Arc<dyn RowStore>,
}

impl OrderRepo {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> Result<Vec<Order>, ServiceError> {
        let rows = self.store.list(sheet::ORDERS).await?;
        Ok(rows.iter().map(parse_order_row).collect())
    }

    pub async fn find_by_id(&self, order_id: Uuid) -> Result<Option<IndexedOrder>, ServiceError> {
        let rows = self.store.list(sheet::ORDERS).await?;
        Ok(rows.iter().enumerate().find_map(|(index, row)| {
            let order = parse_order_row(row);
            (order.id == order_id).then_some(IndexedOrder { index, order })
        }))
    }

    pub async fn find_by_number(
        &self,
        order_number: &str,
    ) -> Result<Option<IndexedOrder>, ServiceError> {
        let rows = self.store.list(sheet::ORDERS).await?;
        Ok(rows.iter().enumerate().find_map(|(index, row)| {
            let order = parse_order_row(row);
            (order.order_number == order_number).then_some(IndexedOrder { index, order })
        }))
    }

    pub async fn items_for(&self, order_id: Uuid) -> Result<Vec<OrderItem>, ServiceError> {
        let rows = self.store.list(sheet::ORDER_ITEMS).await?;
        Ok(rows
            .iter()
            .map(parse_item_row)
            .filter(|item| item.order_id == order_id)
            .collect())
    }

    /// Appends the order row and its item rows. The order row goes first so a
    /// partially applied write still leaves the order findable.
    #[instrument(skip(self, order, items), fields(order_id = %order.id, item_count = items.len()))]
    pub async fn insert(&self, order: &Order, items: &[OrderItem]) -> Result<(), ServiceError> {
        self.store
            .append(sheet::ORDERS, &[to_order_row(order)])
            .await?;
        let item_rows: Vec<Row> = items.iter().map(to_item_row).collect();
        if !item_rows.is_empty() {
            self.store.append(sheet::ORDER_ITEMS, &item_rows).await?;
        }
        Ok(())
    }

    /// Conditional write: replaces the row at `index` only if it still holds
    /// `expected`. Returns whether this call performed the write.
    pub async fn compare_and_swap(
        &self,
        index: usize,
        expected: &Order,
        new: &Order,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .compare_and_swap(sheet::ORDERS, index, &to_order_row(expected), to_order_row(new))
            .await?)
    }
}

fn parse_order_row(row: &Row) -> Order {
    Order {
        id: parse_uuid(cell(row, 0)),
        order_number: cell(row, 1).to_string(),
        created_at: parse_datetime(cell(row, 2)),
        status: OrderStatus::from_str(cell(row, 3)).unwrap_or(OrderStatus::PendingPayment),
        customer_name: cell(row, 4).to_string(),
        customer_email: cell(row, 5).to_string(),
        customer_phone: cell(row, 6).to_string(),
        delivery_location_key: cell(row, 7).to_string(),
        delivery_address: cell(row, 8).to_string(),
        delivery_fee: parse_i64(cell(row, 9)),
        subtotal: parse_i64(cell(row, 10)),
        total: parse_i64(cell(row, 11)),
        payment_method: PaymentMethod::from_str(cell(row, 12)).unwrap_or(PaymentMethod::Pod),
        payment_provider: PaymentProvider::from_str(cell(row, 13))
            .unwrap_or(PaymentProvider::None),
        payment_ref: cell(row, 14).to_string(),
        notes: cell(row, 15).to_string(),
        whatsapp_prefill: cell(row, 16).to_string(),
    }
}

fn to_order_row(order: &Order) -> Row {
    vec![
        order.id.to_string(),
        order.order_number.clone(),
        order.created_at.to_rfc3339(),
        order.status.to_string(),
        order.customer_name.clone(),
        order.customer_email.clone(),
        order.customer_phone.clone(),
        order.delivery_location_key.clone(),
        order.delivery_address.clone(),
        order.delivery_fee.to_string(),
        order.subtotal.to_string(),
        order.total.to_string(),
        order.payment_method.to_string(),
        order.payment_provider.to_string(),
        order.payment_ref.clone(),
        order.notes.clone(),
        order.whatsapp_prefill.clone(),
    ]
}

fn parse_item_row(row: &Row) -> OrderItem {
    OrderItem {
        id: parse_uuid(cell(row, 0)),
        order_id: parse_uuid(cell(row, 1)),
        product_id: parse_uuid(cell(row, 2)),
        variant_id: parse_uuid(cell(row, 3)),
        sku: cell(row, 4).to_string(),
        name: cell(row, 5).to_string(),
        size: cell(row, 6).to_string(),
        color: cell(row, 7).to_string(),
        qty: parse_u32(cell(row, 8)),
        unit_price: parse_i64(cell(row, 9)),
        line_total: parse_i64(cell(row, 10)),
    }
}

fn to_item_row(item: &OrderItem) -> Row {
    vec![
        item.id.to_string(),
        item.order_id.to_string(),
        item.product_id.to_string(),
        item.variant_id.to_string(),
        item.sku.clone(),
        item.name.clone(),
        item.size.clone(),
        item.color.clone(),
        item.qty.to_string(),
        item.unit_price.to_string(),
        item.line_total.to_string(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRowStore;
    use chrono::Utc;

    fn sample_order() -> Order {
        Order {
            id: Uuid::new_v4(),
            order_number: "ATELIER-20260823-A1B2".into(),
            created_at: Utc::now(),
            status: OrderStatus::PendingPayment,
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
            payment_ref: String::new(),
            notes: String::new(),
            whatsapp_prefill: String::new(),
        }
    }

    fn sample_item(order_id: Uuid) -> OrderItem {
        OrderItem {
            id: Uuid::new_v4(),
            order_id,
            product_id: Uuid::new_v4(),
            variant_id: Uuid::new_v4(),
            sku: "BAG-001".into(),
            name: "Leather Tote".into(),
            size: String::new(),
            color: "Black".into(),
            qty: 2,
            unit_price: 12500,
            line_total: 25000,
        }
    }

    #[tokio::test]
    async fn insert_and_find_with_items() {
        let repo = OrderRepo::new(Arc::new(MemoryRowStore::new()));
        let order = sample_order();
        let items = vec![sample_item(order.id)];
        repo.insert(&order, &items).await.unwrap();

        let found = repo.find_by_number(&order.order_number).await.unwrap().unwrap();
        assert_eq!(found.order, order);
        assert_eq!(found.index, 0);

        let stored_items = repo.items_for(order.id).await.unwrap();
        assert_eq!(stored_items.len(), 1);
        assert_eq!(stored_items[0].line_total, 25000);
    }

    #[tokio::test]
    async fn cas_status_transition_happens_once() {
        let repo = OrderRepo::new(Arc::new(MemoryRowStore::new()));
        let order = sample_order();
        repo.insert(&order, &[]).await.unwrap();

        let mut paid = order.clone();
        paid.status = OrderStatus::Paid;
        paid.payment_ref = "flw-123".into();

        assert!(repo.compare_and_swap(0, &order, &paid).await.unwrap());
        // A redelivered confirmation observes the original row no longer there.
        assert!(!repo.compare_and_swap(0, &order, &paid).await.unwrap());
    }
}
