use chrono::Utc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::{
    errors::ServiceError,
    models::{OrderItem, Variant},
    repositories::VariantRepo,
};

/// Retries are cheap (one read, one conditional write); a failure means
/// another writer made progress, so the loop cannot livelock for long.
const MAX_CAS_ATTEMPTS: usize = 32;

/// Guards variant stock. All decrements go through the conditional-write
/// loop so stock never goes negative, even under concurrent checkouts.
#[derive(Clone)]
pub struct InventoryService {
    variants: VariantRepo,
}

impl InventoryService {
    pub fn new(variants: VariantRepo) -> Self {
        Self { variants }
    }

    /// Verifies `qty` units are sellable right now. Does not reserve.
    pub async fn check_availability(
        &self,
        variant_id: Uuid,
        qty: u32,
        display_name: &str,
    ) -> Result<Variant, ServiceError> {
        let found = self
            .variants
            .find(variant_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Variant {variant_id} not found")))?;
        ensure_stock(&found.variant, qty, display_name)?;
        Ok(found.variant)
    }

    /// Atomically decrements stock by `qty`. On contention the current row is
    /// re-read and the decrement retried against fresh stock, so two
    /// concurrent buyers can never drive stock below zero.
    #[instrument(skip(self, display_name), fields(variant_id = %variant_id, qty))]
    pub async fn decrement_stock(
        &self,
        variant_id: Uuid,
        qty: u32,
        display_name: &str,
    ) -> Result<Variant, ServiceError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let found = self.variants.find(variant_id).await?.ok_or_else(|| {
                ServiceError::NotFound(format!("Variant {variant_id} not found"))
            })?;
            ensure_stock(&found.variant, qty, display_name)?;

            let mut updated = found.variant.clone();
            updated.stock -= i64::from(qty);
            updated.updated_at = Utc::now();

            if self
                .variants
                .compare_and_swap(found.index, &found.variant, &updated)
                .await?
            {
                if updated.stock <= updated.low_stock_threshold {
                    warn!(
                        variant_id = %updated.id,
                        stock = updated.stock,
                        "variant at or below low-stock threshold"
                    );
                }
                return Ok(updated);
            }
        }
        Err(ServiceError::Conflict(
            "Stock is being updated, please retry".to_string(),
        ))
    }

    /// Decrements stock for every line of a confirmed order. Partial failures
    /// are reported but do not roll back earlier lines; oversell is prevented
    /// per line by the conditional write.
    pub async fn decrement_for_items(&self, items: &[OrderItem]) -> Result<(), ServiceError> {
        for item in items {
            self.decrement_stock(item.variant_id, item.qty, &item.name)
                .await?;
        }
        Ok(())
    }
}

fn ensure_stock(variant: &Variant, qty: u32, display_name: &str) -> Result<(), ServiceError> {
    if !variant.active {
        return Err(ServiceError::InsufficientStock(format!(
            "{display_name} is no longer available"
        )));
    }
    if variant.stock <= 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "{display_name} is out of stock"
        )));
    }
    if variant.stock < i64::from(qty) {
        return Err(ServiceError::InsufficientStock(format!(
            "Only {} of {display_name} available",
            variant.stock
        )));
    }
    Ok(())
}
