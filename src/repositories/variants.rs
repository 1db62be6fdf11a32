use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use super::{bool_cell, cell, parse_bool, parse_datetime, parse_i64, parse_uuid};
use crate::{
    errors::ServiceError,
    models::Variant,
    store::{sheet, Row, RowStore},
};

/// A variant together with its data-row index, needed for conditional writes.
#[derive(Debug, Clone)]
pub struct IndexedVariant {
    pub index: usize,
    pub variant: Variant,
}

/// Columns: id, product_id, size, color, stock, low_stock_threshold, active,
/// updated_at.
#[derive(Clone)]
pub struct VariantRepo {
    store: Arc<dyn RowStore>,
}

impl VariantRepo {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> Result<Vec<Variant>, ServiceError> {
        let rows = self.store.list(sheet::VARIANTS).await?;
        Ok(rows.iter().map(parse_row).collect())
    }

    pub async fn list_for_product(&self, product_id: Uuid) -> Result<Vec<Variant>, ServiceError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|v| v.product_id == product_id)
            .collect())
    }

    pub async fn find(&self, variant_id: Uuid) -> Result<Option<IndexedVariant>, ServiceError> {
        let rows = self.store.list(sheet::VARIANTS).await?;
        Ok(rows.iter().enumerate().find_map(|(index, row)| {
            let variant = parse_row(row);
            (variant.id == variant_id).then_some(IndexedVariant { index, variant })
        }))
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.id))]
    pub async fn insert(&self, variant: &Variant) -> Result<(), ServiceError> {
        self.store
            .append(sheet::VARIANTS, &[to_row(variant)])
            .await?;
        Ok(())
    }

    #[instrument(skip(self, variant), fields(variant_id = %variant.id))]
    pub async fn update(&self, variant: &Variant) -> Result<(), ServiceError> {
        let found = self.find(variant.id).await?.ok_or_else(|| {
            ServiceError::NotFound(format!("Variant {} not found", variant.id))
        })?;
        self.store
            .update(sheet::VARIANTS, found.index, to_row(variant))
            .await?;
        Ok(())
    }

    /// Conditional write: replaces the row at `index` only if it still holds
    /// `expected`. Returns whether this call performed the write.
    pub async fn compare_and_swap(
        &self,
        index: usize,
        expected: &Variant,
        new: &Variant,
    ) -> Result<bool, ServiceError> {
        Ok(self
            .store
            .compare_and_swap(sheet::VARIANTS, index, &to_row(expected), to_row(new))
            .await?)
    }
}

fn parse_row(row: &Row) -> Variant {
    Variant {
        id: parse_uuid(cell(row, 0)),
        product_id: parse_uuid(cell(row, 1)),
        size: cell(row, 2).to_string(),
        color: cell(row, 3).to_string(),
        stock: parse_i64(cell(row, 4)),
        low_stock_threshold: parse_i64(cell(row, 5)),
        active: parse_bool(cell(row, 6)),
        updated_at: parse_datetime(cell(row, 7)),
    }
}

fn to_row(variant: &Variant) -> Row {
    vec![
        variant.id.to_string(),
        variant.product_id.to_string(),
        variant.size.clone(),
        variant.color.clone(),
        variant.stock.to_string(),
        variant.low_stock_threshold.to_string(),
        bool_cell(variant.active),
        variant.updated_at.to_rfc3339(),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRowStore;
    use chrono::Utc;

    fn sample(stock: i64) -> Variant {
        Variant {
            id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            size: "38".into(),
            color: "Black".into(),
            stock,
            low_stock_threshold: 2,
            active: true,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn find_returns_row_index() {
        let repo = VariantRepo::new(Arc::new(MemoryRowStore::new()));
        let first = sample(5);
        let second = sample(3);
        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();

        let found = repo.find(second.id).await.unwrap().unwrap();
        assert_eq!(found.index, 1);
        assert_eq!(found.variant.stock, 3);
    }

    #[tokio::test]
    async fn cas_fails_when_row_changed() {
        let repo = VariantRepo::new(Arc::new(MemoryRowStore::new()));
        let variant = sample(5);
        repo.insert(&variant).await.unwrap();

        let mut winner = variant.clone();
        winner.stock = 4;
        assert!(repo.compare_and_swap(0, &variant, &winner).await.unwrap());

        // Second writer still holds the original row.
        let mut loser = variant.clone();
        loser.stock = 3;
        assert!(!repo.compare_and_swap(0, &variant, &loser).await.unwrap());
    }
}
