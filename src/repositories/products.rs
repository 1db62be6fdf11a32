use std::str::FromStr;
use std::sync::Arc;

use tracing::instrument;
use uuid::Uuid;

use super::{bool_cell, cell, parse_bool, parse_datetime, parse_i64, parse_uuid};
use crate::{
    errors::ServiceError,
    models::{Category, Product},
    store::{sheet, Row, RowStore},
};

/// Columns: id, sku, category, name, description, price, images (csv),
/// active, created_at, updated_at.
#[derive(Clone)]
pub struct ProductRepo {
    store: Arc<dyn RowStore>,
}

impl ProductRepo {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> Result<Vec<Product>, ServiceError> {
        let rows = self.store.list(sheet::PRODUCTS).await?;
        Ok(rows.iter().map(parse_row).collect())
    }

    pub async fn list_active(&self) -> Result<Vec<Product>, ServiceError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .filter(|p| p.active)
            .collect())
    }

    pub async fn find(&self, product_id: Uuid) -> Result<Option<Product>, ServiceError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|p| p.id == product_id))
    }

    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn insert(&self, product: &Product) -> Result<(), ServiceError> {
        self.store
            .append(sheet::PRODUCTS, &[to_row(product)])
            .await?;
        Ok(())
    }

    /// Rewrites the full row for an existing product; `created_at` is
    /// preserved from the stored row.
    #[instrument(skip(self, product), fields(product_id = %product.id))]
    pub async fn update(&self, product: &Product) -> Result<Product, ServiceError> {
        let rows = self.store.list(sheet::PRODUCTS).await?;
        let index = rows
            .iter()
            .position(|row| cell(row, 0) == product.id.to_string())
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product.id)))?;

        let mut updated = product.clone();
        updated.created_at = parse_datetime(cell(&rows[index], 8));
        self.store
            .update(sheet::PRODUCTS, index, to_row(&updated))
            .await?;
        Ok(updated)
    }
}

fn parse_row(row: &Row) -> Product {
    Product {
        id: parse_uuid(cell(row, 0)),
        sku: cell(row, 1).to_string(),
        category: Category::from_str(cell(row, 2)).unwrap_or(Category::Handbags),
        name: cell(row, 3).to_string(),
        description: cell(row, 4).to_string(),
        price: parse_i64(cell(row, 5)),
        images: cell(row, 6)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect(),
        active: parse_bool(cell(row, 7)),
        created_at: parse_datetime(cell(row, 8)),
        updated_at: parse_datetime(cell(row, 9)),
    }
}

fn to_row(product: &Product) -> Row {
    vec![
        product.id.to_string(),
        product.sku.clone(),
        product.category.to_string(),
        product.name.clone(),
        product.description.clone(),
        product.price.to_string(),
        product.images.join(","),
        bool_cell(product.active),
        product.created_at.to_rfc3339(),
        product.updated_at.to_rfc3339(),
    ]
}
