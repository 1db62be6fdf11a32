//! Row-oriented storage behind a narrow trait.
//!
//! The production datastore is a spreadsheet consumed as a set of named
//! sheets (tables) with a fixed column order per sheet. Everything above this
//! module talks to [`RowStore`] only, so the backing can be swapped (the
//! in-memory store is used in tests and as the default backend).

use async_trait::async_trait;

pub mod memory;
pub mod sheets;

/// A single data row; cells are untyped strings in the sheet's column order.
pub type Row = Vec<String>;

/// Sheet (table) names.
pub mod sheet {
    pub const PRODUCTS: &str = "products";
    pub const VARIANTS: &str = "variants";
    pub const DELIVERY_FEES: &str = "delivery_fees";
    pub const ORDERS: &str = "orders";
    pub const ORDER_ITEMS: &str = "order_items";
    pub const SETTINGS: &str = "settings";
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Row {index} out of range for sheet {sheet}")]
    RowOutOfRange { sheet: String, index: usize },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Minimal row-store contract: list-all, append, update-by-index, conditional
/// update, clear. Row indexes are zero-based over the data rows (the header
/// row is not part of this interface).
#[async_trait]
pub trait RowStore: Send + Sync {
    async fn list(&self, sheet: &str) -> Result<Vec<Row>, StoreError>;

    async fn append(&self, sheet: &str, rows: &[Row]) -> Result<(), StoreError>;

    async fn update(&self, sheet: &str, index: usize, row: Row) -> Result<(), StoreError>;

    /// Replaces the row at `index` only if it still equals `expected`.
    /// Returns whether the swap happened. This is the primitive the stock
    /// decrement and the PAID transition are built on; callers re-read and
    /// retry on `false`.
    async fn compare_and_swap(
        &self,
        sheet: &str,
        index: usize,
        expected: &Row,
        new: Row,
    ) -> Result<bool, StoreError>;

    async fn clear(&self, sheet: &str) -> Result<(), StoreError>;
}
