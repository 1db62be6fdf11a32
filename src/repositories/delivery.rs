use std::sync::Arc;

use tracing::instrument;

use super::{cell, parse_i64};
use crate::{
    errors::ServiceError,
    models::DeliveryLocation,
    store::{sheet, Row, RowStore},
};

/// Columns: location_key, label, fee, eta_days.
///
/// The sheet is tiny (a few dozen rows at most), so writes rewrite the whole
/// sheet rather than tracking row indices.
#[derive(Clone)]
pub struct DeliveryRepo {
    store: Arc<dyn RowStore>,
}

impl DeliveryRepo {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    pub async fn list_all(&self) -> Result<Vec<DeliveryLocation>, ServiceError> {
        let rows = self.store.list(sheet::DELIVERY_FEES).await?;
        Ok(rows.iter().map(parse_row).collect())
    }

    pub async fn get_by_key(&self, key: &str) -> Result<Option<DeliveryLocation>, ServiceError> {
        Ok(self
            .list_all()
            .await?
            .into_iter()
            .find(|loc| loc.location_key == key))
    }

    /// Inserts or replaces the location with the same key.
    #[instrument(skip(self, location), fields(location_key = %location.location_key))]
    pub async fn upsert(&self, location: &DeliveryLocation) -> Result<(), ServiceError> {
        let mut locations = self.list_all().await?;
        match locations
            .iter_mut()
            .find(|l| l.location_key == location.location_key)
        {
            Some(existing) => *existing = location.clone(),
            None => locations.push(location.clone()),
        }
        self.rewrite(&locations).await
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<(), ServiceError> {
        let mut locations = self.list_all().await?;
        let before = locations.len();
        locations.retain(|l| l.location_key != key);
        if locations.len() == before {
            return Err(ServiceError::NotFound(format!(
                "Delivery location {key} not found"
            )));
        }
        self.rewrite(&locations).await
    }

    async fn rewrite(&self, locations: &[DeliveryLocation]) -> Result<(), ServiceError> {
        self.store.clear(sheet::DELIVERY_FEES).await?;
        let rows: Vec<Row> = locations.iter().map(to_row).collect();
        if !rows.is_empty() {
            self.store.append(sheet::DELIVERY_FEES, &rows).await?;
        }
        Ok(())
    }
}

fn parse_row(row: &Row) -> DeliveryLocation {
    DeliveryLocation {
        location_key: cell(row, 0).to_string(),
        label: cell(row, 1).to_string(),
        fee: parse_i64(cell(row, 2)),
        eta_days: cell(row, 3).to_string(),
    }
}

fn to_row(location: &DeliveryLocation) -> Row {
    vec![
        location.location_key.clone(),
        location.label.clone(),
        location.fee.to_string(),
        location.eta_days.clone(),
    ]
}
