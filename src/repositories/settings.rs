use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use super::cell;
use crate::{
    errors::ServiceError,
    models::SiteSettings,
    store::{sheet, Row, RowStore},
};

/// Columns: key, value, updated_at.
#[derive(Clone)]
pub struct SettingsRepo {
    store: Arc<dyn RowStore>,
}

impl SettingsRepo {
    pub fn new(store: Arc<dyn RowStore>) -> Self {
        Self { store }
    }

    /// Raw key/value pairs as stored, last occurrence of a key wins on merge.
    pub async fn rows(&self) -> Result<Vec<(String, String)>, ServiceError> {
        let rows = self.store.list(sheet::SETTINGS).await?;
        Ok(rows
            .iter()
            .map(|row| (cell(row, 0).to_string(), cell(row, 1).to_string()))
            .collect())
    }

    /// Stored values merged over compiled-in defaults; unknown keys dropped.
    pub async fn merged(&self) -> Result<SiteSettings, ServiceError> {
        let rows = self.rows().await?;
        Ok(SiteSettings::merge_rows(
            rows.iter().map(|(k, v)| (k.as_str(), v.as_str())),
        ))
    }

    /// Writes one key, updating the existing row in place or appending.
    #[instrument(skip(self, value))]
    pub async fn set(&self, key: &str, value: &str) -> Result<(), ServiceError> {
        let rows = self.store.list(sheet::SETTINGS).await?;
        let now = Utc::now().to_rfc3339();
        let new_row: Row = vec![key.to_string(), value.to_string(), now];
        match rows.iter().position(|row| cell(row, 0) == key) {
            Some(index) => self.store.update(sheet::SETTINGS, index, new_row).await?,
            None => self.store.append(sheet::SETTINGS, &[new_row]).await?,
        }
        Ok(())
    }

    /// Applies a batch of key/value updates.
    pub async fn set_many<'a, I>(&self, entries: I) -> Result<(), ServiceError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in entries {
            self.set(key, value).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryRowStore;

    #[tokio::test]
    async fn set_updates_in_place() {
        let repo = SettingsRepo::new(Arc::new(MemoryRowStore::new()));
        repo.set("contact_email", "a@example.com").await.unwrap();
        repo.set("contact_email", "b@example.com").await.unwrap();

        let rows = repo.rows().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].1, "b@example.com");
    }

    #[tokio::test]
    async fn merged_applies_over_defaults() {
        let repo = SettingsRepo::new(Arc::new(MemoryRowStore::new()));
        repo.set("payments_enabled", "false").await.unwrap();
        repo.set("not_a_setting", "x").await.unwrap();

        let settings = repo.merged().await.unwrap();
        assert!(!settings.payments_enabled);
        assert!(settings.pay_on_delivery_enabled);
    }
}
