use async_trait::async_trait;
use dashmap::DashMap;

use super::{Row, RowStore, StoreError};

/// In-memory row store. DashMap holds each sheet under a shard lock, so
/// `compare_and_swap` is atomic with respect to other writers of the same
/// sheet. Default backend; also the test backend.
#[derive(Debug, Default)]
pub struct MemoryRowStore {
    sheets: DashMap<String, Vec<Row>>,
}

impl MemoryRowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RowStore for MemoryRowStore {
    async fn list(&self, sheet: &str) -> Result<Vec<Row>, StoreError> {
        Ok(self
            .sheets
            .get(sheet)
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }

    async fn append(&self, sheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        self.sheets
            .entry(sheet.to_string())
            .or_default()
            .extend_from_slice(rows);
        Ok(())
    }

    async fn update(&self, sheet: &str, index: usize, row: Row) -> Result<(), StoreError> {
        let mut rows = self
            .sheets
            .get_mut(sheet)
            .ok_or_else(|| StoreError::RowOutOfRange {
                sheet: sheet.to_string(),
                index,
            })?;
        let slot = rows.get_mut(index).ok_or_else(|| StoreError::RowOutOfRange {
            sheet: sheet.to_string(),
            index,
        })?;
        *slot = row;
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        sheet: &str,
        index: usize,
        expected: &Row,
        new: Row,
    ) -> Result<bool, StoreError> {
        let mut rows = match self.sheets.get_mut(sheet) {
            Some(rows) => rows,
            None => return Ok(false),
        };
        match rows.get_mut(index) {
            Some(slot) if slot == expected => {
                *slot = new;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn clear(&self, sheet: &str) -> Result<(), StoreError> {
        self.sheets.remove(sheet);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Row {
        cells.iter().map(|c| c.to_string()).collect()
    }

    #[tokio::test]
    async fn append_and_list_round_trip() {
        let store = MemoryRowStore::new();
        store.append("t", &[row(&["a", "1"])]).await.unwrap();
        store.append("t", &[row(&["b", "2"])]).await.unwrap();
        let rows = store.list("t").await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1][0], "b");
    }

    #[tokio::test]
    async fn cas_rejects_stale_expected_row() {
        let store = MemoryRowStore::new();
        store.append("t", &[row(&["a", "1"])]).await.unwrap();

        let stale = row(&["a", "0"]);
        assert!(!store
            .compare_and_swap("t", 0, &stale, row(&["a", "9"]))
            .await
            .unwrap());

        let current = row(&["a", "1"]);
        assert!(store
            .compare_and_swap("t", 0, &current, row(&["a", "9"]))
            .await
            .unwrap());
        assert_eq!(store.list("t").await.unwrap()[0][1], "9");
    }

    #[tokio::test]
    async fn cas_on_missing_sheet_or_row_is_false() {
        let store = MemoryRowStore::new();
        assert!(!store
            .compare_and_swap("none", 0, &row(&["x"]), row(&["y"]))
            .await
            .unwrap());
        store.append("t", &[row(&["a"])]).await.unwrap();
        assert!(!store
            .compare_and_swap("t", 5, &row(&["a"]), row(&["y"]))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn update_out_of_range_is_an_error() {
        let store = MemoryRowStore::new();
        store.append("t", &[row(&["a"])]).await.unwrap();
        let err = store.update("t", 3, row(&["b"])).await.unwrap_err();
        assert!(matches!(err, StoreError::RowOutOfRange { index: 3, .. }));
    }
}
