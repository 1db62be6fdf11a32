use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::{instrument, warn};

use super::{Row, RowStore, StoreError};

/// Row store backed by the Google Sheets values REST API.
///
/// Data rows start at spreadsheet row 2 (row 1 is the header), so data-row
/// index `i` maps to range `A{i + 2}`.
pub struct SheetsRowStore {
    http: reqwest::Client,
    api_base: String,
    spreadsheet_id: String,
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Row>,
}

impl SheetsRowStore {
    pub fn new(
        http: reqwest::Client,
        api_base: String,
        spreadsheet_id: String,
        access_token: String,
    ) -> Self {
        Self {
            http,
            api_base,
            spreadsheet_id,
            access_token,
        }
    }

    fn values_url(&self, range: &str) -> String {
        format!(
            "{}/spreadsheets/{}/values/{}",
            self.api_base, self.spreadsheet_id, range
        )
    }

    async fn check(&self, response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StoreError::Backend(format!("sheets {status}: {body}")))
        }
    }
}

#[async_trait]
impl RowStore for SheetsRowStore {
    #[instrument(skip(self))]
    async fn list(&self, sheet: &str) -> Result<Vec<Row>, StoreError> {
        let url = self.values_url(&format!("{sheet}!A2:Z"));
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        let range: ValueRange = self.check(response).await?.json().await?;
        Ok(range.values)
    }

    #[instrument(skip(self, rows), fields(count = rows.len()))]
    async fn append(&self, sheet: &str, rows: &[Row]) -> Result<(), StoreError> {
        let url = format!(
            "{}:append?valueInputOption=RAW",
            self.values_url(&format!("{sheet}!A2:Z"))
        );
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": rows }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    #[instrument(skip(self, row))]
    async fn update(&self, sheet: &str, index: usize, row: Row) -> Result<(), StoreError> {
        let line = index + 2;
        let url = format!(
            "{}?valueInputOption=RAW",
            self.values_url(&format!("{sheet}!A{line}:Z{line}"))
        );
        let response = self
            .http
            .put(url)
            .bearer_auth(&self.access_token)
            .json(&json!({ "values": [row] }))
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }

    /// The Sheets API has no conditional update, so this is read-compare-write
    /// and only advisory against concurrent writers of the same row.
    async fn compare_and_swap(
        &self,
        sheet: &str,
        index: usize,
        expected: &Row,
        new: Row,
    ) -> Result<bool, StoreError> {
        let rows = self.list(sheet).await?;
        match rows.get(index) {
            Some(current) if current == expected => {
                self.update(sheet, index, new).await?;
                Ok(true)
            }
            Some(_) => {
                warn!(sheet, index, "conditional update lost to a concurrent writer");
                Ok(false)
            }
            None => Ok(false),
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self, sheet: &str) -> Result<(), StoreError> {
        let url = format!("{}:clear", self.values_url(&format!("{sheet}!A2:Z")));
        let response = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .send()
            .await?;
        self.check(response).await?;
        Ok(())
    }
}
