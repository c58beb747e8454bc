use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::app::ports::PageSource;
use crate::constants::USER_AGENT;
use crate::error::Result;
use crate::types::RawRecord;

/// Pages through a Socrata dataset (`$limit` / `$offset`)
pub struct SocrataPageSource {
    client: reqwest::Client,
    endpoint: String,
}

impl SocrataPageSource {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl PageSource for SocrataPageSource {
    async fn fetch_page(&self, offset: u64, limit: u64) -> std::result::Result<Vec<RawRecord>, String> {
        // Ordering by the row id keeps offsets stable between requests
        let resp = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("$limit", limit.to_string()),
                ("$offset", offset.to_string()),
                ("$order", ":id".to_string()),
            ])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("Failed to retrieve data: HTTP {}", status.as_u16()));
        }
        let records: Vec<RawRecord> = resp.json().await.map_err(|e| e.to_string())?;
        debug!("Fetched {} records at offset {}", records.len(), offset);
        Ok(records)
    }
}
