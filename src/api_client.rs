use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use std::collections::HashMap;
use tracing::debug;

use crate::domain::errors::FetchError;
use crate::domain::models::{PageRequest, PageResponse, PageResult};

/// Source of holdings pages. `request.page` is 1-based.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, FetchError>;
}

pub struct ReqwestPageFetcher {
    client: Client,
    base_url: String,
    as_of: Option<NaiveDate>,
}

impl ReqwestPageFetcher {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            as_of: None,
        }
    }

    /// Pin every request to one report date instead of the backend's latest.
    pub fn with_as_of(mut self, as_of: Option<NaiveDate>) -> Self {
        self.as_of = as_of;
        self
    }
}

#[async_trait]
impl PageFetcher for ReqwestPageFetcher {
    #[tracing::instrument(skip(self), fields(dataset = %request.dataset_id, page = request.page))]
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, FetchError> {
        let url = format!("{}/holdings/shares", self.base_url);
        let mut params = HashMap::new();
        params.insert("cik", request.dataset_id.clone());
        params.insert("page", request.page.to_string());
        params.insert("limit", request.page_size.to_string());
        if let Some(d) = self.as_of {
            params.insert("date", d.format("%Y-%m-%d").to_string());
        }

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .query(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response.bytes().await?;
        let parsed: PageResponse =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))?;
        let result = PageResult::from(parsed);
        debug!(fetched = result.rows.len(), total = ?result.total);
        Ok(result)
    }
}

// Fixed-response fetcher for tests and handler mocks
pub struct MockPageFetcher {
    pub result: PageResult,
}

impl MockPageFetcher {
    pub fn new(result: PageResult) -> Self {
        Self { result }
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch_page(&self, _request: &PageRequest) -> Result<PageResult, FetchError> {
        Ok(self.result.clone())
    }
}
