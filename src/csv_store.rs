use async_trait::async_trait;
use chrono::NaiveDate;
use csv::ReaderBuilder;
use serde::Deserialize;
use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

use crate::api_client::PageFetcher;
use crate::domain::errors::FetchError;
use crate::domain::models::{HoldingsRow, PageRequest, PageResult};

#[derive(Debug, Deserialize)]
struct HoldingsCsv {
    cik: String,
    issuer_id: i64,
    issuer_name: String,
    #[serde(default)]
    cusip: Option<String>,
    date: NaiveDate,
    #[serde(default)]
    shares_owned: Option<u64>,
    #[serde(default)]
    shares_change: Option<i64>,
    #[serde(default)]
    shares_change_pct: Option<f64>,
}

/// Serves pages out of a holdings CSV loaded into memory, keyed by `cik`.
pub struct CsvPageFetcher {
    datasets: HashMap<String, Vec<HoldingsRow>>,
}

impl CsvPageFetcher {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let mut rdr = ReaderBuilder::new()
            .trim(csv::Trim::All)
            .has_headers(true)
            .from_path(path)?;
        let mut datasets: HashMap<String, Vec<HoldingsRow>> = HashMap::new();
        for result in rdr.deserialize() {
            let record: HoldingsCsv = result?;
            datasets.entry(record.cik).or_default().push(HoldingsRow {
                id: record.issuer_id,
                issuer_id: Some(record.issuer_id),
                issuer_name: record.issuer_name,
                date: record.date,
                shares_owned: record.shares_owned.unwrap_or(0),
                shares_change: record.shares_change,
                shares_change_pct: record.shares_change_pct,
                cusip: record.cusip,
            });
        }
        Ok(Self { datasets })
    }
}

#[async_trait]
impl PageFetcher for CsvPageFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, FetchError> {
        let Some(rows) = self.datasets.get(&request.dataset_id) else {
            return Err(FetchError::Status {
                status: 404,
                body: format!("No holdings found for CIK {}", request.dataset_id),
            });
        };
        let start = request.page.saturating_sub(1).saturating_mul(request.page_size);
        let page = rows
            .iter()
            .skip(start)
            .take(request.page_size)
            .cloned()
            .collect();
        Ok(PageResult {
            rows: page,
            total: Some(rows.len() as u64),
        })
    }
}
