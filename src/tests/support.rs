use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::api_client::PageFetcher;
use crate::domain::errors::FetchError;
use crate::domain::models::{HoldingsRow, PageRequest, PageResult};

pub fn holdings(page: usize, n: usize) -> Vec<HoldingsRow> {
    (0..n)
        .map(|i| HoldingsRow {
            id: (page * 1000 + i) as i64,
            issuer_id: None,
            issuer_name: format!("Issuer {page}-{i}"),
            date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            shares_owned: 1_000 + i as u64,
            shares_change: Some(i as i64 - 5),
            shares_change_pct: Some(0.01 * i as f64),
            cusip: None,
        })
        .collect()
}

pub fn page_of(page: usize, n: usize, total: Option<u64>) -> PageResult {
    PageResult {
        rows: holdings(page, n),
        total,
    }
}

type Reply = Result<PageResult, FetchError>;

/// Fetcher whose responses are released by the test. Requests without a
/// registered gate are answered at once with a full page and `total = 237`.
#[derive(Default)]
pub struct GatedFetcher {
    gates: Mutex<HashMap<(String, usize, usize), oneshot::Receiver<Reply>>>,
    seen: Mutex<Vec<PageRequest>>,
}

impl GatedFetcher {
    pub fn gate(&self, dataset_id: &str, page: usize, page_size: usize) -> oneshot::Sender<Reply> {
        let (tx, rx) = oneshot::channel();
        self.gates
            .lock()
            .unwrap()
            .insert((dataset_id.to_string(), page, page_size), rx);
        tx
    }

    pub fn seen(&self) -> Vec<PageRequest> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for GatedFetcher {
    async fn fetch_page(&self, request: &PageRequest) -> Result<PageResult, FetchError> {
        self.seen.lock().unwrap().push(request.clone());
        let gate = self
            .gates
            .lock()
            .unwrap()
            .remove(&(request.dataset_id.clone(), request.page, request.page_size));
        match gate {
            Some(rx) => rx
                .await
                .unwrap_or_else(|_| Err(FetchError::Transport("gate dropped".into()))),
            None => Ok(page_of(request.page, request.page_size, Some(237))),
        }
    }
}

/// Never answers.
pub struct HangingFetcher;

#[async_trait]
impl PageFetcher for HangingFetcher {
    async fn fetch_page(&self, _request: &PageRequest) -> Result<PageResult, FetchError> {
        std::future::pending().await
    }
}

pub struct PanickingFetcher;

#[async_trait]
impl PageFetcher for PanickingFetcher {
    async fn fetch_page(&self, _request: &PageRequest) -> Result<PageResult, FetchError> {
        panic!("fetcher blew up");
    }
}
