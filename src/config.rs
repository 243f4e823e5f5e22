use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_DATASET: &str = "CIK0000763212";
pub const DEFAULT_PAGE_SIZE: usize = 50;
pub const DEFAULT_PAGE_SIZE_OPTIONS: [usize; 3] = [25, 50, 100];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid value for {var}: {reason}")]
pub struct ConfigError {
    pub var: &'static str,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewConfig {
    pub api_url: String,
    pub dataset_id: String,
    pub page_size: usize,
    pub page_size_options: Vec<usize>,
    pub as_of: Option<NaiveDate>,
    pub fetch_timeout: Option<Duration>,
    pub fixture_csv: Option<PathBuf>,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            dataset_id: DEFAULT_DATASET.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: DEFAULT_PAGE_SIZE_OPTIONS.to_vec(),
            as_of: None,
            fetch_timeout: None,
            fixture_csv: None,
        }
    }
}

impl ViewConfig {
    /// Reads `HOLDINGS_*` variables from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = ViewConfig::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("HOLDINGS_API_URL") {
            cfg.api_url = url;
        }
        if let Some(cik) = get("HOLDINGS_CIK") {
            cfg.dataset_id = cik;
        }
        if let Some(size) = get("HOLDINGS_PAGE_SIZE") {
            cfg.page_size = parse_positive("HOLDINGS_PAGE_SIZE", &size)?;
        }
        if let Some(opts) = get("HOLDINGS_PAGE_SIZE_OPTIONS") {
            cfg.page_size_options = opts
                .split(',')
                .map(|o| parse_positive("HOLDINGS_PAGE_SIZE_OPTIONS", o))
                .collect::<Result<Vec<_>, _>>()?;
        }
        if let Some(date) = get("HOLDINGS_AS_OF") {
            let parsed = NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d").map_err(|_| ConfigError {
                var: "HOLDINGS_AS_OF",
                reason: "Invalid date, expected YYYY-MM-DD".to_string(),
            })?;
            cfg.as_of = Some(parsed);
        }
        if let Some(ms) = get("HOLDINGS_FETCH_TIMEOUT_MS") {
            let ms = parse_positive("HOLDINGS_FETCH_TIMEOUT_MS", &ms)?;
            cfg.fetch_timeout = Some(Duration::from_millis(ms as u64));
        }
        cfg.fixture_csv = get("HOLDINGS_FIXTURE_CSV").map(PathBuf::from);

        if !cfg.page_size_options.contains(&cfg.page_size) {
            cfg.page_size_options.push(cfg.page_size);
            cfg.page_size_options.sort_unstable();
        }
        Ok(cfg)
    }
}

fn parse_positive(var: &'static str, raw: &str) -> Result<usize, ConfigError> {
    match raw.trim().parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(ConfigError {
            var,
            reason: format!("expected a positive integer, got {raw:?}"),
        }),
    }
}
