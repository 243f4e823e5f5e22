use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::errors::FetchErrorKind;

// One holding observation (a row of the grid)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "HoldingsRowWire")]
pub struct HoldingsRow {
    pub id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issuer_id: Option<i64>,
    pub issuer_name: String,
    pub date: NaiveDate,
    pub shares_owned: u64,
    pub shares_change: Option<i64>,
    pub shares_change_pct: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cusip: Option<String>,
}

// Row as it appears on the wire: the key may arrive as `id`, `issuer_id` or both
#[derive(Debug, Deserialize)]
struct HoldingsRowWire {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    issuer_id: Option<i64>,
    issuer_name: String,
    date: NaiveDate,
    #[serde(default, deserialize_with = "null_as_zero")]
    shares_owned: u64,
    #[serde(default)]
    shares_change: Option<i64>,
    #[serde(default)]
    shares_change_pct: Option<f64>,
    #[serde(default)]
    cusip: Option<String>,
}

impl TryFrom<HoldingsRowWire> for HoldingsRow {
    type Error = String;

    fn try_from(wire: HoldingsRowWire) -> Result<Self, Self::Error> {
        let id = wire
            .id
            .or(wire.issuer_id)
            .ok_or_else(|| format!("row for {:?} has neither `id` nor `issuer_id`", wire.issuer_name))?;
        Ok(HoldingsRow {
            id,
            issuer_id: wire.issuer_id,
            issuer_name: wire.issuer_name,
            date: wire.date,
            shares_owned: wire.shares_owned,
            shares_change: wire.shares_change,
            shares_change_pct: wire.shares_change_pct,
            cusip: wire.cusip,
        })
    }
}

impl HoldingsRow {
    /// Fractional change rendered as a percentage, e.g. `0.05` -> `"5.00%"`.
    pub fn change_pct_display(&self) -> String {
        format!("{:.2}%", self.shares_change_pct.unwrap_or(0.0) * 100.0)
    }
}

fn null_as_zero<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.unwrap_or(0))
}

/// Identity of one fetch. Built fresh per reload, `page` is 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageRequest {
    pub dataset_id: String,
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PageResult {
    pub rows: Vec<HoldingsRow>,
    /// Count across the whole dataset; `None` when the backend omitted a usable value.
    pub total: Option<u64>,
}

// Raw response body as served by the holdings backend
#[derive(Debug, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub rows: Option<Vec<HoldingsRow>>,
    #[serde(default)]
    pub holdings_rows: Option<Vec<HoldingsRow>>,
    #[serde(default)]
    pub total: Option<serde_json::Value>,
}

impl From<PageResponse> for PageResult {
    fn from(resp: PageResponse) -> Self {
        // only a non-negative integer is a usable total
        let total = resp.total.as_ref().and_then(|v| v.as_u64());
        PageResult {
            rows: resp.rows.or(resp.holdings_rows).unwrap_or_default(),
            total,
        }
    }
}

/// Pagination event emitted by the render surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationIntent {
    pub page: usize,
    pub page_size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewError {
    pub kind: FetchErrorKind,
    pub message: String,
}

/// Snapshot of the grid as the render surface sees it. `page` is 0-based.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub page: usize,
    pub page_size: usize,
    pub row_count: u64,
    pub rows: Vec<HoldingsRow>,
    pub loading: bool,
    pub error: Option<ViewError>,
}

impl ViewState {
    pub fn new(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size,
            row_count: 0,
            rows: Vec::new(),
            loading: false,
            error: None,
        }
    }

    pub fn page_count(&self) -> u64 {
        self.row_count.div_ceil(self.page_size as u64)
    }

    /// Dataset index of the first displayed row.
    pub fn first_row_index(&self) -> u64 {
        (self.page as u64).saturating_mul(self.page_size as u64)
    }

    /// Footer text in the "1-50 of 237" form.
    pub fn range_label(&self) -> String {
        if self.rows.is_empty() {
            return format!("0 of {}", self.row_count);
        }
        let start = self.first_row_index().saturating_add(1);
        let end = self.first_row_index().saturating_add(self.rows.len() as u64);
        format!("{}-{} of {}", start, end, self.row_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64) -> HoldingsRow {
        HoldingsRow {
            id,
            issuer_id: None,
            issuer_name: format!("Issuer {id}"),
            date: NaiveDate::from_ymd_opt(2024, 3, 31).unwrap(),
            shares_owned: 100,
            shares_change: Some(5),
            shares_change_pct: Some(0.05),
            cusip: None,
        }
    }

    #[test]
    fn test_decode_backend_shape() {
        let body = json!({
            "cik": "CIK0000763212",
            "date": "2024-03-31",
            "page": 1,
            "limit": 2,
            "holdings_rows": [
                {"date": "2024-03-31", "issuer_id": 7, "issuer_name": "ACME", "cusip": "000000001",
                 "shares_owned": null, "shares_change": null, "shares_change_pct": null},
                {"date": "2024-03-31", "issuer_id": 9, "issuer_name": "Globex", "cusip": "000000002",
                 "shares_owned": 1200, "shares_change": -300, "shares_change_pct": -0.2}
            ]
        });
        let resp: PageResponse = serde_json::from_value(body).unwrap();
        let result = PageResult::from(resp);
        assert_eq!(result.rows.len(), 2);
        assert_eq!(result.rows[0].id, 7);
        assert_eq!(result.rows[0].shares_owned, 0);
        assert_eq!(result.rows[0].shares_change, None);
        assert_eq!(result.rows[1].shares_change, Some(-300));
        assert_eq!(result.total, None);
    }

    #[test]
    fn test_unusable_total_is_dropped() {
        for total in [json!(-1), json!(12.5), json!("237"), json!(null)] {
            let resp: PageResponse =
                serde_json::from_value(json!({"rows": [], "total": total})).unwrap();
            assert_eq!(PageResult::from(resp).total, None);
        }
        let resp: PageResponse = serde_json::from_value(json!({"rows": [], "total": 237})).unwrap();
        assert_eq!(PageResult::from(resp).total, Some(237));
    }

    #[test]
    fn test_change_pct_display() {
        let mut r = row(1);
        assert_eq!(r.change_pct_display(), "5.00%");
        r.shares_change_pct = None;
        assert_eq!(r.change_pct_display(), "0.00%");
    }

    #[test]
    fn test_range_label_on_short_last_page() {
        let mut state = ViewState::new(50);
        state.page = 4;
        state.row_count = 237;
        state.rows = (0..37).map(row).collect();
        assert_eq!(state.page_count(), 5);
        assert_eq!(state.range_label(), "201-237 of 237");
    }

    #[test]
    fn test_row_with_id_and_issuer_id() {
        let body = json!({
            "rows": [{"id": 1, "issuer_id": 7, "issuer_name": "ACME", "date": "2024-03-31",
                      "shares_owned": 10, "shares_change": 1, "shares_change_pct": 0.1}],
            "holdings_rows": [],
            "total": 1
        });
        let resp: PageResponse = serde_json::from_value(body).unwrap();
        let result = PageResult::from(resp);
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].id, 1);
        assert_eq!(result.rows[0].issuer_id, Some(7));
        assert_eq!(result.total, Some(1));
    }

    #[test]
    fn test_row_without_key_is_rejected() {
        let body = json!({
            "rows": [{"issuer_name": "ACME", "date": "2024-03-31", "shares_owned": 10}]
        });
        assert!(serde_json::from_value::<PageResponse>(body).is_err());
    }

    #[test]
    fn test_range_label_saturates_on_extreme_page() {
        let mut state = ViewState::new(100);
        state.page = usize::MAX;
        state.row_count = 5;
        state.rows = vec![row(1)];
        assert_eq!(state.first_row_index(), u64::MAX);
        assert_eq!(state.range_label(), format!("{}-{} of 5", u64::MAX, u64::MAX));
    }
}
