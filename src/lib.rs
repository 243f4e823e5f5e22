pub mod api_client;
pub mod config;
pub mod csv_store;
pub mod domain;
pub mod usecases;

pub use api_client::{PageFetcher, ReqwestPageFetcher};
pub use domain::errors::{FetchError, FetchErrorKind, TableError};
pub use domain::models::{HoldingsRow, PageRequest, PageResult, PaginationIntent, ViewState};
pub use usecases::table_controller::{ReloadHandle, TableController};
pub use usecases::table_state::CommitOutcome;

#[cfg(test)]
mod tests;
