use anyhow::{Context, Result};
use dotenv::dotenv;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use holdings_view::api_client::{PageFetcher, ReqwestPageFetcher};
use holdings_view::config::ViewConfig;
use holdings_view::csv_store::CsvPageFetcher;
use holdings_view::{CommitOutcome, TableController, ViewState};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ViewConfig::from_env()?;

    let fetcher: Arc<dyn PageFetcher> = match &config.fixture_csv {
        Some(path) => {
            info!(path = %path.display(), "Serving holdings from fixture CSV");
            let source = CsvPageFetcher::from_path(path)
                .map_err(|e| anyhow::anyhow!(e))
                .with_context(|| format!("Failed reading fixture {}", path.display()))?;
            Arc::new(source)
        }
        None => {
            info!(url = %config.api_url, "Fetching holdings from backend");
            Arc::new(ReqwestPageFetcher::new(config.api_url.clone()).with_as_of(config.as_of))
        }
    };

    let (controller, initial) = TableController::mount(
        fetcher,
        config.dataset_id.clone(),
        config.page_size,
        config.fetch_timeout,
    )?;

    match initial.settled().await {
        CommitOutcome::Applied => {}
        outcome => {
            let state = controller.state();
            let reason = state.error.map(|e| e.message).unwrap_or_else(|| format!("{outcome:?}"));
            error!(dataset = %config.dataset_id, %reason, "Initial page did not load");
            anyhow::bail!("could not load holdings for {}: {}", config.dataset_id, reason);
        }
    }

    print_page(&controller.state(), &config.page_size_options);
    Ok(())
}

fn print_page(state: &ViewState, page_size_options: &[usize]) {
    println!(
        "{:<40} {:<12} {:>14} {:>14} {:>16}",
        "Security", "Date", "Shares", "Shares Change", "Shares % Change"
    );
    for row in &state.rows {
        let change = row
            .shares_change
            .map(|c| c.to_string())
            .unwrap_or_default();
        println!(
            "{:<40} {:<12} {:>14} {:>14} {:>16}",
            row.issuer_name,
            row.date.format("%Y-%m-%d").to_string(),
            row.shares_owned,
            change,
            row.change_pct_display()
        );
    }
    println!(
        "{}  (page {} of {}, page size {} from {:?})",
        state.range_label(),
        state.page + 1,
        state.page_count().max(1),
        state.page_size,
        page_size_options
    );
}
