use tracing::{debug, info, warn};

use crate::domain::errors::{FetchError, FetchErrorKind, TableError};
use crate::domain::models::{PageRequest, PageResult, PaginationIntent, ViewError, ViewState};

/// Claim on the view for one in-flight fetch. Only the ticket with the
/// latest generation may write rows, row count or the loading flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReloadTicket {
    generation: u64,
    request: PageRequest,
}

impl ReloadTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn request(&self) -> &PageRequest {
        &self.request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    Applied,
    Failed(FetchErrorKind),
    /// A newer reload started before this one settled; nothing was written.
    Stale,
    /// The fetch task ended without a result (cancelled or panicked).
    Abandoned,
}

/// Pagination state for one mounted view. Purely synchronous: the async
/// driver owns the fetches and hands results back through [`TableState::commit`].
#[derive(Debug)]
pub struct TableState {
    dataset_id: String,
    view: ViewState,
    generation: u64,
}

impl TableState {
    pub fn new(dataset_id: impl Into<String>, page_size: usize) -> Result<Self, TableError> {
        if page_size == 0 {
            return Err(TableError::InvalidPageSize(page_size));
        }
        Ok(Self {
            dataset_id: dataset_id.into(),
            view: ViewState::new(page_size),
            generation: 0,
        })
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn dataset_id(&self) -> &str {
        &self.dataset_id
    }

    /// Rejects a page whose 1-based index would not fit in `usize`, before
    /// touching any state.
    pub fn set_page(&mut self, page: usize) -> Result<Option<ReloadTicket>, TableError> {
        if page.checked_add(1).is_none() {
            return Err(TableError::InvalidPage(page));
        }
        if page == self.view.page {
            return Ok(None);
        }
        self.view.page = page;
        Ok(Some(self.begin_reload()))
    }

    /// Changing the size invalidates the old offset, so the page resets to 0.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<Option<ReloadTicket>, TableError> {
        if page_size == 0 {
            return Err(TableError::InvalidPageSize(page_size));
        }
        if page_size == self.view.page_size {
            return Ok(None);
        }
        self.view.page_size = page_size;
        self.view.page = 0;
        self.view.rows.clear();
        Ok(Some(self.begin_reload()))
    }

    pub fn set_dataset(&mut self, dataset_id: impl Into<String>) -> Option<ReloadTicket> {
        let dataset_id = dataset_id.into();
        if dataset_id == self.dataset_id {
            return None;
        }
        self.dataset_id = dataset_id;
        self.view.page = 0;
        self.view.rows.clear();
        Some(self.begin_reload())
    }

    /// Applies a pagination-model change from the grid. A size change wins
    /// over a page change because it resets the page anyway.
    pub fn submit(&mut self, intent: PaginationIntent) -> Result<Option<ReloadTicket>, TableError> {
        if intent.page_size != self.view.page_size {
            return self.set_page_size(intent.page_size);
        }
        self.set_page(intent.page)
    }

    /// Captures the current `(dataset, page + 1, page_size)` under a fresh
    /// generation and marks the view as loading.
    pub fn begin_reload(&mut self) -> ReloadTicket {
        self.generation += 1;
        let request = PageRequest {
            dataset_id: self.dataset_id.clone(),
            page: self.view.page + 1,
            page_size: self.view.page_size,
        };
        self.view.loading = true;
        self.view.error = None;
        debug!(
            dataset = %request.dataset_id,
            page = request.page,
            page_size = request.page_size,
            generation = self.generation,
            "reload started"
        );
        ReloadTicket {
            generation: self.generation,
            request,
        }
    }

    pub fn is_current(&self, ticket: &ReloadTicket) -> bool {
        ticket.generation == self.generation
    }

    pub fn commit(
        &mut self,
        ticket: &ReloadTicket,
        result: Result<PageResult, FetchError>,
    ) -> CommitOutcome {
        if !self.is_current(ticket) {
            debug!(
                generation = ticket.generation,
                current = self.generation,
                page = ticket.request.page,
                "discarding stale page result"
            );
            return CommitOutcome::Stale;
        }
        self.view.loading = false;

        match result {
            Ok(page) => {
                let received = page.rows.len();
                let mut rows = page.rows;
                if received > self.view.page_size {
                    warn!(
                        received,
                        page_size = self.view.page_size,
                        "backend returned more rows than requested, truncating"
                    );
                    rows.truncate(self.view.page_size);
                }
                self.view.row_count = page.total.unwrap_or(received as u64);
                self.view.rows = rows;
                self.view.error = None;
                info!(
                    dataset = %ticket.request.dataset_id,
                    page = ticket.request.page,
                    rows = self.view.rows.len(),
                    row_count = self.view.row_count,
                    "page committed"
                );
                CommitOutcome::Applied
            }
            Err(e) => {
                let kind = e.kind();
                tracing::error!(
                    error = %e,
                    dataset = %ticket.request.dataset_id,
                    page = ticket.request.page,
                    "page fetch failed"
                );
                // rows of another page must not stay on screen under the new page number
                self.view.rows.clear();
                self.view.error = Some(ViewError {
                    kind,
                    message: e.to_string(),
                });
                CommitOutcome::Failed(kind)
            }
        }
    }

    /// Releases the loading flag for a ticket that will never be committed.
    /// Returns whether the view changed.
    pub fn abandon(&mut self, ticket: &ReloadTicket) -> bool {
        if !self.is_current(ticket) || !self.view.loading {
            return false;
        }
        warn!(generation = ticket.generation, "reload abandoned before settling");
        self.view.loading = false;
        true
    }
}
