use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::warn;

use crate::api_client::PageFetcher;
use crate::domain::errors::{FetchError, TableError};
use crate::domain::models::{PageRequest, PageResult, PaginationIntent, ViewState};
use crate::usecases::table_state::{CommitOutcome, ReloadTicket, TableState};

struct Shared {
    state: Mutex<TableState>,
    notifier: watch::Sender<ViewState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, TableState> {
        // every critical section leaves the state consistent
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &TableState) {
        self.notifier.send_replace(state.view().clone());
    }
}

/// Holds the loading flag for one fetch. Settling commits the result; dropping
/// it unsettled releases the flag so a cancelled or panicking fetch cannot
/// leave the view stuck in loading.
struct LoadingGuard {
    shared: Arc<Shared>,
    ticket: Option<ReloadTicket>,
}

impl LoadingGuard {
    fn settle(mut self, result: Result<PageResult, FetchError>) -> CommitOutcome {
        let Some(ticket) = self.ticket.take() else {
            return CommitOutcome::Abandoned;
        };
        let mut state = self.shared.lock();
        let outcome = state.commit(&ticket, result);
        if outcome != CommitOutcome::Stale {
            self.shared.publish(&state);
        }
        outcome
    }
}

impl Drop for LoadingGuard {
    fn drop(&mut self) {
        if let Some(ticket) = self.ticket.take() {
            let mut state = self.shared.lock();
            if state.abandon(&ticket) {
                self.shared.publish(&state);
            }
        }
    }
}

/// A reload in flight. Awaiting it is optional; dropping the handle does not
/// cancel the fetch.
pub struct ReloadHandle {
    request: PageRequest,
    task: JoinHandle<CommitOutcome>,
}

impl ReloadHandle {
    pub fn request(&self) -> &PageRequest {
        &self.request
    }

    pub async fn settled(self) -> CommitOutcome {
        match self.task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, page = self.request.page, "reload task did not complete");
                CommitOutcome::Abandoned
            }
        }
    }

    /// Stops the underlying fetch. The view's loading flag is released if this
    /// was the current reload.
    pub fn abort(&self) {
        self.task.abort();
    }
}

/// Owns the grid's pagination state and reconciles fetch results with it.
pub struct TableController {
    shared: Arc<Shared>,
    fetcher: Arc<dyn PageFetcher>,
    fetch_timeout: Option<Duration>,
}

impl TableController {
    /// Creates the controller and starts the initial fetch, so the view is
    /// loading as soon as it exists. Must be called inside a tokio runtime.
    pub fn mount(
        fetcher: Arc<dyn PageFetcher>,
        dataset_id: impl Into<String>,
        page_size: usize,
        fetch_timeout: Option<Duration>,
    ) -> Result<(Self, ReloadHandle), TableError> {
        let mut state = TableState::new(dataset_id, page_size)?;
        let ticket = state.begin_reload();
        let (notifier, _) = watch::channel(state.view().clone());
        let controller = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                notifier,
            }),
            fetcher,
            fetch_timeout,
        };
        let handle = controller.dispatch(ticket);
        Ok((controller, handle))
    }

    pub fn state(&self) -> ViewState {
        self.shared.lock().view().clone()
    }

    pub fn dataset_id(&self) -> String {
        self.shared.lock().dataset_id().to_string()
    }

    /// Receives a fresh snapshot after every change that affects the view.
    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.shared.notifier.subscribe()
    }

    pub fn set_page(&self, page: usize) -> Result<Option<ReloadHandle>, TableError> {
        let ticket = self.update(|state| state.set_page(page))?;
        Ok(ticket.map(|t| self.dispatch(t)))
    }

    pub fn set_page_size(&self, page_size: usize) -> Result<Option<ReloadHandle>, TableError> {
        let ticket = self.update(|state| state.set_page_size(page_size))?;
        Ok(ticket.map(|t| self.dispatch(t)))
    }

    pub fn set_dataset(&self, dataset_id: impl Into<String>) -> Option<ReloadHandle> {
        let dataset_id = dataset_id.into();
        let ticket = self.update(|state| Ok(state.set_dataset(dataset_id))).ok()??;
        Some(self.dispatch(ticket))
    }

    pub fn submit(&self, intent: PaginationIntent) -> Result<Option<ReloadHandle>, TableError> {
        let ticket = self.update(|state| state.submit(intent))?;
        Ok(ticket.map(|t| self.dispatch(t)))
    }

    /// Re-issues the current request under a new identity.
    pub fn refresh(&self) -> ReloadHandle {
        let ticket = {
            let mut state = self.shared.lock();
            let ticket = state.begin_reload();
            self.shared.publish(&state);
            ticket
        };
        self.dispatch(ticket)
    }

    fn update<F>(&self, f: F) -> Result<Option<ReloadTicket>, TableError>
    where
        F: FnOnce(&mut TableState) -> Result<Option<ReloadTicket>, TableError>,
    {
        let mut state = self.shared.lock();
        let ticket = f(&mut *state)?;
        if ticket.is_some() {
            self.shared.publish(&state);
        }
        Ok(ticket)
    }

    fn dispatch(&self, ticket: ReloadTicket) -> ReloadHandle {
        let request = ticket.request().clone();
        let guard = LoadingGuard {
            shared: self.shared.clone(),
            ticket: Some(ticket),
        };
        let fetcher = self.fetcher.clone();
        let fetch_timeout = self.fetch_timeout;
        let task_request = request.clone();

        let task = tokio::spawn(async move {
            let fetch = fetcher.fetch_page(&task_request);
            let result = match fetch_timeout {
                Some(limit) => match tokio::time::timeout(limit, fetch).await {
                    Ok(result) => result,
                    Err(_) => Err(FetchError::Timeout(limit)),
                },
                None => fetch.await,
            };
            guard.settle(result)
        });

        ReloadHandle { request, task }
    }
}
