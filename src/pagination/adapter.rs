//! Paginator adapter - stable page indices over a forward-only cursor source
//!
//! Pages are fetched once and kept; going back never touches the network.
//! Every identity transition bumps a generation counter and any fetch that
//! completes under an older generation is dropped on the floor. The state
//! lock is never held across a fetch.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::domain::QueryIdentity;
use crate::error::{ExplorerError, Result};
use crate::pagination::page::{is_last_page, Page};

/// Result of [`PaginatorAdapter::initialize`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitOutcome {
    /// First page stored, page index is 1
    Loaded,
    /// Identity already loaded; nothing fetched, page index unchanged
    Cached,
    /// Identity has a missing dependency; state is empty, no fetch issued
    NotReady,
    /// A fetch for this identity is already outstanding
    Busy,
    /// Identity changed while fetching; result discarded
    Stale,
}

/// Result of a navigation call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A new page was fetched and appended
    Fetched,
    /// Moved to a page that was already cached
    Cached,
    /// Nothing to do (last page, no data, or a fetch is in flight)
    Skipped,
    /// Identity changed while fetching; result discarded
    Stale,
}

/// Visible state of an adapter
#[derive(Debug, Clone, PartialEq)]
pub struct PageView<T> {
    pub identity: Option<QueryIdentity>,
    pub items: Vec<T>,
    /// 1-based, `None` until initialized
    pub page: Option<usize>,
    pub has_more: bool,
    pub has_previous: bool,
    pub is_loading: bool,
    pub error: Option<String>,
}

struct CursorState<T> {
    identity: Option<QueryIdentity>,
    generation: u64,
    pages: Vec<Arc<Page<T>>>,
    page_index: Option<usize>,
    is_last_page: bool,
    in_flight: Option<u64>,
    error: Option<String>,
}

impl<T> CursorState<T> {
    fn new() -> Self {
        Self {
            identity: None,
            generation: 0,
            pages: Vec::new(),
            page_index: None,
            is_last_page: false,
            in_flight: None,
            error: None,
        }
    }

    /// Switch to `identity`, dropping everything held for the previous one
    fn adopt(&mut self, identity: &QueryIdentity) -> bool {
        if self.identity.as_ref() == Some(identity) {
            return false;
        }
        self.identity = Some(identity.clone());
        self.generation += 1;
        self.pages.clear();
        self.page_index = None;
        self.is_last_page = false;
        self.in_flight = None;
        self.error = None;
        true
    }

    fn is_fetching(&self) -> bool {
        self.in_flight == Some(self.generation)
    }

    fn has_more(&self) -> bool {
        match self.page_index {
            Some(index) => index < self.pages.len() || !self.is_last_page,
            None => false,
        }
    }
}

/// Marks a fetch in flight; clears the marker if the fetch is dropped
/// before it completes
struct InFlight<'a, T> {
    state: &'a Mutex<CursorState<T>>,
    generation: u64,
    armed: bool,
}

impl<'a, T> InFlight<'a, T> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut state = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.in_flight == Some(self.generation) {
            log::debug!("page fetch cancelled, releasing in-flight marker");
            state.in_flight = None;
        }
    }
}

/// Fetch-once, cache-forever view over a cursor-based page source
pub struct PaginatorAdapter<T> {
    page_size: usize,
    state: Mutex<CursorState<T>>,
}

impl<T: Send + Sync + 'static> PaginatorAdapter<T> {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            state: Mutex::new(CursorState::new()),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Record the identity the adapter is keyed on
    ///
    /// Returns true when it differs from the previous one, in which case all
    /// pages are dropped and a fresh [`initialize`](Self::initialize) is needed.
    pub async fn set_identity(&self, identity: &QueryIdentity) -> bool {
        let mut state = self.lock();
        let changed = state.adopt(identity);
        if changed {
            log::debug!("paginator reset for {}", identity);
        }
        changed
    }

    /// Load the first page for `identity`
    ///
    /// An identity that already holds pages is left as is; call
    /// [`reset`](Self::reset) first to reload it.
    pub async fn initialize<F, Fut>(&self, identity: &QueryIdentity, fetch_first: F) -> Result<InitOutcome>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Page<T>>>,
    {
        let mut flight = {
            let mut state = self.lock();
            state.adopt(identity);
            if !identity.is_ready() {
                return Ok(InitOutcome::NotReady);
            }
            if state.is_fetching() {
                return Ok(InitOutcome::Busy);
            }
            if !state.pages.is_empty() {
                return Ok(InitOutcome::Cached);
            }
            self.begin_fetch(&mut state)
        };
        let generation = flight.generation;

        let result = fetch_first().await;
        flight.disarm();

        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("discarding stale first page for {}", identity);
            return Ok(InitOutcome::Stale);
        }
        state.in_flight = None;

        match result {
            Ok(page) => {
                state.is_last_page = is_last_page(page.len(), self.page_size);
                state.pages = vec![Arc::new(page)];
                state.page_index = Some(1);
                state.error = None;
                Ok(InitOutcome::Loaded)
            }
            Err(err) => {
                log::warn!("first page for {} failed: {:#}", identity, err);
                state.is_last_page = true;
                state.error = Some(format!("{:#}", err));
                Err(ExplorerError::Fetch(err))
            }
        }
    }

    /// Move forward one page, fetching it only if it was never seen
    pub async fn fetch_next(&self) -> Result<FetchOutcome> {
        let (mut flight, cursor) = {
            let mut state = self.lock();
            let Some(index) = state.page_index else {
                return Ok(FetchOutcome::Skipped);
            };
            if state.is_fetching() {
                return Ok(FetchOutcome::Skipped);
            }
            if index < state.pages.len() {
                state.page_index = Some(index + 1);
                return Ok(FetchOutcome::Cached);
            }
            if state.is_last_page {
                return Ok(FetchOutcome::Skipped);
            }
            let Some(cursor) = state.pages[index - 1].cursor() else {
                state.is_last_page = true;
                return Ok(FetchOutcome::Skipped);
            };
            (self.begin_fetch(&mut state), cursor)
        };
        let generation = flight.generation;

        let result = cursor.fetch_next().await;
        flight.disarm();

        let mut state = self.lock();
        if state.generation != generation {
            log::debug!("discarding stale page fetched before identity change");
            return Ok(FetchOutcome::Stale);
        }
        state.in_flight = None;

        match result {
            Ok(Some(page)) => {
                state.is_last_page = is_last_page(page.len(), self.page_size);
                state.pages.push(Arc::new(page));
                state.page_index = Some(state.pages.len());
                state.error = None;
                Ok(FetchOutcome::Fetched)
            }
            Ok(None) => {
                state.is_last_page = true;
                Ok(FetchOutcome::Skipped)
            }
            Err(err) => {
                log::warn!("next page fetch failed: {:#}", err);
                state.is_last_page = true;
                state.error = Some(format!("{:#}", err));
                Err(ExplorerError::Fetch(err))
            }
        }
    }

    /// Move back one page; never fetches
    pub async fn fetch_previous(&self) -> FetchOutcome {
        let mut state = self.lock();
        match state.page_index {
            Some(index) if index > 1 => {
                state.page_index = Some(index - 1);
                FetchOutcome::Cached
            }
            _ => FetchOutcome::Skipped,
        }
    }

    /// Drop all pages and forget the identity
    pub async fn reset(&self) {
        let mut state = self.lock();
        let generation = state.generation + 1;
        *state = CursorState {
            generation,
            ..CursorState::new()
        };
    }

    pub async fn current_page(&self) -> Option<Arc<Page<T>>> {
        let state = self.lock();
        state
            .page_index
            .and_then(|index| state.pages.get(index - 1).cloned())
    }

    pub async fn page_index(&self) -> Option<usize> {
        self.lock().page_index
    }

    pub async fn page_count(&self) -> usize {
        self.lock().pages.len()
    }

    pub async fn generation(&self) -> u64 {
        self.lock().generation
    }

    pub async fn is_last_page(&self) -> bool {
        self.lock().is_last_page
    }

    pub async fn has_more(&self) -> bool {
        self.lock().has_more()
    }

    pub async fn is_loading(&self) -> bool {
        self.lock().is_fetching()
    }

    pub async fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    fn begin_fetch(&self, state: &mut CursorState<T>) -> InFlight<'_, T> {
        state.in_flight = Some(state.generation);
        InFlight {
            state: &self.state,
            generation: state.generation,
            armed: true,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CursorState<T>> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl<T: Clone + Send + Sync + 'static> PaginatorAdapter<T> {
    pub async fn view(&self) -> PageView<T> {
        let state = self.lock();
        let items = state
            .page_index
            .and_then(|index| state.pages.get(index - 1))
            .map(|page| page.data().to_vec())
            .unwrap_or_default();
        PageView {
            identity: state.identity.clone(),
            items,
            page: state.page_index,
            has_more: state.has_more(),
            has_previous: state.page_index.is_some_and(|index| index > 1),
            is_loading: state.is_fetching(),
            error: state.error.clone(),
        }
    }
}
