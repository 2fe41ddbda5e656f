//! Paged view with per-item transformation
//!
//! Wraps a [`PaginatorAdapter`] with a page loader and an async transform
//! (e.g. attaching metadata to each token). Transformed pages are cached by
//! page index so going back neither re-fetches nor re-transforms.

use std::future::Future;
use std::sync::Arc;

use futures::future::{join_all, BoxFuture};
use tokio::sync::Mutex;

use crate::domain::QueryIdentity;
use crate::error::Result;
use crate::pagination::adapter::{FetchOutcome, InitOutcome, PaginatorAdapter};
use crate::pagination::page::Page;

type LoadFn<T> = Arc<dyn Fn(usize) -> BoxFuture<'static, anyhow::Result<Page<T>>> + Send + Sync>;
type TransformFn<T, R> = Arc<dyn Fn(T) -> BoxFuture<'static, R> + Send + Sync>;

/// Navigation direction for [`PaginatedData::load_page`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

struct Transformed<R> {
    generation: u64,
    pages: Vec<Vec<R>>,
}

pub struct PaginatedData<T, R> {
    adapter: PaginatorAdapter<T>,
    identity: Mutex<QueryIdentity>,
    load: LoadFn<T>,
    transform: TransformFn<T, R>,
    transformed: Mutex<Transformed<R>>,
    /// Generation of the load in progress
    loading: std::sync::Mutex<Option<u64>>,
}

/// Clears the loading marker on every exit path, unless a load for a newer
/// identity has taken it over
struct LoadingGuard<'a> {
    slot: &'a std::sync::Mutex<Option<u64>>,
    generation: u64,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        let mut slot = self.slot.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *slot == Some(self.generation) {
            *slot = None;
        }
    }
}

impl<T, R> PaginatedData<T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Clone + Send + 'static,
{
    pub fn new<L, LFut, X, XFut>(identity: QueryIdentity, page_size: usize, load: L, transform: X) -> Self
    where
        L: Fn(usize) -> LFut + Send + Sync + 'static,
        LFut: Future<Output = anyhow::Result<Page<T>>> + Send + 'static,
        X: Fn(T) -> XFut + Send + Sync + 'static,
        XFut: Future<Output = R> + Send + 'static,
    {
        Self {
            adapter: PaginatorAdapter::new(page_size),
            identity: Mutex::new(identity),
            load: Arc::new(move |size| -> BoxFuture<'static, anyhow::Result<Page<T>>> {
                Box::pin(load(size))
            }),
            transform: Arc::new(move |item| -> BoxFuture<'static, R> { Box::pin(transform(item)) }),
            transformed: Mutex::new(Transformed {
                generation: 0,
                pages: Vec::new(),
            }),
            loading: std::sync::Mutex::new(None),
        }
    }

    /// Re-key the view; a changed identity drops all held pages
    pub async fn set_identity(&self, identity: QueryIdentity) -> bool {
        let changed = self.adapter.set_identity(&identity).await;
        *self.identity.lock().await = identity;
        if changed {
            let mut transformed = self.transformed.lock().await;
            transformed.pages.clear();
            transformed.generation = self.adapter.generation().await;
        }
        changed
    }

    pub async fn load_initial_page(&self) -> Result<()> {
        let identity = self.identity.lock().await.clone();
        self.adapter.set_identity(&identity).await;
        let Some(_guard) = self.begin_loading(self.adapter.generation().await) else {
            return Ok(());
        };

        let load = Arc::clone(&self.load);
        let page_size = self.adapter.page_size();
        let outcome = self
            .adapter
            .initialize(&identity, move || load(page_size))
            .await?;

        match outcome {
            InitOutcome::Loaded => self.transform_current().await,
            InitOutcome::NotReady => {
                let mut transformed = self.transformed.lock().await;
                transformed.pages.clear();
                transformed.generation = self.adapter.generation().await;
            }
            InitOutcome::Cached | InitOutcome::Busy | InitOutcome::Stale => {}
        }
        Ok(())
    }

    pub async fn load_page(&self, direction: Direction) -> Result<()> {
        let Some(_guard) = self.begin_loading(self.adapter.generation().await) else {
            return Ok(());
        };

        let outcome = match direction {
            Direction::Next => self.adapter.fetch_next().await?,
            Direction::Previous => self.adapter.fetch_previous().await,
        };
        if outcome == FetchOutcome::Fetched {
            self.transform_current().await;
        }
        Ok(())
    }

    /// Transformed items of the visible page
    pub async fn items(&self) -> Vec<R> {
        let Some(index) = self.adapter.page_index().await else {
            return Vec::new();
        };
        let generation = self.adapter.generation().await;
        let transformed = self.transformed.lock().await;
        if transformed.generation != generation {
            return Vec::new();
        }
        transformed
            .pages
            .get(index - 1)
            .cloned()
            .unwrap_or_default()
    }

    pub fn is_loading(&self) -> bool {
        self.loading_slot().is_some()
    }

    pub async fn has_more(&self) -> bool {
        self.adapter.has_more().await
    }

    /// 1-based page number; 1 before the first load
    pub async fn page(&self) -> usize {
        self.adapter.page_index().await.unwrap_or(1)
    }

    pub async fn error(&self) -> Option<String> {
        self.adapter.error().await
    }

    pub fn adapter(&self) -> &PaginatorAdapter<T> {
        &self.adapter
    }

    /// Claim the loading marker for `generation`
    ///
    /// A load still running for an older identity does not block.
    fn begin_loading(&self, generation: u64) -> Option<LoadingGuard<'_>> {
        let mut slot = self.loading_slot();
        if *slot == Some(generation) {
            return None;
        }
        *slot = Some(generation);
        Some(LoadingGuard {
            slot: &self.loading,
            generation,
        })
    }

    fn loading_slot(&self) -> std::sync::MutexGuard<'_, Option<u64>> {
        self.loading.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Transform the visible page and store it, unless the identity moved on
    async fn transform_current(&self) {
        let generation = self.adapter.generation().await;
        let (Some(index), Some(page)) = (
            self.adapter.page_index().await,
            self.adapter.current_page().await,
        ) else {
            return;
        };

        let transform = Arc::clone(&self.transform);
        let items = join_all(page.data().iter().cloned().map(|item| transform(item))).await;

        let mut transformed = self.transformed.lock().await;
        if self.adapter.generation().await != generation {
            return;
        }
        if transformed.generation != generation {
            transformed.generation = generation;
            transformed.pages.clear();
        }
        if transformed.pages.len() < index {
            transformed.pages.resize_with(index, Vec::new);
        }
        transformed.pages[index - 1] = items;
    }
}
