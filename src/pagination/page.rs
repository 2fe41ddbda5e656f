//! Cursor-based pages as handed out by the chain query layer

use std::fmt;
use std::sync::Arc;

use anyhow::Result;

/// Continuation of a paged query
///
/// Sources are forward-only: a cursor knows how to fetch the page after the
/// one it belongs to and nothing else.
#[async_trait::async_trait]
pub trait PageCursor<T>: Send + Sync {
    /// Fetch the following page, `None` once the source is exhausted
    async fn fetch_next(&self) -> Result<Option<Page<T>>>;
}

/// One page of results plus the continuation to the next page
pub struct Page<T> {
    data: Vec<T>,
    next: Option<Arc<dyn PageCursor<T>>>,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, next: Option<Arc<dyn PageCursor<T>>>) -> Self {
        Self { data, next }
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn cursor(&self) -> Option<Arc<dyn PageCursor<T>>> {
        self.next.clone()
    }

    pub async fn fetch_next(&self) -> Result<Option<Page<T>>> {
        match &self.next {
            Some(cursor) => cursor.fetch_next().await,
            None => Ok(None),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Page<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Page")
            .field("data", &self.data)
            .field("has_cursor", &self.next.is_some())
            .finish()
    }
}

/// Page-size heuristic: a short or empty page is the last one
pub fn is_last_page(len: usize, page_size: usize) -> bool {
    len == 0 || len < page_size
}
