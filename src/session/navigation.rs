//! Route sink and chain segment extraction

use std::sync::Mutex;

use crate::domain::BlockchainRid;

/// Receives route changes requested by the coordinator
pub trait Navigator: Send + Sync + 'static {
    fn navigate(&self, path: &str);
}

/// Route of a chain's landing page
pub fn chain_route(rid: &BlockchainRid) -> String {
    format!("/{}", rid)
}

/// First path segment, which names the chain
///
/// Query string and fragment are ignored. Returns `None` for the root path.
pub fn chain_segment(path: &str) -> Option<&str> {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    path.split('/').find(|segment| !segment.is_empty())
}

/// In-memory route history
#[derive(Debug, Default)]
pub struct RouteHistory {
    entries: Mutex<Vec<String>>,
}

impl RouteHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<String> {
        self.lock().last().cloned()
    }

    pub fn entries(&self) -> Vec<String> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Navigator for RouteHistory {
    fn navigate(&self, path: &str) {
        log::debug!("navigate {}", path);
        self.lock().push(path.to_string());
    }
}
