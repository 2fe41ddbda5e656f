//! In-memory token metadata cache with expiry

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::domain::{BlockchainRid, TokenBalance, TokenId, TokenMetadata, TokenWithMetadata};
use crate::infrastructure::postchain::QueryClient;

pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(10 * 60);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetadataKey {
    pub blockchain_rid: BlockchainRid,
    pub collection: String,
    pub token_id: TokenId,
}

impl MetadataKey {
    pub fn new(blockchain_rid: BlockchainRid, collection: impl Into<String>, token_id: TokenId) -> Self {
        Self {
            blockchain_rid,
            collection: collection.into(),
            token_id,
        }
    }
}

#[derive(Debug)]
struct Entry {
    value: Option<TokenMetadata>,
    stored_at: Instant,
}

/// Metadata lookups keyed by chain, collection and token id
///
/// A token without metadata is cached as `None` too.
#[derive(Debug)]
pub struct MetadataCache {
    ttl: Duration,
    entries: Mutex<HashMap<MetadataKey, Entry>>,
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TTL)
    }
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Cached value; the outer `None` means not cached (or expired)
    pub fn get(&self, key: &MetadataKey) -> Option<Option<TokenMetadata>> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some(entry) if entry.stored_at.elapsed() < self.ttl => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(key);
        }
        None
    }

    /// Store `value`; expired entries are swept on the way
    pub fn insert(&self, key: MetadataKey, value: Option<TokenMetadata>) {
        let mut entries = self.lock();
        let swept = sweep(&mut entries, self.ttl);
        if swept > 0 {
            log::debug!("dropped {} expired metadata entries", swept);
        }
        entries.insert(
            key,
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
    }

    /// Cached value, or the result of `fetch` which is then cached
    ///
    /// Fetch errors are returned and not cached.
    pub async fn get_or_fetch<F, Fut>(&self, key: MetadataKey, fetch: F) -> anyhow::Result<Option<TokenMetadata>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<Option<TokenMetadata>>>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value);
        }
        let value = fetch().await?;
        self.insert(key, value.clone());
        Ok(value)
    }

    /// Join a balance with its metadata; lookup failures degrade to `None`
    pub async fn resolve(&self, queries: &QueryClient, balance: TokenBalance) -> TokenWithMetadata {
        let key = MetadataKey::new(
            queries.client().blockchain_rid().clone(),
            balance.collection.clone(),
            balance.token_id,
        );
        let metadata = self
            .get_or_fetch(key, || {
                queries.metadata(&balance.project, &balance.collection, balance.token_id)
            })
            .await
            .unwrap_or_else(|err| {
                log::warn!(
                    "metadata for {} #{} unavailable: {:#}",
                    balance.collection,
                    balance.token_id,
                    err
                );
                None
            });
        TokenWithMetadata { balance, metadata }
    }

    /// Drop every expired entry, returning how many were removed
    pub fn cleanup_expired(&self) -> usize {
        sweep(&mut self.lock(), self.ttl)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<MetadataKey, Entry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn sweep(entries: &mut HashMap<MetadataKey, Entry>, ttl: Duration) -> usize {
    let before = entries.len();
    entries.retain(|_, entry| entry.stored_at.elapsed() < ttl);
    before - entries.len()
}
