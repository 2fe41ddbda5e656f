//! In-process fakes shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::Address;
use serde_json::Value;

use chain_explorer::domain::{AccountId, BlockchainRid, ChainIdentity, ChainRegistry};
use chain_explorer::infrastructure::postchain::{ChainClient, ClientFactory};
use chain_explorer::infrastructure::runtime::{
    ChainSessionCoordinator, CoordinatorSettings, CoordinatorSnapshot,
};
use chain_explorer::pagination::{Page, PageCursor};
use chain_explorer::session::{
    Authenticator, LoginOutcome, RouteHistory, Session, WalletConnection,
};

pub const RID_A: &str = "aa11";
pub const RID_B: &str = "bb22";
pub const RID_C: &str = "cc33";

pub fn rid(value: &str) -> BlockchainRid {
    value.parse().expect("valid rid")
}

pub fn registry() -> ChainRegistry {
    ChainRegistry::new(vec![
        ChainIdentity {
            name: "Alpha".to_string(),
            blockchain_rid: rid(RID_A),
            dapp_url: Some("https://alpha.example".to_string()),
        },
        ChainIdentity {
            name: "Beta".to_string(),
            blockchain_rid: rid(RID_B),
            dapp_url: None,
        },
        ChainIdentity {
            name: "Gamma".to_string(),
            blockchain_rid: rid(RID_C),
            dapp_url: None,
        },
    ])
}

pub fn wallet() -> WalletConnection {
    WalletConnection::new(Address::repeat_byte(0xaa), "test")
}

// ---- page source ----

/// Page source backed by fixed pages, counting every fetch
pub struct FakeSource {
    pages: Vec<Vec<u32>>,
    calls: AtomicUsize,
    delay: Duration,
    fail_at: Option<usize>,
}

impl FakeSource {
    pub fn new(pages: Vec<Vec<u32>>) -> Arc<Self> {
        Self::build(pages, Duration::ZERO, None)
    }

    pub fn slow(pages: Vec<Vec<u32>>, delay: Duration) -> Arc<Self> {
        Self::build(pages, delay, None)
    }

    pub fn failing_at(pages: Vec<Vec<u32>>, index: usize) -> Arc<Self> {
        Self::build(pages, Duration::ZERO, Some(index))
    }

    fn build(pages: Vec<Vec<u32>>, delay: Duration, fail_at: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            pages,
            calls: AtomicUsize::new(0),
            delay,
            fail_at,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Fetch page `index` (0-based); the cursor exists while pages remain
    pub async fn fetch(self: Arc<Self>, index: usize) -> anyhow::Result<Page<u32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail_at == Some(index) {
            anyhow::bail!("node unavailable");
        }
        let data = self.pages.get(index).cloned().unwrap_or_default();
        let next = (index + 1 < self.pages.len()).then(|| {
            Arc::new(FakeCursor {
                source: Arc::clone(&self),
                index: index + 1,
            }) as Arc<dyn PageCursor<u32>>
        });
        Ok(Page::new(data, next))
    }
}

struct FakeCursor {
    source: Arc<FakeSource>,
    index: usize,
}

#[async_trait::async_trait]
impl PageCursor<u32> for FakeCursor {
    async fn fetch_next(&self) -> anyhow::Result<Option<Page<u32>>> {
        Arc::clone(&self.source).fetch(self.index).await.map(Some)
    }
}

/// `count` consecutive numbers starting at `start`
pub fn items(start: u32, count: u32) -> Vec<u32> {
    (start..start + count).collect()
}

// ---- chain client ----

pub struct FakeClient {
    rid: BlockchainRid,
}

#[async_trait::async_trait]
impl ChainClient for FakeClient {
    fn blockchain_rid(&self) -> &BlockchainRid {
        &self.rid
    }

    async fn query(&self, _name: &str, _args: Value) -> anyhow::Result<Value> {
        Ok(Value::Null)
    }

    fn endpoint_name(&self) -> String {
        format!("fake://{}", self.rid)
    }
}

#[derive(Default)]
pub struct FakeFactory {
    created: Mutex<Vec<BlockchainRid>>,
    delays: Mutex<HashMap<BlockchainRid, Duration>>,
    failing: Mutex<HashSet<BlockchainRid>>,
}

impl FakeFactory {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_delay(&self, value: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(rid(value), delay);
    }

    pub fn set_failing(&self, value: &str, failing: bool) {
        let mut set = self.failing.lock().unwrap();
        if failing {
            set.insert(rid(value));
        } else {
            set.remove(&rid(value));
        }
    }

    /// Construction attempts for `value`, including aborted ones
    pub fn attempts(&self, value: &str) -> usize {
        let target = rid(value);
        self.created.lock().unwrap().iter().filter(|r| **r == target).count()
    }
}

#[async_trait::async_trait]
impl ClientFactory for FakeFactory {
    async fn create_client(&self, rid: &BlockchainRid) -> anyhow::Result<Arc<dyn ChainClient>> {
        self.created.lock().unwrap().push(rid.clone());
        let delay = self.delays.lock().unwrap().get(rid).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(rid) {
            anyhow::bail!("directory unreachable for {}", rid);
        }
        Ok(Arc::new(FakeClient { rid: rid.clone() }))
    }
}

// ---- wallet ----

pub struct FakeAuthenticator {
    logins: AtomicUsize,
    logouts: Arc<AtomicUsize>,
    registered: AtomicBool,
    logout_delay: Duration,
}

impl FakeAuthenticator {
    pub fn new() -> Arc<Self> {
        Self::with_logout_delay(Duration::ZERO)
    }

    pub fn with_logout_delay(logout_delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            logins: AtomicUsize::new(0),
            logouts: Arc::new(AtomicUsize::new(0)),
            registered: AtomicBool::new(true),
            logout_delay,
        })
    }

    pub fn set_registered(&self, registered: bool) {
        self.registered.store(registered, Ordering::SeqCst);
    }

    pub fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }

    pub fn logouts(&self) -> usize {
        self.logouts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl Authenticator for FakeAuthenticator {
    async fn login(&self, client: Arc<dyn ChainClient>, wallet: &WalletConnection) -> anyhow::Result<LoginOutcome> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if !self.registered.load(Ordering::SeqCst) {
            return Ok(LoginOutcome::NotRegistered);
        }
        Ok(LoginOutcome::Connected(Arc::new(FakeSession {
            rid: client.blockchain_rid().clone(),
            account: AccountId::from_bytes(wallet.address.as_slice()),
            logouts: Arc::clone(&self.logouts),
            delay: self.logout_delay,
        })))
    }
}

pub struct FakeSession {
    rid: BlockchainRid,
    account: AccountId,
    logouts: Arc<AtomicUsize>,
    delay: Duration,
}

#[async_trait::async_trait]
impl Session for FakeSession {
    fn blockchain_rid(&self) -> &BlockchainRid {
        &self.rid
    }

    fn account_id(&self) -> &AccountId {
        &self.account
    }

    async fn logout(&self) -> anyhow::Result<()> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ---- coordinator harness ----

pub struct Harness {
    pub coordinator: ChainSessionCoordinator,
    pub factory: Arc<FakeFactory>,
    pub auth: Arc<FakeAuthenticator>,
    pub history: Arc<RouteHistory>,
}

pub fn settings() -> CoordinatorSettings {
    CoordinatorSettings {
        registry: registry(),
        client_retries: 1,
        retry_delay: Duration::ZERO,
        client_wait_timeout: Duration::from_secs(5),
        logout_timeout: Duration::from_secs(2),
    }
}

pub fn spawn(route: Option<&str>) -> Harness {
    spawn_with(FakeFactory::new(), FakeAuthenticator::new(), route)
}

pub fn spawn_with(
    factory: Arc<FakeFactory>,
    auth: Arc<FakeAuthenticator>,
    route: Option<&str>,
) -> Harness {
    let history = Arc::new(RouteHistory::new());
    let coordinator = ChainSessionCoordinator::spawn(
        settings(),
        factory.clone(),
        auth.clone(),
        history.clone(),
        route,
    )
    .expect("coordinator starts");
    Harness {
        coordinator,
        factory,
        auth,
        history,
    }
}

/// Wait until the published snapshot satisfies `predicate`
pub async fn wait_until(
    coordinator: &ChainSessionCoordinator,
    predicate: impl Fn(&CoordinatorSnapshot) -> bool,
) -> CoordinatorSnapshot {
    let mut rx = coordinator.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            {
                let snapshot = rx.borrow_and_update();
                if predicate(&snapshot) {
                    return (*snapshot).clone();
                }
            }
            rx.changed().await.expect("coordinator alive");
        }
    })
    .await
    .expect("condition reached in time")
}
