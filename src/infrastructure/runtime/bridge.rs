//! Coordinator handle - funnels every session mutation into the worker task
//!
//! The handle is cheap to clone. Reads come from a `watch` snapshot that
//! only the worker writes; mutations are commands answered over oneshot
//! channels.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};

use crate::config::FailoverConfig;
use crate::domain::{BlockchainRid, ChainIdentity, ChainRegistry};
use crate::error::{ExplorerError, Result};
use crate::infrastructure::postchain::{ChainClient, ClientFactory};
use crate::infrastructure::runtime::state::{
    CoordinatorSnapshot, SessionState, SwitchOptions, SwitchOutcome,
};
use crate::infrastructure::runtime::worker::{run_coordinator, Collaborators};
use crate::session::{chain_segment, AuthStatus, Authenticator, Navigator, Session, WalletConnection};

/// Commands handled by the coordinator worker
pub(crate) enum Command {
    Switch {
        rid: BlockchainRid,
        options: SwitchOptions,
        reply: oneshot::Sender<SwitchOutcome>,
    },
    /// Retry client construction for the selected chain
    Reconnect { reply: oneshot::Sender<()> },
    Connect {
        wallet: WalletConnection,
        reply: oneshot::Sender<()>,
    },
    Disconnect { reply: oneshot::Sender<()> },
    EnsureSession {
        reply: oneshot::Sender<Result<Arc<dyn Session>>>,
    },
    BeginTransfer { reply: oneshot::Sender<()> },
    EndTransfer,
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub registry: ChainRegistry,
    /// Extra construction attempts after the first failure
    pub client_retries: usize,
    pub retry_delay: Duration,
    pub client_wait_timeout: Duration,
    /// Upper bound on a session logout during teardown
    pub logout_timeout: Duration,
}

impl CoordinatorSettings {
    pub fn new(registry: ChainRegistry) -> Self {
        let failover = FailoverConfig::default();
        Self::from_failover(registry, &failover)
    }

    pub fn from_failover(registry: ChainRegistry, failover: &FailoverConfig) -> Self {
        Self {
            registry,
            client_retries: failover.client_retries,
            retry_delay: failover.policy().retry_delay,
            client_wait_timeout: failover.client_wait_timeout(),
            logout_timeout: failover.logout_timeout(),
        }
    }

    /// Chain named by the route, else the first registry entry
    pub fn initial_chain(&self, route: Option<&str>) -> Result<ChainIdentity> {
        if let Some(segment) = route.and_then(chain_segment) {
            let rid: BlockchainRid = segment.parse()?;
            return Ok(self.registry.resolve(&rid));
        }
        self.registry
            .default_chain()
            .cloned()
            .ok_or(ExplorerError::NoChainConfigured)
    }
}

/// Handle to the chain session coordinator
#[derive(Clone)]
pub struct ChainSessionCoordinator {
    commands: mpsc::UnboundedSender<Command>,
    snapshot: watch::Receiver<CoordinatorSnapshot>,
    wait_timeout: Duration,
}

impl ChainSessionCoordinator {
    /// Spawn the worker on the current Tokio runtime
    ///
    /// The initial chain comes from `initial_route` when it names one,
    /// otherwise from the first registry entry. Client construction for it
    /// starts immediately.
    pub fn spawn(
        settings: CoordinatorSettings,
        factory: Arc<dyn ClientFactory>,
        authenticator: Arc<dyn Authenticator>,
        navigator: Arc<dyn Navigator>,
        initial_route: Option<&str>,
    ) -> Result<Self> {
        let initial = settings.initial_chain(initial_route)?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(CoordinatorSnapshot::initial(initial.clone()));
        let wait_timeout = settings.client_wait_timeout;

        let collaborators = Collaborators {
            factory,
            authenticator,
            navigator,
        };
        tokio::spawn(run_coordinator(settings, collaborators, initial, cmd_rx, snapshot_tx));

        Ok(Self {
            commands: cmd_tx,
            snapshot: snapshot_rx,
            wait_timeout,
        })
    }

    pub fn selected_chain(&self) -> ChainIdentity {
        self.snapshot.borrow().selected_chain.clone()
    }

    pub fn chain_client(&self) -> Option<Arc<dyn ChainClient>> {
        self.snapshot.borrow().chain_client.clone()
    }

    pub fn is_initializing(&self) -> bool {
        self.snapshot.borrow().is_initializing()
    }

    pub fn is_ready(&self) -> bool {
        self.snapshot.borrow().is_ready()
    }

    pub fn state(&self) -> SessionState {
        self.snapshot.borrow().state
    }

    pub fn snapshot(&self) -> CoordinatorSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorSnapshot> {
        self.snapshot.clone()
    }

    pub async fn switch_chain(&self, rid: BlockchainRid, options: SwitchOptions) -> Result<SwitchOutcome> {
        self.request(|reply| Command::Switch { rid, options, reply }).await
    }

    /// Adopt the chain named by an externally changed route
    ///
    /// Navigation is skipped so the route is not pushed back.
    pub async fn sync_from_route(&self, path: &str) -> Result<SwitchOutcome> {
        let Some(segment) = chain_segment(path) else {
            return Ok(SwitchOutcome::Unchanged);
        };
        let rid: BlockchainRid = segment.parse()?;
        self.switch_chain(rid, SwitchOptions::skip_navigation()).await
    }

    pub async fn reconnect(&self) -> Result<()> {
        self.request(|reply| Command::Reconnect { reply }).await
    }

    /// Wait until a client for the selected chain is ready
    pub async fn wait_for_client(&self) -> Result<Arc<dyn ChainClient>> {
        let mut rx = self.snapshot.clone();
        let wait = async move {
            loop {
                {
                    let snapshot = rx.borrow_and_update();
                    if let Some(client) = &snapshot.chain_client {
                        return Ok(Arc::clone(client));
                    }
                    if snapshot.state == SessionState::Idle {
                        if let Some(message) = &snapshot.error {
                            return Err(ExplorerError::ClientConstruction {
                                rid: snapshot.selected_rid().clone(),
                                source: anyhow::anyhow!("{}", message),
                            });
                        }
                    }
                }
                if rx.changed().await.is_err() {
                    return Err(ExplorerError::CoordinatorClosed);
                }
            }
        };

        tokio::time::timeout(self.wait_timeout, wait)
            .await
            .map_err(|_| ExplorerError::Timeout)?
    }

    /// Remember the wallet and authenticate it against the selected chain
    pub async fn connect_session(&self, wallet: WalletConnection) -> Result<AuthStatus> {
        self.request(|reply| Command::Connect { wallet, reply }).await?;
        match self.ensure_session().await {
            Ok(_) => Ok(AuthStatus::Connected),
            Err(ExplorerError::NotRegistered(_)) => Ok(AuthStatus::NotRegistered),
            Err(err) => Err(err),
        }
    }

    pub async fn disconnect_session(&self) -> Result<()> {
        self.request(|reply| Command::Disconnect { reply }).await
    }

    /// Session valid for the selected chain
    ///
    /// A session bound to another chain is logged out and replaced. When
    /// the session already matches this returns it unchanged.
    pub async fn ensure_session(&self) -> Result<Arc<dyn Session>> {
        self.request(|reply| Command::EnsureSession { reply }).await?
    }

    /// Hold identity changes until the returned guard is dropped
    pub async fn begin_transfer(&self) -> Result<TransferGuard> {
        self.request(|reply| Command::BeginTransfer { reply }).await?;
        Ok(TransferGuard {
            commands: self.commands.clone(),
        })
    }

    pub fn shutdown(&self) {
        let _ = self.commands.send(Command::Shutdown);
    }

    async fn request<R>(&self, build: impl FnOnce(oneshot::Sender<R>) -> Command) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .map_err(|_| ExplorerError::CoordinatorClosed)?;
        response.await.map_err(|_| ExplorerError::CoordinatorClosed)
    }
}

/// Keeps the coordinator transfer-locked while alive
#[must_use = "the transfer lock is released when the guard is dropped"]
pub struct TransferGuard {
    commands: mpsc::UnboundedSender<Command>,
}

impl Drop for TransferGuard {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::EndTransfer);
    }
}
