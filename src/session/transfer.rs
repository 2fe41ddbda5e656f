//! Cross-chain token transfers

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use anyhow::Result as AnyResult;

use crate::domain::{BlockchainRid, TokenBalance};
use crate::error::{ExplorerError, Result};
use crate::infrastructure::postchain::{ChainClient, ClientFactory};
use crate::infrastructure::runtime::ChainSessionCoordinator;
use crate::session::Session;

/// Everything an executor needs to submit one transfer
pub struct TransferRequest {
    pub session: Arc<dyn Session>,
    pub source: Arc<dyn ChainClient>,
    pub target: Arc<dyn ChainClient>,
    pub token: TokenBalance,
    pub amount: u64,
}

/// Submits a cross-chain transfer and waits for it to complete
#[async_trait::async_trait]
pub trait TransferExecutor: Send + Sync + 'static {
    async fn execute(&self, request: TransferRequest) -> AnyResult<()>;
}

pub struct TransferService {
    coordinator: ChainSessionCoordinator,
    factory: Arc<dyn ClientFactory>,
    executor: Arc<dyn TransferExecutor>,
    active: Arc<AtomicUsize>,
}

impl TransferService {
    pub fn new(
        coordinator: ChainSessionCoordinator,
        factory: Arc<dyn ClientFactory>,
        executor: Arc<dyn TransferExecutor>,
    ) -> Self {
        Self {
            coordinator,
            factory,
            executor,
            active: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn is_transferring(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Move `amount` of `token` from the selected chain to `target`
    ///
    /// The transfer lock is taken before the session is checked, so the
    /// session and source client stay bound to the same chain until this
    /// returns. Switches requested meanwhile are deferred.
    pub async fn transfer(&self, target: &BlockchainRid, token: &TokenBalance, amount: u64) -> Result<()> {
        if amount == 0 || amount > token.amount {
            return Err(ExplorerError::Transfer(anyhow::anyhow!(
                "amount {} out of range (balance {})",
                amount,
                token.amount
            )));
        }

        let _lock = self.coordinator.begin_transfer().await?;
        let _active = ActiveTransfer::new(&self.active);

        // a session left over from before a switch is replaced here
        let session = self.coordinator.ensure_session().await?;
        let source = self.coordinator.wait_for_client().await?;
        if session.blockchain_rid() != source.blockchain_rid() {
            return Err(ExplorerError::SessionMismatch {
                session: session.blockchain_rid().clone(),
                selected: source.blockchain_rid().clone(),
            });
        }

        let target_client = self
            .factory
            .create_client(target)
            .await
            .map_err(|source| ExplorerError::ClientConstruction {
                rid: target.clone(),
                source,
            })?;

        log::info!(
            "transferring {} x {} #{} from {} to {}",
            amount,
            token.collection,
            token.token_id,
            source.blockchain_rid().short(),
            target.short()
        );
        self.executor
            .execute(TransferRequest {
                session,
                source,
                target: target_client,
                token: token.clone(),
                amount,
            })
            .await
            .map_err(ExplorerError::Transfer)?;

        log::info!("transfer to {} complete", target.short());
        Ok(())
    }
}

struct ActiveTransfer<'a>(&'a AtomicUsize);

impl<'a> ActiveTransfer<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for ActiveTransfer<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
