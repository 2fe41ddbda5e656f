//! Crate-wide error type

use thiserror::Error;

use crate::domain::BlockchainRid;

pub type Result<T, E = ExplorerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ExplorerError {
    #[error("invalid blockchain RID {0:?}")]
    InvalidBlockchainRid(String),

    #[error("failed to create chain client for {rid}: {source:#}")]
    ClientConstruction {
        rid: BlockchainRid,
        #[source]
        source: anyhow::Error,
    },

    #[error("all endpoints failed after {attempts} attempts: {source:#}")]
    EndpointsExhausted {
        attempts: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("no endpoints configured")]
    NoEndpoints,

    #[error("no chain selected and the chain registry is empty")]
    NoChainConfigured,

    #[error("page fetch failed: {0:#}")]
    Fetch(#[source] anyhow::Error),

    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("wallet account is not registered on {0}")]
    NotRegistered(BlockchainRid),

    #[error("no wallet connected")]
    WalletNotConnected,

    #[error("session is bound to {session} but {selected} is selected")]
    SessionMismatch {
        session: BlockchainRid,
        selected: BlockchainRid,
    },

    #[error("transfer failed: {0:#}")]
    Transfer(#[source] anyhow::Error),

    #[error("timed out waiting for chain client")]
    Timeout,

    #[error("chain session coordinator has shut down")]
    CoordinatorClosed,
}
