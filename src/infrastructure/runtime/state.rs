//! Published coordinator state

use std::fmt;
use std::sync::Arc;

use crate::domain::{BlockchainRid, ChainIdentity};
use crate::infrastructure::postchain::ChainClient;
use crate::session::{AuthStatus, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No client; construction failed or never started
    Idle,
    Connecting,
    Ready,
    Switching,
    /// A transfer guard is held; identity changes are deferred
    TransferLocked,
}

impl SessionState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Ready => "ready",
            Self::Switching => "switching",
            Self::TransferLocked => "transfer locked",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SwitchOptions {
    /// Do not push the new chain route to the navigator
    pub skip_navigation: bool,
}

impl SwitchOptions {
    pub fn skip_navigation() -> Self {
        Self {
            skip_navigation: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwitchOutcome {
    Switched,
    /// Already selected
    Unchanged,
    /// Queued until the active transfers or the running teardown finish;
    /// only the latest queued request is applied
    Deferred,
}

/// Point-in-time view of the coordinator
#[derive(Clone)]
pub struct CoordinatorSnapshot {
    pub selected_chain: ChainIdentity,
    /// Set only while a client bound to the selected chain is usable
    pub chain_client: Option<Arc<dyn ChainClient>>,
    pub state: SessionState,
    pub error: Option<String>,
    pub auth_status: AuthStatus,
    pub session: Option<Arc<dyn Session>>,
    /// Bumped on every selected identity change
    pub version: u64,
    pub transfer_locks: usize,
    pub deferred_chain: Option<BlockchainRid>,
}

impl CoordinatorSnapshot {
    pub(crate) fn initial(selected_chain: ChainIdentity) -> Self {
        Self {
            selected_chain,
            chain_client: None,
            state: SessionState::Connecting,
            error: None,
            auth_status: AuthStatus::Disconnected,
            session: None,
            version: 0,
            transfer_locks: 0,
            deferred_chain: None,
        }
    }

    pub fn selected_rid(&self) -> &BlockchainRid {
        &self.selected_chain.blockchain_rid
    }

    pub fn is_initializing(&self) -> bool {
        matches!(self.state, SessionState::Connecting | SessionState::Switching)
    }

    pub fn is_ready(&self) -> bool {
        self.chain_client.is_some()
    }
}

impl fmt::Debug for CoordinatorSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorSnapshot")
            .field("selected_chain", &self.selected_chain)
            .field("client", &self.chain_client.as_ref().map(|c| c.endpoint_name()))
            .field("state", &self.state)
            .field("error", &self.error)
            .field("auth_status", &self.auth_status)
            .field("session", &self.session.as_ref().map(|s| s.account_id().to_string()))
            .field("version", &self.version)
            .field("transfer_locks", &self.transfer_locks)
            .field("deferred_chain", &self.deferred_chain)
            .finish()
    }
}
