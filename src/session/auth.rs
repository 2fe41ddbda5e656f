//! Wallet authentication collaborator

use std::fmt;
use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::Result;

use crate::domain::{AccountId, BlockchainRid};
use crate::infrastructure::postchain::{ChainClient, QueryClient};

/// A connected wallet as reported by the wallet connector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletConnection {
    pub address: Address,
    pub connector_id: String,
}

impl WalletConnection {
    pub fn new(address: Address, connector_id: impl Into<String>) -> Self {
        Self {
            address,
            connector_id: connector_id.into(),
        }
    }
}

/// Authenticated proof of wallet ownership, bound to one chain
#[async_trait::async_trait]
pub trait Session: Send + Sync + 'static {
    fn blockchain_rid(&self) -> &BlockchainRid;

    fn account_id(&self) -> &AccountId;

    async fn logout(&self) -> Result<()>;
}

pub enum LoginOutcome {
    Connected(Arc<dyn Session>),
    /// The wallet has no account on the chain
    NotRegistered,
}

impl fmt::Debug for LoginOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected(session) => f
                .debug_tuple("Connected")
                .field(&session.account_id().as_str())
                .finish(),
            Self::NotRegistered => f.write_str("NotRegistered"),
        }
    }
}

#[async_trait::async_trait]
pub trait Authenticator: Send + Sync + 'static {
    async fn login(&self, client: Arc<dyn ChainClient>, wallet: &WalletConnection) -> Result<LoginOutcome>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    Connected,
    NotRegistered,
    #[default]
    Disconnected,
}

impl AuthStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Connected => "connected",
            Self::NotRegistered => "not registered",
            Self::Disconnected => "disconnected",
        }
    }
}

/// Authenticates by looking up the FT4 account controlled by the wallet address
///
/// The resulting session is read-only: it identifies the account but holds
/// no signing material.
#[derive(Debug, Default, Clone, Copy)]
pub struct AccountLookupAuthenticator;

#[async_trait::async_trait]
impl Authenticator for AccountLookupAuthenticator {
    async fn login(&self, client: Arc<dyn ChainClient>, wallet: &WalletConnection) -> Result<LoginOutcome> {
        let rid = client.blockchain_rid().clone();
        let queries = QueryClient::new(client);
        match queries.account_by_signer(&wallet.address).await? {
            Some(account_id) => {
                log::info!("wallet {} logged in as {} on {}", wallet.address, account_id, rid.short());
                Ok(LoginOutcome::Connected(Arc::new(AccountSession {
                    blockchain_rid: rid,
                    account_id,
                })))
            }
            None => Ok(LoginOutcome::NotRegistered),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AccountSession {
    blockchain_rid: BlockchainRid,
    account_id: AccountId,
}

impl AccountSession {
    pub fn new(blockchain_rid: BlockchainRid, account_id: AccountId) -> Self {
        Self {
            blockchain_rid,
            account_id,
        }
    }
}

#[async_trait::async_trait]
impl Session for AccountSession {
    fn blockchain_rid(&self) -> &BlockchainRid {
        &self.blockchain_rid
    }

    fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn logout(&self) -> Result<()> {
        log::debug!("session {} on {} closed", self.account_id, self.blockchain_rid.short());
        Ok(())
    }
}
