//! Postchain infrastructure - REST chain client, node discovery, typed queries

mod client;
mod factory;
mod failover;
mod queries;

pub use client::{ChainClient, HttpChainClient};
pub use factory::{ClientFactory, HttpClientFactory, NodeDiscovery, BLOCKCHAIN_API_URLS_QUERY};
pub use failover::{with_failover, FailoverPolicy};
pub use queries::{
    QueryClient, ACCOUNTS_BY_SIGNER, METADATA, SUPPORTED_MODULES, TOKEN_BALANCES, TOKEN_BY_UID,
    TRANSFER_HISTORY,
};
