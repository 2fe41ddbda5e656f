//! Domain models: chains, query identities, token records

mod chain;
mod query;
mod token;

pub use chain::{BlockchainRid, ChainIdentity, ChainRegistry, CUSTOM_CHAIN_NAME};
pub use query::QueryIdentity;
pub use token::{
    AccountId, Project, Token, TokenBalance, TokenId, TokenMetadata, TokenWithMetadata,
    TransferHistory, TransferKind,
};
