//! Wallet session, route and transfer collaborators

mod auth;
mod navigation;
mod transfer;

pub use auth::{
    AccountLookupAuthenticator, AccountSession, AuthStatus, Authenticator, LoginOutcome, Session,
    WalletConnection,
};
pub use navigation::{chain_route, chain_segment, Navigator, RouteHistory};
pub use transfer::{TransferExecutor, TransferRequest, TransferService};
