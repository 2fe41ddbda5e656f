//! Multi-chain NFT explorer engine
//!
//! - `pagination`: fetch-once page cache over cursor-paged queries
//! - `infrastructure::runtime`: chain session coordinator
//! - `infrastructure::postchain`: chain REST client, node discovery, queries
//! - `session`: wallet login, route sink, cross-chain transfers

pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod pagination;
pub mod session;
pub mod store;

pub use error::{ExplorerError, Result};
