//! Infrastructure layer - External service integrations
//!
//! This layer contains:
//! - Postchain REST client with directory-based node discovery and failover
//! - Tokio worker that coordinates chain selection, client and session

pub mod postchain;
pub mod runtime;

pub use postchain::{ChainClient, ClientFactory, HttpClientFactory, QueryClient};
pub use runtime::{ChainSessionCoordinator, CoordinatorSettings};
