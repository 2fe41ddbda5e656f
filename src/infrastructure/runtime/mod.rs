//! Runtime infrastructure - chain session coordinator worker and handle

mod bridge;
mod state;
mod worker;

pub use bridge::{ChainSessionCoordinator, CoordinatorSettings, TransferGuard};
pub use state::{CoordinatorSnapshot, SessionState, SwitchOptions, SwitchOutcome};
