//! Simulates a GovernorBravo proposal end to end on a forked chain:
//! propose, vote, queue, wait out the timelock, execute, then check the
//! ENS text record the proposal writes.

pub mod abi;

pub mod chain;

pub mod config;

pub mod ens;

pub mod error;

pub mod governor;

pub mod license;

pub mod lifecycle;

pub mod proposal;

pub mod rpc;

pub mod simulation;

pub mod types;

pub mod verify;

pub use chain::{ForkedChain, SimulationMode, Transaction};
pub use config::SimulationConfig;
pub use error::{ChainError, ConfigError, SimulationError};
pub use rpc::RpcChain;
pub use simulation::{run, SimulationReport};

cfg_if::cfg_if! {
    if #[cfg(any(test, feature = "testutils"))] {
        pub mod testutils;
        pub use testutils::InMemoryFork;
    }
}
