use governance_simulation::{ChainError, RpcChain, SimulationMode};
use tracing_subscriber::EnvFilter;

/// Environment variable naming the JSON-RPC endpoint of an anvil or hardhat mainnet fork.
pub const FORK_RPC_URL: &str = "FORK_RPC_URL";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("governance_simulation=info")),
        )
        .with_test_writer()
        .try_init();
}

/// Connects to the fork named by [`FORK_RPC_URL`], or `None` when it is unset.
pub fn connect_fork() -> Option<Result<RpcChain, ChainError>> {
    let url = std::env::var(FORK_RPC_URL).ok()?;

    Some(RpcChain::new(url, SimulationMode::Enabled))
}
