use governance_simulation::testutils::InMemoryFork;
use governance_simulation::SimulationConfig;
use tracing_subscriber::EnvFilter;

/// Routes the simulation's tracing output through the test harness.
///
/// Set `RUST_LOG=governance_simulation=debug` to see every phase.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn setup_fork(config: &SimulationConfig) -> InMemoryFork {
    init_tracing();

    InMemoryFork::new(config)
}
