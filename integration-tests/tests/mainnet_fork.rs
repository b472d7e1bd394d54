use governance_simulation::types::ProposalState;
use governance_simulation::{assert_ok, run, SimulationConfig};
use integration_tests::{connect_fork, init_tracing, FORK_RPC_URL};

/// Needs a fork of Ethereum mainnet taken while the governor had exactly 18 proposals,
/// e.g. `anvil --fork-url $MAINNET_RPC --fork-block-number <block>`.
#[tokio::test]
#[ignore = "requires FORK_RPC_URL pointing at a mainnet fork"]
async fn moonbeam_license_grant_on_mainnet_fork() {
    init_tracing();

    let Some(chain) = connect_fork() else {
        panic!("{FORK_RPC_URL} is not set");
    };
    let chain = assert_ok!(chain);
    let config = SimulationConfig::default();
    let expected = config.grant.record_value();

    let report = assert_ok!(run(chain, config).await);

    assert_eq!(report.final_state, ProposalState::Executed);
    assert_eq!(report.license_text, expected);
}
