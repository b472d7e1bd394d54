use std::path::Path;

use alloy_primitives::{address, Address, U256};
use serde::{Deserialize, Serialize};

use crate::ensure;
use crate::error::ConfigError;
use crate::license::{LicenseGrant, LICENSE_GRANTS_ENS_NAME};
use crate::types::ProposalId;

/// Uniswap GovernorBravo on Ethereum mainnet.
pub const GOVERNOR_BRAVO: Address = address!("408ED6354d4973f66138C91495F2f2FCbd8724C3");
/// ENS public resolver holding the license grant records.
pub const PUBLIC_RESOLVER: Address = address!("4976fb03C32e5B8cfe2b6cCB31c09Ba78EBaBa41");
/// a16z, which both proposes and votes.
pub const PROPOSER: Address = address!("2B1Ad6184a6B0fac06bD225ed37C2AbC04415fF4");

pub const VOTERS: [Address; 7] = [
    address!("2b1ad6184a6b0fac06bd225ed37c2abc04415ff4"),
    address!("e02457a1459b6c49469bf658d4fe345c636326bf"),
    address!("8e4ed221fa034245f14205f781e0b13c5bd6a42e"),
    address!("61c8d4e4be6477bb49791540ff297ef30eaa01c2"),
    address!("a2bf1b0a7e079767b4701b5a1d9d5700eb42d1d1"),
    address!("e7925d190aea9279400cd9a005e33ceb9389cc2b"),
    address!("7e4a8391c728fed9069b2962699ab416628b19fa"),
];

pub const REVIEW_PERIOD_BLOCKS: u64 = 13_141;
pub const VOTING_PERIOD_BLOCKS: u64 = 40_320;
pub const TIMELOCK_DELAY_SECS: u64 = 172_800;
pub const EXPECTED_PROPOSAL_COUNT: u64 = 18;

const ONE_ETHER: u128 = 1_000_000_000_000_000_000;
const DEFAULT_MINING_CONCURRENCY: usize = 256;

const MOONBEAM_DESCRIPTION: &str = include_str!("../proposals/deploy-uniswap-v3-on-moonbeam.md");

/// Everything a simulation run needs to know about the proposal and the chain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SimulationConfig {
    pub governor: Address,
    pub resolver: Address,
    pub proposer: Address,
    pub voters: Vec<Address>,
    pub review_period_blocks: u64,
    pub voting_period_blocks: u64,
    pub timelock_delay_secs: u64,
    /// Proposal count observed on the fork before submitting.
    pub expected_proposal_count: u64,
    /// Minimum native balance, in wei, given to every impersonated signer.
    #[serde(default = "default_top_up")]
    pub signer_top_up_wei: u128,
    #[serde(default = "default_mining_concurrency")]
    pub mining_concurrency: usize,
    #[serde(default = "default_ens_name")]
    pub ens_name: String,
    pub grant: LicenseGrant,
    pub description: String,
}

const fn default_top_up() -> u128 {
    ONE_ETHER
}

const fn default_mining_concurrency() -> usize {
    DEFAULT_MINING_CONCURRENCY
}

fn default_ens_name() -> String {
    LICENSE_GRANTS_ENS_NAME.to_owned()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            governor: GOVERNOR_BRAVO,
            resolver: PUBLIC_RESOLVER,
            proposer: PROPOSER,
            voters: VOTERS.to_vec(),
            review_period_blocks: REVIEW_PERIOD_BLOCKS,
            voting_period_blocks: VOTING_PERIOD_BLOCKS,
            timelock_delay_secs: TIMELOCK_DELAY_SECS,
            expected_proposal_count: EXPECTED_PROPOSAL_COUNT,
            signer_top_up_wei: default_top_up(),
            mining_concurrency: default_mining_concurrency(),
            ens_name: default_ens_name(),
            grant: LicenseGrant::default(),
            description: MOONBEAM_DESCRIPTION.to_owned(),
        }
    }
}

impl SimulationConfig {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;

        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(
            !self.voters.is_empty(),
            ConfigError::Invalid("at least one voter is required")
        );
        ensure!(
            self.review_period_blocks > 0 && self.voting_period_blocks > 0,
            ConfigError::Invalid("review and voting periods must be positive")
        );
        ensure!(
            self.mining_concurrency > 0,
            ConfigError::Invalid("mining concurrency must be positive")
        );
        ensure!(
            !self.ens_name.is_empty(),
            ConfigError::Invalid("ens name must not be empty")
        );

        Ok(())
    }

    /// The id the governor assigns to the next proposal.
    ///
    /// Only holds if nothing else is proposed between the count check and submission.
    pub fn expected_proposal_id(&self) -> ProposalId {
        U256::from(self.expected_proposal_count) + U256::from(1u8)
    }

    pub fn signer_top_up(&self) -> U256 {
        U256::from(self.signer_top_up_wei)
    }
}
