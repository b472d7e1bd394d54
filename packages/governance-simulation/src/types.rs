use alloy_primitives::{Address, U256};

use crate::abi::IGovernorBravo;
use crate::error::ChainError;

pub type ProposalId = U256;

/// GovernorBravo's `ProposalState`, in contract declaration order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum ProposalState {
    Pending = 0,
    Active = 1,
    Canceled = 2,
    Defeated = 3,
    Succeeded = 4,
    Queued = 5,
    Expired = 6,
    Executed = 7,
}

impl TryFrom<u8> for ProposalState {
    type Error = ChainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let state = match value {
            0 => Self::Pending,
            1 => Self::Active,
            2 => Self::Canceled,
            3 => Self::Defeated,
            4 => Self::Succeeded,
            5 => Self::Queued,
            6 => Self::Expired,
            7 => Self::Executed,
            other => return Err(ChainError::UnknownState(other)),
        };

        Ok(state)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum VoteType {
    Against = 0,
    For = 1,
    Abstain = 2,
}

/// Decoded `proposals(id)` getter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalInfo {
    pub id: ProposalId,
    pub proposer: Address,
    pub eta: U256,
    pub start_block: U256,
    pub end_block: U256,
    pub for_votes: U256,
    pub against_votes: U256,
    pub abstain_votes: U256,
    pub canceled: bool,
    pub executed: bool,
}

impl From<IGovernorBravo::proposalsReturn> for ProposalInfo {
    fn from(value: IGovernorBravo::proposalsReturn) -> Self {
        Self {
            id: value.id,
            proposer: value.proposer,
            eta: value.eta,
            start_block: value.startBlock,
            end_block: value.endBlock,
            for_votes: value.forVotes,
            against_votes: value.againstVotes,
            abstain_votes: value.abstainVotes,
            canceled: value.canceled,
            executed: value.executed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proposal_state_follows_declaration_order() {
        for state in [
            ProposalState::Pending,
            ProposalState::Active,
            ProposalState::Canceled,
            ProposalState::Defeated,
            ProposalState::Succeeded,
            ProposalState::Queued,
            ProposalState::Expired,
            ProposalState::Executed,
        ] {
            assert_eq!(ProposalState::try_from(state as u8).unwrap(), state);
        }

        assert!(matches!(
            ProposalState::try_from(8),
            Err(ChainError::UnknownState(8))
        ));
    }
}
