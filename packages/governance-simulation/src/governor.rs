use alloy_primitives::{Address, TxHash, U256};
use alloy_sol_types::SolCall;

use crate::abi::IGovernorBravo;
use crate::chain::{ForkedChain, Transaction};
use crate::error::ChainError;
use crate::proposal::ProposalParameters;
use crate::types::{ProposalId, ProposalInfo, ProposalState, VoteType};

/// Typed access to a deployed GovernorBravo through a fork backend.
pub struct GovernorBravoClient<'a, C: ?Sized> {
    chain: &'a C,
    pub address: Address,
}

impl<'a, C> GovernorBravoClient<'a, C>
where
    C: ForkedChain + ?Sized,
{
    pub const fn new(chain: &'a C, address: Address) -> Self {
        Self { chain, address }
    }

    async fn view<T: SolCall>(&self, call: T) -> Result<T::Return, ChainError> {
        let output = self.chain.call(self.address, call.abi_encode().into()).await?;

        Ok(T::abi_decode_returns(&output, true)?)
    }

    async fn send<T: SolCall>(&self, from: Address, call: T) -> Result<TxHash, ChainError> {
        self.chain
            .send_transaction(Transaction::call(from, self.address, call.abi_encode()))
            .await
    }

    pub async fn proposal_count(&self) -> Result<U256, ChainError> {
        Ok(self.view(IGovernorBravo::proposalCountCall {}).await?._0)
    }

    pub async fn proposal(&self, id: ProposalId) -> Result<ProposalInfo, ChainError> {
        Ok(self
            .view(IGovernorBravo::proposalsCall { proposalId: id })
            .await?
            .into())
    }

    pub async fn state(&self, id: ProposalId) -> Result<ProposalState, ChainError> {
        self.view(IGovernorBravo::stateCall { proposalId: id })
            .await?
            ._0
            .try_into()
    }

    pub async fn latest_proposal_id(&self, proposer: Address) -> Result<ProposalId, ChainError> {
        Ok(self
            .view(IGovernorBravo::latestProposalIdsCall { proposer })
            .await?
            ._0)
    }

    pub async fn propose(
        &self,
        from: Address,
        proposal: &ProposalParameters,
    ) -> Result<TxHash, ChainError> {
        self.send(from, proposal.propose_call()).await
    }

    pub async fn cast_vote(
        &self,
        from: Address,
        id: ProposalId,
        support: VoteType,
    ) -> Result<TxHash, ChainError> {
        self.send(
            from,
            IGovernorBravo::castVoteCall {
                proposalId: id,
                support: support as u8,
            },
        )
        .await
    }

    pub async fn queue(&self, from: Address, id: ProposalId) -> Result<TxHash, ChainError> {
        self.send(from, IGovernorBravo::queueCall { proposalId: id })
            .await
    }

    pub async fn execute(&self, from: Address, id: ProposalId) -> Result<TxHash, ChainError> {
        self.send(from, IGovernorBravo::executeCall { proposalId: id })
            .await
    }
}
