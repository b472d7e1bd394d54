use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::SolCall;

use crate::abi::IGovernorBravo;
use crate::ens::set_text_calldata;
use crate::ensure;
use crate::error::SimulationError;

/// One sub-action of a proposal, executed by the timelock if the proposal passes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Action {
    pub target: Address,
    pub value: U256,
    /// Empty when `calldata` already starts with the function selector.
    pub signature: String,
    pub calldata: Bytes,
}

/// Arguments of GovernorBravo's `propose`.
///
/// The four action sequences always have the same length; index `i` of each
/// describes the same sub-action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProposalParameters {
    targets: Vec<Address>,
    values: Vec<U256>,
    signatures: Vec<String>,
    calldatas: Vec<Bytes>,
    description: String,
}

impl ProposalParameters {
    /// A proposal whose only action writes a text record on `resolver`.
    pub fn set_text(
        resolver: Address,
        node: B256,
        key: &str,
        value: &str,
        description: impl Into<String>,
    ) -> Self {
        let mut builder = ProposalBuilder::new(description);
        builder.action(Action {
            target: resolver,
            value: U256::ZERO,
            signature: String::new(),
            calldata: set_text_calldata(node, key, value),
        });

        Self::from(builder)
    }

    pub fn from_parts(
        targets: Vec<Address>,
        values: Vec<U256>,
        signatures: Vec<String>,
        calldatas: Vec<Bytes>,
        description: impl Into<String>,
    ) -> Result<Self, SimulationError> {
        let len = targets.len();
        ensure!(
            values.len() == len && signatures.len() == len && calldatas.len() == len,
            SimulationError::MismatchedActions {
                targets: len,
                values: values.len(),
                signatures: signatures.len(),
                calldatas: calldatas.len(),
            }
        );
        ensure!(len > 0, SimulationError::NoActions);

        Ok(Self {
            targets,
            values,
            signatures,
            calldatas,
            description: description.into(),
        })
    }

    pub fn targets(&self) -> &[Address] {
        &self.targets
    }

    pub fn values(&self) -> &[U256] {
        &self.values
    }

    pub fn signatures(&self) -> &[String] {
        &self.signatures
    }

    pub fn calldatas(&self) -> &[Bytes] {
        &self.calldatas
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        (0..self.len()).map(|i| Action {
            target: self.targets[i],
            value: self.values[i],
            signature: self.signatures[i].clone(),
            calldata: self.calldatas[i].clone(),
        })
    }

    pub fn propose_call(&self) -> IGovernorBravo::proposeCall {
        IGovernorBravo::proposeCall {
            targets: self.targets.clone(),
            values: self.values.clone(),
            signatures: self.signatures.clone(),
            calldatas: self.calldatas.clone(),
            description: self.description.clone(),
        }
    }

    /// The full `propose` transaction input.
    pub fn propose_calldata(&self) -> Bytes {
        self.propose_call().abi_encode().into()
    }
}

/// Accumulates whole actions so the parallel sequences cannot drift apart.
#[derive(Clone, Debug, Default)]
pub struct ProposalBuilder {
    actions: Vec<Action>,
    description: String,
}

impl ProposalBuilder {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            actions: Vec::new(),
            description: description.into(),
        }
    }

    pub fn action(&mut self, action: Action) -> &mut Self {
        self.actions.push(action);
        self
    }

    pub fn build(self) -> Result<ProposalParameters, SimulationError> {
        ensure!(!self.actions.is_empty(), SimulationError::NoActions);

        Ok(self.into())
    }
}

impl From<ProposalBuilder> for ProposalParameters {
    fn from(builder: ProposalBuilder) -> Self {
        let mut proposal = Self {
            targets: Vec::with_capacity(builder.actions.len()),
            values: Vec::with_capacity(builder.actions.len()),
            signatures: Vec::with_capacity(builder.actions.len()),
            calldatas: Vec::with_capacity(builder.actions.len()),
            description: builder.description,
        };

        for action in builder.actions {
            proposal.targets.push(action.target);
            proposal.values.push(action.value);
            proposal.signatures.push(action.signature);
            proposal.calldatas.push(action.calldata);
        }

        proposal
    }
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::abi::IPublicResolver;
    use crate::ens::namehash;

    const RESOLVER: Address = address!("4976fb03C32e5B8cfe2b6cCB31c09Ba78EBaBa41");

    #[test]
    fn set_text_builds_single_action() {
        let node = namehash("v3-core-license-grants.uniswap.eth");
        let proposal = ProposalParameters::set_text(RESOLVER, node, "key", "value", "# Title");

        assert_eq!(proposal.len(), 1);
        assert_eq!(proposal.targets(), &[RESOLVER]);
        assert_eq!(proposal.values(), &[U256::ZERO]);
        assert_eq!(proposal.signatures(), &[String::new()]);
        assert_eq!(proposal.description(), "# Title");

        let call = IPublicResolver::setTextCall::abi_decode(&proposal.calldatas()[0], true).unwrap();
        assert_eq!(call.node, node);
        assert_eq!(call.key, "key");
        assert_eq!(call.value, "value");
    }

    #[test]
    fn propose_calldata_carries_every_sequence() {
        let proposal =
            ProposalParameters::set_text(RESOLVER, namehash("uniswap.eth"), "k", "v", "desc");

        let decoded =
            IGovernorBravo::proposeCall::abi_decode(&proposal.propose_calldata(), true).unwrap();

        assert_eq!(decoded, proposal.propose_call());
        assert_eq!(decoded.description, "desc");
    }

    #[test]
    fn from_parts_rejects_mismatched_lengths() {
        let result = ProposalParameters::from_parts(
            vec![RESOLVER],
            vec![U256::ZERO, U256::ZERO],
            vec![String::new()],
            vec![Bytes::new()],
            "desc",
        );

        assert!(matches!(
            result,
            Err(SimulationError::MismatchedActions {
                targets: 1,
                values: 2,
                signatures: 1,
                calldatas: 1,
            })
        ));
    }

    #[test]
    fn empty_proposals_are_rejected() {
        assert!(matches!(
            ProposalBuilder::new("desc").build(),
            Err(SimulationError::NoActions)
        ));
        assert!(matches!(
            ProposalParameters::from_parts(vec![], vec![], vec![], vec![], "desc"),
            Err(SimulationError::NoActions)
        ));
    }

    #[test]
    fn actions_round_trip_through_builder() {
        let action = Action {
            target: RESOLVER,
            value: U256::from(7u64),
            signature: "setText(bytes32,string,string)".into(),
            calldata: Bytes::from_static(b"\x01\x02"),
        };

        let mut builder = ProposalBuilder::new("two actions");
        builder.action(action.clone()).action(action.clone());
        let proposal = builder.build().unwrap();

        assert_eq!(proposal.actions().collect::<Vec<_>>(), vec![action.clone(), action]);
    }
}
