#![cfg(any(test, feature = "testutils"))]

//! An in-process stand-in for a mainnet fork.
//!
//! It decodes the same calldata a real node would receive and applies the
//! GovernorBravo, timelock and public resolver rules the simulation relies
//! on. Transactions are atomic: a revert leaves the fork untouched.

use std::collections::{BTreeMap, HashMap, HashSet};

use alloy_primitives::{address, keccak256, Address, Bytes, TxHash, B256, U256};
use alloy_sol_types::{SolCall, SolInterface};
use async_trait::async_trait;
use parking_lot::Mutex;

use crate::abi::IGovernorBravo::{self, IGovernorBravoCalls};
use crate::abi::IPublicResolver::{self, IPublicResolverCalls};
use crate::chain::{ForkedChain, SimulationMode, Transaction};
use crate::config::SimulationConfig;
use crate::ens::namehash;
use crate::ensure;
use crate::error::{ChainError, ThenOk};
use crate::proposal::Action;
use crate::types::ProposalState;

/// Uniswap's timelock, the executor of every passed proposal.
pub const TIMELOCK: Address = address!("1a9C8182C09F50C8318d769245beA52c32BE35BC");

pub const FORK_BLOCK: u64 = 14_000_000;
pub const FORK_TIMESTAMP: u64 = 1_642_114_795;

const BLOCK_TIME: u64 = 12;
const GRACE_PERIOD: u64 = 14 * 24 * 60 * 60;
const PROPOSAL_MAX_OPERATIONS: usize = 10;
const GAS_COST: u128 = 10_000_000_000_000_000;
const UNI: u128 = 1_000_000_000_000_000_000;

/// 4% of the UNI supply.
pub const QUORUM_VOTES: u128 = 40_000_000 * UNI;
pub const PROPOSAL_THRESHOLD: u128 = 2_500_000 * UNI;
/// Delegated votes given to each configured voter; seven of them clear quorum.
pub const VOTER_WEIGHT: u128 = 10_000_000 * UNI;

fn revert(reason: &str) -> ChainError {
    ChainError::Reverted {
        reason: reason.to_owned(),
    }
}

fn proposal_index(id: U256) -> Result<u64, ChainError> {
    u64::try_from(id).map_err(|_| revert("GovernorBravo::state: invalid proposal id"))
}

#[derive(Copy, Clone, Debug)]
struct BlockEnv {
    number: u64,
    timestamp: u64,
}

#[derive(Clone, Debug)]
struct Proposal {
    id: u64,
    proposer: Address,
    eta: u64,
    start_block: u64,
    end_block: u64,
    for_votes: U256,
    against_votes: U256,
    abstain_votes: U256,
    canceled: bool,
    executed: bool,
    actions: Vec<Action>,
    receipts: HashSet<Address>,
}

#[derive(Clone, Debug)]
struct Governor {
    address: Address,
    proposal_count: u64,
    initial_proposal_id: u64,
    proposals: BTreeMap<u64, Proposal>,
    latest_proposal_ids: HashMap<Address, u64>,
    voting_delay: u64,
    voting_period: u64,
    timelock_delay: u64,
    votes: HashMap<Address, U256>,
    queued_transactions: HashSet<B256>,
    /// Senders whose proposals reach the governor through another contract.
    forwarders: HashMap<Address, Address>,
}

impl Governor {
    fn votes_of(&self, account: Address) -> U256 {
        self.votes.get(&account).copied().unwrap_or_default()
    }

    fn proposal(&self, id: u64) -> Result<&Proposal, ChainError> {
        self.proposals
            .get(&id)
            .ok_or_else(|| revert("GovernorBravo::state: invalid proposal id"))
    }

    fn proposal_mut(&mut self, id: u64) -> Result<&mut Proposal, ChainError> {
        self.proposals
            .get_mut(&id)
            .ok_or_else(|| revert("GovernorBravo::state: invalid proposal id"))
    }

    fn state(&self, id: u64, env: BlockEnv) -> Result<ProposalState, ChainError> {
        ensure!(
            id > self.initial_proposal_id && id <= self.proposal_count,
            revert("GovernorBravo::state: invalid proposal id")
        );
        let proposal = self.proposal(id)?;

        let state = if proposal.canceled {
            ProposalState::Canceled
        } else if env.number <= proposal.start_block {
            ProposalState::Pending
        } else if env.number <= proposal.end_block {
            ProposalState::Active
        } else if proposal.for_votes <= proposal.against_votes
            || proposal.for_votes < U256::from(QUORUM_VOTES)
        {
            ProposalState::Defeated
        } else if proposal.eta == 0 {
            ProposalState::Succeeded
        } else if proposal.executed {
            ProposalState::Executed
        } else if env.timestamp >= proposal.eta + GRACE_PERIOD {
            ProposalState::Expired
        } else {
            ProposalState::Queued
        };

        Ok(state)
    }

    fn view(&self, input: &[u8], env: BlockEnv) -> Result<Bytes, ChainError> {
        let output = match IGovernorBravoCalls::abi_decode(input, true)? {
            IGovernorBravoCalls::proposalCount(_) => {
                IGovernorBravo::proposalCountCall::abi_encode_returns(&(U256::from(
                    self.proposal_count,
                ),))
            }
            IGovernorBravoCalls::proposals(call) => {
                let proposal = self.proposal(proposal_index(call.proposalId)?)?;
                IGovernorBravo::proposalsCall::abi_encode_returns(&(
                    U256::from(proposal.id),
                    proposal.proposer,
                    U256::from(proposal.eta),
                    U256::from(proposal.start_block),
                    U256::from(proposal.end_block),
                    proposal.for_votes,
                    proposal.against_votes,
                    proposal.abstain_votes,
                    proposal.canceled,
                    proposal.executed,
                ))
            }
            IGovernorBravoCalls::state(call) => {
                let state = self.state(proposal_index(call.proposalId)?, env)?;
                IGovernorBravo::stateCall::abi_encode_returns(&(state as u8,))
            }
            IGovernorBravoCalls::latestProposalIds(call) => {
                let latest = self
                    .latest_proposal_ids
                    .get(&call.proposer)
                    .copied()
                    .unwrap_or_default();
                IGovernorBravo::latestProposalIdsCall::abi_encode_returns(&(U256::from(latest),))
            }
            _ => return Err(revert("GovernorBravo: not a view function")),
        };

        Ok(output.into())
    }

    fn propose(
        &mut self,
        proposer: Address,
        call: IGovernorBravo::proposeCall,
        env: BlockEnv,
    ) -> Result<u64, ChainError> {
        ensure!(
            self.votes_of(proposer) > U256::from(PROPOSAL_THRESHOLD),
            revert("GovernorBravo::propose: proposer votes below proposal threshold")
        );

        let len = call.targets.len();
        ensure!(
            call.values.len() == len && call.signatures.len() == len && call.calldatas.len() == len,
            revert("GovernorBravo::propose: proposal function information arity mismatch")
        );
        ensure!(len != 0, revert("GovernorBravo::propose: must provide actions"));
        ensure!(
            len <= PROPOSAL_MAX_OPERATIONS,
            revert("GovernorBravo::propose: too many actions")
        );

        if let Some(&latest) = self.latest_proposal_ids.get(&proposer) {
            let state = self.state(latest, env)?;
            ensure!(
                state != ProposalState::Active,
                revert("GovernorBravo::propose: one live proposal per proposer, found an already active proposal")
            );
            ensure!(
                state != ProposalState::Pending,
                revert("GovernorBravo::propose: one live proposal per proposer, found an already pending proposal")
            );
        }

        let start_block = env.number + self.voting_delay;
        let id = self.proposal_count + 1;
        let actions = (0..len)
            .map(|i| Action {
                target: call.targets[i],
                value: call.values[i],
                signature: call.signatures[i].clone(),
                calldata: call.calldatas[i].clone(),
            })
            .collect();

        self.proposals.insert(
            id,
            Proposal {
                id,
                proposer,
                eta: 0,
                start_block,
                end_block: start_block + self.voting_period,
                for_votes: U256::ZERO,
                against_votes: U256::ZERO,
                abstain_votes: U256::ZERO,
                canceled: false,
                executed: false,
                actions,
                receipts: HashSet::new(),
            },
        );
        self.proposal_count = id;
        self.latest_proposal_ids.insert(proposer, id);

        Ok(id)
    }

    fn cast_vote(
        &mut self,
        voter: Address,
        id: u64,
        support: u8,
        env: BlockEnv,
    ) -> Result<(), ChainError> {
        ensure!(
            self.state(id, env)? == ProposalState::Active,
            revert("GovernorBravo::castVoteInternal: voting is closed")
        );
        ensure!(
            support <= 2,
            revert("GovernorBravo::castVoteInternal: invalid vote type")
        );

        let votes = self.votes_of(voter);
        let proposal = self.proposal_mut(id)?;
        proposal.receipts.insert(voter).then_ok(
            (),
            revert("GovernorBravo::castVoteInternal: voter already voted"),
        )?;

        match support {
            0 => proposal.against_votes += votes,
            1 => proposal.for_votes += votes,
            _ => proposal.abstain_votes += votes,
        }

        Ok(())
    }

    fn transaction_hash(action: &Action, eta: u64) -> B256 {
        keccak256(
            [
                action.target.as_slice(),
                &action.value.to_be_bytes::<32>(),
                action.signature.as_bytes(),
                &action.calldata,
                &eta.to_be_bytes(),
            ]
            .concat(),
        )
    }

    fn queue(&mut self, id: u64, env: BlockEnv) -> Result<(), ChainError> {
        ensure!(
            self.state(id, env)? == ProposalState::Succeeded,
            revert("GovernorBravo::queue: proposal can only be queued if it is succeeded")
        );

        let eta = env.timestamp + self.timelock_delay;
        let hashes: Vec<_> = self
            .proposal(id)?
            .actions
            .iter()
            .map(|action| Self::transaction_hash(action, eta))
            .collect();

        for hash in hashes {
            self.queued_transactions.insert(hash).then_ok(
                (),
                revert("GovernorBravo::queueOrRevertInternal: identical proposal action already queued at eta"),
            )?;
        }
        self.proposal_mut(id)?.eta = eta;

        Ok(())
    }

    /// Marks the proposal executed and returns the calls the timelock must make.
    fn execute(&mut self, id: u64, env: BlockEnv) -> Result<Vec<(Address, Bytes)>, ChainError> {
        ensure!(
            self.state(id, env)? == ProposalState::Queued,
            revert("GovernorBravo::execute: proposal can only be executed if it is queued")
        );

        let proposal = self.proposal(id)?.clone();
        ensure!(
            env.timestamp >= proposal.eta,
            revert("Timelock::executeTransaction: Transaction hasn't surpassed time lock.")
        );

        let mut calls = Vec::with_capacity(proposal.actions.len());
        for action in &proposal.actions {
            self.queued_transactions
                .remove(&Self::transaction_hash(action, proposal.eta))
                .then_ok(
                    (),
                    revert("Timelock::executeTransaction: Transaction hasn't been queued."),
                )?;

            let data = if action.signature.is_empty() {
                action.calldata.clone()
            } else {
                let selector = &keccak256(action.signature.as_bytes())[..4];
                [selector, action.calldata.as_ref()].concat().into()
            };
            calls.push((action.target, data));
        }
        self.proposal_mut(id)?.executed = true;

        Ok(calls)
    }
}

#[derive(Clone, Debug)]
struct Resolver {
    address: Address,
    authorisations: HashMap<B256, Address>,
    texts: HashMap<(B256, String), String>,
}

impl Resolver {
    fn text(&self, node: B256, key: &str) -> String {
        self.texts
            .get(&(node, key.to_owned()))
            .cloned()
            .unwrap_or_default()
    }

    fn view(&self, input: &[u8]) -> Result<Bytes, ChainError> {
        match IPublicResolverCalls::abi_decode(input, true)? {
            IPublicResolverCalls::text(call) => Ok(IPublicResolver::textCall::abi_encode_returns(
                &(self.text(call.node, &call.key),),
            )
            .into()),
            IPublicResolverCalls::setText(_) => Ok(Bytes::new()),
        }
    }

    fn transact(&mut self, sender: Address, input: &[u8]) -> Result<(), ChainError> {
        match IPublicResolverCalls::abi_decode(input, true)? {
            IPublicResolverCalls::setText(call) => {
                ensure!(
                    self.authorisations.get(&call.node) == Some(&sender),
                    revert("PublicResolver: sender is not authorised for node")
                );
                self.texts.insert((call.node, call.key), call.value);
            }
            IPublicResolverCalls::text(_) => {}
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
struct ForkState {
    block_number: u64,
    timestamp: u64,
    time_offset: u64,
    nonce: u64,
    balances: HashMap<Address, U256>,
    impersonated: HashSet<Address>,
    governor: Governor,
    resolver: Resolver,
}

impl ForkState {
    const fn env(&self) -> BlockEnv {
        BlockEnv {
            number: self.block_number,
            timestamp: self.timestamp,
        }
    }

    fn mine(&mut self) {
        self.block_number += 1;
        self.timestamp += BLOCK_TIME + self.time_offset;
        self.time_offset = 0;
    }

    fn balance(&self, account: Address) -> U256 {
        self.balances.get(&account).copied().unwrap_or_default()
    }

    fn call(&self, to: Address, input: &[u8]) -> Result<Bytes, ChainError> {
        if to == self.governor.address {
            self.governor.view(input, self.env())
        } else if to == self.resolver.address {
            self.resolver.view(input)
        } else {
            Ok(Bytes::new())
        }
    }

    fn apply(&mut self, tx: Transaction) -> Result<TxHash, ChainError> {
        ensure!(
            self.impersonated.contains(&tx.from),
            ChainError::Rpc {
                code: -32000,
                message: format!("unknown account {}", tx.from),
            }
        );

        let cost = U256::from(GAS_COST) + tx.value;
        let balance = self.balance(tx.from);
        ensure!(
            balance >= cost,
            ChainError::Rpc {
                code: -32000,
                message: "insufficient funds for gas * price + value".to_owned(),
            }
        );
        self.balances.insert(tx.from, balance - cost);

        self.mine();
        let env = self.env();

        if tx.to == self.governor.address {
            self.apply_governor(tx.from, &tx.input, env)?;
        } else if tx.to == self.resolver.address {
            self.resolver.transact(tx.from, &tx.input)?;
        }

        self.nonce += 1;
        Ok(keccak256(
            [
                tx.from.as_slice(),
                &self.nonce.to_be_bytes(),
                &tx.input,
            ]
            .concat(),
        ))
    }

    fn apply_governor(
        &mut self,
        sender: Address,
        input: &[u8],
        env: BlockEnv,
    ) -> Result<(), ChainError> {
        match IGovernorBravoCalls::abi_decode(input, true)? {
            IGovernorBravoCalls::propose(call) => {
                let proposer = self
                    .governor
                    .forwarders
                    .get(&sender)
                    .copied()
                    .unwrap_or(sender);
                self.governor.propose(proposer, call, env)?;
            }
            IGovernorBravoCalls::castVote(call) => {
                let id = proposal_index(call.proposalId)?;
                self.governor.cast_vote(sender, id, call.support, env)?;
            }
            IGovernorBravoCalls::queue(call) => {
                self.governor.queue(proposal_index(call.proposalId)?, env)?;
            }
            IGovernorBravoCalls::execute(call) => {
                let calls = self.governor.execute(proposal_index(call.proposalId)?, env)?;
                for (target, data) in calls {
                    if target == self.resolver.address {
                        self.resolver.transact(TIMELOCK, &data)?;
                    }
                }
            }
            _ => {}
        }

        Ok(())
    }
}

/// A deterministic fork of the chain described by a [`SimulationConfig`].
///
/// The governor sits at `config.governor` with `config.expected_proposal_count`
/// proposals already made, every configured voter holds [`VOTER_WEIGHT`]
/// votes, and [`TIMELOCK`] is authorised to write `config.ens_name` records.
pub struct InMemoryFork {
    state: Mutex<ForkState>,
    mode: SimulationMode,
}

impl Default for InMemoryFork {
    fn default() -> Self {
        Self::new(&SimulationConfig::default())
    }
}

impl InMemoryFork {
    pub fn new(config: &SimulationConfig) -> Self {
        let votes = config
            .voters
            .iter()
            .chain(core::iter::once(&config.proposer))
            .map(|voter| (*voter, U256::from(VOTER_WEIGHT)))
            .collect();

        let governor = Governor {
            address: config.governor,
            proposal_count: config.expected_proposal_count,
            initial_proposal_id: config.expected_proposal_count,
            proposals: BTreeMap::new(),
            latest_proposal_ids: HashMap::new(),
            voting_delay: config.review_period_blocks.saturating_sub(1),
            voting_period: config.voting_period_blocks,
            timelock_delay: config.timelock_delay_secs,
            votes,
            queued_transactions: HashSet::new(),
            forwarders: HashMap::new(),
        };

        let resolver = Resolver {
            address: config.resolver,
            authorisations: HashMap::from([(namehash(&config.ens_name), TIMELOCK)]),
            texts: HashMap::new(),
        };

        Self {
            state: Mutex::new(ForkState {
                block_number: FORK_BLOCK,
                timestamp: FORK_TIMESTAMP,
                time_offset: 0,
                nonce: 0,
                balances: HashMap::new(),
                impersonated: HashSet::new(),
                governor,
                resolver,
            }),
            mode: SimulationMode::Enabled,
        }
    }

    /// The same fork with every cheat-code refused, as a live node would.
    pub fn live() -> Self {
        Self {
            mode: SimulationMode::Disabled,
            ..Self::default()
        }
    }

    pub fn timestamp(&self) -> u64 {
        self.state.lock().timestamp
    }

    pub fn is_impersonated(&self, account: Address) -> bool {
        self.state.lock().impersonated.contains(&account)
    }

    pub fn set_voting_weight(&self, account: Address, votes: U256) {
        self.state.lock().governor.votes.insert(account, votes);
    }

    /// Proposals sent by `sender` are made through `forwarder`, which the
    /// governor then records as their proposer.
    pub fn forward_proposals(&self, sender: Address, forwarder: Address) {
        self.state
            .lock()
            .governor
            .forwarders
            .insert(sender, forwarder);
    }

    pub fn text(&self, node: B256, key: &str) -> String {
        self.state.lock().resolver.text(node, key)
    }

    /// Number of timelock transactions currently queued.
    pub fn queued_transactions(&self) -> usize {
        self.state.lock().governor.queued_transactions.len()
    }
}

#[async_trait]
impl ForkedChain for InMemoryFork {
    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.state.lock().block_number)
    }

    async fn balance(&self, account: Address) -> Result<U256, ChainError> {
        Ok(self.state.lock().balance(account))
    }

    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError> {
        self.state.lock().call(to, &input)
    }

    async fn send_transaction(&self, tx: Transaction) -> Result<TxHash, ChainError> {
        let mut state = self.state.lock();
        let mut next = state.clone();
        let hash = next.apply(tx)?;
        *state = next;

        Ok(hash)
    }

    async fn mine_block(&self) -> Result<(), ChainError> {
        self.mode.require("evm_mine")?;
        self.state.lock().mine();

        Ok(())
    }

    async fn increase_time(&self, seconds: u64) -> Result<(), ChainError> {
        self.mode.require("evm_increaseTime")?;
        self.state.lock().time_offset += seconds;

        Ok(())
    }

    async fn impersonate(&self, account: Address) -> Result<(), ChainError> {
        self.mode.require("hardhat_impersonateAccount")?;
        self.state.lock().impersonated.insert(account);

        Ok(())
    }

    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), ChainError> {
        self.mode.require("hardhat_setBalance")?;
        self.state.lock().balances.insert(account, amount);

        Ok(())
    }
}
