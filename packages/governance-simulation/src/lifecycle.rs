use alloy_primitives::U256;
use tracing::{debug, info};

use crate::chain::{advance_blocks, advance_time, funded_signer, ForkedChain};
use crate::config::SimulationConfig;
use crate::ens::PublicResolverClient;
use crate::ensure;
use crate::error::SimulationError;
use crate::governor::GovernorBravoClient;
use crate::proposal::ProposalParameters;
use crate::types::{ProposalId, ProposalState, VoteType};

/// The lifecycle phases, in the only order the governor accepts them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Submit,
    ReviewPeriod,
    Vote,
    VotingPeriod,
    Queue,
    Timelock,
    Execute,
}

impl Phase {
    pub const fn previous(self) -> Option<Self> {
        match self {
            Self::Submit => None,
            Self::ReviewPeriod => Some(Self::Submit),
            Self::Vote => Some(Self::ReviewPeriod),
            Self::VotingPeriod => Some(Self::Vote),
            Self::Queue => Some(Self::VotingPeriod),
            Self::Timelock => Some(Self::Queue),
            Self::Execute => Some(Self::Timelock),
        }
    }
}

/// The forked chain plus everything the phases need, threaded through every phase.
///
/// Phases borrow the context mutably and record their completion, so the
/// ordering the governor depends on is checked before anything is sent.
pub struct SimulationContext<C> {
    chain: C,
    config: SimulationConfig,
    completed: Option<Phase>,
}

impl<C: ForkedChain> SimulationContext<C> {
    pub fn new(chain: C, config: SimulationConfig) -> Result<Self, SimulationError> {
        config.validate()?;

        Ok(Self {
            chain,
            config,
            completed: None,
        })
    }

    pub const fn chain(&self) -> &C {
        &self.chain
    }

    pub const fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub const fn completed(&self) -> Option<Phase> {
        self.completed
    }

    pub fn into_chain(self) -> C {
        self.chain
    }

    pub fn governor(&self) -> GovernorBravoClient<'_, C> {
        GovernorBravoClient::new(&self.chain, self.config.governor)
    }

    pub fn resolver(&self) -> PublicResolverClient<'_, C> {
        PublicResolverClient::new(&self.chain, self.config.resolver)
    }

    fn enter(&self, phase: Phase) -> Result<(), SimulationError> {
        ensure!(
            self.completed == phase.previous(),
            SimulationError::OutOfOrder {
                completed: self.completed,
                attempted: phase,
            }
        );

        info!(?phase, "entering phase");

        Ok(())
    }

    fn complete(&mut self, phase: Phase) {
        self.completed = Some(phase);
    }

    async fn expect_state(
        &self,
        id: ProposalId,
        expected: ProposalState,
    ) -> Result<(), SimulationError> {
        let actual = self.governor().state(id).await?;
        ensure!(
            actual == expected,
            SimulationError::UnexpectedState {
                id,
                expected,
                actual,
            }
        );

        Ok(())
    }

    async fn log_proposal(&self, id: ProposalId) -> Result<(), SimulationError> {
        let info = self.governor().proposal(id).await?;
        debug!(?info, "proposal");

        Ok(())
    }
}

/// Sends `propose` from the configured proposer and returns the new proposal id.
///
/// The proposal count must match the configured baseline before and move up
/// by exactly one after. The id is cross-checked against the proposer's latest
/// proposal rather than assumed.
pub async fn submit<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
    proposal: &ProposalParameters,
) -> Result<ProposalId, SimulationError> {
    ctx.enter(Phase::Submit)?;
    ensure!(!proposal.is_empty(), SimulationError::NoActions);

    let governor = ctx.governor();
    let baseline = U256::from(ctx.config.expected_proposal_count);
    let expected_id = ctx.config.expected_proposal_id();

    let count = governor.proposal_count().await?;
    ensure!(
        count == baseline,
        SimulationError::ProposalCountMismatch {
            expected: baseline,
            actual: count,
        }
    );

    debug!(
        targets = ?proposal.targets(),
        values = ?proposal.values(),
        signatures = ?proposal.signatures(),
        calldatas = ?proposal.calldatas(),
        description = proposal.description(),
        "proposal parameters"
    );

    let proposer = funded_signer(
        &ctx.chain,
        ctx.config.proposer,
        ctx.config.signer_top_up(),
    )
    .await?;
    let tx = governor.propose(proposer, proposal).await?;

    let count = governor.proposal_count().await?;
    ensure!(
        count == expected_id,
        SimulationError::ProposalCountMismatch {
            expected: expected_id,
            actual: count,
        }
    );

    let id = governor.latest_proposal_id(proposer).await?;
    ensure!(
        id == expected_id,
        SimulationError::ProposalIdMismatch {
            expected: expected_id,
            actual: id,
        }
    );

    info!(%id, %tx, %proposer, "proposal submitted");
    ctx.log_proposal(id).await?;
    ctx.complete(Phase::Submit);

    Ok(id)
}

/// Mines through the review period so voting opens.
pub async fn advance_review_period<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
) -> Result<(), SimulationError> {
    ctx.enter(Phase::ReviewPeriod)?;

    advance_blocks(
        &ctx.chain,
        ctx.config.review_period_blocks,
        ctx.config.mining_concurrency,
    )
    .await?;

    ctx.complete(Phase::ReviewPeriod);

    Ok(())
}

/// Casts a "for" vote from every configured voter.
pub async fn cast_votes<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
    id: ProposalId,
) -> Result<(), SimulationError> {
    ctx.enter(Phase::Vote)?;
    ctx.expect_state(id, ProposalState::Active).await?;

    let governor = ctx.governor();
    for voter in &ctx.config.voters {
        let voter = funded_signer(&ctx.chain, *voter, ctx.config.signer_top_up()).await?;
        let tx = governor.cast_vote(voter, id, VoteType::For).await?;
        debug!(%voter, %tx, "vote cast");
    }

    info!(%id, voters = ctx.config.voters.len(), "votes cast");
    ctx.complete(Phase::Vote);

    Ok(())
}

/// Mines through the voting period so the tally is final.
pub async fn advance_voting_period<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
) -> Result<(), SimulationError> {
    ctx.enter(Phase::VotingPeriod)?;

    advance_blocks(
        &ctx.chain,
        ctx.config.voting_period_blocks,
        ctx.config.mining_concurrency,
    )
    .await?;

    ctx.complete(Phase::VotingPeriod);

    Ok(())
}

/// Queues a succeeded proposal in the timelock.
pub async fn queue<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
    id: ProposalId,
) -> Result<(), SimulationError> {
    ctx.enter(Phase::Queue)?;
    ctx.expect_state(id, ProposalState::Succeeded).await?;

    let tx = ctx.governor().queue(ctx.config.proposer, id).await?;

    ctx.expect_state(id, ProposalState::Queued).await?;
    info!(%id, %tx, "proposal queued");
    ctx.log_proposal(id).await?;
    ctx.complete(Phase::Queue);

    Ok(())
}

/// Moves the clock past the timelock delay.
pub async fn advance_timelock<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
) -> Result<(), SimulationError> {
    ctx.enter(Phase::Timelock)?;

    advance_time(&ctx.chain, ctx.config.timelock_delay_secs).await?;

    ctx.complete(Phase::Timelock);

    Ok(())
}

/// Executes the queued proposal, running its actions from the timelock.
pub async fn execute<C: ForkedChain>(
    ctx: &mut SimulationContext<C>,
    id: ProposalId,
) -> Result<(), SimulationError> {
    ctx.enter(Phase::Execute)?;

    let tx = ctx.governor().execute(ctx.config.proposer, id).await?;

    ctx.expect_state(id, ProposalState::Executed).await?;
    info!(%id, %tx, "proposal executed");
    ctx.log_proposal(id).await?;
    ctx.complete(Phase::Execute);

    Ok(())
}
