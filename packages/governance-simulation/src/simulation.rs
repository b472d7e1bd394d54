use tracing::info;

use crate::chain::ForkedChain;
use crate::config::SimulationConfig;
use crate::ens::LicenseRecord;
use crate::error::SimulationError;
use crate::lifecycle::{self, SimulationContext};
use crate::proposal::ProposalParameters;
use crate::types::{ProposalId, ProposalState};
use crate::verify::{expect_license_text, Checkpoint};

/// Outcome of a successful run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SimulationReport {
    pub proposal_id: ProposalId,
    pub final_state: ProposalState,
    pub start_block: u64,
    pub end_block: u64,
    pub license_text: String,
}

/// The license grant proposal described by `config`.
pub fn license_grant_proposal(config: &SimulationConfig) -> (LicenseRecord, ProposalParameters) {
    let record = LicenseRecord::new(&config.ens_name, config.grant.record_key());
    let proposal = ProposalParameters::set_text(
        config.resolver,
        record.node,
        &record.key,
        &config.grant.record_value(),
        config.description.clone(),
    );

    (record, proposal)
}

/// Runs the whole lifecycle of the configured license grant proposal.
///
/// The first failed check or failed chain call ends the run.
pub async fn run<C: ForkedChain>(
    chain: C,
    config: SimulationConfig,
) -> Result<SimulationReport, SimulationError> {
    let (record, proposal) = license_grant_proposal(&config);
    let expected_text = config.grant.record_value();

    let mut ctx = SimulationContext::new(chain, config)?;
    let start_block = ctx.chain().block_number().await?;
    info!(start_block, %record, "starting proposal simulation");

    expect_license_text(&ctx, &record, Checkpoint::BeforeSubmission, "").await?;

    let id = lifecycle::submit(&mut ctx, &proposal).await?;

    expect_license_text(&ctx, &record, Checkpoint::BeforeExecution, "").await?;

    lifecycle::advance_review_period(&mut ctx).await?;
    lifecycle::cast_votes(&mut ctx, id).await?;
    lifecycle::advance_voting_period(&mut ctx).await?;
    lifecycle::queue(&mut ctx, id).await?;
    lifecycle::advance_timelock(&mut ctx).await?;
    lifecycle::execute(&mut ctx, id).await?;

    let license_text =
        expect_license_text(&ctx, &record, Checkpoint::AfterExecution, &expected_text).await?;

    let final_state = ctx.governor().state(id).await?;
    let end_block = ctx.chain().block_number().await?;
    info!(%id, end_block, "proposal simulation complete");

    Ok(SimulationReport {
        proposal_id: id,
        final_state,
        start_block,
        end_block,
        license_text,
    })
}
