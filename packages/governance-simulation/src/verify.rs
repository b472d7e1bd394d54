use core::fmt;

use tracing::info;

use crate::chain::ForkedChain;
use crate::ens::LicenseRecord;
use crate::ensure;
use crate::error::SimulationError;
use crate::lifecycle::SimulationContext;

/// Where in the run a license record is checked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Checkpoint {
    BeforeSubmission,
    BeforeExecution,
    AfterExecution,
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::BeforeSubmission => "before submission",
            Self::BeforeExecution => "before execution",
            Self::AfterExecution => "after execution",
        };

        f.write_str(name)
    }
}

/// Reads the record from the resolver and requires it to equal `expected` byte for byte.
pub async fn expect_license_text<C: ForkedChain>(
    ctx: &SimulationContext<C>,
    record: &LicenseRecord,
    checkpoint: Checkpoint,
    expected: &str,
) -> Result<String, SimulationError> {
    let actual = ctx.resolver().text(record.node, &record.key).await?;

    ensure!(
        actual == expected,
        SimulationError::LicenseTextMismatch {
            checkpoint,
            expected: expected.to_owned(),
            actual,
        }
    );

    info!(%record, %checkpoint, len = actual.len(), "license text verified");

    Ok(actual)
}
