use alloy_primitives::{TxHash, U256};
use thiserror::Error;

use crate::lifecycle::Phase;
use crate::types::ProposalState;
use crate::verify::Checkpoint;

/// Return with an error if a condition is not met.
///
///
/// Simplifies the pattern of checking for a condition and returning with an error.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $e:expr $(,)?) => {
        if !$cond {
            return Err($e.into());
        }
    };
}

// The following macro is mostly intended to serve as pseudo-documentation within tests,
// in addition to convenience/clarity

/// Assert that a [`Result`] is [`Ok`]
///
/// If the provided expresion evaulates to [`Ok`], then the
/// macro returns the value contained within the [`Ok`]. If
/// the [`Result`] is an [`Err`] then the macro will [`panic`]
/// with a message that includes the expression and the error.
#[macro_export]
macro_rules! assert_ok {
    ( $x:expr ) => {
        match $x {
            std::result::Result::Ok(v) => v,
            std::result::Result::Err(e) => {
                panic!("Error calling {}: {:?}", stringify!($x), e);
            }
        }
    };
}

pub trait ThenOk<T, E> {
    fn then_ok(self, ok: T, err: E) -> Result<T, E>;
}

impl<T, E> ThenOk<T, E> for bool {
    fn then_ok(self, ok: T, err: E) -> Result<T, E> {
        self.then_some(ok).ok_or(err)
    }
}

/// Failures reported by a fork backend or while decoding what it returned.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("json-rpc error {code}: {message}")]
    Rpc { code: i64, message: String },
    #[error("malformed json-rpc result: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("no receipt for transaction {0}")]
    MissingReceipt(TxHash),
    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },
    #[error("{method} is only available in simulation mode")]
    SimulationModeDisabled { method: &'static str },
    #[error("abi decoding failed: {0}")]
    Abi(#[from] alloy_sol_types::Error),
    #[error("governor returned unknown proposal state {0}")]
    UnknownState(u8),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(&'static str),
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("expected {expected} proposals, governor reports {actual}")]
    ProposalCountMismatch { expected: U256, actual: U256 },
    #[error("expected proposal id {expected}, governor reports {actual}")]
    ProposalIdMismatch { expected: U256, actual: U256 },
    #[error("proposal {id} is {actual:?}, expected {expected:?}")]
    UnexpectedState {
        id: U256,
        expected: ProposalState,
        actual: ProposalState,
    },
    #[error("license text mismatch {checkpoint}: expected {expected:?}, found {actual:?}")]
    LicenseTextMismatch {
        checkpoint: Checkpoint,
        expected: String,
        actual: String,
    },
    #[error("{attempted:?} cannot run after {completed:?}")]
    OutOfOrder {
        completed: Option<Phase>,
        attempted: Phase,
    },
    #[error(
        "proposal actions have mismatched lengths: {targets} targets, {values} values, {signatures} signatures, {calldatas} calldatas"
    )]
    MismatchedActions {
        targets: usize,
        values: usize,
        signatures: usize,
        calldatas: usize,
    },
    #[error("proposal has no actions")]
    NoActions,
}
