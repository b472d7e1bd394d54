use alloy_primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use futures::{stream, StreamExt, TryStreamExt};
use tracing::{debug, info};

use crate::error::{ChainError, ThenOk};

/// Whether cheat-codes (impersonation, balance edits, mining, clock changes) may be used.
///
/// Only a forked or otherwise simulated node may ever be driven with
/// [`SimulationMode::Enabled`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum SimulationMode {
    #[default]
    Disabled,
    Enabled,
}

impl SimulationMode {
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled)
    }

    pub fn require(self, method: &'static str) -> Result<(), ChainError> {
        self.is_enabled()
            .then_ok((), ChainError::SimulationModeDisabled { method })
    }
}

/// A transaction sent from an unlocked (impersonated) account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub input: Bytes,
}

impl Transaction {
    pub fn call(from: Address, to: Address, input: impl Into<Bytes>) -> Self {
        Self {
            from,
            to,
            value: U256::ZERO,
            input: input.into(),
        }
    }
}

/// The chain a simulation runs against.
///
/// Every phase mutates this one shared state, so implementations are driven
/// through a single [`SimulationContext`](crate::lifecycle::SimulationContext).
#[async_trait]
pub trait ForkedChain: Send + Sync {
    async fn block_number(&self) -> Result<u64, ChainError>;

    async fn balance(&self, account: Address) -> Result<U256, ChainError>;

    /// Read-only call against the latest block.
    async fn call(&self, to: Address, input: Bytes) -> Result<Bytes, ChainError>;

    /// Sends the transaction and waits for it to be mined. A revert is an error.
    async fn send_transaction(&self, tx: Transaction) -> Result<TxHash, ChainError>;

    async fn mine_block(&self) -> Result<(), ChainError>;

    /// Shifts the timestamp of the next mined block forward.
    async fn increase_time(&self, seconds: u64) -> Result<(), ChainError>;

    async fn impersonate(&self, account: Address) -> Result<(), ChainError>;

    async fn set_balance(&self, account: Address, amount: U256) -> Result<(), ChainError>;
}

/// Mines `count` blocks, keeping up to `concurrency` requests in flight.
///
/// Mining requests are independent, so only the final height matters.
pub async fn advance_blocks<C>(chain: &C, count: u64, concurrency: usize) -> Result<(), ChainError>
where
    C: ForkedChain + ?Sized,
{
    let start = chain.block_number().await?;

    stream::iter(0..count)
        .map(|_| chain.mine_block())
        .buffer_unordered(concurrency.max(1))
        .try_collect::<Vec<()>>()
        .await?;

    info!(blocks = count, from = start, "advanced block height");

    Ok(())
}

/// Moves the clock forward and mines one block so the new time is committed.
pub async fn advance_time<C>(chain: &C, seconds: u64) -> Result<(), ChainError>
where
    C: ForkedChain + ?Sized,
{
    chain.increase_time(seconds).await?;
    chain.mine_block().await?;

    info!(seconds, "advanced chain time");

    Ok(())
}

/// Unlocks `account` and makes sure it holds at least `top_up` wei for gas.
pub async fn funded_signer<C>(chain: &C, account: Address, top_up: U256) -> Result<Address, ChainError>
where
    C: ForkedChain + ?Sized,
{
    chain.impersonate(account).await?;

    let balance = chain.balance(account).await?;
    if balance < top_up {
        chain.set_balance(account, top_up).await?;
        debug!(%account, %balance, %top_up, "topped up signer");
    }

    Ok(account)
}

#[cfg(test)]
mod tests {
    use alloy_primitives::address;

    use super::*;
    use crate::testutils::InMemoryFork;

    #[tokio::test]
    async fn advance_blocks_mines_exact_count() {
        let fork = InMemoryFork::default();
        let start = fork.block_number().await.unwrap();

        advance_blocks(&fork, 1_000, 16).await.unwrap();

        assert_eq!(fork.block_number().await.unwrap(), start + 1_000);
    }

    #[tokio::test]
    async fn advance_time_commits_one_block() {
        let fork = InMemoryFork::default();
        let start_block = fork.block_number().await.unwrap();
        let start_time = fork.timestamp();

        advance_time(&fork, 172_800).await.unwrap();

        assert_eq!(fork.block_number().await.unwrap(), start_block + 1);
        assert!(fork.timestamp() >= start_time + 172_800);
    }

    #[tokio::test]
    async fn funded_signer_only_tops_up_short_balances() {
        let fork = InMemoryFork::default();
        let rich = address!("00000000000000000000000000000000000000aa");
        let poor = address!("00000000000000000000000000000000000000bb");
        let top_up = U256::from(10u64);

        fork.set_balance(rich, U256::from(100u64)).await.unwrap();

        funded_signer(&fork, rich, top_up).await.unwrap();
        funded_signer(&fork, poor, top_up).await.unwrap();

        assert_eq!(fork.balance(rich).await.unwrap(), U256::from(100u64));
        assert_eq!(fork.balance(poor).await.unwrap(), top_up);
        assert!(fork.is_impersonated(poor));
    }

    #[test]
    fn simulation_mode_defaults_to_disabled() {
        assert!(!SimulationMode::default().is_enabled());
        assert!(SimulationMode::Enabled.require("evm_mine").is_ok());
    }

    #[tokio::test]
    async fn cheat_codes_require_simulation_mode() {
        let fork = InMemoryFork::live();
        let account = address!("00000000000000000000000000000000000000aa");

        assert!(matches!(
            fork.impersonate(account).await,
            Err(ChainError::SimulationModeDisabled { method: "hardhat_impersonateAccount" })
        ));
        assert!(matches!(
            advance_blocks(&fork, 1, 1).await,
            Err(ChainError::SimulationModeDisabled { .. })
        ));
        assert!(matches!(
            advance_time(&fork, 1).await,
            Err(ChainError::SimulationModeDisabled { .. })
        ));
    }
}
