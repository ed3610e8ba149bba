//! Contract gateway boundary
//!
//! Everything the bot needs from the ledger node and the dice contract.
//! All amounts are smallest on-chain units.

use crate::errors::BotResult;
use crate::types::{GameRound, ReceiptStatus};
use crate::wallet::Wallet;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;

/// Remote calls against the node and the dice contract
#[async_trait]
pub trait ContractGateway: Send + Sync {
    /// Game token balance (the contract is also the token)
    async fn token_balance(&self, address: Address) -> BotResult<u128>;

    /// Native balance, used for gas and the per-bet value
    async fn native_balance(&self, address: Address) -> BotResult<u128>;

    /// Token allowance granted by `owner` to `spender`
    async fn allowance(&self, owner: Address, spender: Address) -> BotResult<u128>;

    /// Send an `approve(spender, amount)` transaction
    async fn approve(&self, wallet: &Wallet, spender: Address, amount: u128) -> BotResult<B256>;

    /// Most recent game for `address`, `None` if it never played
    async fn last_game(&self, address: Address) -> BotResult<Option<GameRound>>;

    /// Sign and broadcast `bet(uint256[3])`, returning the transaction hash
    async fn submit_bet(&self, wallet: &Wallet, sub_amounts: [u128; 3]) -> BotResult<B256>;

    /// Block until the transaction is included (bounded by the implementation)
    async fn wait_for_receipt(&self, tx_hash: B256) -> BotResult<ReceiptStatus>;

    /// Address of the game contract (spender for approvals)
    fn contract_address(&self) -> Address;
}
