//! Scripted in-memory gateway for tests

use crate::errors::{BotError, BotResult};
use crate::services::gateway::ContractGateway;
use crate::session::StopSignal;
use crate::types::{DiceRoll, GameRound, ReceiptStatus};
use crate::wallet::Wallet;
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::sleep;

pub const TEST_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
pub const OTHER_PRIVATE_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

pub fn test_wallet() -> Wallet {
    Wallet::from_private_key(TEST_PRIVATE_KEY).unwrap()
}

pub fn fulfilled_game(game_id: u64, total_bet: u128, total_winnings: u128, dice: DiceRoll) -> GameRound {
    GameRound {
        game_id,
        fulfilled: true,
        total_bet,
        total_winnings,
        bet_amounts: vec![total_bet / 3; 3],
        dice_results: Some(dice),
    }
}

pub fn pending_game(game_id: u64) -> GameRound {
    GameRound {
        game_id,
        fulfilled: false,
        total_bet: 0,
        total_winnings: 0,
        bet_amounts: vec![],
        dice_results: None,
    }
}

/// Mutable mock state, inspected and scripted by tests
#[derive(Debug)]
pub struct MockState {
    pub token_balance: u128,
    pub native_balance: u128,
    pub allowance: u128,
    /// Returned by `last_game` once `last_game_script` is drained
    pub last_game: Option<GameRound>,
    /// One entry per `last_game` call, consumed front first
    pub last_game_script: VecDeque<BotResult<Option<GameRound>>>,
    /// Results applied on successive `submit_bet` calls: the round becomes
    /// `last_game` and the token balance moves by its net result
    pub settle_on_submit: VecDeque<GameRound>,
    /// Failures for the next token balance reads
    pub balance_errors: VecDeque<BotError>,
    /// Moved into `balance_errors` when a bet is submitted
    pub balance_errors_on_submit: VecDeque<BotError>,
    /// Per-address token balances, overriding `token_balance`
    pub address_balances: HashMap<Address, u128>,
    /// Latency added to every token balance read
    pub balance_delay: Option<Duration>,
    pub submit_error: Option<BotError>,
    pub receipt: ReceiptStatus,
    /// Returned by every `wait_for_receipt` call when set
    pub receipt_error: Option<BotError>,
    /// Fired from inside `approve`, while the approval is in flight
    pub stop_on_approve: Option<StopSignal>,
    pub submitted: Vec<[u128; 3]>,
    pub approvals: Vec<u128>,
    pub last_game_calls: usize,
}

pub struct MockGateway {
    state: Mutex<MockState>,
}

impl MockGateway {
    pub fn new(token_balance: u128) -> Self {
        Self {
            state: Mutex::new(MockState {
                token_balance,
                native_balance: 10u128.pow(18),
                allowance: u128::MAX,
                last_game: None,
                last_game_script: VecDeque::new(),
                settle_on_submit: VecDeque::new(),
                balance_errors: VecDeque::new(),
                balance_errors_on_submit: VecDeque::new(),
                address_balances: HashMap::new(),
                balance_delay: None,
                submit_error: None,
                receipt: ReceiptStatus::Success,
                receipt_error: None,
                stop_on_approve: None,
                submitted: Vec::new(),
                approvals: Vec::new(),
                last_game_calls: 0,
            }),
        }
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn submissions(&self) -> usize {
        self.state().submitted.len()
    }
}

#[async_trait]
impl ContractGateway for MockGateway {
    async fn token_balance(&self, address: Address) -> BotResult<u128> {
        let delay = self.state().balance_delay;
        if let Some(delay) = delay {
            sleep(delay).await;
        }
        let mut state = self.state();
        if let Some(err) = state.balance_errors.pop_front() {
            return Err(err);
        }
        Ok(state
            .address_balances
            .get(&address)
            .copied()
            .unwrap_or(state.token_balance))
    }

    async fn native_balance(&self, _address: Address) -> BotResult<u128> {
        Ok(self.state().native_balance)
    }

    async fn allowance(&self, _owner: Address, _spender: Address) -> BotResult<u128> {
        Ok(self.state().allowance)
    }

    async fn approve(&self, _wallet: &Wallet, _spender: Address, amount: u128) -> BotResult<B256> {
        let mut state = self.state();
        state.approvals.push(amount);
        state.allowance = amount;
        if let Some(stop) = &state.stop_on_approve {
            stop.stop();
        }
        Ok(B256::repeat_byte(0xaa))
    }

    async fn last_game(&self, _address: Address) -> BotResult<Option<GameRound>> {
        let mut state = self.state();
        state.last_game_calls += 1;
        match state.last_game_script.pop_front() {
            Some(result) => result,
            None => Ok(state.last_game.clone()),
        }
    }

    async fn submit_bet(&self, _wallet: &Wallet, sub_amounts: [u128; 3]) -> BotResult<B256> {
        let mut state = self.state();
        if let Some(err) = state.submit_error.clone() {
            return Err(err);
        }
        state.submitted.push(sub_amounts);
        let failures = std::mem::take(&mut state.balance_errors_on_submit);
        state.balance_errors.extend(failures);

        if let Some(round) = state.settle_on_submit.pop_front() {
            let balance = state.token_balance as i128 + round.balance_change();
            state.token_balance = balance.max(0) as u128;
            state.last_game = Some(round);
        }
        Ok(B256::repeat_byte(state.submitted.len() as u8))
    }

    async fn wait_for_receipt(&self, _tx_hash: B256) -> BotResult<ReceiptStatus> {
        let state = self.state();
        match &state.receipt_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.receipt),
        }
    }

    fn contract_address(&self) -> Address {
        Address::repeat_byte(0x40)
    }
}
