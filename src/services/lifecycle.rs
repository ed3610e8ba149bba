//! Transaction lifecycle for a single wager
//!
//! `Idle -> OrderingCheck -> Submitting -> AwaitingFulfillment -> {Resolved | TimedOut | Failed}`
//!
//! The contract fulfills one identity's games strictly in ascending id order,
//! so a new bet is only submitted once the previous game has been settled.
//! Once a bet is broadcast the round is committed: stop requests are ignored
//! until the round resolves or the settlement budget runs out.

use crate::config::{ChainConfig, LifecycleConfig};
use crate::errors::{BotError, BotResult};
use crate::services::gateway::ContractGateway;
use crate::services::retry::{with_retry, with_retry_or_stop};
use crate::session::StopSignal;
use crate::types::{GameRound, ReceiptStatus, RoundOutcome};
use crate::wallet::Wallet;
use alloy::primitives::Address;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Observable lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Idle,
    OrderingCheck,
    Submitting,
    AwaitingFulfillment,
    Resolved,
    TimedOut,
    Failed,
}

enum Settlement {
    Resolved(GameRound),
    TimedOut { game_id: Option<u64> },
}

/// Split a wager into 3 equal sub-bets; the remainder is not wagered
pub fn split_wager(amount: u128) -> BotResult<u128> {
    if amount < 3 {
        return Err(BotError::Validation(format!(
            "wager {} is too small to split across 3 dice",
            amount
        )));
    }
    Ok(amount / 3)
}

/// Drives one wager from ordering check to settlement
pub struct TransactionLifecycleManager {
    gateway: Arc<dyn ContractGateway>,
    config: LifecycleConfig,
    native_cost: u128,
    approval_required: bool,
    state: watch::Sender<LifecycleState>,
}

impl TransactionLifecycleManager {
    pub fn new(gateway: Arc<dyn ContractGateway>, config: LifecycleConfig, chain: &ChainConfig) -> Self {
        let (state, _rx) = watch::channel(LifecycleState::Idle);
        Self {
            gateway,
            config,
            native_cost: chain.max_native_cost(),
            approval_required: chain.approval_required,
            state,
        }
    }

    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    fn transition(&self, next: LifecycleState) {
        debug!("[Lifecycle] {:?} -> {:?}", self.state(), next);
        self.state.send_replace(next);
    }

    /// Run one wager of `bet_amount` to completion.
    ///
    /// Errors are returned only for rounds that never reached submission or
    /// whose transaction reverted. A broadcast bet always ends `Ok`, settled
    /// or timed out, even when its receipt could not be read.
    pub async fn execute(
        &self,
        wallet: &Wallet,
        bet_amount: u128,
        stop: &StopSignal,
    ) -> BotResult<RoundOutcome> {
        self.transition(LifecycleState::OrderingCheck);

        let result = self.run(wallet, bet_amount, stop).await;
        match &result {
            Ok(outcome) if outcome.timed_out => self.transition(LifecycleState::TimedOut),
            Ok(_) => self.transition(LifecycleState::Resolved),
            Err(e) => {
                warn!("[Lifecycle] Round failed: {}", e);
                self.transition(LifecycleState::Failed);
            }
        }
        result
    }

    async fn run(&self, wallet: &Wallet, bet_amount: u128, stop: &StopSignal) -> BotResult<RoundOutcome> {
        let address = wallet.address();
        let previous_id = self.await_ordering(address, stop).await?;

        self.transition(LifecycleState::Submitting);
        let sub_amount = split_wager(bet_amount)?;
        let wagered = sub_amount * 3;
        self.check_funds(address, wagered, stop).await?;

        if self.approval_required {
            self.ensure_allowance(wallet, wagered, stop).await?;
        }

        // Last point a stop can still prevent the bet
        if stop.is_stopped() {
            return Err(BotError::Cancelled);
        }
        let tx_hash = self.gateway.submit_bet(wallet, [sub_amount; 3]).await?;
        info!(
            "[Lifecycle] Submitted bet of {} ({} x 3) in {:?}",
            wagered, sub_amount, tx_hash
        );

        // From here on the wager is committed; only a revert discards the round
        match self.gateway.wait_for_receipt(tx_hash).await {
            Ok(ReceiptStatus::Reverted) => {
                return Err(BotError::TransactionReverted {
                    tx_hash: format!("{:?}", tx_hash),
                });
            }
            Ok(ReceiptStatus::Success) => {}
            Err(e) => warn!(
                "[Lifecycle] No receipt for {:?} ({}), watching for settlement instead",
                tx_hash, e
            ),
        }

        self.transition(LifecycleState::AwaitingFulfillment);
        if stop.is_stopped() {
            info!("[Lifecycle] Stop requested, finishing the committed round first");
        }

        match self.await_settlement(address, previous_id).await {
            Settlement::Resolved(round) => {
                info!(
                    "[Lifecycle] Game {} settled: dice {:?}, net {:+}",
                    round.game_id,
                    round.dice_results,
                    round.balance_change()
                );
                Ok(RoundOutcome::resolved(&round, bet_amount, wagered))
            }
            Settlement::TimedOut { game_id } => {
                let err = BotError::SettlementTimeout {
                    waited: self.config.settlement_timeout,
                };
                warn!("[Lifecycle] {}, recording placeholder", err);
                Ok(RoundOutcome::timed_out(game_id, bet_amount, wagered))
            }
        }
    }

    /// Wait until the identity has no unfulfilled game. Returns the last game id (0 if none).
    async fn await_ordering(&self, address: Address, stop: &StopSignal) -> BotResult<u64> {
        let started = Instant::now();

        loop {
            let last = with_retry_or_stop(&self.config.retry, "last_game", stop, || {
                self.gateway.last_game(address)
            })
            .await?;

            let pending = match last {
                None => return Ok(0),
                Some(game) if game.fulfilled => return Ok(game.game_id),
                Some(game) => game,
            };

            let waited = started.elapsed();
            if waited >= self.config.ordering_timeout {
                return Err(BotError::OrderingTimeout {
                    game_id: pending.game_id,
                    waited,
                });
            }

            debug!(
                "[Lifecycle] Game {} not fulfilled yet, waiting ({:?} elapsed)",
                pending.game_id, waited
            );
            if stop.sleep_or_stop(self.config.poll_interval).await {
                return Err(BotError::Cancelled);
            }
        }
    }

    async fn check_funds(&self, address: Address, wagered: u128, stop: &StopSignal) -> BotResult<()> {
        let token = with_retry_or_stop(&self.config.retry, "token_balance", stop, || {
            self.gateway.token_balance(address)
        })
        .await?;
        if token < wagered {
            return Err(BotError::InsufficientFunds {
                required: wagered,
                available: token,
            });
        }

        let native = with_retry_or_stop(&self.config.retry, "native_balance", stop, || {
            self.gateway.native_balance(address)
        })
        .await?;
        if native < self.native_cost {
            return Err(BotError::InsufficientFunds {
                required: self.native_cost,
                available: native,
            });
        }

        Ok(())
    }

    async fn ensure_allowance(&self, wallet: &Wallet, wagered: u128, stop: &StopSignal) -> BotResult<()> {
        let spender = self.gateway.contract_address();
        let allowance = with_retry_or_stop(&self.config.retry, "allowance", stop, || {
            self.gateway.allowance(wallet.address(), spender)
        })
        .await?;
        if allowance >= wagered {
            return Ok(());
        }

        info!("[Lifecycle] Allowance {} below {}, approving", allowance, wagered);
        let tx_hash = self.gateway.approve(wallet, spender, wagered).await?;
        if self.gateway.wait_for_receipt(tx_hash).await? == ReceiptStatus::Reverted {
            return Err(BotError::TransactionReverted {
                tx_hash: format!("{:?}", tx_hash),
            });
        }
        Ok(())
    }

    /// Poll until a game newer than `previous_id` is fulfilled or the budget runs out
    async fn await_settlement(&self, address: Address, previous_id: u64) -> Settlement {
        let deadline = Instant::now() + self.config.settlement_timeout;
        let mut seen_id = None;

        loop {
            match with_retry(&self.config.retry, "last_game", || {
                self.gateway.last_game(address)
            })
            .await
            {
                Ok(Some(game)) if game.game_id > previous_id => {
                    if game.fulfilled {
                        return Settlement::Resolved(game);
                    }
                    seen_id = Some(game.game_id);
                }
                Ok(_) => {}
                Err(e) => debug!("[Lifecycle] Settlement poll failed: {}", e),
            }

            if Instant::now() >= deadline {
                return Settlement::TimedOut { game_id: seen_id };
            }
            sleep(self.config.poll_interval).await;
        }
    }
}
