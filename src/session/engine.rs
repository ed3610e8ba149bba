//! Per-identity play loop
//!
//! One engine per identity. The strategy lock is held for a whole cycle, so
//! credential swaps and resets wait for the in-flight round to finish.

use super::signal::StopSignal;
use super::stats::{SessionPhase, SessionStats};
use crate::config::{Config, SessionConfig};
use crate::errors::{BotError, BotResult};
use crate::services::gateway::ContractGateway;
use crate::services::lifecycle::TransactionLifecycleManager;
use crate::services::retry::{with_retry, with_retry_or_stop, RetryConfig};
use crate::strategies::{is_bonus_pattern, StrategyState, WagerDecision, WagerSizer};
use crate::units::{format_bananas, format_signed_units, percent_of, TOKEN_DECIMALS, TOKEN_DISPLAY_DP};
use crate::wallet::Wallet;
use alloy::primitives::Address;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

/// What one cycle did, which decides the pause before the next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CycleResult {
    Played,
    Skipped,
}

/// State only touched while a cycle (or a reset) holds the lock
struct EngineCore {
    wallet: Option<Wallet>,
    strategy: StrategyState,
}

pub struct SessionEngine {
    identity: String,
    gateway: Arc<dyn ContractGateway>,
    sizer: WagerSizer,
    lifecycle: TransactionLifecycleManager,
    session: SessionConfig,
    retry: RetryConfig,
    core: Mutex<EngineCore>,
    stats: RwLock<SessionStats>,
}

impl SessionEngine {
    pub fn new(identity: impl Into<String>, gateway: Arc<dyn ContractGateway>, config: &Config) -> Self {
        let identity = identity.into();
        Self {
            lifecycle: TransactionLifecycleManager::new(
                gateway.clone(),
                config.lifecycle.clone(),
                &config.chain,
            ),
            gateway,
            sizer: WagerSizer::new(config.wager.clone()),
            session: config.session.clone(),
            retry: config.lifecycle.retry.clone(),
            core: Mutex::new(EngineCore {
                wallet: None,
                strategy: StrategyState::new(config.wager.max_tracked_rounds),
            }),
            stats: RwLock::new(SessionStats::new(identity.clone(), config.session.recent_rounds)),
            identity,
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Clone of the current statistics, with the live lifecycle state
    pub async fn snapshot(&self) -> SessionStats {
        let mut stats = self.stats.read().await.clone();
        stats.lifecycle_state = self.lifecycle.state();
        stats
    }

    pub async fn set_phase(&self, phase: SessionPhase) {
        self.stats.write().await.phase = phase;
    }

    /// Mark a stop request; the loop settles into `Stopped` once it observes it
    pub async fn mark_stopping(&self) {
        let mut stats = self.stats.write().await;
        if stats.is_running() {
            stats.phase = SessionPhase::Stopping;
        }
    }

    /// Play until `stop` fires. Only a missing credential ends the loop early.
    pub async fn run(&self, stop: StopSignal) -> BotResult<()> {
        {
            let mut stats = self.stats.write().await;
            if stats.phase == SessionPhase::Stopped {
                stats.phase = SessionPhase::Starting;
            }
        }
        info!("[Session] {} starting", self.identity);

        let result = self.play(&stop).await;

        {
            let mut stats = self.stats.write().await;
            if let Err(e) = &result {
                stats.last_error = Some(e.to_string());
            }
            stats.current_bet = None;
            stats.phase = SessionPhase::Stopped;
        }
        info!("[Session] {} stopped", self.identity);
        result
    }

    async fn play(&self, stop: &StopSignal) -> BotResult<()> {
        loop {
            match self.initialize().await {
                Ok(()) => break,
                Err(e) if e.is_validation() => {
                    warn!("[Session] {} cannot start: {}", self.identity, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("[Session] {} balance read failed at start: {}", self.identity, e);
                    self.stats.write().await.last_error = Some(e.to_string());
                    if stop.sleep_or_stop(self.session.error_cooldown).await {
                        return Ok(());
                    }
                }
            }
        }

        if stop.is_stopped() {
            return Ok(());
        }
        {
            let mut stats = self.stats.write().await;
            if stats.phase == SessionPhase::Starting {
                stats.phase = SessionPhase::Running;
            }
        }

        while !stop.is_stopped() {
            let pause = match self.run_cycle(stop).await {
                Ok(CycleResult::Played) => self.session.round_delay,
                Ok(CycleResult::Skipped) => self.session.skip_delay,
                Err(BotError::Cancelled) => break,
                Err(e) => {
                    warn!("[Session] {} cycle failed: {}", self.identity, e);
                    self.stats.write().await.record_failure(&e);
                    self.session.error_cooldown
                }
            };

            if stop.sleep_or_stop(pause).await {
                break;
            }
        }

        Ok(())
    }

    /// Take the session baseline from the current balances
    async fn initialize(&self) -> BotResult<()> {
        let mut core = self.core.lock().await;
        let address = core
            .wallet
            .as_ref()
            .ok_or(BotError::MissingCredential)?
            .address();

        let (token, native) = self.read_balances(address).await?;

        core.strategy.reset();
        core.strategy.observe_balance(token);

        let mut stats = self.stats.write().await;
        stats.rebaseline(token, native);
        stats.sync_strategy(&core.strategy);

        info!(
            "[Session] {} baseline {} BANANAS",
            self.identity,
            format_bananas(token)
        );
        Ok(())
    }

    async fn run_cycle(&self, stop: &StopSignal) -> BotResult<CycleResult> {
        let mut guard = self.core.lock().await;
        let core = &mut *guard;
        let wallet = core.wallet.as_ref().ok_or(BotError::MissingCredential)?;
        let address = wallet.address();

        let balance = with_retry_or_stop(&self.retry, "token_balance", stop, || {
            self.gateway.token_balance(address)
        })
        .await?;

        // Sizing may bootstrap the baseline; committed only once the round finishes
        let mut strategy = core.strategy.clone();
        strategy.observe_balance(balance);

        let plan = match self.sizer.compute_bet(balance, &mut strategy) {
            WagerDecision::Skip { balance, threshold } => {
                info!(
                    "[Session] {} balance {} below safety threshold {}, skipping",
                    self.identity,
                    format_bananas(balance),
                    format_bananas(threshold)
                );
                core.strategy = strategy;
                let mut stats = self.stats.write().await;
                stats.current_balance = balance;
                stats.sync_strategy(&core.strategy);
                return Ok(CycleResult::Skipped);
            }
            WagerDecision::Bet(plan) => plan,
        };

        {
            let mut stats = self.stats.write().await;
            stats.current_balance = balance;
            stats.current_bet = Some(plan.amount);
        }
        info!(
            "[Session] {} betting {} ({:.1}% of balance, base {}, x{:.3})",
            self.identity,
            format_bananas(plan.amount),
            percent_of(plan.amount, balance),
            format_bananas(plan.base_bet),
            plan.multipliers.product()
        );

        let outcome = self.lifecycle.execute(wallet, plan.amount, stop).await?;

        let bonus_pattern = outcome.dice_results.map(is_bonus_pattern).unwrap_or(false);
        strategy.record_round(&outcome, bonus_pattern);

        let (token, native) = match self.read_balances(address).await {
            Ok(balances) => balances,
            Err(e) => {
                warn!("[Session] {} post-round balance read failed: {}", self.identity, e);
                let estimated = (balance as i128 + outcome.balance_change).max(0) as u128;
                let native = self.stats.read().await.native_balance;
                (estimated, native)
            }
        };

        if outcome.timed_out {
            warn!(
                "[Session] {} round timed out, keeping base bet {:?}",
                self.identity, strategy.base_bet_amount
            );
        } else {
            strategy.observe_balance(token);
            let base = self.sizer.rebase(token, &mut strategy, bonus_pattern);
            debug!("[Session] {} next base bet {}", self.identity, base);
        }
        if bonus_pattern {
            info!("[Session] {} hit a bonus pattern", self.identity);
        }

        core.strategy = strategy;

        let mut stats = self.stats.write().await;
        stats.record_round(&outcome, bonus_pattern);
        stats.set_balances(token, native);
        stats.sync_strategy(&core.strategy);

        let summary = stats.recent_games.front().map(|g| g.to_string()).unwrap_or_default();
        info!(
            "[Session] {} {} | balance {} | profit {}",
            self.identity,
            summary,
            format_bananas(token),
            format_signed_units(stats.session_profit(), TOKEN_DECIMALS, TOKEN_DISPLAY_DP)
        );

        Ok(CycleResult::Played)
    }

    async fn read_balances(&self, address: Address) -> BotResult<(u128, u128)> {
        let token = with_retry(&self.retry, "token_balance", || {
            self.gateway.token_balance(address)
        })
        .await?;
        let native = with_retry(&self.retry, "native_balance", || {
            self.gateway.native_balance(address)
        })
        .await?;
        Ok((token, native))
    }

    /// Swap the credential, resetting strategy and statistics.
    ///
    /// Waits for any in-flight cycle. A failed balance read still installs the
    /// wallet; the baseline is taken again when the session starts.
    pub async fn update_wallet(&self, wallet: Wallet) {
        let mut core = self.core.lock().await;
        let address = wallet.address();
        core.wallet = Some(wallet);
        core.strategy.reset();

        let balances = self.read_balances(address).await;

        let mut stats = self.stats.write().await;
        stats.wallet_address = Some(address);
        match balances {
            Ok((token, native)) => {
                core.strategy.observe_balance(token);
                stats.rebaseline(token, native);
            }
            Err(e) => {
                warn!("[Session] {} balance read for new wallet failed: {}", self.identity, e);
                stats.rebaseline(0, 0);
                stats.last_error = Some(e.to_string());
            }
        }
        stats.sync_strategy(&core.strategy);

        info!("[Session] {} wallet set to {:?}", self.identity, address);
    }

    pub async fn has_wallet(&self) -> bool {
        self.core.lock().await.wallet.is_some()
    }

    /// Clear strategy state and counters, baselining at the last known balance
    pub async fn reset_stats(&self) {
        let mut core = self.core.lock().await;
        let mut stats = self.stats.write().await;

        let (balance, native) = (stats.current_balance, stats.native_balance);
        core.strategy.reset();
        core.strategy.observe_balance(balance);
        stats.rebaseline(balance, native);
        stats.sync_strategy(&core.strategy);

        info!("[Session] {} statistics reset", self.identity);
    }

    /// Read both balances into the snapshot without touching strategy state
    pub async fn refresh_balances(&self) -> BotResult<(u128, u128)> {
        let address = self
            .stats
            .read()
            .await
            .wallet_address
            .ok_or(BotError::MissingCredential)?;

        let (token, native) = self.read_balances(address).await?;
        self.stats.write().await.set_balances(token, native);
        Ok((token, native))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::lifecycle::LifecycleState;
    use crate::services::mock_gateway::{
        fulfilled_game, pending_game, test_wallet, MockGateway, OTHER_PRIVATE_KEY,
    };
    use std::time::Duration;
    use tokio::time::sleep;

    fn engine(gateway: Arc<MockGateway>) -> Arc<SessionEngine> {
        Arc::new(SessionEngine::new("alice", gateway, &Config::default()))
    }

    /// Run the loop in the background, stop it once `until` holds, and return the final stats
    async fn run_until<F>(engine: &Arc<SessionEngine>, until: F) -> SessionStats
    where
        F: Fn(&SessionStats) -> bool,
    {
        let stop = StopSignal::new();
        let task = {
            let engine = engine.clone();
            let stop = stop.clone();
            tokio::spawn(async move { engine.run(stop).await })
        };

        for _ in 0..1_000 {
            if until(&engine.snapshot().await) {
                break;
            }
            sleep(Duration::from_millis(500)).await;
        }
        stop.stop();
        task.await.unwrap().unwrap();
        engine.snapshot().await
    }

    #[tokio::test(start_paused = true)]
    async fn test_winning_round_rebases_from_new_balance() {
        let gateway = Arc::new(MockGateway::new(10_000));
        gateway
            .state()
            .settle_on_submit
            .push_back(fulfilled_game(1, 999, 1_499, [1, 2, 3]));
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stats = run_until(&engine, |s| s.total_games >= 1).await;

        // 10% of 10_000, split 333 x 3
        assert_eq!(gateway.state().submitted[0], [333, 333, 333]);
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.win_streak, 1);
        assert_eq!(stats.current_balance, 10_500);
        assert_eq!(stats.session_profit(), 500);
        // 10% of 10_500
        assert_eq!(stats.base_bet, Some(1_050));
        assert_eq!(stats.phase, SessionPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_without_wallet_fails() {
        let gateway = Arc::new(MockGateway::new(10_000));
        let engine = engine(gateway.clone());

        let err = engine.run(StopSignal::new()).await.unwrap_err();
        assert!(matches!(err, BotError::MissingCredential));
        let stats = engine.snapshot().await;
        assert_eq!(stats.phase, SessionPhase::Stopped);
        assert!(stats.last_error.is_some());
        assert_eq!(gateway.submissions(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_round_advances_loop() {
        let gateway = Arc::new(MockGateway::new(10_000));
        {
            let mut state = gateway.state();
            // Submitted round never settles
            state.settle_on_submit.push_back(pending_game(1));
        }
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stats = run_until(&engine, |s| s.timed_out_rounds >= 1).await;

        assert_eq!(stats.total_games, 1);
        assert_eq!(stats.timed_out_rounds, 1);
        assert_eq!(stats.total_losses, 1);
        assert_eq!(stats.loss_streak, 1);
        assert_eq!(stats.games_since_pattern, 1);
        // No rebase on the placeholder: base stays at the bootstrap value
        assert_eq!(stats.base_bet, Some(1_000));
        assert!(stats.recent_games[0].timed_out);
        assert_eq!(stats.lifecycle_state, LifecycleState::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_next_round_follows_a_timed_out_one() {
        let gateway = Arc::new(MockGateway::new(10_000));
        {
            let mut state = gateway.state();
            state.settle_on_submit.push_back(pending_game(1));
            state.settle_on_submit.push_back(fulfilled_game(2, 999, 0, [2, 2, 1]));
        }
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let oracle = gateway.clone();
        let stats = run_until(&engine, move |s| {
            if s.timed_out_rounds >= 1 {
                // Game 1 settles late, after its budget ran out
                let mut state = oracle.state();
                if state.last_game.as_ref().is_some_and(|g| !g.fulfilled) {
                    state.last_game = Some(fulfilled_game(1, 999, 0, [1, 1, 2]));
                }
            }
            s.total_games >= 2
        })
        .await;

        assert_eq!(gateway.submissions(), 2);
        assert_eq!(stats.total_games, 2);
        assert_eq!(stats.timed_out_rounds, 1);
        assert_eq!(stats.loss_streak, 2);
        assert_eq!(stats.recent_games[0].game_id, Some(2));
        assert!(!stats.recent_games[0].timed_out);
        assert!(stats.recent_games[1].timed_out);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_round_leaves_strategy_untouched() {
        let gateway = Arc::new(MockGateway::new(10_000));
        gateway.state().submit_error = Some(BotError::Rpc {
            code: -32000,
            message: "nonce too low".into(),
        });
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stats = run_until(&engine, |s| s.failed_rounds >= 2).await;

        assert!(stats.failed_rounds >= 2);
        assert_eq!(stats.total_games, 0);
        assert_eq!(stats.win_streak, 0);
        assert_eq!(stats.loss_streak, 0);
        assert_eq!(stats.games_since_pattern, 0);
        // Bootstrap never committed since no round finished
        assert_eq!(stats.base_bet, None);
        assert!(stats.last_error.unwrap().contains("nonce too low"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_low_balance_skips_without_submitting() {
        let gateway = Arc::new(MockGateway::new(500));
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stop = StopSignal::new();
        let task = {
            let engine = engine.clone();
            let stop = stop.clone();
            tokio::spawn(async move { engine.run(stop).await })
        };
        sleep(Duration::from_secs(35)).await;
        stop.stop();
        task.await.unwrap().unwrap();

        let stats = engine.snapshot().await;
        assert_eq!(gateway.submissions(), 0);
        assert_eq!(stats.total_games, 0);
        assert_eq!(stats.failed_rounds, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_rotation_resets_everything() {
        let gateway = Arc::new(MockGateway::new(10_000));
        {
            let mut state = gateway.state();
            state.settle_on_submit.push_back(fulfilled_game(1, 999, 0, [1, 1, 2]));
        }
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;
        let stats = run_until(&engine, |s| s.total_games >= 1).await;
        assert_eq!(stats.loss_streak, 1);

        gateway.state().token_balance = 4_000;
        let other = Wallet::from_private_key(OTHER_PRIVATE_KEY).unwrap();
        let other_address = other.address();
        engine.update_wallet(other).await;

        let stats = engine.snapshot().await;
        assert_eq!(stats.wallet_address, Some(other_address));
        assert_eq!(stats.total_games, 0);
        assert_eq!(stats.loss_streak, 0);
        assert_eq!(stats.games_since_pattern, 0);
        assert_eq!(stats.starting_balance, 4_000);
        assert_eq!(stats.all_time_high, 4_000);
        assert_eq!(stats.base_bet, None);
        assert!(stats.recent_games.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_wallet_swap_mid_round_waits_then_resets() {
        let gateway = Arc::new(MockGateway::new(10_000));
        let other = Wallet::from_private_key(OTHER_PRIVATE_KEY).unwrap();
        let other_address = other.address();
        {
            let mut state = gateway.state();
            state.settle_on_submit.push_back(fulfilled_game(1, 999, 1_499, [1, 2, 3]));
            state.settle_on_submit.push_back(fulfilled_game(2, 999, 1_499, [1, 2, 3]));
            // Third round stays in flight until the test settles it
            state.settle_on_submit.push_back(pending_game(3));
            state.address_balances.insert(other_address, 4_000);
        }
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stop = StopSignal::new();
        let task = {
            let engine = engine.clone();
            let stop = stop.clone();
            tokio::spawn(async move { engine.run(stop).await })
        };
        while gateway.submissions() < 3 {
            sleep(Duration::from_millis(500)).await;
        }

        let swap = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.update_wallet(other).await })
        };
        sleep(Duration::from_secs(4)).await;
        assert!(!swap.is_finished());
        let stats = engine.snapshot().await;
        assert_eq!(stats.win_streak, 2);
        assert_eq!(stats.lifecycle_state, LifecycleState::AwaitingFulfillment);

        stop.stop();
        {
            let mut state = gateway.state();
            state.last_game = Some(fulfilled_game(3, 999, 1_499, [1, 2, 3]));
            state.token_balance += 500;
        }
        swap.await.unwrap();
        task.await.unwrap().unwrap();

        let stats = engine.snapshot().await;
        assert_eq!(gateway.submissions(), 3);
        assert_eq!(stats.wallet_address, Some(other_address));
        assert_eq!(stats.total_games, 0);
        assert_eq!(stats.win_streak, 0);
        assert_eq!(stats.starting_balance, 4_000);
        assert_eq!(stats.current_balance, 4_000);
        assert_eq!(stats.all_time_high, 4_000);
        assert_eq!(stats.base_bet, None);
        assert!(stats.recent_games.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_post_round_balance_failure_uses_estimate() {
        let gateway = Arc::new(MockGateway::new(10_000));
        {
            let mut state = gateway.state();
            state.settle_on_submit.push_back(fulfilled_game(1, 999, 1_499, [1, 2, 3]));
            state
                .balance_errors_on_submit
                .push_back(BotError::Decode("garbled balance".into()));
        }
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stats = run_until(&engine, |s| s.total_games >= 1).await;

        assert_eq!(stats.failed_rounds, 0);
        assert_eq!(stats.total_wins, 1);
        assert_eq!(stats.win_streak, 1);
        // 10_000 before the round plus its +500
        assert_eq!(stats.current_balance, 10_500);
        assert_eq!(stats.base_bet, Some(1_050));
        assert!(gateway.state().balance_errors.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_round_finishes_the_round() {
        let gateway = Arc::new(MockGateway::new(10_000));
        {
            let mut state = gateway.state();
            state.last_game_script.push_back(Ok(None));
            for _ in 0..5 {
                state.last_game_script.push_back(Ok(Some(pending_game(1))));
            }
            state.settle_on_submit.push_back(fulfilled_game(1, 999, 1_998, [6, 5, 4]));
        }
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;

        let stop = StopSignal::new();
        let task = {
            let engine = engine.clone();
            let stop = stop.clone();
            tokio::spawn(async move { engine.run(stop).await })
        };

        sleep(Duration::from_secs(3)).await;
        assert_eq!(engine.snapshot().await.current_bet, Some(1_000));
        stop.stop();
        engine.mark_stopping().await;
        assert_eq!(engine.snapshot().await.phase, SessionPhase::Stopping);

        task.await.unwrap().unwrap();
        let stats = engine.snapshot().await;
        assert_eq!(stats.total_games, 1);
        assert_eq!(stats.total_wins, 1);
        // [6, 5, 4] is a bonus roll
        assert!(stats.recent_games[0].bonus_pattern);
        assert_eq!(stats.games_since_pattern, 0);
        assert_eq!(gateway.submissions(), 1);
        assert_eq!(stats.phase, SessionPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_stats_rebaselines_at_current_balance() {
        let gateway = Arc::new(MockGateway::new(10_000));
        gateway
            .state()
            .settle_on_submit
            .push_back(fulfilled_game(1, 999, 1_499, [1, 2, 3]));
        let engine = engine(gateway.clone());
        engine.update_wallet(test_wallet()).await;
        run_until(&engine, |s| s.total_games >= 1).await;

        engine.reset_stats().await;
        let stats = engine.snapshot().await;
        assert_eq!(stats.total_games, 0);
        assert_eq!(stats.win_streak, 0);
        assert_eq!(stats.starting_balance, 10_500);
        assert_eq!(stats.session_profit(), 0);
        assert_eq!(stats.base_bet, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_balances_updates_snapshot_only() {
        let gateway = Arc::new(MockGateway::new(10_000));
        let engine = engine(gateway.clone());
        assert!(matches!(
            engine.refresh_balances().await,
            Err(BotError::MissingCredential)
        ));

        engine.update_wallet(test_wallet()).await;
        gateway.state().token_balance = 12_000;
        let (token, _) = engine.refresh_balances().await.unwrap();
        assert_eq!(token, 12_000);

        let stats = engine.snapshot().await;
        assert_eq!(stats.current_balance, 12_000);
        assert_eq!(stats.starting_balance, 10_000);
        assert_eq!(stats.all_time_high, 10_000);
    }
}
