//! Effective strategy and chain settings

use super::AmountDto;
use crate::api::server::AppState;
use crate::config::Config;
use axum::{extract::State, Json};
use serde::Serialize;

/// Settings DTO for frontend
#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub contract_address: String,
    pub chain_id: u64,
    pub gas_price_wei: String,
    pub gas_limit: u64,
    pub bet_value: AmountDto,
    pub min_bet: AmountDto,
    pub safety_threshold: AmountDto,
    pub min_bet_pct: f64,
    pub max_bet_pct: f64,
    pub win_rate: f64,
    pub recovery_rate: f64,
    pub chase_threshold: u32,
    pub chase_multiplier: f64,
    pub win_sensitivity: f64,
    pub loss_sensitivity: f64,
    pub max_tracked_rounds: usize,
    pub pattern_win_boost: f64,
    pub settlement_timeout_secs: u64,
    pub round_delay_ms: u64,
}

impl From<&Config> for SettingsResponse {
    fn from(c: &Config) -> Self {
        Self {
            contract_address: c.chain.contract_address.to_checksum(None),
            chain_id: c.chain.chain_id,
            gas_price_wei: c.chain.gas_price.to_string(),
            gas_limit: c.chain.gas_limit,
            bet_value: AmountDto::native(c.chain.bet_value),
            min_bet: AmountDto::token(c.wager.min_bet),
            safety_threshold: AmountDto::token(c.wager.safety_threshold),
            min_bet_pct: c.wager.min_bet_pct,
            max_bet_pct: c.wager.max_bet_pct,
            win_rate: c.wager.win_rate,
            recovery_rate: c.wager.recovery_rate,
            chase_threshold: c.wager.chase_threshold,
            chase_multiplier: c.wager.chase_multiplier,
            win_sensitivity: c.wager.win_sensitivity,
            loss_sensitivity: c.wager.loss_sensitivity,
            max_tracked_rounds: c.wager.max_tracked_rounds,
            pattern_win_boost: c.wager.pattern_win_boost,
            settlement_timeout_secs: c.lifecycle.settlement_timeout.as_secs(),
            round_delay_ms: c.session.round_delay.as_millis() as u64,
        }
    }
}

pub async fn get_settings(State(state): State<AppState>) -> Json<SettingsResponse> {
    Json(SettingsResponse::from(state.registry.config()))
}
