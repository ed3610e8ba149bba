//! Session control and stats endpoints

use super::{api_error, AmountDto, ApiError};
use crate::api::server::AppState;
use crate::services::LifecycleState;
use crate::session::{SessionPhase, SessionStats, StartStatus, StopStatus};
use crate::types::GameSummary;
use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
pub struct PrivateKeyRequest {
    pub private_key: String,
}

#[derive(Debug, Serialize)]
pub struct PrivateKeyResponse {
    pub success: bool,
    pub address: String,
}

#[derive(Debug, Serialize)]
pub struct IdentitiesResponse {
    pub identities: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub status: StartStatus,
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub status: StopStatus,
}

#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct BalancesResponse {
    pub token_balance: AmountDto,
    pub native_balance: AmountDto,
}

/// Recent round DTO for frontend
#[derive(Debug, Serialize)]
pub struct GameSummaryDto {
    pub game_id: Option<u64>,
    pub time: String,
    pub dice: Option<[u8; 3]>,
    pub won: bool,
    pub amount: AmountDto,
    pub balance_change: AmountDto,
    pub bonus_pattern: bool,
    pub timed_out: bool,
}

impl From<&GameSummary> for GameSummaryDto {
    fn from(g: &GameSummary) -> Self {
        Self {
            game_id: g.game_id,
            time: g.time.format("%H:%M:%S").to_string(),
            dice: g.dice,
            won: g.won,
            amount: AmountDto::token(g.amount),
            balance_change: AmountDto::signed_token(g.balance_change),
            bonus_pattern: g.bonus_pattern,
            timed_out: g.timed_out,
        }
    }
}

/// Stats DTO for frontend
#[derive(Debug, Serialize)]
pub struct SessionStatsDto {
    pub identity: String,
    pub wallet_address: Option<String>,
    pub phase: SessionPhase,
    pub running: bool,
    pub current_balance: AmountDto,
    pub starting_balance: AmountDto,
    pub native_balance: AmountDto,
    pub session_profit: AmountDto,
    pub all_time_high: AmountDto,
    pub win_streak: u32,
    pub loss_streak: u32,
    pub games_since_pattern: u32,
    pub total_games: u64,
    pub total_wins: u64,
    pub total_losses: u64,
    pub timed_out_rounds: u64,
    pub failed_rounds: u64,
    pub win_rate: f64,
    pub recent_games: Vec<GameSummaryDto>,
    pub current_bet: Option<AmountDto>,
    pub base_bet: Option<AmountDto>,
    pub lifecycle_state: LifecycleState,
    pub last_error: Option<String>,
    pub last_update: String,
}

impl From<SessionStats> for SessionStatsDto {
    fn from(s: SessionStats) -> Self {
        Self {
            running: s.is_running(),
            session_profit: AmountDto::signed_token(s.session_profit()),
            win_rate: s.win_rate(),
            wallet_address: s.wallet_address.map(|a| a.to_checksum(None)),
            current_balance: AmountDto::token(s.current_balance),
            starting_balance: AmountDto::token(s.starting_balance),
            native_balance: AmountDto::native(s.native_balance),
            all_time_high: AmountDto::token(s.all_time_high),
            win_streak: s.win_streak,
            loss_streak: s.loss_streak,
            games_since_pattern: s.games_since_pattern,
            total_games: s.total_games,
            total_wins: s.total_wins,
            total_losses: s.total_losses,
            timed_out_rounds: s.timed_out_rounds,
            failed_rounds: s.failed_rounds,
            recent_games: s.recent_games.iter().map(GameSummaryDto::from).collect(),
            current_bet: s.current_bet.map(AmountDto::token),
            base_bet: s.base_bet.map(AmountDto::token),
            lifecycle_state: s.lifecycle_state,
            last_error: s.last_error,
            last_update: s.last_update.to_rfc3339(),
            phase: s.phase,
            identity: s.identity,
        }
    }
}

/// List known identities
pub async fn list_sessions(State(state): State<AppState>) -> Json<IdentitiesResponse> {
    Json(IdentitiesResponse {
        identities: state.registry.identities().await,
    })
}

/// Current stats for one identity
pub async fn get_stats(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<SessionStatsDto>, ApiError> {
    let stats = state.registry.snapshot(&identity).await.map_err(api_error)?;
    Ok(Json(stats.into()))
}

/// Install or rotate the signing key for an identity
pub async fn set_private_key(
    State(state): State<AppState>,
    Path(identity): Path<String>,
    Json(req): Json<PrivateKeyRequest>,
) -> Result<Json<PrivateKeyResponse>, ApiError> {
    let address = state
        .registry
        .update_credential(&identity, &req.private_key)
        .await
        .map_err(api_error)?;

    Ok(Json(PrivateKeyResponse {
        success: true,
        address: address.to_checksum(None),
    }))
}

pub async fn start_session(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<StartResponse>, ApiError> {
    let status = state.registry.start(&identity).await.map_err(api_error)?;
    Ok(Json(StartResponse { status }))
}

pub async fn stop_session(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<StopResponse>, ApiError> {
    let status = state.registry.stop(&identity).await.map_err(api_error)?;
    Ok(Json(StopResponse { status }))
}

pub async fn reset_stats(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.registry.reset_stats(&identity).await.map_err(api_error)?;
    Ok(Json(SuccessResponse { success: true }))
}

pub async fn refresh_balances(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<BalancesResponse>, ApiError> {
    let (token, native) = state
        .registry
        .refresh_balances(&identity)
        .await
        .map_err(api_error)?;

    Ok(Json(BalancesResponse {
        token_balance: AmountDto::token(token),
        native_balance: AmountDto::native(native),
    }))
}

/// Stop and forget a session
pub async fn delete_session(
    State(state): State<AppState>,
    Path(identity): Path<String>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state.registry.evict(&identity).await.map_err(api_error)?;
    Ok(Json(SuccessResponse { success: true }))
}
