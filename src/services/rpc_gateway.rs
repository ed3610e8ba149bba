//! JSON-RPC implementation of the contract gateway
//!
//! Talks to the node over plain HTTP JSON-RPC. Calldata is ABI-encoded with
//! alloy's `sol!` bindings and transactions are signed locally as legacy
//! (fixed gas price) transactions, then broadcast with
//! `eth_sendRawTransaction`.

use crate::config::ChainConfig;
use crate::errors::{BotError, BotResult};
use crate::services::gateway::ContractGateway;
use crate::types::{DiceRoll, GameRound, ReceiptStatus};
use crate::wallet::Wallet;
use alloy::consensus::{SignableTransaction, TxEnvelope, TxLegacy};
use alloy::eips::eip2718::Encodable2718;
use alloy::network::TxSignerSync;
use alloy::primitives::{Address, Bytes, TxKind, B256, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// Interval between receipt polls
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(1);

// Dice game contract surface (game and token live in one contract)
sol! {
    struct GameRoundInfo {
        bool fulfilled;
        address user;
        uint256 totalBet;
        uint256 totalWinnings;
        uint256[] betAmts;
        uint256[] diceRollResult;
    }

    function bet(uint256[] _betAmts) external payable;

    function balanceOf(address account) external view returns (uint256);

    function allowance(address owner, address spender) external view returns (uint256);

    function approve(address spender, uint256 amount) external;

    function getUserLastGameInfo(address user) external view returns (uint256 id, GameRoundInfo round);
}

/// JSON-RPC request
#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: serde_json::Value,
    id: u64,
}

/// JSON-RPC response
#[derive(Debug, Deserialize)]
struct JsonRpcResponse<T> {
    result: Option<T>,
    error: Option<JsonRpcErrorObject>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorObject {
    code: i64,
    message: String,
}

/// The only receipt field we care about
#[derive(Debug, Deserialize)]
struct ReceiptJson {
    status: Option<String>,
}

/// Gateway backed by a JSON-RPC node
pub struct RpcGateway {
    client: reqwest::Client,
    chain: ChainConfig,
    receipt_timeout: Duration,
    next_id: AtomicU64,
}

impl RpcGateway {
    pub fn new(chain: ChainConfig, receipt_timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(chain.request_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            chain,
            receipt_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    /// Send one JSON-RPC request. `Ok(None)` means the node returned `null`.
    async fn request_optional<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> BotResult<Option<T>> {
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
        };

        let response = self
            .client
            .post(&self.chain.rpc_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| BotError::from_network_error(&e))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(BotError::TransientRpc(format!("{} returned HTTP {}", method, status)));
        }

        let parsed: JsonRpcResponse<T> = response
            .json()
            .await
            .map_err(|e| BotError::Decode(format!("{}: {}", method, e)))?;

        if let Some(error) = parsed.error {
            return Err(BotError::from_rpc_error(error.code, &error.message));
        }

        Ok(parsed.result)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> BotResult<T> {
        self.request_optional(method, params)
            .await?
            .ok_or_else(|| BotError::Decode(format!("{} returned no result", method)))
    }

    /// `eth_call` against the game contract at the latest block
    async fn eth_call(&self, calldata: Vec<u8>) -> BotResult<Vec<u8>> {
        let params = serde_json::json!([
            {
                "to": format!("{:?}", self.chain.contract_address),
                "data": format!("0x{}", hex::encode(calldata)),
            },
            "latest"
        ]);

        let result: String = self.request("eth_call", params).await?;
        hex::decode(result.trim_start_matches("0x"))
            .map_err(|e| BotError::Decode(format!("eth_call result is not hex: {}", e)))
    }

    /// Sign a legacy transaction to the game contract and broadcast it
    async fn send_transaction(&self, wallet: &Wallet, value: u128, input: Vec<u8>) -> BotResult<B256> {
        let nonce_hex: String = self
            .request(
                "eth_getTransactionCount",
                serde_json::json!([format!("{:?}", wallet.address()), "pending"]),
            )
            .await?;
        let nonce = u64::try_from(parse_quantity(&nonce_hex)?)
            .map_err(|_| BotError::Decode(format!("nonce out of range: {}", nonce_hex)))?;

        let mut tx = TxLegacy {
            chain_id: Some(self.chain.chain_id),
            nonce,
            gas_price: self.chain.gas_price,
            gas_limit: self.chain.gas_limit,
            to: TxKind::Call(self.chain.contract_address),
            value: U256::from(value),
            input: Bytes::from(input),
        };

        let signature = wallet
            .signer()
            .sign_transaction_sync(&mut tx)
            .map_err(|e| BotError::Validation(format!("failed to sign transaction: {}", e)))?;

        let envelope = TxEnvelope::Legacy(tx.into_signed(signature));
        let raw = format!("0x{}", hex::encode(envelope.encoded_2718()));

        let hash: String = self
            .request("eth_sendRawTransaction", serde_json::json!([raw]))
            .await?;

        debug!("[Gateway] Broadcast tx {} with nonce {}", hash, nonce);

        B256::from_str(&hash).map_err(|e| BotError::Decode(format!("bad tx hash {}: {}", hash, e)))
    }
}

#[async_trait]
impl ContractGateway for RpcGateway {
    async fn token_balance(&self, address: Address) -> BotResult<u128> {
        let call = balanceOfCall { account: address };
        let data = self.eth_call(call.abi_encode()).await?;
        let balance = balanceOfCall::abi_decode_returns(&data)
            .map_err(|e| BotError::Decode(format!("balanceOf: {}", e)))?;
        Ok(u256_to_u128(balance))
    }

    async fn native_balance(&self, address: Address) -> BotResult<u128> {
        let balance: String = self
            .request(
                "eth_getBalance",
                serde_json::json!([format!("{:?}", address), "latest"]),
            )
            .await?;
        parse_quantity(&balance)
    }

    async fn allowance(&self, owner: Address, spender: Address) -> BotResult<u128> {
        let call = allowanceCall { owner, spender };
        let data = self.eth_call(call.abi_encode()).await?;
        let allowance = allowanceCall::abi_decode_returns(&data)
            .map_err(|e| BotError::Decode(format!("allowance: {}", e)))?;
        Ok(u256_to_u128(allowance))
    }

    async fn approve(&self, wallet: &Wallet, spender: Address, amount: u128) -> BotResult<B256> {
        info!("[Gateway] Approving {:?} for {} units", spender, amount);
        let call = approveCall {
            spender,
            amount: U256::from(amount),
        };
        self.send_transaction(wallet, 0, call.abi_encode()).await
    }

    async fn last_game(&self, address: Address) -> BotResult<Option<GameRound>> {
        let call = getUserLastGameInfoCall { user: address };
        let data = match self.eth_call(call.abi_encode()).await {
            Ok(data) => data,
            // The contract reverts for users without games
            Err(e) if e.is_revert() => return Ok(None),
            Err(e) => return Err(e),
        };

        let info = getUserLastGameInfoCall::abi_decode_returns(&data)
            .map_err(|e| BotError::Decode(format!("getUserLastGameInfo: {}", e)))?;

        let game_id = u64::try_from(info.id)
            .map_err(|_| BotError::Decode(format!("game id out of range: {}", info.id)))?;
        if game_id == 0 {
            return Ok(None);
        }

        round_from_abi(game_id, &info.round).map(Some)
    }

    async fn submit_bet(&self, wallet: &Wallet, sub_amounts: [u128; 3]) -> BotResult<B256> {
        let call = betCall {
            _betAmts: sub_amounts.iter().map(|a| U256::from(*a)).collect(),
        };
        self.send_transaction(wallet, self.chain.bet_value, call.abi_encode())
            .await
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> BotResult<ReceiptStatus> {
        let deadline = Instant::now() + self.receipt_timeout;
        let params = serde_json::json!([format!("{:?}", tx_hash)]);

        loop {
            match self
                .request_optional::<ReceiptJson>("eth_getTransactionReceipt", params.clone())
                .await
            {
                Ok(Some(receipt)) => {
                    let status = match receipt.status.as_deref() {
                        Some("0x1") => ReceiptStatus::Success,
                        _ => ReceiptStatus::Reverted,
                    };
                    return Ok(status);
                }
                Ok(None) => {}
                Err(e) if e.is_retryable() => {
                    debug!("[Gateway] Receipt poll for {:?} failed: {}", tx_hash, e);
                }
                Err(e) => return Err(e),
            }

            if Instant::now() >= deadline {
                warn!("[Gateway] No receipt for {:?} after {:?}", tx_hash, self.receipt_timeout);
                return Err(BotError::ReceiptTimeout {
                    tx_hash: format!("{:?}", tx_hash),
                });
            }
            sleep(RECEIPT_POLL_INTERVAL).await;
        }
    }

    fn contract_address(&self) -> Address {
        self.chain.contract_address
    }
}

/// Convert the ABI round struct, validating dice once fulfilled
fn round_from_abi(game_id: u64, round: &GameRoundInfo) -> BotResult<GameRound> {
    let dice_results = if round.fulfilled {
        Some(decode_dice(&round.diceRollResult)?)
    } else {
        None
    };

    Ok(GameRound {
        game_id,
        fulfilled: round.fulfilled,
        total_bet: u256_to_u128(round.totalBet),
        total_winnings: u256_to_u128(round.totalWinnings),
        bet_amounts: round.betAmts.iter().map(|a| u256_to_u128(*a)).collect(),
        dice_results,
    })
}

fn decode_dice(values: &[U256]) -> BotResult<DiceRoll> {
    if values.len() != 3 {
        return Err(BotError::Decode(format!(
            "expected 3 dice results, got {}",
            values.len()
        )));
    }

    let mut dice = [0u8; 3];
    for (slot, value) in dice.iter_mut().zip(values) {
        let face = u8::try_from(*value).unwrap_or(0);
        if !(1..=6).contains(&face) {
            return Err(BotError::Decode(format!("dice value out of range: {}", value)));
        }
        *slot = face;
    }
    Ok(dice)
}

/// Parse a `0x` hex quantity
fn parse_quantity(hex_str: &str) -> BotResult<u128> {
    let digits = hex_str.trim_start_matches("0x");
    if digits.is_empty() {
        return Ok(0);
    }
    U256::from_str_radix(digits, 16)
        .map(u256_to_u128)
        .map_err(|e| BotError::Decode(format!("bad quantity {}: {}", hex_str, e)))
}

/// Amounts beyond u128 are not realistic for this token; saturate instead of failing
fn u256_to_u128(value: U256) -> u128 {
    u128::try_from(value).unwrap_or(u128::MAX)
}
