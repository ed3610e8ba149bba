//! Error taxonomy for the betting loop
//!
//! Every failure the core can hit is classified here so callers can decide
//! between retrying, skipping a cycle, or surfacing the error.

use std::time::Duration;
use thiserror::Error;

/// Structured bot error types
#[derive(Debug, Clone, Error)]
pub enum BotError {
    /// Malformed credential or settings, rejected before any side effect
    #[error("validation failed: {0}")]
    Validation(String),

    /// Balance below what the wager (or its gas) needs
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds { required: u128, available: u128 },

    /// Network/node hiccup (timeout, connection reset, 5xx, rate limit)
    #[error("transient RPC error: {0}")]
    TransientRpc(String),

    /// Node answered with a JSON-RPC error object
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    /// Node answered with something we could not decode
    #[error("failed to decode node response: {0}")]
    Decode(String),

    /// An older game stayed unfulfilled past the ordering budget
    #[error("game {game_id} still unfulfilled after {waited:?}")]
    OrderingTimeout { game_id: u64, waited: Duration },

    /// The submitted game was not settled within the settlement budget
    #[error("settlement not observed after {waited:?}")]
    SettlementTimeout { waited: Duration },

    /// Broadcast transaction never showed a receipt
    #[error("no receipt for transaction {tx_hash}")]
    ReceiptTimeout { tx_hash: String },

    /// Transaction was included but reverted on-chain
    #[error("transaction {tx_hash} reverted")]
    TransactionReverted { tx_hash: String },

    /// Stop was requested before anything was submitted
    #[error("cancelled before submission")]
    Cancelled,

    /// Session has no wallet configured
    #[error("no wallet configured for this session")]
    MissingCredential,

    /// Registry lookup miss
    #[error("unknown identity: {0}")]
    UnknownIdentity(String),
}

impl BotError {
    /// Classify a reqwest failure as transient
    pub fn from_network_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            BotError::TransientRpc("request timed out".to_string())
        } else if err.is_connect() {
            BotError::TransientRpc("connection failed".to_string())
        } else if err.is_decode() {
            BotError::Decode(err.to_string())
        } else {
            BotError::TransientRpc(err.to_string())
        }
    }

    /// Classify a JSON-RPC error object returned by the node
    pub fn from_rpc_error(code: i64, message: &str) -> Self {
        let msg_lower = message.to_lowercase();

        // -32005 is the conventional "limit exceeded" code
        if code == -32005
            || msg_lower.contains("rate limit")
            || msg_lower.contains("too many requests")
            || msg_lower.contains("timeout")
            || msg_lower.contains("busy")
        {
            return BotError::TransientRpc(format!("{} ({})", message, code));
        }

        BotError::Rpc {
            code,
            message: message.to_string(),
        }
    }

    /// Whether this error is retryable with exponential backoff
    pub fn is_retryable(&self) -> bool {
        matches!(self, BotError::TransientRpc(_))
    }

    /// Whether the node reported a contract revert during a read
    pub fn is_revert(&self) -> bool {
        match self {
            BotError::Rpc { code, message } => *code == 3 || message.to_lowercase().contains("revert"),
            _ => false,
        }
    }

    /// Whether the error belongs to the caller (bad input) rather than the system
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            BotError::Validation(_) | BotError::MissingCredential | BotError::UnknownIdentity(_)
        )
    }
}

pub type BotResult<T> = std::result::Result<T, BotError>;
