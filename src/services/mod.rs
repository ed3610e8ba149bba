//! Ledger-facing services: the contract gateway, retries and the bet lifecycle

pub mod gateway;
pub mod lifecycle;
pub mod retry;
pub mod rpc_gateway;

#[cfg(test)]
pub mod mock_gateway;

pub use gateway::ContractGateway;
pub use lifecycle::{LifecycleState, TransactionLifecycleManager};
pub use retry::{with_retry, with_retry_or_stop, RetryConfig};
pub use rpc_gateway::RpcGateway;
