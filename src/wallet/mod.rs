//! Wallet handling for betting sessions
//!
//! A session's identity is a single local signing key plus its address.

mod credential;

pub use credential::{validate_private_key_format, Wallet};
