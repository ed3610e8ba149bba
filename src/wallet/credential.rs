//! Signing credential for one session, using alloy

use crate::errors::{BotError, BotResult};
use alloy::primitives::Address;
use alloy::signers::local::PrivateKeySigner;
use std::fmt;

/// Length of a `0x`-prefixed 32-byte hex private key
const PRIVATE_KEY_LEN: usize = 66;

/// Check the `0x` + 64 hex characters shape without touching the key material
pub fn validate_private_key_format(private_key: &str) -> BotResult<()> {
    let Some(hex_part) = private_key.strip_prefix("0x") else {
        return Err(BotError::Validation(
            "private key must start with 0x".to_string(),
        ));
    };

    if private_key.len() != PRIVATE_KEY_LEN {
        return Err(BotError::Validation(format!(
            "private key must be {} characters, got {}",
            PRIVATE_KEY_LEN,
            private_key.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(BotError::Validation(
            "private key must be hex encoded".to_string(),
        ));
    }

    Ok(())
}

/// Local signer and its derived address
#[derive(Clone)]
pub struct Wallet {
    signer: PrivateKeySigner,
}

impl Wallet {
    /// Validate the format, then parse the key (rejects e.g. zero or out-of-range scalars)
    pub fn from_private_key(private_key: &str) -> BotResult<Self> {
        validate_private_key_format(private_key)?;

        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| BotError::Validation(format!("invalid private key: {}", e)))?;

        Ok(Self { signer })
    }

    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn signer(&self) -> &PrivateKeySigner {
        &self.signer
    }

    /// Checksummed address string
    pub fn address_string(&self) -> String {
        self.address().to_checksum(None)
    }
}

// Never print key material
impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address())
            .finish_non_exhaustive()
    }
}
