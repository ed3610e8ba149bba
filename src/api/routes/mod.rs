//! API route handlers

pub mod sessions;
pub mod settings;

use crate::errors::BotError;
use crate::units::{format_bananas, format_native, format_signed_units, TOKEN_DECIMALS, TOKEN_DISPLAY_DP};
use axum::{http::StatusCode, Json};
use serde::Serialize;

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub type ApiError = (StatusCode, Json<ErrorResponse>);

/// Map a bot error to its HTTP status
pub fn api_error(err: BotError) -> ApiError {
    let status = match &err {
        BotError::UnknownIdentity(_) => StatusCode::NOT_FOUND,
        e if e.is_validation() => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

/// Raw smallest-unit amount alongside its display form
#[derive(Debug, Serialize)]
pub struct AmountDto {
    pub raw: String,
    pub formatted: String,
}

impl AmountDto {
    pub fn token(raw: u128) -> Self {
        Self {
            raw: raw.to_string(),
            formatted: format_bananas(raw),
        }
    }

    pub fn native(raw: u128) -> Self {
        Self {
            raw: raw.to_string(),
            formatted: format_native(raw),
        }
    }

    pub fn signed_token(raw: i128) -> Self {
        Self {
            raw: raw.to_string(),
            formatted: format_signed_units(raw, TOKEN_DECIMALS, TOKEN_DISPLAY_DP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_status_mapping() {
        assert_eq!(api_error(BotError::UnknownIdentity("a".into())).0, StatusCode::NOT_FOUND);
        assert_eq!(api_error(BotError::Validation("bad".into())).0, StatusCode::BAD_REQUEST);
        assert_eq!(api_error(BotError::MissingCredential).0, StatusCode::BAD_REQUEST);
        assert_eq!(
            api_error(BotError::TransientRpc("down".into())).0,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_amount_dto_keeps_raw_value() {
        let amount = AmountDto::token(1_500_000_000_000_000_000);
        assert_eq!(amount.raw, "1500000000000000000");
        assert_eq!(amount.formatted, "1.500");

        let loss = AmountDto::signed_token(-250_000_000_000_000_000);
        assert_eq!(loss.raw, "-250000000000000000");
        assert_eq!(loss.formatted, "-0.250");
    }
}
