//! Custom Axum Extractors
//!
//! Builds the call context of a request from its headers.

use std::sync::Arc;

use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use parley_types::{AccountId, Amount, CallContext};

use crate::error::ApiError;
use crate::state::AppState;

/// Identity making the call
pub const CALLER_HEADER: &str = "x-parley-caller";

/// Native value attached to the call, as a decimal string
pub const DEPOSIT_HEADER: &str = "x-parley-attached-deposit";

/// Call context of a mutating request
///
/// Rejects requests without a caller header or with an unparseable deposit.
#[derive(Debug, Clone)]
pub struct Caller(pub CallContext);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for Caller {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let caller = header(parts, CALLER_HEADER)?
            .filter(|v| !v.is_empty())
            .ok_or(ApiError::MissingHeader(CALLER_HEADER))?;

        let attached_deposit = match header(parts, DEPOSIT_HEADER)? {
            Some(raw) => Amount::parse_decimal(raw).map_err(|e| ApiError::InvalidHeader {
                name: DEPOSIT_HEADER,
                reason: e.to_string(),
            })?,
            None => Amount::zero(),
        };

        Ok(Caller(
            CallContext::new(AccountId::from(caller), state.contract.clone())
                .with_deposit(attached_deposit),
        ))
    }
}

fn header<'a>(parts: &'a Parts, name: &'static str) -> Result<Option<&'a str>, ApiError> {
    parts
        .headers
        .get(name)
        .map(|value| {
            value.to_str().map(str::trim).map_err(|_| ApiError::InvalidHeader {
                name,
                reason: "not visible ASCII".to_string(),
            })
        })
        .transpose()
}
