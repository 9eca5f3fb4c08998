//! Refund Handler

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};
use parley_crypto::SignedRefund;
use parley_types::RefundReceipt;

use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

/// Apply a refund signed by the refund authority
///
/// The body carries the exact signed string and the 64 signature bytes:
/// `{"refund_message": "...", "signature": [..]}`.
pub async fn refund(
    State(state): State<Arc<AppState>>,
    Caller(ctx): Caller,
    payload: Result<Json<SignedRefund>, JsonRejection>,
) -> ApiResult<Json<RefundReceipt>> {
    let Json(signed) = payload?;
    let receipt = state
        .ledger
        .refund(&ctx, &signed.refund_message, &signed.signature)
        .await?;
    Ok(Json(receipt))
}
