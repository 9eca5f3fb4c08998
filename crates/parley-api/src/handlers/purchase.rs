//! Purchase Handler

use std::sync::Arc;

use axum::{extract::State, Json};
use parley_types::PurchaseReceipt;

use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

/// Buy tokens with the deposit attached in `x-parley-attached-deposit`
pub async fn buy_tokens(
    State(state): State<Arc<AppState>>,
    Caller(ctx): Caller,
) -> ApiResult<Json<PurchaseReceipt>> {
    let receipt = state.gate.buy(&ctx).await?;
    Ok(Json(receipt))
}
