//! Conversation Handlers
//!
//! Opening and viewing escrowed conversations.

use std::sync::Arc;

use axum::{extract::rejection::JsonRejection, extract::State, Json};

use crate::dto::{ConversationRequest, ConversationResponse, ConversationView};
use crate::error::ApiResult;
use crate::extractors::Caller;
use crate::state::AppState;

/// Open a conversation, escrowing the deposit from the caller
pub async fn start_conversation(
    State(state): State<Arc<AppState>>,
    Caller(ctx): Caller,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> ApiResult<Json<ConversationResponse>> {
    let Json(request) = payload?;
    let conversation_id = state.ledger.open(&ctx, &request.conversation_id).await?;

    Ok(Json(ConversationResponse {
        conversation_id: conversation_id.into_inner(),
    }))
}

/// Read a conversation record; `null` when there is none
pub async fn view_conversation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ConversationRequest>, JsonRejection>,
) -> ApiResult<Json<Option<ConversationView>>> {
    let Json(request) = payload?;
    let record = state.ledger.view(&request.conversation_id).await?;
    Ok(Json(record.map(ConversationView::from)))
}
