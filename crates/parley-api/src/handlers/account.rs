//! Account and Event Handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    Json,
};
use parley_types::{AccountId, Asset};

use crate::dto::{BalancesResponse, EntriesQuery, EntriesResponse, EventsQuery, EventsResponse};
use crate::error::ApiResult;
use crate::state::AppState;

const DEFAULT_EVENT_LIMIT: usize = 50;
const MAX_EVENT_LIMIT: usize = 1024;
const DEFAULT_ENTRY_LIMIT: usize = 50;
const MAX_ENTRY_LIMIT: usize = 1024;

/// Native and token balances of an account
pub async fn get_balances(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
) -> ApiResult<Json<BalancesResponse>> {
    let account = AccountId::from(account);
    let native = state.ledger.balance(&account, Asset::Native).await?;
    let token = state.ledger.balance(&account, Asset::Token).await?;

    Ok(Json(BalancesResponse {
        account,
        native,
        token,
    }))
}

/// Ledger journal of an account, newest first
pub async fn get_entries(
    State(state): State<Arc<AppState>>,
    Path(account): Path<String>,
    query: Result<Query<EntriesQuery>, QueryRejection>,
) -> ApiResult<Json<EntriesResponse>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_ENTRY_LIMIT)
        .min(MAX_ENTRY_LIMIT);

    let account = AccountId::from(account);
    let entries = state.ledger.entries(&account, limit).await?;
    Ok(Json(EntriesResponse {
        account,
        count: entries.len(),
        entries,
    }))
}

/// Most recent escrow events, newest first
pub async fn get_events(
    State(state): State<Arc<AppState>>,
    query: Result<Query<EventsQuery>, QueryRejection>,
) -> ApiResult<Json<EventsResponse>> {
    let Query(query) = query?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EVENT_LIMIT)
        .min(MAX_EVENT_LIMIT);

    let events = state.events().recent(limit).await;
    Ok(Json(EventsResponse {
        count: events.len(),
        events,
    }))
}
