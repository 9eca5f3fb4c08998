//! API Integration Tests
//!
//! Full request/response cycle against an in-memory backend.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use parley_api::{create_test_router, AppState};
use parley_crypto::{AuthorityKeypair, RefundVerifier};
use parley_escrow::{EscrowBackend, EscrowLedger, EventBus, MemoryBackend, PurchaseGate};
use parley_types::{Amount, Asset, EscrowPolicy, RefundMessage};
use serde_json::{json, Value};
use tower::ServiceExt;

const CONTRACT: &str = "parley.escrow";

struct TestApp {
    router: Router,
    authority: AuthorityKeypair,
}

async fn create_test_app() -> TestApp {
    let backend: Arc<dyn EscrowBackend> = Arc::new(MemoryBackend::new());
    backend
        .mint_genesis(&"alice".into(), Asset::Token, Amount(1_000_000_000))
        .await
        .unwrap();
    backend
        .mint_genesis(&CONTRACT.into(), Asset::Token, Amount(3_000_000))
        .await
        .unwrap();
    backend
        .mint_genesis(&"bob".into(), Asset::Native, EscrowPolicy::default().purchase_price)
        .await
        .unwrap();

    let authority = AuthorityKeypair::generate();
    let events = EventBus::new();
    let policy = EscrowPolicy::default();
    let ledger = EscrowLedger::new(
        backend.clone(),
        RefundVerifier::new(authority.public_key()),
        policy.clone(),
        events.clone(),
    );
    let gate = PurchaseGate::new(backend, policy, events);
    let state = Arc::new(AppState::new(ledger, gate, CONTRACT.into()));

    TestApp {
        router: create_test_router(state),
        authority,
    }
}

/// Make a request and get the JSON response
async fn json_request(
    router: &Router,
    method: &str,
    uri: &str,
    headers: &[(&str, &str)],
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json");
    for (name, value) in headers {
        request = request.header(*name, *value);
    }

    let body = match body {
        Some(json_body) => Body::from(serde_json::to_vec(&json_body).unwrap()),
        None => Body::empty(),
    };

    let response = router
        .clone()
        .oneshot(request.body(body).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(json!(null));

    (status, json)
}

async fn start(app: &TestApp, caller: &str, id: &str) -> (StatusCode, Value) {
    json_request(
        &app.router,
        "POST",
        "/v1/start_conversation",
        &[("x-parley-caller", caller)],
        Some(json!({ "conversation_id": id })),
    )
    .await
}

async fn view(app: &TestApp, id: &str) -> Value {
    let (status, json) = json_request(
        &app.router,
        "POST",
        "/v1/view_conversation",
        &[],
        Some(json!({ "conversation_id": id })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json
}

async fn refund(app: &TestApp, message: &str, signature: &[u8]) -> (StatusCode, Value) {
    json_request(
        &app.router,
        "POST",
        "/v1/refund",
        &[("x-parley-caller", "relayer")],
        Some(json!({ "refund_message": message, "signature": signature })),
    )
    .await
}

async fn token_balance(app: &TestApp, account: &str) -> String {
    let (status, json) = json_request(
        &app.router,
        "GET",
        &format!("/v1/accounts/{account}/balances"),
        &[],
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    json["token"].as_str().unwrap().to_string()
}

mod conversations {
    use super::*;

    #[tokio::test]
    async fn test_start_and_view() {
        let app = create_test_app().await;

        let (status, json) = start(&app, "alice", "c1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json, json!({ "conversation_id": "c1" }));

        assert_eq!(
            view(&app, "c1").await,
            json!({ "receiver_id": "alice", "amount": "200000000" })
        );
        assert_eq!(token_balance(&app, "alice").await, "800000000");
    }

    #[tokio::test]
    async fn test_view_missing_is_null() {
        let app = create_test_app().await;
        assert_eq!(view(&app, "nope").await, Value::Null);
        assert_eq!(view(&app, "").await, Value::Null);
    }

    #[tokio::test]
    async fn test_duplicate_is_conflict() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;

        let (status, json) = start(&app, "alice", "c1").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "DUPLICATE_RECORD");
        assert_eq!(token_balance(&app, "alice").await, "800000000");
    }

    #[tokio::test]
    async fn test_empty_id_is_bad_request() {
        let app = create_test_app().await;
        let (status, json) = start(&app, "alice", "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "MISSING_IDENTIFIER");
    }

    #[tokio::test]
    async fn test_missing_caller_header() {
        let app = create_test_app().await;
        let (status, json) = json_request(
            &app.router,
            "POST",
            "/v1/start_conversation",
            &[],
            Some(json!({ "conversation_id": "c1" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "MISSING_HEADER");
    }

    #[tokio::test]
    async fn test_unfunded_caller_is_unprocessable() {
        let app = create_test_app().await;
        let (status, json) = start(&app, "mallory", "c1").await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "ACCOUNT_NOT_FOUND");
        assert_eq!(view(&app, "c1").await, Value::Null);
    }
}

mod refunds {
    use super::*;

    #[tokio::test]
    async fn test_signed_refund_closes_conversation() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;

        let signed = app
            .authority
            .sign_refund(&RefundMessage::new("alice", Amount(200_000_000), "c1"));
        let (status, json) = refund(&app, &signed.refund_message, &signed.signature).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["refund_amount"], "200000000");
        assert_eq!(json["retained_amount"], "0");
        assert_eq!(view(&app, "c1").await, Value::Null);
        assert_eq!(token_balance(&app, "alice").await, "1000000000");
    }

    #[tokio::test]
    async fn test_bad_signature_is_unauthorized() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;

        let forged = AuthorityKeypair::generate()
            .sign_refund(&RefundMessage::new("alice", Amount(200_000_000), "c1"));
        let (status, json) = refund(&app, &forged.refund_message, &forged.signature).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(json["code"], "INVALID_SIGNATURE");
        assert!(view(&app, "c1").await.is_object());
    }

    #[tokio::test]
    async fn test_short_signature_is_unauthorized() {
        let app = create_test_app().await;
        let (status, _) = refund(&app, "{}", &[1, 2, 3]).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_conversation_is_not_found() {
        let app = create_test_app().await;
        let signed = app
            .authority
            .sign_refund(&RefundMessage::new("alice", Amount(1), "ghost"));
        let (status, json) = refund(&app, &signed.refund_message, &signed.signature).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "RECORD_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_over_refund_is_unprocessable() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;
        let signed = app
            .authority
            .sign_refund(&RefundMessage::new("alice", Amount(200_000_001), "c1"));
        let (status, json) = refund(&app, &signed.refund_message, &signed.signature).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "INSUFFICIENT_ESCROW");
    }

    #[tokio::test]
    async fn test_replay_is_conflict() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;
        let signed = app
            .authority
            .sign_refund(&RefundMessage::new("alice", Amount(200_000_000), "c1"));
        refund(&app, &signed.refund_message, &signed.signature).await;

        start(&app, "alice", "c1").await;
        let (status, json) = refund(&app, &signed.refund_message, &signed.signature).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["code"], "REFUND_ALREADY_APPLIED");
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let app = create_test_app().await;
        let (status, json) = json_request(
            &app.router,
            "POST",
            "/v1/refund",
            &[("x-parley-caller", "relayer")],
            Some(json!({ "refund_message": 7 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_REQUEST_BODY");
    }
}

mod purchases {
    use super::*;

    #[tokio::test]
    async fn test_exact_deposit_buys_tokens() {
        let app = create_test_app().await;
        let price = EscrowPolicy::default().purchase_price.to_string();

        let (status, json) = json_request(
            &app.router,
            "POST",
            "/v1/buy_tokens",
            &[("x-parley-caller", "bob"), ("x-parley-attached-deposit", &price)],
            None,
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["received"], "3000000");
        assert_eq!(token_balance(&app, "bob").await, "3000000");
    }

    #[tokio::test]
    async fn test_wrong_deposit_is_bad_request() {
        let app = create_test_app().await;
        let (status, json) = json_request(
            &app.router,
            "POST",
            "/v1/buy_tokens",
            &[("x-parley-caller", "bob"), ("x-parley-attached-deposit", "1")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INCORRECT_DEPOSIT");
        assert_eq!(token_balance(&app, "bob").await, "0");
    }

    #[tokio::test]
    async fn test_unparseable_deposit_header() {
        let app = create_test_app().await;
        let (status, json) = json_request(
            &app.router,
            "POST",
            "/v1/buy_tokens",
            &[("x-parley-caller", "bob"), ("x-parley-attached-deposit", "1e24")],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "INVALID_HEADER");
    }
}

mod observability {
    use super::*;

    #[tokio::test]
    async fn test_health() {
        let app = create_test_app().await;
        let (status, json) = json_request(&app.router, "GET", "/health", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["status"], "healthy");
        assert_eq!(json["backend"], "memory");
    }

    #[tokio::test]
    async fn test_events_newest_first() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;
        start(&app, "alice", "c2").await;

        let (status, json) =
            json_request(&app.router, "GET", "/v1/events?limit=1", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 1);
        assert_eq!(json["events"][0]["type"], "ConversationOpened");
        assert_eq!(json["events"][0]["conversation_id"], "c2");
    }

    #[tokio::test]
    async fn test_entries_follow_the_deposit() {
        let app = create_test_app().await;
        start(&app, "alice", "c1").await;

        let (status, json) = json_request(
            &app.router,
            "GET",
            "/v1/accounts/alice/entries",
            &[],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["account"], "alice");
        assert_eq!(json["count"], 2);
        assert_eq!(json["entries"][0]["entry_type"], "Debit");
        assert_eq!(json["entries"][0]["balance_after"], "800000000");
        assert_eq!(json["entries"][0]["reason"]["kind"], "escrow_lock");
        assert_eq!(json["entries"][0]["reason"]["conversation_id"], "c1");
        assert_eq!(json["entries"][1]["reason"]["kind"], "genesis");

        let (_, json) = json_request(
            &app.router,
            "GET",
            &format!("/v1/accounts/{CONTRACT}/entries?limit=1"),
            &[],
            None,
        )
        .await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["entries"][0]["entry_type"], "Credit");
        assert_eq!(json["entries"][0]["balance_after"], "203000000");
    }

    #[tokio::test]
    async fn test_entries_of_unknown_account_are_empty() {
        let app = create_test_app().await;
        let (status, json) =
            json_request(&app.router, "GET", "/v1/accounts/nobody/entries", &[], None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["count"], 0);
    }

    #[tokio::test]
    async fn test_entries_bad_limit() {
        let app = create_test_app().await;
        let (status, _) = json_request(
            &app.router,
            "GET",
            "/v1/accounts/alice/entries?limit=many",
            &[],
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
