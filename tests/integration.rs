//! Gateway + refresh flow against a mock API.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio_test::assert_ok;
use url::Url;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opslink::auth::{
    Credential, HttpRefreshBackend, MemoryCredentialCache, RefreshCoordinator, SessionSupervisor,
    TokenStore,
};
use opslink::errors::{ClientError, RefreshError};
use opslink::gateway::{RequestDescriptor, RequestGateway};

fn auth_payload(token: &str) -> serde_json::Value {
    json!({
        "user": {
            "id": "u1",
            "name": "Jane Op",
            "email": "jane@example.com",
            "role": "admin"
        },
        "accessToken": token
    })
}

struct Harness {
    gateway: Arc<RequestGateway>,
    tokens: Arc<TokenStore>,
    session: Arc<SessionSupervisor>,
}

fn harness(server: &MockServer, initial_token: &str) -> Harness {
    let base = Url::parse(&format!("{}/", server.uri())).unwrap();
    let http = reqwest::Client::new();

    let tokens = Arc::new(TokenStore::new(Box::new(MemoryCredentialCache::default())));
    tokens.set(Credential::new(initial_token));
    let session = Arc::new(SessionSupervisor::new(Arc::clone(&tokens)));
    let refresh = Arc::new(RefreshCoordinator::new(
        Box::new(HttpRefreshBackend::new(
            http.clone(),
            base.join("auth/refresh").unwrap(),
        )),
        Arc::clone(&tokens),
        Arc::clone(&session),
    ));
    let gateway = Arc::new(RequestGateway::new(
        http,
        base,
        Arc::clone(&tokens),
        refresh,
    ));

    Harness {
        gateway,
        tokens,
        session,
    }
}

#[tokio::test]
async fn attaches_bearer_credential() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(header("authorization", "Bearer tok-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "tok-1");
    let resp = h
        .gateway
        .send(&RequestDescriptor::get("indicators"))
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn expired_credential_is_refreshed_and_replayed_once() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_payload("fresh")))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "stale");
    let resp = h
        .gateway
        .send(&RequestDescriptor::get("indicators"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    // the refreshed credential replaced the stale one
    assert_eq!(h.tokens.get().unwrap().as_str(), "fresh");
    // and the caller never saw the 401
    assert!(h.session.is_authenticated());
}

#[tokio::test]
async fn second_rejection_after_replay_is_terminal() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indicators"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2) // original + exactly one replay, never more
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_payload("fresh")))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "stale");
    let err = h
        .gateway
        .send(&RequestDescriptor::get("indicators"))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::AuthExpired));
}

#[tokio::test]
async fn failed_refresh_forces_logout_and_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indicators"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "stale");
    let err = h
        .gateway
        .send(&RequestDescriptor::get("indicators"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Refresh(RefreshError::Rejected(401))
    ));

    assert!(h.tokens.get().is_none());
    assert!(!h.session.is_authenticated());

    // a later call must not trigger a second refresh attempt
    let err = h
        .gateway
        .send(&RequestDescriptor::get("indicators"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Refresh(RefreshError::SessionEnded)
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_expiries_share_a_single_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(header("authorization", "Bearer stale"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/indicators"))
        .and(header("authorization", "Bearer fresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    // slow refresh keeps every concurrent 401 inside the single-flight window
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(auth_payload("fresh"))
                .set_delay(Duration::from_millis(400)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(&server, "stale");
    let mut handles = Vec::new();
    for _ in 0..5 {
        let gateway = Arc::clone(&h.gateway);
        handles.push(tokio::spawn(async move {
            gateway.send(&RequestDescriptor::get("indicators")).await
        }));
    }
    for handle in handles {
        let resp = handle.await.unwrap().unwrap();
        assert_eq!(resp.status(), 200);
    }
    assert_eq!(h.tokens.get().unwrap().as_str(), "fresh");
}

#[tokio::test]
async fn non_auth_failures_pass_through_without_refresh() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/scores"))
        .respond_with(ResponseTemplate::new(422).set_body_string("score out of range"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(auth_payload("fresh")))
        .expect(0)
        .mount(&server)
        .await;

    let h = harness(&server, "tok-1");

    let err = h
        .gateway
        .send(&RequestDescriptor::post("scores").with_body(json!({ "value": 999 })))
        .await
        .unwrap_err();
    match err {
        ClientError::Validation { status, message } => {
            assert_eq!(status, 422);
            assert_eq!(message, "score out of range");
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    let err = h
        .gateway
        .send(&RequestDescriptor::get("categories"))
        .await
        .unwrap_err();
    match err {
        ClientError::Upstream { status, .. } => assert_eq!(status, 503),
        other => panic!("expected upstream error, got {:?}", other),
    }

    // both calls kept the original credential
    assert_eq!(h.tokens.get().unwrap().as_str(), "tok-1");
}

#[tokio::test]
async fn json_decoding_via_send_json() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{"id": 1, "name": "deploys"}])),
        )
        .mount(&server)
        .await;

    let h = harness(&server, "tok-1");
    let categories: Vec<serde_json::Value> =
        assert_ok!(h.gateway.send_json(&RequestDescriptor::get("categories")).await);
    assert_eq!(categories[0]["name"], "deploys");
}
