//! Integration tests for the request executor and token refresh
//!
//! **Coverage:**
//! - 401 → refresh → re-send with the new token
//! - Refresh rejected: store cleared, `AuthError`, session ended once
//! - 401 on the re-sent request: store cleared, session ended, no refresh storm
//! - Concurrent 401s share a single refresh call
//! - Response parsing: malformed JSON, empty bodies, request id header

#[path = "support.rs"]
mod support;

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use mintflow_common::error::ErrorKind;
use mintflow_domain::constants::{ACCOUNTS_PATH, CONNECTIONS_PATH, ME_PATH, REFRESH_PATH};
use mintflow_infra::api::{
    CredentialStore, Credentials, InMemoryCredentialStore, RequestDescriptor, ResponseBody, SessionEndReason, SessionEvent,
};
use serde_json::json;
use support::{client_with_store, next_session_event, signed_in_store, token_body};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ============================================================================
// Refresh on 401
// ============================================================================

#[tokio::test]
async fn expired_token_is_refreshed_and_request_resent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .and(body_json(json!({"refresh_token": "r1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a2", Some("r2"))))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store("a1", "r1");
    let client = client_with_store(&server, store.clone());

    let response =
        client.api().executor().execute(&RequestDescriptor::get(ACCOUNTS_PATH)).await.unwrap();

    assert_eq!(response.status, 200);
    assert_eq!(response.body, ResponseBody::Json(json!([])));
    assert_eq!(store.get(), Credentials::new("a2", "r2"));
    assert_eq!(client.refresh_count(), 1);
}

#[tokio::test]
async fn refresh_without_rotation_keeps_refresh_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ME_PATH))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ME_PATH))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a2", None)))
        .mount(&server)
        .await;

    let store = signed_in_store("a1", "r1");
    let client = client_with_store(&server, store.clone());

    let response = client.api().executor().execute(&RequestDescriptor::get(ME_PATH)).await.unwrap();

    assert_eq!(response.body, ResponseBody::Empty);
    assert_eq!(store.get(), Credentials::new("a2", "r1"));
}

#[tokio::test]
async fn rejected_refresh_clears_credentials_and_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("refresh token revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store("a1", "r1");
    let client = client_with_store(&server, store.clone());
    let mut session = client.subscribe_session();

    let err =
        client.api().executor().execute(&RequestDescriptor::get(ACCOUNTS_PATH)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::AuthError);
    assert!(!err.retryable);
    assert!(err.requires_reauthentication());
    assert_eq!(store.get(), Credentials::default());

    match next_session_event(&mut session).await {
        SessionEvent::Ended { reason: SessionEndReason::RefreshFailed(cause) } => {
            assert_eq!(cause.http_status, Some(401));
        }
        other => panic!("expected refresh failure, got {other:?}"),
    }
}

#[tokio::test]
async fn second_401_after_refresh_ends_the_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_string("account locked"))
        .expect(5)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_body("a2", Some("r2"))))
        .expect(1)
        .mount(&server)
        .await;

    let store = signed_in_store("a1", "r1");
    let client = client_with_store(&server, store.clone());
    let mut session = client.subscribe_session();

    let err =
        client.api().executor().execute(&RequestDescriptor::get(ACCOUNTS_PATH)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::AuthError);
    assert_eq!(err.http_status, Some(401));
    assert!(err.requires_reauthentication());
    assert_eq!(store.get(), Credentials::default());
    match next_session_event(&mut session).await {
        SessionEvent::Ended { reason: SessionEndReason::Rejected(cause) } => {
            assert_eq!(cause.http_status, Some(401));
        }
        other => panic!("expected rejected session, got {other:?}"),
    }

    // Later calls go out without a token and never reach the refresh endpoint.
    for _ in 0..3 {
        let err = client
            .api()
            .executor()
            .execute(&RequestDescriptor::get(ACCOUNTS_PATH))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::AuthError);
    }
    assert_eq!(client.refresh_count(), 1);
    assert!(session.try_recv().is_err());
}

#[tokio::test]
async fn concurrent_401s_share_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(8)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(token_body("a2", Some("r2")))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, signed_in_store("a1", "r1"));
    let request = RequestDescriptor::get(ACCOUNTS_PATH);
    let executor = client.api().executor();

    let results = join_all((0..8).map(|_| executor.execute(&request))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(client.refresh_count(), 1);
}

#[tokio::test]
async fn missing_refresh_token_fails_without_network_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(InMemoryCredentialStore::with_credentials(Credentials {
        access_token: Some("a1".into()),
        refresh_token: None,
    }));
    let client = client_with_store(&server, store.clone());
    let mut session = client.subscribe_session();

    let err =
        client.api().executor().execute(&RequestDescriptor::get(ACCOUNTS_PATH)).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::AuthError);
    assert!(!store.get().is_authenticated());
    assert_eq!(
        next_session_event(&mut session).await,
        SessionEvent::Ended { reason: SessionEndReason::MissingRefreshToken }
    );
}

// ============================================================================
// Response handling
// ============================================================================

#[tokio::test]
async fn malformed_json_is_a_non_retryable_server_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CONNECTIONS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_raw("{not json", "application/json"))
        .mount(&server)
        .await;

    let client = client_with_store(&server, signed_in_store("a1", "r1"));

    let err = client
        .api()
        .executor()
        .execute(&RequestDescriptor::get(CONNECTIONS_PATH))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ServerError);
    assert!(!err.retryable);
    assert_eq!(err.http_status, None);
}

#[tokio::test]
async fn server_errors_are_classified_retryable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(CONNECTIONS_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, signed_in_store("a1", "r1"));

    let err = client
        .api()
        .executor()
        .execute(&RequestDescriptor::get(CONNECTIONS_PATH))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::ServerError);
    assert!(err.retryable);
    assert_eq!(err.http_status, Some(503));
    assert!(err.message.contains("maintenance"));
}

#[tokio::test]
async fn every_request_carries_a_request_id() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .and(header_exists("X-Request-ID"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("ok", "text/plain"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, signed_in_store("a1", "r1"));

    let response =
        client.api().executor().execute(&RequestDescriptor::get(ACCOUNTS_PATH)).await.unwrap();
    assert_eq!(response.body, ResponseBody::Text("ok".into()));
}

#[tokio::test]
async fn unauthenticated_requests_skip_the_bearer_header() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .and(header_exists("authorization"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(ACCOUNTS_PATH))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_with_store(&server, signed_in_store("a1", "r1"));

    let err = client
        .api()
        .executor()
        .execute(&RequestDescriptor::get(ACCOUNTS_PATH).unauthenticated())
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::AuthError);
    assert_eq!(client.refresh_count(), 0);
}
