//! End-to-end tests for the delegated-provider strategy.
//!
//! The identity provider is a `wiremock` server; the API runs in-process.

use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use driphub_api::db::UserStore;
use driphub_core::Email;
use driphub_integration_tests::{TEST_ANON_KEY, TestServer, body_json, closed_port_url};

/// Provider whose "who am I" endpoint answers `status` with `body`.
async fn provider_verifying(status: u16, body: Value) -> MockServer {
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/auth/v1/user"))
        .and(header("apikey", TEST_ANON_KEY))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&provider)
        .await;
    provider
}

#[tokio::test]
async fn test_rejected_token_is_invalid_credential_and_inserts_nothing() {
    let provider = provider_verifying(401, json!({"msg": "invalid JWT"})).await;
    let (server, store) = TestServer::delegated(&provider.uri()).await;

    let resp = server.get("/api/users/me", Some("forged")).await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(resp).await["message"], "Invalid credentials");
    assert!(store.is_empty());
    assert_eq!(store.insert_count(), 0);
}

#[tokio::test]
async fn test_accepted_token_for_new_email_creates_one_row() {
    let provider =
        provider_verifying(200, json!({"id": "remote-1", "email": "new@x.com"})).await;
    let (server, store) = TestServer::delegated(&provider.uri()).await;

    let resp = server.get("/api/users/me", Some("good")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let me = body_json(resp).await;

    let row = store
        .find_by_email(&Email::parse("new@x.com").expect("valid email"))
        .await
        .expect("store lookup")
        .expect("shadow row exists");

    assert_eq!(store.len(), 1);
    assert_eq!(me["id"], json!(row.id.as_i32()));
    assert_eq!(me["email"], "new@x.com");
    assert_eq!(me["auth_method"], "delegated");
    assert!(!row.has_password());

    // A second request reuses the row.
    let again = body_json(server.get("/api/users/me", Some("good")).await).await;
    assert_eq!(again["id"], me["id"]);
    assert_eq!(store.insert_count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_first_sight_resolves_to_one_row() {
    let provider =
        provider_verifying(200, json!({"id": "remote-2", "email": "race@x.com"})).await;
    let (server, store) = TestServer::delegated(&provider.uri()).await;

    let requests = (0..8).map(|_| {
        let client = server.client.clone();
        let url = server.url("/api/users/me");
        tokio::spawn(async move {
            client
                .get(url)
                .bearer_auth("good")
                .send()
                .await
                .expect("request failed")
        })
    });

    let mut ids = Vec::new();
    for handle in requests.collect::<Vec<_>>() {
        let resp = handle.await.expect("task panicked");
        assert_eq!(resp.status(), StatusCode::OK);
        ids.push(body_json(resp).await["id"].clone());
    }

    assert!(ids.iter().all(|id| *id == ids[0]), "{ids:?}");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_provider_response_without_email_is_bad_gateway() {
    let provider = provider_verifying(200, json!({"id": "remote-3"})).await;
    let (server, store) = TestServer::delegated(&provider.uri()).await;

    let resp = server.get("/api/users/me", Some("good")).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_unreachable_provider_is_upstream_error_not_invalid_token() {
    let (server, store) = TestServer::delegated(&closed_port_url()).await;

    let resp = server.get("/api/users/me", Some("any")).await;

    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(
        body_json(resp).await["message"],
        "Identity provider unavailable"
    );
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_register_without_session_creates_shadow_user() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": "remote-4", "email": "a@x.com"})),
        )
        .expect(1)
        .mount(&provider)
        .await;
    let (server, store) = TestServer::delegated(&provider.uri()).await;

    let resp = server
        .post_json(
            "/api/auth/register",
            &json!({"email": "a@x.com", "password": "secret1"}),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["access_token"], Value::Null);
    assert_eq!(body["message"], "account created; sign in to continue");
    assert_eq!(body["user"]["email"], "a@x.com");
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_register_refused_by_provider() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/signup"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"msg": "User already registered"})),
        )
        .mount(&provider)
        .await;
    let (server, store) = TestServer::delegated(&provider.uri()).await;

    let resp = server
        .post_json(
            "/api/auth/register",
            &json!({"email": "a@x.com", "password": "secret1"}),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(resp).await["message"], "User already registered");
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_login_returns_provider_session_token() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .and(query_param("grant_type", "password"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            json!({"access_token": "provider-session", "token_type": "bearer"}),
        ))
        .mount(&provider)
        .await;
    let (server, _store) = TestServer::delegated(&provider.uri()).await;

    let resp = server
        .post_json(
            "/api/auth/login",
            &json!({"username": "a@x.com", "password": "secret1"}),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["access_token"], "provider-session");
    assert_eq!(body["token_type"], "bearer");
}

#[tokio::test]
async fn test_login_refused_by_provider() {
    let provider = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/auth/v1/token"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"error": "invalid_grant"})),
        )
        .mount(&provider)
        .await;
    let (server, _store) = TestServer::delegated(&provider.uri()).await;

    let resp = server
        .post_json(
            "/api/auth/login",
            &json!({"email": "a@x.com", "password": "wrong"}),
        )
        .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_provider_health_endpoint() {
    let provider = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&provider)
        .await;
    let (server, _store) = TestServer::delegated(&provider.uri()).await;

    let resp = server.get("/health/provider", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let report = body_json(resp).await;
    assert_eq!(report["reachable"], true);
    assert_eq!(report["path"], "/health");
    assert_eq!(report["status_code"], 200);

    let (down, _store) = TestServer::delegated(&closed_port_url()).await;
    assert_eq!(
        down.get("/health/provider", None).await.status(),
        StatusCode::SERVICE_UNAVAILABLE
    );
}
