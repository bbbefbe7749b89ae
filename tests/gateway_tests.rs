mod common;

use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{case_json, client, client_with, login_json, options, user_json};
use lexcrm_client::auth::session::mint_demo_tokens;
use lexcrm_client::prelude::*;
use lexcrm_storage::{keys, KeyValueStore};

fn page_json(items: Vec<serde_json::Value>) -> serde_json::Value {
    let total = items.len();
    json!({ "items": items, "total": total, "page": 1, "size": 10, "pages": 1 })
}

async fn login(mock_server: &MockServer, crm: &LexCrm, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(mock_server)
        .await;
    crm.auth()
        .login(&LoginCredentials::new("olena@example.com", "secret"))
        .await
        .unwrap();
}

async fn expect_event(crm_events: &mut tokio::sync::broadcast::Receiver<AuthEvent>, expected: AuthEvent) {
    let event = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let event = crm_events.recv().await.unwrap();
            if event == expected {
                return event;
            }
        }
    })
    .await
    .expect("event not received");
    assert_eq!(event, expected);
}

#[tokio::test]
async fn test_bearer_token_is_attached() {
    let mock_server = MockServer::start().await;
    let (crm, _) = client(&mock_server.uri());
    login(&mock_server, &crm, login_json("live-access", "live-refresh", "olena@example.com")).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cases"))
        .and(header("authorization", "Bearer live-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![case_json(1, "Lease dispute")])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let page = crm.cases().list(&PageParams::default()).await.unwrap();
    assert!(page.is_live());
    assert_eq!(page.data().items[0].title, "Lease dispute");
}

#[tokio::test]
async fn test_unauthorized_request_is_refreshed_and_replayed_once() {
    let mock_server = MockServer::start().await;
    let (crm, store) = client(&mock_server.uri());
    login(&mock_server, &crm, login_json("stale-access", "live-refresh", "olena@example.com")).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cases/7"))
        .and(header("authorization", "Bearer stale-access"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .and(header("authorization", "Bearer live-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "refresh_token": "rotated-refresh",
            "expires_in": 1800
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cases/7"))
        .and(header("authorization", "Bearer fresh-access"))
        .respond_with(ResponseTemplate::new(200).set_body_json(case_json(7, "Inheritance claim")))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut events = crm.auth().subscribe();
    let case = crm.cases().get(7).await.unwrap();

    assert!(case.is_live());
    assert_eq!(case.data().title, "Inheritance claim");
    assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), Some("fresh-access".to_string()));
    assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), Some("rotated-refresh".to_string()));
    expect_event(&mut events, AuthEvent::TokenRefreshed).await;
}

#[tokio::test]
async fn test_failed_refresh_clears_session_and_redirects() {
    let mock_server = MockServer::start().await;
    let (crm, store) = client(&mock_server.uri());
    login(&mock_server, &crm, login_json("stale-access", "dead-refresh", "olena@example.com")).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/cases"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&mock_server)
        .await;

    let mut events = crm.auth().subscribe();
    let err = crm.cases().list(&PageParams::default()).await.unwrap_err();

    assert_eq!(err.status(), Some(401));
    assert_eq!(err.to_string(), "Unauthorized");
    assert!(!crm.auth().is_authenticated());
    for key in keys::SESSION_KEYS {
        assert_eq!(store.get(key).unwrap(), None);
    }
    expect_event(
        &mut events,
        AuthEvent::SessionExpired {
            redirect_to: "/login".to_string(),
        },
    )
    .await;
}

#[tokio::test]
async fn test_missing_refresh_token_expires_session() {
    let mock_server = MockServer::start().await;
    let (crm, _) = client_with(options(&mock_server.uri()).with_login_path("/signin"));
    login(
        &mock_server,
        &crm,
        json!({ "access_token": "only-access", "user": user_json("olena@example.com") }),
    )
    .await;

    Mock::given(method("GET"))
        .and(path("/api/v1/tasks"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&mock_server)
        .await;

    let mut events = crm.auth().subscribe();
    assert!(crm.tasks().list(&PageParams::default()).await.is_err());
    assert!(crm.auth().session().is_none());
    expect_event(
        &mut events,
        AuthEvent::SessionExpired {
            redirect_to: "/signin".to_string(),
        },
    )
    .await;
}

#[tokio::test]
async fn test_second_unauthorized_is_not_retried() {
    let mock_server = MockServer::start().await;
    let (crm, _) = client(&mock_server.uri());
    login(&mock_server, &crm, login_json("live-access", "live-refresh", "olena@example.com")).await;

    Mock::given(method("GET"))
        .and(path("/api/v1/invoices"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "next-access"})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let err = crm.invoices().list(&PageParams::default()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Authentication));
}

#[tokio::test]
async fn test_error_messages_prefer_server_detail() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/clients/404"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v1/clients"))
        .respond_with(ResponseTemplate::new(422).set_body_json(json!({
            "detail": [
                {"loc": ["body", "name"], "msg": "field required", "type": "value_error.missing"}
            ]
        })))
        .mount(&mock_server)
        .await;

    let (crm, _) = client(&mock_server.uri());

    let err = crm.clients().get(404).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::NotFound));
    assert_eq!(err.to_string(), "Resource not found");

    let err = crm.clients().create(&ClientDraft::default()).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Validation));
    assert_eq!(err.to_string(), "field required");
}

#[tokio::test]
async fn test_error_messages_default_to_ukrainian() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cases/stats/status"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock_server)
        .await;

    let (crm, _) = client_with(options(&mock_server.uri()).with_language(Language::Uk));
    let err = crm.cases().status_stats().await.unwrap_err();

    assert_eq!(err.kind(), Some(ErrorKind::Server));
    assert_eq!(err.to_string(), "Внутрішня помилка сервера");
}

#[tokio::test]
async fn test_demo_session_never_reaches_the_backend() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cases"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(vec![])))
        .expect(0)
        .mount(&mock_server)
        .await;

    let (crm, store) = client(&mock_server.uri());
    let (access, refresh) = mint_demo_tokens(chrono::Utc::now());
    store.set(keys::ACCESS_TOKEN, &access).unwrap();
    store.set(keys::REFRESH_TOKEN, &refresh).unwrap();
    store.set(keys::USER, &user_json("x@y.com").to_string()).unwrap();
    crm.auth().restore().await.unwrap();

    let page = crm.cases().list(&PageParams::default()).await.unwrap();
    assert!(page.is_demo());
    assert_eq!(page.data().total, 3);
}

#[tokio::test]
async fn test_stored_language_selects_error_messages() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/cases/1"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&mock_server)
        .await;

    let (crm, _) = client_with(options(&mock_server.uri()).with_language(Language::Uk));
    let err = crm.cases().get(1).await.unwrap_err();
    assert_eq!(err.to_string(), "Доступ заборонено");

    crm.preferences().set_language(Language::En).unwrap();
    let err = crm.cases().get(1).await.unwrap_err();
    assert_eq!(err.kind(), Some(ErrorKind::Authorization));
    assert_eq!(err.to_string(), "Access denied");
}
