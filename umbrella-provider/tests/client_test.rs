// Integration tests for `UmbrellaClient` using wiremock.

use serde_json::json;
use wiremock::matchers::{
    basic_auth, bearer_token, body_string_contains, header, method, path, query_param,
};
use wiremock::{Mock, MockServer, ResponseTemplate};

use umbrella_provider::client::PAGE_LIMIT;
use umbrella_provider::{Error, UmbrellaClient, UmbrellaConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn mount_token(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/v2/token"))
        .and(basic_auth("key", "secret"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "tok-1",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn setup() -> (MockServer, UmbrellaClient) {
    let server = MockServer::start().await;
    let config = UmbrellaConfig::new("key", "secret")
        .with_org_id("2400000")
        .with_base_url(server.uri());
    let client = UmbrellaClient::new(&config).unwrap();
    (server, client)
}

// ── Authentication ──────────────────────────────────────────────────

#[tokio::test]
async fn test_token_is_reused_across_requests() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/deployments/v2/sites/7"))
        .and(bearer_token("tok-1"))
        .and(header("X-Umbrella-OrgId", "2400000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"siteId": 7})))
        .expect(2)
        .mount(&server)
        .await;

    let first = client.get("/deployments/v2/sites/7").await.unwrap();
    let second = client.get("/deployments/v2/sites/7").await.unwrap();
    assert_eq!(first["siteId"], 7);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_rejected_credentials() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/auth/v2/token"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "invalid_client"})),
        )
        .mount(&server)
        .await;

    let err = client.get("/deployments/v2/sites").await.unwrap_err();
    match err {
        Error::Authentication { message } => assert_eq!(message, "invalid_client"),
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unauthorized_clears_cached_token() {
    let (server, client) = setup().await;
    mount_token(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/admin/v2/users"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "expired"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/admin/v2/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    assert!(matches!(
        client.get("/admin/v2/users").await,
        Err(Error::Authentication { .. })
    ));
    assert_eq!(client.get("/admin/v2/users").await.unwrap(), json!([]));
}

// ── Error mapping ───────────────────────────────────────────────────

#[tokio::test]
async fn test_not_found() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/deployments/v2/networks/99"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = client.get("/deployments/v2/networks/99").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_api_error_message() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/deployments/v2/networks"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"statusCode": 400, "message": "prefixLength must be 29-32"})),
        )
        .mount(&server)
        .await;

    let err = client
        .post("/deployments/v2/networks", &json!({"prefixLength": 8}))
        .await
        .unwrap_err();
    match err {
        Error::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "prefixLength must be 29-32");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn test_empty_success_body() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    Mock::given(method("DELETE"))
        .and(path("/deployments/v2/tags/5"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    client.delete("/deployments/v2/tags/5").await.unwrap();
}

// ── Collections ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_all_follows_pages() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    let full_page: Vec<_> = (0..PAGE_LIMIT).map(|i| json!({"originId": i})).collect();
    Mock::given(method("GET"))
        .and(path("/deployments/v2/networks"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&full_page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/deployments/v2/networks"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"originId": 100}])))
        .mount(&server)
        .await;

    let items = client
        .list_all("/deployments/v2/networks", &[], None, true)
        .await
        .unwrap();
    assert_eq!(items.len(), PAGE_LIMIT + 1);
    assert_eq!(items[PAGE_LIMIT]["originId"], 100);
}

#[tokio::test]
async fn test_list_all_with_envelope_and_filter() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/reports/v2/categories"))
        .and(query_param("type", "security"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "meta": {},
            "data": [
                {"id": 65, "label": "Malware"},
                {"id": 66, "label": "Phishing"}
            ]
        })))
        .mount(&server)
        .await;

    let items = client
        .list_all(
            "/reports/v2/categories",
            &[("type", "security".to_string())],
            Some("data"),
            false,
        )
        .await
        .unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[1]["label"], "Phishing");
}

#[tokio::test]
async fn test_list_all_rejects_objects() {
    let (server, client) = setup().await;
    mount_token(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/admin/v2/roles"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let err = client
        .list_all("/admin/v2/roles", &[], None, false)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }));
}
