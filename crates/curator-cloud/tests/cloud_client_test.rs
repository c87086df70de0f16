//! HTTP contract tests for the cloud client against a wiremock server.

use chrono::Utc;
use curator_cloud::{CloudClient, CloudConfig, HttpConnectivityProbe};
use curator_core::{
    CloudId, CloudService, CloudTag, CloudTagRelation, ConnectivityProbe, Error, SyncPayload,
};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer, api_key: Option<&str>) -> CloudClient {
    CloudClient::new(CloudConfig {
        base_url: server.uri(),
        api_key: api_key.map(String::from),
        timeout_seconds: 5,
    })
    .expect("Failed to create client")
}

#[tokio::test]
async fn test_fetch_dimensions_and_tags() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/dimensions"))
        .and(query_param("language", "zh-CN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 0, "name": "topic"},
            {"id": 41, "name": "project"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/tags"))
        .and(query_param("language", "zh-CN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"id": 900, "name": "invoice", "dimension_id": 0}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, None);
    let dimensions = client.fetch_dimensions("zh-CN").await.unwrap();
    assert_eq!(dimensions.len(), 2);
    assert_eq!(dimensions[0].id, CloudId(0));
    assert_eq!(dimensions[1].name, "project");

    let tags = client.fetch_tags("zh-CN").await.unwrap();
    assert_eq!(tags[0].id, CloudId(900));
    assert_eq!(tags[0].dimension_id, CloudId(0));
}

#[tokio::test]
async fn test_batch_sync_posts_payload_with_bearer_token() {
    let server = MockServer::start().await;

    let payload = SyncPayload {
        tags: Some(vec![CloudTag {
            name: "invoice".to_string(),
            dimension_id: CloudId(41),
            created_at: Utc::now(),
        }]),
        tag_relations: Some(vec![CloudTagRelation {
            file_hash: "abc".to_string(),
            tag_id: CloudId(900),
        }]),
        ..Default::default()
    };

    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .and(query_param("language", "en"))
        .and(header("Authorization", "Bearer secret"))
        .and(body_json(serde_json::to_value(&payload).unwrap()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server, Some("secret"));
    client.batch_sync(&payload, "en").await.unwrap();
}

#[tokio::test]
async fn test_batch_sync_omits_absent_sections() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .and(body_json(serde_json::json!({"files": [], "tag_relations": []})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let payload = SyncPayload::files_and_relations(vec![], vec![]);
    client(&server, None)
        .batch_sync(&payload, "en")
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forbidden_maps_to_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "code": "42501",
            "message": "permission denied for table tags"
        })))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .batch_sync(&SyncPayload::default(), "en")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Forbidden(_)));
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn test_policy_code_on_bad_request_is_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/sync/batch"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "code": "42501",
            "message": "new row violates row-level security policy"
        })))
        .mount(&server)
        .await;

    let err = client(&server, None)
        .batch_sync(&SyncPayload::default(), "en")
        .await
        .unwrap_err();
    match &err {
        Error::Cloud { status, code, .. } => {
            assert_eq!(*status, 400);
            assert_eq!(code.as_deref(), Some("42501"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.is_permission_denied());
}

#[tokio::test]
async fn test_server_error_is_not_permission_denied() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/tags"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .mount(&server)
        .await;

    let err = client(&server, None).fetch_tags("en").await.unwrap_err();
    match &err {
        Error::Cloud {
            status, message, ..
        } => {
            assert_eq!(*status, 500);
            assert_eq!(message, "upstream exploded");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(!err.is_permission_denied());
}

#[tokio::test]
async fn test_health_and_connectivity_probe() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server, None);
    assert!(!client.health().await.unwrap());
    // An answer of any kind means the host is online.
    assert!(HttpConnectivityProbe::new(client).is_online().await);
}

#[tokio::test]
async fn test_unreachable_host_is_offline() {
    let client = CloudClient::new(CloudConfig {
        base_url: "http://127.0.0.1:9".to_string(),
        api_key: None,
        timeout_seconds: 1,
    })
    .unwrap();

    assert!(matches!(client.health().await, Err(Error::Request(_))));
    assert!(!HttpConnectivityProbe::new(client).is_online().await);
}
