#![allow(clippy::unwrap_used)]
// Integration tests for `NmosClient` using wiremock.

use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patchbay_api::{ApiVersions, Error, NmosClient, NodeEndpoint, StagedPatch};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, NmosClient, NodeEndpoint) {
    let server = MockServer::start().await;
    let client = NmosClient::with_client(
        reqwest::Client::new(),
        Duration::from_secs(3),
        Duration::from_secs(2),
    );
    let endpoint = NodeEndpoint::new(&server.uri(), ApiVersions::default()).unwrap();
    (server, client, endpoint)
}

// ── IS-04 ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_list_receivers() {
    let (server, client, endpoint) = setup().await;

    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/receivers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "r-200",
                "label": "PGM Video",
                "format": "urn:x-nmos:format:video",
                "caps": { "media_types": ["video/raw"] },
                "subscription": { "sender_id": "s-100", "active": true }
            },
            "not-an-object"
        ])))
        .mount(&server)
        .await;

    let receivers = client.list_receivers(&endpoint).await.unwrap();

    assert_eq!(receivers.len(), 1);
    assert_eq!(receivers[0].id, "r-200");
    assert_eq!(receivers[0].label, "PGM Video");
    assert_eq!(
        receivers[0]
            .subscription
            .as_ref()
            .and_then(|s| s.sender_id.as_deref()),
        Some("s-100")
    );
}

#[tokio::test]
async fn test_list_senders_rejects_non_list() {
    let (server, client, endpoint) = setup().await;

    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/senders/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "oops": true })))
        .mount(&server)
        .await;

    let result = client.list_senders(&endpoint).await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_list_senders_server_error() {
    let (server, client, endpoint) = setup().await;

    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/senders/"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let err = client.list_senders(&endpoint).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
}

// ── IS-05 ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_transport_file_is_returned_verbatim() {
    let (server, client, endpoint) = setup().await;
    let sdp = "v=0\r\no=- 1 1 IN IP4 10.0.0.1\r\n";

    Mock::given(method("GET"))
        .and(path(
            "/x-nmos/connection/v1.1/single/senders/s-100/transportfile/",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string(sdp))
        .mount(&server)
        .await;

    let body = client.transport_file(&endpoint, "s-100").await.unwrap();
    assert_eq!(body, sdp);
}

#[tokio::test]
async fn test_stage_receiver_sends_connect_body() {
    let (server, client, endpoint) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/x-nmos/connection/v1.1/single/receivers/r-200/staged"))
        .and(body_json(json!({
            "sender_id": "s-100",
            "master_enable": true,
            "transport_file": { "data": "v=0\r\n", "type": "application/sdp" },
            "activation": { "mode": "activate_immediate" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client
        .stage_receiver(
            &endpoint,
            "r-200",
            &StagedPatch::connect_receiver("s-100", "v=0\r\n"),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_stage_sender_rejected_carries_body() {
    let (server, client, endpoint) = setup().await;

    Mock::given(method("PATCH"))
        .and(path("/x-nmos/connection/v1.1/single/senders/s-100/staged"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad activation"))
        .mount(&server)
        .await;

    let err = client
        .stage_sender(&endpoint, "s-100", &StagedPatch::enable_sender())
        .await
        .unwrap_err();

    match err {
        Error::Rejected { status, body } => {
            assert_eq!(status, 400);
            assert_eq!(body, "bad activation");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn test_active_receiver() {
    let (server, client, endpoint) = setup().await;

    Mock::given(method("GET"))
        .and(path("/x-nmos/connection/v1.1/single/receivers/r-200/active/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sender_id": "s-100",
            "master_enable": true,
            "activation": { "mode": "activate_immediate" }
        })))
        .mount(&server)
        .await;

    let active = client.active_receiver(&endpoint, "r-200").await.unwrap();
    assert_eq!(active.sender_id.as_deref(), Some("s-100"));
    assert!(active.master_enable);
}

// ── Version detection ───────────────────────────────────────────────

#[tokio::test]
async fn test_detect_versions_picks_newest_answering() {
    let (server, client, _) = setup().await;

    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.2/sources/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "src-1" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.1/sources/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": "src-1" }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/connection/v1.0/single/receivers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            "0c6f1a2b-3d4e-4f50-8a9b-1c2d3e4f5a6b/"
        ])))
        .mount(&server)
        .await;

    let detected = client.detect_versions(&server.uri()).await.unwrap();
    assert_eq!(detected.node.as_deref(), Some("v1.2"));
    assert_eq!(detected.connection.as_deref(), Some("v1.0"));
}

#[tokio::test]
async fn test_detect_versions_nothing_answers() {
    let (server, client, _) = setup().await;

    let detected = client.detect_versions(&server.uri()).await.unwrap();
    assert!(detected.node.is_none());
    assert!(detected.connection.is_none());
}
