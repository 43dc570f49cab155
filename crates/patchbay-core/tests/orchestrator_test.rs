#![allow(clippy::unwrap_used)]
// Patch, disconnect and status against a mocked NMOS node.

use std::path::Path;

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patchbay_core::{Bridge, BridgeConfig, CoreError, Node, PatchOutcome};

const SDP: &str = "v=0\r\n\
o=- 1 1 IN IP4 10.0.0.1\r\n\
s=cam\r\n\
a=group:DUP primary secondary\r\n\
m=video 5000 RTP/AVP 96\r\n\
a=mid:primary\r\n\
m=video 5000 RTP/AVP 96\r\n\
a=mid:secondary\r\n";

const SDP_PRIMARY_ONLY: &str = "v=0\r\n\
o=- 1 1 IN IP4 10.0.0.1\r\n\
s=cam\r\n\
a=group:DUP primary secondary\r\n\
m=video 5000 RTP/AVP 96\r\n\
a=mid:primary\r\n";

// ── Helpers ─────────────────────────────────────────────────────────

fn write_registry(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("logical.json");
    let registry = json!({
        "sources": {
            "CAM1": { "id": 1, "video": "s-v", "audio": "s-a" },
            "CAM2": { "id": 2, "video": "s-v2" },
            "BARS": { "id": 3 }
        },
        "receivers": {
            "PGM": { "id": 1, "video": "r-v", "audio": "r-a" },
            "MON": { "id": 2, "video": "r-v2" },
            "SPARE": { "id": 3 }
        }
    });
    std::fs::write(&path, serde_json::to_string_pretty(&registry).unwrap()).unwrap();
    path
}

async fn mount_discovery(server: &MockServer, expected_polls: u64) {
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/senders/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "s-v", "label": "CAM1 Video", "format": "urn:x-nmos:format:video" },
            { "id": "s-a", "label": "CAM1 Audio", "format": "urn:x-nmos:format:audio" },
            { "id": "s-v2", "label": "CAM2 Video", "format": "urn:x-nmos:format:video" }
        ])))
        .expect(expected_polls)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/receivers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "r-v", "label": "PGM Video", "format": "urn:x-nmos:format:video" },
            { "id": "r-a", "label": "PGM Audio", "format": "urn:x-nmos:format:audio" },
            { "id": "r-v2", "label": "MON Video", "format": "urn:x-nmos:format:video" }
        ])))
        .expect(expected_polls)
        .mount(server)
        .await;
}

async fn mount_transport_file(server: &MockServer, sender: &str) {
    Mock::given(method("GET"))
        .and(path(format!(
            "/x-nmos/connection/v1.1/single/senders/{sender}/transportfile/"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_string(SDP))
        .mount(server)
        .await;
}

async fn mount_staged(server: &MockServer, role: &str, id: &str, status: u16) {
    Mock::given(method("PATCH"))
        .and(path(format!(
            "/x-nmos/connection/v1.1/single/{role}/{id}/staged"
        )))
        .respond_with(ResponseTemplate::new(status).set_body_string("{}"))
        .mount(server)
        .await;
}

fn bridge(server: &MockServer, dir: &TempDir) -> Bridge {
    let config = BridgeConfig {
        nodes: vec![Node::new("rack-a", server.uri())],
        registry_path: write_registry(dir.path()),
        ..BridgeConfig::default()
    };
    Bridge::new(config).unwrap()
}

// ── Patch ───────────────────────────────────────────────────────────

#[tokio::test]
async fn test_take_between_groups_without_essences_skips_all() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bridge = bridge(&server, &dir);

    let outcomes = bridge.take(3, 3).await.unwrap();

    let skipped = PatchOutcome::Skipped {
        reason: "missing sender or receiver".into(),
    };
    assert_eq!(outcomes.video, skipped);
    assert_eq!(outcomes.audio, skipped);
    assert_eq!(outcomes.data, skipped);
    assert_eq!(outcomes.code(), "000");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_take_patches_each_shared_essence() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    mount_transport_file(&server, "s-v").await;
    mount_transport_file(&server, "s-a").await;

    Mock::given(method("PATCH"))
        .and(path("/x-nmos/connection/v1.1/single/receivers/r-v/staged"))
        .and(body_json(json!({
            "sender_id": "s-v",
            "master_enable": true,
            "transport_file": { "data": SDP_PRIMARY_ONLY, "type": "application/sdp" },
            "activation": { "mode": "activate_immediate" }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;
    mount_staged(&server, "receivers", "r-a", 200).await;
    Mock::given(method("PATCH"))
        .and(path("/x-nmos/connection/v1.1/single/senders/s-v/staged"))
        .and(body_partial_json(json!({ "master_enable": true })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;
    mount_staged(&server, "senders", "s-a", 200).await;

    let bridge = bridge(&server, &dir);
    let outcomes = bridge.take(1, 1).await.unwrap();

    assert_eq!(outcomes.code(), "110");
    assert_eq!(
        outcomes.data,
        PatchOutcome::skipped("missing sender or receiver")
    );
}

#[tokio::test]
async fn test_take_keeps_secondary_streams_when_disabled() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    mount_transport_file(&server, "s-v2").await;
    Mock::given(method("PATCH"))
        .and(path("/x-nmos/connection/v1.1/single/receivers/r-v2/staged"))
        .and(body_partial_json(json!({
            "transport_file": { "data": SDP }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;
    mount_staged(&server, "senders", "s-v2", 200).await;

    let bridge = bridge(&server, &dir);
    bridge.orchestrator().set_strip_secondary(false);
    let outcomes = bridge.take(2, 2).await.unwrap();

    assert_eq!(outcomes.code(), "100");
}

#[tokio::test]
async fn test_rejected_essence_does_not_affect_others() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    mount_transport_file(&server, "s-v").await;
    mount_transport_file(&server, "s-a").await;
    Mock::given(method("PATCH"))
        .and(path("/x-nmos/connection/v1.1/single/receivers/r-v/staged"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad transport file"))
        .mount(&server)
        .await;
    mount_staged(&server, "receivers", "r-a", 200).await;
    mount_staged(&server, "senders", "s-a", 200).await;

    let bridge = bridge(&server, &dir);
    let outcomes = bridge.take(1, 1).await.unwrap();

    assert_eq!(outcomes.code(), "010");
    assert!(
        matches!(outcomes.video, PatchOutcome::Error { status: Some(400), .. }),
        "expected a 400 error, got: {:?}",
        outcomes.video
    );
}

#[tokio::test]
async fn test_undiscovered_device_is_an_essence_error() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    // Nothing is listed, so the one refresh still finds nothing.
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let bridge = bridge(&server, &dir);
    let outcomes = bridge.take(2, 2).await.unwrap();

    assert_eq!(outcomes.code(), "000");
    assert_eq!(outcomes.video, PatchOutcome::error("receiver or sender not found"));
    assert!(matches!(outcomes.audio, PatchOutcome::Skipped { .. }));
}

#[tokio::test]
async fn test_unknown_logical_ids_are_not_found() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    let bridge = bridge(&server, &dir);

    let result = bridge.take(9, 1).await;
    assert!(
        matches!(result, Err(CoreError::NotFound { .. })),
        "expected NotFound, got: {result:?}"
    );
    let result = bridge.take(1, 9).await;
    assert!(matches!(result, Err(CoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_take_many_reports_per_receiver() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    mount_transport_file(&server, "s-v2").await;
    mount_staged(&server, "receivers", "r-v", 200).await;
    mount_staged(&server, "receivers", "r-v2", 200).await;
    mount_staged(&server, "senders", "s-v2", 200).await;

    let bridge = bridge(&server, &dir);
    let results = bridge.take_many(2, &[1, 2, 7]).await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].receiver_id, 1);
    assert_eq!(results[0].outcomes.as_ref().unwrap().code(), "100");
    assert_eq!(results[1].outcomes.as_ref().unwrap().code(), "100");
    assert!(results[2].outcomes.is_none());
    assert!(results[2].error.is_some());
}

// ── Disconnect ──────────────────────────────────────────────────────

#[tokio::test]
async fn test_disconnect_unbinds_every_receiver_essence() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    for receiver in ["r-v", "r-a"] {
        Mock::given(method("PATCH"))
            .and(path(format!(
                "/x-nmos/connection/v1.1/single/receivers/{receiver}/staged"
            )))
            .and(body_json(json!({
                "sender_id": null,
                "master_enable": false,
                "activation": { "mode": "activate_immediate" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;
    }

    let bridge = bridge(&server, &dir);
    let outcomes = bridge.disconnect(1).await.unwrap();

    assert_eq!(outcomes.code(), "110");
    assert_eq!(outcomes.data, PatchOutcome::skipped("no receiver ID defined"));
}

// ── Status ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_status_names_matching_source() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/connection/v1.1/single/receivers/r-v2/active/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "sender_id": "s-v2",
            "master_enable": true
        })))
        .mount(&server)
        .await;

    let bridge = bridge(&server, &dir);
    let status = bridge.status(2).await.unwrap();

    assert_eq!(status.name, "MON");
    assert_eq!(status.essences.len(), 1);
    assert_eq!(status.essences[0].sender_id.as_deref(), Some("s-v2"));
    assert_eq!(status.source.as_deref(), Some("CAM2"));
}

#[tokio::test]
async fn test_status_without_match_has_no_source() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();
    mount_discovery(&server, 1).await;
    for (receiver, sender) in [("r-v", json!("s-v")), ("r-a", json!(null))] {
        Mock::given(method("GET"))
            .and(path(format!(
                "/x-nmos/connection/v1.1/single/receivers/{receiver}/active/"
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sender_id": sender,
                "master_enable": true
            })))
            .mount(&server)
            .await;
    }

    let bridge = bridge(&server, &dir);
    let status = bridge.status(1).await.unwrap();

    assert_eq!(status.essences.len(), 2);
    assert_eq!(status.source, None);
}
