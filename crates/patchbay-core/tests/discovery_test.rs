#![allow(clippy::unwrap_used)]
// Discovery across several nodes, one of them failing.

use pretty_assertions::assert_eq;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use patchbay_api::NmosClient;
use patchbay_core::{DiscoveryCache, EssenceKind, Node, TransportConfig};

async fn healthy_node() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/senders/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "s-v", "label": "CAM1 Video", "format": "urn:x-nmos:format:video" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/receivers/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "r-a", "label": "PGM Audio", "format": "urn:x-nmos:format:audio" }
        ])))
        .mount(&server)
        .await;
    server
}

fn cache(nodes: Vec<Node>) -> DiscoveryCache {
    let client = NmosClient::new(&TransportConfig::default()).unwrap();
    DiscoveryCache::new(client, nodes, None)
}

#[tokio::test]
async fn test_failing_node_does_not_hide_healthy_one() {
    let healthy = healthy_node().await;
    let broken = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&broken)
        .await;

    let cache = cache(vec![
        Node::new("broken", broken.uri()),
        Node::new("healthy", healthy.uri()),
    ]);
    let snapshot = cache.refresh().await;

    assert_eq!(snapshot.nodes.len(), 2);
    let senders: Vec<(&str, &str)> = snapshot
        .senders
        .iter()
        .map(|r| (r.id.as_str(), r.node.name.as_str()))
        .collect();
    assert_eq!(senders, [("s-v", "healthy")]);
    assert_eq!(snapshot.receivers.len(), 1);
    assert_eq!(snapshot.receivers[0].kind, EssenceKind::Audio);
}

#[tokio::test]
async fn test_failing_list_keeps_other_list_of_same_node() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/senders/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": "s-v", "label": "CAM1 Video" }
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/x-nmos/node/v1.3/receivers/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let cache = cache(vec![Node::new("rack-a", server.uri())]);
    let snapshot = cache.refresh().await;

    assert_eq!(snapshot.senders.len(), 1);
    assert!(snapshot.receivers.is_empty());
}

#[tokio::test]
async fn test_node_list_change_applies_on_next_refresh() {
    let first = healthy_node().await;
    let second = healthy_node().await;

    let cache = cache(vec![Node::new("first", first.uri())]);
    assert_eq!(cache.refresh().await.senders.len(), 1);

    cache.set_nodes(vec![
        Node::new("first", first.uri()),
        Node::new("second", second.uri()),
    ]);
    let snapshot = cache.refresh().await;
    assert_eq!(snapshot.senders.len(), 2);
    assert_eq!(snapshot.nodes[1].name, "second");
}
