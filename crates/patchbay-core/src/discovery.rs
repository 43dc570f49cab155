// ── Discovery cache ──
//
// Polls every configured node's IS-04 API and keeps the aggregate as an
// atomically replaced snapshot. One node failing, or one of its two
// lists failing, only costs that node's contribution.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use patchbay_api::{NmosClient, NmosResource};

use crate::model::{Node, Resource, Snapshot};

/// Last known senders and receivers across all nodes.
pub struct DiscoveryCache {
    client: NmosClient,
    nodes: ArcSwap<Vec<Node>>,
    snapshot: ArcSwap<Snapshot>,
    refresh_lock: Mutex<()>,
    persist_path: Option<PathBuf>,
}

impl DiscoveryCache {
    pub fn new(client: NmosClient, nodes: Vec<Node>, persist_path: Option<PathBuf>) -> Self {
        Self {
            client,
            nodes: ArcSwap::from_pointee(nodes),
            snapshot: ArcSwap::from_pointee(Snapshot::default()),
            refresh_lock: Mutex::new(()),
            persist_path,
        }
    }

    /// The last snapshot, or an empty one before the first refresh.
    pub fn read(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn nodes(&self) -> Arc<Vec<Node>> {
        self.nodes.load_full()
    }

    /// Change the node list used by the next refresh.
    pub fn set_nodes(&self, nodes: Vec<Node>) {
        self.nodes.store(Arc::new(nodes));
    }

    /// Load the persisted snapshot, if one is configured. A missing or
    /// unreadable file leaves an empty snapshot.
    pub fn load_persisted(&self) -> Arc<Snapshot> {
        let Some(path) = self.persist_path.as_deref() else {
            return self.read();
        };
        self.snapshot.store(Arc::new(read_snapshot(path)));
        self.read()
    }

    /// Query every node and replace the snapshot. Concurrent calls are
    /// serialized; each one performs its own pass.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let _guard = self.refresh_lock.lock().await;
        let nodes = self.nodes.load_full();

        let results = join_all(nodes.iter().map(|node| self.fetch_node(node))).await;

        let mut snapshot = Snapshot {
            nodes: nodes.as_ref().clone(),
            refreshed_at: Some(Utc::now()),
            ..Snapshot::default()
        };
        for (receivers, senders) in results {
            snapshot.receivers.extend(receivers);
            snapshot.senders.extend(senders);
        }

        info!(
            nodes = snapshot.nodes.len(),
            receivers = snapshot.receivers.len(),
            senders = snapshot.senders.len(),
            "discovery refreshed"
        );

        if let Some(path) = self.persist_path.as_deref() {
            write_snapshot(path, &snapshot).await;
        }

        let snapshot = Arc::new(snapshot);
        self.snapshot.store(Arc::clone(&snapshot));
        snapshot
    }

    async fn fetch_node(&self, node: &Node) -> (Vec<Resource>, Vec<Resource>) {
        let endpoint = match node.endpoint() {
            Ok(ep) => ep,
            Err(e) => {
                warn!(node = %node.name, error = %e, "skipping node with invalid URL");
                return (Vec::new(), Vec::new());
            }
        };

        let (receivers, senders) = tokio::join!(
            self.client.list_receivers(&endpoint),
            self.client.list_senders(&endpoint),
        );

        let receivers = to_resources(receivers, node, "receivers");
        let senders = to_resources(senders, node, "senders");
        debug!(
            node = %node.name,
            receivers = receivers.len(),
            senders = senders.len(),
            "node polled"
        );
        (receivers, senders)
    }
}

fn to_resources(
    list: Result<Vec<NmosResource>, patchbay_api::Error>,
    node: &Node,
    what: &str,
) -> Vec<Resource> {
    match list {
        Ok(items) => items
            .into_iter()
            .map(|res| Resource::from_nmos(res, node))
            .collect(),
        Err(e) => {
            warn!(node = %node.name, error = %e, "failed to fetch {what}");
            Vec::new()
        }
    }
}

fn read_snapshot(path: &Path) -> Snapshot {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) => {
            if e.kind() == std::io::ErrorKind::NotFound {
                debug!(path = %path.display(), "no discovery cache file yet");
            } else {
                warn!(path = %path.display(), error = %e, "cannot read discovery cache");
            }
            return Snapshot::default();
        }
    };
    serde_json::from_str(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "discovery cache is corrupt, starting empty");
        Snapshot::default()
    })
}

async fn write_snapshot(path: &Path, snapshot: &Snapshot) {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        if let Err(e) = tokio::fs::create_dir_all(parent).await {
            warn!(path = %parent.display(), error = %e, "cannot create cache directory");
            return;
        }
    }
    let json = match serde_json::to_string_pretty(snapshot) {
        Ok(json) => json,
        Err(e) => {
            warn!(error = %e, "cannot encode discovery cache");
            return;
        }
    };
    if let Err(e) = tokio::fs::write(path, json).await {
        warn!(path = %path.display(), error = %e, "cannot persist discovery cache");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use patchbay_api::TransportConfig;

    fn cache(path: Option<PathBuf>) -> DiscoveryCache {
        let client = NmosClient::new(&TransportConfig::default()).unwrap();
        DiscoveryCache::new(client, Vec::new(), path)
    }

    #[test]
    fn corrupt_cache_file_yields_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "][").unwrap();

        let cache = cache(Some(path));
        assert!(cache.load_persisted().is_empty());
    }

    #[tokio::test]
    async fn refresh_without_nodes_persists_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cache.json");

        let cache = cache(Some(path.clone()));
        let snapshot = cache.refresh().await;

        assert!(snapshot.is_empty());
        assert!(snapshot.refreshed_at.is_some());
        let persisted: Snapshot =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(persisted, *snapshot);
    }
}
