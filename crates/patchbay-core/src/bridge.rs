// ── Bridge: application context ──
//
// Owns discovery, the logical registry, the orchestrator and the
// optional Videohub emulator, plus the background tasks tying them
// together. Every entry point (CLI, panel, future HTTP façade) goes
// through a `Bridge` handle instead of process-wide state.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use patchbay_api::{DetectedVersions, NmosClient};

use crate::config::{BridgeConfig, Reload, Settings};
use crate::discovery::DiscoveryCache;
use crate::error::CoreError;
use crate::model::{
    EssenceOutcomes, GroupKind, GroupUpdate, LogicalGroup, Node, ReceiverPatch, ReceiverStatus,
    Snapshot,
};
use crate::patch::Orchestrator;
use crate::registry::Registry;
use crate::videohub::{PatchRequest, Videohub};

/// Re-reads settings and the node list on every refresh tick. Runs on
/// a blocking thread; `None` keeps the current values.
pub type ReloadSource = Arc<dyn Fn() -> Option<Reload> + Send + Sync>;

const OPERATOR_ORIGIN: &str = "operator";

// ── Bridge ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<BridgeInner>`. Constructing a bridge loads
/// the registry and any persisted discovery snapshot but starts nothing;
/// one-shot callers use it as is, the daemon calls [`start`](Self::start).
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    config: BridgeConfig,
    client: NmosClient,
    discovery: Arc<DiscoveryCache>,
    registry: Arc<Registry>,
    orchestrator: Arc<Orchestrator>,
    settings: ArcSwap<Settings>,
    reload_source: Option<ReloadSource>,
    emulator: Mutex<Option<Videohub>>,
    patch_tx: mpsc::UnboundedSender<PatchRequest>,
    patch_rx: Mutex<Option<mpsc::UnboundedReceiver<PatchRequest>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Bridge {
    pub fn new(config: BridgeConfig) -> Result<Self, CoreError> {
        Self::build(config, None)
    }

    /// Like [`new`](Self::new), with a source of settings and nodes
    /// polled by the refresh task.
    pub fn with_reload_source(
        config: BridgeConfig,
        source: ReloadSource,
    ) -> Result<Self, CoreError> {
        Self::build(config, Some(source))
    }

    fn build(config: BridgeConfig, reload_source: Option<ReloadSource>) -> Result<Self, CoreError> {
        let client = NmosClient::new(&config.transport)?;
        let registry = Arc::new(Registry::load(&config.registry_path)?);
        let discovery = Arc::new(DiscoveryCache::new(
            client.clone(),
            config.nodes.clone(),
            config.cache_path.clone(),
        ));
        discovery.load_persisted();

        let orchestrator = Arc::new(Orchestrator::new(
            client.clone(),
            Arc::clone(&discovery),
            Arc::clone(&registry),
            config.settings.patch_secondary,
        ));
        let (patch_tx, patch_rx) = mpsc::unbounded_channel();

        Ok(Self {
            inner: Arc::new(BridgeInner {
                settings: ArcSwap::from_pointee(config.settings.clone()),
                config,
                client,
                discovery,
                registry,
                orchestrator,
                reload_source,
                emulator: Mutex::new(None),
                patch_tx,
                patch_rx: Mutex::new(Some(patch_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn orchestrator(&self) -> &Arc<Orchestrator> {
        &self.inner.orchestrator
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.inner.settings.load_full()
    }

    /// The running emulator, if enabled.
    pub async fn emulator(&self) -> Option<Videohub> {
        self.inner.emulator.lock().await.clone()
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Refresh discovery, apply the current settings (starting the
    /// emulator if enabled) and spawn the patch dispatcher and the
    /// periodic refresh task.
    pub async fn start(&self) -> Result<(), CoreError> {
        if let Some(rx) = self.inner.patch_rx.lock().await.take() {
            let handle = tokio::spawn(patch_dispatcher(
                Arc::clone(&self.inner.orchestrator),
                rx,
                self.inner.cancel.clone(),
            ));
            self.inner.task_handles.lock().await.push(handle);
        }

        self.inner.discovery.refresh().await;
        self.apply_settings(Settings::clone(&self.settings())).await?;

        let handle = tokio::spawn(refresh_task(self.clone(), self.inner.cancel.clone()));
        self.inner.task_handles.lock().await.push(handle);

        info!("bridge started");
        Ok(())
    }

    /// Stop background tasks and the emulator.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        if let Some(emulator) = self.inner.emulator.lock().await.take() {
            emulator.stop().await;
        }
        info!("bridge stopped");
    }

    /// Apply settings: SDP filtering flag, refresh interval, and starting
    /// or stopping the emulator to match `enable_emulator`.
    pub async fn apply_settings(&self, settings: Settings) -> Result<(), CoreError> {
        self.inner
            .orchestrator
            .set_strip_secondary(settings.patch_secondary);
        let enable = settings.enable_emulator;
        self.inner.settings.store(Arc::new(settings));

        let mut slot = self.inner.emulator.lock().await;
        match (enable, slot.is_some()) {
            (true, false) => {
                let emulator = Videohub::new(
                    self.inner.config.emulator.clone(),
                    Arc::clone(&self.inner.registry),
                    Arc::clone(&self.inner.discovery),
                    self.inner.patch_tx.clone(),
                );
                emulator.start().await?;
                *slot = Some(emulator);
            }
            (false, true) => {
                if let Some(emulator) = slot.take() {
                    emulator.stop().await;
                }
            }
            _ => {}
        }
        Ok(())
    }

    // ── Operator entry points ────────────────────────────────────

    /// Refresh discovery now and bring emulator routing in line with it.
    pub async fn refresh(&self) -> Arc<Snapshot> {
        let snapshot = self.inner.discovery.refresh().await;
        if let Some(emulator) = self.emulator().await {
            emulator.sync_observed().await;
        }
        snapshot
    }

    /// All groups of a kind, sorted by ID.
    pub fn groups(&self, kind: GroupKind) -> Vec<(String, LogicalGroup)> {
        self.inner.registry.list(kind)
    }

    pub async fn upsert_group(&self, kind: GroupKind, update: GroupUpdate) -> Result<u32, CoreError> {
        let id = self.inner.registry.add_or_update(kind, update).await?;
        self.registry_changed().await;
        Ok(id)
    }

    pub async fn delete_group(&self, kind: GroupKind, name: &str) -> Result<LogicalGroup, CoreError> {
        let removed = self.inner.registry.delete(kind, name).await?;
        self.registry_changed().await;
        Ok(removed)
    }

    /// Patch one source to one receiver.
    pub async fn take(&self, source_id: u32, receiver_id: u32) -> Result<EssenceOutcomes, CoreError> {
        let outcomes = self.inner.orchestrator.patch(source_id, receiver_id).await?;
        if outcomes.any_success() {
            self.mirror_route(source_id, receiver_id).await;
        }
        Ok(outcomes)
    }

    /// Patch one source to many receivers.
    pub async fn take_many(
        &self,
        source_id: u32,
        receiver_ids: &[u32],
    ) -> Result<Vec<ReceiverPatch>, CoreError> {
        let results = self
            .inner
            .orchestrator
            .patch_many(source_id, receiver_ids)
            .await?;
        for result in &results {
            if result.outcomes.as_ref().is_some_and(EssenceOutcomes::any_success) {
                self.mirror_route(source_id, result.receiver_id).await;
            }
        }
        Ok(results)
    }

    pub async fn disconnect(&self, receiver_id: u32) -> Result<EssenceOutcomes, CoreError> {
        self.inner.orchestrator.disconnect(receiver_id).await
    }

    pub async fn status(&self, receiver_id: u32) -> Result<ReceiverStatus, CoreError> {
        self.inner.orchestrator.status_of(receiver_id).await
    }

    /// Detect a node URL for the API versions it speaks.
    pub async fn detect_versions(&self, url: &str) -> Result<DetectedVersions, CoreError> {
        Ok(self.inner.client.detect_versions(url).await?)
    }

    async fn mirror_route(&self, source_id: u32, receiver_id: u32) {
        if let Some(emulator) = self.emulator().await {
            emulator
                .set_routing(source_id, receiver_id, OPERATOR_ORIGIN, false)
                .await;
        }
    }

    async fn registry_changed(&self) {
        if let Some(emulator) = self.emulator().await {
            emulator.reload_and_broadcast().await;
        }
    }

    /// One refresh tick. Picks up settings, node and registry edits made
    /// by other processes, rediscovers, and brings the emulator in line.
    async fn tick(&self) {
        if let Some(reload) = self.reload_config().await {
            self.set_nodes(reload.nodes);
            if let Err(e) = self.apply_settings(reload.settings).await {
                warn!(error = %e, "failed to apply reloaded settings");
            }
        }

        let registry_changed = match self.inner.registry.reload().await {
            Ok(changed) => changed,
            Err(e) => {
                warn!(error = %e, "cannot reload logical registry, keeping current groups");
                false
            }
        };

        match (registry_changed, self.emulator().await) {
            (true, Some(emulator)) => emulator.reload_and_broadcast().await,
            _ => {
                self.refresh().await;
            }
        }
    }

    async fn reload_config(&self) -> Option<Reload> {
        let source = Arc::clone(self.inner.reload_source.as_ref()?);
        match tokio::task::spawn_blocking(move || source()).await {
            Ok(reload) => reload,
            Err(e) => {
                warn!(error = %e, "configuration reload task failed");
                None
            }
        }
    }

    fn set_nodes(&self, nodes: Vec<Node>) {
        if *self.inner.discovery.nodes() != nodes {
            info!(nodes = nodes.len(), "node list changed");
            self.inner.discovery.set_nodes(nodes);
        }
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Refresh discovery every `refresh_interval`, re-read each time.
async fn refresh_task(bridge: Bridge, cancel: CancellationToken) {
    loop {
        let interval = bridge.settings().refresh_interval;
        debug!(secs = interval.as_secs(), "next discovery refresh scheduled");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(interval) => bridge.tick().await,
        }
    }
}

/// Run panel-requested patches off the session tasks. In-flight patches
/// are left to finish on their own when the bridge stops.
async fn patch_dispatcher(
    orchestrator: Arc<Orchestrator>,
    mut rx: mpsc::UnboundedReceiver<PatchRequest>,
    cancel: CancellationToken,
) {
    let tracker = TaskTracker::new();
    loop {
        let request = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            request = rx.recv() => match request {
                Some(request) => request,
                None => break,
            },
        };

        let orchestrator = Arc::clone(&orchestrator);
        tracker.spawn(async move {
            let PatchRequest {
                source_id,
                receiver_id,
                origin,
            } = request;
            match orchestrator.patch(source_id, receiver_id).await {
                Ok(outcomes) => info!(
                    origin = %origin,
                    source_id,
                    receiver_id,
                    code = %outcomes.code(),
                    "patch completed"
                ),
                Err(e) => warn!(origin = %origin, source_id, receiver_id, error = %e, "patch failed"),
            }
        });
    }
    tracker.close();
}
