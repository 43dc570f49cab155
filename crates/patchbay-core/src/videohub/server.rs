// ── Videohub emulator server ──
//
// One task per panel connection reads blocks; a companion writer task
// per session drains a bounded queue onto the socket so replies keep
// their order and a slow panel never blocks a broadcast. A panel whose
// queue fills up is disconnected. Routing
// changes from panels are applied locally first and handed to the patch
// dispatcher over a channel; device truth comes back via reconciliation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::EmulatorConfig;
use crate::discovery::DiscoveryCache;
use crate::error::CoreError;
use crate::reconcile::reconcile;
use crate::registry::Registry;

use super::protocol::{self, ACK, BlockName, Command, NAK};
use super::state::HubState;

/// A routing change requested through the emulator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    pub source_id: u32,
    pub receiver_id: u32,
    pub origin: String,
}

/// Blocks queued per panel before it counts as stalled.
const SESSION_QUEUE: usize = 64;

/// Outbound side of one panel session.
#[derive(Clone)]
struct Session {
    tx: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl Session {
    /// Queue a block for the panel. A full or closed queue ends the
    /// session.
    fn send(&self, block: String) -> bool {
        match self.tx.try_send(block) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!("panel is not reading, closing session");
                self.closed.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => {
                self.closed.cancel();
                false
            }
        }
    }
}

/// Emulated Blackmagic Videohub router.
///
/// Cheaply cloneable. One instance serves one listener generation:
/// after [`stop`](Self::stop) a new instance must be created.
#[derive(Clone)]
pub struct Videohub {
    inner: Arc<VideohubInner>,
}

struct VideohubInner {
    config: EmulatorConfig,
    registry: Arc<Registry>,
    discovery: Arc<DiscoveryCache>,
    state: RwLock<HubState>,
    sessions: DashMap<u64, Session>,
    next_session: AtomicU64,
    broadcasts: AtomicU64,
    patch_tx: mpsc::UnboundedSender<PatchRequest>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Videohub {
    pub fn new(
        config: EmulatorConfig,
        registry: Arc<Registry>,
        discovery: Arc<DiscoveryCache>,
        patch_tx: mpsc::UnboundedSender<PatchRequest>,
    ) -> Self {
        let state = HubState::from_registry(&registry.snapshot());
        Self {
            inner: Arc::new(VideohubInner {
                config,
                registry,
                discovery,
                state: RwLock::new(state),
                sessions: DashMap::new(),
                next_session: AtomicU64::new(1),
                broadcasts: AtomicU64::new(0),
                patch_tx,
                cancel: CancellationToken::new(),
                tracker: TaskTracker::new(),
                local_addr: Mutex::new(None),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Reconcile routing, bind the listener and start accepting panels.
    /// Returns the bound address.
    pub async fn start(&self) -> Result<SocketAddr, CoreError> {
        if self.inner.cancel.is_cancelled() {
            return Err(CoreError::Internal("emulator was already stopped".into()));
        }

        self.rebuild_routing_table().await;

        let bind = SocketAddr::new(self.inner.config.bind, self.inner.config.port);
        let listener = TcpListener::bind(bind).await?;
        let addr = listener.local_addr()?;
        *self.inner.local_addr.lock().await = Some(addr);

        let hub = self.clone();
        self.inner.tracker.spawn(hub.accept_loop(listener));

        info!(%addr, "videohub emulator listening");
        Ok(addr)
    }

    /// Close the listener and every session, then wait for their tasks.
    pub async fn stop(&self) {
        self.inner.cancel.cancel();
        self.inner.tracker.close();
        self.inner.tracker.wait().await;
        self.inner.sessions.clear();
        info!("videohub emulator stopped");
    }

    pub async fn local_addr(&self) -> Option<SocketAddr> {
        *self.inner.local_addr.lock().await
    }

    pub fn session_count(&self) -> usize {
        self.inner.sessions.len()
    }

    /// Number of routing broadcasts sent so far.
    pub fn broadcast_count(&self) -> u64 {
        self.inner.broadcasts.load(Ordering::Relaxed)
    }

    /// Effective routing, receiver ID → source ID.
    pub async fn routing(&self) -> BTreeMap<u32, u32> {
        self.inner.state.read().await.routes()
    }

    // ── External mutation ────────────────────────────────────────────

    /// Record that `receiver_id` is fed by `source_id` and broadcast.
    ///
    /// Without `force_broadcast`, an unchanged route is a no-op. Returns
    /// whether a broadcast was sent.
    pub async fn set_routing(
        &self,
        source_id: u32,
        receiver_id: u32,
        origin: &str,
        force_broadcast: bool,
    ) -> bool {
        let previous = {
            let mut state = self.inner.state.write().await;
            let previous = state.route(receiver_id);
            if previous == Some(source_id) && !force_broadcast {
                debug!(origin, receiver_id, source_id, "route unchanged");
                return false;
            }
            state.set_desired(receiver_id, source_id);
            previous
        };

        info!(origin, receiver_id, source_id, ?previous, "route updated");
        self.broadcast_routing().await;
        true
    }

    /// Re-derive labels and index maps from the registry, reconcile and
    /// broadcast. Connected panels keep their sessions.
    pub async fn reload_and_broadcast(&self) {
        self.inner.discovery.refresh().await;
        let registry = self.inner.registry.snapshot();
        let observed = reconcile(&registry, &self.inner.discovery.read());

        let mut next = HubState::from_registry(&registry);
        next.apply_observed(observed);
        *self.inner.state.write().await = next;

        info!("videohub labels reloaded");
        self.broadcast_routing().await;
    }

    /// Refresh discovery and replace observed routing with what the
    /// devices report. Returns the number of matched receivers.
    pub async fn rebuild_routing_table(&self) -> usize {
        self.inner.discovery.refresh().await;
        let observed = reconcile(&self.inner.registry.snapshot(), &self.inner.discovery.read());
        let matched = observed.len();
        self.inner.state.write().await.apply_observed(observed);
        matched
    }

    /// Reconcile against the current discovery snapshot without
    /// refreshing it. Broadcasts only when effective routing changed.
    pub async fn sync_observed(&self) -> bool {
        let observed = reconcile(&self.inner.registry.snapshot(), &self.inner.discovery.read());
        let changed = {
            let mut state = self.inner.state.write().await;
            let before = state.routes();
            state.apply_observed(observed);
            state.routes() != before
        };
        if changed {
            self.broadcast_routing().await;
        }
        changed
    }

    /// Send the routing block to every session. Sessions whose writer
    /// has gone away or whose queue is full are dropped. Returns the number of sessions reached.
    pub async fn broadcast_routing(&self) -> usize {
        let block = self.inner.state.read().await.render_routing();
        self.inner.broadcasts.fetch_add(1, Ordering::Relaxed);

        let mut dead = Vec::new();
        let mut delivered = 0usize;
        for entry in &self.inner.sessions {
            if entry.value().send(block.clone()) {
                delivered += 1;
            } else {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            debug!(session = id, "dropping closed session");
            self.inner.sessions.remove(&id);
        }

        debug!(sessions = delivered, ">> VIDEO OUTPUT ROUTING (broadcast)");
        delivered
    }

    // ── Serving ──────────────────────────────────────────────────────

    async fn accept_loop(self, listener: TcpListener) {
        let cancel = self.inner.cancel.clone();
        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let hub = self.clone();
                        self.inner.tracker.spawn(hub.serve_session(stream, peer));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }
        debug!("listener closed");
    }

    async fn serve_session(self, stream: TcpStream, peer: SocketAddr) {
        let id = self.inner.next_session.fetch_add(1, Ordering::Relaxed);
        info!(session = id, %peer, "panel connected");

        let (reader, writer) = stream.into_split();
        let (tx, rx) = mpsc::channel(SESSION_QUEUE);
        let session = Session {
            tx,
            closed: self.inner.cancel.child_token(),
        };
        self.inner
            .tracker
            .spawn(write_loop(writer, rx, session.closed.clone()));

        {
            let state = self.inner.state.read().await;
            let model = &self.inner.config.model_name;
            let greeting = [
                protocol::preamble(),
                state.render(BlockName::VideohubDevice, model),
                state.render(BlockName::InputLabels, model),
                state.render(BlockName::OutputLabels, model),
                state.render_routing(),
            ];
            for block in greeting {
                if !session.send(block) {
                    debug!(session = id, "panel left during greeting");
                    return;
                }
            }
        }

        self.inner.sessions.insert(id, session.clone());
        self.broadcast_routing().await;

        let closed = session.closed.clone();
        let mut lines = BufReader::new(reader).lines();
        let mut block: Vec<String> = Vec::new();

        loop {
            let line = tokio::select! {
                biased;
                () = closed.cancelled() => break,
                line = lines.next_line() => line,
            };

            match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    debug!(session = id, "<< {line}");
                    if line.is_empty() {
                        let lines = std::mem::take(&mut block);
                        self.process_block(&lines, &session).await;
                    } else if line == "PING:" && block.is_empty() {
                        reply(&session, protocol::render_status(ACK));
                    } else {
                        block.push(line.to_owned());
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    debug!(session = id, error = %e, "read failed");
                    break;
                }
            }
        }

        self.inner.sessions.remove(&id);
        info!(session = id, %peer, "panel disconnected");
    }

    async fn process_block(&self, lines: &[String], session: &Session) {
        let Some(command) = protocol::parse_block(lines) else {
            return;
        };

        match command {
            Command::Ping => reply(session, protocol::render_status(ACK)),
            Command::Query(block) => {
                let body = self
                    .inner
                    .state
                    .read()
                    .await
                    .render(block, &self.inner.config.model_name);
                reply(session, protocol::render_status(ACK));
                reply(session, body);
            }
            Command::Route(body) => self.apply_routes(&body, session).await,
            Command::Unknown(header) => {
                debug!(header, "unsupported block");
                reply(session, protocol::render_status(NAK));
            }
        }
    }

    async fn apply_routes(&self, body: &[String], session: &Session) {
        let mut accepted = Vec::new();
        let mut requests = Vec::new();

        {
            let mut state = self.inner.state.write().await;
            for line in body {
                let Some((out_idx, in_idx)) = protocol::parse_route(line) else {
                    warn!(line, "unparseable routing line");
                    continue;
                };
                let (Some(receiver_id), Some(source_id)) =
                    (state.outputs.id_at(out_idx), state.inputs.id_at(in_idx))
                else {
                    warn!(line, "routing indices out of range");
                    continue;
                };

                state.set_desired(receiver_id, source_id);
                accepted.push(format!("{out_idx} {in_idx}"));
                requests.push(PatchRequest {
                    source_id,
                    receiver_id,
                    origin: "videohub".into(),
                });
                info!(out_idx, in_idx, receiver_id, source_id, "panel routed output");
            }
        }

        for request in requests {
            if self.inner.patch_tx.send(request).is_err() {
                warn!("patch dispatcher is gone, device not patched");
            }
        }

        reply(session, protocol::render_status(ACK));
        if !accepted.is_empty() {
            reply(
                session,
                protocol::render_named(BlockName::VideoOutputRouting, &accepted),
            );
        }
        self.broadcast_routing().await;
    }
}

fn reply(session: &Session, block: String) {
    if let Some(header) = block.lines().next() {
        debug!(">> {header}");
    }
    session.send(block);
}

async fn write_loop(
    mut writer: OwnedWriteHalf,
    mut rx: mpsc::Receiver<String>,
    cancel: CancellationToken,
) {
    loop {
        let block = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            block = rx.recv() => match block {
                Some(block) => block,
                None => break,
            },
        };
        if let Err(e) = writer.write_all(block.as_bytes()).await {
            debug!(error = %e, "session write failed");
            break;
        }
    }
    let _ = writer.shutdown().await;
}
