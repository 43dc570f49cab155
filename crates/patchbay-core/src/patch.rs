// ── Patch orchestrator ──
//
// Turns logical source/receiver pairs into IS-05 operations. Essences are
// independent: each one is resolved, patched and reported on its own,
// concurrently, and a failure in one never rolls back another.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures_util::future::join_all;
use tracing::{debug, info, warn};

use patchbay_api::{NmosClient, StagedPatch};

use crate::discovery::DiscoveryCache;
use crate::error::CoreError;
use crate::model::{
    Essence, EssenceOutcomes, EssenceStatus, GroupKind, LogicalGroup, PatchOutcome,
    ReceiverPatch, ReceiverStatus, Resource, Snapshot,
};
use crate::registry::Registry;
use crate::sdp::remove_secondary_streams;

const MISSING_PAIR: &str = "missing sender or receiver";
const MISSING_RECEIVER: &str = "no receiver ID defined";

/// Executes routing changes against the devices.
pub struct Orchestrator {
    client: NmosClient,
    discovery: Arc<DiscoveryCache>,
    registry: Arc<Registry>,
    strip_secondary: AtomicBool,
}

impl Orchestrator {
    pub fn new(
        client: NmosClient,
        discovery: Arc<DiscoveryCache>,
        registry: Arc<Registry>,
        strip_secondary: bool,
    ) -> Self {
        Self {
            client,
            discovery,
            registry,
            strip_secondary: AtomicBool::new(strip_secondary),
        }
    }

    /// Whether secondary (ST 2022-7) streams are removed from SDP files.
    pub fn strip_secondary(&self) -> bool {
        self.strip_secondary.load(Ordering::Relaxed)
    }

    pub fn set_strip_secondary(&self, enabled: bool) {
        self.strip_secondary.store(enabled, Ordering::Relaxed);
    }

    // ── Patch ────────────────────────────────────────────────────────

    /// Route logical source `source_id` to logical receiver `receiver_id`.
    pub async fn patch(&self, source_id: u32, receiver_id: u32) -> Result<EssenceOutcomes, CoreError> {
        let (source, receiver) = self.registry.resolve_pair(source_id, receiver_id);
        let (source_name, source) =
            source.ok_or_else(|| CoreError::not_found("source", source_id))?;
        let (receiver_name, receiver) =
            receiver.ok_or_else(|| CoreError::not_found("receiver", receiver_id))?;

        info!(source = %source_name, receiver = %receiver_name, "patching");
        Ok(self.patch_groups(&source, &receiver).await)
    }

    /// Route one source to many receivers. Each receiver is patched
    /// independently; an unknown receiver only fails its own entry.
    pub async fn patch_many(
        &self,
        source_id: u32,
        receiver_ids: &[u32],
    ) -> Result<Vec<ReceiverPatch>, CoreError> {
        let (source_name, source) = self
            .registry
            .find(GroupKind::Sources, source_id)
            .ok_or_else(|| CoreError::not_found("source", source_id))?;

        info!(source = %source_name, receivers = receiver_ids.len(), "patching to many");

        let results = join_all(receiver_ids.iter().map(|&receiver_id| {
            let source = &source;
            async move {
                match self.registry.find(GroupKind::Receivers, receiver_id) {
                    Some((_, receiver)) => ReceiverPatch {
                        receiver_id,
                        outcomes: Some(self.patch_groups(source, &receiver).await),
                        error: None,
                    },
                    None => ReceiverPatch {
                        receiver_id,
                        outcomes: None,
                        error: Some(CoreError::not_found("receiver", receiver_id).to_string()),
                    },
                }
            }
        }))
        .await;

        Ok(results)
    }

    async fn patch_groups(&self, source: &LogicalGroup, receiver: &LogicalGroup) -> EssenceOutcomes {
        let pairs: Vec<(&str, &str)> = Essence::ALL
            .iter()
            .filter_map(|e| source.device(*e).zip(receiver.device(*e)))
            .collect();

        let snapshot = self
            .snapshot_with(|snap| {
                pairs
                    .iter()
                    .all(|(s, r)| snap.sender(s).is_some() && snap.receiver(r).is_some())
            })
            .await;

        let (video, audio, data) = tokio::join!(
            self.patch_essence(Essence::Video, source, receiver, &snapshot),
            self.patch_essence(Essence::Audio, source, receiver, &snapshot),
            self.patch_essence(Essence::Data, source, receiver, &snapshot),
        );
        EssenceOutcomes { video, audio, data }
    }

    async fn patch_essence(
        &self,
        essence: Essence,
        source: &LogicalGroup,
        receiver: &LogicalGroup,
        snapshot: &Snapshot,
    ) -> PatchOutcome {
        let (Some(sender_id), Some(receiver_id)) = (source.device(essence), receiver.device(essence))
        else {
            return PatchOutcome::skipped(MISSING_PAIR);
        };

        let (Some(sender), Some(receiver)) =
            (snapshot.sender(sender_id), snapshot.receiver(receiver_id))
        else {
            warn!(%essence, sender_id, receiver_id, "device resource not discovered");
            return PatchOutcome::error("receiver or sender not found");
        };

        match self.connect(sender, receiver).await {
            Ok(()) => {
                info!(%essence, sender_id, receiver_id, "essence patched");
                PatchOutcome::Success
            }
            Err(e) => {
                warn!(%essence, sender_id, receiver_id, error = %e, "essence patch failed");
                PatchOutcome::from(e)
            }
        }
    }

    /// Fetch the sender's SDP, stage it on the receiver, then enable the sender.
    async fn connect(&self, sender: &Resource, receiver: &Resource) -> Result<(), CoreError> {
        let sender_ep = sender.node.endpoint()?;
        let receiver_ep = receiver.node.endpoint()?;

        let mut sdp = self.client.transport_file(&sender_ep, &sender.id).await?;
        if self.strip_secondary() {
            sdp = remove_secondary_streams(&sdp);
        }

        self.client
            .stage_receiver(
                &receiver_ep,
                &receiver.id,
                &StagedPatch::connect_receiver(&sender.id, sdp),
            )
            .await?;
        self.client
            .stage_sender(&sender_ep, &sender.id, &StagedPatch::enable_sender())
            .await?;
        Ok(())
    }

    // ── Disconnect ───────────────────────────────────────────────────

    /// Unbind and disable every essence of a logical receiver.
    pub async fn disconnect(&self, receiver_id: u32) -> Result<EssenceOutcomes, CoreError> {
        let (receiver_name, receiver) = self
            .registry
            .find(GroupKind::Receivers, receiver_id)
            .ok_or_else(|| CoreError::not_found("receiver", receiver_id))?;

        info!(receiver = %receiver_name, "disconnecting");
        let snapshot = self.snapshot_with(|snap| all_receivers_known(&receiver, snap)).await;

        let (video, audio, data) = tokio::join!(
            self.disconnect_essence(Essence::Video, &receiver, &snapshot),
            self.disconnect_essence(Essence::Audio, &receiver, &snapshot),
            self.disconnect_essence(Essence::Data, &receiver, &snapshot),
        );
        Ok(EssenceOutcomes { video, audio, data })
    }

    async fn disconnect_essence(
        &self,
        essence: Essence,
        receiver: &LogicalGroup,
        snapshot: &Snapshot,
    ) -> PatchOutcome {
        let Some(receiver_id) = receiver.device(essence) else {
            return PatchOutcome::skipped(MISSING_RECEIVER);
        };
        let Some(resource) = snapshot.receiver(receiver_id) else {
            return PatchOutcome::error("receiver not found");
        };

        let result = async {
            let endpoint = resource.node.endpoint()?;
            self.client
                .stage_receiver(&endpoint, receiver_id, &StagedPatch::disconnect_receiver())
                .await?;
            Ok::<(), CoreError>(())
        }
        .await;

        match result {
            Ok(()) => PatchOutcome::Success,
            Err(e) => {
                warn!(%essence, receiver_id, error = %e, "disconnect failed");
                PatchOutcome::from(e)
            }
        }
    }

    // ── Status ───────────────────────────────────────────────────────

    /// Read what a logical receiver is live-bound to and name the source
    /// group that matches it, if any.
    pub async fn status_of(&self, receiver_id: u32) -> Result<ReceiverStatus, CoreError> {
        let (name, receiver) = self
            .registry
            .find(GroupKind::Receivers, receiver_id)
            .ok_or_else(|| CoreError::not_found("receiver", receiver_id))?;

        let snapshot = self.snapshot_with(|snap| all_receivers_known(&receiver, snap)).await;

        let queries = Essence::ALL.iter().filter_map(|&essence| {
            let device = receiver.device(essence)?;
            let snapshot = &snapshot;
            Some(async move { self.active_sender(essence, device, snapshot).await })
        });
        let essences: Vec<EssenceStatus> = join_all(queries).await;

        let registry = self.registry.snapshot();
        let source = registry
            .groups(GroupKind::Sources)
            .iter()
            .find(|(_, source)| matches_active(source, &essences))
            .map(|(source_name, _)| source_name.clone());

        debug!(receiver = %name, source = ?source, "status resolved");
        Ok(ReceiverStatus {
            receiver_id,
            name,
            essences,
            source,
        })
    }

    async fn active_sender(&self, essence: Essence, device: &str, snapshot: &Snapshot) -> EssenceStatus {
        let mut status = EssenceStatus {
            essence,
            receiver: device.to_owned(),
            sender_id: None,
            error: None,
        };

        let Some(resource) = snapshot.receiver(device) else {
            status.error = Some("receiver not found".into());
            return status;
        };

        let result = async {
            let endpoint = resource.node.endpoint()?;
            Ok::<_, CoreError>(self.client.active_receiver(&endpoint, device).await?)
        }
        .await;

        match result {
            Ok(active) => status.sender_id = active.sender_id,
            Err(e) => {
                warn!(%essence, receiver = device, error = %e, "cannot read active state");
                status.error = Some(e.to_string());
            }
        }
        status
    }

    // ── Helpers ──────────────────────────────────────────────────────

    /// The current snapshot, refreshed once if `complete` says it lacks
    /// something.
    async fn snapshot_with(&self, complete: impl Fn(&Snapshot) -> bool) -> Arc<Snapshot> {
        let snapshot = self.discovery.read();
        if complete(&snapshot) {
            return snapshot;
        }
        debug!("device resource missing from discovery, refreshing");
        self.discovery.refresh().await
    }
}

fn all_receivers_known(receiver: &LogicalGroup, snapshot: &Snapshot) -> bool {
    Essence::ALL
        .iter()
        .filter_map(|e| receiver.device(*e))
        .all(|id| snapshot.receiver(id).is_some())
}

/// A source matches when every essence it shares with the receiver
/// carries that source's device ID as the live sender, with at least one
/// essence compared.
fn matches_active(source: &LogicalGroup, essences: &[EssenceStatus]) -> bool {
    let mut compared = 0usize;
    for status in essences {
        let Some(expected) = source.device(status.essence) else {
            continue;
        };
        if status.sender_id.as_deref() != Some(expected) {
            return false;
        }
        compared += 1;
    }
    compared > 0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn live(essence: Essence, sender: Option<&str>) -> EssenceStatus {
        EssenceStatus {
            essence,
            receiver: format!("r-{essence}"),
            sender_id: sender.map(Into::into),
            error: None,
        }
    }

    #[test]
    fn active_match_ignores_essences_source_lacks() {
        let source = LogicalGroup {
            id: 1,
            video: Some("s-100".into()),
            ..LogicalGroup::default()
        };
        let essences = [
            live(Essence::Video, Some("s-100")),
            live(Essence::Audio, Some("s-555")),
        ];
        assert!(matches_active(&source, &essences));
    }

    #[test]
    fn active_match_needs_a_compared_essence() {
        let source = LogicalGroup {
            id: 1,
            data: Some("s-300".into()),
            ..LogicalGroup::default()
        };
        assert!(!matches_active(&source, &[live(Essence::Video, Some("s-100"))]));
    }

    #[test]
    fn disconnected_essence_does_not_match() {
        let source = LogicalGroup {
            id: 1,
            video: Some("s-100".into()),
            ..LogicalGroup::default()
        };
        assert!(!matches_active(&source, &[live(Essence::Video, None)]));
    }
}
