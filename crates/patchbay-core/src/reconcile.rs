// ── Reconciliation ──
//
// Derives logical routing (receiver group → source group) from what the
// devices themselves report in the discovery snapshot.

use std::collections::BTreeMap;

use tracing::{debug, info};

use crate::model::{Essence, GroupKind, LogicalGroup, RegistryData, Snapshot};

/// Match every receiver group against the source groups.
///
/// A source matches a receiver when, for every essence both define, the
/// receiver's device resource is in the snapshot and reports being bound
/// to the source's device resource for that essence. At least one
/// essence must be compared. Source groups are tried in registry order
/// and the first match wins.
pub fn reconcile(registry: &RegistryData, snapshot: &Snapshot) -> BTreeMap<u32, u32> {
    let mut routing = BTreeMap::new();

    for (receiver_name, receiver) in registry.groups(GroupKind::Receivers) {
        let matched = registry
            .groups(GroupKind::Sources)
            .iter()
            .find(|(source_name, source)| {
                source_matches(receiver_name, receiver, source_name, source, snapshot)
            });

        match matched {
            Some((source_name, source)) => {
                debug!(receiver = %receiver_name, source = %source_name, "routing matched");
                routing.insert(receiver.id, source.id);
            }
            None => debug!(receiver = %receiver_name, "no matching source"),
        }
    }

    info!(matched = routing.len(), "routing reconciled");
    routing
}

fn source_matches(
    receiver_name: &str,
    receiver: &LogicalGroup,
    source_name: &str,
    source: &LogicalGroup,
    snapshot: &Snapshot,
) -> bool {
    let mut compared = 0usize;

    for essence in Essence::ALL {
        let (Some(receiver_dev), Some(sender_dev)) =
            (receiver.device(essence), source.device(essence))
        else {
            continue;
        };

        let Some(resource) = snapshot.receiver(receiver_dev) else {
            debug!(
                receiver = receiver_name,
                %essence,
                device = receiver_dev,
                "receiver missing from discovery"
            );
            return false;
        };

        if resource.bound_sender.as_deref() != Some(sender_dev) {
            debug!(
                receiver = receiver_name,
                source = source_name,
                %essence,
                expected = sender_dev,
                actual = ?resource.bound_sender,
                "essence mismatch"
            );
            return false;
        }
        compared += 1;
    }

    compared > 0
}
