// ── Emulator routing state ──
//
// Logical IDs never go on the wire: panels address inputs and outputs
// by their position in the sorted ID list. `HubState` is replaced as a
// whole on reload so a broadcast never sees labels from one registry
// generation and indices from another.

use std::collections::BTreeMap;

use crate::model::{GroupKind, RegistryData};

use super::protocol::{self, BlockName};

/// Dense zero-based positions for a sorted set of logical IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexMap {
    ids: Vec<u32>,
}

#[allow(clippy::len_without_is_empty)]
impl IndexMap {
    pub fn from_ids(ids: impl IntoIterator<Item = u32>) -> Self {
        let mut ids: Vec<u32> = ids.into_iter().collect();
        ids.sort_unstable();
        ids.dedup();
        Self { ids }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Logical ID at wire position `index`.
    pub fn id_at(&self, index: usize) -> Option<u32> {
        self.ids.get(index).copied()
    }

    /// Wire position of logical ID `id`.
    pub fn index_of(&self, id: u32) -> Option<usize> {
        self.ids.binary_search(&id).ok()
    }

    pub fn ids(&self) -> &[u32] {
        &self.ids
    }
}

/// Labels, index maps and routing for one registry generation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HubState {
    pub inputs: IndexMap,
    pub outputs: IndexMap,
    input_labels: BTreeMap<u32, String>,
    output_labels: BTreeMap<u32, String>,
    /// receiver ID → source ID, as last reconciled from the devices.
    observed: BTreeMap<u32, u32>,
    /// receiver ID → source ID, as requested since the last reconciliation.
    desired: BTreeMap<u32, u32>,
}

impl HubState {
    pub fn from_registry(registry: &RegistryData) -> Self {
        let labels = |kind| -> BTreeMap<u32, String> {
            registry
                .groups(kind)
                .iter()
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, group)| (group.id, name.clone()))
                .collect()
        };
        let input_labels = labels(GroupKind::Sources);
        let output_labels = labels(GroupKind::Receivers);

        Self {
            inputs: IndexMap::from_ids(input_labels.keys().copied()),
            outputs: IndexMap::from_ids(output_labels.keys().copied()),
            input_labels,
            output_labels,
            observed: BTreeMap::new(),
            desired: BTreeMap::new(),
        }
    }

    /// Effective route for a receiver: desired wins over observed.
    pub fn route(&self, receiver_id: u32) -> Option<u32> {
        self.desired
            .get(&receiver_id)
            .or_else(|| self.observed.get(&receiver_id))
            .copied()
    }

    /// Every receiver with an effective route.
    pub fn routes(&self) -> BTreeMap<u32, u32> {
        let mut routes = self.observed.clone();
        routes.extend(self.desired.iter().map(|(r, s)| (*r, *s)));
        routes
    }

    pub fn set_desired(&mut self, receiver_id: u32, source_id: u32) {
        self.desired.insert(receiver_id, source_id);
    }

    /// Install a reconciliation result; pending requests are superseded.
    pub fn apply_observed(&mut self, observed: BTreeMap<u32, u32>) {
        self.observed = observed;
        self.desired.clear();
    }

    // ── Rendering ────────────────────────────────────────────────────

    pub fn render(&self, block: BlockName, model_name: &str) -> String {
        match block {
            BlockName::VideohubDevice => {
                protocol::device_info(model_name, self.inputs.len(), self.outputs.len())
            }
            BlockName::InputLabels => render_labels(block, &self.inputs, &self.input_labels),
            BlockName::OutputLabels => render_labels(block, &self.outputs, &self.output_labels),
            BlockName::VideoOutputRouting => self.render_routing(),
        }
    }

    /// Only outputs whose route resolves to a known input are listed.
    pub fn render_routing(&self) -> String {
        let lines: Vec<String> = self
            .outputs
            .ids()
            .iter()
            .enumerate()
            .filter_map(|(out_idx, receiver_id)| {
                let source_id = self.route(*receiver_id)?;
                let in_idx = self.inputs.index_of(source_id)?;
                Some(format!("{out_idx} {in_idx}"))
            })
            .collect();
        protocol::render_named(BlockName::VideoOutputRouting, &lines)
    }
}

fn render_labels(block: BlockName, index: &IndexMap, labels: &BTreeMap<u32, String>) -> String {
    let lines: Vec<String> = index
        .ids()
        .iter()
        .enumerate()
        .map(|(idx, id)| {
            let label = labels.get(id).map_or("", String::as_str);
            format!("{idx} {label}")
        })
        .collect();
    protocol::render_named(block, &lines)
}
