// ── Logical groups ──
//
// Operator-defined signal paths. A group bundles up to one device
// resource ID per essence under a small integer ID; the name is the map
// key and may change, the ID is the stable handle.

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize};
use strum::{Display, EnumString};

/// A logical essence slot.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Essence {
    Video,
    Audio,
    Data,
}

impl Essence {
    /// Every essence, in status-code order.
    pub const ALL: [Essence; 3] = [Essence::Video, Essence::Audio, Essence::Data];
}

/// Which of the two registries a group lives in.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum GroupKind {
    #[strum(to_string = "sources", serialize = "source")]
    Sources,
    #[strum(to_string = "receivers", serialize = "receiver")]
    Receivers,
}

impl GroupKind {
    /// Singular noun for messages.
    pub fn singular(self) -> &'static str {
        match self {
            Self::Sources => "source",
            Self::Receivers => "receiver",
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// An operator-named group of per-essence device resource IDs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalGroup {
    pub id: u32,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub video: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio: Option<String>,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub data: Option<String>,
}

impl LogicalGroup {
    /// Device resource ID configured for `essence`, if any.
    pub fn device(&self, essence: Essence) -> Option<&str> {
        match essence {
            Essence::Video => self.video.as_deref(),
            Essence::Audio => self.audio.as_deref(),
            Essence::Data => self.data.as_deref(),
        }
    }
}

/// Input to `Registry::add_or_update`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GroupUpdate {
    pub name: String,
    /// Previous name when renaming.
    pub original_name: Option<String>,
    /// Explicit ID; `None` keeps the existing ID or allocates the next one.
    pub id: Option<u32>,
    pub video: Option<String>,
    pub audio: Option<String>,
    pub data: Option<String>,
}

impl GroupUpdate {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: u32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn renamed_from(mut self, original: impl Into<String>) -> Self {
        self.original_name = Some(original.into());
        self
    }

    pub fn with_device(mut self, essence: Essence, device_id: impl Into<String>) -> Self {
        let slot = match essence {
            Essence::Video => &mut self.video,
            Essence::Audio => &mut self.audio,
            Essence::Data => &mut self.data,
        };
        *slot = Some(device_id.into());
        self
    }
}

/// Both registries, keyed by group name in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryData {
    #[serde(default)]
    pub sources: IndexMap<String, LogicalGroup>,
    #[serde(default)]
    pub receivers: IndexMap<String, LogicalGroup>,
}

impl RegistryData {
    pub fn groups(&self, kind: GroupKind) -> &IndexMap<String, LogicalGroup> {
        match kind {
            GroupKind::Sources => &self.sources,
            GroupKind::Receivers => &self.receivers,
        }
    }

    pub(crate) fn groups_mut(&mut self, kind: GroupKind) -> &mut IndexMap<String, LogicalGroup> {
        match kind {
            GroupKind::Sources => &mut self.sources,
            GroupKind::Receivers => &mut self.receivers,
        }
    }

    /// Lookup by ID value, not by name.
    pub fn find(&self, kind: GroupKind, id: u32) -> Option<(&str, &LogicalGroup)> {
        self.groups(kind)
            .iter()
            .find(|(_, g)| g.id == id)
            .map(|(name, g)| (name.as_str(), g))
    }
}
