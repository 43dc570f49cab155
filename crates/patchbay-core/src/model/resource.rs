// ── Discovered device resources ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use patchbay_api::{ApiVersions, NmosResource, NodeEndpoint};

use crate::classify::classify;
use crate::error::CoreError;

/// A registered NMOS device endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub name: String,
    /// Base URL as the operator entered it.
    pub url: String,
    #[serde(default)]
    pub versions: ApiVersions,
}

impl Node {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            versions: ApiVersions::default(),
        }
    }

    pub fn endpoint(&self) -> Result<NodeEndpoint, CoreError> {
        Ok(NodeEndpoint::new(&self.url, self.versions.clone())?)
    }
}

/// Essence classification of a device resource.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum EssenceKind {
    Video,
    Audio,
    Ancillary,
    #[default]
    Unknown,
}

/// A sender or receiver found on a node during discovery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub kind: EssenceKind,
    /// Owning node.
    pub node: Node,
    /// Receivers only: the sender the device reports it is bound to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_sender: Option<String>,
}

impl Resource {
    pub fn from_nmos(res: NmosResource, node: &Node) -> Self {
        let kind = classify(&res);
        let bound_sender = res.subscription.and_then(|s| s.sender_id);
        Self {
            id: res.id,
            label: res.label,
            description: res.description,
            kind,
            node: node.clone(),
            bound_sender,
        }
    }
}

/// Point-in-time result of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub receivers: Vec<Resource>,
    #[serde(default)]
    pub senders: Vec<Resource>,
    #[serde(default)]
    pub refreshed_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn receiver(&self, id: &str) -> Option<&Resource> {
        self.receivers.iter().find(|r| r.id == id)
    }

    pub fn sender(&self, id: &str) -> Option<&Resource> {
        self.senders.iter().find(|s| s.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.receivers.is_empty() && self.senders.is_empty()
    }
}
