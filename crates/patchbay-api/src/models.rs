// NMOS wire types
//
// IS-04 resources are modelled loosely: devices in the field disagree
// about which optional fields they fill in, and some send `null` where
// the schema says string. Everything we don't use lands in `extra`.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ── IS-04 ────────────────────────────────────────────────────────────

/// A sender or receiver from the IS-04 node API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NmosResource {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub label: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Format URN, e.g. `urn:x-nmos:format:video`. Receivers carry it
    /// directly; senders usually don't.
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub caps: Option<Caps>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: BTreeMap<String, Vec<String>>,
    /// Receivers only: what the device reports it is subscribed to.
    #[serde(default)]
    pub subscription: Option<Subscription>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Receiver capabilities.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Caps {
    #[serde(default, deserialize_with = "null_as_default")]
    pub media_types: Vec<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Receiver subscription as advertised in IS-04.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub active: bool,
}

// ── IS-05 ────────────────────────────────────────────────────────────

/// Body of a `PATCH .../staged` request.
///
/// `sender_id` is tri-state: absent (sender-side staging), a value
/// (connect), or explicit `null` (disconnect).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StagedPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<Option<String>>,
    pub master_enable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transport_file: Option<TransportFile>,
    pub activation: Activation,
}

impl StagedPatch {
    /// Bind a receiver to `sender_id` using the sender's SDP, effective now.
    pub fn connect_receiver(sender_id: impl Into<String>, sdp: impl Into<String>) -> Self {
        Self {
            sender_id: Some(Some(sender_id.into())),
            master_enable: true,
            transport_file: Some(TransportFile::sdp(sdp)),
            activation: Activation::immediate(),
        }
    }

    /// Enable a sender, effective now.
    pub fn enable_sender() -> Self {
        Self {
            sender_id: None,
            master_enable: true,
            transport_file: None,
            activation: Activation::immediate(),
        }
    }

    /// Unbind and disable a receiver, effective now.
    pub fn disconnect_receiver() -> Self {
        Self {
            sender_id: Some(None),
            master_enable: false,
            transport_file: None,
            activation: Activation::immediate(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransportFile {
    pub data: String,
    #[serde(rename = "type")]
    pub media_type: String,
}

impl TransportFile {
    pub fn sdp(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            media_type: "application/sdp".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Activation {
    pub mode: ActivationMode,
}

impl Activation {
    pub fn immediate() -> Self {
        Self {
            mode: ActivationMode::ActivateImmediate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMode {
    ActivateImmediate,
}

/// `GET .../receivers/{id}/active/`: only the fields we route on.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActiveParams {
    #[serde(default)]
    pub sender_id: Option<String>,
    #[serde(default)]
    pub master_enable: bool,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Result of probing a node for API versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectedVersions {
    pub node: Option<String>,
    pub connection: Option<String>,
}
