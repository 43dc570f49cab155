// ── Routing operation outcomes ──

use serde::Serialize;

use super::group::Essence;
use crate::error::CoreError;

/// Result of one essence of a patch or disconnect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum PatchOutcome {
    Success,
    Skipped {
        reason: String,
    },
    Error {
        message: String,
        #[serde(rename = "http_status", skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },
}

impl PatchOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped {
            reason: reason.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
            status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<CoreError> for PatchOutcome {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceRejected { status, body } => Self::Error {
                message: body,
                status: Some(status),
            },
            other => Self::error(other.to_string()),
        }
    }
}

/// Per-essence outcomes of one multi-essence operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EssenceOutcomes {
    pub video: PatchOutcome,
    pub audio: PatchOutcome,
    pub data: PatchOutcome,
}

impl EssenceOutcomes {
    pub fn get(&self, essence: Essence) -> &PatchOutcome {
        match essence {
            Essence::Video => &self.video,
            Essence::Audio => &self.audio,
            Essence::Data => &self.data,
        }
    }

    /// Three-character code in video/audio/data order; a position is `1`
    /// only when that essence succeeded.
    pub fn code(&self) -> String {
        Essence::ALL
            .iter()
            .map(|e| if self.get(*e).is_success() { '1' } else { '0' })
            .collect()
    }

    pub fn any_success(&self) -> bool {
        Essence::ALL.iter().any(|e| self.get(*e).is_success())
    }

    pub fn has_error(&self) -> bool {
        Essence::ALL
            .iter()
            .any(|e| matches!(self.get(*e), PatchOutcome::Error { .. }))
    }
}

/// Outcome for one receiver of a one-to-many patch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiverPatch {
    pub receiver_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcomes: Option<EssenceOutcomes>,
    /// Set when the receiver could not be patched at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Live sender bound to one receiver essence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EssenceStatus {
    pub essence: Essence,
    pub receiver: String,
    pub sender_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// What a logical receiver is currently fed by.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiverStatus {
    pub receiver_id: u32,
    pub name: String,
    pub essences: Vec<EssenceStatus>,
    /// Name of the source group matching every compared essence.
    pub source: Option<String>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn code_marks_only_successes() {
        let outcomes = EssenceOutcomes {
            video: PatchOutcome::Success,
            audio: PatchOutcome::error("timeout"),
            data: PatchOutcome::Success,
        };
        assert_eq!(outcomes.code(), "101");

        let skipped = EssenceOutcomes {
            video: PatchOutcome::skipped("missing sender or receiver"),
            audio: PatchOutcome::skipped("missing sender or receiver"),
            data: PatchOutcome::skipped("missing sender or receiver"),
        };
        assert_eq!(skipped.code(), "000");
        assert!(!skipped.has_error());
    }

    #[test]
    fn rejection_keeps_device_status() {
        let outcome = PatchOutcome::from(CoreError::DeviceRejected {
            status: 400,
            body: "bad sdp".into(),
        });
        assert_eq!(
            serde_json::to_value(&outcome).unwrap(),
            json!({ "status": "error", "message": "bad sdp", "http_status": 400 })
        );
        assert_eq!(
            serde_json::to_value(PatchOutcome::Success).unwrap(),
            json!({ "status": "success" })
        );
    }
}
