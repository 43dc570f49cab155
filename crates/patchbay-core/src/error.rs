// ── Core error types ──
//
// Routing-level errors from patchbay-core. Callers never match on
// reqwest or serde errors directly: the `From<patchbay_api::Error>` impl
// folds transport failures into `DeviceUnreachable` and non-2xx answers
// into `DeviceRejected`.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Device errors ────────────────────────────────────────────────
    #[error("Cannot reach device at {url}: {reason}")]
    DeviceUnreachable { url: String, reason: String },

    #[error("Device rejected request (HTTP {status}): {body}")]
    DeviceRejected { status: u16, body: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },

    #[error("Duplicate {kind} ID {id}: already used by '{holder}'")]
    DuplicateId {
        kind: String,
        id: u32,
        holder: String,
    },

    #[error("Logical registry at {path}: {message}")]
    Registry { path: String, message: String },

    // ── Local I/O and protocol ───────────────────────────────────────
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub(crate) fn not_found(entity_type: &str, identifier: impl ToString) -> Self {
        Self::NotFound {
            entity_type: entity_type.to_owned(),
            identifier: identifier.to_string(),
        }
    }

    /// HTTP status carried by a device rejection.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::DeviceRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<patchbay_api::Error> for CoreError {
    fn from(err: patchbay_api::Error) -> Self {
        match err {
            patchbay_api::Error::Transport(ref e) => {
                if let Some(status) = e.status() {
                    CoreError::DeviceRejected {
                        status: status.as_u16(),
                        body: e.to_string(),
                    }
                } else {
                    CoreError::DeviceUnreachable {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                }
            }
            patchbay_api::Error::Rejected { status, body } => {
                CoreError::DeviceRejected { status, body }
            }
            patchbay_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid node URL: {e}"),
            },
            patchbay_api::Error::Tls(msg) => CoreError::DeviceUnreachable {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            patchbay_api::Error::Deserialization { message, body: _ } => CoreError::Protocol {
                message: format!("Unexpected device response: {message}"),
            },
            patchbay_api::Error::UnsupportedVersion { api, url } => CoreError::DeviceUnreachable {
                url,
                reason: format!("no supported {api} API version"),
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn rejected_keeps_status_and_body() {
        let err = CoreError::from(patchbay_api::Error::Rejected {
            status: 409,
            body: "staged params locked".into(),
        });
        assert_eq!(err.status(), Some(409));
        assert!(err.to_string().contains("staged params locked"));
    }

    #[test]
    fn bad_url_is_config_error() {
        let api_err =
            patchbay_api::NodeEndpoint::new("not a url", patchbay_api::ApiVersions::default())
                .unwrap_err();
        let err = CoreError::from(api_err);
        assert!(matches!(err, CoreError::Config { .. }));
    }
}
