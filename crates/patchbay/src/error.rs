//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use patchbay_config::ConfigError;
use patchbay_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Devices ──────────────────────────────────────────────────────
    #[error("Could not reach device at {url}")]
    #[diagnostic(
        code(patchbay::connection_failed),
        help(
            "Check that the node is powered and reachable.\n\
             Reason: {reason}\n\
             Try: patchbay nodes detect {url}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Device rejected the request (HTTP {status})")]
    #[diagnostic(code(patchbay::device_rejected), help("Device said: {body}"))]
    DeviceRejected { status: u16, body: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(patchbay::not_found),
        help("Run: patchbay {list_command} to see what exists")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("{resource_type} '{identifier}' conflicts with an existing one")]
    #[diagnostic(code(patchbay::conflict), help("{detail}"))]
    Conflict {
        resource_type: String,
        identifier: String,
        detail: String,
    },

    #[error("Routing failed for {target} (code {code})")]
    #[diagnostic(
        code(patchbay::patch_failed),
        help("At least one essence reported an error; see the table above.")
    )]
    PatchFailed { target: String, code: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(patchbay::validation))]
    Validation { field: String, reason: String },

    // ── Storage / configuration ──────────────────────────────────────
    #[error("Logical registry at {path} is unusable")]
    #[diagnostic(
        code(patchbay::registry),
        help("{message}\nFix or move the file; a missing file starts an empty registry.")
    )]
    Registry { path: String, message: String },

    #[error(transparent)]
    #[diagnostic(
        code(patchbay::config),
        help("Check the configuration file (see --config) and PATCHBAY_* variables.")
    )]
    Config(ConfigError),

    // ── Other ────────────────────────────────────────────────────────
    #[error("{message}")]
    #[diagnostic(code(patchbay::internal))]
    Internal { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to encode output: {0}")]
    #[diagnostic(code(patchbay::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::Config(ConfigError::Validation { .. }) => {
                exit_code::USAGE
            }
            Self::Config(ConfigError::UnknownNode { .. }) => exit_code::NOT_FOUND,
            Self::Config(ConfigError::DuplicateNode { .. }) => exit_code::CONFLICT,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::DeviceUnreachable { url, reason } => Self::ConnectionFailed { url, reason },

            CoreError::DeviceRejected { status, body } => Self::DeviceRejected { status, body },

            CoreError::NotFound {
                entity_type,
                identifier,
            } => Self::NotFound {
                list_command: list_command(&entity_type),
                resource_type: entity_type,
                identifier,
            },

            CoreError::DuplicateId { kind, id, holder } => Self::Conflict {
                resource_type: format!("{kind} ID"),
                identifier: id.to_string(),
                detail: format!("ID {id} is already used by '{holder}'"),
            },

            CoreError::Registry { path, message } => Self::Registry { path, message },

            CoreError::Config { message } => Self::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Io(e) => Self::Io(e),

            CoreError::Protocol { message } | CoreError::Internal(message) => {
                Self::Internal { message }
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}

fn list_command(entity_type: &str) -> String {
    match entity_type {
        "source" => "groups list sources".into(),
        "receiver" => "groups list receivers".into(),
        "node" => "nodes list".into(),
        _ => "refresh".into(),
    }
}
