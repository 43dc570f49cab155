//! Control plane between NMOS devices and broadcast routing panels.
//!
//! - **[`Bridge`]**: application context owning everything below. One-shot
//!   callers use it directly; the daemon calls [`Bridge::start`] to run the
//!   periodic refresh, the patch dispatcher and, when enabled, the emulator.
//!
//! - **[`DiscoveryCache`]**: last-known senders and receivers from every
//!   configured node, swapped atomically on refresh.
//!
//! - **[`Registry`]**: operator-defined logical sources and receivers with
//!   stable numeric IDs, persisted as JSON.
//!
//! - **[`Orchestrator`]**: per-essence IS-05 patching, disconnect and status.
//!
//! - **[`Videohub`]**: emulated Blackmagic Videohub so hardware panels can
//!   route logical groups.

pub mod bridge;
pub mod classify;
pub mod config;
pub mod discovery;
pub mod error;
pub mod model;
pub mod patch;
pub mod reconcile;
pub mod registry;
pub mod sdp;
pub mod videohub;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::{Bridge, ReloadSource};
pub use config::{
    BridgeConfig, DEFAULT_EMULATOR_PORT, DEFAULT_MODEL_NAME, EmulatorConfig, Reload, Settings,
};
pub use discovery::DiscoveryCache;
pub use error::CoreError;
pub use patch::Orchestrator;
pub use reconcile::reconcile;
pub use registry::Registry;
pub use videohub::{PatchRequest, Videohub};

pub use model::{
    Essence, EssenceKind, EssenceOutcomes, EssenceStatus, GroupKind, GroupUpdate, LogicalGroup,
    Node, PatchOutcome, ReceiverPatch, ReceiverStatus, RegistryData, Resource, Snapshot,
};

pub use patchbay_api::{ApiVersions, DetectedVersions, TlsMode, TransportConfig};
