// ── Domain model ──
//
// Device-side resources as discovered, operator-side logical groups as
// registered, and the outcomes of routing operations between them.

pub mod group;
pub mod outcome;
pub mod resource;

// ── Re-exports ──────────────────────────────────────────────────────

pub use group::{Essence, GroupKind, GroupUpdate, LogicalGroup, RegistryData};
pub use outcome::{EssenceOutcomes, EssenceStatus, PatchOutcome, ReceiverPatch, ReceiverStatus};
pub use resource::{EssenceKind, Node, Resource, Snapshot};
