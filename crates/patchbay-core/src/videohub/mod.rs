// ── Videohub emulator ──
//
// Speaks the Blackmagic Videohub Ethernet protocol (v2.3) so hardware
// control panels can drive logical routing.

pub mod protocol;
pub mod server;
pub mod state;

pub use server::{PatchRequest, Videohub};
pub use state::{HubState, IndexMap};
