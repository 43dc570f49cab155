// patchbay-api: Async Rust client for NMOS device APIs (IS-04 node + IS-05 connection)

pub mod client;
pub mod connection;
pub mod endpoint;
pub mod error;
pub mod models;
pub mod node;
pub mod transport;

pub use client::NmosClient;
pub use endpoint::{ApiVersions, KNOWN_VERSIONS, NodeEndpoint, Role};
pub use error::Error;
pub use models::{
    ActiveParams, Activation, ActivationMode, Caps, DetectedVersions, NmosResource, StagedPatch,
    Subscription, TransportFile,
};
pub use transport::{TlsMode, TransportConfig};
