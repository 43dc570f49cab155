// NMOS URL construction
//
// Devices are registered by whatever base URL the operator typed: with or
// without `/x-nmos`, with or without a trailing slash. Everything is
// normalized here to a single API root so the node and connection APIs
// are built the same way.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;

/// Versions tried by [`NmosClient::detect_versions`](crate::NmosClient::detect_versions),
/// newest first.
pub const KNOWN_VERSIONS: [&str; 4] = ["v1.3", "v1.2", "v1.1", "v1.0"];

/// API versions spoken by a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiVersions {
    /// IS-04 node API version (e.g. `v1.3`).
    #[serde(default = "default_node_version")]
    pub node: String,
    /// IS-05 connection API version (e.g. `v1.1`).
    #[serde(default = "default_connection_version")]
    pub connection: String,
}

fn default_node_version() -> String {
    "v1.3".into()
}
fn default_connection_version() -> String {
    "v1.1".into()
}

impl Default for ApiVersions {
    fn default() -> Self {
        Self {
            node: default_node_version(),
            connection: default_connection_version(),
        }
    }
}

/// Sender or receiver side of the IS-05 single API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Sender,
    Receiver,
}

impl Role {
    fn path_segment(self) -> &'static str {
        match self {
            Self::Sender => "senders",
            Self::Receiver => "receivers",
        }
    }
}

/// A device's `x-nmos` API root plus the versions to address it with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeEndpoint {
    root: String,
    versions: ApiVersions,
}

impl NodeEndpoint {
    /// Normalize `base_url` into an API root.
    ///
    /// `http://10.0.0.5:8080`, `http://10.0.0.5:8080/` and
    /// `http://10.0.0.5:8080/x-nmos/` all yield `http://10.0.0.5:8080/x-nmos`.
    pub fn new(base_url: &str, versions: ApiVersions) -> Result<Self, Error> {
        let trimmed = base_url.trim().trim_end_matches('/');
        // Validate the operator-supplied part before we start appending to it.
        Url::parse(trimmed)?;

        let root = if trimmed.contains("/x-nmos") {
            trimmed.to_owned()
        } else {
            format!("{trimmed}/x-nmos")
        };

        Ok(Self { root, versions })
    }

    pub fn api_root(&self) -> &str {
        &self.root
    }

    pub fn versions(&self) -> &ApiVersions {
        &self.versions
    }

    /// `{root}/node/{v}/{resource}/`
    pub fn node_url(&self, resource: &str) -> Result<Url, Error> {
        self.node_url_for(&self.versions.node, resource)
    }

    pub(crate) fn node_url_for(&self, version: &str, resource: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!("{}/node/{version}/{resource}/", self.root))?)
    }

    /// `{root}/connection/{v}/single/{senders|receivers}/{id}/{leaf}`
    ///
    /// `leaf` is used verbatim so callers decide about trailing slashes
    /// (`staged` vs `active/`), matching what devices expect.
    pub fn connection_url(&self, role: Role, id: &str, leaf: &str) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "{}/connection/{}/single/{}/{id}/{leaf}",
            self.root,
            self.versions.connection,
            role.path_segment()
        ))?)
    }

    pub(crate) fn connection_list_url_for(&self, version: &str, role: Role) -> Result<Url, Error> {
        Ok(Url::parse(&format!(
            "{}/connection/{version}/single/{}/",
            self.root,
            role.path_segment()
        ))?)
    }
}
