// IS-04 node API endpoints
//
// Resource listing and API version probing. Lists are decoded leniently:
// a device that slips a non-object into its array loses that element,
// not the whole list.

use serde_json::Value;
use tracing::{debug, warn};

use crate::client::NmosClient;
use crate::endpoint::{ApiVersions, KNOWN_VERSIONS, NodeEndpoint, Role};
use crate::error::Error;
use crate::models::{DetectedVersions, NmosResource};

/// Connection API list entries are `"<uuid>/"`; anything shorter is not a
/// real resource path.
const MIN_RESOURCE_PATH_LEN: usize = 30;

impl NmosClient {
    /// List a node's senders.
    ///
    /// `GET {root}/node/{v}/senders/`
    pub async fn list_senders(&self, node: &NodeEndpoint) -> Result<Vec<NmosResource>, Error> {
        self.list_resources(node, "senders").await
    }

    /// List a node's receivers.
    ///
    /// `GET {root}/node/{v}/receivers/`
    pub async fn list_receivers(&self, node: &NodeEndpoint) -> Result<Vec<NmosResource>, Error> {
        self.list_resources(node, "receivers").await
    }

    async fn list_resources(
        &self,
        node: &NodeEndpoint,
        resource: &str,
    ) -> Result<Vec<NmosResource>, Error> {
        let url = node.node_url(resource)?;
        let raw: Value = self.get_json(url, self.discovery_timeout()).await?;

        let Value::Array(items) = raw else {
            return Err(Error::Deserialization {
                message: format!("expected a list of {resource}"),
                body: raw.to_string(),
            });
        };

        let total = items.len();
        let resources: Vec<NmosResource> = items
            .into_iter()
            .filter(Value::is_object)
            .filter_map(|item| match serde_json::from_value(item) {
                Ok(res) => Some(res),
                Err(e) => {
                    warn!(error = %e, resource, "skipping malformed resource");
                    None
                }
            })
            .collect();

        debug!(resource, kept = resources.len(), total, "listed resources");
        Ok(resources)
    }

    /// Query a base URL for the newest IS-04 and IS-05 versions it answers.
    ///
    /// Each API is tried independently from newest to oldest; a version
    /// counts only if it answers 200 with a plausible resource list.
    pub async fn detect_versions(&self, base_url: &str) -> Result<DetectedVersions, Error> {
        let candidate = NodeEndpoint::new(base_url, ApiVersions::default())?;
        let (node, connection) = tokio::join!(
            self.detect_node_version(&candidate),
            self.detect_connection_version(&candidate),
        );
        Ok(DetectedVersions { node, connection })
    }

    async fn detect_node_version(&self, candidate: &NodeEndpoint) -> Option<String> {
        for version in KNOWN_VERSIONS {
            let Ok(url) = candidate.node_url_for(version, "sources") else {
                continue;
            };
            match self.get_json::<Value>(url, self.discovery_timeout()).await {
                Ok(Value::Array(items)) if items.iter().any(|i| i.get("id").is_some()) => {
                    return Some(version.to_owned());
                }
                Ok(_) => debug!(version, "node API answered without resources"),
                Err(e) => debug!(version, error = %e, "node API version check failed"),
            }
        }
        None
    }

    async fn detect_connection_version(&self, candidate: &NodeEndpoint) -> Option<String> {
        for version in KNOWN_VERSIONS {
            let Ok(url) = candidate.connection_list_url_for(version, Role::Receiver) else {
                continue;
            };
            match self.get_json::<Value>(url, self.discovery_timeout()).await {
                Ok(Value::Array(items)) if looks_like_connection_list(&items) => {
                    return Some(version.to_owned());
                }
                Ok(_) => debug!(version, "connection API answered without receivers"),
                Err(e) => debug!(version, error = %e, "connection API version check failed"),
            }
        }
        None
    }
}

fn looks_like_connection_list(items: &[Value]) -> bool {
    let has_objects = items
        .iter()
        .any(|i| i.is_object() && i.get("id").is_some());
    let all_paths = !items.is_empty()
        && items.iter().all(|i| {
            i.as_str()
                .is_some_and(|s| s.trim_matches('/').len() >= MIN_RESOURCE_PATH_LEN)
        });
    has_objects || all_paths
}
