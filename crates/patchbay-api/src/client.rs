// NMOS HTTP client
//
// Wraps `reqwest::Client` with per-request timeouts and status handling.
// Endpoint methods live in `node.rs` (IS-04) and `connection.rs` (IS-05)
// as inherent methods, keeping this module focused on transport mechanics.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Longest body excerpt carried in errors.
const BODY_PREVIEW: usize = 200;

/// Raw HTTP client for NMOS device APIs.
///
/// Stateless with respect to devices: every call takes a
/// [`NodeEndpoint`](crate::NodeEndpoint), so one client serves all nodes.
#[derive(Debug, Clone)]
pub struct NmosClient {
    http: reqwest::Client,
    discovery_timeout: Duration,
    connection_timeout: Duration,
}

impl NmosClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            discovery_timeout: transport.discovery_timeout,
            connection_timeout: transport.connection_timeout,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        discovery_timeout: Duration,
        connection_timeout: Duration,
    ) -> Self {
        Self {
            http,
            discovery_timeout,
            connection_timeout,
        }
    }

    pub fn discovery_timeout(&self) -> Duration {
        self.discovery_timeout
    }

    pub fn connection_timeout(&self) -> Duration {
        self.connection_timeout
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// GET and decode a JSON body.
    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        url: Url,
        timeout: Duration,
    ) -> Result<T, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).timeout(timeout).send().await?;
        let body = Self::success_body(resp).await?;
        serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: format!("{e} (body preview: {:?})", preview(&body)),
            body,
        })
    }

    /// GET a body as text (used for SDP transport files).
    pub(crate) async fn get_text(&self, url: Url, timeout: Duration) -> Result<String, Error> {
        debug!("GET {}", url);
        let resp = self.http.get(url).timeout(timeout).send().await?;
        Self::success_body(resp).await
    }

    /// PATCH a JSON body; the response body is returned for logging.
    pub(crate) async fn patch_json(
        &self,
        url: Url,
        body: &(impl Serialize + Sync),
        timeout: Duration,
    ) -> Result<String, Error> {
        debug!("PATCH {}", url);
        let resp = self
            .http
            .patch(url)
            .json(body)
            .timeout(timeout)
            .send()
            .await?;
        Self::success_body(resp).await
    }

    /// Read the body, turning any non-2xx status into `Error::Rejected`.
    async fn success_body(resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let body = resp.text().await?;
        trace!(%status, len = body.len(), "response received");

        if status.is_success() {
            Ok(body)
        } else {
            Err(Error::Rejected {
                status: status.as_u16(),
                body: preview(&body).to_owned(),
            })
        }
    }
}

fn preview(body: &str) -> &str {
    match body.char_indices().nth(BODY_PREVIEW) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
