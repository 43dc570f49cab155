// IS-05 connection API endpoints
//
// Single-resource staging with immediate activation, transport file
// retrieval, and active-parameter reads.

use tracing::debug;

use crate::client::NmosClient;
use crate::endpoint::{NodeEndpoint, Role};
use crate::error::Error;
use crate::models::{ActiveParams, StagedPatch};

impl NmosClient {
    /// Fetch a sender's transport file (SDP text).
    ///
    /// `GET {root}/connection/{v}/single/senders/{id}/transportfile/`
    pub async fn transport_file(&self, node: &NodeEndpoint, sender_id: &str) -> Result<String, Error> {
        let url = node.connection_url(Role::Sender, sender_id, "transportfile/")?;
        self.get_text(url, self.connection_timeout()).await
    }

    /// Stage (and, with `activate_immediate`, apply) receiver parameters.
    ///
    /// `PATCH {root}/connection/{v}/single/receivers/{id}/staged`
    pub async fn stage_receiver(
        &self,
        node: &NodeEndpoint,
        receiver_id: &str,
        patch: &StagedPatch,
    ) -> Result<(), Error> {
        let url = node.connection_url(Role::Receiver, receiver_id, "staged")?;
        let body = self.patch_json(url, patch, self.connection_timeout()).await?;
        debug!(receiver_id, len = body.len(), "receiver staged");
        Ok(())
    }

    /// Stage (and, with `activate_immediate`, apply) sender parameters.
    ///
    /// `PATCH {root}/connection/{v}/single/senders/{id}/staged`
    pub async fn stage_sender(
        &self,
        node: &NodeEndpoint,
        sender_id: &str,
        patch: &StagedPatch,
    ) -> Result<(), Error> {
        let url = node.connection_url(Role::Sender, sender_id, "staged")?;
        let body = self.patch_json(url, patch, self.connection_timeout()).await?;
        debug!(sender_id, len = body.len(), "sender staged");
        Ok(())
    }

    /// Read a receiver's live parameters.
    ///
    /// `GET {root}/connection/{v}/single/receivers/{id}/active/`
    pub async fn active_receiver(
        &self,
        node: &NodeEndpoint,
        receiver_id: &str,
    ) -> Result<ActiveParams, Error> {
        let url = node.connection_url(Role::Receiver, receiver_id, "active/")?;
        self.get_json(url, self.connection_timeout()).await
    }
}
