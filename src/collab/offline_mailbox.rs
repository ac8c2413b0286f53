//! OfflineMailbox collaborator — delivers chat items queued while a user
//! was offline. The core only touches its narrow "deliver on bind" surface.

use crate::error::CollabError;
use crate::state::ids::UserId;
use async_trait::async_trait;

#[async_trait]
pub trait OfflineMailbox: Send + Sync {
    /// Requests delivery of any queued items for `user_id`. The mailbox
    /// service is responsible for actually pushing the items to the user
    /// through whatever transport it owns; this call only triggers that.
    async fn deliver_queued(&self, user_id: &UserId) -> Result<(), CollabError>;
}

pub struct HttpOfflineMailbox {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOfflineMailbox {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl OfflineMailbox for HttpOfflineMailbox {
    async fn deliver_queued(&self, user_id: &UserId) -> Result<(), CollabError> {
        self.client
            .post(format!("{}/deliver", self.base_url))
            .json(&serde_json::json!({ "userId": user_id }))
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// No-op mailbox used when no collaborator endpoint is configured.
pub struct NoopOfflineMailbox;

#[async_trait]
impl OfflineMailbox for NoopOfflineMailbox {
    async fn deliver_queued(&self, _user_id: &UserId) -> Result<(), CollabError> {
        Ok(())
    }
}
