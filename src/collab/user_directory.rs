//! UserDirectory collaborator — the persistent user/profile/friendship
//! store. Out of scope for this core; reached by id over HTTP.

use crate::error::CollabError;
use crate::state::ids::UserId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct UserRecord {
    #[serde(rename = "_id")]
    pub id: UserId,
    pub nickname: Option<String>,
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, CollabError>;
    async fn exists(&self, user_id: &UserId) -> Result<bool, CollabError>;
    async fn resolve_install(&self, install_id: &str) -> Result<Option<UserId>, CollabError>;
    async fn friends_of(&self, user_id: &UserId) -> Result<Vec<UserId>, CollabError>;
    async fn are_friends(&self, a: &UserId, b: &UserId) -> Result<bool, CollabError> {
        Ok(self.friends_of(a).await?.contains(b))
    }
    /// Applies a partial profile patch and returns the updated record.
    async fn update_profile(&self, user_id: &UserId, patch: Value) -> Result<UserRecord, CollabError>;
}

pub struct HttpUserDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpUserDirectory {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }
}

#[async_trait]
impl UserDirectory for HttpUserDirectory {
    async fn get_user(&self, user_id: &UserId) -> Result<Option<UserRecord>, CollabError> {
        let resp = self
            .client
            .get(format!("{}/users/{}", self.base_url, user_id))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(resp.error_for_status()?.json().await?))
    }

    async fn exists(&self, user_id: &UserId) -> Result<bool, CollabError> {
        Ok(self.get_user(user_id).await?.is_some())
    }

    async fn resolve_install(&self, install_id: &str) -> Result<Option<UserId>, CollabError> {
        #[derive(Deserialize)]
        struct InstallResponse {
            #[serde(rename = "userId")]
            user_id: Option<UserId>,
        }
        let resp = self
            .client
            .get(format!("{}/installs/{}", self.base_url, install_id))
            .send()
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let body: InstallResponse = resp.error_for_status()?.json().await?;
        Ok(body.user_id)
    }

    async fn friends_of(&self, user_id: &UserId) -> Result<Vec<UserId>, CollabError> {
        #[derive(Deserialize)]
        struct FriendsResponse {
            friends: Vec<UserId>,
        }
        let resp = self
            .client
            .get(format!("{}/users/{}/friends", self.base_url, user_id))
            .send()
            .await?
            .error_for_status()?;
        let body: FriendsResponse = resp.json().await?;
        Ok(body.friends)
    }

    async fn update_profile(&self, user_id: &UserId, patch: Value) -> Result<UserRecord, CollabError> {
        let resp = self
            .client
            .patch(format!("{}/users/{}", self.base_url, user_id))
            .json(&patch)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json().await?)
    }
}
