//! Media-server (SFU) token-minting collaborator. The core never carries
//! media; it only mints short-lived access tokens for the configured SFU.

use crate::error::CollabError;
use crate::state::ids::UserId;
use async_trait::async_trait;
use serde::Deserialize;

pub struct MintedToken {
    pub token: String,
    pub url: String,
}

#[async_trait]
pub trait MediaTokenMinter: Send + Sync {
    async fn mint(&self, user_id: &UserId, room_name: &str) -> Result<MintedToken, CollabError>;
}

pub struct HttpMediaTokenMinter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    room_url: String,
}

impl HttpMediaTokenMinter {
    pub fn new(base_url: String, room_url: String, api_key: String, api_secret: String) -> Self {
        Self { client: reqwest::Client::new(), base_url, api_key, api_secret, room_url }
    }
}

#[async_trait]
impl MediaTokenMinter for HttpMediaTokenMinter {
    async fn mint(&self, user_id: &UserId, room_name: &str) -> Result<MintedToken, CollabError> {
        #[derive(Deserialize)]
        struct TokenResponse {
            token: String,
        }
        let resp = self
            .client
            .post(format!("{}/token", self.base_url))
            .basic_auth(&self.api_key, Some(&self.api_secret))
            .json(&serde_json::json!({ "identity": user_id, "room": room_name }))
            .send()
            .await?
            .error_for_status()?;
        let body: TokenResponse = resp.json().await?;
        Ok(MintedToken { token: body.token, url: self.room_url.clone() })
    }
}
