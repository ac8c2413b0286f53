//! IdentityBinder (C4).
//!
//! Resolves a connecting socket's handshake (userId or installId) to a
//! user, binds it, and kicks off delivery of queued offline items. Also
//! exposes `reauth`/`attach_user` for mid-session (re)binding.

use crate::collab::{OfflineMailbox, UserDirectory};
use crate::error::ClientError;
use crate::state::conn::ConnectionRegistry;
use crate::state::ids::{Sid, UserId};
use crate::state::managers::presence::PresenceBroadcaster;
use crate::wire::OutboundEnvelope;
use std::sync::Arc;
use tracing::warn;

pub struct IdentityBinder {
    directory: Arc<dyn UserDirectory>,
    mailbox: Arc<dyn OfflineMailbox>,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceBroadcaster>,
}

/// Handshake parameters read from the WebSocket upgrade query string.
#[derive(Debug, Default, Clone)]
pub struct Handshake {
    pub user_id: Option<String>,
    pub install_id: Option<String>,
}

impl IdentityBinder {
    pub fn new(
        directory: Arc<dyn UserDirectory>,
        mailbox: Arc<dyn OfflineMailbox>,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceBroadcaster>,
    ) -> Self {
        Self { directory, mailbox, registry, presence }
    }

    /// Runs on connect. Returns the bound userId, if resolution succeeded;
    /// a guest connection (no binding) is not an error.
    pub async fn bind_on_connect(&self, sid: &Sid, handshake: &Handshake) -> Option<UserId> {
        let resolved = self.resolve(handshake).await;
        if let Some(ref user_id) = resolved {
            self.bind(sid, user_id.clone()).await;
        }
        resolved
    }

    async fn resolve(&self, handshake: &Handshake) -> Option<UserId> {
        if let Some(ref raw) = handshake.user_id {
            let candidate = UserId::from(raw.as_str());
            match self.directory.exists(&candidate).await {
                Ok(true) => return Some(candidate),
                Ok(false) => {}
                Err(err) => warn!(error = %err, "user directory lookup failed during bind"),
            }
        }
        if let Some(ref install_id) = handshake.install_id {
            match self.directory.resolve_install(install_id).await {
                Ok(Some(user_id)) => return Some(user_id),
                Ok(None) => {}
                Err(err) => warn!(error = %err, "install resolution failed during bind"),
            }
        }
        None
    }

    /// Binds `user_id` to `sid`, evicting any other sid already holding
    /// that userId (duplicate-login policy), and triggers offline-item
    /// delivery.
    pub async fn bind(&self, sid: &Sid, user_id: UserId) {
        if let Some(evicted) = self.registry.bind_user(sid, user_id.clone()) {
            self.registry.send(&evicted, OutboundEnvelope::new("_force_disconnect", serde_json::json!(null)));
        }
        if let Err(err) = self.mailbox.deliver_queued(&user_id).await {
            warn!(%user_id, error = %err, "offline mailbox delivery request failed");
        }
        self.presence.broadcast_online_list();
    }

    /// `reauth` / `attach_user` events: explicit client-driven (re)binding
    /// mid-session, skipping handshake resolution.
    pub async fn attach_user(&self, sid: &Sid, user_id: &str) -> Result<UserId, ClientError> {
        if user_id.trim().is_empty() {
            return Err(ClientError::InvalidUserId);
        }
        let user_id = UserId::from(user_id);
        match self.directory.exists(&user_id).await {
            Ok(true) => {
                self.bind(sid, user_id.clone()).await;
                Ok(user_id)
            }
            Ok(false) => Err(ClientError::InvalidUserId),
            Err(err) => {
                warn!(error = %err, "user directory lookup failed during attach_user");
                Err(ClientError::InvalidUserId)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CollabError;
    use crate::state::managers::presence::PresenceBroadcaster;
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct FakeDirectory;

    #[async_trait]
    impl UserDirectory for FakeDirectory {
        async fn get_user(&self, user_id: &UserId) -> Result<Option<crate::collab::UserRecord>, CollabError> {
            Ok(Some(crate::collab::UserRecord { id: user_id.clone(), nickname: None }))
        }
        async fn exists(&self, user_id: &UserId) -> Result<bool, CollabError> {
            Ok(user_id.as_str() == "known")
        }
        async fn resolve_install(&self, _install_id: &str) -> Result<Option<UserId>, CollabError> {
            Ok(None)
        }
        async fn friends_of(&self, _user_id: &UserId) -> Result<Vec<UserId>, CollabError> {
            Ok(vec![])
        }
        async fn update_profile(
            &self,
            user_id: &UserId,
            _patch: serde_json::Value,
        ) -> Result<crate::collab::UserRecord, CollabError> {
            Ok(crate::collab::UserRecord { id: user_id.clone(), nickname: None })
        }
    }

    struct FakeMailbox;

    #[async_trait]
    impl OfflineMailbox for FakeMailbox {
        async fn deliver_queued(&self, _user_id: &UserId) -> Result<(), CollabError> {
            Ok(())
        }
    }

    fn binder() -> IdentityBinder {
        let registry = Arc::new(ConnectionRegistry::new());
        let presence = Arc::new(PresenceBroadcaster::new(Arc::new(FakeDirectory), registry.clone()));
        IdentityBinder::new(Arc::new(FakeDirectory), Arc::new(FakeMailbox), registry, presence)
    }

    #[tokio::test]
    async fn unknown_user_id_falls_back_to_guest() {
        let binder = binder();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sid = Sid::from("s1");
        binder.registry.connect(sid.clone(), tx);
        let handshake = Handshake { user_id: Some("unknown".into()), install_id: None };
        assert_eq!(binder.bind_on_connect(&sid, &handshake).await, None);
    }

    #[tokio::test]
    async fn known_user_id_binds() {
        let binder = binder();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sid = Sid::from("s1");
        binder.registry.connect(sid.clone(), tx);
        let handshake = Handshake { user_id: Some("known".into()), install_id: None };
        assert_eq!(binder.bind_on_connect(&sid, &handshake).await, Some(UserId::from("known")));
    }
}
