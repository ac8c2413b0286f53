//! PresenceBroadcaster (C3).
//!
//! Presence deltas fan out only to friends of the subject (an O(F) emit),
//! never to the whole online population (an O(N) emit), which is the
//! difference that keeps this usable at scale.

use crate::collab::UserDirectory;
use crate::state::conn::ConnectionRegistry;
use crate::state::ids::UserId;
use crate::wire::OutboundEnvelope;
use std::sync::Arc;
use tracing::warn;

pub struct PresenceBroadcaster {
    directory: Arc<dyn UserDirectory>,
    registry: Arc<ConnectionRegistry>,
}

impl PresenceBroadcaster {
    pub fn new(directory: Arc<dyn UserDirectory>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { directory, registry }
    }

    /// Emits `presence:update { userId, busy }` to every friend of
    /// `user_id` currently online, plus to `user_id` themselves.
    pub async fn broadcast(&self, user_id: &UserId, busy: bool) {
        let friends = match self.directory.friends_of(user_id).await {
            Ok(friends) => friends,
            Err(err) => {
                warn!(%user_id, error = %err, "failed to fetch friends for presence broadcast");
                return;
            }
        };

        let envelope = OutboundEnvelope::new(
            "presence:update",
            serde_json::json!({ "userId": user_id, "busy": busy }),
        );
        let recipients = friends.len() + 1;
        for friend in &friends {
            self.registry.send_to_user(friend, envelope.clone());
        }
        self.registry.send_to_user(user_id, envelope);
        crate::metrics::record_fanout(recipients);
    }

    /// Emits the full online list, used only around bind/unbind
    /// transitions rather than per busy/idle change.
    pub fn broadcast_online_list(&self) {
        let online = self.registry.online_users();
        let envelope = OutboundEnvelope::new("presence_update", serde_json::json!({ "list": online }));
        for user_id in &online {
            self.registry.send_to_user(user_id, envelope.clone());
        }
    }
}
