//! Matcher (C5) — randomized matchmaking.
//!
//! `tryMatch` is reentrancy-guarded per sid and uses first-in-queue-order
//! candidate selection (deterministic, trivially testable), filtering out
//! self-matches across devices and pair-banned rematches except when the
//! queue is too small to make the ban viable (a liveness exception).

use crate::clock::SharedClock;
use crate::collab::MediaTokenMinter;
use crate::config::MatcherConfig;
use crate::state::conn::ConnectionRegistry;
use crate::state::ids::{Sid, UserId, sid_room_name, user_room_name};
use crate::state::managers::presence::PresenceBroadcaster;
use crate::state::managers::queue_store::SharedQueueStore;
use crate::wire::OutboundEnvelope;
use dashmap::DashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct Matcher {
    store: SharedQueueStore,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceBroadcaster>,
    tokens: Arc<dyn MediaTokenMinter>,
    clock: SharedClock,
    config: MatcherConfig,
    in_progress: DashSet<Sid>,
}

impl Matcher {
    pub fn new(
        store: SharedQueueStore,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceBroadcaster>,
        tokens: Arc<dyn MediaTokenMinter>,
        clock: SharedClock,
        config: MatcherConfig,
    ) -> Self {
        Self { store, registry, presence, tokens, clock, config, in_progress: DashSet::new() }
    }

    fn lock_ttl(&self) -> Duration {
        Duration::from_millis(self.config.socket_lock_ttl_ms)
    }

    fn ban_ttl(&self) -> Duration {
        Duration::from_millis(self.config.pair_ban_ms)
    }

    /// `start` event: enter the queue and attempt an immediate match.
    ///
    /// No-ops if `sid` is already partnered (in the QueueStore's pair
    /// table) or mid-call: re-enqueuing a sid that's still paired would put
    /// it in both the waiting queue and the pair table at once.
    pub async fn start(&self, sid: &Sid) {
        if !self.registry.is_connected(sid) {
            return;
        }
        if self.store.get_partner(sid).await.is_some() {
            debug!(%sid, "start ignored, already paired");
            return;
        }
        if self.registry.with_state(sid, |s| s.in_call).unwrap_or(false) {
            debug!(%sid, "start ignored, in a call");
            return;
        }
        self.registry.with_state_mut(sid, |state| {
            state.partner_sid = None;
            state.in_call = false;
        });
        if let Some(user_id) = self.registry.user_of(sid) {
            self.store.set_busy(&user_id, true).await;
            self.presence.broadcast(&user_id, true).await;
        }
        self.store.add_to_queue(sid).await;
        self.try_match(sid).await;
    }

    /// `stop` event: leave the queue/pair without seeking a new partner.
    pub async fn stop(&self, sid: &Sid) {
        self.store.remove_from_queue(sid).await;
        if let Some(partner) = self.store.remove_pair(sid).await {
            self.clear_busy(sid).await;
            self.clear_busy(&partner).await;
            self.registry.send(&partner, OutboundEnvelope::new("peer:stopped", serde_json::json!({ "from": sid })));
            self.registry.with_state_mut(&partner, |s| s.partner_sid = None);
        } else {
            self.clear_busy(sid).await;
        }
        self.registry.with_state_mut(sid, |s| s.partner_sid = None);
    }

    /// `next` event: debounced per sid; separates the current partner and
    /// re-enqueues both sides under a short mutual pair-ban.
    pub async fn next(&self, sid: &Sid) {
        let now = self.clock.now_ms();
        let should_run = self
            .registry
            .with_state_mut(sid, |state| {
                if now.saturating_sub(state.last_next_ms) < self.config.next_debounce_ms {
                    false
                } else {
                    state.last_next_ms = now;
                    state.is_nexting = true;
                    true
                }
            })
            .unwrap_or(false);
        if !should_run {
            return;
        }

        if let Some(partner) = self.store.remove_pair(sid).await {
            self.store.ban_pair(sid, &partner, self.ban_ttl()).await;
            self.registry.with_state_mut(&partner, |s| s.partner_sid = None);
            self.registry.send(&partner, OutboundEnvelope::new("peer:left", serde_json::json!({ "from": sid })));
            if let Some(user_id) = self.registry.user_of(&partner) {
                self.store.set_busy(&user_id, true).await;
            }
            self.store.add_to_queue(&partner).await;
            self.try_match(&partner).await;
        }

        self.registry.with_state_mut(sid, |s| s.partner_sid = None);
        tokio::time::sleep(Duration::from_millis(400)).await;
        if !self.registry.is_connected(sid) {
            return;
        }
        if let Some(user_id) = self.registry.user_of(sid) {
            self.store.set_busy(&user_id, true).await;
        }
        self.store.add_to_queue(sid).await;
        self.registry.with_state_mut(sid, |s| s.is_nexting = false);
        self.try_match(sid).await;
    }

    /// `disconnect`: no-op if a `next` is mid-flight for this sid (it owns
    /// the re-enqueue); otherwise fully withdraws the sid.
    pub async fn on_disconnect(&self, sid: &Sid) {
        let is_nexting = self.registry.with_state(sid, |s| s.is_nexting).unwrap_or(false);
        if is_nexting {
            return;
        }
        self.store.remove_from_queue(sid).await;
        self.store.unlock_socket(sid).await;
        if let Some(partner) = self.store.remove_pair(sid).await {
            self.registry.with_state_mut(&partner, |s| s.partner_sid = None);
            self.registry.send(&partner, OutboundEnvelope::new("disconnected", serde_json::json!({ "from": sid })));
            self.clear_busy(&partner).await;
        }
    }

    async fn clear_busy(&self, sid: &Sid) {
        if let Some(user_id) = self.registry.user_of(sid) {
            self.store.set_busy(&user_id, false).await;
            self.presence.broadcast(&user_id, false).await;
        }
    }

    /// Reentrancy-guarded attempt to pair `sid` with the first viable
    /// candidate currently in the queue.
    async fn try_match(&self, sid: &Sid) {
        if !self.in_progress.insert(sid.clone()) {
            return;
        }
        let result = self.try_match_inner(sid).await;
        self.in_progress.remove(sid);
        result
    }

    async fn try_match_inner(&self, sid: &Sid) {
        if !self.registry.is_connected(sid) {
            return;
        }
        if self.store.get_partner(sid).await.is_some() {
            return;
        }
        if self.store.is_locked(sid).await {
            return;
        }

        let queue = self.store.waiting_queue().await;
        let queue_size = queue.len();
        let self_user = self.registry.user_of(sid);

        let mut candidate = None;
        for other in &queue {
            if other == sid {
                continue;
            }
            if !self.registry.is_connected(other) {
                continue;
            }
            if self.store.is_locked(other).await {
                continue;
            }
            if self.store.get_partner(other).await.is_some() {
                continue;
            }
            if let (Some(ref su), Some(ou)) = (&self_user, self.registry.user_of(other)) {
                if *su == ou {
                    continue;
                }
            }
            let small_cohort = queue_size <= self.config.small_cohort_threshold;
            if !small_cohort && self.store.is_banned_together(sid, other).await {
                continue;
            }
            candidate = Some(other.clone());
            break;
        }

        let Some(other) = candidate else {
            return;
        };

        if !self.store.lock_socket(sid, self.lock_ttl()).await {
            return;
        }
        if !self.store.lock_socket(&other, self.lock_ttl()).await {
            self.store.unlock_socket(sid).await;
            return;
        }

        self.store.remove_from_queue(sid).await;
        self.store.remove_from_queue(&other).await;
        self.store.set_pair(sid, &other).await;

        self.registry.with_state_mut(sid, |s| s.partner_sid = Some(other.clone()));
        self.registry.with_state_mut(&other, |s| s.partner_sid = Some(sid.clone()));

        let room_id = sid_room_name(sid, &other);
        let self_user = self.registry.user_of(sid);
        let other_user = self.registry.user_of(&other);
        if let (Some(ref a), Some(ref b)) = (&self_user, &other_user) {
            self.store.set_busy(a, true).await;
            self.store.set_busy(b, true).await;
        }

        let room_name = match (&self_user, &other_user) {
            (Some(a), Some(b)) => user_room_name(a, b),
            _ => room_id.as_str().to_string(),
        };

        let self_token = self.mint_for(sid, &room_name).await;
        let other_token = self.mint_for(&other, &room_name).await;

        self.registry.send(
            sid,
            OutboundEnvelope::new(
                "match_found",
                serde_json::json!({
                    "roomId": room_id,
                    "id": other,
                    "userId": other_user,
                    "livekitToken": self_token,
                    "livekitRoomName": room_name,
                }),
            ),
        );
        self.registry.send(
            &other,
            OutboundEnvelope::new(
                "match_found",
                serde_json::json!({
                    "roomId": room_id,
                    "id": sid,
                    "userId": self_user,
                    "livekitToken": other_token,
                    "livekitRoomName": room_name,
                }),
            ),
        );

        crate::metrics::MATCHES_MADE.inc();
        info!(%sid, partner = %other, %room_id, "matched");
    }

    async fn mint_for(&self, sid: &Sid, room_name: &str) -> Option<String> {
        let user_id = self.registry.user_of(sid).unwrap_or_else(|| UserId::from(sid.as_str()));
        match self.tokens.mint(&user_id, room_name).await {
            Ok(token) => Some(token.token),
            Err(err) => {
                tracing::warn!(%sid, error = %err, "media token mint failed, degrading to null token");
                None
            }
        }
    }
}
