//! DirectCallManager (C6) — invite/ring state machine between friends.

use crate::collab::MediaTokenMinter;
use crate::config::MatcherConfig;
use crate::error::ClientError;
use crate::state::conn::ConnectionRegistry;
use crate::state::ids::{CallId, RoomId, Sid, UserId, sid_room_name, user_room_name};
use crate::state::managers::presence::PresenceBroadcaster;
use crate::state::managers::queue_store::SharedQueueStore;
use crate::state::managers::signaling::SignalingForwarder;
use crate::wire::OutboundEnvelope;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::info;

struct CallRecord {
    call_id: CallId,
    initiator: UserId,
    initiator_sid: Sid,
    callee: UserId,
    cancel_ring: Option<oneshot::Sender<()>>,
}

pub struct DirectCallManager {
    store: SharedQueueStore,
    registry: Arc<ConnectionRegistry>,
    presence: Arc<PresenceBroadcaster>,
    tokens: Arc<dyn MediaTokenMinter>,
    signaling: Arc<SignalingForwarder>,
    config: MatcherConfig,
    by_call: Arc<DashMap<CallId, CallRecord>>,
    by_user: Arc<DashMap<UserId, CallId>>,
}

impl DirectCallManager {
    pub fn new(
        store: SharedQueueStore,
        registry: Arc<ConnectionRegistry>,
        presence: Arc<PresenceBroadcaster>,
        tokens: Arc<dyn MediaTokenMinter>,
        signaling: Arc<SignalingForwarder>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            store,
            registry,
            presence,
            tokens,
            signaling,
            config,
            by_call: Arc::new(DashMap::new()),
            by_user: Arc::new(DashMap::new()),
        }
    }

    pub async fn initiate(&self, sid: &Sid, to: &str) -> Result<CallId, ClientError> {
        let initiator = self.registry.user_of(sid).ok_or(ClientError::Unauthorized)?;
        if to.trim().is_empty() || to == initiator.as_str() {
            return Err(ClientError::InvalidTo);
        }
        let callee = UserId::from(to);

        if self.by_user.contains_key(&initiator) {
            return Err(ClientError::InitiatorBusy);
        }
        if self.by_user.contains_key(&callee) {
            return Err(ClientError::Busy);
        }
        if self.store.is_busy(&initiator).await {
            return Err(ClientError::InitiatorBusy);
        }

        let callee_sids = self.registry.sids_of_user(&callee);
        if callee_sids.is_empty() {
            return Err(ClientError::PeerOffline);
        }
        if self.store.is_busy(&callee).await {
            self.registry.send_to_user(
                &callee,
                OutboundEnvelope::new("call:busy", serde_json::json!({ "from": initiator })),
            );
            return Err(ClientError::PeerBusy);
        }

        let call_id = CallId::from(format!("{}_{:06x}", now_component(), rand::random::<u32>() % 0xFFFFFF));
        self.store.set_busy(&initiator, true).await;
        self.store.set_busy(&callee, true).await;
        self.presence.broadcast(&initiator, true).await;
        self.presence.broadcast(&callee, true).await;

        let room_id = match callee_sids.first() {
            Some(callee_sid) => sid_room_name(sid, callee_sid),
            None => return Err(ClientError::PeerOffline),
        };
        // Pre-join the initiator so SignalingForwarder's authoritative room
        // table already knows this room before any offer/ice-candidate
        // arrives for it.
        let _ = self.signaling.join(sid, &room_id);

        self.registry.send_to_user(
            &callee,
            OutboundEnvelope::new(
                "call:incoming",
                serde_json::json!({ "callId": call_id, "from": initiator }),
            ),
        );
        self.registry.send(
            sid,
            OutboundEnvelope::new(
                "call:room:created",
                serde_json::json!({
                    "callId": call_id,
                    "roomId": room_id,
                    "partnerId": callee,
                    "from": callee_sids.first(),
                }),
            ),
        );

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.by_call.insert(
            call_id.clone(),
            CallRecord {
                call_id: call_id.clone(),
                initiator: initiator.clone(),
                initiator_sid: sid.clone(),
                callee: callee.clone(),
                cancel_ring: Some(cancel_tx),
            },
        );
        self.by_user.insert(initiator.clone(), call_id.clone());
        self.by_user.insert(callee.clone(), call_id.clone());

        self.spawn_ring_timer(call_id.clone(), cancel_rx);
        crate::metrics::CALLS_INITIATED.inc();
        crate::metrics::ACTIVE_CALLS.inc();
        info!(%call_id, %initiator, %callee, "call initiated");
        Ok(call_id)
    }

    fn spawn_ring_timer(&self, call_id: CallId, cancel_rx: oneshot::Receiver<()>) {
        let registry = self.registry.clone();
        let store = self.store.clone();
        let presence_registry = self.registry.clone();
        let by_call = self.by_call.clone();
        let by_user = self.by_user.clone();
        let ring_timeout = Duration::from_millis(self.config.ring_timeout_ms);
        let presence = self.presence.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(ring_timeout) => {
                    if let Some((_, record)) = by_call.remove(&call_id) {
                        by_user.remove(&record.initiator);
                        by_user.remove(&record.callee);
                        store.set_busy(&record.initiator, false).await;
                        store.set_busy(&record.callee, false).await;
                        presence.broadcast(&record.initiator, false).await;
                        presence.broadcast(&record.callee, false).await;
                        let envelope = OutboundEnvelope::new("call:timeout", serde_json::json!({ "callId": call_id }));
                        registry.send_to_user(&record.initiator, envelope.clone());
                        registry.send_to_user(&record.callee, envelope);
                        crate::metrics::CALLS_TIMED_OUT.inc();
                        crate::metrics::ACTIVE_CALLS.dec();
                    }
                }
                _ = cancel_rx => {
                    let _ = &presence_registry;
                }
            }
        });
    }

    pub async fn accept(&self, sid: &Sid, call_id: &str) -> Result<(), ClientError> {
        let call_id = CallId::from(call_id);
        let mut record = self.by_call.remove(&call_id).map(|(_, r)| r).ok_or(ClientError::NotFound)?;
        self.by_user.remove(&record.initiator);
        self.by_user.remove(&record.callee);
        if let Some(tx) = record.cancel_ring.take() {
            let _ = tx.send(());
        }

        let callee_user = self.registry.user_of(sid).ok_or(ClientError::Unauthorized)?;
        if callee_user != record.callee {
            return Err(ClientError::Unauthorized);
        }
        if !self.registry.is_connected(&record.initiator_sid) {
            self.store.set_busy(&record.initiator, false).await;
            self.store.set_busy(&record.callee, false).await;
            return Err(ClientError::PeerOffline);
        }

        let room_id = sid_room_name(&record.initiator_sid, sid);
        let room_name = user_room_name(&record.initiator, &record.callee);

        // Join both sides into SignalingForwarder's authoritative room
        // table; without this an offer sent right after call:accepted would
        // auto-join only its sender and broadcast to an empty room.
        let _ = self.signaling.join(&record.initiator_sid, &room_id);
        let _ = self.signaling.join(sid, &room_id);

        self.registry.with_state_mut(&record.initiator_sid, |s| {
            s.partner_sid = Some(sid.clone());
            s.in_call = true;
        });
        self.registry.with_state_mut(sid, |s| {
            s.partner_sid = Some(record.initiator_sid.clone());
            s.in_call = true;
        });

        let initiator_token = self.mint_for(&record.initiator, &room_name).await;
        let callee_token = self.mint_for(&record.callee, &room_name).await;

        self.registry.send(
            &record.initiator_sid,
            OutboundEnvelope::new(
                "call:accepted",
                serde_json::json!({
                    "callId": record.call_id,
                    "from": sid,
                    "fromUserId": record.callee,
                    "roomId": room_id,
                    "livekitToken": initiator_token,
                    "livekitRoomName": room_name,
                }),
            ),
        );
        self.registry.send(
            sid,
            OutboundEnvelope::new(
                "call:accepted",
                serde_json::json!({
                    "callId": record.call_id,
                    "from": record.initiator_sid,
                    "fromUserId": record.initiator,
                    "roomId": room_id,
                    "livekitToken": callee_token,
                    "livekitRoomName": room_name,
                }),
            ),
        );

        crate::metrics::CALLS_ACCEPTED.inc();
        crate::metrics::ACTIVE_CALLS.dec();
        Ok(())
    }

    pub async fn decline(&self, sid: &Sid, call_id: &str) -> Result<(), ClientError> {
        self.terminate(call_id, sid, "call:declined").await
    }

    pub async fn cancel(&self, sid: &Sid, call_id: &str) -> Result<(), ClientError> {
        self.terminate(call_id, sid, "call:cancel").await
    }

    async fn terminate(&self, call_id: &str, from: &Sid, event: &'static str) -> Result<(), ClientError> {
        let call_id = CallId::from(call_id);
        let mut record = self.by_call.remove(&call_id).map(|(_, r)| r).ok_or(ClientError::NotFound)?;
        self.by_user.remove(&record.initiator);
        self.by_user.remove(&record.callee);
        if let Some(tx) = record.cancel_ring.take() {
            let _ = tx.send(());
        }
        self.store.set_busy(&record.initiator, false).await;
        self.store.set_busy(&record.callee, false).await;
        self.presence.broadcast(&record.initiator, false).await;
        self.presence.broadcast(&record.callee, false).await;

        let envelope = OutboundEnvelope::new(event, serde_json::json!({ "callId": record.call_id, "from": from }));
        self.registry.send_to_user(&record.initiator, envelope.clone());
        self.registry.send_to_user(&record.callee, envelope);

        if event == "call:declined" {
            crate::metrics::CALLS_DECLINED.inc();
        }
        crate::metrics::ACTIVE_CALLS.dec();
        Ok(())
    }

    /// `call:end` resolves the room from payload roomId, then the socket's
    /// scratch roomId, then the callId, and clears call state on every
    /// member of that room.
    pub async fn end(&self, sid: &Sid, room_id: Option<&str>, call_id: Option<&str>) {
        let resolved_room = room_id
            .map(RoomId::from)
            .or_else(|| self.registry.with_state(sid, |s| s.rooms.iter().next().cloned()).flatten());

        if let Some(call_id) = call_id {
            let _ = self.terminate(call_id, sid, "call:ended").await;
        }

        if let Some(room_id) = resolved_room {
            // Capture the partner before clearing scratch state, not after:
            // `partner_sid` is what we're about to zero.
            let partner = self.registry.with_state(sid, |s| s.partner_sid.clone()).flatten();

            if let Some(user_id) = self.registry.user_of(sid) {
                self.store.set_busy(&user_id, false).await;
                self.presence.broadcast(&user_id, false).await;
            }
            self.registry.with_state_mut(sid, |s| {
                s.busy = false;
                s.in_call = false;
                s.partner_sid = None;
                s.rooms.remove(&room_id);
            });

            if let Some(ref partner) = partner {
                if let Some(partner_user_id) = self.registry.user_of(partner) {
                    self.store.set_busy(&partner_user_id, false).await;
                    self.presence.broadcast(&partner_user_id, false).await;
                }
                self.registry.with_state_mut(partner, |s| {
                    s.busy = false;
                    s.in_call = false;
                    s.partner_sid = None;
                    s.rooms.remove(&room_id);
                });
            }

            let envelope = OutboundEnvelope::new(
                "call:ended",
                serde_json::json!({ "callId": call_id, "roomId": room_id, "reason": "ended", "scope": "all" }),
            );
            if let Some(ref partner) = partner {
                self.registry.send(partner, envelope.clone());
            }
            self.registry.send(sid, envelope);
        }
    }

    async fn mint_for(&self, user_id: &UserId, room_name: &str) -> Option<String> {
        match self.tokens.mint(user_id, room_name).await {
            Ok(token) => Some(token.token),
            Err(err) => {
                tracing::warn!(%user_id, error = %err, "media token mint failed, degrading to null token");
                None
            }
        }
    }
}

fn now_component() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
