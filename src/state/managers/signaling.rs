//! SignalingForwarder (C7) — room membership and WebRTC signaling relay.
//!
//! Every forward excludes the sender: broadcasting to the full room
//! (sender included) causes clients to process their own stale SDP state.

use crate::error::ClientError;
use crate::state::conn::ConnectionRegistry;
use crate::state::ids::{RoomId, Sid};
use crate::state::managers::queue_store::SharedQueueStore;
use crate::wire::OutboundEnvelope;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;

#[derive(Default)]
struct Room {
    members: Vec<Sid>,
}

pub struct SignalingForwarder {
    store: SharedQueueStore,
    registry: Arc<ConnectionRegistry>,
    rooms: DashMap<RoomId, Room>,
}

impl SignalingForwarder {
    pub fn new(store: SharedQueueStore, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry, rooms: DashMap::new() }
    }

    fn members_of(&self, room_id: &RoomId) -> Vec<Sid> {
        self.rooms.get(room_id).map(|r| r.members.clone()).unwrap_or_default()
    }

    /// `room:join:ack`. Enforces the 2-peer cap and announces the new
    /// member to the sole existing one (and vice versa).
    pub fn join(&self, sid: &Sid, room_id: &RoomId) -> Result<(), ClientError> {
        if self.rooms.get(room_id).map(|r| r.members.contains(sid)).unwrap_or(false) {
            return Ok(());
        }
        let existing = self.members_of(room_id);
        if existing.len() >= 2 {
            self.registry.send(
                sid,
                OutboundEnvelope::new(
                    "call:busy",
                    serde_json::json!({ "callId": room_id, "reason": "room_full" }),
                ),
            );
            return Err(ClientError::RoomFull);
        }

        self.rooms.entry(room_id.clone()).or_default().members.push(sid.clone());
        self.registry.with_state_mut(sid, |s| {
            s.rooms.insert(room_id.clone());
        });
        crate::metrics::ACTIVE_ROOMS.set(self.rooms.len() as i64);

        let user_id = self.registry.user_of(sid);
        for other in &existing {
            self.registry.send(
                sid,
                OutboundEnvelope::new(
                    "peer:connected",
                    serde_json::json!({ "peerId": other, "userId": self.registry.user_of(other) }),
                ),
            );
            self.registry.send(
                other,
                OutboundEnvelope::new("peer:connected", serde_json::json!({ "peerId": sid, "userId": user_id })),
            );
        }
        Ok(())
    }

    pub async fn connection_established(&self, sid: &Sid) {
        if let Some(user_id) = self.registry.user_of(sid) {
            self.store.set_busy(&user_id, true).await;
        }
    }

    /// Forwards a signaling payload (offer/answer/ice-candidate/hangup) to
    /// every other member of the room named in the payload, or directly to
    /// `to` if no roomId is present. `hangup` additionally fans out to
    /// every room the sender belongs to.
    pub fn forward(&self, sid: &Sid, event: &str, mut data: Value) {
        let room_id = data.get("roomId").and_then(|v| v.as_str()).map(RoomId::from);
        let to = data.get("to").and_then(|v| v.as_str()).map(str::to_string);

        if let Value::Object(ref mut map) = data {
            map.insert("from".into(), serde_json::json!(sid));
            map.insert("fromUserId".into(), serde_json::json!(self.registry.user_of(sid)));
        }

        if event == "hangup" {
            let rooms: Vec<RoomId> =
                self.registry.with_state(sid, |s| s.rooms.iter().cloned().collect()).unwrap_or_default();
            for room_id in &rooms {
                self.broadcast_excluding_sender(room_id, sid, event, data.clone());
            }
            return;
        }

        if let Some(room_id) = room_id {
            if !self.rooms.get(&room_id).map(|r| r.members.contains(sid)).unwrap_or(false) {
                let _ = self.join(sid, &room_id);
            }
            self.broadcast_excluding_sender(&room_id, sid, event, data);
            return;
        }

        if let Some(to) = to {
            let target_sid = Sid::from(to.as_str());
            if self.registry.is_connected(&target_sid) {
                self.registry.send(&target_sid, OutboundEnvelope::new(event, data));
            } else {
                let target_user = crate::state::ids::UserId::from(to.as_str());
                self.registry.send_to_user(&target_user, OutboundEnvelope::new(event, data));
            }
        }
    }

    /// `cam-toggle`/`pip:*`: forwarded to every room the sender is in
    /// (excluding sender) and directly to the sender's current partner.
    pub fn forward_media_control(&self, sid: &Sid, event: &str, mut data: Value) {
        if let Value::Object(ref mut map) = data {
            map.insert("from".into(), serde_json::json!(sid));
        }
        let rooms: Vec<RoomId> =
            self.registry.with_state(sid, |s| s.rooms.iter().cloned().collect()).unwrap_or_default();
        for room_id in &rooms {
            self.broadcast_excluding_sender(room_id, sid, event, data.clone());
        }
        if let Some(partner) = self.registry.with_state(sid, |s| s.partner_sid.clone()).flatten() {
            self.registry.send(&partner, OutboundEnvelope::new(event, data));
        }
    }

    fn broadcast_excluding_sender(&self, room_id: &RoomId, sender: &Sid, event: &str, data: Value) {
        let members = self.members_of(room_id);
        let recipients: Vec<Sid> = members.into_iter().filter(|m| m != sender).collect();
        let _span = crate::telemetry::create_room_span(room_id.as_str(), event, recipients.len());
        self.registry.send_to_many(&recipients, OutboundEnvelope::new(event, data));
    }

    /// `room:leave`. The remaining peer (if any) gets `peer:stopped`, not
    /// `call:ended` — leaving a random-chat room must not trigger the
    /// direct-call UI.
    pub async fn leave(&self, sid: &Sid, room_id: &RoomId) {
        if let Some(mut room) = self.rooms.get_mut(room_id) {
            room.members.retain(|m| m != sid);
        }
        self.rooms.retain(|_, r| !r.members.is_empty());
        crate::metrics::ACTIVE_ROOMS.set(self.rooms.len() as i64);
        self.registry.with_state_mut(sid, |s| {
            s.rooms.remove(room_id);
        });
        if let Some(user_id) = self.registry.user_of(sid) {
            self.store.set_busy(&user_id, false).await;
        }
        for other in self.members_of(room_id) {
            self.registry.send(&other, OutboundEnvelope::new("peer:stopped", serde_json::json!({ "from": sid })));
        }
    }

    /// Disconnect handling: skipped when the matcher's `next` is mid-flight
    /// for this sid. Otherwise clears busy and notifies remaining room
    /// members.
    pub async fn on_disconnect(&self, sid: &Sid, is_nexting: bool) {
        if is_nexting {
            return;
        }
        if let Some(user_id) = self.registry.user_of(sid) {
            self.store.set_busy(&user_id, false).await;
        }
        let rooms: Vec<RoomId> =
            self.registry.with_state(sid, |s| s.rooms.iter().cloned().collect()).unwrap_or_default();
        for room_id in rooms {
            if let Some(mut room) = self.rooms.get_mut(&room_id) {
                room.members.retain(|m| m != sid);
            }
            for other in self.members_of(&room_id) {
                self.registry.send(&other, OutboundEnvelope::new("disconnected", serde_json::json!({ "from": sid })));
            }
        }
        self.rooms.retain(|_, r| !r.members.is_empty());
        crate::metrics::ACTIVE_ROOMS.set(self.rooms.len() as i64);
    }
}
