//! ConnState and ConnectionRegistry (C2).
//!
//! Replaces an untyped per-socket scratch bag with a typed struct owned by
//! the registry and reset on disconnect.

use crate::state::ids::{RoomId, Sid, UserId};
use crate::wire::OutboundEnvelope;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;

pub type OutboundSender = mpsc::UnboundedSender<OutboundEnvelope>;

/// Ephemeral per-connection scratch state, advisory cache over the
/// authoritative QueueStore/Call records.
#[derive(Debug, Default, Clone)]
pub struct ConnState {
    pub user_id: Option<UserId>,
    pub partner_sid: Option<Sid>,
    pub rooms: HashSet<RoomId>,
    pub busy: bool,
    pub in_call: bool,
    pub is_nexting: bool,
    pub last_next_ms: u64,
}

impl ConnState {
    pub fn reset_session(&mut self) {
        self.partner_sid = None;
        self.rooms.clear();
        self.busy = false;
        self.in_call = false;
        self.is_nexting = false;
    }
}

struct Connection {
    out: OutboundSender,
    state: ConnState,
}

/// Binds socket ids to user ids and to an outbound sender, and maintains
/// the reverse `userId -> sids` index used for fan-out groups and duplicate
/// login eviction.
#[derive(Default)]
pub struct ConnectionRegistry {
    by_sid: DashMap<Sid, Connection>,
    by_user: DashMap<UserId, HashSet<Sid>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connect(&self, sid: Sid, out: OutboundSender) {
        self.by_sid.insert(sid, Connection { out, state: ConnState::default() });
        crate::metrics::CONNECTED_SOCKETS.inc();
    }

    /// Removes the sid and returns the userId it was bound to, if any, so
    /// the caller can clean up user-scoped state.
    pub fn disconnect(&self, sid: &Sid) -> Option<UserId> {
        let removed = self.by_sid.remove(sid);
        crate::metrics::CONNECTED_SOCKETS.dec();
        let user_id = removed.and_then(|(_, conn)| conn.state.user_id);
        if let Some(ref user_id) = user_id {
            self.by_user.entry(user_id.clone()).and_modify(|set| {
                set.remove(sid);
            });
        }
        user_id
    }

    pub fn is_connected(&self, sid: &Sid) -> bool {
        self.by_sid.contains_key(sid)
    }

    /// Binds `userId` to `sid`. If another sid already holds the same
    /// userId it is evicted first (duplicate-login policy); the evicted
    /// sid, if any, is returned so the caller can force-disconnect it.
    pub fn bind_user(&self, sid: &Sid, user_id: UserId) -> Option<Sid> {
        let mut evicted = None;
        if let Some(existing) = self.by_user.get(&user_id) {
            for other in existing.iter() {
                if other != sid {
                    evicted = Some(other.clone());
                    break;
                }
            }
        }
        if let Some(mut conn) = self.by_sid.get_mut(sid) {
            conn.state.user_id = Some(user_id.clone());
        }
        self.by_user.entry(user_id).or_default().insert(sid.clone());
        evicted
    }

    pub fn user_of(&self, sid: &Sid) -> Option<UserId> {
        self.by_sid.get(sid).and_then(|c| c.state.user_id.clone())
    }

    pub fn sids_of_user(&self, user_id: &UserId) -> Vec<Sid> {
        self.by_user.get(user_id).map(|set| set.iter().cloned().collect()).unwrap_or_default()
    }

    pub fn online_users(&self) -> Vec<UserId> {
        self.by_user.iter().filter(|e| !e.value().is_empty()).map(|e| e.key().clone()).collect()
    }

    pub fn with_state<R>(&self, sid: &Sid, f: impl FnOnce(&ConnState) -> R) -> Option<R> {
        self.by_sid.get(sid).map(|c| f(&c.state))
    }

    pub fn with_state_mut<R>(&self, sid: &Sid, f: impl FnOnce(&mut ConnState) -> R) -> Option<R> {
        self.by_sid.get_mut(sid).map(|mut c| f(&mut c.state))
    }

    pub fn send(&self, sid: &Sid, envelope: OutboundEnvelope) {
        if let Some(conn) = self.by_sid.get(sid) {
            let _ = conn.out.send(envelope);
        }
    }

    pub fn send_to_user(&self, user_id: &UserId, envelope: OutboundEnvelope) {
        for sid in self.sids_of_user(user_id) {
            self.send(&sid, envelope.clone());
        }
    }

    pub fn send_to_many(&self, sids: &[Sid], envelope: OutboundEnvelope) {
        for sid in sids {
            self.send(sid, envelope.clone());
        }
    }
}

pub type SharedConnectionRegistry = Arc<ConnectionRegistry>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_login_returns_evicted_sid() {
        let registry = ConnectionRegistry::new();
        let (tx1, _rx1) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        let s1 = Sid::from("s1");
        let s2 = Sid::from("s2");
        let user = UserId::from("u1");

        registry.connect(s1.clone(), tx1);
        registry.connect(s2.clone(), tx2);

        assert_eq!(registry.bind_user(&s1, user.clone()), None);
        let evicted = registry.bind_user(&s2, user.clone());
        assert_eq!(evicted, Some(s1.clone()));
    }

    #[test]
    fn disconnect_clears_reverse_index() {
        let registry = ConnectionRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let sid = Sid::from("s1");
        let user = UserId::from("u1");
        registry.connect(sid.clone(), tx);
        registry.bind_user(&sid, user.clone());
        assert_eq!(registry.disconnect(&sid), Some(user.clone()));
        assert!(registry.sids_of_user(&user).is_empty());
    }
}
