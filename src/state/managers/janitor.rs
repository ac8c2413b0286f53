//! JanitorLoop (C9) — periodic sweep of stale queue entries, expired bans,
//! dangling locks, and orphaned pairs. Never evicts a still-connected sid.

use crate::state::conn::ConnectionRegistry;
use crate::state::ids::Sid;
use crate::state::managers::queue_store::SharedQueueStore;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub struct JanitorLoop {
    store: SharedQueueStore,
    registry: Arc<ConnectionRegistry>,
    interval: Duration,
    max_queue_wait: Duration,
}

impl JanitorLoop {
    pub fn new(
        store: SharedQueueStore,
        registry: Arc<ConnectionRegistry>,
        interval: Duration,
        max_queue_wait: Duration,
    ) -> Self {
        Self { store, registry, interval, max_queue_wait }
    }

    pub async fn run(self, mut shutdown: tokio::sync::broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.sweep().await,
                _ = shutdown.recv() => {
                    info!("janitor loop shutting down");
                    return;
                }
            }
        }
    }

    async fn sweep(&self) {
        let registry = &self.registry;
        let is_connected = |sid: &Sid| registry.is_connected(sid);

        let dropped = self.store.cleanup_stale_queue_entries(self.max_queue_wait, &is_connected).await;
        if !dropped.is_empty() {
            debug!(count = dropped.len(), "janitor dropped stale queue entries");
        }
        self.store.cleanup_stale_states(&is_connected).await;
        crate::metrics::QUEUE_SIZE.set(self.store.queue_size().await as i64);
    }
}
