//! Core — the central dependency-injection container holding every domain
//! manager, analogous in shape (and role) to the single shared-state
//! container the rest of this codebase wires everything through.

use crate::clock::{SharedClock, system_clock};
use crate::collab::{
    HttpMediaTokenMinter, HttpOfflineMailbox, HttpUserDirectory, MediaTokenMinter, NoopOfflineMailbox,
    OfflineMailbox, UserDirectory,
};
use crate::config::Config;
use crate::state::conn::ConnectionRegistry;
use crate::state::managers::queue_store::{FallbackQueueStore, RemoteQueueStore};
use crate::state::managers::{
    DirectCallManager, IdentityBinder, JanitorLoop, Matcher, PresenceBroadcaster, SharedQueueStore,
    SignalingForwarder, TurnCredentialIssuer,
};
use std::sync::Arc;
use std::time::Duration;

/// Construction parameters for [`Core`], gathered up front the way the
/// rest of this codebase assembles its wiring structs before constructing
/// the shared container.
pub struct CoreParams {
    pub config: Config,
}

pub struct Core {
    pub config: Config,
    pub clock: SharedClock,
    pub connections: Arc<ConnectionRegistry>,
    pub store: SharedQueueStore,
    pub directory: Arc<dyn UserDirectory>,
    pub media_tokens: Arc<dyn MediaTokenMinter>,
    pub presence: Arc<PresenceBroadcaster>,
    pub identity: Arc<IdentityBinder>,
    pub matcher: Arc<Matcher>,
    pub calls: Arc<DirectCallManager>,
    pub signaling: Arc<SignalingForwarder>,
    pub turn: Arc<TurnCredentialIssuer>,
}

impl Core {
    pub fn new(params: CoreParams) -> Self {
        let config = params.config;
        let clock = system_clock();
        let connections = Arc::new(ConnectionRegistry::new());

        let remote = config.collaborators.queue_store_url.clone().map(RemoteQueueStore::new);
        let store: SharedQueueStore = Arc::new(FallbackQueueStore::new(remote));

        let directory: Arc<dyn UserDirectory> =
            Arc::new(HttpUserDirectory::new(config.collaborators.user_directory_url.clone()));
        let mailbox: Arc<dyn OfflineMailbox> = match config.collaborators.offline_mailbox_url.clone() {
            Some(url) => Arc::new(HttpOfflineMailbox::new(url)),
            None => Arc::new(NoopOfflineMailbox),
        };
        let tokens: Arc<dyn MediaTokenMinter> = Arc::new(HttpMediaTokenMinter::new(
            config.media_server.url.clone().unwrap_or_default(),
            config.media_server.url.clone().unwrap_or_default(),
            config.media_server.api_key.clone().unwrap_or_default(),
            config.media_server.api_secret.clone().unwrap_or_default(),
        ));

        let presence = Arc::new(PresenceBroadcaster::new(directory.clone(), connections.clone()));
        let identity =
            Arc::new(IdentityBinder::new(directory.clone(), mailbox, connections.clone(), presence.clone()));
        let matcher = Arc::new(Matcher::new(
            store.clone(),
            connections.clone(),
            presence.clone(),
            tokens.clone(),
            clock.clone(),
            config.matcher.clone(),
        ));
        let signaling = Arc::new(SignalingForwarder::new(store.clone(), connections.clone()));
        let calls = Arc::new(DirectCallManager::new(
            store.clone(),
            connections.clone(),
            presence.clone(),
            tokens.clone(),
            signaling.clone(),
            config.matcher.clone(),
        ));
        let turn = Arc::new(TurnCredentialIssuer::new(config.turn.clone()));

        Self {
            config,
            clock,
            connections,
            store,
            directory,
            media_tokens: tokens,
            presence,
            identity,
            matcher,
            calls,
            signaling,
            turn,
        }
    }

    pub fn spawn_janitor(&self, shutdown: tokio::sync::broadcast::Receiver<()>) {
        let janitor = JanitorLoop::new(
            self.store.clone(),
            self.connections.clone(),
            Duration::from_secs(self.config.matcher.janitor_interval_secs),
            Duration::from_millis(self.config.matcher.max_queue_wait_ms),
        );
        tokio::spawn(janitor.run(shutdown));
    }
}
