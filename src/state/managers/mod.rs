//! Domain managers (C1-C9), owned and wired together by [`crate::state::core::Core`].

pub mod call;
pub mod identity;
pub mod janitor;
pub mod matcher;
pub mod presence;
pub mod queue_store;
pub mod signaling;
pub mod turn;

pub use call::DirectCallManager;
pub use identity::IdentityBinder;
pub use janitor::JanitorLoop;
pub use matcher::Matcher;
pub use presence::PresenceBroadcaster;
pub use queue_store::{FallbackQueueStore, InProcessQueueStore, QueueStore, RemoteQueueStore, SharedQueueStore};
pub use signaling::SignalingForwarder;
pub use turn::TurnCredentialIssuer;
