//! External collaborators.
//!
//! The core never owns persistent user/profile/friendship data, offline
//! message delivery, or WebRTC media — it reaches those through narrow
//! async traits backed by HTTP calls to separately-owned services.

mod media;
mod offline_mailbox;
mod user_directory;

pub use media::{HttpMediaTokenMinter, MediaTokenMinter};
pub use offline_mailbox::{HttpOfflineMailbox, NoopOfflineMailbox, OfflineMailbox};
pub use user_directory::{HttpUserDirectory, UserDirectory, UserRecord};
