//! State management module.
//!
//! Contains the [`Core`] shared-state container and the domain entities
//! wired together within it.

pub mod conn;
pub mod core;
pub mod ids;
pub mod managers;

pub use conn::{ConnState, ConnectionRegistry, SharedConnectionRegistry};
pub use core::{Core, CoreParams};
pub use ids::{CallId, RoomId, Sid, UserId};
