//! Network module.
//!
//! Contains the Gateway (axum HTTP/WebSocket server) and the per-socket
//! connection handler.

pub mod connection;
pub mod gateway;

pub use gateway::Gateway;
