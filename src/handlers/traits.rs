//! The event handler trait.
//!
//! Deliberately a single flat trait (no pre/post-registration typestate):
//! sockets here are either bound to a userId or a guest, and no handler
//! needs that distinction enforced at compile time — each handler checks
//! what it needs and returns a [`ClientError`] otherwise.

use crate::error::HandlerResult;
use crate::handlers::context::HandlerContext;
use async_trait::async_trait;
use serde_json::Value;

#[async_trait]
pub trait Handler: Send + Sync {
    /// Handle one inbound event. Returning `Ok(Some(value))` sends an ack
    /// with that payload when the client supplied an `ackId`; `Ok(None)`
    /// sends no ack even if one was requested (fire-and-forget events).
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>>;
}
