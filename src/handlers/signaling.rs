//! Room membership and WebRTC signaling event handlers.

use crate::error::{ClientError, HandlerResult};
use crate::handlers::context::HandlerContext;
use crate::handlers::traits::Handler;
use crate::state::ids::RoomId;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct RoomPayload {
    #[serde(rename = "roomId")]
    room_id: String,
}

pub struct RoomJoinAckHandler;

#[async_trait]
impl Handler for RoomJoinAckHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: RoomPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        ctx.core.signaling.join(&ctx.sid, &RoomId::from(payload.room_id.as_str()))?;
        Ok(None)
    }
}

pub struct RoomLeaveHandler;

#[async_trait]
impl Handler for RoomLeaveHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: RoomPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        ctx.core.signaling.leave(&ctx.sid, &RoomId::from(payload.room_id.as_str())).await;
        Ok(None)
    }
}

pub struct ConnectionEstablishedHandler;

#[async_trait]
impl Handler for ConnectionEstablishedHandler {
    async fn handle(&self, ctx: &HandlerContext, _data: Value) -> HandlerResult<Option<Value>> {
        ctx.core.signaling.connection_established(&ctx.sid).await;
        Ok(None)
    }
}

/// Shared implementation for `offer`, `answer`, `ice-candidate`, `hangup`.
pub struct ForwardHandler {
    pub event: &'static str,
}

#[async_trait]
impl Handler for ForwardHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        ctx.core.signaling.forward(&ctx.sid, self.event, data);
        Ok(None)
    }
}

/// Shared implementation for `cam-toggle`, `pip:entered`, `pip:exited`, `pip:state`.
pub struct MediaControlHandler {
    pub event: &'static str,
}

#[async_trait]
impl Handler for MediaControlHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        ctx.core.signaling.forward_media_control(&ctx.sid, self.event, data);
        Ok(None)
    }
}
