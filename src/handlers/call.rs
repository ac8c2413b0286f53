//! Direct-call event handlers.

use crate::error::{ClientError, HandlerResult};
use crate::handlers::context::HandlerContext;
use crate::handlers::traits::Handler;
use crate::state::ids::UserId;
use crate::wire::OutboundEnvelope;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize)]
struct InitiatePayload {
    to: String,
}

pub struct CallInitiateHandler;

#[async_trait]
impl Handler for CallInitiateHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: InitiatePayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let call_id = ctx.core.calls.initiate(&ctx.sid, &payload.to).await?;
        Ok(Some(serde_json::json!({ "ok": true, "callId": call_id })))
    }
}

#[derive(Deserialize, Default)]
struct CallRefPayload {
    #[serde(rename = "callId")]
    call_id: Option<String>,
    #[serde(rename = "roomId")]
    room_id: Option<String>,
}

pub struct CallAcceptHandler;

#[async_trait]
impl Handler for CallAcceptHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: CallRefPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let call_id = payload.call_id.ok_or(ClientError::BadIds)?;
        ctx.core.calls.accept(&ctx.sid, &call_id).await?;
        Ok(None)
    }
}

pub struct CallDeclineHandler;

#[async_trait]
impl Handler for CallDeclineHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: CallRefPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let call_id = payload.call_id.ok_or(ClientError::BadIds)?;
        ctx.core.calls.decline(&ctx.sid, &call_id).await?;
        Ok(None)
    }
}

pub struct CallCancelHandler;

#[async_trait]
impl Handler for CallCancelHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: CallRefPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let call_id = payload.call_id.ok_or(ClientError::BadIds)?;
        ctx.core.calls.cancel(&ctx.sid, &call_id).await?;
        Ok(None)
    }
}

pub struct CallEndHandler;

#[async_trait]
impl Handler for CallEndHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: CallRefPayload = serde_json::from_value(data).unwrap_or_default();
        ctx.core.calls.end(&ctx.sid, payload.room_id.as_deref(), payload.call_id.as_deref()).await;
        Ok(None)
    }
}

#[derive(Deserialize)]
struct BusyPayload {
    to: String,
}

/// `call:busy`: a pure relay, no call-table involvement. The client tells
/// us it declined ringing locally (e.g. already on another call) and we
/// forward that to the caller.
pub struct CallBusyHandler;

#[async_trait]
impl Handler for CallBusyHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: BusyPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let from = ctx.core.connections.user_of(&ctx.sid);
        ctx.core.connections.send_to_user(
            &UserId::from(payload.to.as_str()),
            OutboundEnvelope::new("call:busy", serde_json::json!({ "from": from })),
        );
        Ok(None)
    }
}
