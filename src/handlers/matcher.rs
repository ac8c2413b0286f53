//! Random-matchmaking event handlers: `start`, `next`, `stop`.

use crate::error::HandlerResult;
use crate::handlers::context::HandlerContext;
use crate::handlers::traits::Handler;
use async_trait::async_trait;
use serde_json::Value;

pub struct StartHandler;

#[async_trait]
impl Handler for StartHandler {
    async fn handle(&self, ctx: &HandlerContext, _data: Value) -> HandlerResult<Option<Value>> {
        ctx.core.matcher.start(&ctx.sid).await;
        Ok(None)
    }
}

pub struct NextHandler;

#[async_trait]
impl Handler for NextHandler {
    async fn handle(&self, ctx: &HandlerContext, _data: Value) -> HandlerResult<Option<Value>> {
        ctx.core.matcher.next(&ctx.sid).await;
        Ok(None)
    }
}

pub struct StopHandler;

#[async_trait]
impl Handler for StopHandler {
    async fn handle(&self, ctx: &HandlerContext, _data: Value) -> HandlerResult<Option<Value>> {
        ctx.core.matcher.stop(&ctx.sid).await;
        Ok(None)
    }
}
