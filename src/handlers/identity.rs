//! Identity and presence event handlers.

use crate::error::{ClientError, HandlerResult};
use crate::handlers::context::HandlerContext;
use crate::handlers::traits::Handler;
use crate::state::managers::identity::Handshake;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

#[derive(Deserialize, Default)]
struct IdentityAttachPayload {
    #[serde(rename = "installId")]
    install_id: Option<String>,
}

pub struct IdentityAttachHandler;

#[async_trait]
impl Handler for IdentityAttachHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: IdentityAttachPayload = serde_json::from_value(data).unwrap_or_default();
        let handshake = Handshake { user_id: None, install_id: payload.install_id };
        let user_id = ctx.core.identity.bind_on_connect(&ctx.sid, &handshake).await;
        Ok(Some(serde_json::json!({ "ok": user_id.is_some(), "userId": user_id })))
    }
}

#[derive(Deserialize)]
struct UserIdPayload {
    #[serde(rename = "userId")]
    user_id: String,
}

pub struct ReauthHandler;

#[async_trait]
impl Handler for ReauthHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: UserIdPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let user_id = ctx.core.identity.attach_user(&ctx.sid, &payload.user_id).await?;
        Ok(Some(serde_json::json!({ "ok": true, "userId": user_id })))
    }
}

pub struct AttachUserHandler;

#[async_trait]
impl Handler for AttachUserHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let payload: UserIdPayload = serde_json::from_value(data).map_err(|_| ClientError::BadPayload)?;
        let user_id = ctx.core.identity.attach_user(&ctx.sid, &payload.user_id).await?;
        Ok(Some(serde_json::json!({ "ok": true, "userId": user_id })))
    }
}

pub struct WhoamiHandler;

#[async_trait]
impl Handler for WhoamiHandler {
    async fn handle(&self, ctx: &HandlerContext, _data: Value) -> HandlerResult<Option<Value>> {
        let user_id = ctx.core.connections.user_of(&ctx.sid);
        Ok(Some(serde_json::json!({ "_id": user_id })))
    }
}

pub struct ProfileMeHandler;

#[async_trait]
impl Handler for ProfileMeHandler {
    async fn handle(&self, ctx: &HandlerContext, _data: Value) -> HandlerResult<Option<Value>> {
        let user_id = ctx.core.connections.user_of(&ctx.sid).ok_or(ClientError::Unauthorized)?;
        let profile = ctx.core.directory.get_user(&user_id).await.map_err(|_| ClientError::NotFound)?;
        Ok(Some(serde_json::to_value(profile).unwrap_or(Value::Null)))
    }
}

pub struct ProfileUpdateHandler;

#[async_trait]
impl Handler for ProfileUpdateHandler {
    async fn handle(&self, ctx: &HandlerContext, data: Value) -> HandlerResult<Option<Value>> {
        let user_id = ctx.core.connections.user_of(&ctx.sid).ok_or(ClientError::Unauthorized)?;
        let profile = ctx.core.directory.update_profile(&user_id, data).await.map_err(|_| ClientError::BadPayload)?;
        Ok(Some(serde_json::to_value(profile).unwrap_or(Value::Null)))
    }
}
