//! Event registry and dispatch.
//!
//! Maps inbound event names to handlers, the same keyed-dispatch shape used
//! throughout this codebase for command routing, generalized from command
//! names to signaling event names.

use crate::handlers::call::{
    CallAcceptHandler, CallBusyHandler, CallCancelHandler, CallDeclineHandler, CallEndHandler, CallInitiateHandler,
};
use crate::handlers::context::HandlerContext;
use crate::handlers::identity::{
    AttachUserHandler, IdentityAttachHandler, ProfileMeHandler, ProfileUpdateHandler, ReauthHandler, WhoamiHandler,
};
use crate::handlers::matcher::{NextHandler, StartHandler, StopHandler};
use crate::handlers::signaling::{
    ConnectionEstablishedHandler, ForwardHandler, MediaControlHandler, RoomJoinAckHandler, RoomLeaveHandler,
};
use crate::handlers::traits::Handler;
use crate::telemetry::{CommandTimer, create_event_span};
use crate::wire::{AckEnvelope, InboundEnvelope};
use std::collections::HashMap;
use tracing::{Instrument, debug};

pub struct Registry {
    handlers: HashMap<&'static str, Box<dyn Handler>>,
}

impl Registry {
    pub fn new() -> Self {
        let mut handlers: HashMap<&'static str, Box<dyn Handler>> = HashMap::new();

        handlers.insert("identity:attach", Box::new(IdentityAttachHandler));
        handlers.insert("reauth", Box::new(ReauthHandler));
        handlers.insert("attach_user", Box::new(AttachUserHandler));
        handlers.insert("whoami", Box::new(WhoamiHandler));
        handlers.insert("profile:me", Box::new(ProfileMeHandler));
        handlers.insert("profile:update", Box::new(ProfileUpdateHandler));

        handlers.insert("start", Box::new(StartHandler));
        handlers.insert("next", Box::new(NextHandler));
        handlers.insert("stop", Box::new(StopHandler));

        handlers.insert("call:initiate", Box::new(CallInitiateHandler));
        handlers.insert("call:accept", Box::new(CallAcceptHandler));
        handlers.insert("call:decline", Box::new(CallDeclineHandler));
        handlers.insert("call:cancel", Box::new(CallCancelHandler));
        handlers.insert("call:end", Box::new(CallEndHandler));
        handlers.insert("call:busy", Box::new(CallBusyHandler));

        handlers.insert("room:join:ack", Box::new(RoomJoinAckHandler));
        handlers.insert("room:leave", Box::new(RoomLeaveHandler));
        handlers.insert("connection:established", Box::new(ConnectionEstablishedHandler));

        for event in ["offer", "answer", "ice-candidate", "hangup"] {
            handlers.insert(event, Box::new(ForwardHandler { event }));
        }
        for event in ["cam-toggle", "pip:entered", "pip:exited", "pip:state"] {
            handlers.insert(event, Box::new(MediaControlHandler { event }));
        }

        Self { handlers }
    }

    /// Dispatches one inbound envelope, sending an ack back through
    /// `ctx.core.connections` when the client supplied an `ackId` and the
    /// handler produced a reply (or failed).
    pub async fn dispatch(&self, ctx: &HandlerContext, envelope: InboundEnvelope) {
        let Some(handler) = self.handlers.get(envelope.event.as_str()) else {
            debug!(event = %envelope.event, "no handler registered for event");
            return;
        };

        let user_id = ctx.core.connections.user_of(&ctx.sid);
        let span = create_event_span(&envelope.event, Some(ctx.sid.as_str()), user_id.as_ref().map(|u| u.as_str()));
        let event_name = envelope.event.clone();

        async move {
            let _timer = CommandTimer::new(event_name.clone());
            match handler.handle(ctx, envelope.data).await {
                Ok(reply) => {
                    if let (Some(ack_id), Some(data)) = (envelope.ack_id, reply) {
                        ctx.core.connections.send(
                            &ctx.sid,
                            crate::wire::OutboundEnvelope::new(
                                "ack",
                                serde_json::to_value(AckEnvelope::ok(ack_id, data)).unwrap_or_default(),
                            ),
                        );
                    }
                }
                Err(err) => {
                    crate::metrics::record_command_error(&event_name, err.error_code());
                    if let Some(ack_id) = envelope.ack_id {
                        ctx.core.connections.send(
                            &ctx.sid,
                            crate::wire::OutboundEnvelope::new(
                                "ack",
                                serde_json::to_value(AckEnvelope::err(ack_id, err.error_code())).unwrap_or_default(),
                            ),
                        );
                    }
                }
            }
        }
        .instrument(span)
        .await;
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
