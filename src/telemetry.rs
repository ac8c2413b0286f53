//! Event-aware telemetry.
//!
//! Provides structured tracing spans with signaling-specific context,
//! enabling correlation of logs across matchmaking, direct-call, and
//! room-forwarding operations.
//!
//! ## Key Features
//!
//! - [`EventTraceContext`]: captures the attributes of one inbound event
//!   (event name, sid, userId, roomId/callId)
//! - [`CommandTimer`]: records per-event latency on drop
//! - Integration with the metrics module for unified observability

#![allow(dead_code)]

use std::time::Instant;
use tracing::{Level, Span, span};

/// Trace context for one inbound socket event.
#[derive(Debug, Clone, Default)]
pub struct EventTraceContext {
    /// The event name being processed (e.g., "start", "call:initiate").
    pub event: Option<String>,
    /// Room id, if applicable.
    pub room_id: Option<String>,
    /// Call id, if applicable.
    pub call_id: Option<String>,
    /// Socket id of the connection handling the event.
    pub sid: Option<String>,
    /// Bound user id, if the socket is bound.
    pub user_id: Option<String>,
}

impl EventTraceContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    pub fn with_call(mut self, call_id: impl Into<String>) -> Self {
        self.call_id = Some(call_id.into());
        self
    }

    pub fn with_sid(mut self, sid: impl Into<String>) -> Self {
        self.sid = Some(sid.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Create a tracing span from this context.
    pub fn into_span(self) -> Span {
        let event = self.event.as_deref().unwrap_or("unknown");
        span!(
            Level::INFO,
            "signal.event",
            event = event,
            room_id = self.room_id.as_deref(),
            call_id = self.call_id.as_deref(),
            sid = self.sid.as_deref(),
            user_id = self.user_id.as_deref(),
        )
    }
}

/// Guard for timing event handler execution and recording metrics.
///
/// Records latency when dropped.
pub struct CommandTimer {
    event: String,
    start: Instant,
}

impl CommandTimer {
    pub fn new(event: impl Into<String>) -> Self {
        Self { event: event.into(), start: Instant::now() }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and record an error (does not record duration).
    pub fn record_error(self, code: &str) {
        crate::metrics::record_command_error(&self.event, code);
    }
}

impl Drop for CommandTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        crate::metrics::record_command(&self.event, duration);
    }
}

/// Convenience function combining context creation with span creation.
pub fn create_event_span(event: &str, sid: Option<&str>, user_id: Option<&str>) -> Span {
    let mut ctx = EventTraceContext::new().with_event(event);
    if let Some(sid) = sid {
        ctx = ctx.with_sid(sid);
    }
    if let Some(user_id) = user_id {
        ctx = ctx.with_user_id(user_id);
    }
    ctx.into_span()
}

/// Create a span for room broadcast operations, also recording fan-out size.
pub fn create_room_span(room_id: &str, operation: &str, recipients: usize) -> Span {
    crate::metrics::record_fanout(recipients);
    span!(
        Level::DEBUG,
        "signal.room",
        room_id = room_id,
        operation = operation,
        recipients = recipients,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_context_builder() {
        let ctx = EventTraceContext::new()
            .with_event("start")
            .with_sid("sid-1")
            .with_user_id("user-1");

        assert_eq!(ctx.event.as_deref(), Some("start"));
        assert_eq!(ctx.sid.as_deref(), Some("sid-1"));
        assert_eq!(ctx.user_id.as_deref(), Some("user-1"));
    }

    #[test]
    fn test_command_timer() {
        let timer = CommandTimer::new("test");
        std::thread::sleep(std::time::Duration::from_millis(10));
        let elapsed = timer.elapsed_secs();
        assert!(elapsed >= 0.01);
        drop(timer);
    }
}
