//! Per-event handler context.

use crate::state::ids::Sid;
use crate::state::Core;
use std::sync::Arc;

/// Context threaded through every event handler: which socket raised the
/// event and a handle to the shared state container.
pub struct HandlerContext {
    pub sid: Sid,
    pub core: Arc<Core>,
}

impl HandlerContext {
    pub fn new(sid: Sid, core: Arc<Core>) -> Self {
        Self { sid, core }
    }
}
