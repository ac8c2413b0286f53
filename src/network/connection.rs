//! Per-socket connection handling over a WebSocket.
//!
//! Each connection owns one outbound mpsc channel and one `tokio::select!`
//! loop multiplexing inbound frames, outbound sends, and shutdown —
//! generalized from the same select-loop shape used for the original
//! line-protocol transport in this codebase.

use crate::handlers::{HandlerContext, Registry};
use crate::state::ids::Sid;
use crate::state::managers::identity::Handshake;
use crate::state::Core;
use crate::wire::{InboundEnvelope, OutboundEnvelope};
use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

pub async fn handle_socket(socket: WebSocket, core: Arc<Core>, registry: Arc<Registry>, handshake: Handshake) {
    let sid = Sid::from(uuid::Uuid::new_v4().to_string());
    let (mut sender, mut receiver) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutboundEnvelope>();

    core.connections.connect(sid.clone(), out_tx);
    crate::metrics::CONNECTIONS_TOTAL.inc();
    info!(%sid, "connection accepted");

    core.identity.bind_on_connect(&sid, &handshake).await;

    let ctx = HandlerContext::new(sid.clone(), core.clone());

    loop {
        tokio::select! {
            outbound = out_rx.recv() => {
                match outbound {
                    Some(envelope) if envelope.event == "_force_disconnect" => {
                        debug!(%sid, "force-disconnecting duplicate login");
                        break;
                    }
                    Some(envelope) => {
                        let text = match serde_json::to_string(&envelope) {
                            Ok(text) => text,
                            Err(err) => {
                                warn!(%sid, error = %err, "failed to serialize outbound envelope");
                                continue;
                            }
                        };
                        if sender.send(Message::Text(text)).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<InboundEnvelope>(&text) {
                            Ok(envelope) => registry.dispatch(&ctx, envelope).await,
                            Err(err) => debug!(%sid, error = %err, "dropped malformed frame"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        debug!(%sid, error = %err, "websocket read error");
                        break;
                    }
                }
            }
        }
    }

    on_disconnect(&sid, &core).await;
    info!(%sid, "connection closed");
}

async fn on_disconnect(sid: &Sid, core: &Arc<Core>) {
    let is_nexting = core.connections.with_state(sid, |s| s.is_nexting).unwrap_or(false);
    core.matcher.on_disconnect(sid).await;
    core.signaling.on_disconnect(sid, is_nexting).await;
    let user_id = core.connections.disconnect(sid);
    if user_id.is_some() {
        core.presence.broadcast_online_list();
    }
}
