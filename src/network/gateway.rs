//! Gateway — axum HTTP server exposing the WebSocket signaling transport
//! alongside the REST surface.

use crate::handlers::Registry;
use crate::state::managers::identity::Handshake;
use crate::state::Core;
use axum::extract::ws::{WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, instrument};

#[derive(Clone)]
pub struct GatewayState {
    pub core: Arc<Core>,
    pub registry: Arc<Registry>,
}

pub struct Gateway {
    listener: TcpListener,
    router: Router,
}

#[derive(Deserialize, Default)]
struct SocketQuery {
    #[serde(rename = "userId")]
    user_id: Option<String>,
    #[serde(rename = "installId")]
    install_id: Option<String>,
}

impl Gateway {
    /// Binds the gateway, merging the WebSocket upgrade route with the
    /// REST surface built in [`crate::http`].
    pub async fn bind(addr: SocketAddr, core: Arc<Core>) -> std::io::Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        let state = GatewayState { core, registry: Arc::new(Registry::new()) };

        let router = Router::new()
            .route("/ws", get(ws_upgrade))
            .merge(crate::http::routes())
            .layer(CorsLayer::permissive())
            .with_state(state);

        info!(%addr, "gateway listening");
        Ok(Self { listener, router })
    }

    #[instrument(skip(self), name = "gateway")]
    pub async fn run(self) -> std::io::Result<()> {
        axum::serve(self.listener, self.router.into_make_service())
            .await
            .map_err(|err| {
                error!(error = %err, "gateway server error");
                std::io::Error::other(err)
            })
    }
}

async fn ws_upgrade(
    ws: WebSocketUpgrade,
    Query(query): Query<SocketQuery>,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    let handshake = Handshake { user_id: query.user_id, install_id: query.install_id };
    ws.on_upgrade(move |socket: WebSocket| async move {
        crate::network::connection::handle_socket(socket, state.core, state.registry, handshake).await;
    })
}
