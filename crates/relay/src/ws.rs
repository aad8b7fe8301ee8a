// Connection lifecycle: accept, bind to a replica, pump frames, tear
// down.
//
// Each connection gets an unbounded outbound queue; broadcasts from
// sibling sessions are enqueued under the document lock and written to
// the socket here, in this connection's own task, so one slow client
// never stalls the others. Teardown runs exactly once per connection,
// on clean close, transport error, or heartbeat timeout alike.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message as WsFrame, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::RelayConfig;
use crate::registry::DocRegistry;
use crate::session;

#[derive(Clone)]
pub struct RelayState {
    pub registry: Arc<DocRegistry>,
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

impl RelayState {
    pub fn new(registry: Arc<DocRegistry>, config: &RelayConfig) -> Self {
        Self {
            registry,
            ping_interval: config.ping_interval,
            ping_timeout: config.ping_timeout,
        }
    }
}

pub fn router(state: RelayState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/", get(root))
        .route("/{doc_name}", get(ws_upgrade))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Plain GET on the root answers with a banner, the same fallback the
/// original process served to non-upgrade requests.
async fn root() -> &'static str {
    "coedit-relay"
}

async fn ws_upgrade(
    Path(doc_name): Path<String>,
    State(state): State<RelayState>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, doc_name, socket))
}

async fn handle_socket(state: RelayState, doc_name: String, mut socket: WebSocket) {
    let conn_id = Uuid::new_v4();
    let (outbound_sender, mut outbound_receiver) = mpsc::unbounded_channel::<Vec<u8>>();

    let shard = state.registry.resolve(&doc_name, conn_id, outbound_sender).await;
    info!(doc = %doc_name, conn = %conn_id, "connection joined");

    // Two-phase handshake starts server-side: step 1 goes out first.
    session::greet(&shard, conn_id).await;

    // Heartbeat: server pings on an interval and disconnects when no
    // pong arrives within the timeout, so abrupt network drops still
    // run teardown promptly.
    let mut ping_interval = tokio::time::interval(state.ping_interval);
    ping_interval.reset(); // skip immediate first tick
    let mut last_pong = Instant::now();

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if last_pong.elapsed() > state.ping_interval + state.ping_timeout {
                    warn!(doc = %doc_name, conn = %conn_id, "heartbeat timeout, disconnecting");
                    break;
                }
                if socket.send(WsFrame::Ping(vec![].into())).await.is_err() {
                    break;
                }
            }
            maybe_outbound = outbound_receiver.recv() => {
                match maybe_outbound {
                    Some(frame) => {
                        if socket.send(WsFrame::Binary(frame.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            maybe_message = socket.recv() => {
                let Some(message) = maybe_message else {
                    break;
                };

                match message {
                    Ok(WsFrame::Binary(frame)) => {
                        // Partial-failure isolation: a bad frame is
                        // logged and dropped, the session stays live.
                        if let Err(error) = session::handle_frame(&shard, conn_id, &frame).await {
                            warn!(doc = %doc_name, conn = %conn_id, %error, "dropping frame");
                        }
                    }
                    Ok(WsFrame::Ping(payload)) => {
                        if socket.send(WsFrame::Pong(payload)).await.is_err() {
                            break;
                        }
                    }
                    Ok(WsFrame::Pong(_)) => {
                        last_pong = Instant::now();
                    }
                    Ok(WsFrame::Close(_)) => break,
                    Ok(WsFrame::Text(_)) => {
                        debug!(doc = %doc_name, conn = %conn_id, "ignoring text frame");
                    }
                    Err(error) => {
                        warn!(doc = %doc_name, conn = %conn_id, %error, "transport error, closing session");
                        break;
                    }
                }
            }
        }
    }

    state.registry.release(&doc_name, conn_id).await;
    info!(doc = %doc_name, conn = %conn_id, "connection closed");
}
