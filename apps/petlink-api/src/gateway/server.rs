//! WebSocket upgrade handler and per-connection event loop.

use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::http::header::ORIGIN;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use petlink_common::id::{prefix, prefixed_ulid};
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::auth::credentials;
use crate::error::ApiError;
use crate::models::user::Identity;
use crate::AppState;

use super::events::{AckArgs, ClientEvent, ClientFrame, ServerFrame, INVALID_EVENT_MESSAGE};
use super::fanout::OutboundFrame;
use super::handler::handle_event;
use super::rooms::Room;
use super::session::GatewaySession;

/// How often the server pings an idle client.
pub const PING_INTERVAL: Duration = Duration::from_secs(25);

/// Silence tolerated after a ping before the connection is dropped.
pub const PING_TIMEOUT: Duration = Duration::from_secs(20);

/// Heartbeat timings applied to every realtime connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Liveness {
    pub ping_interval: Duration,
    pub ping_timeout: Duration,
}

impl Liveness {
    /// Silence after which a connection is considered dead.
    pub fn max_silence(&self) -> Duration {
        self.ping_interval + self.ping_timeout
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self {
            ping_interval: PING_INTERVAL,
            ping_timeout: PING_TIMEOUT,
        }
    }
}

/// Body message of a 403 for a handshake from a foreign origin.
pub const ORIGIN_NOT_ALLOWED_MESSAGE: &str = "Origem não permitida";

const CLOSE_GOING_AWAY: u16 = 1001;
const CLOSE_POLICY: u16 = 1008;

type WsSink = SplitSink<WebSocket, Message>;

/// Why a realtime connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The client sent a close frame.
    ClientDisconnect,
    /// The socket ended without a close frame.
    TransportClose,
    TransportError,
    PingTimeout,
    ServerShutdown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::ClientDisconnect => "client disconnect",
            DisconnectReason::TransportClose => "transport close",
            DisconnectReason::TransportError => "transport error",
            DisconnectReason::PingTimeout => "ping timeout",
            DisconnectReason::ServerShutdown => "server shutting down",
        }
    }
}

/// Handshake auth field, passed as `?token=` on the upgrade request.
#[derive(Debug, Default, Deserialize)]
pub struct SocketQuery {
    #[serde(default)]
    pub token: Option<String>,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/socket", get(ws_upgrade))
}

/// Origin-check and authenticate the upgrade request, then switch protocols.
///
/// A browser origin outside the allow-list gets a 403 and any
/// authentication failure a 401; in both cases the socket is never opened.
async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<SocketQuery>,
    headers: HeaderMap,
) -> Response {
    let conn_id = prefixed_ulid(prefix::CONNECTION);

    if let Some(origin) = headers.get(ORIGIN) {
        let allowed = origin
            .to_str()
            .is_ok_and(|origin| state.config.cors_origins().contains(&origin));
        if !allowed {
            tracing::warn!(
                %conn_id,
                origin = ?origin,
                reason = "origin_not_allowed",
                "realtime connection rejected"
            );
            return ApiError::forbidden(ORIGIN_NOT_ALLOWED_MESSAGE).into_response();
        }
    }

    let identity = match credentials::authenticate(
        state.store.as_ref(),
        &state.config,
        query.token.as_deref(),
        &headers,
    )
    .await
    {
        Ok(identity) => identity,
        Err(failure) => {
            tracing::warn!(%conn_id, reason = failure.reason(), "realtime connection rejected");
            return ApiError::from(failure).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_connection(socket, state, conn_id, identity))
}

async fn handle_connection(
    socket: WebSocket,
    state: AppState,
    conn_id: String,
    identity: Identity,
) {
    let outbound = state.dispatcher.register(&conn_id, &identity.id);
    let mut session = GatewaySession::new(conn_id, identity);

    tracing::info!(
        conn_id = %session.conn_id,
        user_id = %session.user_id(),
        room = %Room::personal(session.user_id()),
        "realtime connection established"
    );

    let reason = run_session(&state, &mut session, socket, outbound).await;

    let released = state.dispatcher.unregister(&session.conn_id);
    session.mark_disconnected();

    tracing::info!(
        conn_id = %session.conn_id,
        user_id = %session.user_id(),
        reason = reason.as_str(),
        rooms = released.len(),
        "realtime connection closed"
    );
}

/// Main connection loop: handle client frames in arrival order, forward
/// queued room events, and enforce liveness.
async fn run_session(
    state: &AppState,
    session: &mut GatewaySession,
    socket: WebSocket,
    mut outbound: mpsc::Receiver<OutboundFrame>,
) -> DisconnectReason {
    let (mut ws_tx, mut ws_rx): (WsSink, SplitStream<WebSocket>) = socket.split();

    let liveness = state.liveness;
    let mut ping_timer = time::interval_at(
        Instant::now() + liveness.ping_interval,
        liveness.ping_interval,
    );
    let mut last_seen = Instant::now();

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                let Some(msg) = msg else {
                    return DisconnectReason::TransportClose;
                };
                let msg = match msg {
                    Ok(m) => m,
                    Err(e) => {
                        tracing::debug!(?e, conn_id = %session.conn_id, "ws read error");
                        return DisconnectReason::TransportError;
                    }
                };
                last_seen = Instant::now();

                match msg {
                    Message::Text(text) => {
                        if let Some(reply) = handle_text(state, session, text.as_str()).await {
                            if send_frame(&mut ws_tx, &reply).await.is_err() {
                                return DisconnectReason::TransportError;
                            }
                        }
                    }
                    Message::Close(_) => return DisconnectReason::ClientDisconnect,
                    Message::Ping(_) | Message::Pong(_) => {}
                    Message::Binary(_) => {
                        tracing::debug!(conn_id = %session.conn_id, "ignoring binary frame");
                    }
                }
            }

            frame = outbound.recv() => {
                let Some(frame) = frame else {
                    let _ = send_close(&mut ws_tx, CLOSE_GOING_AWAY, DisconnectReason::ServerShutdown.as_str()).await;
                    return DisconnectReason::ServerShutdown;
                };
                if send_frame(&mut ws_tx, &frame).await.is_err() {
                    return DisconnectReason::TransportError;
                }
            }

            _ = ping_timer.tick() => {
                if last_seen.elapsed() >= liveness.max_silence() {
                    let _ = send_close(&mut ws_tx, CLOSE_POLICY, DisconnectReason::PingTimeout.as_str()).await;
                    return DisconnectReason::PingTimeout;
                }
                if ws_tx.send(Message::Ping(Default::default())).await.is_err() {
                    return DisconnectReason::TransportError;
                }
            }
        }
    }
}

/// Parse and dispatch one text frame. Returns the ack frame to send, if the
/// client asked for one.
async fn handle_text(
    state: &AppState,
    session: &mut GatewaySession,
    text: &str,
) -> Option<ServerFrame> {
    let frame: ClientFrame = match serde_json::from_str(text) {
        Ok(f) => f,
        Err(e) => {
            tracing::warn!(conn_id = %session.conn_id, error = %e, "malformed client frame");
            return None;
        }
    };

    let args = match ClientEvent::parse(&frame.event, frame.data) {
        Ok(event) => handle_event(state, session, event).await,
        Err(e) => {
            tracing::warn!(
                conn_id = %session.conn_id,
                user_id = %session.user_id(),
                reason = %e,
                "invalid client event"
            );
            AckArgs::failed(INVALID_EVENT_MESSAGE)
        }
    };

    frame.ack.map(|id| ServerFrame::ack(id, args))
}

async fn send_frame(ws_tx: &mut WsSink, frame: &ServerFrame) -> Result<(), axum::Error> {
    let json = match serde_json::to_string(frame) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(?e, "failed to serialize server frame");
            return Ok(());
        }
    };
    ws_tx.send(Message::Text(json.into())).await
}

/// Send a WebSocket close frame with a code and reason.
async fn send_close(ws_tx: &mut WsSink, code: u16, reason: &str) -> Result<(), axum::Error> {
    let close_msg = Message::Close(Some(CloseFrame {
        code,
        reason: reason.to_string().into(),
    }));
    ws_tx.send(close_msg).await
}
