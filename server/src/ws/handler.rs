//! WebSocket upgrade handler

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use rand::Rng;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared::protocol::{ClientMsg, ServerMsg};

use crate::app::AppState;
use crate::http::auth::SESSION_COOKIE;
use crate::matchmaking::ConnectionHandle;
use crate::util::rate_limit::ConnectionRateLimiter;

/// Outbound messages buffered per connection before the writer
/// task drains them. A full buffer drops frames instead of
/// stalling the whole match.
const OUTBOUND_BUFFER: usize = 64;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Session ID of a logged-in user, absent for guests
    pub sid: Option<String>,
}

/// WebSocket upgrade handler. Identity comes from the `?sid=` query
/// or the session cookie; a missing or stale session simply makes
/// the connection a guest.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    cookies: Option<axum_extra::TypedHeader<axum_extra::headers::Cookie>>,
    State(state): State<AppState>,
) -> Response {
    let sid = query.sid.clone().or_else(|| {
        cookies
            .as_ref()
            .and_then(|header| header.get(SESSION_COOKIE))
            .map(str::to_owned)
    });
    let username = sid
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .and_then(|sid| state.sessions.lookup(sid));

    ws.on_upgrade(move |socket| handle_socket(socket, username, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, username: Option<String>, state: AppState) {
    let conn_id = Uuid::new_v4();
    let display_name = match &username {
        Some(name) => name.clone(),
        None => format!("Guest#{:04}", rand::thread_rng().gen_range(0..10_000)),
    };

    info!(conn_id = %conn_id, name = %display_name, "New WebSocket connection");

    let (mut ws_sink, mut ws_stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<ServerMsg>(OUTBOUND_BUFFER);

    // Writer task: outbound queue -> WebSocket
    let writer_conn_id = conn_id;
    let writer_handle = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if let Err(e) = send_msg(&mut ws_sink, &msg).await {
                debug!(conn_id = %writer_conn_id, error = %e, "WebSocket send failed");
                break;
            }
        }
    });

    state
        .matchmaking
        .register(ConnectionHandle {
            conn_id,
            display_name,
            username,
            tx,
        })
        .await;

    let rate_limiter = ConnectionRateLimiter::new();

    // Reader loop: WebSocket -> matchmaking/match
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_message() {
                    warn!(conn_id = %conn_id, "Rate limited client message");
                    continue;
                }

                match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(msg) => route_msg(&state, conn_id, msg).await,
                    Err(e) => {
                        warn!(conn_id = %conn_id, error = %e, "Failed to parse client message");
                    }
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(conn_id = %conn_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                debug!(conn_id = %conn_id, "Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!(conn_id = %conn_id, "Received pong");
            }
            Ok(Message::Close(_)) => {
                info!(conn_id = %conn_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket error");
                break;
            }
        }
    }

    // Cleanup tears down the queue slot and any running match
    state.matchmaking.disconnect(conn_id).await;
    writer_handle.abort();

    info!(conn_id = %conn_id, "WebSocket connection closed");
}

/// Queue messages go to the service, in-match messages to the
/// connection's running match.
async fn route_msg(state: &AppState, conn_id: Uuid, msg: ClientMsg) {
    match msg {
        ClientMsg::JoinQueue => state.matchmaking.join_queue(conn_id).await,
        ClientMsg::LeaveQueue => state.matchmaking.leave_queue(conn_id).await,
        msg @ (ClientMsg::Input { .. } | ClientMsg::Aim { .. } | ClientMsg::LeaveGame) => {
            state.matchmaking.forward_to_match(conn_id, msg).await;
        }
    }
}

/// Send a message over WebSocket
async fn send_msg(
    sink: &mut futures::stream::SplitSink<WebSocket, Message>,
    msg: &ServerMsg,
) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}
