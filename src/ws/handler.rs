//! WebSocket upgrade handler: the per-client match event stream

use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::ClientHandle;
use crate::util::rate_limit::{create_limiter, ACTION_RATE_LIMIT};
use crate::ws::protocol::{ClientMsg, ServerMsg};

/// A write that takes longer than this marks the session as lagging
const SEND_TIMEOUT: Duration = Duration::from_secs(5);

const MAX_NAME_LEN: usize = 32;

/// Query parameters for WebSocket connection
#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Display name shown to the opponent
    pub name: Option<String>,
}

impl WsQuery {
    fn display_name(&self) -> String {
        let name: String = self
            .name
            .as_deref()
            .map(str::trim)
            .unwrap_or_default()
            .chars()
            .take(MAX_NAME_LEN)
            .collect();
        if name.is_empty() {
            "Player".to_string()
        } else {
            name
        }
    }
}

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<AppState>,
) -> Response {
    let name = query.display_name();
    ws.on_upgrade(move |socket| handle_socket(socket, name, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, name: String, state: AppState) {
    let (ws_sink, ws_stream) = socket.split();

    // Welcome and queue status are the first two events in the outbox
    let (handle, outbox) = state.matchmaking.register_client(name).await;
    let client_id = handle.client_id;

    run_session(&handle, ws_sink, ws_stream, outbox).await;

    state.matchmaking.disconnect(client_id).await;
    info!(client_id = %client_id, "WebSocket connection closed");
}

/// Pump the outbox to the socket while reading client frames
async fn run_session(
    handle: &ClientHandle,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbox: mpsc::UnboundedReceiver<ServerMsg>,
) {
    let client_id = handle.client_id;

    // Writer owns the outbox; dropping it marks the client as gone
    let mut writer = tokio::spawn(async move {
        while let Some(msg) = outbox.recv().await {
            match tokio::time::timeout(SEND_TIMEOUT, send_msg(&mut ws_sink, &msg)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    debug!(client_id = %client_id, error = %e, "WebSocket send failed");
                    break;
                }
                Err(_) => {
                    warn!(client_id = %client_id, "Client lagging, dropping session");
                    break;
                }
            }
        }
        let _ = ws_sink.close().await;
    });

    let limiter = create_limiter(ACTION_RATE_LIMIT);
    let reader = async {
        while let Some(result) = ws_stream.next().await {
            match result {
                Ok(Message::Text(text)) => {
                    if limiter.check().is_err() {
                        warn!(client_id = %client_id, "Rate limited stream message");
                        continue;
                    }
                    match serde_json::from_str::<ClientMsg>(&text) {
                        Ok(ClientMsg::Ping { t }) => {
                            handle.push(ServerMsg::Pong { t });
                        }
                        Ok(ClientMsg::Leave) => {
                            info!(client_id = %client_id, "Client left");
                            break;
                        }
                        Err(e) => {
                            warn!(client_id = %client_id, error = %e, "Failed to parse client message");
                            handle.push(ServerMsg::Error {
                                code: "bad_message".to_string(),
                                message: "Unrecognised message".to_string(),
                            });
                        }
                    }
                }
                Ok(Message::Binary(_)) => {
                    warn!(client_id = %client_id, "Received binary message, ignoring");
                }
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                Ok(Message::Close(_)) => {
                    info!(client_id = %client_id, "Client initiated close");
                    break;
                }
                Err(e) => {
                    error!(client_id = %client_id, error = %e, "WebSocket error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = &mut writer => {}
        _ = reader => {}
    }
    writer.abort();
}

/// Send a message over WebSocket
async fn send_msg(sink: &mut SplitSink<WebSocket, Message>, msg: &ServerMsg) -> Result<(), String> {
    let json = serde_json::to_string(msg).map_err(|e| e.to_string())?;
    sink.send(Message::Text(json))
        .await
        .map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_name_is_trimmed_and_defaulted() {
        let query = WsQuery {
            name: Some("  alice  ".to_string()),
        };
        assert_eq!(query.display_name(), "alice");
        assert_eq!(WsQuery { name: None }.display_name(), "Player");
        assert_eq!(
            WsQuery {
                name: Some("x".repeat(100))
            }
            .display_name()
            .len(),
            MAX_NAME_LEN
        );
    }
}
