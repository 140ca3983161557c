//! WebSocket fan-out of game events
//!
//! Every connection receives the broadcast stream (`game_result`,
//! `user_registered`, `config_updated`, `heartbeat`). A client may also send
//! `{"username": ..., "message": ...}` frames; chat commands are answered on
//! that connection only.

use super::handlers::AppState;
use crate::broadcast::BroadcastHub;
use crate::chat::{ChatReply, ChatResponder};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct ChatFrame {
    username: String,
    message: String,
}

/// Frames addressed to a single connection
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum DirectFrame {
    ChatReply(ChatReply),
    Error { message: String },
}

#[derive(Clone)]
pub struct WebSocketManager {
    hub: BroadcastHub,
    chat: ChatResponder,
    client_count: Arc<AtomicU64>,
}

impl WebSocketManager {
    pub fn new(hub: BroadcastHub, chat: ChatResponder) -> Self {
        Self {
            hub,
            chat,
            client_count: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn client_count(&self) -> u64 {
        self.client_count.load(Ordering::SeqCst)
    }

    pub fn handle_upgrade(&self, ws: WebSocketUpgrade) -> Response {
        let manager = self.clone();
        ws.on_upgrade(move |socket| async move { manager.handle_connection(socket).await })
    }

    async fn handle_connection(&self, socket: WebSocket) {
        let client_id = generate_client_id();
        let connected = self.client_count.fetch_add(1, Ordering::SeqCst) + 1;
        info!(client = %client_id, total = connected, "WebSocket client connected");

        let (mut sender, mut receiver) = socket.split();
        let mut events = self.hub.subscribe();
        let (direct_tx, mut direct_rx) = mpsc::channel::<DirectFrame>(32);

        let chat = self.chat.clone();
        let receive_id = client_id.clone();
        let mut receive_task = tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => {
                        let frame = match serde_json::from_str::<ChatFrame>(&text) {
                            Ok(frame) => frame,
                            Err(e) => {
                                debug!(client = %receive_id, error = %e, "Ignoring malformed frame");
                                let _ = direct_tx
                                    .send(DirectFrame::Error {
                                        message: "expected {\"username\", \"message\"}".to_string(),
                                    })
                                    .await;
                                continue;
                            }
                        };
                        if let Some(reply) = chat.handle(&frame.username, &frame.message).await {
                            if direct_tx.send(DirectFrame::ChatReply(reply)).await.is_err() {
                                break;
                            }
                        }
                    }
                    Ok(Message::Close(_)) => {
                        debug!(client = %receive_id, "Client requested close");
                        break;
                    }
                    Err(e) => {
                        warn!(client = %receive_id, error = %e, "WebSocket receive error");
                        break;
                    }
                    _ => {}
                }
            }
        });

        let send_id = client_id.clone();
        let mut send_task = tokio::spawn(async move {
            loop {
                let text = tokio::select! {
                    event = events.recv() => match event {
                        Ok(event) => serde_json::to_string(&event),
                        Err(RecvError::Lagged(skipped)) => {
                            warn!(client = %send_id, skipped, "Client lagging, events dropped");
                            continue;
                        }
                        Err(RecvError::Closed) => break,
                    },
                    frame = direct_rx.recv() => match frame {
                        Some(frame) => serde_json::to_string(&frame),
                        None => break,
                    },
                };

                let text = match text {
                    Ok(text) => text,
                    Err(e) => {
                        error!("Failed to serialize frame: {}", e);
                        continue;
                    }
                };
                if sender.send(Message::Text(text)).await.is_err() {
                    debug!(client = %send_id, "Client disconnected");
                    break;
                }
            }
        });

        tokio::select! {
            _ = &mut receive_task => send_task.abort(),
            _ = &mut send_task => receive_task.abort(),
        }

        let remaining = self.client_count.fetch_sub(1, Ordering::SeqCst) - 1;
        info!(client = %client_id, remaining, "WebSocket client disconnected");
    }
}

/// GET /ws
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    state.websocket_manager.handle_upgrade(ws)
}

fn generate_client_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("ws_{}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::ChatReplyKind;

    #[test]
    fn test_direct_frame_shape() {
        let frame = DirectFrame::ChatReply(ChatReply {
            kind: ChatReplyKind::Info,
            message: "hi".to_string(),
        });
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "chat_reply");
        assert_eq!(json["kind"], "info");
        assert_eq!(json["message"], "hi");
    }

    #[test]
    fn test_client_ids_are_unique() {
        assert_ne!(generate_client_id(), generate_client_id());
    }
}
