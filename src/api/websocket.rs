//! WebSocket handler for snapshot streaming

use axum::{
    extract::{
        State, WebSocketUpgrade,
        ws::{Message, WebSocket},
    },
    response::Response,
};
use futures::{SinkExt, stream::StreamExt};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info};

use crate::{api::state::ApiState, registry::ServerSnapshot};

/// WebSocket upgrade handler
///
/// GET /api/v1/stream
pub async fn websocket_handler(ws: WebSocketUpgrade, State(state): State<ApiState>) -> Response {
    ws.on_upgrade(|socket| handle_websocket(socket, state))
}

fn encode(frame: &[ServerSnapshot]) -> Option<Message> {
    serde_json::to_string(frame).ok().map(Message::Text)
}

/// Handle WebSocket connection
async fn handle_websocket(socket: WebSocket, state: ApiState) {
    info!("WebSocket client connected");

    let (mut sender, mut receiver) = socket.split();
    let mut snapshot_rx = state.snapshot_tx.subscribe();

    // viewers get the current state right away instead of waiting for the next tick
    let initial = state.registry.snapshot().await;

    let mut send_task = tokio::spawn(async move {
        if let Some(message) = encode(&initial)
            && sender.send(message).await.is_err()
        {
            return;
        }

        loop {
            match snapshot_rx.recv().await {
                Ok(frame) => {
                    if let Some(message) = encode(&frame)
                        && sender.send(message).await.is_err()
                    {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!("WebSocket client lagged, skipped {skipped} frames");
                }
                Err(RecvError::Closed) => {
                    debug!("Broadcast channel closed");
                    break;
                }
            }
        }
    });

    // viewers are read-only; only watch for the close
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            if let Message::Close(_) = msg {
                break;
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
        }
    }

    info!("WebSocket client disconnected");
}
