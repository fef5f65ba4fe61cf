pub mod handlers;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;

use crate::registry::ConnectionHandle;
use crate::state::AppState;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection request");

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Drive one viewer's connection from handshake to close
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let (conn, mut outbound) = ConnectionHandle::new();

    let snapshot = match state.engine.get_state().await {
        Ok(snapshot) => snapshot,
        Err(e) => {
            tracing::error!("Failed to read pet state for welcome: {}", e);
            None
        }
    };

    // Queue the welcome before registering so no broadcast can overtake it
    if !state.broadcaster.send_welcome(&conn, snapshot).await {
        return;
    }
    state.registry().register(conn.clone()).await;

    // Writer task: owns the sink and drains this connection's queue
    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbound.recv().await {
            if let Err(e) = sender.send(Message::Text(frame.into())).await {
                tracing::debug!("WebSocket send failed: {}", e);
                break;
            }
        }
    });

    loop {
        tokio::select! {
            // Writer stopped: the socket can no longer be written to
            _ = &mut writer => break,

            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text.as_str());
                        handlers::dispatch(&state, &conn, text.as_str()).await;

                        // Dropped after a failed delivery, e.g. a full queue
                        if !state.registry().contains(conn.id()).await {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::debug!("WebSocket closed by client");
                        break;
                    }
                    // Ping/pong are answered by axum; binary frames carry no protocol
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::warn!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    state.registry().deregister(conn.id()).await;
    writer.abort();
}
