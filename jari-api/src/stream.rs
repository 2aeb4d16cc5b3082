use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::State,
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};

use crate::hub::SeatHub;
use crate::state::AppState;

/// Read-only realtime channel: the server pushes `SEAT_STATUS_UPDATED`
/// messages, viewers send nothing the server acts on.
pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/seats/stream", get(seat_stream))
}

async fn seat_stream(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    let hub = state.hub.clone();
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<SeatHub>) {
    let (id, mut events) = hub.register();
    tracing::debug!(connection = %id, viewers = hub.connections(), "viewer connected");

    let (mut sink, mut source) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let text = match event.wire_json() {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(connection = %id, "failed to encode seat event: {}", e);
                        continue;
                    }
                };
                if sink.send(Message::Text(text.into())).await.is_err() {
                    break;
                }
            }
            incoming = source.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    // Ignore pings/stray client chatter.
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    hub.unregister(id);
    tracing::debug!(connection = %id, viewers = hub.connections(), "viewer disconnected");
}
