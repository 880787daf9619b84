use super::http::AppState;
use crate::domains::path_optimization::OptimizationEvent;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use tokio::sync::broadcast::error::RecvError;

/// Upgrade to a WebSocket subscribed to optimization events.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Attach to the hub, greet with `connection_status`, forward hub events
/// until either side closes. When the last subscriber leaves, the current
/// optimization is stopped.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let conn_id = uuid::Uuid::new_v4().to_string();
    let mut events = state.hub.attach();
    tracing::info!(conn_id = %conn_id, subscribers = state.hub.subscriber_count(), "Client connected");

    let (mut sink, mut stream) = socket.split();

    let greeting = serde_json::to_string(&OptimizationEvent::connected()).unwrap_or_default();
    if sink.send(Message::Text(greeting.into())).await.is_ok() {
        let sender_conn_id = conn_id.clone();
        let send_task = tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(text) => {
                        if sink.send(Message::Text(text.into())).await.is_err() {
                            tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                            break;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(conn_id = %sender_conn_id, skipped, "Subscriber lagging; events dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        while let Some(result) = stream.next().await {
            match result {
                Ok(Message::Close(_)) => break,
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
        send_task.abort();
    }

    let remaining = state.hub.detach();
    tracing::info!(conn_id = %conn_id, remaining, "Client disconnected");
    if remaining == 0 {
        let hub = state.hub.clone();
        state
            .service
            .on_disconnect_when(move || hub.subscriber_count() == 0)
            .await;
    }
}
