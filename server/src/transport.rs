use axum::{
    extract::{
        ws::{Message as AxumWsMessage, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::hub::HubHandle;
use crate::protocol::Outbound;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Clone)]
struct AppState {
    hub: HubHandle,
}

/// HTTP routes: the client page, health checks, and the WebSocket upgrade
/// on both `/` and `/ws`.
pub fn router(hub: HubHandle) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_endpoint))
        .route("/healthz", get(health_check))
        .route("/status", get(status))
        .with_state(AppState { hub })
}

pub async fn serve(listener: TcpListener, hub: HubHandle) -> std::io::Result<()> {
    axum::serve(listener, router(hub)).await
}

async fn index(ws: Option<WebSocketUpgrade>, State(state): State<AppState>) -> Response {
    match ws {
        Some(ws) => ws
            .on_upgrade(move |socket| handle_connection(socket, state.hub))
            .into_response(),
        None => Html(INDEX_HTML).into_response(),
    }
}

async fn ws_endpoint(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_connection(socket, state.hub))
}

async fn health_check() -> &'static str {
    "ok"
}

async fn status(State(state): State<AppState>) -> Response {
    match state.hub.status().await {
        Some(status) => Json(status).into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}

async fn handle_connection(socket: WebSocket, hub: HubHandle) {
    let client_id = Uuid::new_v4();
    let (mut ws_sender, mut ws_receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Outbound>();

    hub.open(client_id, tx);

    // Spawn task to send messages to client
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            let json = match serde_json::to_string(&msg) {
                Ok(j) => j,
                Err(e) => {
                    tracing::error!("Failed to serialize message: {}", e);
                    continue;
                }
            };

            if let Err(e) = ws_sender.send(AxumWsMessage::Text(json)).await {
                tracing::debug!("Failed to send message to {}: {}", client_id, e);
                break;
            }
        }
    });

    while let Some(msg) = ws_receiver.next().await {
        match msg {
            Ok(AxumWsMessage::Text(text)) => hub.inbound(client_id, text),
            Ok(AxumWsMessage::Binary(bytes)) => match String::from_utf8(bytes) {
                Ok(text) => hub.inbound(client_id, text),
                Err(_) => tracing::warn!("Dropping non UTF-8 frame from {}", client_id),
            },
            Ok(AxumWsMessage::Close(_)) => {
                tracing::debug!("Client {} closing connection", client_id);
                break;
            }
            Err(e) => {
                tracing::warn!("WebSocket error from {}: {}", client_id, e);
                break;
            }
            _ => {}
        }
    }

    hub.closed(client_id);
    send_task.abort();
}
