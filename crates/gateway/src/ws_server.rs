//! HTTP and WebSocket server using Axum.
//!
//! Routes:
//! - GET /ws - WebSocket subscriptions
//! - GET /api/{view}?gameId= - Current summary of a view
//! - GET /health - Health check

use crate::client::{ClientRegistry, ClientState, CLIENT_CHANNEL_BUFFER_SIZE};
use crate::error::Result;
use crate::protocol::ClientMessage;
use crate::router::UpdateRouter;
use axum::{
    extract::{
        ws::{Message, WebSocket},
        Path, Query, State, WebSocketUpgrade,
    },
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use futures::{SinkExt, StreamExt};
use metrics::{counter, gauge};
use scoreboard::ScoreboardHandler;
use serde::{Deserialize, Serialize};
use stats::{SummaryKey, ViewName};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::interval;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

/// Keepalive ping interval for client sockets.
pub const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Shared application state.
pub struct AppState {
    pub registry: Arc<ClientRegistry>,
    pub router: Arc<UpdateRouter>,
    pub upstream: Arc<ScoreboardHandler>,
}

/// Query parameters for view endpoints.
#[derive(Debug, Deserialize)]
pub struct ViewQuery {
    #[serde(rename = "gameId")]
    pub game_id: Option<String>,
}

/// Create the HTTP router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health_handler))
        .route("/api/{view}", get(view_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct HealthResponse {
    status: &'static str,
    clients: usize,
    subscriptions: usize,
    upstream_open: bool,
    snapshot_keys: usize,
}

/// Health check endpoint.
/// GET /health
async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        clients: state.registry.client_count(),
        subscriptions: state.registry.subscription_count(),
        upstream_open: state.upstream.is_open(),
        snapshot_keys: state.upstream.snapshot_len(),
    })
}

/// Current summary of a view.
/// GET /api/{view}?gameId={game_id}
async fn view_handler(
    State(state): State<Arc<AppState>>,
    Path(view): Path<String>,
    Query(query): Query<ViewQuery>,
) -> std::result::Result<impl IntoResponse, ApiError> {
    let view: ViewName = view
        .parse()
        .map_err(|e: stats::UnknownView| ApiError::NotFound(e.to_string()))?;
    let key = SummaryKey::for_request(view, query.game_id.as_deref());

    match state.router.engine().current(&key) {
        Some(summary) => Ok(Json(summary)),
        None => Err(ApiError::NotFound(format!("View '{}' is not published", view))),
    }
}

/// WebSocket upgrade handler.
async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // Bounded so a slow client only loses its own pushes
    let (tx, mut rx) = mpsc::channel::<Message>(CLIENT_CHANNEL_BUFFER_SIZE);

    let client = Arc::new(ClientState::new(tx));
    let client_id = state.registry.register(client.clone());

    counter!("gateway_connections_total").increment(1);
    gauge!("gateway_active_connections").set(state.registry.client_count() as f64);

    info!("Client {} connected", client_id);

    // Forward queued frames to the socket
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if ws_tx.send(msg).await.is_err() {
                break;
            }
        }
    });

    let mut ping_interval = interval(PING_INTERVAL);
    ping_interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            biased;

            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(msg)) => {
                        if let Err(e) = handle_message(&state, &client, msg) {
                            warn!("Error handling message from {}: {:?}", client_id, e);
                        }
                    }
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {:?}", client_id, e);
                        break;
                    }
                }
            }

            _ = ping_interval.tick() => {
                // Closed, or reaped as stale
                if client.tx.is_closed() || state.registry.get(&client_id).is_none() {
                    break;
                }
                if !client.try_send_raw(Message::Ping(vec![].into())) {
                    debug!("Client {} buffer full, skipping ping", client_id);
                }
            }
        }
    }

    state.registry.unregister(&client_id);
    send_task.abort();

    counter!("gateway_disconnections_total").increment(1);
    gauge!("gateway_active_connections").set(state.registry.client_count() as f64);

    info!("Client {} disconnected", client_id);
}

/// Handle a single WebSocket frame. Malformed input is logged and ignored.
fn handle_message(state: &AppState, client: &ClientState, msg: Message) -> Result<()> {
    let parsed = match &msg {
        Message::Text(text) => serde_json::from_str::<ClientMessage>(text.as_str()),
        Message::Binary(data) => serde_json::from_slice::<ClientMessage>(data),
        Message::Ping(data) => {
            client.update_ping();
            client.try_send_raw(Message::Pong(data.clone()));
            return Ok(());
        }
        Message::Pong(_) => {
            client.update_ping();
            return Ok(());
        }
        Message::Close(_) => return Ok(()),
    };

    match parsed {
        Ok(client_msg) => handle_client_message(state, client, client_msg),
        Err(e) => {
            warn!("Ignoring malformed message from {}: {}", client.id, e);
            counter!("gateway_malformed_messages_total").increment(1);
            Ok(())
        }
    }
}

/// Handle a parsed client message.
fn handle_client_message(state: &AppState, client: &ClientState, msg: ClientMessage) -> Result<()> {
    match msg {
        ClientMessage::Subscribe { data_type, game_id } => {
            debug!("Client {} subscribing to {} ({:?})", client.id, data_type, game_id);
            state.router.subscribe(client, &data_type, game_id.as_deref())
        }
        ClientMessage::Unsubscribe { data_type, game_id } => {
            debug!("Client {} unsubscribing from {} ({:?})", client.id, data_type, game_id);
            state.router.unsubscribe(client, &data_type, game_id.as_deref())
        }
    }
}

// ============================================================================
// Error Handling
// ============================================================================

/// API error types.
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use scoreboard::ScoreboardConnector;
    use stats::StatsEngine;

    fn make_state() -> (Arc<AppState>, Arc<ClientState>, mpsc::Receiver<Message>) {
        let engine = StatsEngine::with_default_derivers().unwrap();
        let mut connector = ScoreboardConnector::new("localhost:8000");
        let (updates, _) = mpsc::unbounded_channel();
        engine.install(&mut connector, updates).unwrap();

        let registry = Arc::new(ClientRegistry::new());
        let router = Arc::new(UpdateRouter::new(registry.clone(), Arc::new(engine)));
        let state = Arc::new(AppState {
            registry: registry.clone(),
            router,
            upstream: Arc::new(ScoreboardHandler::new(connector)),
        });

        let (tx, rx) = mpsc::channel(8);
        let client = Arc::new(ClientState::new(tx));
        registry.register(client.clone());
        (state, client, rx)
    }

    #[test]
    fn test_malformed_message_keeps_connection() {
        let (state, client, mut rx) = make_state();

        handle_message(&state, &client, Message::Text("not json".into())).unwrap();
        handle_message(&state, &client, Message::Text(r#"{"messageType":"Dance"}"#.into())).unwrap();
        assert!(rx.try_recv().is_err());
        assert_eq!(state.registry.client_count(), 1);
    }

    #[test]
    fn test_subscribe_frame_answers_with_summary() {
        let (state, client, mut rx) = make_state();

        let frame = r#"{"messageType":"Subscribe","dataType":"PenaltiesByType","gameId":"*"}"#;
        handle_message(&state, &client, Message::Text(frame.into())).unwrap();

        let Message::Text(text) = rx.try_recv().unwrap() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["dataType"], "PenaltiesByType");
        assert_eq!(value["body"]["penaltyCountsByTypeByTeam"]["1"]["X"], 0);
        assert_eq!(state.registry.subscription_count(), 1);
    }

    #[test]
    fn test_subscribe_to_rosters() {
        let (state, client, mut rx) = make_state();

        let frame = r#"{"messageType":"Subscribe","dataType":"Rosters"}"#;
        handle_message(&state, &client, Message::Text(frame.into())).unwrap();

        let Message::Text(text) = rx.try_recv().unwrap() else {
            panic!("expected text frame");
        };
        let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
        assert_eq!(value["dataType"], "Rosters");
        assert_eq!(value["body"]["homeTeam"]["skaters"], serde_json::json!([]));
    }

    #[test]
    fn test_ping_frame_is_answered() {
        let (state, client, mut rx) = make_state();
        handle_message(&state, &client, Message::Ping(vec![1, 2].into())).unwrap();
        assert_eq!(rx.try_recv().unwrap(), Message::Pong(vec![1, 2].into()));
    }
}
