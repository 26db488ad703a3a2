//! HTTP and WebSocket transport
//!
//! Each WebSocket connection hosts one [`Session`]. The socket is adapted onto
//! the session's client channel: inbound text frames are queued for the
//! session, and the session's frames are written back as text.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::{Json, Response};
use axum::routing::{get, post};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use runbridge::{AnalyzeRequest, AnalyzeResponse, Analyzer, Runner, Session};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Shared state for all connections
#[derive(Debug, Clone)]
pub struct AppState {
    pub runner: Runner,
    pub analyzer: Analyzer,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Build the router with all routes and middleware
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/ws", get(ws_handler))
        .route("/analyze", post(analyze))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

/// Listen on `addr` until interrupted
pub async fn serve(addr: SocketAddr, state: AppState) -> Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutting down");
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Json<AnalyzeResponse> {
    Json(state.analyzer.suggest(&request).await)
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.runner))
}

async fn handle_socket(socket: WebSocket, runner: Runner) {
    let (channel, end) = runner.channel();
    let session = Session::new(runner, channel);
    let session_id = session.id();
    debug!(session = %session_id, "connection opened");

    let (mut sink, stream) = socket.split();
    let inbound = tokio::spawn(forward_inbound(stream, end.to_session));

    let (result, ()) = tokio::join!(
        session.run(),
        forward_outbound(&mut sink, end.from_session)
    );
    inbound.abort();

    if let Err(e) = result {
        debug!(session = %session_id, error = %e, "session ended with error");
    }
    // The peer may already be gone
    let _ = sink.send(Message::Close(None)).await;
    debug!(session = %session_id, "connection closed");
}

/// Queue client messages for the session until the socket closes
///
/// Dropping the sender is how the session learns the client has gone.
async fn forward_inbound(mut stream: SplitStream<WebSocket>, to_session: mpsc::Sender<String>) {
    while let Some(message) = stream.next().await {
        let text = match message {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Binary(bytes)) => match String::from_utf8(bytes.to_vec()) {
                Ok(text) => text,
                Err(_) => continue,
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "websocket read failed");
                break;
            }
        };
        if to_session.send(text).await.is_err() {
            break;
        }
    }
}

/// Write session frames to the socket until the session finishes
async fn forward_outbound(
    sink: &mut SplitSink<WebSocket, Message>,
    mut from_session: mpsc::Receiver<String>,
) {
    while let Some(frame) = from_session.recv().await {
        if let Err(e) = sink.send(Message::Text(frame.into())).await {
            debug!(error = %e, "websocket write failed");
            break;
        }
    }
}
