//! # Server Module
//!
//! HTTP and WebSocket front end built on `axum`.
//!
//! | Route | Handler |
//! |-------|---------|
//! | `GET /` | `<static_dir>/index.html` |
//! | `GET /static/*` | files under `<static_dir>` |
//! | `GET /ws/joystick` | WebSocket upgrade, one [`run_session`] per connection |

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::time::timeout;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use crate::config::ServerConfig;
use crate::error::{JoydriveError, Result};
use crate::session::socket::{ClientSocket, Inbound};
use crate::session::{run_session, SharedController, SEND_TIMEOUT};

/// WebSocket endpoint for joystick clients.
pub const JOYSTICK_PATH: &str = "/ws/joystick";

/// State shared by all request handlers.
#[derive(Clone)]
pub struct AppState {
    controller: SharedController,
    log_queue_capacity: usize,
    next_session_id: Arc<AtomicU64>,
    shutdown: watch::Receiver<bool>,
}

impl AppState {
    #[must_use]
    pub fn new(
        controller: SharedController,
        log_queue_capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            controller,
            log_queue_capacity,
            next_session_id: Arc::new(AtomicU64::new(1)),
            shutdown,
        }
    }
}

/// `axum` WebSocket adapted to [`ClientSocket`].
pub struct AxumSocket {
    socket: WebSocket,
}

impl AxumSocket {
    pub fn new(socket: WebSocket) -> Self {
        Self { socket }
    }
}

#[async_trait]
impl ClientSocket for AxumSocket {
    async fn recv(&mut self) -> Inbound {
        match self.socket.recv().await {
            Some(Ok(Message::Text(text))) => Inbound::Text(text),
            Some(Ok(Message::Close(_))) | None => Inbound::Closed,
            Some(Ok(_)) => Inbound::Other,
            Some(Err(e)) => Inbound::Error(e.to_string()),
        }
    }

    async fn send_text(&mut self, text: String) -> bool {
        self.socket.send(Message::Text(text)).await.is_ok()
    }
}

/// Builds the application router.
pub fn router(state: AppState, static_dir: &str) -> Router {
    let static_dir = PathBuf::from(static_dir);

    Router::new()
        .route(JOYSTICK_PATH, get(joystick_ws))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn joystick_ws(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = state.next_session_id.fetch_add(1, Ordering::Relaxed);
    info!("WebSocket client connected (session {})", id);

    let mut socket = AxumSocket::new(socket);
    if let Err(e) = run_session(
        &mut socket,
        &state.controller,
        id,
        state.log_queue_capacity,
        state.shutdown.clone(),
    )
    .await
    {
        debug!("Session {} ended with error: {}", id, e);
    }

    // Fails harmlessly if the client already hung up or stopped reading
    let _ = timeout(SEND_TIMEOUT, socket.socket.send(Message::Close(None))).await;
}

/// Binds the configured address.
///
/// # Errors
///
/// Returns `Server` if the address is invalid or already in use.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener> {
    let addr = format!("{}:{}", config.bind_address, config.port);
    TcpListener::bind(&addr)
        .await
        .map_err(|e| JoydriveError::Server(format!("Failed to bind {}: {}", addr, e)))
}

/// Serves `app` until `shutdown` completes.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!("Listening on http://{} (joystick at ws://{}{})", addr, addr, JOYSTICK_PATH);
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| JoydriveError::Server(e.to_string()))
}
