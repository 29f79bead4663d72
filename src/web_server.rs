use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Request, State,
    },
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    serve, Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use minijinja::{path_loader, Environment};
use minijinja_autoreload::AutoReloader;
use serde::Deserialize;
use std::{convert::Infallible, net::SocketAddr, path::PathBuf, sync::Arc};
use tokio::sync::broadcast::error::RecvError;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::app_state::{ChatSnapshot, SubmitError};
use crate::constants::{EMPTY_TRANSCRIPT_MESSAGE, INPUT_PLACEHOLDER, LOADING_MESSAGE};
use crate::events::ClientMessage;
use crate::session::{SessionError, SessionHandle};

/// Where the web front end finds its files on disk.
#[derive(Debug, Clone)]
pub struct WebAssets {
    pub templates_dir: PathBuf,
    pub static_dir: PathBuf,
}

impl Default for WebAssets {
    fn default() -> Self {
        Self {
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
        }
    }
}

// Shared application state
#[derive(Clone)]
struct AppState {
    templates: Arc<AutoReloader>,
    session: SessionHandle,
}

#[derive(Debug, Deserialize)]
struct AskBody {
    question: String,
}

// Minijinja Environment setup
fn create_minijinja_env(templates_dir: PathBuf) -> AutoReloader {
    AutoReloader::new(move |notifier| {
        let mut env = Environment::new();
        env.set_loader(path_loader(&templates_dir));
        // Watch the templates directory for changes
        notifier.watch_path(&templates_dir, true);
        Ok(env)
    })
}

fn render_index(
    templates: &AutoReloader,
    snapshot: ChatSnapshot,
) -> Result<String, minijinja::Error> {
    let env = templates.acquire_env()?;
    let tmpl = env.get_template("index.html")?;
    tmpl.render(minijinja::context! {
        title => "GravidAI",
        exchanges => snapshot.exchanges,
        loading => snapshot.loading,
        countdown => snapshot.countdown,
        error => snapshot.error,
        empty_message => EMPTY_TRANSCRIPT_MESSAGE,
        loading_message => LOADING_MESSAGE,
        placeholder => INPUT_PLACEHOLDER,
    })
}

async fn index_handler(State(state): State<AppState>) -> Response {
    let snapshot = match state.session.snapshot().await {
        Ok(snapshot) => snapshot,
        Err(e) => return session_unavailable(e),
    };

    match render_index(&state.templates, snapshot) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!("Failed to get or render template: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Html(format!("Internal Server Error: {}", e)),
            )
                .into_response()
        }
    }
}

async fn transcript_handler(State(state): State<AppState>) -> Response {
    match state.session.snapshot().await {
        Ok(snapshot) => Json(snapshot).into_response(),
        Err(e) => session_unavailable(e),
    }
}

async fn ask_handler(State(state): State<AppState>, Json(body): Json<AskBody>) -> Response {
    match state.session.ask(body.question).await {
        Ok(()) => match state.session.snapshot().await {
            Ok(snapshot) => (StatusCode::ACCEPTED, Json(snapshot)).into_response(),
            Err(e) => session_unavailable(e),
        },
        Err(SessionError::Rejected(reason)) => {
            let status = match reason {
                SubmitError::Blank => StatusCode::UNPROCESSABLE_ENTITY,
                SubmitError::Busy => StatusCode::CONFLICT,
            };
            (
                status,
                Json(serde_json::json!({ "error": reason, "message": reason.to_string() })),
            )
                .into_response()
        }
        Err(e) => session_unavailable(e),
    }
}

fn session_unavailable(e: SessionError) -> Response {
    error!("Chat session unavailable: {}", e);
    (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
}

// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    info!("WebSocket connection upgrade requested");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

// Forward chat events to one client and its questions to the session
async fn handle_socket(socket: WebSocket, state: AppState) {
    info!("New WebSocket connection established");
    let (mut sender, mut receiver) = socket.split();
    let mut events = state.session.subscribe();

    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "WebSocket client lagged behind chat events");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            warn!("WebSocket client disconnected or send error. Closing connection.");
                            break;
                        }
                    }
                    Err(e) => error!("Failed to serialize chat event: {}", e),
                }
            }

            message = receiver.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = handle_client_text(&state, &text).await {
                        if sender.send(Message::Text(reply)).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Binary(_))) => {
                    warn!("Received unexpected binary message from client")
                }
                Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
                Some(Ok(Message::Close(_))) => {
                    info!("Client requested WebSocket close");
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket receive error: {}", e);
                    break;
                }
                None => {
                    info!("WebSocket client disconnected");
                    break;
                }
            }
        }
    }
    info!("WebSocket connection closed");
}

// Rejections reach the client as broadcast events; only snapshots and
// malformed input get a direct reply.
async fn handle_client_text(state: &AppState, text: &str) -> Option<String> {
    let message = match serde_json::from_str::<ClientMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            warn!("Ignoring malformed client message: {}", e);
            let reply = serde_json::json!({ "type": "invalid", "message": e.to_string() });
            return Some(reply.to_string());
        }
    };

    match message {
        ClientMessage::Ask { question } => {
            if let Err(e) = state.session.ask(question).await {
                debug!("WebSocket question not submitted: {}", e);
            }
            None
        }
        ClientMessage::Snapshot => match state.session.snapshot().await {
            Ok(snapshot) => {
                Some(serde_json::json!({ "type": "snapshot", "state": snapshot }).to_string())
            }
            Err(e) => {
                error!("Snapshot for WebSocket client failed: {}", e);
                None
            }
        },
    }
}

/// Router for the local web front end, bound to a running session.
pub fn router(session: SessionHandle, assets: WebAssets) -> Router {
    let state = AppState {
        templates: Arc::new(create_minijinja_env(assets.templates_dir)),
        session,
    };

    // Serve static files from the configured directory
    let static_files_service =
        ServeDir::new(assets.static_dir).not_found_service(tower::service_fn(|_req: Request| async {
            Ok::<_, Infallible>((StatusCode::NOT_FOUND, "Not Found").into_response())
        }));

    Router::new()
        .route("/", get(index_handler))
        .route("/transcript", get(transcript_handler))
        .route("/ask", post(ask_handler))
        .route("/ws", get(ws_handler))
        .nest_service("/static", static_files_service)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

pub async fn start_web_server(port: u16, session: SessionHandle, assets: WebAssets) -> Result<()> {
    let app = router(session, assets);

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    info!("Web server listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context(format!("Failed to bind to address {}", addr))?;

    serve(listener, app.into_make_service())
        .await
        .context("Web server failed")?;

    Ok(())
}
