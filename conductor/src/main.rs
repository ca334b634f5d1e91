#![cfg_attr(test, allow(clippy::disallowed_methods))]
// Forbid unwrap() in production code to prevent panics from corrupt data.
// Test code is allowed to use unwrap() for convenience.
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, RawQuery, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::StatusCode,
    response::IntoResponse,
    routing::{any, get},
};
use conductor::{
    ConductorService, ServiceError,
    config::ConductorConfig,
    object::{DomainObject, FileObjectStore},
    time::{Clock, ConductorSnapshot, LocalClock, TimeBounds, TimeConductor, TimeSystem},
};
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Clone)]
struct AppState {
    service: Arc<ConductorService>,
}

type HandlerError = (StatusCode, String);

#[tokio::main]
#[allow(clippy::disallowed_methods)] // Arc::clone of the clock
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "conductor=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment variables
    let config = match ConductorConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        "Loaded configuration: object_directory={}, listen_port={}, tick_interval={:?}",
        config.object_directory.display(),
        config.listen_port,
        config.tick_interval
    );

    let store = match FileObjectStore::open(&config.object_directory).await {
        Ok(store) => store,
        Err(e) => {
            tracing::error!("Failed to open object store: {e}");
            std::process::exit(1);
        }
    };
    tracing::info!("Object store at {}", store.path().display());

    // Start the wall clock and follow it with the configured offsets.
    let clock = Arc::new(LocalClock::new(config.tick_interval));
    let _ticker = LocalClock::start(&clock);
    let now = clock.current_value();
    let conductor =
        match TimeConductor::new(TimeSystem::utc(), TimeBounds::around(now, config.offsets)) {
            Ok(conductor) => conductor,
            Err(e) => {
                tracing::error!("Failed to create time conductor: {e}");
                std::process::exit(1);
            }
        };
    let followed = Arc::clone(&clock) as Arc<dyn Clock>;
    if let Err(e) = conductor.set_clock(followed, Some(config.offsets)) {
        tracing::error!("Failed to follow local clock: {e}");
        std::process::exit(1);
    }

    let state = AppState {
        service: Arc::new(ConductorService::new(conductor, Arc::new(store))),
    };

    let app = Router::new()
        .route("/time", get(get_time).post(post_time))
        .route("/time/url", get(get_time_url))
        .route(
            "/objects/{key}",
            get(get_object).put(put_object).delete(delete_object),
        )
        .route("/ws", any(ws_handler))
        .with_state(state);

    let addr = SocketAddr::from(([127, 0, 0, 1], config.listen_port));
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .unwrap_or_else(|e| {
            tracing::error!("Failed to bind: {e}");
            std::process::exit(1);
        });

    axum::serve(listener, app).await.unwrap_or_else(|e| {
        tracing::error!("Server error: {e}");
        std::process::exit(1);
    });
}

fn error_response(error: &ServiceError) -> HandlerError {
    let status = if error.is_client_error() {
        StatusCode::BAD_REQUEST
    } else {
        tracing::error!("request failed: {error}");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, error.to_string())
}

async fn get_time(State(state): State<AppState>) -> Json<ConductorSnapshot> {
    Json(state.service.snapshot())
}

async fn get_time_url(State(state): State<AppState>) -> Result<String, HandlerError> {
    state.service.url_query().map_err(|e| error_response(&e))
}

async fn post_time(
    State(state): State<AppState>,
    RawQuery(query): RawQuery,
) -> Result<Json<ConductorSnapshot>, HandlerError> {
    state
        .service
        .apply_query(query.as_deref().unwrap_or_default())
        .map(Json)
        .map_err(|e| error_response(&e))
}

async fn get_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DomainObject>, HandlerError> {
    match state.service.get_object(&key).await {
        Ok(Some(object)) => Ok(Json(object)),
        Ok(None) => Err((StatusCode::NOT_FOUND, format!("object {key} not found"))),
        Err(e) => Err(error_response(&e)),
    }
}

async fn put_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(model): Json<serde_json::Value>,
) -> Result<Json<DomainObject>, HandlerError> {
    state
        .service
        .update_object(&key, model)
        .await
        .map(Json)
        .map_err(|e| error_response(&e))
}

async fn delete_object(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<StatusCode, HandlerError> {
    state
        .service
        .delete_object(&key)
        .await
        .map(|()| StatusCode::NO_CONTENT)
        .map_err(|e| error_response(&e))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    tracing::debug!("got a websocket connection");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Stream conductor events to the client as JSON text frames until either
/// side closes.
async fn handle_socket(mut socket: WebSocket, state: AppState) {
    let mut events = state.service.subscribe();

    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            return;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        tracing::debug!("client disconnected");
                        return;
                    }
                    Some(Ok(_)) => {
                        tracing::debug!("ignoring client message on event stream");
                    }
                    Some(Err(e)) => {
                        tracing::warn!("websocket receive error: {e}");
                        return;
                    }
                }
            }

            event = events.recv() => {
                match event {
                    Ok(event) => {
                        let text = match ConductorService::encode_event(&event) {
                            Ok(text) => text,
                            Err(e) => {
                                tracing::error!("failed to encode event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(text.into())).await.is_err() {
                            tracing::debug!("client disconnected during event send");
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        tracing::warn!("event receiver lagged by {count} messages");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        tracing::debug!("event channel closed");
                        return;
                    }
                }
            }
        }
    }
}
