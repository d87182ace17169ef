use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderName, Method, StatusCode};
use axum::Router;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use easel_bridge::{Bridge, BridgeError};
use easel_gateway::{start_heartbeat, start_relay, AskRegistry, SessionManager};
use easel_server::config::ServerConfig;
use easel_server::resync::SchemaResync;
use easel_server::routes;
use easel_server::state::AppState;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "easel_server=debug,easel_bridge=debug,easel_gateway=debug,tower_http=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env();
    tracing::info!(
        host = %config.host,
        port = %config.port,
        backend = %config.backend_ws_url,
        "Loaded server configuration"
    );

    // --- CORS ---
    let cors = build_cors_layer(&config);

    // --- Backend bridge ---
    let resync = Arc::new(SchemaResync::new(config.backend_http_url.clone()));
    let bridge = Bridge::new(
        config.backend_ws_url.clone(),
        config.reconnect_config(),
        resync.clone(),
    );

    let store = bridge.store();
    let router = bridge.router();
    let preview = bridge.preview();
    let connection_log = bridge.log();
    let connection_state = bridge.connection_state();
    let bridge_events = bridge.subscribe();
    let bridge_cancel = bridge.cancel_token();

    // --- Consumer sessions ---
    let sessions = Arc::new(SessionManager::new());
    let asks = Arc::new(AskRegistry::new());

    // --- Heartbeat ---
    let heartbeat_handle = start_heartbeat(Arc::clone(&sessions));

    // --- Bridge-to-consumer relay ---
    let relay_cancel = CancellationToken::new();
    let relay_handle = start_relay(bridge_events, Arc::clone(&sessions), relay_cancel.clone());

    // Run the bridge. A protocol mismatch must take the process down,
    // not strand a connection that silently ignores events.
    let (fatal_tx, fatal_rx) = oneshot::channel();
    let bridge_handle = tokio::spawn(async move {
        if let Err(err) = bridge.run().await {
            let _ = fatal_tx.send(err);
        }
    });
    tracing::info!("Backend bridge started");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        store,
        router,
        preview,
        connection_log,
        connection_state,
        sessions: Arc::clone(&sessions),
        asks,
        resync,
    };

    // --- Request ID header name ---
    let request_id_header = HeaderName::from_static("x-request-id");

    // --- Router ---
    let app = Router::new()
        .merge(routes::app_routes())
        // -- Middleware stack (applied bottom-up) --
        // Panic recovery: catch panics and return 500.
        .layer(CatchPanicLayer::new())
        // Request timeout.
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.request_timeout_secs),
        ))
        // Propagate request ID to response.
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        // Structured request/response tracing.
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        // Set request ID on incoming requests.
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        // CORS.
        .layer(cors)
        // Shared state.
        .with_state(state);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    let fatal = Arc::new(AtomicBool::new(false));

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(fatal_rx, Arc::clone(&fatal)))
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the bridge first so no further events flow toward consumers.
    bridge_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), bridge_handle).await;
    tracing::info!("Backend bridge stopped");

    relay_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), relay_handle).await;
    tracing::info!("Consumer relay stopped");

    let consumer_count = sessions.session_count().await;
    tracing::info!(consumer_count, "Closing remaining consumer connections");
    sessions.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");

    if fatal.load(Ordering::SeqCst) {
        std::process::exit(1);
    }
}

/// Wait for a reason to initiate graceful shutdown.
///
/// Handles SIGINT (Ctrl-C) and SIGTERM so the server shuts down cleanly
/// whether stopped interactively or by a process manager, plus a fatal
/// bridge error. The `fatal` flag records the third case so the process
/// can exit non-zero after cleanup.
async fn shutdown_signal(fatal_rx: oneshot::Receiver<BridgeError>, fatal: Arc<AtomicBool>) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // Resolves only if the bridge reported an error; the sender dropped
    // on a clean exit parks this branch forever.
    let bridge_fatal = async {
        match fatal_rx.await {
            Ok(err) => err,
            Err(_) => std::future::pending::<BridgeError>().await,
        }
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
        err = bridge_fatal => {
            tracing::error!(error = %err, "Bridge aborted, starting shutdown");
            fatal.store(true, Ordering::SeqCst);
        }
    }
}

/// Build the CORS middleware layer from server configuration.
///
/// Panics at startup if any configured origin is invalid, which is the
/// desired behaviour -- we want misconfiguration to fail fast.
fn build_cors_layer(config: &ServerConfig) -> CorsLayer {
    let origins: Vec<_> = config
        .cors_origins
        .iter()
        .map(|o| {
            o.parse()
                .unwrap_or_else(|e| panic!("Invalid CORS origin '{o}': {e}"))
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600))
}
