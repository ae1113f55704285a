use axum::{
    routing::{get, post},
    Extension, Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::config::Config;
use crate::handlers::{get_progress, health_check, upload_file};
use crate::middleware::{add_security_headers, authenticate};
use crate::state::AppState;
use crate::tracker::track_upload_progress;
use crate::utils::shutdown_signal;

/// build the service router. authentication runs outermost so the upload
/// tracker always sees a resolved identity.
pub fn build_router(state: Arc<AppState>, config: &Config) -> Router {
    tracing::debug!("Building router for files dir: {:?}", state.files_dir);

    // configure cors
    let cors = CorsLayer::new()
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_origin(tower_http::cors::Any) // For development, should be stricter in prod
        .allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/upload", post(upload_file))
        .route("/progress", get(get_progress))
        .route("/health", get(health_check))
        .layer(axum::middleware::from_fn(add_security_headers))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            track_upload_progress,
        ))
        .layer(axum::middleware::from_fn(authenticate))
        .layer(Extension(config.users.clone()))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// start the server with graceful shutdown
pub async fn start_server(app: Router, addr: SocketAddr) {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind server");

    tracing::debug!("Listener bound to {}", addr);

    let server = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .tcp_nodelay(true);

    tracing::info!("Server running and ready to accept connections");
    if let Err(e) = server.await {
        tracing::error!("Server error: {}", e);
    }
}

/// print startup banner with server info
pub fn print_startup_banner(config: &Config) {
    tracing::info!("Upload-pulse starting...");
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    tracing::info!("📡 API SERVER: http://{}:{}", config.host, config.port);
    tracing::info!(
        "📁 Storing uploads in: {:?}",
        config.files_dir.canonicalize().unwrap_or(config.files_dir.clone())
    );
    tracing::info!("👤 {} configured user(s)", config.users.len());
    tracing::info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
}
