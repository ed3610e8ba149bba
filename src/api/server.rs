//! Axum server setup and configuration

use crate::api::routes;
use crate::session::SessionRegistry;
use axum::{
    http::{header, Method},
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub registry: SessionRegistry,
}

impl AppState {
    pub fn new(registry: SessionRegistry) -> Self {
        Self { registry }
    }
}

/// Create the Axum application with all routes
pub fn create_app(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    // API routes
    let api_routes = Router::new()
        .route("/settings", get(routes::settings::get_settings))
        .route("/sessions", get(routes::sessions::list_sessions))
        .route("/sessions/:identity", delete(routes::sessions::delete_session))
        .route("/sessions/:identity/stats", get(routes::sessions::get_stats))
        .route(
            "/sessions/:identity/private_key",
            post(routes::sessions::set_private_key),
        )
        .route("/sessions/:identity/start", post(routes::sessions::start_session))
        .route("/sessions/:identity/stop", post(routes::sessions::stop_session))
        .route(
            "/sessions/:identity/reset_stats",
            post(routes::sessions::reset_stats),
        )
        .route(
            "/sessions/:identity/refresh_balances",
            post(routes::sessions::refresh_balances),
        );

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
