//! HTTP gateway for the scribe backend.
//!
//! Wires the OAuth session and the Drive-backed project repository behind
//! the routes the browser app calls:
//!
//! - `GET  /auth/google` — redirect to the provider consent page
//! - `GET  /auth/callback` — code exchange, redirect back to the frontend
//! - `GET  /auth/status` — authentication probe
//! - `POST /auth/logout` — credential revocation
//! - `POST /api/project/createHierarchy` — create a project
//! - `GET  /api/project/load` — download project content
//! - `POST /api/project/save` — overwrite project content
//! - `POST /api/project/delete` — delete a project
//! - `GET  /api/project/list` — list projects

pub mod config;
pub mod error;
pub mod handlers;

use std::sync::Arc;

use axum::Json;
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{Value, json};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use scribe_drive::{AuthSession, DriveError, DriveResult, ProjectRepository, TokenStore};

pub use config::ServerConfig;

/// Shared state handed to every handler.
pub struct AppState {
    /// The process-wide OAuth session.
    pub session: Arc<AuthSession>,
    /// The project repository over that session.
    pub repository: Arc<ProjectRepository>,
    /// Where the auth callback sends the browser afterwards.
    pub frontend_url: String,
}

/// Builds the gateway router with CORS and request tracing.
pub fn build_router(state: Arc<AppState>, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/auth/google", get(handlers::auth_google))
        .route("/auth/callback", get(handlers::auth_callback))
        .route("/auth/status", get(handlers::auth_status))
        .route("/auth/logout", post(handlers::auth_logout))
        .route("/api/project/createHierarchy", post(handlers::create_hierarchy))
        .route("/api/project/load", get(handlers::load_project))
        .route("/api/project/save", post(handlers::save_project))
        .route("/api/project/delete", post(handlers::delete_project))
        .route("/api/project/list", get(handlers::list_projects))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(allowed_origins))
        .with_state(state)
}

/// Builds the session, repository, and router from configuration, then
/// serves until the process is stopped.
pub async fn serve(config: ServerConfig) -> DriveResult<()> {
    let mut store = TokenStore::new(&config.token_path);
    if let Some(passphrase) = &config.token_passphrase {
        store = store.with_passphrase(passphrase);
    }

    let session = Arc::new(AuthSession::new(config.oauth.clone(), store)?);
    let repository = Arc::new(ProjectRepository::new(
        session.clone(),
        config.repository.clone(),
    ));
    let state = Arc::new(AppState {
        session,
        repository,
        frontend_url: config.frontend_url.clone(),
    });

    let app = build_router(state, &config.allowed_origins);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| DriveError::configuration(format!("failed to bind {}: {}", addr, e)))?;

    info!("scribe gateway listening on {}", addr);
    axum::serve(listener, app)
        .await
        .map_err(|e| DriveError::internal(format!("server error: {}", e)))
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring malformed CORS origin {:?}", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}

async fn health() -> Json<Value> {
    Json(json!({ "message": "scribe backend is running" }))
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    warn!("route not found: {}", uri);
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "route not found" })),
    )
}
