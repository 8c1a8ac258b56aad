//! Route definitions for the driver intake API.

pub mod admin;
pub mod applications;
pub mod auth;
pub mod health;
pub mod signatures;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer, cors::CorsLayer, limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

use crate::errors::route_not_found;
use crate::AppState;

/// Upper bound on request bodies; signature payloads carry inline image data.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Build the full API router with middleware layers applied.
pub fn router(state: AppState) -> Router {
    let cors = cors_layer(&state.config.frontend_url);

    let admin = Router::new()
        .route("/applications", get(admin::list_applications))
        .route("/applications/{id}", get(admin::get_application))
        .route("/applications/{id}/status", put(admin::update_status))
        .route("/applications/{id}/notes", put(admin::add_notes))
        .route("/stats", get(admin::stats))
        .route("/users", get(admin::list_users));

    let api = Router::new()
        .route("/health", get(health::health))
        .route("/auth/login", post(auth::login))
        .route("/auth/me", get(auth::me))
        .route("/applications", post(applications::submit))
        .route("/applications/status/{id}", get(applications::status))
        .route("/signatures", post(signatures::record))
        .nest("/admin", admin);

    Router::new()
        .nest("/api", api)
        .fallback(route_not_found)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(cors),
        )
        .with_state(state)
}

fn cors_layer(frontend_url: &str) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    match frontend_url.parse::<HeaderValue>() {
        Ok(origin) => base.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::warn!(frontend_url, error = %e, "Invalid FRONTEND_URL, CORS origin not set");
            base
        }
    }
}
