//! Mail assistant backend: IMAP inbox browsing, owner-scoped todos and
//! LLM-backed task extraction behind a bearer-authenticated JSON API.

use std::sync::Arc;

use axum::{
    http::{header, Method},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod llm;
pub mod mail;
pub mod models;
pub mod routes;
pub mod schema;
pub mod store;
pub mod vault;

use auth::TokenVerifier;
use llm::{ChatStreamer, TaskExtractor};
use mail::MailFetcher;
use store::{AccountStore, TodoStore};

/// Everything a handler needs, behind trait objects so tests can swap in
/// in-memory stores and canned mail/LLM backends.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<dyn AccountStore>,
    pub todos: Arc<dyn TodoStore>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub mail: Arc<dyn MailFetcher>,
    pub tasks: Arc<dyn TaskExtractor>,
    pub chat: Arc<dyn ChatStreamer>,
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    routes::api_routes(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}

/// Build CORS layer from a comma-separated origin list.
///
/// Without a usable list, falls back to permissive CORS (for development only).
pub fn build_cors_layer(allowed_origins: Option<&str>) -> CorsLayer {
    let origins: Vec<_> = allowed_origins
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        tracing::warn!(
            "CORS_ALLOWED_ORIGINS not set or empty, using permissive CORS (not recommended for production)"
        );
        return CorsLayer::permissive();
    }

    tracing::info!("CORS configured for origins: {:?}", origins);
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true)
}
