//! Tether Server - reference user service for the Tether engine.
//!
//! Serves an in-memory, ordered user collection over JSON/HTTP with a
//! simulated network delay, so the engine's optimistic flows can be
//! exercised end to end without a real backend.

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod store;

use crate::config::Config;
use crate::store::{seed_users, UserStore};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<UserStore>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Build the state described by `config`, seeding the store if asked.
    pub fn new(config: Config) -> Self {
        let users = if config.seed_users {
            seed_users()
        } else {
            Vec::new()
        };
        let store = UserStore::new(users, config.latency, config.bulk_latency());
        Self {
            store: Arc::new(store),
            config: Arc::new(config),
        }
    }
}

/// Build the application router.
pub fn app(state: AppState) -> Router {
    Router::new()
        .merge(routes::create_routes())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
