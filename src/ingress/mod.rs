//! HTTP surface: Alertmanager webhook and action button callbacks.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};

use crate::config::ConfigHandle;
use crate::engine::LifecycleEngine;

mod action;
mod error;
mod webhook;

pub use error::ApiError;

#[derive(Clone)]
pub struct ApiState {
    pub config: Arc<ConfigHandle>,
    pub engine: Arc<LifecycleEngine>,
}

/// Build the router. The action route is fixed at startup; a configuration
/// reload does not move it.
pub fn router(state: ApiState) -> Router {
    let action_path = state.config.load().server.action_path.clone();
    Router::new()
        .route("/", get(banner))
        .route("/health", get(health))
        .route("/api/webhook", post(webhook::receive))
        .route(&action_path, post(action::receive))
        .with_state(state)
}

async fn banner() -> &'static str {
    concat!("alertbridge ", env!("CARGO_PKG_VERSION"))
}

async fn health() -> &'static str {
    "ok"
}
