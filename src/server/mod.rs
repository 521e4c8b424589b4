//! HTTP server for the auto-merge bot.
//!
//! # Endpoints
//!
//! - `POST /webhook` - Accepts GitHub webhook deliveries and queues the pull
//!   requests they refer to (202 Accepted)
//! - `GET /api/v1/queues` - Every repository queue as JSON
//! - `GET /api/v1/repos/{owner}/{repo}/queue` - One repository queue as JSON
//! - `GET /health` - Returns 200 if server is running

use std::sync::Arc;

pub mod config;
pub mod health;
pub mod queues;
pub mod webhook;

pub use config::{ServerConfig, ServerConfigError};
pub use health::health_handler;
pub use queues::{queues_handler, repo_queue_handler};
pub use webhook::webhook_handler;

use crate::webhooks::{OwnChecks, WebhookSecret};
use crate::worker::Engine;

/// Shared application state, passed to handlers via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    engine: Engine,
    webhook_secret: WebhookSecret,
    own_checks: OwnChecks,
}

impl AppState {
    pub fn new(engine: Engine, webhook_secret: WebhookSecret) -> Self {
        Self::with_own_checks(engine, webhook_secret, OwnChecks::default())
    }

    /// Like [`AppState::new`], ignoring check events that match `own_checks`.
    pub fn with_own_checks(
        engine: Engine,
        webhook_secret: WebhookSecret,
        own_checks: OwnChecks,
    ) -> Self {
        AppState {
            inner: Arc::new(AppStateInner {
                engine,
                webhook_secret,
                own_checks,
            }),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.inner.engine
    }

    pub fn webhook_secret(&self) -> &WebhookSecret {
        &self.inner.webhook_secret
    }

    pub fn own_checks(&self) -> &OwnChecks {
        &self.inner.own_checks
    }
}

/// Builds the axum Router with all endpoints.
pub fn build_router(app_state: AppState) -> axum::Router {
    use axum::routing::{get, post};

    axum::Router::new()
        .route("/webhook", post(webhook_handler))
        .route("/api/v1/queues", get(queues_handler))
        .route("/api/v1/repos/{owner}/{repo}/queue", get(repo_queue_handler))
        .route("/health", get(health_handler))
        .with_state(app_state)
}
