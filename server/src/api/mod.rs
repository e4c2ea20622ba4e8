use axum::{
    routing::{any, get},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::Server;

mod http;
mod ws;

pub struct Api {
    server: Arc<Server>,
}

impl Api {
    pub fn new(server: Arc<Server>) -> Self {
        Self { server }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/ws", any(ws::connect))
            .route("/healthz", get(http::healthz))
            .route("/metrics/ws", get(http::ws_metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.server.clone())
    }
}
