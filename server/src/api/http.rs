use axum::{
    extract::State as AxumState,
    response::{IntoResponse, Json, Response},
};
use serde::Serialize;
use std::sync::Arc;

use crate::metrics::WsMetricsSnapshot;
use crate::Server;

#[derive(Serialize)]
struct HealthzResponse {
    ok: bool,
}

#[derive(Serialize)]
struct WsMetricsResponse {
    #[serde(flatten)]
    counters: WsMetricsSnapshot,
    registered: usize,
    tables_open: usize,
}

pub(super) async fn healthz() -> Response {
    Json(HealthzResponse { ok: true }).into_response()
}

pub(super) async fn ws_metrics(AxumState(server): AxumState<Arc<Server>>) -> Response {
    Json(WsMetricsResponse {
        counters: server.metrics.snapshot(),
        registered: server.registry.connection_count(),
        tables_open: server.tables.len(),
    })
    .into_response()
}
