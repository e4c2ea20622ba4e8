use axum::{
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocket, WebSocketUpgrade},
        State as AxumState,
    },
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
};
use futures::StreamExt;
use std::sync::Arc;

use crate::client::{read_pump, write_pump, Client, PumpSettings};
use crate::Server;

/// Checks the upgrade headers. Values are compared case-insensitively and
/// `Connection` may list other tokens alongside `Upgrade`.
fn check_handshake(headers: &HeaderMap) -> Result<(), &'static str> {
    let value = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .unwrap_or_default()
    };
    if !value(header::CONNECTION)
        .split(',')
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    {
        return Err("Connection header must include Upgrade");
    }
    if !value(header::UPGRADE).eq_ignore_ascii_case("websocket") {
        return Err("Upgrade header must be websocket");
    }
    if value(header::SEC_WEBSOCKET_VERSION).is_empty() {
        return Err("missing Sec-WebSocket-Version");
    }
    if value(header::SEC_WEBSOCKET_KEY).is_empty() {
        return Err("missing Sec-WebSocket-Key");
    }
    Ok(())
}

pub(super) async fn connect(
    AxumState(server): AxumState<Arc<Server>>,
    method: Method,
    headers: HeaderMap,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    if method != Method::GET {
        return (StatusCode::METHOD_NOT_ALLOWED, "Method not allowed").into_response();
    }
    if let Err(reason) = check_handshake(&headers) {
        tracing::debug!(reason, "websocket handshake rejected");
        return (StatusCode::BAD_REQUEST, reason).into_response();
    }
    let upgrade = match upgrade {
        Ok(upgrade) => upgrade,
        Err(rejection) => return rejection.into_response(),
    };

    // Protocol backstop only; the read pump enforces and counts the real limit.
    let backstop = server.config.max_frame_bytes.saturating_mul(2);
    upgrade
        .max_message_size(backstop)
        .max_frame_size(backstop)
        .on_upgrade(move |socket| handle_socket(socket, server))
        .into_response()
}

async fn handle_socket(socket: WebSocket, server: Arc<Server>) {
    let (sink, stream) = socket.split();
    let (client, outbox) = Client::new(None, server.config.mailbox_capacity());
    let client_id = client.id().to_string();
    if let Err(err) = server.registry.add_client(client) {
        tracing::warn!(client_id, %err, "rejecting connection");
        return;
    }
    server.metrics.inc_connection_accepted();

    let settings = PumpSettings::from(&server.config);
    let writer_server = server.clone();
    let mut writer = tokio::spawn(async move {
        write_pump(sink, outbox, settings, &writer_server.metrics).await;
    });
    server.dispatcher.welcome(&client_id);

    let exit = tokio::select! {
        exit = read_pump(stream, &client_id, settings, server.dispatcher.as_ref(), &server.metrics) => Some(exit),
        _ = &mut writer => None,
    };

    if let Err(err) = server.registry.remove_connection(&client_id) {
        tracing::debug!(client_id, %err, "connection already removed");
    }
    server.dispatcher.disconnect(&client_id);
    if exit.is_some() {
        if let Err(err) = writer.await {
            tracing::warn!(client_id, %err, "write pump panicked");
        }
    }
    server.metrics.inc_connection_closed();
    tracing::info!(client_id, ?exit, "connection closed");
}
