use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Websocket counters, exported at `/metrics/ws`.
#[derive(Default)]
pub struct WsMetrics {
    connections_accepted: AtomicU64,
    connections_closed: AtomicU64,
    mailbox_full: AtomicU64,
    send_errors: AtomicU64,
    send_timeouts: AtomicU64,
    keepalive_failures: AtomicU64,
    malformed_frames: AtomicU64,
    oversized_frames: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WsMetricsSnapshot {
    pub connections_accepted: u64,
    pub connections_closed: u64,
    pub connections_open: u64,
    pub mailbox_full: u64,
    pub send_errors: u64,
    pub send_timeouts: u64,
    pub keepalive_failures: u64,
    pub malformed_frames: u64,
    pub oversized_frames: u64,
}

impl WsMetrics {
    pub fn snapshot(&self) -> WsMetricsSnapshot {
        let accepted = self.connections_accepted.load(Ordering::Relaxed);
        let closed = self.connections_closed.load(Ordering::Relaxed);
        WsMetricsSnapshot {
            connections_accepted: accepted,
            connections_closed: closed,
            connections_open: accepted.saturating_sub(closed),
            mailbox_full: self.mailbox_full.load(Ordering::Relaxed),
            send_errors: self.send_errors.load(Ordering::Relaxed),
            send_timeouts: self.send_timeouts.load(Ordering::Relaxed),
            keepalive_failures: self.keepalive_failures.load(Ordering::Relaxed),
            malformed_frames: self.malformed_frames.load(Ordering::Relaxed),
            oversized_frames: self.oversized_frames.load(Ordering::Relaxed),
        }
    }

    pub fn inc_connection_accepted(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_connection_closed(&self) {
        self.connections_closed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_mailbox_full(&self) {
        self.mailbox_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_send_error(&self) {
        self.send_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_send_timeout(&self) {
        self.send_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_keepalive_failure(&self) {
        self.keepalive_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_malformed_frame(&self) {
        self.malformed_frames.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_oversized_frame(&self) {
        self.oversized_frames.fetch_add(1, Ordering::Relaxed);
    }
}
