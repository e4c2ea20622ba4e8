//! Per-connection runtime.
//!
//! A [`Client`] is the registry-side handle: identity, a bounded mailbox and a
//! cancellation signal. The matching [`Outbox`] is consumed by
//! [`write_pump`], which drains the mailbox onto the socket; [`read_pump`]
//! decodes inbound frames and hands them to a [`FrameHandler`].
//!
//! Teardown always runs: read pump exits, the connection is deregistered
//! (which cancels), the write pump exits and closes the socket. Nothing else
//! closes the socket.

use axum::extract::ws::Message;
use coup_types::Envelope;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval_at, timeout, Instant};
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::metrics::WsMetrics;

/// Encoded envelope shared between every recipient of a broadcast.
pub type Frame = Arc<str>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeliveryError {
    Full,
    Closed,
}

/// Registry-side handle for one connection.
#[derive(Clone, Debug)]
pub struct Client {
    id: String,
    mailbox: mpsc::Sender<Frame>,
    cancel: Arc<watch::Sender<bool>>,
}

/// Pump-side halves of a [`Client`].
pub struct Outbox {
    mailbox: mpsc::Receiver<Frame>,
    cancelled: watch::Receiver<bool>,
}

impl Client {
    /// Creates a client, generating a UUID when `id` is absent or blank.
    pub fn new(id: Option<String>, capacity: usize) -> (Self, Outbox) {
        let id = id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| Uuid::new_v4().to_string());
        Self::with_id(id, capacity)
    }

    /// Creates a client with exactly `id`, even an empty one.
    pub fn with_id(id: impl Into<String>, capacity: usize) -> (Self, Outbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let client = Self {
            id: id.into(),
            mailbox: tx,
            cancel: Arc::new(cancel_tx),
        };
        let outbox = Outbox {
            mailbox: rx,
            cancelled: cancel_rx,
        };
        (client, outbox)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Non-blocking enqueue.
    pub fn try_deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        match self.mailbox.try_send(frame) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => Err(DeliveryError::Full),
            Err(mpsc::error::TrySendError::Closed(_)) => Err(DeliveryError::Closed),
        }
    }

    /// Signals the write pump to stop.
    pub fn cancel(&self) {
        self.cancel.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel.borrow()
    }
}

#[cfg(test)]
impl Outbox {
    pub(crate) fn mailbox_mut(&mut self) -> &mut mpsc::Receiver<Frame> {
        &mut self.mailbox
    }
}

/// Timing and size limits for one connection's pumps.
#[derive(Clone, Copy, Debug)]
pub struct PumpSettings {
    pub read_deadline: Duration,
    pub write_deadline: Duration,
    pub keepalive: Duration,
    pub max_frame_bytes: usize,
}

impl From<&ServerConfig> for PumpSettings {
    fn from(config: &ServerConfig) -> Self {
        Self {
            read_deadline: config.read_deadline(),
            write_deadline: config.write_deadline(),
            keepalive: config.keepalive_period(),
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// Receives decoded inbound envelopes.
pub trait FrameHandler: Send + Sync {
    fn handle(&self, client_id: &str, envelope: Envelope);
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReadExit {
    PeerClosed,
    Deadline,
    Oversized,
    Transport,
}

/// Reads until the peer goes away, a frame is too large, or nothing arrives
/// within the read deadline. Every frame (pongs included) resets the
/// deadline. Malformed envelopes are counted and skipped.
pub async fn read_pump<St, E, H>(
    mut stream: St,
    client_id: &str,
    settings: PumpSettings,
    handler: &H,
    metrics: &WsMetrics,
) -> ReadExit
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    H: FrameHandler + ?Sized,
{
    loop {
        let message = match timeout(settings.read_deadline, stream.next()).await {
            Err(_) => {
                tracing::info!(client_id, "read deadline elapsed");
                return ReadExit::Deadline;
            }
            Ok(None) => return ReadExit::PeerClosed,
            Ok(Some(Err(err))) => {
                tracing::debug!(client_id, %err, "websocket read failed");
                return ReadExit::Transport;
            }
            Ok(Some(Ok(message))) => message,
        };

        let bytes: &[u8] = match &message {
            Message::Text(text) => text.as_bytes(),
            Message::Binary(bytes) => bytes.as_slice(),
            Message::Ping(_) | Message::Pong(_) => continue,
            Message::Close(_) => return ReadExit::PeerClosed,
        };
        if bytes.len() > settings.max_frame_bytes {
            metrics.inc_oversized_frame();
            tracing::warn!(
                client_id,
                len = bytes.len(),
                limit = settings.max_frame_bytes,
                "frame exceeds read limit"
            );
            return ReadExit::Oversized;
        }

        match Envelope::decode(bytes) {
            Ok(envelope) => {
                tracing::debug!(client_id, kind = %envelope.kind, "inbound message");
                handler.handle(client_id, envelope);
            }
            Err(err) => {
                metrics.inc_malformed_frame();
                tracing::warn!(client_id, %err, "dropping malformed frame");
            }
        }
    }
}

/// Drains the mailbox onto `sink` until cancelled, the mailbox closes, or a
/// write misses the deadline. Frames already queued behind the first are
/// written in the same flush. A ping goes out on every keepalive tick, data
/// traffic or not. The sink is closed on exit.
pub async fn write_pump<S>(mut sink: S, outbox: Outbox, settings: PumpSettings, metrics: &WsMetrics)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let Outbox {
        mut mailbox,
        mut cancelled,
    } = outbox;
    let mut keepalive = interval_at(Instant::now() + settings.keepalive, settings.keepalive);

    loop {
        if *cancelled.borrow() {
            break;
        }
        tokio::select! {
            biased;
            changed = cancelled.changed() => {
                if changed.is_err() || *cancelled.borrow() {
                    break;
                }
            }
            frame = mailbox.recv() => {
                let Some(frame) = frame else {
                    break;
                };
                let batch = async {
                    sink.feed(Message::Text(frame.to_string())).await?;
                    while let Ok(next) = mailbox.try_recv() {
                        sink.feed(Message::Text(next.to_string())).await?;
                    }
                    sink.flush().await
                };
                match timeout(settings.write_deadline, batch).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        metrics.inc_send_error();
                        tracing::warn!(%err, "websocket write failed");
                        break;
                    }
                    Err(_) => {
                        metrics.inc_send_timeout();
                        tracing::warn!("websocket write timed out, closing connection");
                        break;
                    }
                }
            }
            _ = keepalive.tick() => {
                match timeout(settings.write_deadline, sink.send(Message::Ping(Vec::new()))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        metrics.inc_keepalive_failure();
                        tracing::warn!(%err, "keepalive ping failed");
                        break;
                    }
                    Err(_) => {
                        metrics.inc_keepalive_failure();
                        tracing::warn!("keepalive ping timed out");
                        break;
                    }
                }
            }
        }
    }

    let _ = timeout(settings.write_deadline, sink.close()).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use coup_types::MessageType;
    use futures::channel::mpsc as fmpsc;
    use std::sync::Mutex;

    fn settings() -> PumpSettings {
        PumpSettings {
            read_deadline: Duration::from_millis(200),
            write_deadline: Duration::from_millis(200),
            keepalive: Duration::from_millis(50),
            max_frame_bytes: 512,
        }
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(String, Envelope)>>);

    impl FrameHandler for Recorder {
        fn handle(&self, client_id: &str, envelope: Envelope) {
            self.0
                .lock()
                .unwrap()
                .push((client_id.to_string(), envelope));
        }
    }

    fn text(raw: &str) -> Result<Message, std::io::Error> {
        Ok(Message::Text(raw.to_string()))
    }

    #[test]
    fn generates_id_when_missing() {
        let (client, _outbox) = Client::new(None, 4);
        assert!(Uuid::parse_str(client.id()).is_ok());
        let (client, _outbox) = Client::new(Some("  ".into()), 4);
        assert!(Uuid::parse_str(client.id()).is_ok());
        let (client, _outbox) = Client::new(Some("abc".into()), 4);
        assert_eq!(client.id(), "abc");
    }

    #[test]
    fn mailbox_is_bounded() {
        let (client, outbox) = Client::with_id("c", 2);
        client.try_deliver("a".into()).unwrap();
        client.try_deliver("b".into()).unwrap();
        assert_eq!(client.try_deliver("c".into()), Err(DeliveryError::Full));
        drop(outbox);
        assert_eq!(client.try_deliver("d".into()), Err(DeliveryError::Closed));
    }

    #[tokio::test]
    async fn read_pump_skips_malformed_frames() {
        let frames = futures::stream::iter(vec![
            text("garbage"),
            text(r#"{"type":"chat","payload":{"message":"hi"}}"#),
            text(r#"{"type":"bogus"}"#),
            Ok(Message::Pong(Vec::new())),
            text(r#"{"type":"player_leave"}"#),
        ]);
        let recorder = Recorder::default();
        let metrics = WsMetrics::default();

        let exit = read_pump(frames, "c1", settings(), &recorder, &metrics).await;
        assert_eq!(exit, ReadExit::PeerClosed);

        let seen = recorder.0.lock().unwrap();
        let kinds: Vec<_> = seen.iter().map(|(_, env)| env.kind).collect();
        assert_eq!(kinds, vec![MessageType::Chat, MessageType::PlayerLeave]);
        assert!(seen.iter().all(|(id, _)| id == "c1"));
        assert_eq!(metrics.snapshot().malformed_frames, 2);
    }

    #[tokio::test]
    async fn read_pump_stops_on_oversized_frame() {
        let big = format!(r#"{{"type":"chat","payload":{{"message":"{}"}}}}"#, "x".repeat(600));
        let frames = futures::stream::iter(vec![text(&big), text(r#"{"type":"chat"}"#)]);
        let recorder = Recorder::default();
        let metrics = WsMetrics::default();

        let exit = read_pump(frames, "c1", settings(), &recorder, &metrics).await;
        assert_eq!(exit, ReadExit::Oversized);
        assert!(recorder.0.lock().unwrap().is_empty());
        assert_eq!(metrics.snapshot().oversized_frames, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn read_pump_enforces_deadline() {
        let (_tx, rx) = fmpsc::unbounded::<Result<Message, std::io::Error>>();
        let recorder = Recorder::default();
        let metrics = WsMetrics::default();
        let exit = read_pump(rx, "c1", settings(), &recorder, &metrics).await;
        assert_eq!(exit, ReadExit::Deadline);
    }

    #[tokio::test]
    async fn write_pump_preserves_order_and_stops_on_cancel() {
        let (client, outbox) = Client::with_id("c", 16);
        for i in 0..5 {
            client.try_deliver(format!("m{i}").into()).unwrap();
        }
        let (sink, mut wire) = fmpsc::unbounded::<Message>();
        let metrics = Arc::new(WsMetrics::default());
        let pump_metrics = metrics.clone();
        let pump = tokio::spawn(async move {
            write_pump(sink, outbox, settings(), &pump_metrics).await;
        });

        let mut received = Vec::new();
        while received.len() < 5 {
            match wire.next().await {
                Some(Message::Text(text)) => received.push(text),
                Some(_) => {}
                None => break,
            }
        }
        assert_eq!(received, vec!["m0", "m1", "m2", "m3", "m4"]);

        client.cancel();
        timeout(Duration::from_secs(1), pump).await.unwrap().unwrap();
        assert!(client.is_cancelled());
        assert_eq!(metrics.snapshot().send_errors, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn write_pump_pings_when_idle() {
        let (client, outbox) = Client::with_id("c", 4);
        let (sink, mut wire) = fmpsc::unbounded::<Message>();
        let metrics = Arc::new(WsMetrics::default());
        let pump_metrics = metrics.clone();
        let pump = tokio::spawn(async move {
            write_pump(sink, outbox, settings(), &pump_metrics).await;
        });

        let first = wire.next().await;
        assert!(matches!(first, Some(Message::Ping(_))), "{first:?}");

        client.cancel();
        pump.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_holds_receive_only_client_open() {
        let settings = PumpSettings {
            read_deadline: Duration::from_secs(60),
            write_deadline: Duration::from_secs(10),
            keepalive: Duration::from_secs(54),
            max_frame_bytes: 512,
        };
        let (client, outbox) = Client::with_id("c", 16);
        let (sink, mut wire) = fmpsc::unbounded::<Message>();
        let (inbound_tx, inbound) = fmpsc::unbounded::<Result<Message, std::io::Error>>();
        let metrics = Arc::new(WsMetrics::default());

        let pump_metrics = metrics.clone();
        let writer = tokio::spawn(async move {
            write_pump(sink, outbox, settings, &pump_metrics).await;
        });
        // Answers pings with pongs and never sends data of its own.
        let peer = tokio::spawn(async move {
            let (mut pings, mut texts) = (0, 0);
            while let Some(message) = wire.next().await {
                match message {
                    Message::Ping(payload) => {
                        pings += 1;
                        let _ = inbound_tx.unbounded_send(Ok(Message::Pong(payload)));
                    }
                    Message::Text(_) => texts += 1,
                    _ => {}
                }
            }
            (pings, texts)
        });
        let feeder = client.clone();
        let traffic = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(30)).await;
                if feeder.try_deliver("table update".into()).is_err() {
                    break;
                }
            }
        });

        let recorder = Recorder::default();
        let outcome = timeout(
            Duration::from_secs(200),
            read_pump(inbound, "c", settings, &recorder, &metrics),
        )
        .await;
        assert!(outcome.is_err(), "read pump exited early: {outcome:?}");

        traffic.abort();
        client.cancel();
        writer.await.unwrap();
        let (pings, texts) = peer.await.unwrap();
        assert!(pings >= 3, "only {pings} pings sent");
        assert!(texts >= 6, "only {texts} data frames sent");
        assert_eq!(metrics.snapshot().keepalive_failures, 0);
    }

    #[tokio::test]
    async fn write_pump_exits_when_peer_is_gone() {
        let (client, outbox) = Client::with_id("c", 4);
        let (sink, wire) = fmpsc::unbounded::<Message>();
        drop(wire);
        client.try_deliver("lost".into()).unwrap();

        let metrics = WsMetrics::default();
        timeout(
            Duration::from_secs(1),
            write_pump(sink, outbox, settings(), &metrics),
        )
        .await
        .unwrap();
        assert_eq!(metrics.snapshot().send_errors, 1);
    }
}
