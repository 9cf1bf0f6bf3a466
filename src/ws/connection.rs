//! Per-connection read and write pumps.
//!
//! Each upgraded socket is split in two. The read pump decodes frames and
//! routes them through the [`Hub`]; the write pump drains the connection's
//! outbound queue onto the socket and sends keepalive pings. Whichever
//! pump stops first removes the connection from the hub, which closes it
//! and makes the other pump stop too.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, instrument, warn};

use crate::config::GatewayConfig;
use crate::domain::{Connection, Hub, OutboundReceiver};
use crate::error::{ConnectionError, ProtocolError, TransportError};

/// Limits and timers applied to every connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionSettings {
    /// Largest inbound frame accepted, in bytes.
    pub max_message_bytes: usize,
    /// Read deadline, refreshed by each pong.
    pub pong_wait: Duration,
    /// Interval between pings; shorter than `pong_wait`.
    pub ping_interval: Duration,
    /// Outbound queue bound.
    pub queue_capacity: usize,
}

impl ConnectionSettings {
    /// Derives connection settings from the gateway configuration.
    #[must_use]
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_message_bytes: config.max_message_bytes,
            pong_wait: config.pong_wait,
            ping_interval: config.ping_interval(),
            queue_capacity: config.outbound_queue_capacity,
        }
    }
}

/// Runs an upgraded socket until either pump stops.
///
/// Registers `connection` with the hub, spawns the write pump, and runs the
/// read pump on the current task.
#[instrument(skip_all, fields(conn_id = %connection.id(), subject = connection.subject()))]
pub async fn run_connection(
    socket: WebSocket,
    hub: Arc<Hub>,
    connection: Arc<Connection>,
    outbound: OutboundReceiver,
    settings: ConnectionSettings,
) {
    let (ws_tx, ws_rx) = socket.split();
    hub.register(Arc::clone(&connection));

    let writer = {
        let hub = Arc::clone(&hub);
        let connection = Arc::clone(&connection);
        tokio::spawn(async move {
            write_pump(&hub, &connection, ws_tx, outbound, settings.ping_interval).await
        })
    };

    let read_result = read_pump(&hub, &connection, ws_rx, &settings).await;
    let write_result = match writer.await {
        Ok(result) => result,
        Err(e) => {
            warn!(error = %e, "write pump task failed");
            // The pump never reached its own teardown.
            let _ = hub.remove(connection.id());
            Ok(())
        }
    };

    for result in [read_result, write_result] {
        if let Err(e) = result {
            info!(error = %e, "connection terminated");
        }
    }
    debug!("ws connection closed");
}

/// Reads frames from `stream` and routes them until the peer leaves, an
/// error occurs, or the connection is closed elsewhere. Always removes the
/// connection from the hub before returning.
///
/// # Errors
///
/// Returns the [`ConnectionError`] that ended the pump. A clean close by
/// the peer or by the hub is `Ok(())`.
pub async fn read_pump<S, E>(
    hub: &Hub,
    connection: &Arc<Connection>,
    stream: S,
    settings: &ConnectionSettings,
) -> Result<(), ConnectionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let result = read_loop(hub, connection, stream, settings).await;
    let _ = hub.remove(connection.id());
    result
}

async fn read_loop<S, E>(
    hub: &Hub,
    connection: &Arc<Connection>,
    mut stream: S,
    settings: &ConnectionSettings,
) -> Result<(), ConnectionError>
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: fmt::Display,
{
    let closed = connection.closed();
    tokio::pin!(closed);
    let mut deadline = Instant::now() + settings.pong_wait;

    loop {
        let frame = tokio::select! {
            () = &mut closed => return Ok(()),
            next = tokio::time::timeout_at(deadline, stream.next()) => match next {
                Err(_) => return Err(TransportError::KeepaliveTimeout.into()),
                Ok(None) => return Ok(()),
                Ok(Some(Err(e))) => return Err(TransportError::Read(e.to_string()).into()),
                Ok(Some(Ok(frame))) => frame,
            },
        };

        match frame {
            Message::Text(text) => {
                dispatch(hub, connection, text.as_str(), settings.max_message_bytes)?;
            }
            Message::Binary(data) => {
                check_size(data.len(), settings.max_message_bytes)?;
                let text =
                    std::str::from_utf8(&data).map_err(|_| ProtocolError::UnsupportedFrame)?;
                dispatch(hub, connection, text, settings.max_message_bytes)?;
            }
            Message::Pong(_) => {
                deadline = Instant::now() + settings.pong_wait;
            }
            // Pings are answered by the socket layer.
            Message::Ping(_) => {}
            Message::Close(_) => {
                debug!("client sent close frame");
                return Ok(());
            }
        }
    }
}

fn check_size(size: usize, limit: usize) -> Result<(), ProtocolError> {
    if size > limit {
        return Err(ProtocolError::MessageTooLarge { size, limit });
    }
    Ok(())
}

fn dispatch(
    hub: &Hub,
    connection: &Arc<Connection>,
    text: &str,
    limit: usize,
) -> Result<(), ProtocolError> {
    check_size(text.len(), limit)?;
    let event = crate::domain::Event::decode(text)?;
    hub.route(&event, connection).inspect_err(|e| {
        warn!(event_type = %event.kind, error = %e, "error handling event");
    })
}

/// Longest the write pump waits to deliver the final Close frame.
pub const CLOSE_FRAME_TIMEOUT: Duration = Duration::from_secs(1);

/// Writes queued events to `sink` and pings every `ping_interval` until the
/// queue closes or a write fails. Always removes the connection from the
/// hub before returning.
///
/// A write still pending when the connection is removed is abandoned, so a
/// peer that stops reading cannot keep the pump (and its socket) alive.
///
/// # Errors
///
/// Returns [`TransportError::Write`] if the sink rejects a frame and
/// [`TransportError::WriteAbandoned`] if removal interrupted a write.
pub async fn write_pump<W>(
    hub: &Hub,
    connection: &Connection,
    sink: W,
    outbound: OutboundReceiver,
    ping_interval: Duration,
) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    let result = write_loop(sink, outbound, ping_interval, connection.closed()).await;
    let _ = hub.remove(connection.id());
    result
}

async fn write_loop<W, C>(
    mut sink: W,
    mut outbound: OutboundReceiver,
    ping_interval: Duration,
    closed: C,
) -> Result<(), ConnectionError>
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
    C: Future<Output = ()>,
{
    tokio::pin!(closed);
    let mut ticker = tokio::time::interval_at(Instant::now() + ping_interval, ping_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let frame = tokio::select! {
            queued = outbound.recv() => {
                let Some(event) = queued else {
                    // Queue closed: the connection was removed.
                    send_close(&mut sink).await;
                    return Ok(());
                };
                let text = event
                    .encode()
                    .map_err(|e| TransportError::Write(format!("encode {}: {e}", event.kind)))?;
                Message::text(text)
            }
            _ = ticker.tick() => Message::Ping(Bytes::new()),
        };

        // Frames that can be written immediately still go out after removal.
        tokio::select! {
            biased;
            sent = sink.send(frame) => sent.map_err(|e| TransportError::Write(e.to_string()))?,
            () = &mut closed => return Err(TransportError::WriteAbandoned.into()),
        }
    }
}

async fn send_close<W>(sink: &mut W)
where
    W: Sink<Message> + Unpin,
    W::Error: fmt::Display,
{
    match tokio::time::timeout(CLOSE_FRAME_TIMEOUT, sink.send(Message::Close(None))).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!(error = %e, "close frame not delivered"),
        Err(_) => debug!("close frame timed out"),
    }
}
