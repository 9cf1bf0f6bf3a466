//! Shared handle to one live client connection.
//!
//! A [`Connection`] is the part of a client that the rest of the system can
//! touch: its identity, its room, and the sending half of its bounded
//! outbound queue. The socket itself is owned by the two pumps in
//! [`crate::ws::connection`]; the [`super::Hub`] only holds this handle.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use super::{ConnectionId, Event};

/// Room every connection starts in.
pub const DEFAULT_ROOM: &str = "general";

/// Receiving half of a connection's outbound queue, owned by its write pump.
pub type OutboundReceiver = mpsc::Receiver<Arc<Event>>;

/// Result of offering an event to a connection's outbound queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The event was queued.
    Queued,
    /// The queue was full; the event was dropped for this recipient.
    Dropped,
    /// The connection is closed.
    Closed,
}

/// Represents a connected client.
#[derive(Debug)]
pub struct Connection {
    id: ConnectionId,
    /// Token subject the connection was authorized as.
    subject: String,
    room: Mutex<String>,
    /// `None` once the connection has been closed.
    outbound: Mutex<Option<mpsc::Sender<Arc<Event>>>>,
    closed: watch::Sender<bool>,
    dropped_messages: AtomicU64,
    connected_at: Instant,
}

impl Connection {
    /// Creates a connection in [`DEFAULT_ROOM`] with an outbound queue
    /// bounded at `queue_capacity` events.
    ///
    /// Returns the shared handle and the queue's receiving half.
    #[must_use]
    pub fn new(subject: impl Into<String>, queue_capacity: usize) -> (Arc<Self>, OutboundReceiver) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let (closed, _) = watch::channel(false);
        let connection = Self {
            id: ConnectionId::new(),
            subject: subject.into(),
            room: Mutex::new(DEFAULT_ROOM.to_string()),
            outbound: Mutex::new(Some(tx)),
            closed,
            dropped_messages: AtomicU64::new(0),
            connected_at: Instant::now(),
        };
        (Arc::new(connection), rx)
    }

    /// Returns the connection id.
    #[must_use]
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Returns the authorized subject.
    #[must_use]
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Returns the current room.
    #[must_use]
    pub fn room(&self) -> String {
        self.room.lock().clone()
    }

    /// Returns `true` if the connection is currently in `room`.
    #[must_use]
    pub fn in_room(&self, room: &str) -> bool {
        *self.room.lock() == room
    }

    /// Moves the connection to `room`, returning the previous room.
    pub fn set_room(&self, room: impl Into<String>) -> String {
        std::mem::replace(&mut *self.room.lock(), room.into())
    }

    /// Offers an event to the outbound queue without waiting.
    ///
    /// A full queue drops the event for this recipient and increments the
    /// dropped message counter.
    pub fn send(&self, event: Arc<Event>) -> SendOutcome {
        let guard = self.outbound.lock();
        let Some(tx) = guard.as_ref() else {
            return SendOutcome::Closed;
        };
        match tx.try_send(event) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                let _ = self.dropped_messages.fetch_add(1, Ordering::Relaxed);
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Total messages dropped for this connection.
    #[must_use]
    pub fn drop_count(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    /// Closes the connection: releases the outbound queue's sender so the
    /// write pump drains and exits, and signals the read pump.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        let was_open = self.outbound.lock().take().is_some();
        if was_open {
            let _ = self.closed.send_replace(true);
        }
        was_open
    }

    /// Returns `true` once [`Connection::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// Resolves once the connection is closed.
    pub fn closed(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut rx = self.closed.subscribe();
        async move {
            while !*rx.borrow_and_update() {
                if rx.changed().await.is_err() {
                    break;
                }
            }
        }
    }

    /// Connection age.
    #[must_use]
    pub fn age(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
