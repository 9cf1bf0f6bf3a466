//! Registry of live connections, event router, and room broadcast.
//!
//! The registry map is the only state mutated across connection tasks. It
//! sits behind a single [`parking_lot::Mutex`] that covers register,
//! remove and broadcast iteration. The handler table is fixed at
//! construction and read without locking.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use super::handlers::HandlerTable;
use super::payloads::Presence;
use super::{Connection, ConnectionId, Event, EventKind, SendOutcome};
use crate::error::ProtocolError;

/// Delivery tally for one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Recipients whose queue accepted the event.
    pub delivered: usize,
    /// Recipients that were skipped because their queue was full or closed.
    pub dropped: usize,
}

/// Central hub holding every live [`Connection`].
#[derive(Debug)]
pub struct Hub {
    connections: Mutex<HashMap<ConnectionId, Arc<Connection>>>,
    handlers: HandlerTable,
}

impl Hub {
    /// Creates an empty hub that routes through `handlers`.
    #[must_use]
    pub fn new(handlers: HandlerTable) -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            handlers,
        }
    }

    /// Adds a connection to the registry and announces it to its room.
    pub fn register(&self, connection: Arc<Connection>) {
        let room = connection.room();
        let subject = connection.subject().to_string();
        {
            let mut conns = self.connections.lock();
            let _ = conns.insert(connection.id(), connection);
        }
        info!(subject, room, "connection registered");
        self.announce(EventKind::UserJoined, subject, room);
    }

    /// Removes a connection and closes it.
    ///
    /// Idempotent: removing an id that is not registered does nothing and
    /// returns `false`.
    pub fn remove(&self, id: ConnectionId) -> bool {
        let removed = {
            let mut conns = self.connections.lock();
            let removed = conns.remove(&id);
            if let Some(conn) = &removed {
                let _ = conn.close();
            }
            removed
        };
        let Some(conn) = removed else {
            return false;
        };

        let room = conn.room();
        info!(
            conn_id = %id,
            subject = conn.subject(),
            room,
            dropped = conn.drop_count(),
            age_ms = u64::try_from(conn.age().as_millis()).unwrap_or(u64::MAX),
            "connection removed"
        );
        self.announce(EventKind::UserLeft, conn.subject().to_string(), room);
        true
    }

    /// Returns `true` if `id` is registered.
    #[must_use]
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.lock().contains_key(&id)
    }

    /// Returns the number of registered connections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.connections.lock().len()
    }

    /// Returns `true` if no connections are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.connections.lock().is_empty()
    }

    /// Returns the sorted subjects of every connection in `room`.
    #[must_use]
    pub fn room_subjects(&self, room: &str) -> Vec<String> {
        let mut subjects: Vec<String> = {
            let conns = self.connections.lock();
            conns
                .values()
                .filter(|c| c.in_room(room))
                .map(|c| c.subject().to_string())
                .collect()
        };
        subjects.sort();
        subjects
    }

    /// Dispatches `event` from `source` to the handler for its kind.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::UnhandledEventType`] if no handler is
    /// registered for the kind, or whatever error the handler returns.
    pub fn route(&self, event: &Event, source: &Arc<Connection>) -> Result<(), ProtocolError> {
        let Some(handler) = self.handlers.get(&event.kind) else {
            return Err(ProtocolError::UnhandledEventType(event.kind.to_string()));
        };
        debug!(conn_id = %source.id(), event_type = %event.kind, "routing event");
        handler(self, source, event)
    }

    /// Queues `event` for every connection in `room`.
    ///
    /// Never waits on a recipient: a full queue drops the event for that
    /// recipient only.
    pub fn broadcast_to_room(&self, event: Event, room: &str) -> BroadcastReport {
        self.fan_out(event, room, None)
    }

    /// Like [`Hub::broadcast_to_room`], skipping the connection `except`.
    pub fn broadcast_to_room_except(
        &self,
        event: Event,
        room: &str,
        except: ConnectionId,
    ) -> BroadcastReport {
        self.fan_out(event, room, Some(except))
    }

    fn fan_out(&self, event: Event, room: &str, except: Option<ConnectionId>) -> BroadcastReport {
        let event = Arc::new(event);
        let mut report = BroadcastReport::default();
        let conns = self.connections.lock();
        for conn in conns.values() {
            if Some(conn.id()) == except || !conn.in_room(room) {
                continue;
            }
            match conn.send(Arc::clone(&event)) {
                SendOutcome::Queued => report.delivered += 1,
                outcome => {
                    report.dropped += 1;
                    warn!(
                        conn_id = %conn.id(),
                        room,
                        event_type = %event.kind,
                        ?outcome,
                        "failed to enqueue event for client"
                    );
                }
            }
        }
        drop(conns);
        debug!(
            event_type = %event.kind,
            room,
            delivered = report.delivered,
            dropped = report.dropped,
            "broadcast event to room"
        );
        report
    }

    /// Broadcasts a presence event for `subject` to `room`.
    pub(crate) fn announce(&self, kind: EventKind, subject: String, room: String) {
        match Event::new(kind, &Presence {
            subject,
            room: room.clone(),
        }) {
            Ok(event) => {
                let _ = self.broadcast_to_room(event, &room);
            }
            Err(e) => warn!(error = %e, "failed to build presence event"),
        }
    }
}

impl Default for Hub {
    fn default() -> Self {
        Self::new(HandlerTable::standard())
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::OutboundReceiver;
    use crate::domain::payloads::NewMessage;
    use std::collections::HashSet;
    use std::time::{Duration, Instant};

    fn connect(hub: &Hub, subject: &str) -> (Arc<Connection>, OutboundReceiver) {
        let (conn, rx) = Connection::new(subject, 32);
        hub.register(Arc::clone(&conn));
        (conn, rx)
    }

    fn drain(rx: &mut OutboundReceiver) -> Vec<Arc<Event>> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    fn drain_kind(rx: &mut OutboundReceiver, kind: &EventKind) -> Vec<Arc<Event>> {
        drain(rx).into_iter().filter(|e| &e.kind == kind).collect()
    }

    fn send_message(text: &str, from: &str) -> Event {
        Event {
            kind: EventKind::SendMessage,
            payload: serde_json::json!({"message": text, "from": from}),
        }
    }

    fn change_room(room: &str) -> Event {
        Event {
            kind: EventKind::ChangeRoom,
            payload: serde_json::json!({"room_name": room}),
        }
    }

    fn chat(text: &str) -> Event {
        Event {
            kind: EventKind::NewMessage,
            payload: serde_json::json!({"message": text}),
        }
    }

    #[test]
    fn register_and_remove() {
        let hub = Hub::default();
        let (a, _rx) = connect(&hub, "a");
        assert!(hub.contains(a.id()));
        assert_eq!(hub.len(), 1);

        assert!(hub.remove(a.id()));
        assert!(!hub.contains(a.id()));
        assert!(hub.is_empty());
        assert!(a.is_closed());
    }

    #[test]
    fn remove_is_idempotent() {
        let hub = Hub::default();
        let (a, _rx) = connect(&hub, "a");
        assert!(hub.remove(a.id()));
        assert!(!hub.remove(a.id()));
        assert!(!hub.remove(ConnectionId::new()));
    }

    #[test]
    fn unknown_event_type_is_a_routing_error() {
        let hub = Hub::default();
        let (a, _rx) = connect(&hub, "a");
        let event = Event {
            kind: EventKind::Unknown("dance".to_string()),
            payload: serde_json::Value::Null,
        };
        assert_eq!(
            hub.route(&event, &a),
            Err(ProtocolError::UnhandledEventType("dance".to_string()))
        );
    }

    #[test]
    fn server_only_kinds_are_not_routable() {
        let hub = Hub::default();
        let (a, _rx) = connect(&hub, "a");
        let event = Event {
            kind: EventKind::NewMessage,
            payload: serde_json::json!({}),
        };
        assert!(matches!(
            hub.route(&event, &a),
            Err(ProtocolError::UnhandledEventType(_))
        ));
    }

    #[test]
    fn send_message_reaches_room_including_sender() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "admin");
        let (_b, mut rx_b) = connect(&hub, "bob");

        assert_eq!(hub.route(&send_message("hi", "admin"), &a), Ok(()));

        for rx in [&mut rx_a, &mut rx_b] {
            let got = drain_kind(rx, &EventKind::NewMessage);
            assert_eq!(got.len(), 1);
            let Some(event) = got.first() else {
                panic!("expected new_message");
            };
            let Ok(msg) = event.payload_as::<NewMessage>() else {
                panic!("new_message payload");
            };
            assert_eq!(msg.message, "hi");
            assert_eq!(msg.from, "admin");
        }
    }

    #[test]
    fn invalid_payload_is_reported() {
        let hub = Hub::default();
        let (a, _rx) = connect(&hub, "a");
        let event = Event {
            kind: EventKind::SendMessage,
            payload: serde_json::json!({"message": 42}),
        };
        assert!(matches!(
            hub.route(&event, &a),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn broadcast_is_scoped_to_room() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "a");
        let (b, mut rx_b) = connect(&hub, "b");
        let _ = a.set_room("x");
        let _ = b.set_room("y");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let report = hub.broadcast_to_room(chat("for x"), "x");
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 0 });
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn room_change_moves_broadcast_membership() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "a");
        let (_b, mut rx_b) = connect(&hub, "b");
        let _ = a.set_room("x");
        drain(&mut rx_a);

        assert_eq!(hub.route(&change_room("y"), &a), Ok(()));
        assert_eq!(a.room(), "y");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let _ = hub.broadcast_to_room(chat("to x"), "x");
        assert!(drain(&mut rx_a).is_empty());

        let _ = hub.broadcast_to_room(chat("to y"), "y");
        assert_eq!(drain(&mut rx_a).len(), 1);
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn room_change_announces_presence() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "alice");
        let (_b, mut rx_b) = connect(&hub, "bob");
        drain(&mut rx_a);
        drain(&mut rx_b);

        assert_eq!(hub.route(&change_room("y"), &a), Ok(()));

        let left = drain_kind(&mut rx_b, &EventKind::UserLeft);
        assert_eq!(left.len(), 1);
        let joined = drain_kind(&mut rx_a, &EventKind::UserJoined);
        assert_eq!(joined.len(), 1);
        let Some(joined) = joined.first() else {
            panic!("user_joined");
        };
        assert_eq!(joined.payload["subject"], "alice");
        assert_eq!(joined.payload["room"], "y");
    }

    #[test]
    fn change_to_same_room_is_silent() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "a");
        drain(&mut rx_a);
        assert_eq!(hub.route(&change_room("general"), &a), Ok(()));
        assert!(drain(&mut rx_a).is_empty());
    }

    #[test]
    fn typing_skips_sender() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "a");
        let (_b, mut rx_b) = connect(&hub, "b");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let typing = Event {
            kind: EventKind::Typing,
            payload: serde_json::json!({"from": "a"}),
        };
        assert_eq!(hub.route(&typing, &a), Ok(()));
        assert!(drain(&mut rx_a).is_empty());
        assert_eq!(drain_kind(&mut rx_b, &EventKind::Typing).len(), 1);
    }

    #[test]
    fn user_list_replies_to_requester_only() {
        let hub = Hub::default();
        let (a, mut rx_a) = connect(&hub, "zed");
        let (_b, mut rx_b) = connect(&hub, "amy");
        let (c, _rx_c) = connect(&hub, "carl");
        let _ = c.set_room("elsewhere");
        drain(&mut rx_a);
        drain(&mut rx_b);

        let request = Event {
            kind: EventKind::UserList,
            payload: serde_json::Value::Null,
        };
        assert_eq!(hub.route(&request, &a), Ok(()));

        let replies = drain(&mut rx_a);
        let Some(reply) = replies.first() else {
            panic!("user_list reply");
        };
        assert_eq!(reply.kind, EventKind::UserList);
        assert_eq!(reply.payload["users"], serde_json::json!(["amy", "zed"]));
        assert!(drain(&mut rx_b).is_empty());
    }

    #[test]
    fn removal_announces_departure_to_room() {
        let hub = Hub::default();
        let (a, _rx_a) = connect(&hub, "alice");
        let (_b, mut rx_b) = connect(&hub, "bob");
        drain(&mut rx_b);

        assert!(hub.remove(a.id()));
        let left = drain_kind(&mut rx_b, &EventKind::UserLeft);
        assert_eq!(left.len(), 1);
    }

    #[test]
    fn full_queue_drops_message_without_blocking() {
        let hub = Hub::default();
        let (slow, _slow_rx) = Connection::new("slow", 1);
        hub.register(Arc::clone(&slow));
        let (_fast, mut fast_rx) = connect(&hub, "fast");
        drain(&mut fast_rx);

        // The join notices already filled the slow queue.
        let started = Instant::now();
        for n in 0..100 {
            let _ = hub.broadcast_to_room(chat(&format!("msg {n}")), "general");
        }
        assert!(started.elapsed() < Duration::from_secs(1));

        assert!(slow.drop_count() >= 100);
        assert!(hub.contains(slow.id()));
        assert_eq!(drain(&mut fast_rx).len(), 32);
    }

    #[test]
    fn broadcast_report_counts_drops() {
        let hub = Hub::default();
        let (slow, _slow_rx) = Connection::new("slow", 1);
        hub.register(Arc::clone(&slow));

        let report = hub.broadcast_to_room(chat("x"), "general");
        assert_eq!(report, BroadcastReport { delivered: 0, dropped: 1 });
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_register_remove_is_consistent() {
        let hub = Arc::new(Hub::default());
        let mut tasks = Vec::new();

        for _ in 0..8 {
            let hub = Arc::clone(&hub);
            tasks.push(tokio::spawn(async move {
                let mut kept = Vec::new();
                for n in 0..50 {
                    let (conn, _rx) = Connection::new(format!("user-{n}"), 4);
                    hub.register(Arc::clone(&conn));
                    tokio::task::yield_now().await;
                    if n % 2 == 0 {
                        assert!(hub.remove(conn.id()));
                    } else {
                        kept.push(conn.id());
                    }
                }
                kept
            }));
        }

        let mut expected = HashSet::new();
        for task in tasks {
            let Ok(kept) = task.await else {
                panic!("task panicked");
            };
            expected.extend(kept);
        }

        assert_eq!(hub.len(), expected.len());
        assert_eq!(expected.len(), 8 * 25);
        for id in &expected {
            assert!(hub.contains(*id));
        }
    }
}
