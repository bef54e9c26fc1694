/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Registry of sessions owned by this library.
//!
//! Two views are kept consistent on the owner thread: a `connection id →
//! subscriber` map for inbound routing, and an insertion-ordered session
//! sequence iterated by each poll tick.

use crate::session::SharedSession;
use crate::subscriber::SessionSubscriber;
use ferrofix_core::types::{ConnectionId, FixSessionId, LibraryId};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

/// Owns the subscriber map and the polled session sequence.
#[derive(Default)]
pub struct SessionRegistry {
    by_connection: HashMap<ConnectionId, SessionSubscriber>,
    sessions: Vec<SharedSession>,
}

impl SessionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber and appends its session to the sequence.
    ///
    /// # Panics
    /// Panics if `connection_id` is already registered; a connection maps to
    /// at most one live subscriber.
    pub fn add(&mut self, connection_id: ConnectionId, subscriber: SessionSubscriber) {
        self.sessions.push(Rc::clone(subscriber.session()));
        let previous = self.by_connection.insert(connection_id, subscriber);
        assert!(
            previous.is_none(),
            "duplicate subscriber for connection {connection_id}"
        );
    }

    /// Returns the subscriber for a connection, if registered.
    pub fn subscriber_mut(&mut self, connection_id: ConnectionId) -> Option<&mut SessionSubscriber> {
        self.by_connection.get_mut(&connection_id)
    }

    /// Removes the subscriber for a connection, leaving the session sequence
    /// untouched.
    pub fn remove(&mut self, connection_id: ConnectionId) -> Option<SessionSubscriber> {
        self.by_connection.remove(&connection_id)
    }

    /// Re-registers a subscriber whose disconnect was aborted, so the
    /// fragment can be redelivered.
    pub fn reinsert(&mut self, connection_id: ConnectionId, subscriber: SessionSubscriber) {
        self.by_connection.insert(connection_id, subscriber);
    }

    /// Removes a session from the polled sequence.
    pub fn remove_session(&mut self, session: &SharedSession) {
        self.sessions.retain(|other| !Rc::ptr_eq(other, session));
    }

    /// Returns the insertion-ordered session sequence.
    #[must_use]
    pub fn sessions(&self) -> &[SharedSession] {
        &self.sessions
    }

    /// Returns the number of owned sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Checks whether a connection is registered.
    #[must_use]
    pub fn contains(&self, connection_id: ConnectionId) -> bool {
        self.by_connection.contains_key(&connection_id)
    }

    /// Polls every owned session once.
    pub fn poll_sessions(&mut self, now_ms: u64) -> usize {
        let mut total = 0;
        for session in &self.sessions {
            total += session.borrow_mut().poll(now_ms);
        }
        total
    }

    /// Propagates control-plane connectivity to every owned session.
    pub fn set_library_connected(&mut self, connected: bool) {
        for session in &self.sessions {
            session.borrow_mut().set_library_connected(connected);
        }
    }

    /// Disables every owned session; used when the library closes.
    pub fn disable_all(&mut self) {
        for subscriber in self.by_connection.values() {
            subscriber.session().borrow_mut().disable();
        }
    }

    /// Reconciles against the engine's authoritative session-id set.
    ///
    /// Sessions absent from `session_ids` are timed out, closed, and removed
    /// from both views. Ids in the set with no local session are returned for
    /// the caller to report as an engine/library disagreement.
    pub fn reconcile(
        &mut self,
        library_id: LibraryId,
        session_ids: &[FixSessionId],
    ) -> Vec<FixSessionId> {
        let mut expected: HashSet<FixSessionId> = session_ids.iter().copied().collect();

        // Mark, then compact: removal decisions are taken against a snapshot
        // of the sequence before any structure is mutated.
        let mut stale_connections = Vec::new();
        for session in &self.sessions {
            let session = session.borrow();
            if !expected.remove(&session.id()) {
                stale_connections.push(session.connection_id());
            }
        }

        for connection_id in stale_connections {
            if let Some(mut subscriber) = self.by_connection.remove(&connection_id) {
                subscriber.on_timeout(library_id);
                subscriber.session().borrow_mut().close();
                let session = Rc::clone(subscriber.session());
                self.remove_session(&session);
            }
        }

        expected.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::SessionProxy;
    use crate::session::Session;
    use ferrofix_core::clock::ManualEpochClock;
    use ferrofix_core::types::UNKNOWN_SEQUENCE_NUMBER;
    use ferrofix_transport::{
        GatewayPublication, LibraryTransport, MemoryTransport, SessionState,
    };
    use std::cell::RefCell;

    fn subscriber(connection_id: u64, session_id: u64) -> SessionSubscriber {
        let mut transport = MemoryTransport::new(8);
        transport.init_streams("a");
        let proxy = SessionProxy::new(
            LibraryId::new(1),
            ConnectionId::new(connection_id),
            GatewayPublication::new(transport.outbound_publication()),
            Rc::new(ManualEpochClock::new(0)),
        );
        let mut session = Session::initiator(
            ConnectionId::new(connection_id),
            SessionState::Connected,
            UNKNOWN_SEQUENCE_NUMBER,
            UNKNOWN_SEQUENCE_NUMBER,
            None,
            10,
            proxy,
            0,
        );
        session.set_id(FixSessionId::new(session_id));
        SessionSubscriber::new(Rc::new(RefCell::new(session)))
    }

    #[test]
    fn test_add_and_lookup() {
        let mut registry = SessionRegistry::new();
        registry.add(ConnectionId::new(42), subscriber(42, 1001));

        assert!(registry.contains(ConnectionId::new(42)));
        assert_eq!(registry.session_count(), 1);
        assert!(registry.subscriber_mut(ConnectionId::new(42)).is_some());
    }

    #[test]
    #[should_panic(expected = "duplicate subscriber")]
    fn test_duplicate_add_panics() {
        let mut registry = SessionRegistry::new();
        registry.add(ConnectionId::new(42), subscriber(42, 1001));
        registry.add(ConnectionId::new(42), subscriber(42, 1002));
    }

    #[test]
    fn test_remove_and_reinsert() {
        let mut registry = SessionRegistry::new();
        registry.add(ConnectionId::new(42), subscriber(42, 1001));

        let removed = registry.remove(ConnectionId::new(42)).unwrap();
        assert!(!registry.contains(ConnectionId::new(42)));
        // Session sequence is managed separately from the map.
        assert_eq!(registry.session_count(), 1);

        registry.reinsert(ConnectionId::new(42), removed);
        assert!(registry.contains(ConnectionId::new(42)));
    }

    #[test]
    fn test_reconcile_times_out_unlisted_sessions() {
        let mut registry = SessionRegistry::new();
        registry.add(ConnectionId::new(1), subscriber(1, 1001));
        registry.add(ConnectionId::new(2), subscriber(2, 1002));

        let unknown = registry.reconcile(
            LibraryId::new(7),
            &[FixSessionId::new(1001), FixSessionId::new(1003)],
        );

        // 1002 removed from both views and closed.
        assert_eq!(registry.session_count(), 1);
        assert!(!registry.contains(ConnectionId::new(2)));
        assert_eq!(
            registry.sessions()[0].borrow().id(),
            FixSessionId::new(1001)
        );

        // 1003 reported as unknown.
        assert_eq!(unknown, vec![FixSessionId::new(1003)]);
    }

    #[test]
    fn test_reconcile_keeps_exact_match() {
        let mut registry = SessionRegistry::new();
        registry.add(ConnectionId::new(1), subscriber(1, 1001));

        let unknown = registry.reconcile(LibraryId::new(7), &[FixSessionId::new(1001)]);
        assert!(unknown.is_empty());
        assert_eq!(registry.session_count(), 1);
        assert!(registry.contains(ConnectionId::new(1)));
    }
}
