/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Per-connection inbound binding.
//!
//! A [`SessionSubscriber`] couples a session with the handler the user bound
//! at acquire time, and lives exactly as long as the underlying connection.

use crate::handlers::SessionHandler;
use crate::session::SharedSession;
use ferrofix_core::types::{CompleteSessionId, FixSessionId, LibraryId};
use ferrofix_transport::{Action, DisconnectReason};

/// Binds one connection's inbound flow to its session and user handler.
pub struct SessionSubscriber {
    session: SharedSession,
    handler: Option<Box<dyn SessionHandler>>,
    catchup_remaining: u32,
}

impl SessionSubscriber {
    /// Creates a subscriber for a newly assigned connection.
    #[must_use]
    pub fn new(session: SharedSession) -> Self {
        Self {
            session,
            handler: None,
            catchup_remaining: 0,
        }
    }

    /// Returns the wrapped session.
    #[must_use]
    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    /// Applies a completed logon and binds the user handler.
    #[allow(clippy::too_many_arguments)]
    pub fn on_logon(
        &mut self,
        session_id: FixSessionId,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        key: Option<CompleteSessionId>,
        username: String,
        password: String,
        handler: Box<dyn SessionHandler>,
        now_ms: u64,
    ) {
        self.session.borrow_mut().on_logon(
            session_id,
            last_sent_sequence_number,
            last_received_sequence_number,
            key,
            username,
            password,
            now_ms,
        );
        self.handler = Some(handler);
    }

    /// Delivers one FIX message.
    ///
    /// The session's counters advance only when the handler consumes the
    /// message, so an aborted fragment is redelivered with identical effect.
    #[allow(clippy::too_many_arguments)]
    pub fn on_message(
        &mut self,
        body: &[u8],
        sequence_index: i32,
        message_type: i32,
        timestamp_ns: u64,
        position: u64,
        now_ms: u64,
    ) -> Action {
        let action = match &mut self.handler {
            Some(handler) => handler.on_message(
                body,
                &self.session,
                sequence_index,
                message_type,
                timestamp_ns,
                position,
            ),
            None => Action::Continue,
        };
        if action == Action::Continue {
            self.session.borrow_mut().on_message(sequence_index, now_ms);
            if self.catchup_remaining > 0 {
                self.catchup_remaining -= 1;
            }
        }
        action
    }

    /// Delivers a disconnect. The caller closes and removes the session when
    /// the handler consumes it.
    pub fn on_disconnect(&mut self, library_id: LibraryId, reason: DisconnectReason) -> Action {
        match &mut self.handler {
            Some(handler) => handler.on_disconnect(library_id, &self.session, reason),
            None => Action::Continue,
        }
    }

    /// Notifies the handler that the engine timed this library out on the
    /// session.
    pub fn on_timeout(&mut self, library_id: LibraryId) {
        if let Some(handler) = &mut self.handler {
            handler.on_timeout(library_id, &self.session);
        }
    }

    /// Notifies the handler of a slow-consumer status change.
    pub fn on_slow_status(&mut self, library_id: LibraryId, has_become_slow: bool) {
        if let Some(handler) = &mut self.handler {
            handler.on_slow_status(library_id, &self.session, has_become_slow);
        }
    }

    /// Arms replay accounting for the next `message_count` messages.
    pub fn start_catchup(&mut self, message_count: u32) {
        self.catchup_remaining = message_count;
    }

    /// Checks whether delivered messages are still replayed catchup traffic.
    #[must_use]
    pub const fn is_replaying(&self) -> bool {
        self.catchup_remaining > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proxy::SessionProxy;
    use crate::session::Session;
    use ferrofix_core::clock::ManualEpochClock;
    use ferrofix_core::types::{ConnectionId, UNKNOWN_SEQUENCE_NUMBER};
    use ferrofix_transport::{
        GatewayPublication, LibraryTransport, MemoryTransport, SessionState,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn shared_session() -> SharedSession {
        let mut transport = MemoryTransport::new(8);
        transport.init_streams("a");
        let proxy = SessionProxy::new(
            LibraryId::new(1),
            ConnectionId::new(10),
            GatewayPublication::new(transport.outbound_publication()),
            Rc::new(ManualEpochClock::new(0)),
        );
        Rc::new(RefCell::new(Session::initiator(
            ConnectionId::new(10),
            SessionState::Connected,
            UNKNOWN_SEQUENCE_NUMBER,
            UNKNOWN_SEQUENCE_NUMBER,
            None,
            10,
            proxy,
            0,
        )))
    }

    struct RecordingHandler {
        delivered: Rc<RefCell<Vec<Vec<u8>>>>,
        abort_next: Rc<RefCell<bool>>,
    }

    impl SessionHandler for RecordingHandler {
        fn on_message(
            &mut self,
            body: &[u8],
            _session: &SharedSession,
            _sequence_index: i32,
            _message_type: i32,
            _timestamp_ns: u64,
            _position: u64,
        ) -> Action {
            if *self.abort_next.borrow() {
                return Action::Abort;
            }
            self.delivered.borrow_mut().push(body.to_vec());
            Action::Continue
        }
    }

    fn logged_on_subscriber(
        delivered: Rc<RefCell<Vec<Vec<u8>>>>,
        abort_next: Rc<RefCell<bool>>,
    ) -> SessionSubscriber {
        let mut subscriber = SessionSubscriber::new(shared_session());
        subscriber.on_logon(
            FixSessionId::new(1001),
            0,
            0,
            None,
            String::new(),
            String::new(),
            Box::new(RecordingHandler {
                delivered,
                abort_next,
            }),
            0,
        );
        subscriber
    }

    #[test]
    fn test_logon_activates_session() {
        let subscriber = logged_on_subscriber(Rc::default(), Rc::default());
        assert_eq!(subscriber.session().borrow().state(), SessionState::Active);
        assert_eq!(
            subscriber.session().borrow().id(),
            FixSessionId::new(1001)
        );
    }

    #[test]
    fn test_abort_leaves_counters_untouched() {
        let delivered = Rc::new(RefCell::new(Vec::new()));
        let abort_next = Rc::new(RefCell::new(true));
        let mut subscriber = logged_on_subscriber(Rc::clone(&delivered), Rc::clone(&abort_next));

        let action = subscriber.on_message(b"8=FIX", 0, 48, 0, 1, 100);
        assert_eq!(action, Action::Abort);
        assert_eq!(
            subscriber.session().borrow().last_received_sequence_number(),
            0
        );

        // Redelivery after back-pressure clears has the original effect.
        *abort_next.borrow_mut() = false;
        let action = subscriber.on_message(b"8=FIX", 0, 48, 0, 1, 100);
        assert_eq!(action, Action::Continue);
        assert_eq!(delivered.borrow().len(), 1);
        assert_eq!(
            subscriber.session().borrow().last_received_sequence_number(),
            1
        );
    }

    #[test]
    fn test_slow_status_reaches_handler() {
        struct SlowRecorder {
            slow: Rc<RefCell<Vec<bool>>>,
        }

        impl SessionHandler for SlowRecorder {
            fn on_message(
                &mut self,
                _body: &[u8],
                _session: &SharedSession,
                _sequence_index: i32,
                _message_type: i32,
                _timestamp_ns: u64,
                _position: u64,
            ) -> Action {
                Action::Continue
            }

            fn on_slow_status(
                &mut self,
                _library_id: LibraryId,
                _session: &SharedSession,
                has_become_slow: bool,
            ) {
                self.slow.borrow_mut().push(has_become_slow);
            }
        }

        let slow = Rc::new(RefCell::new(Vec::new()));
        let mut subscriber = SessionSubscriber::new(shared_session());
        subscriber.on_logon(
            FixSessionId::new(1001),
            0,
            0,
            None,
            String::new(),
            String::new(),
            Box::new(SlowRecorder {
                slow: Rc::clone(&slow),
            }),
            0,
        );

        subscriber.on_slow_status(LibraryId::new(1), true);
        subscriber.on_slow_status(LibraryId::new(1), false);
        assert_eq!(*slow.borrow(), vec![true, false]);
    }

    #[test]
    fn test_catchup_counts_down_on_consumed_messages() {
        let mut subscriber = logged_on_subscriber(Rc::default(), Rc::default());
        subscriber.start_catchup(2);
        assert!(subscriber.is_replaying());

        subscriber.on_message(b"a", 0, 48, 0, 1, 100);
        assert!(subscriber.is_replaying());
        subscriber.on_message(b"b", 0, 48, 0, 2, 100);
        assert!(!subscriber.is_replaying());
    }
}
