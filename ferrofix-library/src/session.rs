/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Runtime model of one owned FIX session.
//!
//! The session-level protocol machine (logon exchange, resend, logout) lives
//! with the engine and the wire codec; what the library owns is the state the
//! engine hands over, the sequence counters, heartbeat pacing, and the
//! outbound path through the session's proxy.
//!
//! States are a runtime enum rather than compile-time typestates: the current
//! state arrives over the transport in `ManageConnection` and must be
//! representable as data.

use crate::config::SessionConfiguration;
use crate::proxy::SessionProxy;
use bytes::Bytes;
use ferrofix_core::types::{
    CompleteSessionId, ConnectionId, FixSessionId, UNKNOWN_SEQUENCE_NUMBER,
};
use ferrofix_transport::{ConnectionType, PublishError, SessionState};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a session.
///
/// The registry's connection map, the polled session sequence, and resolved
/// initiate replies all alias the same session. Single-threaded by contract.
pub type SharedSession = Rc<RefCell<Session>>;

/// One FIX session owned by this library.
pub struct Session {
    id: FixSessionId,
    connection_id: ConnectionId,
    connection_type: ConnectionType,
    state: SessionState,
    key: Option<CompleteSessionId>,
    last_sent_sequence_number: i32,
    last_received_sequence_number: i32,
    sequence_index: i32,
    heartbeat_interval_ms: u64,
    library_connected: bool,
    username: String,
    password: String,
    address: Option<(String, u16)>,
    proxy: SessionProxy,
    last_sent_time_ms: u64,
    last_received_time_ms: u64,
}

impl Session {
    /// Creates an initiator session from a `ManageConnection` assignment.
    ///
    /// # Arguments
    /// * `connection_id` - Engine-assigned connection id
    /// * `state` - State reported by the engine
    /// * `last_sent_sequence_number` - Engine-known last sent sequence
    /// * `last_received_sequence_number` - Engine-known last received sequence
    /// * `configuration` - The initiating configuration, when this library
    ///   requested the connection
    /// * `heartbeat_interval_s` - Heartbeat interval in seconds
    /// * `proxy` - Outbound path for this connection
    /// * `now_ms` - Current epoch milliseconds
    #[allow(clippy::too_many_arguments)]
    #[must_use]
    pub fn initiator(
        connection_id: ConnectionId,
        state: SessionState,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        configuration: Option<&SessionConfiguration>,
        heartbeat_interval_s: u32,
        proxy: SessionProxy,
        now_ms: u64,
    ) -> Self {
        let initial_sent =
            initiator_initial_sequence_number(configuration, last_sent_sequence_number);
        let initial_received =
            initiator_initial_sequence_number(configuration, last_received_sequence_number);
        let (username, password) = match configuration {
            Some(config) => (
                config.username().to_string(),
                config.password().to_string(),
            ),
            None => (String::new(), String::new()),
        };

        Self {
            id: FixSessionId::default(),
            connection_id,
            connection_type: ConnectionType::Initiator,
            state,
            key: None,
            last_sent_sequence_number: initial_sent - 1,
            last_received_sequence_number: initial_received - 1,
            sequence_index: 0,
            heartbeat_interval_ms: u64::from(heartbeat_interval_s) * 1_000,
            library_connected: true,
            username,
            password,
            address: None,
            proxy,
            last_sent_time_ms: now_ms,
            last_received_time_ms: now_ms,
        }
    }

    /// Creates an acceptor session from a `ManageConnection` assignment.
    ///
    /// # Arguments
    /// * `connection_id` - Engine-assigned connection id
    /// * `state` - State reported by the engine
    /// * `heartbeat_interval_s` - Heartbeat interval in seconds
    /// * `address` - Parsed peer address
    /// * `proxy` - Outbound path for this connection
    /// * `now_ms` - Current epoch milliseconds
    #[must_use]
    pub fn acceptor(
        connection_id: ConnectionId,
        state: SessionState,
        heartbeat_interval_s: u32,
        address: (String, u16),
        proxy: SessionProxy,
        now_ms: u64,
    ) -> Self {
        Self {
            id: FixSessionId::default(),
            connection_id,
            connection_type: ConnectionType::Acceptor,
            state,
            key: None,
            last_sent_sequence_number: 0,
            last_received_sequence_number: 0,
            sequence_index: 0,
            heartbeat_interval_ms: u64::from(heartbeat_interval_s) * 1_000,
            library_connected: true,
            username: String::new(),
            password: String::new(),
            address: Some(address),
            proxy,
            last_sent_time_ms: now_ms,
            last_received_time_ms: now_ms,
        }
    }

    /// Returns the engine-assigned session surrogate.
    #[inline]
    #[must_use]
    pub fn id(&self) -> FixSessionId {
        self.id
    }

    /// Binds the engine-assigned session surrogate.
    pub fn set_id(&mut self, id: FixSessionId) {
        self.id = id;
        self.proxy.set_session_id(id);
    }

    /// Returns the connection id.
    #[inline]
    #[must_use]
    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    /// Returns the connection direction.
    #[inline]
    #[must_use]
    pub fn connection_type(&self) -> ConnectionType {
        self.connection_type
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Returns the complete session identity, once known.
    #[must_use]
    pub fn key(&self) -> Option<&CompleteSessionId> {
        self.key.as_ref()
    }

    /// Returns the last sent sequence number.
    #[inline]
    #[must_use]
    pub fn last_sent_sequence_number(&self) -> i32 {
        self.last_sent_sequence_number
    }

    /// Returns the last received sequence number.
    #[inline]
    #[must_use]
    pub fn last_received_sequence_number(&self) -> i32 {
        self.last_received_sequence_number
    }

    /// Returns the current sequence index.
    #[inline]
    #[must_use]
    pub fn sequence_index(&self) -> i32 {
        self.sequence_index
    }

    /// Returns the heartbeat interval in milliseconds.
    #[inline]
    #[must_use]
    pub fn heartbeat_interval_ms(&self) -> u64 {
        self.heartbeat_interval_ms
    }

    /// Checks whether the owning library is connected to its engine.
    #[inline]
    #[must_use]
    pub fn is_library_connected(&self) -> bool {
        self.library_connected
    }

    /// Returns the logon username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the logon password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the peer address, when known (acceptor sessions).
    #[must_use]
    pub fn address(&self) -> Option<(&str, u16)> {
        self.address.as_ref().map(|(host, port)| (host.as_str(), *port))
    }

    /// Applies a completed logon to the session.
    #[allow(clippy::too_many_arguments)]
    pub fn on_logon(
        &mut self,
        session_id: FixSessionId,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        key: Option<CompleteSessionId>,
        username: String,
        password: String,
        now_ms: u64,
    ) {
        self.set_id(session_id);
        if last_sent_sequence_number != UNKNOWN_SEQUENCE_NUMBER {
            self.last_sent_sequence_number = last_sent_sequence_number;
        }
        if last_received_sequence_number != UNKNOWN_SEQUENCE_NUMBER {
            self.last_received_sequence_number = last_received_sequence_number;
        }
        if key.is_some() {
            self.key = key;
        }
        self.username = username;
        self.password = password;
        self.state = SessionState::Active;
        self.last_received_time_ms = now_ms;
    }

    /// Applies one received FIX message to the session counters.
    pub fn on_message(&mut self, sequence_index: i32, now_ms: u64) {
        self.last_received_sequence_number += 1;
        if sequence_index > self.sequence_index {
            self.sequence_index = sequence_index;
        }
        self.last_received_time_ms = now_ms;
    }

    /// Sends an encoded FIX message on this session.
    ///
    /// # Arguments
    /// * `message_type` - Packed FIX MsgType characters
    /// * `body` - The encoded message bytes
    ///
    /// # Returns
    /// The stream position past the accepted frame, or the back-pressure
    /// error for the caller to retry.
    pub fn send(&mut self, message_type: i32, body: Bytes) -> Result<u64, PublishError> {
        let position = self
            .proxy
            .send_message(message_type, self.sequence_index, body)?;
        self.last_sent_sequence_number += 1;
        Ok(position)
    }

    /// Drives time-based work: heartbeat pacing.
    ///
    /// # Returns
    /// Work units performed this tick.
    pub fn poll(&mut self, now_ms: u64) -> usize {
        if self.state != SessionState::Active || !self.library_connected {
            return 0;
        }
        if now_ms.saturating_sub(self.last_sent_time_ms) < self.heartbeat_interval_ms {
            return 0;
        }
        match self.proxy.send_heartbeat(self.sequence_index) {
            Ok(_) => {
                self.last_sent_sequence_number += 1;
                self.last_sent_time_ms = now_ms;
                1
            }
            // Back-pressured: retried on the next tick.
            Err(_) => 0,
        }
    }

    /// Marks the connection as gone.
    pub fn close(&mut self) {
        self.state = SessionState::Disconnected;
    }

    /// Detaches the session from its library: no further outbound work.
    pub fn disable(&mut self) {
        self.library_connected = false;
        self.state = SessionState::Disconnected;
    }

    /// Propagates the library's control-plane connectivity.
    pub fn set_library_connected(&mut self, connected: bool) {
        self.library_connected = connected;
    }
}

/// Chooses the initial sequence number for an initiated session.
///
/// Custom initial number wins; persistent sequence numbers continue from the
/// engine-reported last value; otherwise sequences restart at 1.
#[must_use]
pub fn initiator_initial_sequence_number(
    configuration: Option<&SessionConfiguration>,
    last_sequence_number: i32,
) -> i32 {
    let Some(configuration) = configuration else {
        return 1;
    };
    if let Some(initial) = configuration.initial_sequence_number() {
        return initial;
    }
    if configuration.sequence_numbers_persistent()
        && last_sequence_number != UNKNOWN_SEQUENCE_NUMBER
    {
        return last_sequence_number + 1;
    }
    1
}
