/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Control-plane message model.
//!
//! Every fragment on the library/engine transport is one self-describing
//! [`LibraryMessage`]. Messages addressed to a library carry its
//! [`LibraryId`]; replies echo the originating [`CorrelationId`] in their
//! `reply_to_id` field.
//!
//! The enums that cross the wire carry stable numeric codes.

use bytes::Bytes;
use ferrofix_core::error::GatewayErrorKind;
use ferrofix_core::types::{ConnectionId, CorrelationId, FixSessionId, LibraryId};
use num_derive::{FromPrimitive, ToPrimitive};

/// Direction of the TCP connection underlying a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum ConnectionType {
    /// We dialled out to the counterparty.
    Initiator = 1,
    /// The counterparty dialled in to the engine.
    Acceptor = 2,
}

/// Qualifier on an engine `Logon` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum LogonStatus {
    /// A new logon on a connection this library owns.
    New = 1,
    /// Informational: a session exists elsewhere; no ownership change.
    LibraryNotification = 2,
}

/// Why a connection was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum DisconnectReason {
    /// The remote peer closed the connection.
    RemoteDisconnect = 1,
    /// The application requested the disconnect.
    ApplicationDisconnect = 2,
    /// The owning library disconnected it.
    LibraryDisconnect = 3,
    /// The engine is shutting down.
    EngineShutdown = 4,
    /// An unexpected error tore the connection down.
    Exception = 5,
    /// The consumer could not keep up with its outbound flow.
    SlowConsumer = 6,
}

/// Outcome of a release-session or request-session operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum SessionReplyStatus {
    /// The operation succeeded.
    Ok = 1,
    /// The engine does not know the referenced session.
    UnknownSession = 2,
    /// Another library owns the session.
    OtherSessionOwner = 3,
    /// The session is not currently logged on.
    SessionNotLoggedOn = 4,
    /// The engine is not connected to this library.
    GatewayNotConnected = 5,
}

/// How initial sequence numbers are chosen for an initiated session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum SequenceNumberType {
    /// Sequence numbers reset on every logon.
    Transient = 1,
    /// Sequence numbers continue across logons.
    Persistent = 2,
    /// The caller supplied an explicit initial sequence number.
    Determined = 3,
}

/// Application-level state of a FIX session.
///
/// Carried in `ManageConnection` and `ReleaseSession` messages; the codes are
/// part of the control protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum SessionState {
    /// TCP connect in progress.
    Connecting = 1,
    /// Connected, logon not yet exchanged.
    Connected = 2,
    /// Logon sent, awaiting acknowledgement.
    SentLogon = 3,
    /// Logon exchanged; the session is live.
    Active = 4,
    /// Logout sent, awaiting confirmation.
    AwaitingLogout = 5,
    /// The connection is gone.
    Disconnected = 6,
}

impl SessionState {
    /// Checks whether the session still has a live connection.
    #[must_use]
    pub const fn is_connected(self) -> bool {
        !matches!(self, Self::Connecting | Self::Disconnected)
    }
}

/// One fragment on the library/engine transport.
///
/// Variants mirror the control protocol: the first group is published by
/// libraries, the rest by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryMessage {
    /// Library handshake; the engine answers with heartbeats.
    LibraryConnect {
        library_id: LibraryId,
        correlation_id: CorrelationId,
    },

    /// Ask the engine to dial out and create an initiator session.
    InitiateConnection {
        library_id: LibraryId,
        host: String,
        port: u16,
        sender_comp_id: String,
        sender_sub_id: String,
        sender_location_id: String,
        target_comp_id: String,
        sequence_number_type: SequenceNumberType,
        initial_sequence_number: i32,
        username: String,
        password: String,
        heartbeat_interval_s: u32,
        correlation_id: CorrelationId,
    },

    /// Hand a session's state machine back to the engine.
    ReleaseSession {
        library_id: LibraryId,
        connection_id: ConnectionId,
        correlation_id: CorrelationId,
        state: SessionState,
        heartbeat_interval_ms: u64,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        username: String,
        password: String,
    },

    /// Ask the engine to transfer ownership of a session to this library.
    RequestSession {
        library_id: LibraryId,
        session_id: FixSessionId,
        correlation_id: CorrelationId,
        last_received_sequence_number: i32,
    },

    /// Engine assigns a connection (and its session) to a library.
    ManageConnection {
        library_id: LibraryId,
        connection_id: ConnectionId,
        session_id: FixSessionId,
        connection_type: ConnectionType,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        /// Peer address as `host:port`, optionally with a leading `/`.
        address: String,
        state: SessionState,
        heartbeat_interval_s: u32,
        reply_to_id: CorrelationId,
    },

    /// A logon completed on a connection, or a session-exists notification.
    Logon {
        library_id: LibraryId,
        connection_id: ConnectionId,
        session_id: FixSessionId,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        status: LogonStatus,
        sender_comp_id: String,
        sender_sub_id: String,
        sender_location_id: String,
        target_comp_id: String,
        username: String,
        password: String,
    },

    /// A FIX message, flowing in either direction.
    FixMessage {
        library_id: LibraryId,
        connection_id: ConnectionId,
        session_id: FixSessionId,
        /// Packed FIX MsgType characters.
        message_type: i32,
        sequence_index: i32,
        timestamp_ns: u64,
        /// Stream position of the fragment in the durable archive.
        position: u64,
        body: Bytes,
    },

    /// A connection was torn down.
    Disconnect {
        library_id: LibraryId,
        connection_id: ConnectionId,
        reason: DisconnectReason,
    },

    /// Advisory: a session's outbound flow fell behind, or recovered.
    SlowStatus {
        library_id: LibraryId,
        connection_id: ConnectionId,
        has_become_slow: bool,
    },

    /// Engine-reported error, optionally correlated to a request.
    Error {
        library_id: LibraryId,
        error_kind: GatewayErrorKind,
        reply_to_id: CorrelationId,
        message: String,
    },

    /// Control-plane liveness signal.
    ApplicationHeartbeat { library_id: LibraryId },

    /// Reply to a `ReleaseSession` request.
    ReleaseSessionReply {
        library_id: LibraryId,
        reply_to_id: CorrelationId,
        status: SessionReplyStatus,
    },

    /// Reply to a `RequestSession` request.
    RequestSessionReply {
        library_id: LibraryId,
        reply_to_id: CorrelationId,
        status: SessionReplyStatus,
    },

    /// The next `message_count` FIX messages on a connection are replayed.
    Catchup {
        library_id: LibraryId,
        connection_id: ConnectionId,
        message_count: u32,
    },

    /// The engine advanced its sent position for this library.
    NewSentPosition { library_id: LibraryId, position: u64 },

    /// The addressed engine node is not the leader; `library_channel` names
    /// the claimed leader, or is empty if unknown.
    NotLeader {
        library_id: LibraryId,
        reply_to_id: CorrelationId,
        library_channel: String,
    },

    /// Authoritative set of session ids this library owns.
    ControlNotification {
        library_id: LibraryId,
        session_ids: Vec<FixSessionId>,
    },
}

impl LibraryMessage {
    /// Returns the library id the message is addressed to or sent by.
    #[must_use]
    pub fn library_id(&self) -> LibraryId {
        match self {
            Self::LibraryConnect { library_id, .. }
            | Self::InitiateConnection { library_id, .. }
            | Self::ReleaseSession { library_id, .. }
            | Self::RequestSession { library_id, .. }
            | Self::ManageConnection { library_id, .. }
            | Self::Logon { library_id, .. }
            | Self::FixMessage { library_id, .. }
            | Self::Disconnect { library_id, .. }
            | Self::SlowStatus { library_id, .. }
            | Self::Error { library_id, .. }
            | Self::ApplicationHeartbeat { library_id }
            | Self::ReleaseSessionReply { library_id, .. }
            | Self::RequestSessionReply { library_id, .. }
            | Self::Catchup { library_id, .. }
            | Self::NewSentPosition { library_id, .. }
            | Self::NotLeader { library_id, .. }
            | Self::ControlNotification { library_id, .. } => *library_id,
        }
    }
}
