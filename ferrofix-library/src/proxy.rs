/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Outbound path of one session.
//!
//! A [`SessionProxy`] is held by its session and publishes frames through the
//! shared outbound publication directly, never through the library, so the
//! session/library ownership stays acyclic.

use bytes::Bytes;
use ferrofix_core::clock::EpochClock;
use ferrofix_core::types::{ConnectionId, FixSessionId, LibraryId, Timestamp};
use ferrofix_transport::{GatewayPublication, PublishError};
use std::rc::Rc;

/// Packed MsgType of a FIX Heartbeat (`35=0`).
pub const HEARTBEAT_MESSAGE_TYPE: i32 = b'0' as i32;

/// Publishes session-originated frames onto the outbound stream.
pub struct SessionProxy {
    library_id: LibraryId,
    connection_id: ConnectionId,
    session_id: FixSessionId,
    publication: GatewayPublication,
    clock: Rc<dyn EpochClock>,
}

impl SessionProxy {
    /// Creates a proxy for one connection.
    #[must_use]
    pub fn new(
        library_id: LibraryId,
        connection_id: ConnectionId,
        publication: GatewayPublication,
        clock: Rc<dyn EpochClock>,
    ) -> Self {
        Self {
            library_id,
            connection_id,
            session_id: FixSessionId::default(),
            publication,
            clock,
        }
    }

    /// Binds the engine-assigned session surrogate.
    pub fn set_session_id(&mut self, session_id: FixSessionId) {
        self.session_id = session_id;
    }

    /// Publishes an encoded FIX message for this session.
    ///
    /// # Arguments
    /// * `message_type` - Packed FIX MsgType characters
    /// * `sequence_index` - Current sequence index of the session
    /// * `body` - The encoded message bytes
    pub fn send_message(
        &self,
        message_type: i32,
        sequence_index: i32,
        body: Bytes,
    ) -> Result<u64, PublishError> {
        let timestamp_ns = Timestamp::from_millis(self.clock.time_ms()).as_nanos();
        self.publication.save_fix_message(
            self.library_id,
            self.connection_id,
            self.session_id,
            message_type,
            sequence_index,
            timestamp_ns,
            body,
        )
    }

    /// Publishes a heartbeat frame for this session.
    pub fn send_heartbeat(&self, sequence_index: i32) -> Result<u64, PublishError> {
        self.send_message(HEARTBEAT_MESSAGE_TYPE, sequence_index, Bytes::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrofix_core::clock::ManualEpochClock;
    use ferrofix_transport::{LibraryMessage, LibraryTransport, MemoryTransport};

    #[test]
    fn test_proxy_publishes_fix_frames() {
        let mut transport = MemoryTransport::new(8);
        transport.init_streams("a");
        let clock = Rc::new(ManualEpochClock::new(1_000));
        let mut proxy = SessionProxy::new(
            LibraryId::new(7),
            ConnectionId::new(42),
            GatewayPublication::new(transport.outbound_publication()),
            clock,
        );
        proxy.set_session_id(FixSessionId::new(1001));

        proxy.send_heartbeat(0).unwrap();

        let outbound = transport.engine_handle("a").drain_outbound();
        assert_eq!(outbound.len(), 1);
        match &outbound[0] {
            LibraryMessage::FixMessage {
                connection_id,
                session_id,
                message_type,
                timestamp_ns,
                ..
            } => {
                assert_eq!(*connection_id, ConnectionId::new(42));
                assert_eq!(*session_id, FixSessionId::new(1001));
                assert_eq!(*message_type, HEARTBEAT_MESSAGE_TYPE);
                assert_eq!(*timestamp_ns, 1_000_000_000);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }
}
