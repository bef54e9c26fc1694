/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FerroFix Transport
//!
//! Controlled-flow publish/subscribe transport abstraction between a library
//! connector and a gateway engine.
//!
//! The engine owns the sockets; libraries talk to it over a log-structured
//! message transport in which every accepted publication is assigned a
//! monotonically increasing stream position. This crate defines:
//! - **The message model**: [`LibraryMessage`] and its wire enums
//! - **The seams**: [`Subscription`], [`Publication`], [`LibraryTransport`]
//! - **Flow control**: [`Action`] for back-pressured inbound handling and
//!   [`PublishError`] for back-pressured outbound publication
//! - **An in-memory implementation** for tests and single-process runs

pub mod memory;
pub mod messages;

pub use memory::{EngineHandle, InboundFeeder, MemoryTransport};
pub use messages::{
    ConnectionType, DisconnectReason, LibraryMessage, LogonStatus, SequenceNumberType,
    SessionReplyStatus, SessionState,
};

use ferrofix_core::types::{ConnectionId, CorrelationId, FixSessionId, LibraryId};
use std::cell::RefCell;
use std::rc::Rc;

/// Flow-control disposition returned by fragment handlers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// The fragment was consumed; advance past it.
    Continue,
    /// The handler is back-pressured; the transport must redeliver this
    /// fragment on the next poll. Handlers returning `Abort` must be
    /// idempotent for the aborted fragment.
    Abort,
}

/// Receiver of inbound fragments during a controlled poll.
pub trait FragmentHandler {
    /// Handles one fragment and reports its flow-control disposition.
    fn on_fragment(&mut self, message: &LibraryMessage) -> Action;
}

/// Inbound side of a transport stream.
pub trait Subscription {
    /// Drains up to `fragment_limit` fragments into `handler`, preserving
    /// publication order. A fragment answered with [`Action::Abort`] is not
    /// consumed and ends the poll.
    ///
    /// # Returns
    /// The number of fragments consumed.
    fn controlled_poll(&mut self, handler: &mut dyn FragmentHandler, fragment_limit: usize)
        -> usize;
}

/// Reasons a publication was not accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishError {
    /// The stream buffer is full; retry later.
    BackPressured,
    /// The stream has no connected consumer.
    NotConnected,
}

/// Outbound side of a transport stream.
pub trait Publication {
    /// Offers one message to the stream.
    ///
    /// # Returns
    /// The stream position past the accepted message, or a [`PublishError`]
    /// when the caller must retry or give up.
    fn try_publish(&mut self, message: LibraryMessage) -> Result<u64, PublishError>;

    /// Returns the position past the last accepted message.
    fn position(&self) -> u64;
}

/// Shared handle to a publication.
///
/// The connector is single-threaded by contract; sessions, proxies, and the
/// poller alias the same outbound stream through this handle.
pub type SharedPublication = Rc<RefCell<dyn Publication>>;

/// Factory for the stream pair bound to one engine channel.
///
/// `init_streams` is invoked on first connect and, when engines are
/// clustered, on every reconnect (the channel may have changed).
pub trait LibraryTransport {
    /// Binds (or rebinds) the stream pair to `channel`.
    fn init_streams(&mut self, channel: &str);

    /// Checks whether `init_streams` has been called before.
    fn is_reconnect(&self) -> bool;

    /// Returns a fresh inbound subscription for the bound channel.
    fn inbound_subscription(&mut self) -> Box<dyn Subscription>;

    /// Returns the shared outbound publication for the bound channel.
    fn outbound_publication(&mut self) -> SharedPublication;
}

/// Typed writer of library-originated control messages.
///
/// Thin wrapper over a [`SharedPublication`] that knows how to frame each
/// outbound request.
#[derive(Clone)]
pub struct GatewayPublication {
    publication: SharedPublication,
}

impl GatewayPublication {
    /// Wraps a shared publication.
    #[must_use]
    pub fn new(publication: SharedPublication) -> Self {
        Self { publication }
    }

    /// Returns the underlying shared publication.
    #[must_use]
    pub fn inner(&self) -> SharedPublication {
        Rc::clone(&self.publication)
    }

    /// Publishes the library handshake.
    pub fn save_library_connect(
        &self,
        library_id: LibraryId,
        correlation_id: CorrelationId,
    ) -> Result<u64, PublishError> {
        self.publication
            .borrow_mut()
            .try_publish(LibraryMessage::LibraryConnect {
                library_id,
                correlation_id,
            })
    }

    /// Publishes a control-plane liveness heartbeat.
    pub fn save_application_heartbeat(&self, library_id: LibraryId) -> Result<u64, PublishError> {
        self.publication
            .borrow_mut()
            .try_publish(LibraryMessage::ApplicationHeartbeat { library_id })
    }

    /// Publishes an initiate-connection request.
    #[allow(clippy::too_many_arguments)]
    pub fn save_initiate_connection(
        &self,
        library_id: LibraryId,
        host: &str,
        port: u16,
        sender_comp_id: &str,
        sender_sub_id: &str,
        sender_location_id: &str,
        target_comp_id: &str,
        sequence_number_type: SequenceNumberType,
        initial_sequence_number: i32,
        username: &str,
        password: &str,
        heartbeat_interval_s: u32,
        correlation_id: CorrelationId,
    ) -> Result<u64, PublishError> {
        self.publication
            .borrow_mut()
            .try_publish(LibraryMessage::InitiateConnection {
                library_id,
                host: host.to_string(),
                port,
                sender_comp_id: sender_comp_id.to_string(),
                sender_sub_id: sender_sub_id.to_string(),
                sender_location_id: sender_location_id.to_string(),
                target_comp_id: target_comp_id.to_string(),
                sequence_number_type,
                initial_sequence_number,
                username: username.to_string(),
                password: password.to_string(),
                heartbeat_interval_s,
                correlation_id,
            })
    }

    /// Publishes a release-session request.
    #[allow(clippy::too_many_arguments)]
    pub fn save_release_session(
        &self,
        library_id: LibraryId,
        connection_id: ConnectionId,
        correlation_id: CorrelationId,
        state: SessionState,
        heartbeat_interval_ms: u64,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        username: &str,
        password: &str,
    ) -> Result<u64, PublishError> {
        self.publication
            .borrow_mut()
            .try_publish(LibraryMessage::ReleaseSession {
                library_id,
                connection_id,
                correlation_id,
                state,
                heartbeat_interval_ms,
                last_sent_sequence_number,
                last_received_sequence_number,
                username: username.to_string(),
                password: password.to_string(),
            })
    }

    /// Publishes a request-session request.
    pub fn save_request_session(
        &self,
        library_id: LibraryId,
        session_id: FixSessionId,
        correlation_id: CorrelationId,
        last_received_sequence_number: i32,
    ) -> Result<u64, PublishError> {
        self.publication
            .borrow_mut()
            .try_publish(LibraryMessage::RequestSession {
                library_id,
                session_id,
                correlation_id,
                last_received_sequence_number,
            })
    }

    /// Publishes an outbound FIX message frame.
    #[allow(clippy::too_many_arguments)]
    pub fn save_fix_message(
        &self,
        library_id: LibraryId,
        connection_id: ConnectionId,
        session_id: FixSessionId,
        message_type: i32,
        sequence_index: i32,
        timestamp_ns: u64,
        body: bytes::Bytes,
    ) -> Result<u64, PublishError> {
        let mut publication = self.publication.borrow_mut();
        let position = publication.position();
        publication.try_publish(LibraryMessage::FixMessage {
            library_id,
            connection_id,
            session_id,
            message_type,
            sequence_index,
            timestamp_ns,
            position,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingHandler {
        seen: usize,
        abort_at: Option<usize>,
    }

    impl FragmentHandler for CountingHandler {
        fn on_fragment(&mut self, _message: &LibraryMessage) -> Action {
            if Some(self.seen) == self.abort_at {
                return Action::Abort;
            }
            self.seen += 1;
            Action::Continue
        }
    }

    #[test]
    fn test_gateway_publication_save_library_connect() {
        let mut transport = MemoryTransport::new(16);
        transport.init_streams("engine-a");
        let publication = GatewayPublication::new(transport.outbound_publication());

        let position = publication
            .save_library_connect(LibraryId::new(1), CorrelationId::new(42))
            .unwrap();
        assert!(position > 0);

        let engine = transport.engine_handle("engine-a");
        let outbound = engine.drain_outbound();
        assert_eq!(outbound.len(), 1);
        assert!(matches!(
            outbound[0],
            LibraryMessage::LibraryConnect {
                correlation_id: CorrelationId(42),
                ..
            }
        ));
    }

    #[test]
    fn test_controlled_poll_respects_abort() {
        let mut transport = MemoryTransport::new(16);
        transport.init_streams("engine-a");
        let engine = transport.engine_handle("engine-a");
        for _ in 0..3 {
            engine
                .publish(LibraryMessage::ApplicationHeartbeat {
                    library_id: LibraryId::new(1),
                })
                .unwrap();
        }

        let mut subscription = transport.inbound_subscription();
        let mut handler = CountingHandler {
            seen: 0,
            abort_at: Some(1),
        };
        let consumed = subscription.controlled_poll(&mut handler, 10);
        assert_eq!(consumed, 1);

        // The aborted fragment is redelivered.
        let mut handler = CountingHandler {
            seen: 0,
            abort_at: None,
        };
        let consumed = subscription.controlled_poll(&mut handler, 10);
        assert_eq!(consumed, 2);
    }
}
