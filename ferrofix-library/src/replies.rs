/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Operation reply handles.
//!
//! `initiate`, `release_to_gateway`, and `request_session` return a
//! [`Reply`] the caller polls. The tracker-side [`PendingReply`] owns the
//! outbound request (retried under back-pressure until accepted or timed
//! out), the deadline, and the resolution slot. A reply reaches exactly one
//! terminal state and is then dropped from the tracker.

use crate::config::SessionConfiguration;
use crate::session::SharedSession;
use ferrofix_core::error::GatewayErrorKind;
use ferrofix_core::types::{ConnectionId, CorrelationId, FixSessionId, LibraryId};
use ferrofix_transport::{GatewayPublication, SessionReplyStatus, SessionState};
use std::cell::RefCell;
use std::rc::Rc;
use tracing::debug;

/// Resolution state of an outstanding operation.
#[derive(Debug, Clone)]
pub enum ReplyState<T> {
    /// The request is outstanding.
    Executing,
    /// The engine completed the operation.
    Completed(T),
    /// The engine answered with an error.
    Errored {
        /// The wire-level error kind.
        kind: GatewayErrorKind,
        /// Human-readable detail from the engine.
        message: String,
    },
    /// No reply arrived before the deadline.
    TimedOut,
}

type SharedState<T> = Rc<RefCell<ReplyState<T>>>;

/// Caller-side handle to an outstanding operation.
///
/// Resolution happens on the poller thread during `poll`; the caller
/// observes it by polling the handle between ticks.
#[derive(Debug, Clone)]
pub struct Reply<T> {
    state: SharedState<T>,
}

impl<T> Reply<T> {
    fn new() -> (Self, SharedState<T>) {
        let state = Rc::new(RefCell::new(ReplyState::Executing));
        (
            Self {
                state: Rc::clone(&state),
            },
            state,
        )
    }

    /// Checks whether the operation is still outstanding.
    #[must_use]
    pub fn is_executing(&self) -> bool {
        matches!(*self.state.borrow(), ReplyState::Executing)
    }

    /// Checks whether the operation completed successfully.
    #[must_use]
    pub fn has_completed(&self) -> bool {
        matches!(*self.state.borrow(), ReplyState::Completed(_))
    }

    /// Checks whether the engine answered with an error.
    #[must_use]
    pub fn has_errored(&self) -> bool {
        matches!(*self.state.borrow(), ReplyState::Errored { .. })
    }

    /// Checks whether the reply deadline passed without resolution.
    #[must_use]
    pub fn has_timed_out(&self) -> bool {
        matches!(*self.state.borrow(), ReplyState::TimedOut)
    }

    /// Returns the error, when the reply errored.
    #[must_use]
    pub fn error(&self) -> Option<(GatewayErrorKind, String)> {
        match &*self.state.borrow() {
            ReplyState::Errored { kind, message } => Some((*kind, message.clone())),
            _ => None,
        }
    }
}

impl<T: Clone> Reply<T> {
    /// Returns the result, when the reply completed.
    #[must_use]
    pub fn result(&self) -> Option<T> {
        match &*self.state.borrow() {
            ReplyState::Completed(value) => Some(value.clone()),
            _ => None,
        }
    }
}

/// Discriminates the operation a pending reply belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyKind {
    /// An initiate-session operation.
    Initiate,
    /// A release-to-gateway operation.
    Release,
    /// A request-session operation.
    Request,
}

/// The outbound request a pending reply still has to publish.
pub(crate) enum ReplyRequest {
    Initiate(SessionConfiguration),
    Release {
        connection_id: ConnectionId,
        state: SessionState,
        heartbeat_interval_ms: u64,
        last_sent_sequence_number: i32,
        last_received_sequence_number: i32,
        username: String,
        password: String,
    },
    Request {
        session_id: FixSessionId,
        last_received_sequence_number: i32,
    },
}

enum ReplySlot {
    Initiate(SharedState<SharedSession>),
    Release(SharedState<SessionReplyStatus>),
    Request(SharedState<SessionReplyStatus>),
}

impl ReplySlot {
    fn is_terminal(&self) -> bool {
        match self {
            Self::Initiate(state) => !matches!(*state.borrow(), ReplyState::Executing),
            Self::Release(state) | Self::Request(state) => {
                !matches!(*state.borrow(), ReplyState::Executing)
            }
        }
    }

    fn resolve_timed_out(&self) {
        match self {
            Self::Initiate(state) => *state.borrow_mut() = ReplyState::TimedOut,
            Self::Release(state) | Self::Request(state) => {
                *state.borrow_mut() = ReplyState::TimedOut;
            }
        }
    }

    fn resolve_errored(&self, kind: GatewayErrorKind, message: String) {
        match self {
            Self::Initiate(state) => *state.borrow_mut() = ReplyState::Errored { kind, message },
            Self::Release(state) | Self::Request(state) => {
                *state.borrow_mut() = ReplyState::Errored { kind, message };
            }
        }
    }
}

/// Tracker-side record of one outstanding operation.
pub(crate) struct PendingReply {
    correlation_id: CorrelationId,
    deadline_ms: u64,
    sent: bool,
    request: ReplyRequest,
    slot: ReplySlot,
}

impl PendingReply {
    /// Creates an initiate-session reply pair.
    pub(crate) fn initiate(
        correlation_id: CorrelationId,
        deadline_ms: u64,
        configuration: SessionConfiguration,
    ) -> (Reply<SharedSession>, Self) {
        let (reply, state) = Reply::new();
        (
            reply,
            Self {
                correlation_id,
                deadline_ms,
                sent: false,
                request: ReplyRequest::Initiate(configuration),
                slot: ReplySlot::Initiate(state),
            },
        )
    }

    /// Creates a release-to-gateway reply pair.
    pub(crate) fn release(
        correlation_id: CorrelationId,
        deadline_ms: u64,
        request: ReplyRequest,
    ) -> (Reply<SessionReplyStatus>, Self) {
        let (reply, state) = Reply::new();
        (
            reply,
            Self {
                correlation_id,
                deadline_ms,
                sent: false,
                request,
                slot: ReplySlot::Release(state),
            },
        )
    }

    /// Creates a request-session reply pair.
    pub(crate) fn request(
        correlation_id: CorrelationId,
        deadline_ms: u64,
        session_id: FixSessionId,
        last_received_sequence_number: i32,
    ) -> (Reply<SessionReplyStatus>, Self) {
        let (reply, state) = Reply::new();
        (
            reply,
            Self {
                correlation_id,
                deadline_ms,
                sent: false,
                request: ReplyRequest::Request {
                    session_id,
                    last_received_sequence_number,
                },
                slot: ReplySlot::Request(state),
            },
        )
    }

    /// Returns the correlation id the engine will echo.
    pub(crate) fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    /// Returns the operation kind.
    pub(crate) fn kind(&self) -> ReplyKind {
        match self.slot {
            ReplySlot::Initiate(_) => ReplyKind::Initiate,
            ReplySlot::Release(_) => ReplyKind::Release,
            ReplySlot::Request(_) => ReplyKind::Request,
        }
    }

    /// Returns the released connection id for a release reply.
    pub(crate) fn release_connection_id(&self) -> Option<ConnectionId> {
        match &self.request {
            ReplyRequest::Release { connection_id, .. } => Some(*connection_id),
            _ => None,
        }
    }

    /// Returns the initiating configuration for an initiate reply.
    pub(crate) fn configuration(&self) -> Option<&SessionConfiguration> {
        match &self.request {
            ReplyRequest::Initiate(configuration) => Some(configuration),
            _ => None,
        }
    }

    /// One tick of reply-side work: publish the request if still unsent,
    /// then enforce the deadline.
    ///
    /// # Returns
    /// `true` when the reply reached a terminal state and must be removed.
    pub(crate) fn poll(
        &mut self,
        now_ms: u64,
        library_id: LibraryId,
        default_heartbeat_interval_s: u32,
        publication: &GatewayPublication,
    ) -> bool {
        if self.slot.is_terminal() {
            return true;
        }
        if !self.sent {
            self.try_send(library_id, default_heartbeat_interval_s, publication);
        }
        if now_ms > self.deadline_ms {
            debug!(correlation_id = %self.correlation_id, "reply timed out");
            self.slot.resolve_timed_out();
            return true;
        }
        false
    }

    fn try_send(
        &mut self,
        library_id: LibraryId,
        default_heartbeat_interval_s: u32,
        publication: &GatewayPublication,
    ) {
        let result = match &self.request {
            ReplyRequest::Initiate(configuration) => publication.save_initiate_connection(
                library_id,
                configuration.host(),
                configuration.port(),
                configuration.sender_comp_id().as_str(),
                configuration.sender_sub_id(),
                configuration.sender_location_id(),
                configuration.target_comp_id().as_str(),
                configuration.sequence_number_type(),
                configuration.initial_sequence_number().unwrap_or(1),
                configuration.username(),
                configuration.password(),
                default_heartbeat_interval_s,
                self.correlation_id,
            ),
            ReplyRequest::Release {
                connection_id,
                state,
                heartbeat_interval_ms,
                last_sent_sequence_number,
                last_received_sequence_number,
                username,
                password,
            } => publication.save_release_session(
                library_id,
                *connection_id,
                self.correlation_id,
                *state,
                *heartbeat_interval_ms,
                *last_sent_sequence_number,
                *last_received_sequence_number,
                username,
                password,
            ),
            ReplyRequest::Request {
                session_id,
                last_received_sequence_number,
            } => publication.save_request_session(
                library_id,
                *session_id,
                self.correlation_id,
                *last_received_sequence_number,
            ),
        };
        // Back-pressure leaves `sent` false; the next tick retries until the
        // deadline resolves the reply as timed out.
        self.sent = result.is_ok();
    }

    /// Resolves an initiate reply with its session.
    pub(crate) fn on_complete_session(self, session: SharedSession) {
        match self.slot {
            ReplySlot::Initiate(state) => *state.borrow_mut() = ReplyState::Completed(session),
            _ => debug!(
                correlation_id = %self.correlation_id,
                "session completion for a non-initiate reply dropped"
            ),
        }
    }

    /// Resolves a release or request reply with its status.
    pub(crate) fn on_complete_status(self, status: SessionReplyStatus) {
        match self.slot {
            ReplySlot::Release(state) | ReplySlot::Request(state) => {
                *state.borrow_mut() = ReplyState::Completed(status);
            }
            ReplySlot::Initiate(_) => debug!(
                correlation_id = %self.correlation_id,
                "status completion for an initiate reply dropped"
            ),
        }
    }

    /// Resolves the reply with an engine-reported error.
    pub(crate) fn on_error(self, kind: GatewayErrorKind, message: String) {
        self.slot.resolve_errored(kind, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrofix_transport::{LibraryMessage, LibraryTransport, MemoryTransport};

    fn publication(transport: &mut MemoryTransport) -> GatewayPublication {
        GatewayPublication::new(transport.outbound_publication())
    }

    #[test]
    fn test_reply_starts_executing() {
        let config = SessionConfiguration::new("localhost", 9000, "INIT", "ACC").unwrap();
        let (reply, _pending) = PendingReply::initiate(CorrelationId::new(1), 100, config);
        assert!(reply.is_executing());
        assert!(!reply.has_completed());
        assert!(reply.result().is_none());
    }

    #[test]
    fn test_poll_sends_request_once() {
        let mut transport = MemoryTransport::new(8);
        transport.init_streams("a");
        let publication = publication(&mut transport);
        let config = SessionConfiguration::new("localhost", 9000, "INIT", "ACC").unwrap();
        let (_reply, mut pending) = PendingReply::initiate(CorrelationId::new(5), 100, config);

        assert!(!pending.poll(0, LibraryId::new(7), 10, &publication));
        assert!(!pending.poll(1, LibraryId::new(7), 10, &publication));

        let outbound = transport.engine_handle("a").drain_outbound();
        assert_eq!(outbound.len(), 1);
        match &outbound[0] {
            LibraryMessage::InitiateConnection {
                correlation_id,
                host,
                port,
                heartbeat_interval_s,
                ..
            } => {
                assert_eq!(*correlation_id, CorrelationId::new(5));
                assert_eq!(host, "localhost");
                assert_eq!(*port, 9000);
                assert_eq!(*heartbeat_interval_s, 10);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_back_pressured_request_retries_until_deadline() {
        let mut transport = MemoryTransport::new(1);
        transport.init_streams("a");
        let publication = publication(&mut transport);
        // Fill the stream so the request is back-pressured.
        publication
            .save_application_heartbeat(LibraryId::new(7))
            .unwrap();

        let config = SessionConfiguration::new("localhost", 9000, "INIT", "ACC").unwrap();
        let (reply, mut pending) = PendingReply::initiate(CorrelationId::new(5), 100, config);

        assert!(!pending.poll(0, LibraryId::new(7), 10, &publication));
        // Stream drains; the retry succeeds.
        let _ = transport.engine_handle("a").drain_outbound();
        assert!(!pending.poll(1, LibraryId::new(7), 10, &publication));
        assert_eq!(transport.engine_handle("a").drain_outbound().len(), 1);

        // Past the deadline the reply times out and is removed.
        assert!(pending.poll(101, LibraryId::new(7), 10, &publication));
        assert!(reply.has_timed_out());
    }

    #[test]
    fn test_exactly_one_terminal_state() {
        let mut transport = MemoryTransport::new(8);
        transport.init_streams("a");
        let publication = publication(&mut transport);
        let config = SessionConfiguration::new("localhost", 9000, "INIT", "ACC").unwrap();
        let (reply, mut pending) = PendingReply::initiate(CorrelationId::new(5), 100, config);

        assert!(pending.poll(101, LibraryId::new(7), 10, &publication));
        assert!(reply.has_timed_out());
        assert!(!reply.has_completed());
        assert!(!reply.has_errored());
    }

    #[test]
    fn test_error_resolution() {
        let config = SessionConfiguration::new("localhost", 9000, "INIT", "ACC").unwrap();
        let (reply, pending) = PendingReply::initiate(CorrelationId::new(5), 100, config);

        pending.on_error(GatewayErrorKind::DuplicateSession, "owned elsewhere".to_string());
        assert!(reply.has_errored());
        let (kind, message) = reply.error().unwrap();
        assert_eq!(kind, GatewayErrorKind::DuplicateSession);
        assert_eq!(message, "owned elsewhere");
    }

    #[test]
    fn test_request_session_reply_resolution() {
        let (reply, pending) =
            PendingReply::request(CorrelationId::new(9), 100, FixSessionId::new(1001), 12);
        assert_eq!(pending.kind(), ReplyKind::Request);

        pending.on_complete_status(SessionReplyStatus::Ok);
        assert_eq!(reply.result(), Some(SessionReplyStatus::Ok));
    }
}
