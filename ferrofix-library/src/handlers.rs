/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! User callback interfaces.
//!
//! All callbacks run on the poller thread, synchronously with the `poll`
//! call that observed the triggering fragment. Callbacks must not reenter
//! library methods.

use crate::session::SharedSession;
use ferrofix_core::error::GatewayErrorKind;
use ferrofix_core::types::{FixSessionId, LibraryId};
use ferrofix_transport::{Action, DisconnectReason};

/// Per-session callback interface, bound when a session is acquired.
pub trait SessionHandler {
    /// Called for every FIX message delivered on the session.
    ///
    /// # Arguments
    /// * `body` - The raw FIX message bytes
    /// * `session` - The owning session
    /// * `sequence_index` - Sequence index of the message
    /// * `message_type` - Packed FIX MsgType characters
    /// * `timestamp_ns` - Receive timestamp in epoch nanoseconds
    /// * `position` - Archive stream position of the fragment
    ///
    /// # Returns
    /// [`Action::Abort`] to back-pressure; the fragment is redelivered.
    #[allow(clippy::too_many_arguments)]
    fn on_message(
        &mut self,
        body: &[u8],
        session: &SharedSession,
        sequence_index: i32,
        message_type: i32,
        timestamp_ns: u64,
        position: u64,
    ) -> Action;

    /// Called when the engine reports this library timed out on the session.
    fn on_timeout(&mut self, library_id: LibraryId, session: &SharedSession) {
        let _ = (library_id, session);
    }

    /// Called when the engine flags the session's outbound flow as slow or
    /// recovered.
    fn on_slow_status(&mut self, library_id: LibraryId, session: &SharedSession, has_become_slow: bool) {
        let _ = (library_id, session, has_become_slow);
    }

    /// Called when the session's connection is torn down.
    ///
    /// # Returns
    /// [`Action::Abort`] to back-pressure; the disconnect is redelivered and
    /// the session stays registered until `Continue` is returned.
    fn on_disconnect(
        &mut self,
        library_id: LibraryId,
        session: &SharedSession,
        reason: DisconnectReason,
    ) -> Action {
        let _ = (library_id, session, reason);
        Action::Continue
    }
}

/// Invoked when a session becomes owned by this library.
pub trait SessionAcquireHandler {
    /// Returns the handler to bind to the acquired session.
    fn on_session_acquired(&mut self, session: SharedSession) -> Box<dyn SessionHandler>;
}

/// Invoked when the engine notifies of a session owned elsewhere.
pub trait SessionExistsHandler {
    /// Reports a session that exists on the engine without an ownership
    /// change.
    #[allow(clippy::too_many_arguments)]
    fn on_session_exists(
        &mut self,
        session_id: FixSessionId,
        sender_comp_id: &str,
        sender_sub_id: &str,
        sender_location_id: &str,
        target_comp_id: &str,
        username: &str,
        password: &str,
    );
}

/// Invoked when the engine advances its sent position for this library.
pub trait SentPositionHandler {
    /// Reports the new sent position.
    fn on_send_completed(&mut self, position: u64) -> Action;
}

/// Invoked for gateway errors not owned by an outstanding reply.
pub trait GatewayErrorHandler {
    /// Reports a gateway error.
    fn on_error(&mut self, kind: GatewayErrorKind, library_id: LibraryId, message: &str) -> Action;
}

/// Invoked when the control-plane connection is established or lost.
pub trait LibraryConnectHandler {
    /// The library connected to an engine.
    fn on_connect(&mut self) {}

    /// The library lost its engine connection.
    fn on_disconnect(&mut self) {}
}

/// No-op session-exists handler.
#[derive(Debug, Default)]
pub struct NoOpSessionExistsHandler;

impl SessionExistsHandler for NoOpSessionExistsHandler {
    fn on_session_exists(
        &mut self,
        _session_id: FixSessionId,
        _sender_comp_id: &str,
        _sender_sub_id: &str,
        _sender_location_id: &str,
        _target_comp_id: &str,
        _username: &str,
        _password: &str,
    ) {
    }
}

/// Sent-position handler that always continues.
#[derive(Debug, Default)]
pub struct NoOpSentPositionHandler;

impl SentPositionHandler for NoOpSentPositionHandler {
    fn on_send_completed(&mut self, _position: u64) -> Action {
        Action::Continue
    }
}

/// Error handler that logs and continues.
#[derive(Debug, Default)]
pub struct LoggingGatewayErrorHandler;

impl GatewayErrorHandler for LoggingGatewayErrorHandler {
    fn on_error(&mut self, kind: GatewayErrorKind, library_id: LibraryId, message: &str) -> Action {
        tracing::error!(%kind, %library_id, message, "gateway error");
        Action::Continue
    }
}

/// No-op connect handler.
#[derive(Debug, Default)]
pub struct NoOpLibraryConnectHandler;

impl LibraryConnectHandler for NoOpLibraryConnectHandler {}

/// Acquire handler that binds a no-op session handler.
#[derive(Debug, Default)]
pub struct NoOpSessionAcquireHandler;

struct NoOpSessionHandler;

impl SessionHandler for NoOpSessionHandler {
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
}

impl SessionAcquireHandler for NoOpSessionAcquireHandler {
    fn on_session_acquired(&mut self, _session: SharedSession) -> Box<dyn SessionHandler> {
        Box::new(NoOpSessionHandler)
    }
}
