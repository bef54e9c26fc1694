/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FerroFix Library
//!
//! The client-side connector for a FIX gateway engine.
//!
//! A [`FixLibrary`] owns the FIX sessions mapped to it by the engine and
//! drives their application-level state from a single-threaded cooperative
//! poll loop. The engine owns the TCP sockets and the durable archive; the
//! library talks to it over a controlled-flow publish/subscribe transport.
//!
//! ## Threading
//!
//! The caller provides the thread. The library never spawns one, never
//! blocks on I/O, and runs every user callback inside `poll`. The only
//! bounded busy-wait is `connect`, which returns once the engine heartbeats
//! or fails fast after the reconnect budget.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrofix_library::{FixLibrary, LibraryConfiguration, SessionConfiguration};
//! use ferrofix_core::types::LibraryId;
//!
//! let configuration = LibraryConfiguration::new(
//!     LibraryId::new(7),
//!     vec!["aeron:udp?endpoint=engine:9999".to_string()],
//! );
//! let mut library = FixLibrary::connect(configuration, transport)?;
//!
//! let reply = library.initiate(
//!     SessionConfiguration::new("localhost", 9000, "INIT", "ACC")?,
//! )?;
//! while reply.is_executing() {
//!     library.poll(10)?;
//! }
//! ```

pub mod config;
pub mod handlers;
pub mod liveness;
pub mod poller;
pub mod proxy;
pub mod registry;
pub mod replies;
pub mod session;
pub mod subscriber;
pub mod tracker;

pub use config::{LibraryConfiguration, SessionConfiguration};
pub use handlers::{
    GatewayErrorHandler, LibraryConnectHandler, SentPositionHandler, SessionAcquireHandler,
    SessionExistsHandler, SessionHandler,
};
pub use liveness::LivenessDetector;
pub use poller::LibraryPoller;
pub use registry::SessionRegistry;
pub use replies::{Reply, ReplyState};
pub use session::{SharedSession, Session};
pub use subscriber::SessionSubscriber;
pub use tracker::ReplyTracker;

use ferrofix_core::clock::{EpochClock, SystemEpochClock};
use ferrofix_core::error::LibraryError;
use ferrofix_core::types::{CorrelationId, FixSessionId, LibraryId};
use ferrofix_transport::{LibraryTransport, SessionReplyStatus};
use std::rc::Rc;

/// The user-facing library facade.
///
/// Thin wrapper over [`LibraryPoller`]; construction performs the blocking
/// connect so an existing `FixLibrary` is always one that reached an engine
/// at least once.
pub struct FixLibrary {
    poller: LibraryPoller,
}

impl std::fmt::Debug for FixLibrary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixLibrary").finish_non_exhaustive()
    }
}

impl FixLibrary {
    /// Connects to one of the configured engines using the system clock.
    ///
    /// # Errors
    /// Configuration validation errors, or a fatal connect failure after the
    /// reconnect budget is spent.
    pub fn connect(
        configuration: LibraryConfiguration,
        transport: Box<dyn LibraryTransport>,
    ) -> Result<Self, LibraryError> {
        Self::connect_with_clock(configuration, transport, Rc::new(SystemEpochClock))
    }

    /// Connects with an explicit clock; used by deterministic tests.
    ///
    /// # Errors
    /// Configuration validation errors, or a fatal connect failure after the
    /// reconnect budget is spent.
    pub fn connect_with_clock(
        configuration: LibraryConfiguration,
        transport: Box<dyn LibraryTransport>,
        clock: Rc<dyn EpochClock>,
    ) -> Result<Self, LibraryError> {
        configuration.validate()?;
        let mut poller = LibraryPoller::new(configuration, transport, clock);
        poller.connect()?;
        Ok(Self { poller })
    }

    /// One poller tick; see [`LibraryPoller::poll`].
    ///
    /// # Errors
    /// [`LibraryError::Closed`] after `close`, or a fatal clustered
    /// reconnect failure.
    pub fn poll(&mut self, fragment_limit: usize) -> Result<usize, LibraryError> {
        self.poller.poll(fragment_limit)
    }

    /// Begins initiating a new session; resolves to the owned session.
    ///
    /// # Errors
    /// [`LibraryError::Closed`] after `close`.
    pub fn initiate(
        &mut self,
        configuration: SessionConfiguration,
    ) -> Result<Reply<SharedSession>, LibraryError> {
        self.poller.initiate(configuration)
    }

    /// Begins releasing a session back to the engine.
    ///
    /// # Errors
    /// [`LibraryError::Closed`] after `close`.
    pub fn release_to_gateway(
        &mut self,
        session: &SharedSession,
    ) -> Result<Reply<SessionReplyStatus>, LibraryError> {
        self.poller.release_to_gateway(session)
    }

    /// Begins requesting ownership of an engine-held session.
    ///
    /// # Errors
    /// [`LibraryError::Closed`] after `close`.
    pub fn request_session(
        &mut self,
        session_id: FixSessionId,
        last_received_sequence_number: i32,
    ) -> Result<Reply<SessionReplyStatus>, LibraryError> {
        self.poller
            .request_session(session_id, last_received_sequence_number)
    }

    /// Returns the owned sessions in insertion order.
    #[must_use]
    pub fn sessions(&self) -> &[SharedSession] {
        self.poller.sessions()
    }

    /// Checks whether the engine is currently considered up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.poller.is_connected()
    }

    /// Returns this library's id.
    #[must_use]
    pub fn library_id(&self) -> LibraryId {
        self.poller.library_id()
    }

    /// Returns the engine channel currently in use.
    #[must_use]
    pub fn current_channel(&self) -> &str {
        self.poller.current_channel()
    }

    /// Returns the correlation id of the most recent connect handshake.
    #[must_use]
    pub fn connect_correlation_id(&self) -> CorrelationId {
        self.poller.connect_correlation_id()
    }

    /// Closes the library, disabling every owned session.
    ///
    /// # Panics
    /// Panics if called twice; closing a closed library is a programmer
    /// error.
    pub fn close(&mut self) {
        self.poller.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrofix_core::clock::ManualEpochClock;
    use ferrofix_transport::{LibraryMessage, MemoryTransport};

    #[test]
    fn test_connect_validates_configuration() {
        let transport = MemoryTransport::new(16);
        let configuration = LibraryConfiguration::new(LibraryId::new(0), vec!["a".to_string()]);
        let err = FixLibrary::connect_with_clock(
            configuration,
            Box::new(transport),
            Rc::new(ManualEpochClock::new(0)),
        )
        .unwrap_err();
        assert!(matches!(err, LibraryError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_facade_connects_and_polls() {
        let mut transport = MemoryTransport::new(16);
        let engine = transport.engine_handle("engine-a");
        engine
            .publish(LibraryMessage::ApplicationHeartbeat {
                library_id: LibraryId::new(7),
            })
            .unwrap();

        let configuration =
            LibraryConfiguration::new(LibraryId::new(7), vec!["engine-a".to_string()])
                .with_reply_timeout_ms(100);
        let mut library = FixLibrary::connect_with_clock(
            configuration,
            Box::new(transport),
            Rc::new(ManualEpochClock::new(0)),
        )
        .unwrap();

        assert!(library.is_connected());
        assert_eq!(library.library_id(), LibraryId::new(7));
        assert_eq!(library.current_channel(), "engine-a");
        assert_eq!(library.poll(10).unwrap(), 0);
    }
}
