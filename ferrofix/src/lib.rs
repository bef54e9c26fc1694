/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FerroFix
//!
//! A FIX gateway library connector and replay index query engine for Rust.
//!
//! FerroFix splits a FIX deployment the way large gateways do: a separate
//! engine process owns the TCP sockets and a durable archive of all traffic,
//! while any number of library instances own subsets of the FIX sessions and
//! drive their application-level state machines. Engine and libraries talk
//! over a controlled-flow publish/subscribe transport in which every message
//! carries a monotonically increasing stream position.
//!
//! ## Features
//!
//! - **Single-threaded cooperative polling**: the caller owns the thread;
//!   the library never spawns one and never blocks on I/O
//! - **Clustered engines**: round-robin failover and leader redirection
//! - **Correlation-id futures**: asynchronous operations resolve typed
//!   reply handles on the poller thread
//! - **Lock-free replay index**: single-writer/multi-reader queries over a
//!   memory-mapped ring, with torn-read and lap detection
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ferrofix::prelude::*;
//!
//! let configuration = LibraryConfiguration::new(
//!     LibraryId::new(7),
//!     vec!["aeron:udp?endpoint=engine:9999".to_string()],
//! );
//! let mut library = FixLibrary::connect(configuration, transport)?;
//! let reply = library.initiate(
//!     SessionConfiguration::new("localhost", 9000, "INIT", "ACC")?,
//! )?;
//! while reply.is_executing() {
//!     library.poll(10)?;
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`core`]: identity types, clocks, idle strategies, and errors
//! - [`transport`]: the control-message model and pub/sub seams
//! - [`library`]: the library connector and its poller
//! - [`replay`]: the replay index writer and query engine

pub mod core {
    //! Identity types, clocks, idle strategies, and errors.
    pub use ferrofix_core::*;
}

pub mod transport {
    //! The control-message model and pub/sub seams.
    pub use ferrofix_transport::*;
}

pub mod library {
    //! The library connector and its poller.
    pub use ferrofix_library::*;
}

pub mod replay {
    //! The replay index writer and query engine.
    pub use ferrofix_replay::*;
}

/// Prelude module for convenient imports.
pub mod prelude {
    // Core types
    pub use ferrofix_core::{
        BackoffIdleStrategy, CompId, CompleteSessionId, ConnectionId, CorrelationId, EpochClock,
        FixSessionId, GatewayErrorKind, LibraryError, LibraryId, ReplayError, Result,
        SystemEpochClock, Timestamp,
    };

    // Transport
    pub use ferrofix_transport::{
        Action, ConnectionType, DisconnectReason, GatewayPublication, LibraryMessage,
        LibraryTransport, LogonStatus, MemoryTransport, PublishError, SessionReplyStatus,
        SessionState,
    };

    // Library
    pub use ferrofix_library::{
        FixLibrary, LibraryConfiguration, Reply, ReplyState, Session, SessionConfiguration,
        SessionHandler, SharedSession,
    };

    // Replay
    pub use ferrofix_replay::{
        QueryWindow, RecordingRange, ReplayIndexRecord, ReplayIndexWriter, ReplayOperation,
        ReplayQuery, MOST_RECENT_MESSAGE,
    };
}

#[cfg(test)]
mod tests {
    use super::prelude::*;

    #[test]
    fn test_prelude_imports() {
        let _id = LibraryId::new(7);
        let _state = SessionState::Active;
        let _window = QueryWindow {
            begin_sequence_number: 1,
            begin_sequence_index: 0,
            end_sequence_number: MOST_RECENT_MESSAGE,
            end_sequence_index: 0,
        };
    }

    #[test]
    fn test_configuration_composes() {
        let configuration = LibraryConfiguration::new(
            LibraryId::new(7),
            vec!["engine-a".to_string(), "engine-b".to_string()],
        );
        assert!(configuration.validate().is_ok());
        assert!(configuration.engines_are_clustered());
    }
}
