/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Error types for the FerroFix gateway connector.
//!
//! This module provides a unified error hierarchy using `thiserror` for typed,
//! domain-specific errors across all FerroFix operations.

use num_derive::{FromPrimitive, ToPrimitive};
use std::fmt;
use thiserror::Error;

/// Result type alias using [`LibraryError`] as the error type.
pub type Result<T> = std::result::Result<T, LibraryError>;

/// Gateway-level error kinds carried on the wire in engine `Error` messages.
///
/// The numeric codes are part of the control protocol and must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, FromPrimitive, ToPrimitive)]
#[repr(i32)]
pub enum GatewayErrorKind {
    /// The engine references a session this library does not have, or vice versa.
    UnknownSession = 1,
    /// An attempt to own a session that is already owned elsewhere.
    DuplicateSession = 2,
    /// The connect deadline was exceeded.
    UnableToConnect = 3,
    /// The addressed engine node is not the cluster leader. Control-plane
    /// information, never surfaced as an application error.
    NotLeader = 4,
    /// Programmer error in startup configuration.
    InvalidConfiguration = 5,
    /// An outstanding request's reply deadline passed.
    TimedOut = 6,
}

impl fmt::Display for GatewayErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::UnknownSession => "UNKNOWN_SESSION",
            Self::DuplicateSession => "DUPLICATE_SESSION",
            Self::UnableToConnect => "UNABLE_TO_CONNECT",
            Self::NotLeader => "NOT_LEADER",
            Self::InvalidConfiguration => "INVALID_CONFIGURATION",
            Self::TimedOut => "TIMED_OUT",
        };
        f.write_str(name)
    }
}

/// Top-level error type for library connector operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    /// No engine replied within the deadline and all reconnect attempts were
    /// spent. Fatal to the connect call.
    #[error("unable to connect to engine: no reply within {timeout_ms} ms, are you sure it is running?")]
    UnableToConnect {
        /// Reply timeout the library waited for, in milliseconds.
        timeout_ms: u64,
    },

    /// The library was closed and can accept no further operations.
    #[error("library has been closed")]
    Closed,

    /// Programmer error in the supplied configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// An error reported by the engine during connect.
    #[error("unable to connect to engine: {kind}: {message}")]
    Gateway {
        /// The wire-level error kind.
        kind: GatewayErrorKind,
        /// Human-readable detail from the engine.
        message: String,
    },
}

/// Errors opening or validating a replay index file.
#[derive(Debug, Error)]
pub enum ReplayError {
    /// I/O error opening or mapping the index file.
    #[error("replay index io error: {0}")]
    Io(#[from] std::io::Error),

    /// The file is too small to hold the index header.
    #[error("replay index file too small: {size} bytes, need at least {min_size}")]
    FileTooSmall {
        /// Actual file size in bytes.
        size: u64,
        /// Minimum size including the header.
        min_size: u64,
    },

    /// The ring capacity is not a positive power-of-two multiple of the
    /// record length.
    #[error("invalid replay index capacity: {capacity} bytes")]
    InvalidCapacity {
        /// The offending capacity in bytes.
        capacity: u64,
    },

    /// The file header does not describe a replay index we understand.
    #[error("replay index header mismatch: schema {schema_id}, version {version}")]
    HeaderMismatch {
        /// Schema id found in the file.
        schema_id: u16,
        /// Template version found in the file.
        version: u16,
    },
}
