/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FerroFix Core
//!
//! Core types, clocks, and error definitions for the FerroFix gateway connector.
//!
//! This crate provides the fundamental building blocks used across all FerroFix crates:
//! - **Identity types**: `LibraryId`, `ConnectionId`, `FixSessionId`, `CorrelationId`
//! - **FIX identity**: `CompId` and the `CompleteSessionId` triple
//! - **Error types**: Unified error handling with `thiserror`
//! - **Time**: the `EpochClock` seam and `Timestamp`
//! - **Idling**: back-off strategy for bounded busy-polling
//!
//! ## Single-Threaded Design
//!
//! The connector built on these types is a cooperative poller: the caller owns
//! the thread, and nothing in this crate introduces hidden concurrency.

pub mod clock;
pub mod error;
pub mod idle;
pub mod types;

pub use clock::{EpochClock, ManualEpochClock, SystemEpochClock};
pub use error::{GatewayErrorKind, LibraryError, ReplayError, Result};
pub use idle::BackoffIdleStrategy;
pub use types::{
    CompId, CompleteSessionId, ConnectionId, CorrelationId, FixSessionId, LibraryId, Timestamp,
    ENGINE_LIBRARY_ID, NO_CORRELATION_ID, UNKNOWN_SEQUENCE_NUMBER,
};
