/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! # FerroFix Replay
//!
//! Indexed lookup over the gateway's durable archive.
//!
//! The engine indexes every archived FIX message into a per-session,
//! memory-mapped ring of fixed-size records. This crate provides both sides
//! of that file:
//! - [`ReplayIndexWriter`]: the single writer, publishing records framed by
//!   dual change counters
//! - [`ReplayQuery`] / [`SessionQuery`]: lock-free readers mapping a
//!   `(session, sequence index, sequence number)` window onto ordered
//!   [`RecordingRange`]s, tolerating concurrent overwrites and laps
//! - [`ReplayOperation`]: the hand-off of those ranges to an archive
//!   streamer
//!
//! ## Concurrency
//!
//! Single writer, many readers, no locks. Readers validate every slot
//! against the change-counter pair and restart transparently when lapped.

pub mod archive;
pub mod cache;
pub mod descriptor;
pub mod query;
pub mod writer;

pub use archive::{ArchiveStreamer, ReplayOperation};
pub use cache::SetAssociativeCache;
pub use descriptor::{
    replay_index_file, ReplayIndexRecord, FRAME_ALIGNMENT, MOST_RECENT_MESSAGE, RECORD_LENGTH,
};
pub use query::{QueryWindow, RecordingRange, ReplayQuery, SessionQuery};
pub use writer::ReplayIndexWriter;
