/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Binary layout of a replay index file.
//!
//! One file per FIX session, named `replay-index-{session_id}-{stream_id}`.
//! The layout is binary-stable:
//!
//! ```text
//! offset 0   block_length  u16 LE    record block length
//! offset 2   template_id   u16 LE
//! offset 4   schema_id     u16 LE
//! offset 6   version       u16 LE
//! offset 8   begin_change  u64       atomic cell, bumped before a record write
//! offset 16  end_change    u64       atomic cell, bumped after a record write
//! offset 24  pad           [u8; 8]
//! offset 32  record ring, RECORD_LENGTH bytes per slot:
//!            begin_position   u64
//!            sequence_number  i32
//!            sequence_index   i32
//!            recording_id     u64
//!            length           i32
//!            pad              [u8; 4]
//! ```
//!
//! The ring capacity (file length minus header) must be a power of two so
//! monotonic byte positions mask down to slot offsets.

use ferrofix_core::error::ReplayError;
use std::path::{Path, PathBuf};

/// Length of the file header preceding the record ring.
pub const HEADER_LENGTH: usize = 32;

/// Length of one record slot, padding included.
pub const RECORD_LENGTH: usize = 32;

/// Record block length encoded in the header (fields without padding).
pub const BLOCK_LENGTH: u16 = 28;

/// Template id of the replay index record.
pub const TEMPLATE_ID: u16 = 1;

/// Schema id of the replay index file.
pub const SCHEMA_ID: u16 = 666;

/// Schema version understood by this reader.
pub const SCHEMA_VERSION: u16 = 1;

/// Alignment of archive frames; ranges are widened by one frame header.
pub const FRAME_ALIGNMENT: u64 = 32;

/// Sentinel end sequence number meaning "unbounded upper".
pub const MOST_RECENT_MESSAGE: i32 = 0;

pub(crate) const BEGIN_CHANGE_OFFSET: usize = 8;
pub(crate) const END_CHANGE_OFFSET: usize = 16;

pub(crate) const RECORD_POSITION_OFFSET: usize = 0;
pub(crate) const RECORD_SEQUENCE_NUMBER_OFFSET: usize = 8;
pub(crate) const RECORD_SEQUENCE_INDEX_OFFSET: usize = 12;
pub(crate) const RECORD_RECORDING_ID_OFFSET: usize = 16;
pub(crate) const RECORD_LENGTH_OFFSET: usize = 24;

/// One decoded replay index record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplayIndexRecord {
    /// Archive byte position of the indexed message frame.
    pub begin_position: u64,
    /// FIX sequence number of the message.
    pub sequence_number: i32,
    /// Sequence index (bumped on every sequence reset).
    pub sequence_index: i32,
    /// Recording holding the archived bytes.
    pub recording_id: u64,
    /// Length of the archived frame in bytes.
    pub length: i32,
}

/// Returns the index file path for a session on a stream.
#[must_use]
pub fn replay_index_file(log_file_dir: &Path, session_id: u64, stream_id: i32) -> PathBuf {
    log_file_dir.join(format!("replay-index-{session_id}-{stream_id}"))
}

/// Derives and validates the ring capacity from a file length.
///
/// # Errors
/// [`ReplayError::FileTooSmall`] when the header does not fit, or
/// [`ReplayError::InvalidCapacity`] when the ring is not a power-of-two
/// number of record slots.
pub fn ring_capacity(file_len: u64) -> Result<u64, ReplayError> {
    let min_size = (HEADER_LENGTH + RECORD_LENGTH) as u64;
    if file_len < min_size {
        return Err(ReplayError::FileTooSmall {
            size: file_len,
            min_size,
        });
    }
    let capacity = file_len - HEADER_LENGTH as u64;
    if !capacity.is_power_of_two() || capacity % RECORD_LENGTH as u64 != 0 {
        return Err(ReplayError::InvalidCapacity { capacity });
    }
    Ok(capacity)
}

/// Maps a monotonic byte position onto its slot offset within the file.
#[inline]
#[must_use]
pub(crate) fn offset_in_ring(position: u64, capacity: u64) -> usize {
    HEADER_LENGTH + (position & (capacity - 1)) as usize
}

/// Writes the file header into a fresh mapping.
pub(crate) fn write_header(buffer: &mut [u8]) {
    buffer[0..2].copy_from_slice(&BLOCK_LENGTH.to_le_bytes());
    buffer[2..4].copy_from_slice(&TEMPLATE_ID.to_le_bytes());
    buffer[4..6].copy_from_slice(&SCHEMA_ID.to_le_bytes());
    buffer[6..8].copy_from_slice(&SCHEMA_VERSION.to_le_bytes());
}

/// Validates the header of a mapped index file.
///
/// # Errors
/// [`ReplayError::HeaderMismatch`] when the schema id or version differ
/// from what this reader understands.
pub(crate) fn validate_header(buffer: &[u8]) -> Result<(), ReplayError> {
    let schema_id = u16::from_le_bytes([buffer[4], buffer[5]]);
    let version = u16::from_le_bytes([buffer[6], buffer[7]]);
    if schema_id != SCHEMA_ID || version != SCHEMA_VERSION {
        return Err(ReplayError::HeaderMismatch { schema_id, version });
    }
    Ok(())
}
