/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Lock-free queries over the replay index.
//!
//! Maps a `(session id, sequence index, sequence number)` window, inclusive
//! at both ends, onto an ordered, deduplicated list of archive ranges to
//! stream back. The index is single-writer / multi-reader: the writer may
//! overwrite slots mid-scan, so every slot read is validated against the
//! dual change counters and a lap simply restarts the scan at the writer's
//! published position.
//!
//! Not thread-safe itself; each reader holds its own query (and mapping) and
//! scans single-threaded.

use crate::cache::SetAssociativeCache;
use crate::descriptor::{
    offset_in_ring, ring_capacity, validate_header, ReplayIndexRecord, FRAME_ALIGNMENT,
    HEADER_LENGTH, MOST_RECENT_MESSAGE, RECORD_LENGTH,
};
use crate::descriptor::{
    replay_index_file, BEGIN_CHANGE_OFFSET, END_CHANGE_OFFSET, RECORD_LENGTH_OFFSET,
    RECORD_POSITION_OFFSET, RECORD_RECORDING_ID_OFFSET, RECORD_SEQUENCE_INDEX_OFFSET,
    RECORD_SEQUENCE_NUMBER_OFFSET,
};
use ferrofix_core::error::ReplayError;
use ferrofix_core::idle::BackoffIdleStrategy;
use ferrofix_core::types::FixSessionId;
use memmap2::Mmap;
use smallvec::SmallVec;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, Ordering};
use tracing::debug;

/// Sentinel for a range that has not accumulated a position yet.
const NULL_POSITION: u64 = u64::MAX;

/// Ranges rarely span more than a handful of recordings.
type Ranges = SmallVec<[RecordingRange; 4]>;

/// One contiguous region of a recording to replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingRange {
    /// The archive recording holding the bytes.
    pub recording_id: u64,
    /// The session the bytes belong to.
    pub session_id: FixSessionId,
    /// Start position within the recording, frame header included.
    pub position: u64,
    /// Total bytes covered.
    pub length: u64,
    /// Number of FIX messages covered; fragmented messages count once.
    pub count: usize,
}

impl RecordingRange {
    fn new(recording_id: u64, session_id: FixSessionId) -> Self {
        Self {
            recording_id,
            session_id,
            position: NULL_POSITION,
            length: 0,
            count: 0,
        }
    }

    fn add(&mut self, position: u64, length: u64) {
        if self.position == NULL_POSITION {
            self.position = position;
        }
        self.length += length;
    }

    /// Returns the exclusive end position of the range.
    #[must_use]
    pub fn end_position(&self) -> u64 {
        self.position + self.length
    }
}

/// The inclusive query window.
#[derive(Debug, Clone, Copy)]
pub struct QueryWindow {
    /// Sequence number to begin at (inclusive).
    pub begin_sequence_number: i32,
    /// Sequence index to begin at (inclusive).
    pub begin_sequence_index: i32,
    /// Sequence number to end at (inclusive), or [`MOST_RECENT_MESSAGE`].
    pub end_sequence_number: i32,
    /// Sequence index to end at (inclusive).
    pub end_sequence_index: i32,
}

/// Queries the replay index of one FIX session.
///
/// Holds its own read-only mapping of the index file; the mapping closes
/// when the query drops (e.g. on cache eviction).
pub struct SessionQuery {
    mmap: Mmap,
    session_id: FixSessionId,
    capacity: u64,
}

impl SessionQuery {
    /// Opens and validates the index file of one session.
    ///
    /// # Errors
    /// I/O and geometry errors from mapping the file, or a header mismatch.
    pub fn open(path: &Path, session_id: FixSessionId) -> Result<Self, ReplayError> {
        let file = File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };
        let capacity = ring_capacity(mmap.len() as u64)?;
        validate_header(&mmap[..HEADER_LENGTH])?;
        Ok(Self {
            mmap,
            session_id,
            capacity,
        })
    }

    /// Scans the index for `window`, producing ordered archive ranges.
    ///
    /// Terminates on an unwritten slot, on the first record past the window
    /// end, or after one full ring traversal. A lap by the writer restarts
    /// the scan at the writer's published position.
    pub fn query(&self, window: &QueryWindow, idle: &mut BackoffIdleStrategy) -> Vec<RecordingRange> {
        let up_to_most_recent = window.end_sequence_number == MOST_RECENT_MESSAGE;

        let mut ranges: Ranges = SmallVec::new();
        let mut current: Option<RecordingRange> = None;
        let mut last_sequence_number = -1i32;

        let mut iterator_position = self.iterator_position();
        let mut stop_position = iterator_position + self.capacity;

        while iterator_position < stop_position {
            let change_position = self.end_change();

            // Lapped by the writer: everything up to our position has been
            // overwritten, so restart at its published begin.
            if change_position > iterator_position
                && iterator_position + self.capacity <= self.begin_change()
            {
                iterator_position = change_position;
                stop_position = iterator_position + self.capacity;
            }

            let record = self.read_record(offset_in_ring(iterator_position, self.capacity));

            // Load-load barrier: the field reads above must complete before
            // the validation load below.
            fence(Ordering::Acquire);

            if change_position != self.begin_change() {
                // The slot was being rewritten underneath us.
                idle.idle();
                continue;
            }
            idle.reset();

            let after_end = !up_to_most_recent
                && (record.sequence_index > window.end_sequence_index
                    || (record.sequence_index == window.end_sequence_index
                        && record.sequence_number > window.end_sequence_number));
            if record.begin_position == 0 || after_end {
                break;
            }

            let within_range = record.sequence_index > window.begin_sequence_index
                || (record.sequence_index == window.begin_sequence_index
                    && record.sequence_number >= window.begin_sequence_number);
            if within_range {
                current = Some(Self::add_range(
                    &mut ranges,
                    current,
                    last_sequence_number,
                    &record,
                    self.session_id,
                ));
                last_sequence_number = record.sequence_number;
                iterator_position += RECORD_LENGTH as u64;
            } else {
                iterator_position = Self::skip_to_start(
                    window.begin_sequence_number,
                    iterator_position,
                    record.sequence_number,
                );
            }
        }

        if let Some(range) = current {
            ranges.push(range);
        }
        debug!(
            session_id = %self.session_id,
            ranges = ranges.len(),
            "replay index query complete"
        );
        ranges.into_vec()
    }

    fn add_range(
        ranges: &mut Ranges,
        current: Option<RecordingRange>,
        last_sequence_number: i32,
        record: &ReplayIndexRecord,
        session_id: FixSessionId,
    ) -> RecordingRange {
        let mut range = match current {
            None => RecordingRange::new(record.recording_id, session_id),
            Some(range) if range.recording_id != record.recording_id => {
                ranges.push(range);
                RecordingRange::new(record.recording_id, session_id)
            }
            Some(range) => range,
        };

        range.add(
            record.begin_position - FRAME_ALIGNMENT,
            record.length as u64 + FRAME_ALIGNMENT,
        );
        // FIX messages may fragment over several records sharing a sequence
        // number; count each message once.
        if last_sequence_number != record.sequence_number {
            range.count += 1;
        }
        range
    }

    fn skip_to_start(
        begin_sequence_number: i32,
        iterator_position: u64,
        sequence_number: i32,
    ) -> u64 {
        if sequence_number < begin_sequence_number {
            // Same sequence index, consecutive records: jump straight to the
            // slot that should hold the begin sequence number.
            let jump = (begin_sequence_number - sequence_number) as u64;
            iterator_position + jump * RECORD_LENGTH as u64
        } else {
            // Earlier sequence index; no good estimate, scan forward.
            iterator_position + RECORD_LENGTH as u64
        }
    }

    /// Positions are on a monotonically increasing scale; before the first
    /// wrap the scan starts at zero.
    fn iterator_position(&self) -> u64 {
        let begin = self.begin_change();
        if begin < self.capacity {
            0
        } else {
            begin
        }
    }

    fn begin_change(&self) -> u64 {
        unsafe {
            (*self
                .mmap
                .as_ptr()
                .add(BEGIN_CHANGE_OFFSET)
                .cast::<AtomicU64>())
            .load(Ordering::Acquire)
        }
    }

    fn end_change(&self) -> u64 {
        unsafe {
            (*self
                .mmap
                .as_ptr()
                .add(END_CHANGE_OFFSET)
                .cast::<AtomicU64>())
            .load(Ordering::Acquire)
        }
    }

    /// Copies one slot's fields out of the mapping. The copy is validated
    /// against the change counters by the caller before use.
    fn read_record(&self, offset: usize) -> ReplayIndexRecord {
        let base = self.mmap.as_ptr();
        unsafe {
            ReplayIndexRecord {
                begin_position: ptr::read_volatile(
                    base.add(offset + RECORD_POSITION_OFFSET).cast::<u64>(),
                ),
                sequence_number: ptr::read_volatile(
                    base.add(offset + RECORD_SEQUENCE_NUMBER_OFFSET).cast::<i32>(),
                ),
                sequence_index: ptr::read_volatile(
                    base.add(offset + RECORD_SEQUENCE_INDEX_OFFSET).cast::<i32>(),
                ),
                recording_id: ptr::read_volatile(
                    base.add(offset + RECORD_RECORDING_ID_OFFSET).cast::<u64>(),
                ),
                length: ptr::read_volatile(base.add(offset + RECORD_LENGTH_OFFSET).cast::<i32>()),
            }
        }
    }
}

/// Queries replay indexes across sessions, caching one [`SessionQuery`]
/// (and its mapping) per recently queried session.
pub struct ReplayQuery {
    log_file_dir: PathBuf,
    stream_id: i32,
    cache: SetAssociativeCache<SessionQuery>,
    idle: BackoffIdleStrategy,
}

impl ReplayQuery {
    /// Creates a query engine over `log_file_dir`.
    ///
    /// # Arguments
    /// * `log_file_dir` - Directory holding the per-session index files
    /// * `cache_num_sets` - Number of cache sets
    /// * `cache_set_size` - Entries per cache set
    /// * `stream_id` - The indexed stream
    /// * `idle` - Back-off between validation retries
    #[must_use]
    pub fn new(
        log_file_dir: impl Into<PathBuf>,
        cache_num_sets: usize,
        cache_set_size: usize,
        stream_id: i32,
        idle: BackoffIdleStrategy,
    ) -> Self {
        Self {
            log_file_dir: log_file_dir.into(),
            stream_id,
            cache: SetAssociativeCache::new(cache_num_sets, cache_set_size),
            idle,
        }
    }

    /// Queries one session's window; see [`SessionQuery::query`].
    ///
    /// # Errors
    /// Propagates open/validation errors for the session's index file.
    pub fn query(
        &mut self,
        session_id: FixSessionId,
        window: &QueryWindow,
    ) -> Result<Vec<RecordingRange>, ReplayError> {
        let path = replay_index_file(&self.log_file_dir, session_id.value(), self.stream_id);
        let session_query = self
            .cache
            .compute_if_absent(session_id.value(), || SessionQuery::open(&path, session_id))?;
        Ok(session_query.query(window, &mut self.idle))
    }

    /// Drops every cached session query, closing their mappings.
    pub fn close(&mut self) {
        self.cache.clear();
    }
}
