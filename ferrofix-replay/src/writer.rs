/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Single-writer side of the replay index.
//!
//! The engine's indexer appends one record per archived FIX message, wrapping
//! over the oldest slots once the ring fills. Every record write is framed by
//! the dual change counters so concurrent readers can detect torn reads and
//! laps:
//!
//! 1. `begin_change := end + RECORD_LENGTH` (release, then a full fence so
//!    the field writes cannot be observed ahead of it)
//! 2. field writes
//! 3. `end_change := begin_change` (release)
//!
//! Readers consider a slot stable only when both counters agree across their
//! access window.

use crate::descriptor::{
    offset_in_ring, ring_capacity, write_header, ReplayIndexRecord, BEGIN_CHANGE_OFFSET,
    END_CHANGE_OFFSET, HEADER_LENGTH, RECORD_LENGTH, RECORD_LENGTH_OFFSET, RECORD_POSITION_OFFSET,
    RECORD_RECORDING_ID_OFFSET, RECORD_SEQUENCE_INDEX_OFFSET, RECORD_SEQUENCE_NUMBER_OFFSET,
};
use ferrofix_core::error::ReplayError;
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::Path;
use std::ptr;
use std::sync::atomic::{fence, AtomicU64, Ordering};

/// Publishes replay index records into a memory-mapped ring.
pub struct ReplayIndexWriter {
    mmap: MmapMut,
    capacity: u64,
}

impl ReplayIndexWriter {
    /// Creates (or truncates) an index file sized for `record_count` slots
    /// and maps it for writing.
    ///
    /// # Arguments
    /// * `path` - The index file path (see `replay_index_file`)
    /// * `record_count` - Ring size in records; must be a power of two
    ///
    /// # Errors
    /// I/O failures, or [`ReplayError::InvalidCapacity`] when `record_count`
    /// is not a positive power of two.
    pub fn create(path: &Path, record_count: usize) -> Result<Self, ReplayError> {
        if record_count == 0 || !record_count.is_power_of_two() {
            return Err(ReplayError::InvalidCapacity {
                capacity: (record_count * RECORD_LENGTH) as u64,
            });
        }
        let file_len = (HEADER_LENGTH + record_count * RECORD_LENGTH) as u64;
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(file_len)?;

        let mut mmap = unsafe { MmapMut::map_mut(&file)? };
        write_header(&mut mmap[..HEADER_LENGTH]);
        let capacity = ring_capacity(file_len)?;
        Ok(Self { mmap, capacity })
    }

    /// Returns the ring capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    /// Returns the published begin-change position.
    #[must_use]
    pub fn begin_change(&self) -> u64 {
        self.begin_change_cell().load(Ordering::Acquire)
    }

    /// Returns the published end-change position.
    #[must_use]
    pub fn end_change(&self) -> u64 {
        self.end_change_cell().load(Ordering::Acquire)
    }

    /// Publishes one record, wrapping over the oldest slot when the ring is
    /// full.
    pub fn on_indexed(&mut self, record: &ReplayIndexRecord) {
        let end = self.end_change_cell().load(Ordering::Relaxed);
        let new_end = end + RECORD_LENGTH as u64;
        let offset = offset_in_ring(end, self.capacity);

        self.begin_change_cell().store(new_end, Ordering::Release);
        // Field writes must not become visible ahead of the begin counter,
        // or a reader could validate a torn slot.
        fence(Ordering::SeqCst);

        let base = self.mmap.as_mut_ptr();
        unsafe {
            ptr::write_volatile(
                base.add(offset + RECORD_POSITION_OFFSET).cast::<u64>(),
                record.begin_position,
            );
            ptr::write_volatile(
                base.add(offset + RECORD_SEQUENCE_NUMBER_OFFSET).cast::<i32>(),
                record.sequence_number,
            );
            ptr::write_volatile(
                base.add(offset + RECORD_SEQUENCE_INDEX_OFFSET).cast::<i32>(),
                record.sequence_index,
            );
            ptr::write_volatile(
                base.add(offset + RECORD_RECORDING_ID_OFFSET).cast::<u64>(),
                record.recording_id,
            );
            ptr::write_volatile(
                base.add(offset + RECORD_LENGTH_OFFSET).cast::<i32>(),
                record.length,
            );
        }

        self.end_change_cell().store(new_end, Ordering::Release);
    }

    fn begin_change_cell(&self) -> &AtomicU64 {
        // The header offsets are 8-byte aligned within a page-aligned map.
        unsafe { &*self.mmap.as_ptr().add(BEGIN_CHANGE_OFFSET).cast::<AtomicU64>() }
    }

    fn end_change_cell(&self) -> &AtomicU64 {
        unsafe { &*self.mmap.as_ptr().add(END_CHANGE_OFFSET).cast::<AtomicU64>() }
    }
}
