/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Hand-off of query results to the archive streamer.
//!
//! The index query produces ordered [`RecordingRange`]s; actually streaming
//! the archived bytes belongs to the gateway's replayer. This module fixes
//! the contract: a [`ReplayOperation`] owns the ranges and drives a
//! caller-supplied [`ArchiveStreamer`] until every range is on its way.

use crate::query::RecordingRange;

/// Streams one archive range at a time on behalf of a replay operation.
pub trait ArchiveStreamer {
    /// Begins streaming `range` from the archive.
    ///
    /// # Returns
    /// `false` when the archive back-pressures the request; the operation
    /// retries the same range on its next poll.
    fn try_stream(&mut self, range: &RecordingRange) -> bool;
}

/// A polled replay of an ordered range list.
pub struct ReplayOperation {
    ranges: Vec<RecordingRange>,
    next: usize,
    streamer: Box<dyn ArchiveStreamer>,
}

impl ReplayOperation {
    /// Creates an operation over `ranges`, to be driven by `poll`.
    #[must_use]
    pub fn new(ranges: Vec<RecordingRange>, streamer: Box<dyn ArchiveStreamer>) -> Self {
        Self {
            ranges,
            next: 0,
            streamer,
        }
    }

    /// Returns the ranges this operation replays.
    #[must_use]
    pub fn ranges(&self) -> &[RecordingRange] {
        &self.ranges
    }

    /// Returns the number of FIX messages covered.
    #[must_use]
    pub fn message_count(&self) -> usize {
        self.ranges.iter().map(|range| range.count).sum()
    }

    /// Attempts to hand the next pending range to the streamer.
    ///
    /// # Returns
    /// `true` once every range has been accepted.
    pub fn poll(&mut self) -> bool {
        while self.next < self.ranges.len() {
            if !self.streamer.try_stream(&self.ranges[self.next]) {
                return false;
            }
            self.next += 1;
        }
        true
    }
}
