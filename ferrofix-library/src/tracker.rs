/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Correlation of outbound requests with inbound replies.
//!
//! Correlation ids are monotonically increasing from a random positive seed,
//! which keeps colliding ids across library restarts unlikely. A pending id
//! is never reused while outstanding.

use crate::replies::{PendingReply, ReplyKind};
use ferrofix_core::types::{CorrelationId, LibraryId};
use ferrofix_transport::GatewayPublication;
use rand::Rng;
use std::collections::HashMap;

/// Tracks outstanding replies by correlation id.
pub struct ReplyTracker {
    current_correlation_id: u64,
    pending: HashMap<CorrelationId, PendingReply>,
}

impl ReplyTracker {
    /// Creates a tracker with a random positive correlation seed.
    #[must_use]
    pub fn new() -> Self {
        Self::with_seed(rand::thread_rng().gen_range(1..i64::MAX as u64))
    }

    /// Creates a tracker with an explicit seed, for deterministic tests.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            current_correlation_id: seed,
            pending: HashMap::new(),
        }
    }

    /// Allocates the next correlation id (pre-increment).
    pub fn next_correlation_id(&mut self) -> CorrelationId {
        self.current_correlation_id += 1;
        CorrelationId::new(self.current_correlation_id)
    }

    /// Registers a pending reply under its correlation id.
    pub(crate) fn register(&mut self, pending: PendingReply) {
        self.pending.insert(pending.correlation_id(), pending);
    }

    /// Removes and returns the pending reply for a correlation id.
    pub(crate) fn remove(&mut self, correlation_id: CorrelationId) -> Option<PendingReply> {
        self.pending.remove(&correlation_id)
    }

    /// Returns the kind of the pending reply for a correlation id, without
    /// removing it.
    pub(crate) fn kind_of(&self, correlation_id: CorrelationId) -> Option<ReplyKind> {
        self.pending.get(&correlation_id).map(PendingReply::kind)
    }

    /// Checks whether any replies are outstanding.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Returns the number of outstanding replies.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// One deadline sweep: polls every outstanding reply, removing those
    /// that reached a terminal state.
    pub fn check_replies(
        &mut self,
        now_ms: u64,
        library_id: LibraryId,
        default_heartbeat_interval_s: u32,
        publication: &GatewayPublication,
    ) -> usize {
        if self.pending.is_empty() {
            return 0;
        }
        let mut resolved = 0;
        self.pending.retain(|_, pending| {
            let done = pending.poll(now_ms, library_id, default_heartbeat_interval_s, publication);
            if done {
                resolved += 1;
            }
            !done
        });
        resolved
    }
}

impl Default for ReplyTracker {
    fn default() -> Self {
        Self::new()
    }
}
