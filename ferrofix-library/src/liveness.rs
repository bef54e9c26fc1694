/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Control-plane liveness.
//!
//! The engine heartbeats each connected library; silence past the reply
//! timeout means the engine is gone. The detector also paces our own
//! heartbeats out so the engine can track this library symmetrically.

use ferrofix_core::types::LibraryId;
use ferrofix_transport::GatewayPublication;
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LivenessState {
    /// No heartbeat observed yet on this connection attempt.
    AwaitingConnect,
    Connected,
    Disconnected,
}

/// Heartbeat-based up/down detection for the engine endpoint.
pub struct LivenessDetector {
    publication: GatewayPublication,
    library_id: LibraryId,
    timeout_ms: u64,
    send_interval_ms: u64,
    last_received_ms: u64,
    last_sent_ms: u64,
    state: LivenessState,
}

impl LivenessDetector {
    /// Creates a detector for one connect attempt, initially disconnected.
    ///
    /// # Arguments
    /// * `publication` - Outbound path for our own heartbeats
    /// * `library_id` - This library's id
    /// * `timeout_ms` - Silence tolerated before declaring the engine down
    /// * `now_ms` - Current epoch milliseconds
    #[must_use]
    pub fn for_library(
        publication: GatewayPublication,
        library_id: LibraryId,
        timeout_ms: u64,
        now_ms: u64,
    ) -> Self {
        Self {
            publication,
            library_id,
            timeout_ms,
            send_interval_ms: (timeout_ms / 4).max(1),
            last_received_ms: now_ms,
            last_sent_ms: now_ms,
            state: LivenessState::AwaitingConnect,
        }
    }

    /// Checks whether the engine is currently considered up.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state == LivenessState::Connected
    }

    /// Checks whether a previously live connection has been lost.
    #[must_use]
    pub fn has_disconnected(&self) -> bool {
        self.state == LivenessState::Disconnected
    }

    /// Records an engine heartbeat.
    ///
    /// # Returns
    /// `true` when this heartbeat transitioned the detector to connected.
    pub fn on_heartbeat(&mut self, now_ms: u64) -> bool {
        self.last_received_ms = now_ms;
        let became_connected = self.state != LivenessState::Connected;
        self.state = LivenessState::Connected;
        became_connected
    }

    /// One liveness tick: enforce the silence deadline and pace our own
    /// heartbeat out.
    ///
    /// # Returns
    /// Work units performed, and whether the engine was declared down by
    /// this tick (reported once per loss).
    pub fn poll(&mut self, now_ms: u64) -> (usize, bool) {
        if self.state != LivenessState::Connected {
            return (0, false);
        }

        if now_ms.saturating_sub(self.last_received_ms) > self.timeout_ms {
            warn!(
                library_id = %self.library_id,
                silent_ms = now_ms - self.last_received_ms,
                "engine liveness lost"
            );
            self.state = LivenessState::Disconnected;
            return (1, true);
        }

        let mut work = 0;
        if now_ms.saturating_sub(self.last_sent_ms) >= self.send_interval_ms {
            // Back-pressure is ignored: the next tick retries.
            if self
                .publication
                .save_application_heartbeat(self.library_id)
                .is_ok()
            {
                self.last_sent_ms = now_ms;
                work += 1;
            }
        }
        (work, false)
    }
}
