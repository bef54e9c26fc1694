/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Core identity types for the gateway connector.
//!
//! This module provides the identifier newtypes shared between the library,
//! the transport, and the replay index:
//! - [`LibraryId`]: identifies one library instance to a multi-tenant engine
//! - [`ConnectionId`]: engine-assigned identifier of one TCP connection
//! - [`FixSessionId`]: engine-assigned surrogate for a FIX session
//! - [`CorrelationId`]: request identifier echoed in engine replies
//! - [`CompId`]: bounded FIX component identifier
//! - [`CompleteSessionId`]: the full session identity triple
//! - [`Timestamp`]: nanosecond-precision wall-clock instant

use arrayvec::ArrayString;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum length for CompID strings in bytes.
pub const COMP_ID_MAX_LEN: usize = 32;

/// The library id the engine uses when it speaks for itself rather than on
/// behalf of a library (e.g. session-exists notifications).
pub const ENGINE_LIBRARY_ID: LibraryId = LibraryId(0);

/// Sentinel correlation id meaning "no outstanding request".
pub const NO_CORRELATION_ID: CorrelationId = CorrelationId(0);

/// Sentinel sequence number used when the engine has no knowledge of a
/// session's last sequence number.
pub const UNKNOWN_SEQUENCE_NUMBER: i32 = -1;

/// Identifies one library instance connected to a gateway engine.
///
/// Multiple libraries share an engine; every control message carries the
/// library id it is addressed to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct LibraryId(pub i32);

impl LibraryId {
    /// Creates a new library id.
    #[inline]
    #[must_use]
    pub const fn new(value: i32) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> i32 {
        self.0
    }

    /// Checks whether this id denotes the engine itself.
    #[inline]
    #[must_use]
    pub const fn is_engine(self) -> bool {
        self.0 == ENGINE_LIBRARY_ID.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-assigned identifier of a single TCP connection.
///
/// Assigned at accept/connect time and unique for the lifetime of the engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct ConnectionId(pub u64);

impl ConnectionId {
    /// Creates a new connection id.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Engine-assigned surrogate identifier for a FIX session.
///
/// The comp-id pair is the FIX-level identity; the surrogate survives
/// reconnects of the same logical session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct FixSessionId(pub u64);

impl FixSessionId {
    /// Creates a new session surrogate id.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for FixSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Request identifier echoed in engine replies.
///
/// Correlation ids are monotonically increasing from a random positive seed,
/// so a pending id is never zero and never reused while outstanding.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[repr(transparent)]
#[serde(transparent)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    /// Creates a new correlation id.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw id value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Checks whether this id denotes an actual outstanding request.
    #[inline]
    #[must_use]
    pub const fn is_set(self) -> bool {
        self.0 != NO_CORRELATION_ID.0
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// FIX component identifier (SenderCompID, TargetCompID).
///
/// Stored inline without heap allocation, bounded to [`COMP_ID_MAX_LEN`]
/// bytes of printable ASCII.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompId(ArrayString<COMP_ID_MAX_LEN>);

impl CompId {
    /// Creates a new CompID from a string.
    ///
    /// # Arguments
    /// * `value` - The CompID string (1 to 32 printable ASCII characters)
    ///
    /// # Returns
    /// `None` if the value is empty, too long, or contains non-printable
    /// characters or the SOH delimiter.
    #[must_use]
    pub fn new(value: &str) -> Option<Self> {
        if value.is_empty() || value.len() > COMP_ID_MAX_LEN {
            return None;
        }
        if !value.bytes().all(|b| (0x20..0x7f).contains(&b)) {
            return None;
        }
        ArrayString::from(value).ok().map(Self)
    }

    /// Returns the CompID as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl fmt::Display for CompId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The complete identity of a FIX session.
///
/// Immutable triple of the local and remote comp ids plus the engine-assigned
/// surrogate. Keys are unique under the surrogate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompleteSessionId {
    local_comp_id: CompId,
    remote_comp_id: CompId,
    surrogate_id: FixSessionId,
}

impl CompleteSessionId {
    /// Creates a new complete session identity.
    ///
    /// # Arguments
    /// * `local_comp_id` - Our comp id on this session
    /// * `remote_comp_id` - The counterparty comp id
    /// * `surrogate_id` - The engine-assigned surrogate
    #[must_use]
    pub const fn new(
        local_comp_id: CompId,
        remote_comp_id: CompId,
        surrogate_id: FixSessionId,
    ) -> Self {
        Self {
            local_comp_id,
            remote_comp_id,
            surrogate_id,
        }
    }

    /// Returns our comp id on this session.
    #[inline]
    #[must_use]
    pub const fn local_comp_id(&self) -> &CompId {
        &self.local_comp_id
    }

    /// Returns the counterparty comp id.
    #[inline]
    #[must_use]
    pub const fn remote_comp_id(&self) -> &CompId {
        &self.remote_comp_id
    }

    /// Returns the engine-assigned surrogate id.
    #[inline]
    #[must_use]
    pub const fn surrogate_id(&self) -> FixSessionId {
        self.surrogate_id
    }
}

impl fmt::Display for CompleteSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}->{}#{}",
            self.local_comp_id, self.remote_comp_id, self.surrogate_id
        )
    }
}

/// Wall-clock instant with nanosecond precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp {
    /// Nanoseconds since Unix epoch (1970-01-01 00:00:00 UTC).
    nanos_since_epoch: u64,
}

impl Timestamp {
    /// Creates a timestamp from nanoseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self {
            nanos_since_epoch: nanos,
        }
    }

    /// Creates a timestamp from milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self {
            nanos_since_epoch: millis * 1_000_000,
        }
    }

    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos() as u64;
        Self::from_nanos(nanos)
    }

    /// Returns nanoseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.nanos_since_epoch
    }

    /// Returns milliseconds since Unix epoch.
    #[inline]
    #[must_use]
    pub const fn as_millis(self) -> u64 {
        self.nanos_since_epoch / 1_000_000
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = (self.nanos_since_epoch / 1_000_000_000) as i64;
        let nanos = (self.nanos_since_epoch % 1_000_000_000) as u32;
        match DateTime::<Utc>::from_timestamp(secs, nanos) {
            Some(dt) => write!(f, "{}", dt.format("%Y%m%d-%H:%M:%S%.9f")),
            None => write!(f, "{}ns", self.nanos_since_epoch),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_id() {
        let id = LibraryId::new(7);
        assert_eq!(id.value(), 7);
        assert!(!id.is_engine());
        assert!(ENGINE_LIBRARY_ID.is_engine());
    }

    #[test]
    fn test_correlation_id_is_set() {
        assert!(!NO_CORRELATION_ID.is_set());
        assert!(CorrelationId::new(1).is_set());
    }

    #[test]
    fn test_comp_id_valid() {
        let id = CompId::new("SENDER").unwrap();
        assert_eq!(id.as_str(), "SENDER");
        assert_eq!(id.to_string(), "SENDER");
    }

    #[test]
    fn test_comp_id_rejects_invalid() {
        assert!(CompId::new("").is_none());
        assert!(CompId::new("A\x01B").is_none());
        assert!(CompId::new(&"X".repeat(33)).is_none());
    }

    #[test]
    fn test_complete_session_id() {
        let id = CompleteSessionId::new(
            CompId::new("INIT").unwrap(),
            CompId::new("ACC").unwrap(),
            FixSessionId::new(1001),
        );
        assert_eq!(id.local_comp_id().as_str(), "INIT");
        assert_eq!(id.remote_comp_id().as_str(), "ACC");
        assert_eq!(id.surrogate_id().value(), 1001);
        assert_eq!(id.to_string(), "INIT->ACC#1001");
    }

    #[test]
    fn test_timestamp_conversions() {
        let ts = Timestamp::from_millis(1_500);
        assert_eq!(ts.as_nanos(), 1_500_000_000);
        assert_eq!(ts.as_millis(), 1_500);
    }

    #[test]
    fn test_timestamp_display() {
        let ts = Timestamp::from_nanos(0);
        assert_eq!(ts.to_string(), "19700101-00:00:00.000000000");
    }
}
