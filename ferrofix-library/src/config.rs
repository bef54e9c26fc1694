/******************************************************************************
   Author: Joaquín Béjar García
   Email: jb@taunais.com
   Date: 27/1/26
******************************************************************************/

//! Library and session configuration.
//!
//! This module provides configuration for a library instance and for the
//! sessions it initiates, in builder style with validation surfaced as
//! [`LibraryError::InvalidConfiguration`].

use crate::handlers::{
    GatewayErrorHandler, LibraryConnectHandler, LoggingGatewayErrorHandler,
    NoOpLibraryConnectHandler, NoOpSentPositionHandler, NoOpSessionAcquireHandler,
    NoOpSessionExistsHandler, SentPositionHandler, SessionAcquireHandler, SessionExistsHandler,
};
use ferrofix_core::error::LibraryError;
use ferrofix_core::types::{CompId, LibraryId};
use ferrofix_transport::SequenceNumberType;

/// Default reply deadline in milliseconds.
pub const DEFAULT_REPLY_TIMEOUT_MS: u64 = 10_000;

/// Default number of reconnect attempts before failing fatally.
pub const DEFAULT_RECONNECT_ATTEMPTS: usize = 10;

/// Default heartbeat interval for initiated sessions, in seconds.
pub const DEFAULT_HEARTBEAT_INTERVAL_S: u32 = 10;

/// Configuration for one library instance.
pub struct LibraryConfiguration {
    /// Identifies this library to the engine; must be positive.
    pub library_id: LibraryId,
    /// Engine control channels, tried in round-robin order.
    pub library_channels: Vec<String>,
    /// Deadline for engine replies in milliseconds.
    pub reply_timeout_ms: u64,
    /// Reconnect attempts before a connect fails fatally.
    pub reconnect_attempts: usize,
    /// Heartbeat interval for initiated sessions, in seconds.
    pub default_heartbeat_interval_s: u32,
    /// Bound when a session is acquired.
    pub session_acquire_handler: Box<dyn SessionAcquireHandler>,
    /// Notified of sessions owned elsewhere.
    pub session_exists_handler: Box<dyn SessionExistsHandler>,
    /// Notified of sent-position advances.
    pub sent_position_handler: Box<dyn SentPositionHandler>,
    /// Notified of gateway errors not owned by a reply.
    pub gateway_error_handler: Box<dyn GatewayErrorHandler>,
    /// Notified of control-plane connect/disconnect.
    pub library_connect_handler: Box<dyn LibraryConnectHandler>,
}

impl LibraryConfiguration {
    /// Creates a configuration with defaults for everything but identity and
    /// channels.
    ///
    /// # Arguments
    /// * `library_id` - This library's id; must be positive
    /// * `library_channels` - Engine channels in round-robin order
    #[must_use]
    pub fn new(library_id: LibraryId, library_channels: Vec<String>) -> Self {
        Self {
            library_id,
            library_channels,
            reply_timeout_ms: DEFAULT_REPLY_TIMEOUT_MS,
            reconnect_attempts: DEFAULT_RECONNECT_ATTEMPTS,
            default_heartbeat_interval_s: DEFAULT_HEARTBEAT_INTERVAL_S,
            session_acquire_handler: Box::new(NoOpSessionAcquireHandler),
            session_exists_handler: Box::new(NoOpSessionExistsHandler),
            sent_position_handler: Box::new(NoOpSentPositionHandler),
            gateway_error_handler: Box::new(LoggingGatewayErrorHandler),
            library_connect_handler: Box::new(NoOpLibraryConnectHandler),
        }
    }

    /// Sets the reply timeout.
    #[must_use]
    pub const fn with_reply_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.reply_timeout_ms = timeout_ms;
        self
    }

    /// Sets the reconnect attempt budget.
    #[must_use]
    pub const fn with_reconnect_attempts(mut self, attempts: usize) -> Self {
        self.reconnect_attempts = attempts;
        self
    }

    /// Sets the default heartbeat interval for initiated sessions.
    #[must_use]
    pub const fn with_default_heartbeat_interval_s(mut self, interval_s: u32) -> Self {
        self.default_heartbeat_interval_s = interval_s;
        self
    }

    /// Sets the session-acquire handler.
    #[must_use]
    pub fn with_session_acquire_handler(
        mut self,
        handler: Box<dyn SessionAcquireHandler>,
    ) -> Self {
        self.session_acquire_handler = handler;
        self
    }

    /// Sets the session-exists handler.
    #[must_use]
    pub fn with_session_exists_handler(mut self, handler: Box<dyn SessionExistsHandler>) -> Self {
        self.session_exists_handler = handler;
        self
    }

    /// Sets the sent-position handler.
    #[must_use]
    pub fn with_sent_position_handler(mut self, handler: Box<dyn SentPositionHandler>) -> Self {
        self.sent_position_handler = handler;
        self
    }

    /// Sets the gateway error handler.
    #[must_use]
    pub fn with_gateway_error_handler(mut self, handler: Box<dyn GatewayErrorHandler>) -> Self {
        self.gateway_error_handler = handler;
        self
    }

    /// Sets the library connect handler.
    #[must_use]
    pub fn with_library_connect_handler(
        mut self,
        handler: Box<dyn LibraryConnectHandler>,
    ) -> Self {
        self.library_connect_handler = handler;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns [`LibraryError::InvalidConfiguration`] on a non-positive
    /// library id, an empty channel list, or a zero reply timeout.
    pub fn validate(&self) -> Result<(), LibraryError> {
        if self.library_id.value() <= 0 {
            return Err(LibraryError::InvalidConfiguration(format!(
                "library id must be positive, got {}",
                self.library_id
            )));
        }
        if self.library_channels.is_empty() {
            return Err(LibraryError::InvalidConfiguration(
                "at least one library channel is required".to_string(),
            ));
        }
        if self.library_channels.iter().any(String::is_empty) {
            return Err(LibraryError::InvalidConfiguration(
                "library channels must be non-empty strings".to_string(),
            ));
        }
        if self.reply_timeout_ms == 0 {
            return Err(LibraryError::InvalidConfiguration(
                "reply timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Checks whether more than one engine channel is configured.
    #[must_use]
    pub fn engines_are_clustered(&self) -> bool {
        self.library_channels.len() > 1
    }
}

/// Configuration for one initiated session.
#[derive(Debug, Clone)]
pub struct SessionConfiguration {
    host: String,
    port: u16,
    sender_comp_id: CompId,
    target_comp_id: CompId,
    sender_sub_id: String,
    sender_location_id: String,
    username: String,
    password: String,
    initial_sequence_number: Option<i32>,
    sequence_numbers_persistent: bool,
}

impl SessionConfiguration {
    /// Creates a session configuration with required fields.
    ///
    /// # Arguments
    /// * `host` - Counterparty host to dial
    /// * `port` - Counterparty port
    /// * `sender_comp_id` - Our comp id
    /// * `target_comp_id` - Counterparty comp id
    ///
    /// # Errors
    /// Returns [`LibraryError::InvalidConfiguration`] when a comp id is not
    /// a valid bounded printable-ASCII identifier or the host is empty.
    pub fn new(
        host: impl Into<String>,
        port: u16,
        sender_comp_id: &str,
        target_comp_id: &str,
    ) -> Result<Self, LibraryError> {
        let host = host.into();
        if host.is_empty() {
            return Err(LibraryError::InvalidConfiguration(
                "host must not be empty".to_string(),
            ));
        }
        let sender = CompId::new(sender_comp_id).ok_or_else(|| {
            LibraryError::InvalidConfiguration(format!("invalid sender comp id: {sender_comp_id}"))
        })?;
        let target = CompId::new(target_comp_id).ok_or_else(|| {
            LibraryError::InvalidConfiguration(format!("invalid target comp id: {target_comp_id}"))
        })?;

        Ok(Self {
            host,
            port,
            sender_comp_id: sender,
            target_comp_id: target,
            sender_sub_id: String::new(),
            sender_location_id: String::new(),
            username: String::new(),
            password: String::new(),
            initial_sequence_number: None,
            sequence_numbers_persistent: false,
        })
    }

    /// Sets the sender sub id.
    #[must_use]
    pub fn with_sender_sub_id(mut self, sub_id: impl Into<String>) -> Self {
        self.sender_sub_id = sub_id.into();
        self
    }

    /// Sets the sender location id.
    #[must_use]
    pub fn with_sender_location_id(mut self, location_id: impl Into<String>) -> Self {
        self.sender_location_id = location_id.into();
        self
    }

    /// Sets the logon credentials.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Sets an explicit initial sequence number.
    #[must_use]
    pub const fn with_initial_sequence_number(mut self, initial: i32) -> Self {
        self.initial_sequence_number = Some(initial);
        self
    }

    /// Sets whether sequence numbers persist across logons.
    #[must_use]
    pub const fn with_sequence_numbers_persistent(mut self, persistent: bool) -> Self {
        self.sequence_numbers_persistent = persistent;
        self
    }

    /// Returns the counterparty host.
    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Returns the counterparty port.
    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// Returns our comp id.
    #[must_use]
    pub const fn sender_comp_id(&self) -> &CompId {
        &self.sender_comp_id
    }

    /// Returns the counterparty comp id.
    #[must_use]
    pub const fn target_comp_id(&self) -> &CompId {
        &self.target_comp_id
    }

    /// Returns the sender sub id.
    #[must_use]
    pub fn sender_sub_id(&self) -> &str {
        &self.sender_sub_id
    }

    /// Returns the sender location id.
    #[must_use]
    pub fn sender_location_id(&self) -> &str {
        &self.sender_location_id
    }

    /// Returns the logon username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the logon password.
    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }

    /// Returns the explicit initial sequence number, when set.
    #[must_use]
    pub const fn initial_sequence_number(&self) -> Option<i32> {
        self.initial_sequence_number
    }

    /// Checks whether sequence numbers persist across logons.
    #[must_use]
    pub const fn sequence_numbers_persistent(&self) -> bool {
        self.sequence_numbers_persistent
    }

    /// Returns the wire-level sequence number type for this configuration.
    #[must_use]
    pub const fn sequence_number_type(&self) -> SequenceNumberType {
        if self.initial_sequence_number.is_some() {
            SequenceNumberType::Determined
        } else if self.sequence_numbers_persistent {
            SequenceNumberType::Persistent
        } else {
            SequenceNumberType::Transient
        }
    }
}
