//! Event counters for sends, receives, and client-side errors.
//!
//! Protocol failures in this client are drops, not exceptions: every drop
//! increments a counter here and emits a log line, and the counters are
//! exported to the server through info messages. Tests assert on them
//! directly.

use std::collections::HashMap;

/// Kinds of outbound frames and sub-messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SentMessageType {
    /// An info sub-message was sent
    Info,
    /// An initialize sub-message was sent
    Initialize,
    /// An invalidation-ack sub-message was sent
    InvalidationAck,
    /// A registration sub-message was sent
    Registration,
    /// A registration-sync sub-message was sent
    RegistrationSync,
    /// A frame reached the network channel
    Total,
}

impl SentMessageType {
    fn name(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Initialize => "initialize",
            Self::InvalidationAck => "invalidation_ack",
            Self::Registration => "registration",
            Self::RegistrationSync => "registration_sync",
            Self::Total => "total",
        }
    }
}

/// Kinds of inbound frames and sub-messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReceivedMessageType {
    /// An info-request sub-message was dispatched
    InfoRequest,
    /// An invalidation sub-message was dispatched
    Invalidation,
    /// A registration-status sub-message was dispatched
    RegistrationStatus,
    /// A registration-sync-request sub-message was dispatched
    RegistrationSyncRequest,
    /// A token-control sub-message was dispatched
    TokenControl,
    /// An error sub-message was dispatched
    ErrorMessage,
    /// A config-change sub-message took the shortcut path
    ConfigChange,
    /// A frame passed structural validation
    Total,
}

impl ReceivedMessageType {
    fn name(self) -> &'static str {
        match self {
            Self::InfoRequest => "info_request",
            Self::Invalidation => "invalidation",
            Self::RegistrationStatus => "registration_status",
            Self::RegistrationSyncRequest => "registration_sync_request",
            Self::TokenControl => "token_control",
            Self::ErrorMessage => "error_message",
            Self::ConfigChange => "config_change",
            Self::Total => "total",
        }
    }
}

/// Client-side error conditions. Recorded, never thrown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientErrorType {
    /// Structural validation failed on an inbound frame
    IncomingMessageFailure,
    /// Structural validation failed on an outbound frame
    OutgoingMessageFailure,
    /// Inbound frame had an incompatible protocol major version
    ProtocolVersionFailure,
    /// Inbound token differed from the listener's current token
    TokenMismatch,
    /// Attempted to send a non-initialize frame with no session token
    TokenMissingFailure,
    /// A success reply contradicted the locally desired registration state
    RegistrationDiscrepancy,
}

impl ClientErrorType {
    fn name(self) -> &'static str {
        match self {
            Self::IncomingMessageFailure => "incoming_message_failure",
            Self::OutgoingMessageFailure => "outgoing_message_failure",
            Self::ProtocolVersionFailure => "protocol_version_failure",
            Self::TokenMismatch => "token_mismatch",
            Self::TokenMissingFailure => "token_missing_failure",
            Self::RegistrationDiscrepancy => "registration_discrepancy",
        }
    }
}

/// Counter table keyed by the three event enums.
#[derive(Debug, Default)]
pub struct Statistics {
    sent: HashMap<SentMessageType, u64>,
    received: HashMap<ReceivedMessageType, u64>,
    errors: HashMap<ClientErrorType, u64>,
}

impl Statistics {
    /// Create an empty counter table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an outbound event.
    pub fn record_sent_message(&mut self, kind: SentMessageType) {
        *self.sent.entry(kind).or_insert(0) += 1;
    }

    /// Record an inbound event.
    pub fn record_received_message(&mut self, kind: ReceivedMessageType) {
        *self.received.entry(kind).or_insert(0) += 1;
    }

    /// Record a client error.
    pub fn record_error(&mut self, kind: ClientErrorType) {
        *self.errors.entry(kind).or_insert(0) += 1;
    }

    /// How many times the outbound event has been recorded.
    #[must_use]
    pub fn sent_count(&self, kind: SentMessageType) -> u64 {
        self.sent.get(&kind).copied().unwrap_or(0)
    }

    /// How many times the inbound event has been recorded.
    #[must_use]
    pub fn received_count(&self, kind: ReceivedMessageType) -> u64 {
        self.received.get(&kind).copied().unwrap_or(0)
    }

    /// How many times the error has been recorded.
    #[must_use]
    pub fn error_count(&self, kind: ClientErrorType) -> u64 {
        self.errors.get(&kind).copied().unwrap_or(0)
    }

    /// Non-zero counters as `(name, value)` pairs, for info messages.
    ///
    /// Values saturate at `i32::MAX` since the wire carries 32-bit
    /// properties.
    #[must_use]
    pub fn performance_counters(&self) -> Vec<(String, i32)> {
        let mut out = Vec::new();
        for (kind, count) in &self.sent {
            out.push((format!("sent.{}", kind.name()), clamp_counter(*count)));
        }
        for (kind, count) in &self.received {
            out.push((format!("received.{}", kind.name()), clamp_counter(*count)));
        }
        for (kind, count) in &self.errors {
            out.push((format!("error.{}", kind.name()), clamp_counter(*count)));
        }
        out.sort();
        out
    }
}

fn clamp_counter(count: u64) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_start_at_zero() {
        let stats = Statistics::new();
        assert_eq!(stats.sent_count(SentMessageType::Total), 0);
        assert_eq!(stats.received_count(ReceivedMessageType::Total), 0);
        assert_eq!(stats.error_count(ClientErrorType::TokenMismatch), 0);
    }

    #[test]
    fn recording_increments() {
        let mut stats = Statistics::new();
        stats.record_sent_message(SentMessageType::Registration);
        stats.record_sent_message(SentMessageType::Registration);
        stats.record_error(ClientErrorType::RegistrationDiscrepancy);

        assert_eq!(stats.sent_count(SentMessageType::Registration), 2);
        assert_eq!(stats.error_count(ClientErrorType::RegistrationDiscrepancy), 1);
        assert_eq!(stats.sent_count(SentMessageType::Total), 0);
    }

    #[test]
    fn performance_counters_skip_zero_entries() {
        let mut stats = Statistics::new();
        stats.record_received_message(ReceivedMessageType::Invalidation);

        let counters = stats.performance_counters();
        assert_eq!(counters, vec![("received.invalidation".to_string(), 1)]);
    }
}
