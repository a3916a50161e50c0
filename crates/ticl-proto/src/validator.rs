//! Structural validation of parsed envelopes.
//!
//! Decoding proves an envelope is well-formed CBOR; this validator checks
//! the semantic constraints a decoder cannot express (non-negative
//! timestamps, positive pacing delays, non-empty identifiers). The protocol
//! handler runs every envelope through it — inbound before dispatch,
//! outbound before hand-off to the network — and treats validated messages
//! as trusted from then on.
//!
//! Validation failures are not errors: the caller gets `false` and a warn
//! log naming the offending field, and records the drop on its statistics.

use crate::envelope::{ClientToServerMessage, ServerToClientMessage};
use crate::header::{ClientHeader, ServerHeader};
use crate::types::Invalidation;

/// Structural predicate over parsed envelopes.
///
/// The validator is total: it never panics and never errors, it only
/// accepts or rejects.
#[derive(Debug, Default)]
pub struct TiclMessageValidator;

impl TiclMessageValidator {
    /// Create a validator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Check a server-to-client envelope.
    #[must_use]
    pub fn is_valid_inbound(&self, message: &ServerToClientMessage) -> bool {
        match check_inbound(message) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(reason, "rejecting inbound message");
                false
            },
        }
    }

    /// Check a client-to-server envelope.
    #[must_use]
    pub fn is_valid_outbound(&self, message: &ClientToServerMessage) -> bool {
        match check_outbound(message) {
            Ok(()) => true,
            Err(reason) => {
                tracing::warn!(reason, "rejecting outbound message");
                false
            },
        }
    }
}

fn check_inbound(message: &ServerToClientMessage) -> Result<(), &'static str> {
    check_server_header(&message.header)?;

    if let Some(invalidation_message) = &message.invalidation_message {
        for invalidation in &invalidation_message.invalidations {
            check_invalidation(invalidation)?;
        }
    }

    if let Some(config_change) = &message.config_change_message {
        if let Some(delay_ms) = config_change.next_message_delay_ms {
            if delay_ms <= 0 {
                return Err("config_change_message.next_message_delay_ms must be positive");
            }
        }
    }

    if let Some(error_message) = &message.error_message {
        if error_message.description.is_empty() {
            return Err("error_message.description is empty");
        }
    }

    Ok(())
}

fn check_outbound(message: &ClientToServerMessage) -> Result<(), &'static str> {
    check_client_header(&message.header)?;

    if let Some(initialize) = &message.initialize_message {
        if initialize.nonce.is_empty() {
            return Err("initialize_message.nonce is empty");
        }
        if initialize.application_client_id.client_name.is_empty() {
            return Err("initialize_message.application_client_id is empty");
        }
    }

    if let Some(ack_message) = &message.invalidation_ack_message {
        for invalidation in &ack_message.invalidations {
            check_invalidation(invalidation)?;
        }
    }

    if let Some(registration_message) = &message.registration_message {
        if registration_message.registrations.is_empty() {
            return Err("registration_message carries no registrations");
        }
    }

    if let Some(sync_message) = &message.registration_sync_message {
        if sync_message.subtrees.is_empty() {
            return Err("registration_sync_message carries no subtrees");
        }
    }

    Ok(())
}

fn check_client_header(header: &ClientHeader) -> Result<(), &'static str> {
    if header.client_time_ms < 0 {
        return Err("header.client_time_ms is negative");
    }
    if header.max_known_server_time_ms < 0 {
        return Err("header.max_known_server_time_ms is negative");
    }
    if header.message_id.is_empty() {
        return Err("header.message_id is empty");
    }
    if let Some(token) = &header.client_token {
        if token.is_empty() {
            return Err("header.client_token is present but empty");
        }
    }
    Ok(())
}

fn check_server_header(header: &ServerHeader) -> Result<(), &'static str> {
    if header.server_time_ms < 0 {
        return Err("header.server_time_ms is negative");
    }
    Ok(())
}

fn check_invalidation(invalidation: &Invalidation) -> Result<(), &'static str> {
    if invalidation.version < 0 {
        return Err("invalidation.version is negative");
    }
    Ok(())
}
