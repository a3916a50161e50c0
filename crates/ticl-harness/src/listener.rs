//! Recording listener for protocol-handler tests.
//!
//! Plays the role of the upper layer: answers the handler's token and
//! summary queries, records every upcall for later assertions, and applies
//! a simple token policy (adopt the new token on a successful token-control
//! upcall, keep the old one otherwise).

use bytes::Bytes;
use ticl_core::protocol_handler::{ProtocolListener, ServerMessageHeader};
use ticl_proto::{
    ErrorCode, InfoType, Invalidation, RegistrationStatus, RegistrationSummary, Status,
};

/// One recorded upcall.
#[derive(Debug, Clone, PartialEq)]
pub enum ListenerEvent {
    /// `handle_token_changed` was invoked
    TokenChanged {
        /// The token the server assigned (empty destroys the session)
        new_token: Bytes,
        /// Outcome attached to the token operation
        status: Status,
    },
    /// `handle_incoming_header` was invoked
    IncomingHeader {
        /// Server clock in the frame header
        server_time_ms: i64,
        /// The server's cached registration summary
        registration_summary: RegistrationSummary,
    },
    /// `handle_invalidations` was invoked
    Invalidations(Vec<Invalidation>),
    /// `handle_registration_status` was invoked
    RegistrationStatuses(Vec<RegistrationStatus>),
    /// `handle_registration_sync_request` was invoked
    RegistrationSyncRequest,
    /// `handle_info_message` was invoked
    InfoRequest(Vec<InfoType>),
    /// `handle_error_message` was invoked
    ErrorMessage {
        /// Error category
        code: ErrorCode,
        /// Human-readable description
        description: String,
    },
}

/// Listener that records upcalls and adopts tokens on success.
#[derive(Debug)]
pub struct RecordingListener {
    token: Bytes,
    registration_summary: RegistrationSummary,
    /// Every upcall the handler made, in order.
    pub events: Vec<ListenerEvent>,
}

impl RecordingListener {
    /// Create a listener with no session token and an empty summary.
    #[must_use]
    pub fn new() -> Self {
        Self {
            token: Bytes::new(),
            registration_summary: RegistrationSummary {
                num_registrations: 0,
                registration_digest: Bytes::new(),
            },
            events: Vec::new(),
        }
    }

    /// Create a listener that already holds a session token.
    #[must_use]
    pub fn with_token(token: impl Into<Bytes>) -> Self {
        let mut listener = Self::new();
        listener.token = token.into();
        listener
    }

    /// Overwrite the token directly, bypassing the token-control path.
    pub fn set_token(&mut self, token: impl Into<Bytes>) {
        self.token = token.into();
    }

    /// Set the summary returned to the handler's header queries.
    pub fn set_registration_summary(&mut self, summary: RegistrationSummary) {
        self.registration_summary = summary;
    }

    /// The current token.
    #[must_use]
    pub fn token(&self) -> Bytes {
        self.token.clone()
    }

    /// Events of a given shape, for assertions.
    #[must_use]
    pub fn invalidation_events(&self) -> Vec<&ListenerEvent> {
        self.events
            .iter()
            .filter(|event| matches!(event, ListenerEvent::Invalidations(_)))
            .collect()
    }
}

impl Default for RecordingListener {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolListener for RecordingListener {
    fn client_token(&self) -> Bytes {
        self.token.clone()
    }

    fn registration_summary(&self) -> RegistrationSummary {
        self.registration_summary.clone()
    }

    fn handle_token_changed(
        &mut self,
        _header: &ServerMessageHeader,
        new_token: Bytes,
        status: Status,
    ) {
        if status.is_success() {
            self.token = new_token.clone();
        }
        self.events.push(ListenerEvent::TokenChanged { new_token, status });
    }

    fn handle_incoming_header(&mut self, header: &ServerMessageHeader) {
        self.events.push(ListenerEvent::IncomingHeader {
            server_time_ms: header.server_time_ms,
            registration_summary: header.registration_summary.clone(),
        });
    }

    fn handle_invalidations(
        &mut self,
        _header: &ServerMessageHeader,
        invalidations: Vec<Invalidation>,
    ) {
        self.events.push(ListenerEvent::Invalidations(invalidations));
    }

    fn handle_registration_status(
        &mut self,
        _header: &ServerMessageHeader,
        registration_statuses: Vec<RegistrationStatus>,
    ) {
        self.events.push(ListenerEvent::RegistrationStatuses(registration_statuses));
    }

    fn handle_registration_sync_request(&mut self, _header: &ServerMessageHeader) {
        self.events.push(ListenerEvent::RegistrationSyncRequest);
    }

    fn handle_info_message(&mut self, _header: &ServerMessageHeader, info_types: Vec<InfoType>) {
        self.events.push(ListenerEvent::InfoRequest(info_types));
    }

    fn handle_error_message(
        &mut self,
        _header: &ServerMessageHeader,
        code: ErrorCode,
        description: String,
    ) {
        self.events.push(ListenerEvent::ErrorMessage { code, description });
    }
}
