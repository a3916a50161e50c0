//! World state for protocol scenarios.
//!
//! `TiclWorld` wires a protocol handler, a recording listener, statistics,
//! and a simulated clock together the way a production client would, and
//! plays the network channel itself: every frame the handler produces is
//! decoded and appended to `sent_frames`.

use std::time::Duration;

use bytes::Bytes;
use ticl_core::protocol_handler::{ProtocolHandler, ProtocolHandlerConfig};
use ticl_core::statistics::Statistics;
use ticl_proto::{
    constants, ApplicationClientId, ClientToServerMessage, ObjectId, RegistrationOpType,
    RegistrationSummary, ServerHeader, ServerToClientMessage,
};

use crate::listener::RecordingListener;
use crate::sim_clock::SimClock;

/// A server-to-client frame with a plausible header and no sub-messages.
///
/// Tests fill in the sub-messages they care about.
#[must_use]
pub fn server_frame(client_token: impl Into<Bytes>, server_time_ms: i64) -> ServerToClientMessage {
    ServerToClientMessage {
        header: ServerHeader {
            protocol_version: constants::protocol_version(),
            client_token: client_token.into(),
            server_time_ms,
            message_id: Some("message-id-for-test".to_string()),
            registration_summary: RegistrationSummary {
                num_registrations: 4,
                registration_digest: Bytes::from_static(b"bogus digest"),
            },
        },
        token_control_message: None,
        invalidation_message: None,
        registration_status_message: None,
        registration_sync_request_message: None,
        info_request_message: None,
        config_change_message: None,
        error_message: None,
    }
}

/// Client-side world: handler + listener + statistics + clock, with the
/// harness standing in for the network channel.
pub struct TiclWorld {
    /// Simulated clock driving every timestamp
    pub clock: SimClock,
    /// The handler under test
    pub handler: ProtocolHandler,
    /// The recording upper layer
    pub listener: RecordingListener,
    /// Counter table shared with the handler
    pub stats: Statistics,
    /// Every frame the handler handed to the network, decoded, in order
    pub sent_frames: Vec<ClientToServerMessage>,
}

impl TiclWorld {
    /// Create a world with the given handler configuration.
    #[must_use]
    pub fn new(config: ProtocolHandlerConfig) -> Self {
        Self {
            clock: SimClock::new(),
            handler: ProtocolHandler::new(config, "test", "test"),
            listener: RecordingListener::new(),
            stats: Statistics::new(),
            sent_frames: Vec::new(),
        }
    }

    /// Current simulated time.
    #[must_use]
    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    /// Advance the clock and run any deferred work that came due.
    pub fn advance(&mut self, duration: Duration) {
        self.clock.advance(duration);
        let frames = self.handler.tick(&self.listener, &mut self.stats, self.clock.now_ms());
        self.capture(frames);
    }

    /// Send an initialize frame with the standard test identity.
    pub fn send_initialize(&mut self, client_type: i32, nonce: &'static [u8]) {
        let frame = self.handler.send_initialize_message(
            client_type,
            ApplicationClientId { client_name: Bytes::from_static(b"test-client-id") },
            Bytes::from_static(nonce),
            "test",
            &self.listener,
            &mut self.stats,
            self.clock.now_ms(),
        );
        self.capture(frame);
    }

    /// Send an info frame.
    pub fn send_info(
        &mut self,
        performance_counters: &[(String, i32)],
        config_params: &[(String, i32)],
        request_server_summary: bool,
    ) {
        let frame = self.handler.send_info_message(
            performance_counters,
            config_params,
            request_server_summary,
            &self.listener,
            &mut self.stats,
            self.clock.now_ms(),
        );
        self.capture(frame);
    }

    /// Stage registration operations.
    pub fn send_registrations(&mut self, object_ids: &[ObjectId], op_type: RegistrationOpType) {
        self.handler.send_registrations(object_ids, op_type, self.clock.now_ms());
    }

    /// Deliver a server frame to the handler, as the network would.
    pub fn deliver(&mut self, message: &ServerToClientMessage) {
        let serialized = message.encode().expect("server frame should encode");
        self.handler.handle_incoming_message(
            &serialized,
            &mut self.listener,
            &mut self.stats,
            self.clock.now_ms(),
        );
    }

    /// Deliver raw bytes to the handler, for malformed-input tests.
    pub fn deliver_raw(&mut self, serialized: &[u8]) {
        self.handler.handle_incoming_message(
            serialized,
            &mut self.listener,
            &mut self.stats,
            self.clock.now_ms(),
        );
    }

    /// The single sent frame, panicking unless exactly one was captured.
    #[must_use]
    pub fn only_sent_frame(&self) -> &ClientToServerMessage {
        assert_eq!(self.sent_frames.len(), 1, "expected exactly one sent frame");
        &self.sent_frames[0]
    }

    fn capture(&mut self, frames: impl IntoIterator<Item = Vec<u8>>) {
        for serialized in frames {
            let decoded = ClientToServerMessage::decode(&serialized)
                .expect("handler produced an undecodable frame");
            self.sent_frames.push(decoded);
        }
    }
}
