//! Low-level protocol message handling: framing, batching, token and pacing
//! discipline.
//!
//! The handler owns the request/response wire discipline between the client
//! and the invalidation service:
//!
//! - **Outbound**: initialize and info frames are built and sent
//!   immediately; registrations, invalidation acks, and sync subtrees are
//!   staged and flushed by a single batching task so that bursts of work
//!   collapse into one composite frame per delay window.
//! - **Inbound**: frames are decoded, structurally validated, version- and
//!   token-checked, then their sub-messages are dispatched to the
//!   [`ProtocolListener`] in a fixed order.
//!
//! The handler is a pure state machine in the style of the rest of this
//! crate: time arrives as a `now_ms` parameter and outbound frames are
//! returned as serialized byte vectors for the driver to hand to its network
//! channel. The driver is the single mutator; nothing here is internally
//! synchronized.
//!
//! # Failure semantics
//!
//! Every validation or precondition failure is a *drop*: the frame is
//! discarded, a counter on [`Statistics`] is incremented, and a log line is
//! emitted. Nothing is retried here; re-staging after a drop is the concern
//! of the layer above.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use bytes::Bytes;
use ticl_proto::{
    constants, ApplicationClientId, ClientHeader, ClientToServerMessage, ClientVersion,
    DigestSerializationType, ErrorCode, InfoMessage, InfoType, InitializeMessage, Invalidation,
    InvalidationMessage, ObjectId, PropertyRecord, ProtocolVersion, Registration,
    RegistrationMessage, RegistrationOpType, RegistrationStatus, RegistrationSubtree,
    RegistrationSummary, RegistrationSyncMessage, ServerToClientMessage, Status,
    TiclMessageValidator,
};

use crate::operation_scheduler::OperationScheduler;
use crate::statistics::{ClientErrorType, ReceivedMessageType, SentMessageType, Statistics};

/// The header of an inbound frame, as handed to listener upcalls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerMessageHeader {
    /// Token of the session the server believes it is addressing
    pub client_token: Bytes,
    /// Server wall clock at frame construction, in milliseconds
    pub server_time_ms: i64,
    /// The server's cached summary of this client's registration set
    pub registration_summary: RegistrationSummary,
    /// Protocol version the server spoke
    pub protocol_version: ProtocolVersion,
}

/// The upper layer the handler dispatches into.
///
/// The handler queries the listener for session state while building
/// outbound headers and makes upcalls while dispatching inbound frames. All
/// calls happen synchronously on the driving thread.
pub trait ProtocolListener {
    /// The current session token; empty when no session is established.
    fn client_token(&self) -> Bytes;

    /// The client's current registration summary, for outbound headers.
    fn registration_summary(&self) -> RegistrationSummary;

    /// The server assigned or destroyed the session token.
    fn handle_token_changed(
        &mut self,
        header: &ServerMessageHeader,
        new_token: Bytes,
        status: Status,
    );

    /// A frame passed all checks; the header carries the server's view of
    /// the registration summary and clock.
    fn handle_incoming_header(&mut self, header: &ServerMessageHeader);

    /// The server delivered invalidations.
    fn handle_invalidations(
        &mut self,
        header: &ServerMessageHeader,
        invalidations: Vec<Invalidation>,
    );

    /// The server reported outcomes for earlier registration operations.
    fn handle_registration_status(
        &mut self,
        header: &ServerMessageHeader,
        registration_statuses: Vec<RegistrationStatus>,
    );

    /// The server asked the client to upload registration subtrees.
    fn handle_registration_sync_request(&mut self, header: &ServerMessageHeader);

    /// The server asked for client diagnostics.
    fn handle_info_message(&mut self, header: &ServerMessageHeader, info_types: Vec<InfoType>);

    /// The server reported a protocol-level failure.
    fn handle_error_message(
        &mut self,
        header: &ServerMessageHeader,
        code: ErrorCode,
        description: String,
    );
}

/// Handler configuration.
#[derive(Debug, Clone)]
pub struct ProtocolHandlerConfig {
    /// Delay between the first staged operation and the batching flush
    pub batching_delay: Duration,
}

impl Default for ProtocolHandlerConfig {
    fn default() -> Self {
        Self { batching_delay: constants::DEFAULT_BATCHING_DELAY }
    }
}

/// Deferred operations the handler schedules for itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum HandlerOp {
    /// Flush staged outbound work into one composite frame
    Batching,
}

/// Client for interacting with low-level protocol messages.
pub struct ProtocolHandler {
    /// Client version record sent in info messages
    client_version: ClientVersion,
    /// Id for the next outbound frame; strictly monotonic, strides by two
    message_id: u32,
    /// Highest server timestamp observed on an accepted frame
    last_known_server_time_ms: i64,
    /// Quiet-period deadline; no frame leaves before this time
    next_message_send_time_ms: i64,
    /// Staged invalidation acks, deduplicated
    acked_invalidations: HashSet<Invalidation>,
    /// Staged registration ops, last-write-wins per object id
    pending_registrations: HashMap<ObjectId, RegistrationOpType>,
    /// Staged sync subtrees, deduplicated
    registration_subtrees: HashSet<RegistrationSubtree>,
    /// Debounce state for the batching task
    operations: OperationScheduler<HandlerOp>,
    /// Structural validator applied to every frame in both directions
    validator: TiclMessageValidator,
}

impl ProtocolHandler {
    /// Create a handler and declare its batching task.
    pub fn new(config: ProtocolHandlerConfig, platform: &str, application_name: &str) -> Self {
        let mut operations = OperationScheduler::new();
        operations.declare(HandlerOp::Batching, config.batching_delay);

        Self {
            client_version: constants::client_version(platform, application_name),
            message_id: 1,
            last_known_server_time_ms: 0,
            next_message_send_time_ms: 0,
            acked_invalidations: HashSet::new(),
            pending_registrations: HashMap::new(),
            registration_subtrees: HashSet::new(),
            operations,
            validator: TiclMessageValidator::new(),
        }
    }

    /// Highest server timestamp observed so far.
    #[must_use]
    pub fn last_known_server_time_ms(&self) -> i64 {
        self.last_known_server_time_ms
    }

    /// Current quiet-period deadline.
    #[must_use]
    pub fn next_message_send_time_ms(&self) -> i64 {
        self.next_message_send_time_ms
    }

    /// Adjust the batching delay; applies from the next staged operation.
    pub fn change_batching_delay(&mut self, delay: Duration) {
        self.operations.change_delay(HandlerOp::Batching, delay);
    }

    /// Build and immediately send a session-establishment frame.
    ///
    /// The only frame allowed to leave while the client has no token.
    /// Returns the serialized frame, or `None` if it was dropped.
    pub fn send_initialize_message<L: ProtocolListener>(
        &mut self,
        client_type: i32,
        application_client_id: ApplicationClientId,
        nonce: Bytes,
        debug_tag: &str,
        listener: &L,
        stats: &mut Statistics,
        now_ms: i64,
    ) -> Option<Vec<u8>> {
        let initialize_message = InitializeMessage {
            client_type,
            nonce,
            application_client_id,
            digest_serialization_type: DigestSerializationType::ByteBased,
        };
        stats.record_sent_message(SentMessageType::Initialize);
        self.send_message_to_server(
            Some(initialize_message),
            None,
            &format!("Init-{debug_tag}"),
            listener,
            stats,
            now_ms,
        )
    }

    /// Build and immediately send a diagnostics frame.
    ///
    /// `request_server_summary` asks the server to reply with its cached
    /// registration summary, which the upper layer uses to detect
    /// divergence. Returns the serialized frame, or `None` if dropped.
    pub fn send_info_message<L: ProtocolListener>(
        &mut self,
        performance_counters: &[(String, i32)],
        config_params: &[(String, i32)],
        request_server_summary: bool,
        listener: &L,
        stats: &mut Statistics,
        now_ms: i64,
    ) -> Option<Vec<u8>> {
        let info_message = InfoMessage {
            client_version: self.client_version.clone(),
            config_parameters: property_records(config_params),
            performance_counters: property_records(performance_counters),
            server_registration_summary_requested: request_server_summary,
        };
        stats.record_sent_message(SentMessageType::Info);
        self.send_message_to_server(None, Some(info_message), "Info", listener, stats, now_ms)
    }

    /// Stage registration operations and arm the batching task.
    ///
    /// Later operations for the same object id overwrite earlier staged
    /// ones; only the final intent reaches the wire.
    pub fn send_registrations(
        &mut self,
        object_ids: &[ObjectId],
        op_type: RegistrationOpType,
        now_ms: i64,
    ) {
        for object_id in object_ids {
            self.pending_registrations.insert(object_id.clone(), op_type);
        }
        self.operations.schedule(HandlerOp::Batching, now_ms);
    }

    /// Stage an invalidation acknowledgement and arm the batching task.
    pub fn send_invalidation_ack(&mut self, invalidation: Invalidation, now_ms: i64) {
        self.acked_invalidations.insert(invalidation);
        self.operations.schedule(HandlerOp::Batching, now_ms);
    }

    /// Stage a registration subtree and arm the batching task.
    pub fn send_registration_sync_subtree(
        &mut self,
        subtree: RegistrationSubtree,
        now_ms: i64,
    ) {
        tracing::info!(subtree = ?subtree, "adding subtree");
        self.registration_subtrees.insert(subtree);
        self.operations.schedule(HandlerOp::Batching, now_ms);
    }

    /// Run any due deferred operations, returning the frames they produced.
    ///
    /// The driver calls this whenever its clock advances past a scheduled
    /// deadline; each due batching firing produces at most one frame.
    pub fn tick<L: ProtocolListener>(
        &mut self,
        listener: &L,
        stats: &mut Statistics,
        now_ms: i64,
    ) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        for op in self.operations.due(now_ms) {
            match op {
                HandlerOp::Batching => {
                    if let Some(frame) =
                        self.send_message_to_server(None, None, "BatchingTask", listener, stats, now_ms)
                    {
                        frames.push(frame);
                    }
                },
            }
        }
        frames
    }

    /// Process one inbound frame.
    ///
    /// Decodes, validates, version-checks, applies any pacing change,
    /// token-checks, then dispatches sub-messages to the listener in fixed
    /// order. Failures at any step drop the whole frame.
    pub fn handle_incoming_message<L: ProtocolListener>(
        &mut self,
        serialized: &[u8],
        listener: &mut L,
        stats: &mut Statistics,
        now_ms: i64,
    ) {
        let message = match ServerToClientMessage::decode(serialized) {
            Ok(message) => message,
            Err(error) => {
                tracing::warn!(%error, "incoming message is unparseable");
                return;
            },
        };

        // If this passes we can blindly assume valid messages from here on.
        if !self.validator.is_valid_inbound(&message) {
            stats.record_error(ClientErrorType::IncomingMessageFailure);
            tracing::error!(message = ?message, "received invalid message");
            return;
        }

        stats.record_received_message(ReceivedMessageType::Total);

        let header = ServerMessageHeader {
            client_token: message.header.client_token.clone(),
            server_time_ms: message.header.server_time_ms,
            registration_summary: message.header.registration_summary.clone(),
            protocol_version: message.header.protocol_version,
        };

        if message.header.protocol_version.version.major_version
            != constants::PROTOCOL_MAJOR_VERSION
        {
            stats.record_error(ClientErrorType::ProtocolVersionFailure);
            tracing::error!(
                version = ?message.header.protocol_version,
                "dropping message with incompatible version"
            );
            return;
        }

        // A pacing change preempts the rest of the frame, and applies even
        // before the token is checked.
        if let Some(config_change) = &message.config_change_message {
            stats.record_received_message(ReceivedMessageType::ConfigChange);
            if let Some(delay_ms) = config_change.next_message_delay_ms {
                self.next_message_send_time_ms = now_ms + delay_ms;
            }
            return;
        }

        if !self.check_server_token(&message.header.client_token, listener, stats) {
            return;
        }

        if message.header.server_time_ms > self.last_known_server_time_ms {
            self.last_known_server_time_ms = message.header.server_time_ms;
        }

        if let Some(token_control) = message.token_control_message {
            stats.record_received_message(ReceivedMessageType::TokenControl);
            let new_token = token_control.new_token.unwrap_or_default();
            listener.handle_token_changed(&header, new_token, token_control.status);
        }

        // Only now can we tell whether we hold a valid session: the token
        // upcall may have assigned a token, destroyed one, or rejected an
        // assign for a stale nonce. The remaining sub-messages are
        // meaningful only against a live session.
        if listener.client_token().is_empty() {
            return;
        }

        listener.handle_incoming_header(&header);

        if let Some(invalidation_message) = message.invalidation_message {
            stats.record_received_message(ReceivedMessageType::Invalidation);
            listener.handle_invalidations(&header, invalidation_message.invalidations);
        }
        if let Some(status_message) = message.registration_status_message {
            stats.record_received_message(ReceivedMessageType::RegistrationStatus);
            listener.handle_registration_status(&header, status_message.registration_statuses);
        }
        if message.registration_sync_request_message.is_some() {
            stats.record_received_message(ReceivedMessageType::RegistrationSyncRequest);
            listener.handle_registration_sync_request(&header);
        }
        if let Some(info_request) = message.info_request_message {
            stats.record_received_message(ReceivedMessageType::InfoRequest);
            listener.handle_info_message(&header, info_request.info_types);
        }
        if let Some(error_message) = message.error_message {
            stats.record_received_message(ReceivedMessageType::ErrorMessage);
            listener.handle_error_message(&header, error_message.code, error_message.description);
        }
    }

    /// Compare an inbound token against the listener's current token.
    ///
    /// With no client token there is nothing to compare; the frame is let
    /// through so a token-control sub-message can reach the listener.
    fn check_server_token<L: ProtocolListener>(
        &self,
        server_token: &Bytes,
        listener: &L,
        stats: &mut Statistics,
    ) -> bool {
        let client_token = listener.client_token();
        if client_token.is_empty() {
            return true;
        }
        if &client_token != server_token {
            tracing::warn!(
                client_token = ?client_token,
                server_token = ?server_token,
                "incoming message has bad token"
            );
            stats.record_error(ClientErrorType::TokenMismatch);
            return false;
        }
        true
    }

    /// Fill a composite frame and hand it off.
    ///
    /// Applies the quiet period, the token precondition, fills the header,
    /// drains every staging buffer into the frame, validates, and
    /// serializes. Staging buffers are cleared only on the drain path, so a
    /// drop before it leaves the staged work intact for the next attempt.
    fn send_message_to_server<L: ProtocolListener>(
        &mut self,
        initialize_message: Option<InitializeMessage>,
        info_message: Option<InfoMessage>,
        debug_tag: &str,
        listener: &L,
        stats: &mut Statistics,
        now_ms: i64,
    ) -> Option<Vec<u8>> {
        if self.next_message_send_time_ms > now_ms {
            tracing::warn!(
                debug_tag,
                deadline_ms = self.next_message_send_time_ms,
                now_ms,
                "in quiet period: not sending message to server"
            );
            return None;
        }

        // Even when an initialize message is going out, staged registrations
        // and acks may ride along. Without a token and without an initialize
        // message, nothing may be sent at all.
        if listener.client_token().is_empty() && initialize_message.is_none() {
            tracing::warn!(debug_tag, "cannot send message: no token and no initialize message");
            stats.record_error(ClientErrorType::TokenMissingFailure);
            return None;
        }

        let header = self.init_client_header(listener, now_ms);
        let mut message = ClientToServerMessage {
            header,
            initialize_message,
            info_message,
            registration_message: None,
            invalidation_ack_message: None,
            registration_sync_message: None,
        };

        if !self.acked_invalidations.is_empty() {
            message.invalidation_ack_message = Some(InvalidationMessage {
                invalidations: self.acked_invalidations.drain().collect(),
            });
            stats.record_sent_message(SentMessageType::InvalidationAck);
        }

        if !self.pending_registrations.is_empty() {
            message.registration_message = Some(RegistrationMessage {
                registrations: self
                    .pending_registrations
                    .drain()
                    .map(|(object_id, op_type)| Registration { object_id, op_type })
                    .collect(),
            });
            stats.record_sent_message(SentMessageType::Registration);
        }

        if !self.registration_subtrees.is_empty() {
            message.registration_sync_message = Some(RegistrationSyncMessage {
                subtrees: self.registration_subtrees.drain().collect(),
            });
            stats.record_sent_message(SentMessageType::RegistrationSync);
        }

        // The id advances again after header init; outbound ids are
        // monotonic but not consecutive.
        self.message_id += 1;

        if !self.validator.is_valid_outbound(&message) {
            tracing::error!(debug_tag, message = ?message, "tried to send invalid message");
            stats.record_error(ClientErrorType::OutgoingMessageFailure);
            return None;
        }

        let serialized = match message.encode() {
            Ok(serialized) => serialized,
            Err(error) => {
                tracing::error!(debug_tag, %error, "failed to serialize outbound message");
                stats.record_error(ClientErrorType::OutgoingMessageFailure);
                return None;
            },
        };

        tracing::debug!(debug_tag, bytes = serialized.len(), "sending message to server");
        stats.record_sent_message(SentMessageType::Total);
        Some(serialized)
    }

    /// Fill an outbound header from current state and the listener.
    fn init_client_header<L: ProtocolListener>(
        &mut self,
        listener: &L,
        now_ms: i64,
    ) -> ClientHeader {
        let message_id = self.message_id.to_string();
        self.message_id += 1;

        let client_token = listener.client_token();
        let client_token = if client_token.is_empty() {
            None
        } else {
            tracing::debug!(token = ?client_token, "sending token on client-to-server message");
            Some(client_token)
        };

        ClientHeader {
            protocol_version: constants::protocol_version(),
            client_time_ms: now_ms,
            message_id,
            max_known_server_time_ms: self.last_known_server_time_ms,
            registration_summary: listener.registration_summary(),
            client_token,
        }
    }
}

fn property_records(pairs: &[(String, i32)]) -> Vec<PropertyRecord> {
    pairs
        .iter()
        .map(|(name, value)| PropertyRecord { name: name.clone(), value: *value })
        .collect()
}
