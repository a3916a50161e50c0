//! The two composite envelopes and their sub-messages.
//!
//! A frame in either direction is one envelope: a header plus any subset of
//! that direction's sub-messages. The codec is CBOR via `ciborium`; optional
//! sub-messages are omitted from the encoding entirely when absent.
//!
//! # Invariants
//!
//! - **Round-trip consistency**: Encoding an envelope and decoding the bytes
//!   MUST produce an equal value. Verified by round-trip tests.
//!
//! - **No hidden sub-messages**: Every sub-message slot is an explicit
//!   `Option` field. A decoder cannot smuggle in data the handler would not
//!   dispatch.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::{
    errors::{ProtocolError, Result},
    header::{ClientHeader, ServerHeader},
    types::{
        ClientVersion, DigestSerializationType, ErrorCode, InfoType, Invalidation,
        PropertyRecord, Registration, RegistrationStatus, RegistrationSubtree, Status,
    },
};

/// Session-establishment request, sent while the client has no token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeMessage {
    /// Application-defined client type
    pub client_type: i32,
    /// Fresh nonce echoed back by the server in its token-assign reply
    pub nonce: Bytes,
    /// Stable identity of the application instance
    pub application_client_id: ApplicationClientId,
    /// How object ids are serialized before digesting
    pub digest_serialization_type: DigestSerializationType,
}

/// Stable application-chosen client identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationClientId {
    /// Opaque application-chosen name for this client instance
    pub client_name: Bytes,
}

/// Client diagnostics pushed to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoMessage {
    /// Version and provenance of the client implementation
    pub client_version: ClientVersion,
    /// Configuration parameters in effect on the client
    pub config_parameters: Vec<PropertyRecord>,
    /// Performance counters collected by the client
    pub performance_counters: Vec<PropertyRecord>,
    /// Ask the server to reply with its cached registration summary
    pub server_registration_summary_requested: bool,
}

/// A batch of registration operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationMessage {
    /// The operations, at most one per object id
    pub registrations: Vec<Registration>,
}

/// A batch of invalidations.
///
/// Used in both directions: the server delivers invalidations with it, and
/// the client acknowledges them with it (as the ack sub-message).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvalidationMessage {
    /// The invalidations in the batch
    pub invalidations: Vec<Invalidation>,
}

/// A batch of registration subtrees answering a sync request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSyncMessage {
    /// The subtrees being reported
    pub subtrees: Vec<RegistrationSubtree>,
}

/// Server-driven session token assignment or destruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenControlMessage {
    /// The new session token; absent or empty destroys the session
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub new_token: Option<Bytes>,
    /// Outcome of the token operation
    pub status: Status,
}

/// Server-reported outcomes for earlier registration operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStatusMessage {
    /// One status per acknowledged registration operation
    pub registration_statuses: Vec<RegistrationStatus>,
}

/// Server request for the client to upload registration subtrees.
///
/// Carries no fields; its presence in the envelope is the request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSyncRequestMessage {}

/// Server request for client diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InfoRequestMessage {
    /// What kinds of information the server wants
    pub info_types: Vec<InfoType>,
}

/// Server-commanded pacing change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigChangeMessage {
    /// Quiet period: the client must not send any frame for this many
    /// milliseconds. Structurally required to be positive when present.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub next_message_delay_ms: Option<i64>,
}

/// Server-reported protocol-level failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    /// Error category
    pub code: ErrorCode,
    /// Human-readable description
    pub description: String,
}

/// One client-to-server frame: header plus any subset of outbound
/// sub-messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientToServerMessage {
    /// Frame header
    pub header: ClientHeader,
    /// Session-establishment request
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub initialize_message: Option<InitializeMessage>,
    /// Client diagnostics
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub info_message: Option<InfoMessage>,
    /// Batched registration operations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub registration_message: Option<RegistrationMessage>,
    /// Batched invalidation acknowledgements
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub invalidation_ack_message: Option<InvalidationMessage>,
    /// Batched registration subtrees
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub registration_sync_message: Option<RegistrationSyncMessage>,
}

impl ClientToServerMessage {
    /// Encode the envelope as CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode an envelope from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborDecode`] if the bytes are not a
    /// well-formed envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}

/// One server-to-client frame: header plus any subset of inbound
/// sub-messages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerToClientMessage {
    /// Frame header
    pub header: ServerHeader,
    /// Session token assignment or destruction
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub token_control_message: Option<TokenControlMessage>,
    /// Invalidations for objects in the registration set
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub invalidation_message: Option<InvalidationMessage>,
    /// Outcomes for earlier registration operations
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub registration_status_message: Option<RegistrationStatusMessage>,
    /// Request for the client to upload registration subtrees
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub registration_sync_request_message: Option<RegistrationSyncRequestMessage>,
    /// Request for client diagnostics
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub info_request_message: Option<InfoRequestMessage>,
    /// Pacing change; preempts every other sub-message in the frame
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub config_change_message: Option<ConfigChangeMessage>,
    /// Protocol-level failure report
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_message: Option<ErrorMessage>,
}

impl ServerToClientMessage {
    /// Encode the envelope as CBOR.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborEncode`] if serialization fails.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::ser::into_writer(self, &mut buf)
            .map_err(|e| ProtocolError::CborEncode(e.to_string()))?;
        Ok(buf)
    }

    /// Decode an envelope from CBOR bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::CborDecode`] if the bytes are not a
    /// well-formed envelope.
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        ciborium::de::from_reader(bytes).map_err(|e| ProtocolError::CborDecode(e.to_string()))
    }
}
