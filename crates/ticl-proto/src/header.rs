//! Envelope headers for both directions of the protocol.
//!
//! Every frame starts with a header identifying the protocol version, the
//! session (via the client token), the sender's clock, and the sender's view
//! of the registration set. The header is what lets the server detect
//! registration divergence without inspecting the rest of the frame.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::types::{ProtocolVersion, RegistrationSummary};

/// Header on every client-to-server frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientHeader {
    /// Protocol version the client speaks
    pub protocol_version: ProtocolVersion,
    /// Client wall clock, in milliseconds
    pub client_time_ms: i64,
    /// Frame identifier; strictly monotonic within a process lifetime
    pub message_id: String,
    /// Highest server timestamp the client has observed
    pub max_known_server_time_ms: i64,
    /// The client's current registration summary
    pub registration_summary: RegistrationSummary,
    /// Session token; absent until the server has assigned one
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub client_token: Option<Bytes>,
}

/// Header on every server-to-client frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerHeader {
    /// Protocol version the server speaks
    pub protocol_version: ProtocolVersion,
    /// Token of the client session the server believes it is addressing
    pub client_token: Bytes,
    /// Server wall clock, in milliseconds
    pub server_time_ms: i64,
    /// Server-side frame identifier, for debugging only
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub message_id: Option<String>,
    /// The server's cached summary of the client's registration set
    pub registration_summary: RegistrationSummary,
}
