//! # Ticl Protocol: Wire Format
//!
//! This crate defines the structured message shapes exchanged between a Ticl
//! client and the invalidation service, together with their CBOR codec.
//!
//! ## Protocol Design
//!
//! Every frame on the wire is a single CBOR-encoded envelope:
//! - **`ClientToServerMessage`**: a [`ClientHeader`] plus any subset of the
//!   outbound sub-messages (initialize, info, registrations, invalidation
//!   acks, registration-sync subtrees).
//! - **`ServerToClientMessage`**: a [`ServerHeader`] plus any subset of the
//!   inbound sub-messages (token control, invalidations, registration
//!   statuses, sync requests, info requests, config changes, errors).
//!
//! ## Implementation Notes
//!
//! - **CBOR for Everything**: Headers carry variable-length tokens and
//!   digests, so there is no fixed-width binary prelude. Optional
//!   sub-messages map directly onto optional CBOR map entries, which gives
//!   forward compatibility without version negotiation for every schema
//!   change.
//!
//! - **Explicit Schema**: Each sub-message is an explicit Rust struct. There
//!   is no generic-map parsing that could silently accept unexpected fields.
//!
//! - **Validation Is Separate**: Decoding only proves the bytes are
//!   well-formed CBOR of the right shape. Semantic constraints (positive
//!   config delays, non-negative invalidation versions, non-empty message
//!   ids) are checked by [`TiclMessageValidator`] so that the protocol
//!   handler can treat validated messages as trusted.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod constants;
pub mod envelope;
pub mod errors;
pub mod header;
pub mod types;
pub mod validator;

pub use envelope::{
    ApplicationClientId, ClientToServerMessage, ConfigChangeMessage, ErrorMessage,
    InfoMessage, InfoRequestMessage, InitializeMessage, InvalidationMessage,
    RegistrationMessage, RegistrationStatusMessage, RegistrationSyncMessage,
    RegistrationSyncRequestMessage, ServerToClientMessage, TokenControlMessage,
};
pub use errors::{ProtocolError, Result};
pub use header::{ClientHeader, ServerHeader};
pub use types::{
    ClientVersion, DigestSerializationType, ErrorCode, InfoType, Invalidation, ObjectId,
    PropertyRecord, ProtocolVersion, Registration, RegistrationOpType, RegistrationStatus,
    RegistrationSubtree, RegistrationSummary, Status, StatusCode, Version,
};
pub use validator::TiclMessageValidator;
