//! Supporting wire types shared by client and server envelopes.
//!
//! These are the building blocks referenced from message headers and
//! sub-messages: object identifiers, invalidations, registrations and their
//! statuses, summaries, subtrees, and version records.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

/// Identifier for an object tracked by the invalidation service.
///
/// This is the subscription key: a `(source, name)` pair with componentwise
/// equality. The `source` partitions the id space between publishers; the
/// `name` is an opaque byte string chosen by the publisher.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    /// Id space the name belongs to
    pub source: i32,
    /// Opaque object name within the source
    pub name: Bytes,
}

impl ObjectId {
    /// Create an object id from a source and a name.
    pub fn new(source: i32, name: impl Into<Bytes>) -> Self {
        Self { source, name: name.into() }
    }

    /// Canonical byte serialization used as digest input.
    ///
    /// Layout: big-endian `source` followed by the raw name bytes. Two
    /// object ids serialize identically iff they are equal, which is what
    /// makes the registration digest a function of the set.
    #[must_use]
    pub fn digest_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(4 + self.name.len());
        out.extend_from_slice(&self.source.to_be_bytes());
        out.extend_from_slice(&self.name);
        out
    }
}

/// A server notification that an object's cached value is out of date.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Invalidation {
    /// Object the notification refers to
    pub object_id: ObjectId,
    /// Whether `version` is a real version or a restart marker
    pub is_known_version: bool,
    /// Version of the object being invalidated; structurally required to be
    /// non-negative
    pub version: i64,
    /// Optional opaque payload attached by the publisher
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<Bytes>,
}

/// Whether a registration operation asserts or retracts interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum RegistrationOpType {
    /// Assert interest in an object's invalidations
    Register = 1,
    /// Retract interest
    Unregister = 2,
}

/// A registration operation for a single object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Registration {
    /// Object being (un)registered
    pub object_id: ObjectId,
    /// Which direction the operation goes
    pub op_type: RegistrationOpType,
}

/// Result code attached to a [`Status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum StatusCode {
    /// Operation succeeded
    Success = 1,
    /// Operation failed but may succeed if retried
    TransientFailure = 2,
    /// Operation failed and will not succeed if retried
    PermanentFailure = 3,
}

/// Outcome of an operation as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Result code
    pub code: StatusCode,
    /// Optional human-readable description of the outcome
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub description: Option<String>,
}

impl Status {
    /// A bare success status with no description.
    #[must_use]
    pub fn success() -> Self {
        Self { code: StatusCode::Success, description: None }
    }

    /// Whether the code is [`StatusCode::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.code == StatusCode::Success
    }
}

/// Server-reported outcome of a single registration operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationStatus {
    /// The registration the outcome refers to
    pub registration: Registration,
    /// The outcome itself
    pub status: Status,
}

/// Order-independent fingerprint of a registration set.
///
/// The server caches the client's last summary and compares it against the
/// summary in each client header to detect divergence cheaply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrationSummary {
    /// Cardinality of the registration set
    pub num_registrations: u32,
    /// Digest of the set under the client's digest function
    pub registration_digest: Bytes,
}

/// Subset of the registration set whose element digests share a bit prefix.
///
/// Sent in response to a registration-sync request so the server can
/// resynchronize incrementally.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RegistrationSubtree {
    /// Registered objects in the subtree, in no particular order
    pub registered_objects: Vec<ObjectId>,
}

/// A major/minor version pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Incompatible-change counter; peers with different majors cannot talk
    pub major_version: i32,
    /// Compatible-change counter
    pub minor_version: i32,
}

/// Version of the wire protocol spoken by a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolVersion {
    /// The protocol version number
    pub version: Version,
}

/// Version and provenance of the client implementation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientVersion {
    /// Client library version
    pub version: Version,
    /// Platform the client runs on (OS, device class, ...)
    pub platform: String,
    /// Implementation language
    pub language: String,
    /// Free-form application identifier supplied at construction
    pub application_info: String,
}

/// A named integer property, used for config parameters and perf counters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyRecord {
    /// Property name
    pub name: String,
    /// Property value
    pub value: i32,
}

/// What kind of information an [`crate::InfoRequestMessage`] asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum InfoType {
    /// Request the client's performance counters
    GetPerformanceCounters = 1,
}

/// Error category carried by an [`crate::ErrorMessage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum ErrorCode {
    /// The client's credentials were rejected
    AuthFailure = 1,
    /// Unclassified server-side failure
    Unknown = 10000,
}

/// How the client serializes object ids before digesting them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize_repr, Deserialize_repr)]
#[repr(i32)]
pub enum DigestSerializationType {
    /// Digest input is the canonical byte serialization of the object id
    ByteBased = 1,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_digest_bytes_distinguish_source() {
        let a = ObjectId::new(1, &b"name"[..]);
        let b = ObjectId::new(2, &b"name"[..]);
        assert_ne!(a.digest_bytes(), b.digest_bytes());
    }

    #[test]
    fn object_id_digest_bytes_are_canonical() {
        let a = ObjectId::new(7, &b"oid"[..]);
        let b = ObjectId::new(7, &b"oid"[..]);
        assert_eq!(a.digest_bytes(), b.digest_bytes());
    }

    #[test]
    fn status_success_helper() {
        assert!(Status::success().is_success());
        let failure = Status { code: StatusCode::PermanentFailure, description: None };
        assert!(!failure.is_success());
    }
}
