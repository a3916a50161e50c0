//! Protocol and client version constants.
//!
//! The protocol major version gates interoperability: inbound frames whose
//! major version differs from [`PROTOCOL_MAJOR_VERSION`] are dropped. Minor
//! versions may differ freely.

use std::time::Duration;

use crate::types::{ClientVersion, ProtocolVersion, Version};

/// Major version of the wire protocol this crate speaks.
pub const PROTOCOL_MAJOR_VERSION: i32 = 3;

/// Minor version of the wire protocol this crate speaks.
pub const PROTOCOL_MINOR_VERSION: i32 = 2;

/// Major version of the client library.
pub const CLIENT_MAJOR_VERSION: i32 = 3;

/// Minor version of the client library.
pub const CLIENT_MINOR_VERSION: i32 = 0;

/// Implementation language advertised in [`ClientVersion`].
pub const CLIENT_LANGUAGE: &str = "Rust";

/// Default delay before the batching task flushes staged outbound work.
pub const DEFAULT_BATCHING_DELAY: Duration = Duration::from_millis(500);

/// The protocol version advertised in every outbound header.
#[must_use]
pub fn protocol_version() -> ProtocolVersion {
    ProtocolVersion {
        version: Version {
            major_version: PROTOCOL_MAJOR_VERSION,
            minor_version: PROTOCOL_MINOR_VERSION,
        },
    }
}

/// Build the client version record sent in info messages.
#[must_use]
pub fn client_version(platform: &str, application_info: &str) -> ClientVersion {
    ClientVersion {
        version: Version {
            major_version: CLIENT_MAJOR_VERSION,
            minor_version: CLIENT_MINOR_VERSION,
        },
        platform: platform.to_string(),
        language: CLIENT_LANGUAGE.to_string(),
        application_info: application_info.to_string(),
    }
}
