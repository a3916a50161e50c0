//! Fuzzer for envelope decoding.
//!
//! Feeds arbitrary bytes to both envelope decoders. Decoding untrusted
//! network input must never panic, and anything that decodes must survive
//! a re-encode/re-decode round trip unchanged.

#![no_main]

use libfuzzer_sys::fuzz_target;
use ticl_proto::{ClientToServerMessage, ServerToClientMessage};

fuzz_target!(|data: &[u8]| {
    // INVARIANT 1: decoding arbitrary bytes never panics.
    if let Ok(message) = ServerToClientMessage::decode(data) {
        // INVARIANT 2: anything decodable round-trips unchanged.
        let encoded = message.encode().expect("re-encode of decoded envelope should succeed");
        let again = ServerToClientMessage::decode(&encoded)
            .expect("decode of re-encoded envelope should succeed");
        assert_eq!(message, again);
    }

    if let Ok(message) = ClientToServerMessage::decode(data) {
        let encoded = message.encode().expect("re-encode of decoded envelope should succeed");
        let again = ClientToServerMessage::decode(&encoded)
            .expect("decode of re-encoded envelope should succeed");
        assert_eq!(message, again);
    }
});
