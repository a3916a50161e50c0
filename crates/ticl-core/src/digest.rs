//! Digest-function seam for the registration store.
//!
//! The registration digest must be computed the same way on the client and
//! the server, so the function is pluggable rather than hard-coded. The
//! store only requires that the function is deterministic and produces a
//! fixed-width output.

use bytes::Bytes;
use sha2::{Digest, Sha256};

/// A deterministic, fixed-output-width hash over byte strings.
pub trait DigestFunction {
    /// Digest the given bytes.
    fn digest(&self, data: &[u8]) -> Bytes;
}

/// SHA-256 digest function, the default deployment choice.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sha256Digest;

impl DigestFunction for Sha256Digest {
    fn digest(&self, data: &[u8]) -> Bytes {
        let mut hasher = Sha256::new();
        hasher.update(data);
        Bytes::copy_from_slice(&hasher.finalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_deterministic() {
        let digest_fn = Sha256Digest;
        assert_eq!(digest_fn.digest(b"abc"), digest_fn.digest(b"abc"));
        assert_ne!(digest_fn.digest(b"abc"), digest_fn.digest(b"abd"));
    }

    #[test]
    fn sha256_output_is_32_bytes() {
        assert_eq!(Sha256Digest.digest(b"").len(), 32);
        assert_eq!(Sha256Digest.digest(b"anything").len(), 32);
    }
}
