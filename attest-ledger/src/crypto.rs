//! Hashing primitives for the ledger
//!
//! Everything the ledger hashes goes through SHA-256 and is rendered as
//! lowercase hex, the form stored in blocks and compared by verification.

use sha2::{Digest, Sha256};

/// Length of a hex-encoded SHA-256 digest
pub const HASH_HEX_LEN: usize = 64;

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 of `data` as lowercase hex
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(hash_bytes(data))
}

/// Content hash for externally held content.
///
/// Clients normally compute this themselves; the helper exists so callers
/// and tests produce exactly the form the ledger expects.
pub fn content_hash(content: &[u8]) -> String {
    sha256_hex(content)
}

/// Whether `s` is 64 lowercase hex characters
pub fn is_sha256_hex(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}

/// Whether `s` is 64 hex characters of either case
pub(crate) fn is_hex_digest(s: &str) -> bool {
    s.len() == HASH_HEX_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}
