//! Link hashing for the ledger chain.
//!
//! Each entry's hash commits to the previous entry's hash, its own sequence
//! number and its payload:
//!
//! ```text
//! hash(n) = hex( SHA-256( hash(n-1) ‖ be_u64(n) ‖ payload(n) ) )
//! ```
//!
//! `hash(0)` is [`GENESIS_HASH`]. Changing any byte of any payload changes
//! every later hash.

use sha2::{Digest, Sha256};

/// Predecessor hash of the first entry.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// Hash linking entry `sequence` with `payload` onto `prev_hash`.
#[must_use]
pub fn link_hash(prev_hash: &str, sequence: u64, payload: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(prev_hash.as_bytes());
    hasher.update(sequence.to_be_bytes());
    hasher.update(payload);
    hex::encode(hasher.finalize())
}
