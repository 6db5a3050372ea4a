//! Hashing and hex helpers
//!
//! Registry identities use `0x`-prefixed lowercase hex for Solana keys and
//! opaque byte payloads; content hashes are keccak256.

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Encode bytes as `0x`-prefixed lowercase hex
pub fn encode_0x(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}
