use num_bigint::BigUint;
use serde::{Deserialize, Serialize};
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::fmt;

/// 256-bit hash used to identify transactions and blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    #[must_use]
    pub const fn zero() -> Self {
        Self([0u8; 32])
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// SHA-256 of the given bytes. The ledger hashes UTF-8 hex text, not raw
    /// binary, everywhere a `tx.id`/`block.id` is computed (spec §3/§4.4).
    #[must_use]
    pub fn sha256(data: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(data);
        let result = hasher.finalize();
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&result);
        Self(hash)
    }

    #[must_use]
    pub fn double_sha256(data: &[u8]) -> Self {
        Self::sha256(&Self::sha256(data).0)
    }

    /// SHA-256 of a UTF-8 hex string, the id/merkle-leaf convention used
    /// throughout the codec.
    #[must_use]
    pub fn sha256_hex_utf8(hex_text: &str) -> Self {
        Self::sha256(hex_text.as_bytes())
    }

    /// Interprets the hash as a big-endian 256-bit integer.
    #[must_use]
    pub fn to_biguint(&self) -> BigUint {
        BigUint::from_bytes_be(&self.0)
    }

    /// True if this hash, as an integer, is at or below the proof-of-work
    /// target implied by `target_bits` (§3 invariant 4: `id <= 2^(256-bits)`).
    #[must_use]
    pub fn meets_target(&self, target_bits: u32) -> bool {
        self.to_biguint() <= target_threshold(target_bits)
    }
}

/// `2^(256 - target_bits)`, the numeric threshold a block/candidate id must
/// not exceed.
#[must_use]
pub fn target_threshold(target_bits: u32) -> BigUint {
    let bits = target_bits.clamp(1, 255);
    BigUint::from(1u8) << (256 - bits as usize)
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl TryFrom<&str> for Hash256 {
    type Error = hex::FromHexError;

    fn try_from(hex_string: &str) -> Result<Self, Self::Error> {
        let bytes = hex::decode(hex_string)?;
        let mut hash = [0u8; 32];
        if bytes.len() != 32 {
            return Err(hex::FromHexError::InvalidStringLength);
        }
        hash.copy_from_slice(&bytes);
        Ok(Self(hash))
    }
}

/// SHA-1 digest, used only for the legacy address checksum chain
/// (`SHA1(SHA256(CPK))`, spec §3).
#[must_use]
pub fn sha1(data: &[u8]) -> [u8; 20] {
    let mut hasher = Sha1::new();
    hasher.update(data);
    let result = hasher.finalize();
    let mut out = [0u8; 20];
    out.copy_from_slice(&result);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_hash_displays_as_64_zeroes() {
        let hash = Hash256::zero();
        assert_eq!(hash.to_string(), "0".repeat(64));
    }

    #[test]
    fn sha256_is_deterministic_and_nonzero() {
        let h1 = Hash256::sha256(b"hello world");
        let h2 = Hash256::sha256(b"hello world");
        assert_eq!(h1, h2);
        assert_ne!(h1, Hash256::zero());
    }

    #[test]
    fn target_threshold_shrinks_as_bits_grow() {
        let low = target_threshold(8);
        let high = target_threshold(16);
        assert!(high < low);
    }

    #[test]
    fn meets_target_matches_numeric_comparison() {
        let hash = Hash256::from_bytes([0u8; 32]);
        assert!(hash.meets_target(255));
        let hash = Hash256::from_bytes([0xffu8; 32]);
        assert!(!hash.meets_target(255));
    }

    #[test]
    fn round_trips_through_hex() {
        let hash = Hash256::sha256(b"round-trip");
        let text = hash.to_string();
        let back = Hash256::try_from(text.as_str()).unwrap();
        assert_eq!(hash, back);
    }
}
