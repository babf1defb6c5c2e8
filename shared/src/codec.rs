//! Fixed-width hex encoding and the variable-length integer (VLI) prefix
//! used for blobs whose length is not known in advance (signatures,
//! addresses, transaction/output counts).

use crate::error::BlockchainError;

/// `n < 253` fits in one byte; wider values are tagged with a marker byte
/// and a fixed number of big-endian length bytes, mirroring
/// `examples/original_source/vli.py`.
const VLI_U16_MARKER: u8 = 0xFD;
const VLI_U32_MARKER: u8 = 0xFE;
const VLI_U64_MARKER: u8 = 0xFF;
const VLI_U16_THRESHOLD: u64 = 253;

/// Encodes `n` as a VLI hex string.
#[must_use]
pub fn encode_vli(n: u64) -> String {
    if n < VLI_U16_THRESHOLD {
        format!("{n:02x}")
    } else if n < 1 << 16 {
        format!("{VLI_U16_MARKER:02x}{:04x}", n as u16)
    } else if n < 1u64 << 32 {
        format!("{VLI_U32_MARKER:02x}{:08x}", n as u32)
    } else {
        format!("{VLI_U64_MARKER:02x}{n:016x}")
    }
}

/// Decodes a VLI at the start of `hex_text`, returning `(value, hex_chars_consumed)`.
pub fn decode_vli(hex_text: &str) -> Result<(u64, usize), BlockchainError> {
    if hex_text.len() < 2 {
        return Err(BlockchainError::TruncatedVli);
    }
    let marker = decode_u8(&hex_text[0..2])?;
    match marker {
        m if (m as u64) < VLI_U16_THRESHOLD => Ok((m as u64, 2)),
        m if m == VLI_U16_MARKER => {
            let end = 2 + 4;
            let slice = hex_text.get(2..end).ok_or(BlockchainError::TruncatedVli)?;
            Ok((decode_u16(slice)? as u64, end))
        }
        m if m == VLI_U32_MARKER => {
            let end = 2 + 8;
            let slice = hex_text.get(2..end).ok_or(BlockchainError::TruncatedVli)?;
            Ok((decode_u32(slice)? as u64, end))
        }
        m if m == VLI_U64_MARKER => {
            let end = 2 + 16;
            let slice = hex_text.get(2..end).ok_or(BlockchainError::TruncatedVli)?;
            Ok((decode_u64(slice)?, end))
        }
        _ => unreachable!("marker is a u8, all cases covered"),
    }
}

/// Reads a VLI-prefixed hex blob and returns `(blob_hex, hex_chars_consumed)`.
pub fn decode_vli_blob(hex_text: &str) -> Result<(String, usize), BlockchainError> {
    let (len, prefix_chars) = decode_vli(hex_text)?;
    let blob_chars = len as usize * 2;
    let end = prefix_chars + blob_chars;
    let blob = hex_text
        .get(prefix_chars..end)
        .ok_or(BlockchainError::TruncatedVli)?;
    Ok((blob.to_string(), end))
}

/// Encodes a byte blob as `vli(len(blob)) || blob_hex`.
#[must_use]
pub fn encode_vli_blob(blob_hex: &str) -> String {
    let byte_len = blob_hex.len() / 2;
    format!("{}{}", encode_vli(byte_len as u64), blob_hex)
}

pub fn decode_u8(hex_text: &str) -> Result<u8, BlockchainError> {
    u8::from_str_radix(hex_text, 16).map_err(|_| BlockchainError::CodecMismatch)
}

pub fn decode_u16(hex_text: &str) -> Result<u16, BlockchainError> {
    u16::from_str_radix(hex_text, 16).map_err(|_| BlockchainError::CodecMismatch)
}

pub fn decode_u32(hex_text: &str) -> Result<u32, BlockchainError> {
    u32::from_str_radix(hex_text, 16).map_err(|_| BlockchainError::CodecMismatch)
}

pub fn decode_u64(hex_text: &str) -> Result<u64, BlockchainError> {
    u64::from_str_radix(hex_text, 16).map_err(|_| BlockchainError::CodecMismatch)
}

#[must_use]
pub fn encode_u8(n: u8) -> String {
    format!("{n:02x}")
}

#[must_use]
pub fn encode_u32(n: u32) -> String {
    format!("{n:08x}")
}

#[must_use]
pub fn encode_u64(n: u64) -> String {
    format!("{n:016x}")
}

/// Left-pads a hex blob to `hex_chars` characters with zeroes, used for
/// fixed-width fields built from shorter big integers (prev_hash, merkle_root).
#[must_use]
pub fn pad_hex(hex_text: &str, hex_chars: usize) -> String {
    if hex_text.len() >= hex_chars {
        hex_text.to_string()
    } else {
        format!("{}{}", "0".repeat(hex_chars - hex_text.len()), hex_text)
    }
}

/// Slices `hex_chars` characters starting at `offset`, failing with
/// `TruncatedVli` rather than panicking on out-of-range input.
pub fn take(hex_text: &str, offset: usize, hex_chars: usize) -> Result<&str, BlockchainError> {
    hex_text
        .get(offset..offset + hex_chars)
        .ok_or(BlockchainError::TruncatedVli)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vli_small_values_use_one_byte() {
        assert_eq!(encode_vli(0), "00");
        assert_eq!(encode_vli(252), "fc");
    }

    #[test]
    fn vli_boundary_uses_fd_marker() {
        let enc = encode_vli(253);
        assert_eq!(&enc[0..2], "fd");
        assert_eq!(decode_vli(&enc).unwrap(), (253, 6));
    }

    #[test]
    fn vli_u32_tier_round_trips() {
        let n = 1u64 << 20;
        let enc = encode_vli(n);
        assert_eq!(&enc[0..2], "fe");
        assert_eq!(decode_vli(&enc).unwrap(), (n, 10));
    }

    #[test]
    fn vli_u64_tier_round_trips() {
        let n = 1u64 << 40;
        let enc = encode_vli(n);
        assert_eq!(&enc[0..2], "ff");
        assert_eq!(decode_vli(&enc).unwrap(), (n, 18));
    }

    #[test]
    fn vli_round_trip_matches_for_every_tier() {
        for n in [0u64, 1, 252, 253, 254, 65535, 65536, u32::MAX as u64, u32::MAX as u64 + 1] {
            let (decoded, _) = decode_vli(&encode_vli(n)).unwrap();
            assert_eq!(decoded, n, "failed for {n}");
        }
    }

    #[test]
    fn vli_blob_round_trips() {
        let blob = "deadbeef";
        let encoded = encode_vli_blob(blob);
        let (decoded, consumed) = decode_vli_blob(&encoded).unwrap();
        assert_eq!(decoded, blob);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn truncated_vli_is_rejected() {
        assert!(decode_vli("fd00").is_err());
    }

    #[test]
    fn pad_hex_left_pads_to_width() {
        assert_eq!(pad_hex("ab", 4), "00ab");
        assert_eq!(pad_hex("abcd", 4), "abcd");
    }
}
