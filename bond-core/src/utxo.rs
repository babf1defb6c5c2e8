//! UTXO input/output wire records and the UTXO set.
//!
//! Grounded on `examples/original_source/utxo.py`'s `UTXO_INPUT`/
//! `UTXO_OUTPUT` classes, adapted to the fixed-width layout of spec §3.

use shared::codec::{decode_u64, decode_u8, encode_u64, encode_u8, take};
use shared::types::{Amount, OutPoint, OutputIndex};
use shared::{BlockchainError, Hash256, Result};
use std::collections::HashMap;

/// `tx_id(32B) || tx_index(1B) || sig_len(1B) || signature_hex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoInput {
    pub tx_id: Hash256,
    pub tx_index: OutputIndex,
    pub signature_hex: String,
}

impl UtxoInput {
    #[must_use]
    pub fn new(tx_id: Hash256, tx_index: OutputIndex, signature_hex: String) -> Self {
        Self {
            tx_id,
            tx_index,
            signature_hex,
        }
    }

    #[must_use]
    pub fn outpoint(&self) -> OutPoint {
        OutPoint::new(self.tx_id, self.tx_index)
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}{}",
            hex::encode(self.tx_id.as_bytes()),
            encode_u8(self.tx_index),
            encode_u8((self.signature_hex.len() / 2) as u8),
            self.signature_hex,
        )
    }

    /// Decodes one input starting at `raw[0..]`, returning `(input, hex_chars_consumed)`.
    pub fn decode(raw: &str) -> Result<(Self, usize)> {
        let tx_id_hex = take(raw, 0, 64)?;
        let tx_id = Hash256::try_from(tx_id_hex).map_err(|_| BlockchainError::CodecMismatch)?;
        let tx_index = decode_u8(take(raw, 64, 2)?)?;
        let sig_len = decode_u8(take(raw, 66, 2)?)? as usize;
        let sig_hex = take(raw, 68, sig_len * 2)?.to_string();
        let consumed = 68 + sig_len * 2;
        let input = Self::new(tx_id, tx_index, sig_hex);
        if input.encode().len() != consumed {
            return Err(BlockchainError::CodecMismatch);
        }
        Ok((input, consumed))
    }
}

/// `amount(8B) || addr_len(1B) || CPK_hex(33B)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UtxoOutput {
    pub amount: Amount,
    pub cpk_hex: String,
}

impl UtxoOutput {
    #[must_use]
    pub fn new(amount: Amount, cpk_hex: String) -> Self {
        Self { amount, cpk_hex }
    }

    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}",
            encode_u64(self.amount),
            encode_u8((self.cpk_hex.len() / 2) as u8),
            self.cpk_hex,
        )
    }

    pub fn decode(raw: &str) -> Result<(Self, usize)> {
        let amount = decode_u64(take(raw, 0, 16)?)?;
        let addr_len = decode_u8(take(raw, 16, 2)?)? as usize;
        let cpk_hex = take(raw, 18, addr_len * 2)?.to_string();
        let consumed = 18 + addr_len * 2;
        let output = Self::new(amount, cpk_hex);
        if output.encode().len() != consumed {
            return Err(BlockchainError::CodecMismatch);
        }
        Ok((output, consumed))
    }

    /// `SHA1(SHA256(CPK)) || first 4 bytes of SHA256(SHA256(SHA1(SHA256(CPK))))`,
    /// base58-encoded (spec §3).
    #[must_use]
    pub fn address(&self) -> String {
        crate::wallet::cpk_hex_to_address(&self.cpk_hex, 32)
    }
}

/// `(tx_id, tx_index) -> (amount, address_cpk)`, per spec §3/§9.
#[derive(Debug, Clone, Default)]
pub struct UtxoSet {
    entries: HashMap<OutPoint, UtxoOutput>,
}

impl UtxoSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, outpoint: &OutPoint) -> Option<&UtxoOutput> {
        self.entries.get(outpoint)
    }

    #[must_use]
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    pub fn insert(&mut self, outpoint: OutPoint, output: UtxoOutput) {
        self.entries.insert(outpoint, output);
    }

    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<UtxoOutput> {
        self.entries.remove(outpoint)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &UtxoOutput)> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utxo_input_round_trips() {
        let input = UtxoInput::new(Hash256::sha256(b"tx"), 1, "deadbeef".to_string());
        let encoded = input.encode();
        let (decoded, consumed) = UtxoInput::decode(&encoded).unwrap();
        assert_eq!(decoded, input);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn utxo_output_round_trips() {
        let output = UtxoOutput::new(1_000, "02".to_string() + &"ab".repeat(32));
        let encoded = output.encode();
        let (decoded, consumed) = UtxoOutput::decode(&encoded).unwrap();
        assert_eq!(decoded, output);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn utxo_set_insert_get_remove() {
        let mut set = UtxoSet::new();
        let outpoint = OutPoint::new(Hash256::sha256(b"tx"), 0);
        let output = UtxoOutput::new(5, "02".to_string() + &"11".repeat(32));
        set.insert(outpoint, output.clone());
        assert_eq!(set.get(&outpoint), Some(&output));
        assert_eq!(set.remove(&outpoint), Some(output));
        assert!(!set.contains(&outpoint));
    }
}
