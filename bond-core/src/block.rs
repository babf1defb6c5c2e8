//! Block header, block codec, Merkle root, and Merkle proofs.
//!
//! Layout follows spec §3/§4.5: a fixed-width header, a VLI transaction
//! count, and concatenated raw transactions. Grounded on the teacher's
//! `calculate_merkle_root` tree-walk shape (`bond-core/src/block.rs`),
//! adapted to hash `SHA256(tx_id_hex)` leaves instead of raw keccak bytes.

use crate::transaction::Transaction;
use shared::codec::{decode_u32, decode_u8, decode_vli, encode_u32, encode_vli, pad_hex, take};
use shared::{BlockchainError, Hash256, Result};

/// `version(1B) || prev_hash(32B) || merkle_root(32B) || target(4B) || nonce(4B) || timestamp(4B)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub version: u8,
    pub prev_hash: Hash256,
    pub merkle_root: Hash256,
    pub target_bits: u32,
    pub nonce: u32,
    pub timestamp: u32,
}

impl BlockHeader {
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{}{}{}{}{}{}",
            shared::codec::encode_u8(self.version),
            pad_hex(&hex::encode(self.prev_hash.as_bytes()), 64),
            pad_hex(&hex::encode(self.merkle_root.as_bytes()), 64),
            encode_u32(self.target_bits),
            encode_u32(self.nonce),
            encode_u32(self.timestamp),
        )
    }

    pub fn decode(raw: &str) -> Result<(Self, usize)> {
        let version = decode_u8(take(raw, 0, 2)?)?;
        let prev_hash =
            Hash256::try_from(take(raw, 2, 64)?).map_err(|_| BlockchainError::CodecMismatch)?;
        let merkle_root =
            Hash256::try_from(take(raw, 66, 64)?).map_err(|_| BlockchainError::CodecMismatch)?;
        let target_bits = decode_u32(take(raw, 130, 8)?)?;
        let nonce = decode_u32(take(raw, 138, 8)?)?;
        let timestamp = decode_u32(take(raw, 146, 8)?)?;
        let consumed = 154;
        let header = Self {
            version,
            prev_hash,
            merkle_root,
            target_bits,
            nonce,
            timestamp,
        };
        if header.encode().len() != consumed {
            return Err(BlockchainError::CodecMismatch);
        }
        Ok((header, consumed))
    }
}

/// Header plus the full list of raw transactions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    #[must_use]
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    #[must_use]
    pub fn raw_block(&self) -> String {
        let mut raw = self.header.encode();
        raw.push_str(&encode_vli(self.transactions.len() as u64));
        for tx in &self.transactions {
            raw.push_str(&tx.raw_tx());
        }
        raw
    }

    /// `block.id = SHA256(raw_block_hex_utf8)`.
    #[must_use]
    pub fn id(&self) -> Hash256 {
        Hash256::sha256_hex_utf8(&self.raw_block())
    }

    pub fn decode(raw: &str) -> Result<(Self, usize)> {
        let (header, header_len) = BlockHeader::decode(raw)?;
        let (tx_count, count_len) = decode_vli(&raw[header_len..])?;
        let mut offset = header_len + count_len;
        let mut transactions = Vec::with_capacity(tx_count as usize);
        for _ in 0..tx_count {
            let (tx, consumed) = Transaction::decode(&raw[offset..])?;
            transactions.push(tx);
            offset += consumed;
        }
        let block = Self::new(header, transactions);
        if block.raw_block().len() != offset {
            return Err(BlockchainError::CodecMismatch);
        }
        Ok((block, offset))
    }

    /// Recomputes the Merkle root over this block's transaction ids.
    #[must_use]
    pub fn merkle_root(&self) -> Hash256 {
        let tx_ids: Vec<Hash256> = self.transactions.iter().map(Transaction::id).collect();
        calculate_merkle_root(&tx_ids)
    }

    /// Builds a Merkle proof for the transaction at `index`.
    #[must_use]
    pub fn merkle_proof(&self, index: usize) -> Option<MerkleProof> {
        let tx_ids: Vec<Hash256> = self.transactions.iter().map(Transaction::id).collect();
        build_merkle_proof(&tx_ids, index)
    }
}

/// Leaf hash for a transaction id: `SHA256(tx_id_hex_utf8)` (spec §4.5 note 1).
#[must_use]
pub fn merkle_leaf(tx_id: &Hash256) -> Hash256 {
    Hash256::sha256_hex_utf8(&tx_id.to_string())
}

fn merkle_node(left: &Hash256, right: &Hash256) -> Hash256 {
    Hash256::sha256_hex_utf8(&format!("{left}{right}"))
}

/// Single-transaction blocks use the leaf hash as the root directly
/// (spec §4.5 edge case).
#[must_use]
pub fn calculate_merkle_root(tx_ids: &[Hash256]) -> Hash256 {
    if tx_ids.is_empty() {
        return Hash256::zero();
    }
    let mut layer: Vec<Hash256> = tx_ids.iter().map(merkle_leaf).collect();
    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(*layer.last().unwrap());
        }
        layer = layer
            .chunks(2)
            .map(|pair| merkle_node(&pair[0], &pair[1]))
            .collect();
    }
    layer[0]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// One sibling hash on the path from a leaf to the root, with the side it
/// sits on relative to the running hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: Hash256,
    pub siblings: Vec<(Hash256, Side)>,
}

impl MerkleProof {
    /// Recomputes the root implied by this proof and checks it matches `root`.
    #[must_use]
    pub fn verify(&self, root: &Hash256) -> bool {
        let mut current = self.leaf;
        for (sibling, side) in &self.siblings {
            current = match side {
                Side::Left => merkle_node(sibling, &current),
                Side::Right => merkle_node(&current, sibling),
            };
        }
        current == *root
    }
}

fn build_merkle_proof(tx_ids: &[Hash256], index: usize) -> Option<MerkleProof> {
    if index >= tx_ids.len() {
        return None;
    }
    let leaf = merkle_leaf(&tx_ids[index]);
    let mut siblings = Vec::new();
    let mut layer: Vec<Hash256> = tx_ids.iter().map(merkle_leaf).collect();
    let mut pos = index;

    while layer.len() > 1 {
        if layer.len() % 2 == 1 {
            layer.push(*layer.last().unwrap());
        }
        let sibling_pos = if pos % 2 == 0 { pos + 1 } else { pos - 1 };
        let side = if pos % 2 == 0 { Side::Right } else { Side::Left };
        siblings.push((layer[sibling_pos], side));
        layer = layer
            .chunks(2)
            .map(|pair| merkle_node(&pair[0], &pair[1]))
            .collect();
        pos /= 2;
    }

    Some(MerkleProof { leaf, siblings })
}
