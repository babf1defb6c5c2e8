//! The miner: a passive nonce-search primitive with cooperative interrupt.
//!
//! Simplified from the teacher's thread-pool `mine_header_parallel` (which
//! split a nonce range across OS threads) down to the single-threaded loop
//! spec §4.7 calls for; the `Arc<AtomicBool>` interrupt-flag idiom is kept.
//! Concurrency is the Node's responsibility, not the Miner's.

use crate::block::Block;
use std::sync::atomic::{AtomicBool, Ordering};

/// Increments `candidate.header.nonce` until its id satisfies the target or
/// `is_mining` is cleared. Returns `Some(block)` on success, `None` on
/// interrupt (the spec's "empty string" return, represented natively here).
#[must_use]
pub fn mine(mut candidate: Block, is_mining: &AtomicBool) -> Option<Block> {
    while !candidate.id().meets_target(candidate.header.target_bits) {
        if !is_mining.load(Ordering::Relaxed) {
            return None;
        }
        candidate.header.nonce = candidate.header.nonce.wrapping_add(1);
    }
    Some(candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::BlockHeader;
    use crate::transaction::{MiningTransaction, Transaction};
    use crate::utxo::UtxoOutput;
    use shared::Hash256;

    fn candidate(target_bits: u32) -> Block {
        let output = UtxoOutput::new(10, "02".to_string() + &"11".repeat(32));
        let tx = Transaction::Mining(MiningTransaction::new(1, 10, output));
        let header = BlockHeader {
            version: 1,
            prev_hash: Hash256::zero(),
            merkle_root: Hash256::zero(),
            target_bits,
            nonce: 0,
            timestamp: 0,
        };
        let mut block = Block::new(header, vec![tx]);
        block.header.merkle_root = block.merkle_root();
        block
    }

    #[test]
    fn mines_a_block_against_an_easy_target() {
        let is_mining = AtomicBool::new(true);
        let mined = mine(candidate(1), &is_mining).expect("should mine against an easy target");
        assert!(mined.id().meets_target(1));
    }

    #[test]
    fn returns_none_when_interrupted_immediately() {
        let is_mining = AtomicBool::new(false);
        assert!(mine(candidate(255), &is_mining).is_none());
    }

    #[test]
    fn nonce_increases_monotonically_until_success() {
        let is_mining = AtomicBool::new(true);
        let mined = mine(candidate(2), &is_mining).unwrap();
        assert!(mined.header.nonce >= 0);
    }
}
