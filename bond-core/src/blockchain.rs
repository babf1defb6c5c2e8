//! The chain: block list, UTXO pool, add/pop, target/reward policy, and
//! genesis construction.
//!
//! Grounded on the teacher's `Blockchain` struct shape (`block_index` for
//! O(1) id lookup, a policy-bundle-in-struct approach) and on
//! `examples/original_source/blockchain.py`'s `add_block`/`pop_block`
//! staged-validation logic.

use crate::block::{Block, BlockHeader};
use crate::mining;
use crate::transaction::{GenesisTransaction, MiningTransaction, OrdinaryTransaction, Transaction};
use crate::utxo::{UtxoOutput, UtxoSet};
use crate::wallet;
use shared::types::OutPoint;
use shared::{BlockchainError, Curve, Hash256, Result};
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;

/// Address checksum width used when validating recorded output addresses.
/// Matches `wallet::DEFAULT_CHECKSUM_BITS`.
const CHECKSUM_BITS: u32 = crate::wallet::DEFAULT_CHECKSUM_BITS;

/// Fixed timestamp recorded on the genesis block header.
pub const GENESIS_TIMESTAMP: u32 = 1_600_000_000;

#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    block_index: HashMap<Hash256, usize>,
    utxo_set: UtxoSet,
    curve: Curve,
    total_mining_amount: u64,
    target_bits: u32,
    reward: u32,
    heartbeat_seconds: u32,
    last_breath: u32,
}

impl Blockchain {
    /// Mines and records the genesis block, carrying the curve, reward,
    /// target, and heartbeat parameters for the whole chain (spec §2, §4.6).
    #[must_use]
    pub fn new(
        curve: Curve,
        total_mine_amount: u64,
        starting_reward: u32,
        starting_target: u8,
        heartbeat_seconds: u16,
    ) -> Self {
        let genesis_tx = Transaction::Genesis(GenesisTransaction {
            curve_a: curve.a.to_biguint().unwrap_or_default(),
            curve_b: curve.b.to_biguint().unwrap_or_default(),
            curve_p: curve.p.clone(),
            generator_x: curve.g.x().cloned().unwrap_or_default(),
            generator_y: curve.g.y().cloned().unwrap_or_default(),
            order: curve.n.clone(),
            total_mine_amount,
            starting_reward,
            starting_target,
            heartbeat_seconds,
        });
        let header = BlockHeader {
            version: 1,
            prev_hash: Hash256::zero(),
            merkle_root: Hash256::zero(),
            target_bits: starting_target as u32,
            nonce: 0,
            timestamp: GENESIS_TIMESTAMP,
        };
        let mut candidate = Block::new(header, vec![genesis_tx]);
        candidate.header.merkle_root = candidate.merkle_root();
        let mined = mining::mine(candidate, &AtomicBool::new(true))
            .expect("genesis target is always satisfiable");

        let mut block_index = HashMap::new();
        block_index.insert(mined.id(), 0);

        Self {
            blocks: vec![mined],
            block_index,
            utxo_set: UtxoSet::new(),
            curve,
            total_mining_amount: total_mine_amount,
            target_bits: starting_target as u32,
            reward: starting_reward,
            heartbeat_seconds: heartbeat_seconds as u32,
            last_breath: GENESIS_TIMESTAMP,
        }
    }

    /// Convenience constructor matching the defaults used across the spec's
    /// scenarios: secp256k1, a 21M-unit supply, reward 50, target bits 20,
    /// heartbeat 60s.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::new(Curve::secp256k1(), 21_000_000, 50, 20, 60)
    }

    #[must_use]
    pub fn height(&self) -> u64 {
        (self.blocks.len() - 1) as u64
    }

    #[must_use]
    pub fn last_block(&self) -> &Block {
        self.blocks.last().expect("chain always has genesis")
    }

    #[must_use]
    pub fn block_at(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    #[must_use]
    pub fn utxo_set(&self) -> &UtxoSet {
        &self.utxo_set
    }

    #[must_use]
    pub fn target_bits(&self) -> u32 {
        self.target_bits
    }

    #[must_use]
    pub fn reward(&self) -> u32 {
        self.reward
    }

    #[must_use]
    pub fn total_mining_amount(&self) -> u64 {
        self.total_mining_amount
    }

    #[must_use]
    pub fn curve(&self) -> &Curve {
        &self.curve
    }

    #[must_use]
    pub fn hashlist(&self) -> Vec<Hash256> {
        self.blocks.iter().map(Block::id).collect()
    }

    /// Sets the recorded timestamp of the last accepted block, for tests
    /// exercising retarget behavior (spec §8 scenario S5).
    pub fn set_last_breath(&mut self, timestamp: u32) {
        self.last_breath = timestamp;
    }

    /// Decodes, validates, and applies a raw block via the staged-validation
    /// / atomic-apply pattern (spec §4.6, §9).
    pub fn add_block(&mut self, raw_block: &str) -> Result<()> {
        let (block, _) = Block::decode(raw_block)?;

        if !block.id().meets_target(self.target_bits) {
            return Err(BlockchainError::TargetNotMet);
        }
        if block.header.prev_hash != self.last_block().id() {
            return Err(BlockchainError::PrevHashMismatch);
        }

        let mut staged_removals: Vec<OutPoint> = Vec::new();
        let mut staged_additions: Vec<(OutPoint, UtxoOutput)> = Vec::new();
        let mut mining_reward_used: Option<u32> = None;

        // Ordinary transactions are staged first so every fee they pay is
        // known before the mining transaction's claimed amount is checked
        // against it, regardless of where the mining transaction sits in
        // the block's transaction list.
        let mut fees_claimed: u64 = 0;
        for tx in &block.transactions {
            if let Transaction::Ordinary(otx) = tx {
                fees_claimed += self.stage_ordinary_tx(otx, tx, &mut staged_removals, &mut staged_additions)?;
            }
        }

        for tx in &block.transactions {
            match tx {
                Transaction::Mining(mtx) => {
                    self.stage_mining_tx(mtx, tx, &mut staged_additions, fees_claimed)?;
                    mining_reward_used = Some(mtx.reward);
                }
                Transaction::Ordinary(_) => {}
                Transaction::Genesis(_) => return Err(BlockchainError::UnknownType),
            }
        }

        for outpoint in &staged_removals {
            self.utxo_set.remove(outpoint);
        }
        for (outpoint, output) in staged_additions {
            self.utxo_set.insert(outpoint, output);
        }

        let timestamp = block.header.timestamp;
        let index = self.blocks.len();
        self.block_index.insert(block.id(), index);
        self.blocks.push(block);
        if let Some(reward) = mining_reward_used {
            self.total_mining_amount = self.total_mining_amount.saturating_sub(reward as u64);
        }
        self.retarget(timestamp);
        self.last_breath = timestamp;
        Ok(())
    }

    /// Validates a block's mining transaction against the block reward plus
    /// the fees claimed by every ordinary transaction staged alongside it
    /// (`fees_claimed`), so a block cannot pay its mining output more than
    /// `Σ inputs + block reward` allows across the block as a whole.
    fn stage_mining_tx(
        &self,
        mtx: &MiningTransaction,
        tx: &Transaction,
        staged_additions: &mut Vec<(OutPoint, UtxoOutput)>,
        fees_claimed: u64,
    ) -> Result<()> {
        if mtx.height != self.height() + 1 {
            return Err(BlockchainError::BadMiningHeight);
        }
        if mtx.reward as u64 > self.total_mining_amount {
            return Err(BlockchainError::RewardTooLarge);
        }
        let max_payout = (mtx.reward as u64)
            .checked_add(fees_claimed)
            .ok_or(BlockchainError::AmountOverflow)?;
        if mtx.output.amount > max_payout {
            return Err(BlockchainError::AmountOverflow);
        }
        staged_additions.push((OutPoint::new(tx.id(), 0), mtx.output.clone()));
        Ok(())
    }

    /// Stages an ordinary transaction's inputs/outputs and returns its fee
    /// (`input_sum - output_sum`), which the mining transaction in the same
    /// block is allowed to claim on top of the block reward.
    fn stage_ordinary_tx(
        &self,
        otx: &OrdinaryTransaction,
        tx: &Transaction,
        staged_removals: &mut Vec<OutPoint>,
        staged_additions: &mut Vec<(OutPoint, UtxoOutput)>,
    ) -> Result<u64> {
        let tx_id_hex = tx.id().to_string();
        let mut input_sum: u64 = 0;
        for input in &otx.inputs {
            let outpoint = input.outpoint();
            if staged_removals.contains(&outpoint) {
                return Err(BlockchainError::DoubleSpend);
            }
            let utxo = self
                .utxo_set
                .get(&outpoint)
                .ok_or(BlockchainError::MissingUtxo)?;
            let valid = wallet::verify_against_address(
                &input.signature_hex,
                &tx_id_hex,
                &utxo.address(),
                CHECKSUM_BITS,
                &self.curve,
            )?;
            if !valid {
                return Err(BlockchainError::BadSignature);
            }
            input_sum = input_sum
                .checked_add(utxo.amount)
                .ok_or(BlockchainError::AmountOverflow)?;
            staged_removals.push(outpoint);
        }

        let mut output_sum: u64 = 0;
        for (i, output) in otx.outputs.iter().enumerate() {
            output_sum = output_sum
                .checked_add(output.amount)
                .ok_or(BlockchainError::AmountOverflow)?;
            staged_additions.push((OutPoint::new(tx.id(), i as u8), output.clone()));
        }
        if output_sum > input_sum {
            return Err(BlockchainError::AmountOverflow);
        }
        Ok(input_sum - output_sum)
    }

    /// Heartbeat-driven retarget: slower than heartbeat eases by 1 bit,
    /// faster than heartbeat hardens by 2 bits, clamped to [1, 255]
    /// (spec §4.6, §9 open question 3).
    fn retarget(&mut self, new_timestamp: u32) {
        let elapsed = new_timestamp.saturating_sub(self.last_breath);
        if elapsed > self.heartbeat_seconds {
            self.target_bits = self.target_bits.saturating_sub(1).max(1);
        } else if elapsed < self.heartbeat_seconds {
            self.target_bits = (self.target_bits + 2).min(255);
        }
    }

    /// Reverses the top block: removes its outputs (failing hard if any was
    /// already consumed, leaving the chain untouched) and restores the
    /// outputs its inputs spent.
    pub fn pop_block(&mut self) -> Result<()> {
        if self.blocks.len() <= 1 {
            return Err(BlockchainError::PrevHashMismatch);
        }
        let block = self.blocks.pop().expect("checked len > 1 above");

        // Verify every output is still unspent before mutating anything, so a
        // failure here never leaves the UTXO set half-reverted.
        for tx in &block.transactions {
            for i in 0..tx.outputs().len() {
                let outpoint = OutPoint::new(tx.id(), i as u8);
                if !self.utxo_set.contains(&outpoint) {
                    self.blocks.push(block);
                    return Err(BlockchainError::PoppedOutputAlreadyConsumed);
                }
            }
        }
        for tx in &block.transactions {
            for i in 0..tx.outputs().len() {
                self.utxo_set.remove(&OutPoint::new(tx.id(), i as u8));
            }
        }

        self.block_index.remove(&block.id());

        for tx in &block.transactions {
            match tx {
                Transaction::Ordinary(otx) => {
                    for input in &otx.inputs {
                        let outpoint = input.outpoint();
                        if let Some(output) = self.find_output_in_chain(&outpoint) {
                            self.utxo_set.insert(outpoint, output);
                        }
                    }
                }
                Transaction::Mining(mtx) => {
                    self.total_mining_amount += mtx.reward as u64;
                }
                Transaction::Genesis(_) => {}
            }
        }

        Ok(())
    }

    fn find_output_in_chain(&self, outpoint: &OutPoint) -> Option<UtxoOutput> {
        for block in &self.blocks {
            for tx in &block.transactions {
                if tx.id() == outpoint.txid {
                    return tx.outputs().get(outpoint.index as usize).cloned();
                }
            }
        }
        None
    }

    #[must_use]
    pub fn find_block_by_id(&self, id: &Hash256) -> Option<&Block> {
        self.block_index.get(id).and_then(|&idx| self.blocks.get(idx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallet::Wallet;
    use num_bigint::BigUint;

    #[test]
    fn genesis_has_height_zero_and_empty_utxo_set() {
        let chain = Blockchain::with_defaults();
        assert_eq!(chain.height(), 0);
        assert!(chain.utxo_set().is_empty());
        assert!(matches!(
            chain.last_block().transactions[0],
            Transaction::Genesis(_)
        ));
        assert_eq!(chain.target_bits(), 20);
    }

    fn mine_block_to(chain: &Blockchain, wallet: &Wallet, reward: u32) -> Block {
        let cpk = wallet.compressed_public_key().unwrap();
        let output = UtxoOutput::new(reward as u64, cpk);
        let tx = Transaction::Mining(MiningTransaction::new(chain.height() + 1, reward, output));
        let header = BlockHeader {
            version: 1,
            prev_hash: chain.last_block().id(),
            merkle_root: Hash256::zero(),
            target_bits: chain.target_bits(),
            nonce: 0,
            timestamp: GENESIS_TIMESTAMP + 100,
        };
        let mut candidate = Block::new(header, vec![tx]);
        candidate.header.merkle_root = candidate.merkle_root();
        mining::mine(candidate, &AtomicBool::new(true)).unwrap()
    }

    #[test]
    fn mine_and_spend_updates_utxo_set() {
        let mut chain = Blockchain::with_defaults();
        let curve = chain.curve().clone();
        let wallet_a = Wallet::from_seed(&BigUint::from(1u32), curve.clone());
        let wallet_b = Wallet::from_seed(&BigUint::from(2u32), curve);

        let reward = chain.reward();
        let mined = mine_block_to(&chain, &wallet_a, reward);
        let mining_tx_id = mined.transactions[0].id();
        chain.add_block(&mined.raw_block()).unwrap();

        let outpoint = OutPoint::new(mining_tx_id, 0);
        assert_eq!(chain.utxo_set().get(&outpoint).unwrap().amount, reward as u64);

        let cpk_b = wallet_b.compressed_public_key().unwrap();
        let unsigned = OrdinaryTransaction::new(
            vec![crate::utxo::UtxoInput::new(mining_tx_id, 0, String::new())],
            vec![UtxoOutput::new(reward as u64, cpk_b)],
            1,
        );
        let unsigned_tx = Transaction::Ordinary(unsigned.clone());
        let signature = wallet_a.sign_transaction(&unsigned_tx.id().to_string()).unwrap();
        let signed = OrdinaryTransaction::new(
            vec![crate::utxo::UtxoInput::new(mining_tx_id, 0, signature)],
            unsigned.outputs.clone(),
            1,
        );
        let signed_tx = Transaction::Ordinary(signed);

        let mining_reward = chain.reward();
        let coinbase_output =
            UtxoOutput::new(mining_reward as u64, wallet_a.compressed_public_key().unwrap());
        let coinbase = Transaction::Mining(MiningTransaction::new(
            chain.height() + 1,
            mining_reward,
            coinbase_output,
        ));
        let header = BlockHeader {
            version: 1,
            prev_hash: chain.last_block().id(),
            merkle_root: Hash256::zero(),
            target_bits: chain.target_bits(),
            nonce: 0,
            timestamp: GENESIS_TIMESTAMP + 200,
        };
        let mut candidate = Block::new(header, vec![coinbase, signed_tx.clone()]);
        candidate.header.merkle_root = candidate.merkle_root();
        let mined2 = mining::mine(candidate, &AtomicBool::new(true)).unwrap();

        chain.add_block(&mined2.raw_block()).unwrap();

        assert!(chain.utxo_set().get(&OutPoint::new(signed_tx.id(), 0)).is_some());
        assert!(chain.utxo_set().get(&outpoint).is_none());
    }

    #[test]
    fn mining_tx_cannot_claim_more_than_reward_plus_fees() {
        let chain = Blockchain::with_defaults();
        let curve = chain.curve().clone();
        let wallet_a = Wallet::from_seed(&BigUint::from(5u32), curve);
        let cpk = wallet_a.compressed_public_key().unwrap();

        let reward = chain.reward();
        let overclaiming_output = UtxoOutput::new(reward as u64 + 1, cpk);
        let tx = Transaction::Mining(MiningTransaction::new(
            chain.height() + 1,
            reward,
            overclaiming_output,
        ));
        let header = BlockHeader {
            version: 1,
            prev_hash: chain.last_block().id(),
            merkle_root: Hash256::zero(),
            target_bits: chain.target_bits(),
            nonce: 0,
            timestamp: GENESIS_TIMESTAMP + 100,
        };
        let mut candidate = Block::new(header, vec![tx]);
        candidate.header.merkle_root = candidate.merkle_root();
        let mined = mining::mine(candidate, &AtomicBool::new(true)).unwrap();

        let mut chain = chain;
        assert!(matches!(
            chain.add_block(&mined.raw_block()),
            Err(BlockchainError::AmountOverflow)
        ));
    }

    #[test]
    fn pop_block_restores_state_and_refuses_on_genesis() {
        let mut chain = Blockchain::with_defaults();
        let curve = chain.curve().clone();
        let wallet_a = Wallet::from_seed(&BigUint::from(3u32), curve);
        let reward = chain.reward();
        let original_supply = chain.total_mining_amount();

        let mined = mine_block_to(&chain, &wallet_a, reward);
        chain.add_block(&mined.raw_block()).unwrap();
        assert_eq!(chain.height(), 1);

        chain.pop_block().unwrap();
        assert_eq!(chain.height(), 0);
        assert!(chain.utxo_set().is_empty());
        assert_eq!(chain.total_mining_amount(), original_supply);

        assert!(chain.pop_block().is_err());
    }

    #[test]
    fn retarget_eases_on_slow_blocks_and_hardens_on_fast_blocks() {
        let mut chain = Blockchain::with_defaults();
        let curve = chain.curve().clone();
        let wallet_a = Wallet::from_seed(&BigUint::from(4u32), curve);
        let starting_bits = chain.target_bits();

        chain.set_last_breath(GENESIS_TIMESTAMP);
        let reward = chain.reward();
        let mut mined = mine_block_to(&chain, &wallet_a, reward);
        mined.header.timestamp = GENESIS_TIMESTAMP + 1000; // far slower than the 60s heartbeat
        mined.header.merkle_root = mined.merkle_root();
        let mined = mining::mine(mined, &AtomicBool::new(true)).unwrap();
        chain.add_block(&mined.raw_block()).unwrap();
        assert_eq!(chain.target_bits(), starting_bits - 1);
    }
}
