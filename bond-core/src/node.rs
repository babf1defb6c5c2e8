//! Node: owns the Blockchain, Wallet, and Mempool; runs the mining loop and
//! consensus reconciliation described in spec §4.8. The actual TCP
//! listener/handler tasks and peer dialing live in the `bond-node` binary
//! (`src/network.rs`) — this module is the serialized entry point they call
//! into, matching spec §5's "peer handlers call into [Blockchain/mempool]
//! via serialized entry points."

use crate::blockchain::Blockchain;
use crate::block::{Block, BlockHeader};
use crate::error::{BondError, BondResult};
use crate::mempool::Mempool;
use crate::mining;
use crate::transaction::{MiningTransaction, Transaction};
use crate::utxo::UtxoOutput;
use crate::wallet::Wallet;
use shared::types::{PeerEndpoint, PeerStatus};
use shared::Hash256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

/// Retry bound for peer calls that fail with connection/timeout/checksum
/// errors (spec §4.8, §7).
pub const MESSAGE_RETRIES: u32 = 5;

pub struct Node {
    pub blockchain: Blockchain,
    pub wallet: Wallet,
    pub mempool: Mempool,
    pub consensus_dict: HashMap<PeerEndpoint, PeerStatus>,
    pub is_mining: Arc<AtomicBool>,
}

impl Node {
    #[must_use]
    pub fn new(blockchain: Blockchain, wallet: Wallet) -> Self {
        Self {
            blockchain,
            wallet,
            mempool: Mempool::new(),
            consensus_dict: HashMap::new(),
            is_mining: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Intake path for message type `04` (spec §4.8 `add_transaction`).
    pub fn add_transaction(&mut self, raw_tx: &str) -> BondResult<bool> {
        self.mempool
            .add_transaction(raw_tx, self.blockchain.utxo_set(), self.blockchain.curve())
    }

    /// One mining round: awards the block reward plus the fees of every
    /// validated mempool transaction to this node's wallet, assembles a
    /// candidate block over the current mempool snapshot, and searches for a
    /// satisfying nonce. Returns `None` on interrupt (spec §4.7's "empty
    /// string" return, and §4.8's "on interrupt, pop the inserted mining tx
    /// and exit" — here there is nothing to pop since the mining transaction
    /// never left this function on interrupt).
    pub fn mine_round(&mut self, timestamp: u32) -> BondResult<Option<Block>> {
        self.is_mining.store(true, Ordering::Relaxed);
        let cpk = self.wallet.compressed_public_key()?;
        let reward = self.blockchain.reward();
        let fees = self.mempool.total_validated_fees();
        let mining_tx = Transaction::Mining(MiningTransaction::new(
            self.blockchain.height() + 1,
            reward,
            UtxoOutput::new(reward as u64 + fees, cpk),
        ));

        let mut transactions = vec![mining_tx];
        transactions.extend(self.mempool.validated().cloned());

        let header = BlockHeader {
            version: 1,
            prev_hash: self.blockchain.last_block().id(),
            merkle_root: Hash256::zero(),
            target_bits: self.blockchain.target_bits(),
            nonce: 0,
            timestamp,
        };
        let mut candidate = Block::new(header, transactions);
        candidate.header.merkle_root = candidate.merkle_root();

        let mined = mining::mine(candidate, &self.is_mining);
        let Some(block) = mined else {
            return Ok(None);
        };

        self.blockchain.add_block(&block.raw_block())?;
        self.mempool.clear();
        self.mempool
            .check_for_parents(self.blockchain.utxo_set(), self.blockchain.curve())?;
        Ok(Some(block))
    }

    /// Cooperative-cancellation flag shared with the mining loop (spec §5).
    #[must_use]
    pub fn mining_flag(&self) -> Arc<AtomicBool> {
        self.is_mining.clone()
    }

    pub fn stop_mining(&self) {
        self.is_mining.store(false, Ordering::Relaxed);
    }

    /// Records a peer's self-reported status for consensus reconciliation.
    pub fn record_peer_status(&mut self, endpoint: PeerEndpoint, status: PeerStatus) {
        self.consensus_dict.insert(endpoint, status);
    }

    /// Computes `(greatest_height, hash, timestamp)` from `consensus_dict`:
    /// greatest height first, then most frequent (hash, timestamp) among
    /// peers at that height, then smallest timestamp on ties (spec §4.8).
    #[must_use]
    pub fn gather_consensus(&self) -> Option<(u64, Hash256, u32)> {
        let greatest_height = self.consensus_dict.values().map(|s| s.height).max()?;

        let mut counts: HashMap<(Hash256, u32), usize> = HashMap::new();
        for status in self.consensus_dict.values() {
            if status.height == greatest_height {
                *counts.entry((status.hash, status.timestamp)).or_insert(0) += 1;
            }
        }

        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0 .1.cmp(&a.0 .1)))
            .map(|((hash, timestamp), _count)| (greatest_height, hash, timestamp))
    }

    /// Longest common prefix length between our hashlist and a peer's.
    #[must_use]
    pub fn matching_prefix_len(&self, peer_hashlist: &[Hash256]) -> u64 {
        self.blockchain
            .hashlist()
            .iter()
            .zip(peer_hashlist.iter())
            .take_while(|(a, b)| a == b)
            .count() as u64
    }

    /// Reconciles divergence with a consensus peer: stops mining, pops back
    /// to the matching prefix, then replays blocks supplied by `fetch_block`
    /// (an abstraction over the actual round-robin peer fetch the binary
    /// performs over the network) up to `target_height`.
    pub fn achieve_consensus<F>(
        &mut self,
        target_height: u64,
        peer_hashlist: &[Hash256],
        mut fetch_block: F,
    ) -> BondResult<()>
    where
        F: FnMut(u64) -> BondResult<String>,
    {
        let was_mining = self.is_mining.load(Ordering::Relaxed);
        self.stop_mining();

        let matching = self.matching_prefix_len(peer_hashlist);
        let matching_height = matching.saturating_sub(1);
        while self.blockchain.height() > matching_height {
            self.blockchain.pop_block()?;
        }

        while self.blockchain.height() < target_height {
            let next_index = self.blockchain.height() + 1;
            let raw_block = fetch_block(next_index)?;
            match self.blockchain.add_block(&raw_block) {
                Ok(()) => {}
                Err(err) => {
                    warn!(height = next_index, error = %err, "rejected block while reconciling consensus");
                    return Err(BondError::from(err));
                }
            }
        }

        info!(height = self.blockchain.height(), "consensus reconciliation complete");
        if was_mining {
            self.is_mining.store(true, Ordering::Relaxed);
        }
        Ok(())
    }
}
