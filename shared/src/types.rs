//! Shared type aliases and small value types used across the workspace.

use serde::{Deserialize, Serialize};

/// Alias for a transaction identifier.
pub type TxId = crate::Hash256;

/// Alias for a block identifier.
pub type BlockId = crate::Hash256;

/// Alias for a monetary amount (the smallest unit of account).
pub type Amount = u64;

/// Alias for a Unix timestamp.
pub type Timestamp = u32;

/// Alias for chain height.
pub type BlockHeight = u64;

/// Wire width of a UTXO output index is one byte (spec §3).
pub type OutputIndex = u8;

/// A reference to a specific output: `(tx_id, tx_index)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutPoint {
    pub txid: TxId,
    pub index: OutputIndex,
}

impl OutPoint {
    #[must_use]
    pub const fn new(txid: TxId, index: OutputIndex) -> Self {
        Self { txid, index }
    }
}

/// Network environment the node is configured for.
#[derive(Default, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    Mainnet,
    Testnet,
    #[default]
    Devnet,
    Regtest,
}

/// Node launch configuration, populated from CLI flags in the `bond-node`
/// binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub network: NetworkType,
    pub p2p_port: u16,
    pub bind_address: String,
    pub bootstrap_peers: Vec<String>,
    pub mining_threads: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: NetworkType::Devnet,
            p2p_port: 8333,
            bind_address: "127.0.0.1".to_string(),
            bootstrap_peers: vec![],
            mining_threads: 1,
        }
    }
}

/// Summary statistics exposed for operators/tests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockchainStats {
    pub height: BlockHeight,
    pub tip_hash: BlockId,
    pub total_transactions: u64,
    pub total_utxos: u64,
    pub target_bits: u32,
    pub last_block_time: Timestamp,
}

/// Self-reported peer status used for consensus reconciliation (spec §4.8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
    pub height: BlockHeight,
    pub hash: BlockId,
    pub timestamp: Timestamp,
}

/// A peer's address, used as the `consensus_dict` key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PeerEndpoint {
    pub ip: String,
    pub port: u16,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outpoint_carries_txid_and_index() {
        let txid = crate::Hash256::zero();
        let outpoint = OutPoint::new(txid, 3);
        assert_eq!(outpoint.txid, txid);
        assert_eq!(outpoint.index, 3);
    }

    #[test]
    fn node_config_defaults_to_devnet() {
        let config = NodeConfig::default();
        assert_eq!(config.network, NetworkType::Devnet);
        assert_eq!(config.p2p_port, 8333);
    }
}
