pub mod block;
pub mod blockchain;
pub mod error;
pub mod mempool;
pub mod mining;
pub mod node;
pub mod protocol;
pub mod transaction;
pub mod utxo;
pub mod wallet;

pub use block::{Block, BlockHeader, MerkleProof};
pub use blockchain::Blockchain;
pub use error::{BondError, BondResult};
pub use mempool::Mempool;
pub use mining::mine;
pub use node::{Node, MESSAGE_RETRIES};
pub use protocol::{Frame, Message};
pub use transaction::{GenesisTransaction, MiningTransaction, OrdinaryTransaction, Transaction};
pub use utxo::{UtxoInput, UtxoOutput, UtxoSet};
pub use wallet::Wallet;

pub use shared::{BlockchainError, Hash256, Result};
