//! End-to-end coverage for the six ledger scenarios a node must get right:
//! genesis construction, a mine-then-spend round trip, mempool double-spend
//! rejection, orphan resolution once a parent lands, heartbeat-driven
//! retargeting, and a block pop round trip. Grouped the way
//! `examples/original_source/tests/unit_tests/test_blockchain.py` groups its
//! genesis/spend/pop cases, one test per scenario.

use bond_core::{
    Blockchain, Mempool, MiningTransaction, OrdinaryTransaction, Transaction, UtxoInput,
    UtxoOutput,
};
use num_bigint::BigUint;
use shared::{Curve, Hash256};

const GENESIS_TIMESTAMP: u32 = 1_651_769_733;

fn wallet(seed: u32, curve: Curve) -> bond_core::Wallet {
    bond_core::Wallet::from_seed(&BigUint::from(seed), curve)
}

fn mine_reward_block(chain: &Blockchain, cpk: &str, timestamp: u32) -> bond_core::Block {
    let reward = chain.reward();
    let output = UtxoOutput::new(reward as u64, cpk.to_string());
    let tx = Transaction::Mining(MiningTransaction::new(chain.height() + 1, reward, output));
    let header = bond_core::BlockHeader {
        version: 1,
        prev_hash: chain.last_block().id(),
        merkle_root: Hash256::zero(),
        target_bits: chain.target_bits(),
        nonce: 0,
        timestamp,
    };
    let mut candidate = bond_core::Block::new(header, vec![tx]);
    candidate.header.merkle_root = candidate.merkle_root();
    bond_core::mine(candidate, &std::sync::atomic::AtomicBool::new(true)).unwrap()
}

#[test]
fn s1_genesis() {
    let chain = Blockchain::with_defaults();
    assert_eq!(chain.height(), 0);
    assert!(matches!(
        chain.last_block().transactions[0],
        Transaction::Genesis(_)
    ));
    assert!(chain.utxo_set().is_empty());
}

#[test]
fn s2_mine_and_spend() {
    let mut chain = Blockchain::with_defaults();
    let curve = chain.curve().clone();
    let wallet_a = wallet(1, curve.clone());
    let wallet_b = wallet(2, curve);
    let cpk_a = wallet_a.compressed_public_key().unwrap();

    let reward = chain.reward();
    let mined = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 100);
    let mining_tx_id = mined.transactions[0].id();
    chain.add_block(&mined.raw_block()).unwrap();

    let outpoint = shared::types::OutPoint::new(mining_tx_id, 0);
    let utxo = chain.utxo_set().get(&outpoint).unwrap();
    assert_eq!(utxo.amount, reward as u64);
    assert_eq!(utxo.address(), wallet_a.address().unwrap());

    let cpk_b = wallet_b.compressed_public_key().unwrap();
    let unsigned = OrdinaryTransaction::new(
        vec![UtxoInput::new(mining_tx_id, 0, String::new())],
        vec![UtxoOutput::new(reward as u64, cpk_b)],
        1,
    );
    let unsigned_id = Transaction::Ordinary(unsigned.clone()).id();
    let signature = wallet_a.sign_transaction(&unsigned_id.to_string()).unwrap();
    let signed = OrdinaryTransaction::new(
        vec![UtxoInput::new(mining_tx_id, 0, signature)],
        unsigned.outputs.clone(),
        1,
    );
    let signed_tx = Transaction::Ordinary(signed);

    let cpk_a = wallet_a.compressed_public_key().unwrap();
    let coinbase_reward = chain.reward();
    let coinbase = Transaction::Mining(MiningTransaction::new(
        chain.height() + 1,
        coinbase_reward,
        UtxoOutput::new(coinbase_reward as u64, cpk_a),
    ));
    let header = bond_core::BlockHeader {
        version: 1,
        prev_hash: chain.last_block().id(),
        merkle_root: Hash256::zero(),
        target_bits: chain.target_bits(),
        nonce: 0,
        timestamp: GENESIS_TIMESTAMP + 200,
    };
    let mut candidate = bond_core::Block::new(header, vec![coinbase, signed_tx.clone()]);
    candidate.header.merkle_root = candidate.merkle_root();
    let mined2 = bond_core::mine(candidate, &std::sync::atomic::AtomicBool::new(true)).unwrap();
    chain.add_block(&mined2.raw_block()).unwrap();

    assert!(chain
        .utxo_set()
        .get(&shared::types::OutPoint::new(signed_tx.id(), 0))
        .is_some());
    assert!(chain.utxo_set().get(&outpoint).is_none());
}

#[test]
fn s3_double_spend_rejected_by_mempool() {
    let mut chain = Blockchain::with_defaults();
    let curve = chain.curve().clone();
    let wallet_a = wallet(3, curve.clone());
    let wallet_b = wallet(4, curve);
    let cpk_a = wallet_a.compressed_public_key().unwrap();

    let mined = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 100);
    let mining_tx_id = mined.transactions[0].id();
    chain.add_block(&mined.raw_block()).unwrap();
    let reward = chain
        .utxo_set()
        .get(&shared::types::OutPoint::new(mining_tx_id, 0))
        .unwrap()
        .amount;

    let cpk_b = wallet_b.compressed_public_key().unwrap();
    let make_spend = |amount: u64| {
        let unsigned = OrdinaryTransaction::new(
            vec![UtxoInput::new(mining_tx_id, 0, String::new())],
            vec![UtxoOutput::new(amount, cpk_b.clone())],
            1,
        );
        let id = Transaction::Ordinary(unsigned.clone()).id();
        let signature = wallet_a.sign_transaction(&id.to_string()).unwrap();
        let signed = OrdinaryTransaction::new(
            vec![UtxoInput::new(mining_tx_id, 0, signature)],
            unsigned.outputs,
            1,
        );
        Transaction::Ordinary(signed).raw_tx()
    };

    let mut mempool = Mempool::new();
    assert!(mempool
        .add_transaction(&make_spend(reward), chain.utxo_set(), chain.curve())
        .unwrap());
    assert!(!mempool
        .add_transaction(&make_spend(reward - 1), chain.utxo_set(), chain.curve())
        .unwrap());
    assert_eq!(mempool.validated_count(), 1);
}

#[test]
fn s4_orphan_resolves_once_parent_lands() {
    let mut chain = Blockchain::with_defaults();
    let curve = chain.curve().clone();
    let wallet_a = wallet(5, curve.clone());
    let wallet_b = wallet(6, curve);
    let cpk_a = wallet_a.compressed_public_key().unwrap();

    let mined = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 100);
    let mining_tx_id = mined.transactions[0].id();

    let cpk_b = wallet_b.compressed_public_key().unwrap();
    let reward = chain.reward() as u64;
    let unsigned = OrdinaryTransaction::new(
        vec![UtxoInput::new(mining_tx_id, 0, String::new())],
        vec![UtxoOutput::new(reward, cpk_b)],
        1,
    );
    let id = Transaction::Ordinary(unsigned.clone()).id();
    let signature = wallet_a.sign_transaction(&id.to_string()).unwrap();
    let signed = OrdinaryTransaction::new(
        vec![UtxoInput::new(mining_tx_id, 0, signature)],
        unsigned.outputs,
        1,
    );
    let raw_child = Transaction::Ordinary(signed).raw_tx();

    let mut mempool = Mempool::new();
    assert!(mempool
        .add_transaction(&raw_child, chain.utxo_set(), chain.curve())
        .unwrap());
    assert_eq!(mempool.validated_count(), 0);
    assert_eq!(mempool.orphan_count(), 1);

    chain.add_block(&mined.raw_block()).unwrap();
    let newly_validated = mempool
        .check_for_parents(chain.utxo_set(), chain.curve())
        .unwrap();
    assert_eq!(newly_validated.len(), 1);
    assert_eq!(mempool.validated_count(), 1);
    assert_eq!(mempool.orphan_count(), 0);
}

#[test]
fn s5_retarget_eases_and_hardens_on_heartbeat() {
    let mut chain = Blockchain::with_defaults();
    let curve = chain.curve().clone();
    let wallet_a = wallet(7, curve);
    let starting_bits = chain.target_bits();
    let cpk_a = wallet_a.compressed_public_key().unwrap();

    chain.set_last_breath(GENESIS_TIMESTAMP);
    let mut slow = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 1_000);
    slow.header.merkle_root = slow.merkle_root();
    let slow = bond_core::mine(slow, &std::sync::atomic::AtomicBool::new(true)).unwrap();
    chain.add_block(&slow.raw_block()).unwrap();
    assert_eq!(chain.target_bits(), starting_bits - 1);

    let bits_after_slow = chain.target_bits();
    chain.set_last_breath(GENESIS_TIMESTAMP + 1_000);
    let mut fast = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 1_001);
    fast.header.merkle_root = fast.merkle_root();
    let fast = bond_core::mine(fast, &std::sync::atomic::AtomicBool::new(true)).unwrap();
    chain.add_block(&fast.raw_block()).unwrap();
    assert_eq!(chain.target_bits(), bits_after_slow + 2);
}

#[test]
fn s6_pop_round_trip() {
    let mut chain = Blockchain::with_defaults();
    let curve = chain.curve().clone();
    let wallet_a = wallet(8, curve);
    let cpk_a = wallet_a.compressed_public_key().unwrap();
    let original_supply = chain.total_mining_amount();

    let reward1 = chain.reward() as u64;
    let mined1 = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 100);
    chain.add_block(&mined1.raw_block()).unwrap();
    assert_eq!(chain.height(), 1);

    let reward2 = chain.reward() as u64;
    let mined2 = mine_reward_block(&chain, &cpk_a, GENESIS_TIMESTAMP + 200);
    chain.add_block(&mined2.raw_block()).unwrap();
    assert_eq!(chain.height(), 2);

    let after_mining_supply = chain.total_mining_amount();
    assert_eq!(after_mining_supply, original_supply - reward1 - reward2);

    chain.pop_block().unwrap();
    assert_eq!(chain.height(), 1);
    assert_eq!(chain.total_mining_amount(), after_mining_supply + reward2);

    chain.pop_block().unwrap();
    assert_eq!(chain.height(), 0);
    assert!(chain.utxo_set().is_empty());
    assert_eq!(chain.total_mining_amount(), original_supply);

    assert!(chain.pop_block().is_err());
}
