//! Validated and orphan transaction pools, with double-spend tracking across
//! pending (not-yet-mined) transactions.
//!
//! Grounded on spec §4.8's `add_transaction` steps and §9 open question 2
//! (`consumed_inputs` must be a *set* of `(tx_id, tx_index)` pairs, not a
//! map, so two different outputs of the same parent can be spent by two
//! different pending transactions).

use crate::error::{BondError, BondResult};
use crate::transaction::{OrdinaryTransaction, Transaction};
use crate::utxo::UtxoSet;
use crate::wallet::{self, DEFAULT_CHECKSUM_BITS};
use shared::types::OutPoint;
use shared::{Curve, Hash256};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Default)]
pub struct Mempool {
    validated: HashMap<Hash256, Transaction>,
    orphans: HashMap<Hash256, Transaction>,
    consumed_inputs: HashSet<OutPoint>,
    /// `input_sum - output_sum` for each validated transaction.
    fees: HashMap<Hash256, u64>,
}

enum ResolveOutcome {
    StillOrphan,
    Validated(u64),
    Rejected,
}

impl Mempool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn contains(&self, tx_id: &Hash256) -> bool {
        self.validated.contains_key(tx_id) || self.orphans.contains_key(tx_id)
    }

    #[must_use]
    pub fn validated(&self) -> impl Iterator<Item = &Transaction> {
        self.validated.values()
    }

    #[must_use]
    pub fn orphan_count(&self) -> usize {
        self.orphans.len()
    }

    #[must_use]
    pub fn validated_count(&self) -> usize {
        self.validated.len()
    }

    /// Sum of `input_sum - output_sum` across every validated transaction,
    /// the fee total a mining transaction is entitled to claim alongside the
    /// block reward (spec.md's "reward+fees" coinbase rule).
    #[must_use]
    pub fn total_validated_fees(&self) -> u64 {
        self.fees.values().sum()
    }

    /// Drops everything from the mempool, for use once a mined block has
    /// been accepted (spec §4.8 mining loop: "clear mempool").
    pub fn clear(&mut self) {
        self.validated.clear();
        self.consumed_inputs.clear();
        self.fees.clear();
    }

    /// Decodes and admits a raw ordinary transaction. `Ok(true)` means the
    /// transaction was accepted (validated or parked as an orphan);
    /// `Ok(false)` means it was rejected (duplicate, double-spend, bad
    /// signature, or outputs exceeding inputs) — a non-fatal outcome per
    /// spec §7.
    pub fn add_transaction(
        &mut self,
        raw_tx: &str,
        utxo_set: &UtxoSet,
        curve: &Curve,
    ) -> BondResult<bool> {
        let (tx, _) = Transaction::decode(raw_tx)?;
        let tx_id = tx.id();
        if self.contains(&tx_id) {
            return Ok(false);
        }
        let otx = match &tx {
            Transaction::Ordinary(otx) => otx,
            _ => return Ok(false),
        };

        match self.resolve(tx_id, otx, utxo_set, curve)? {
            ResolveOutcome::Validated(fee) => {
                self.validated.insert(tx_id, tx);
                self.fees.insert(tx_id, fee);
                Ok(true)
            }
            ResolveOutcome::StillOrphan => {
                self.orphans.insert(tx_id, tx);
                Ok(true)
            }
            ResolveOutcome::Rejected => Ok(false),
        }
    }

    /// Re-attempts validation of every orphaned transaction, moving any
    /// that now resolve into the validated pool and dropping any that are
    /// now provably invalid. Returns the ids that became validated.
    pub fn check_for_parents(&mut self, utxo_set: &UtxoSet, curve: &Curve) -> BondResult<Vec<Hash256>> {
        let orphan_ids: Vec<Hash256> = self.orphans.keys().copied().collect();
        let mut newly_validated = Vec::new();
        for tx_id in orphan_ids {
            let tx = self.orphans.get(&tx_id).cloned().expect("id came from this map");
            let otx = match &tx {
                Transaction::Ordinary(otx) => otx,
                _ => continue,
            };
            match self.resolve(tx_id, otx, utxo_set, curve)? {
                ResolveOutcome::Validated(fee) => {
                    self.orphans.remove(&tx_id);
                    self.validated.insert(tx_id, tx);
                    self.fees.insert(tx_id, fee);
                    newly_validated.push(tx_id);
                }
                ResolveOutcome::Rejected => {
                    self.orphans.remove(&tx_id);
                }
                ResolveOutcome::StillOrphan => {}
            }
        }
        Ok(newly_validated)
    }

    fn resolve(
        &mut self,
        tx_id: Hash256,
        otx: &OrdinaryTransaction,
        utxo_set: &UtxoSet,
        curve: &Curve,
    ) -> BondResult<ResolveOutcome> {
        let mut resolved = Vec::with_capacity(otx.inputs.len());
        for input in &otx.inputs {
            let outpoint = input.outpoint();
            if self.consumed_inputs.contains(&outpoint) {
                return Ok(ResolveOutcome::Rejected);
            }
            match utxo_set.get(&outpoint) {
                Some(utxo) => resolved.push((outpoint, input, utxo.clone())),
                None => return Ok(ResolveOutcome::StillOrphan),
            }
        }

        let tx_id_hex = tx_id.to_string();
        let mut input_sum: u64 = 0;
        for (_, input, utxo) in &resolved {
            let valid = wallet::verify_against_address(
                &input.signature_hex,
                &tx_id_hex,
                &utxo.address(),
                DEFAULT_CHECKSUM_BITS,
                curve,
            )
            .map_err(BondError::from)?;
            if !valid {
                return Ok(ResolveOutcome::Rejected);
            }
            input_sum = match input_sum.checked_add(utxo.amount) {
                Some(sum) => sum,
                None => return Ok(ResolveOutcome::Rejected),
            };
        }

        let mut output_sum: u64 = 0;
        for output in &otx.outputs {
            output_sum = match output_sum.checked_add(output.amount) {
                Some(sum) => sum,
                None => return Ok(ResolveOutcome::Rejected),
            };
        }
        if output_sum > input_sum {
            return Ok(ResolveOutcome::Rejected);
        }

        for (outpoint, _, _) in &resolved {
            self.consumed_inputs.insert(*outpoint);
        }
        Ok(ResolveOutcome::Validated(input_sum - output_sum))
    }
}
