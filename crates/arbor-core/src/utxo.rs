//! UTXO set and per-branch ledger snapshots.
//!
//! A [`LedgerSnapshot`] is the state a chain node hands to its children: the
//! unspent outputs after applying the node's block plus the transactions that
//! are still pending on that branch. Each node owns its snapshot outright;
//! branching clones it so sibling forks can diverge independently.

use std::collections::HashMap;

use crate::error::TransactionError;
use crate::mempool::TransactionPool;
use crate::types::{OutPoint, Transaction, UtxoEntry};

/// The set of spendable outputs at one chain position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoSet {
    utxos: HashMap<OutPoint, UtxoEntry>,
}

impl UtxoSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a UTXO by outpoint. Returns `None` if spent or unknown.
    pub fn get(&self, outpoint: &OutPoint) -> Option<&UtxoEntry> {
        self.utxos.get(outpoint)
    }

    /// Whether the outpoint is currently unspent.
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    /// Insert a UTXO, returning the entry it replaced.
    pub fn insert(&mut self, outpoint: OutPoint, entry: UtxoEntry) -> Option<UtxoEntry> {
        self.utxos.insert(outpoint, entry)
    }

    /// Remove a UTXO, returning it if it was present.
    pub fn remove(&mut self, outpoint: &OutPoint) -> Option<UtxoEntry> {
        self.utxos.remove(outpoint)
    }

    /// Number of unspent outputs.
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    /// Whether the set holds no outputs.
    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// Iterate over all UTXOs (arbitrary order).
    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &UtxoEntry)> {
        self.utxos.iter()
    }

    /// Sum of all unspent values. Returns `None` on overflow.
    pub fn total_value(&self) -> Option<u64> {
        self.utxos
            .values()
            .try_fold(0u64, |acc, e| acc.checked_add(e.output.value))
    }

    /// Register every output of `tx` as unspent at `height`.
    ///
    /// Returns the number of UTXOs created.
    pub fn add_outputs(&mut self, tx: &Transaction, height: u64) -> Result<usize, TransactionError> {
        let is_coinbase = tx.is_coinbase();
        let created = tx.created_outpoints()?;
        let count = created.len();
        for (outpoint, output) in created {
            self.utxos.insert(
                outpoint,
                UtxoEntry {
                    output: output.clone(),
                    block_height: height,
                    is_coinbase,
                },
            );
        }
        Ok(count)
    }

    /// Remove every UTXO consumed by `tx`.
    ///
    /// All inputs are checked before anything is removed, so a missing input
    /// leaves the set untouched. Coinbase transactions spend nothing.
    pub fn spend_inputs(&mut self, tx: &Transaction) -> Result<usize, TransactionError> {
        if tx.is_coinbase() {
            return Ok(0);
        }
        if let Some(missing) = tx
            .inputs
            .iter()
            .find(|input| !self.utxos.contains_key(&input.previous_output))
        {
            return Err(TransactionError::UnknownUtxo(missing.previous_output.to_string()));
        }
        for input in &tx.inputs {
            self.utxos.remove(&input.previous_output);
        }
        Ok(tx.inputs.len())
    }
}

/// Ledger state at one chain position: unspent outputs plus the pending pool.
#[derive(Clone, Debug, Default)]
pub struct LedgerSnapshot {
    /// Unspent outputs after the owning block.
    pub utxos: UtxoSet,
    /// Transactions seen but not yet confirmed on this branch.
    pub pending: TransactionPool,
}

impl LedgerSnapshot {
    /// Build a snapshot from its parts.
    pub fn new(utxos: UtxoSet, pending: TransactionPool) -> Self {
        Self { utxos, pending }
    }
}
