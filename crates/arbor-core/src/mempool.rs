//! Pool of pending (unconfirmed) transactions.
//!
//! The pool is advisory input for block producers: membership only, keyed by
//! txid. Nothing is validated on insertion; validity is decided when a block
//! carrying the transaction is admitted to the chain.

use std::collections::{BTreeMap, HashSet};

use crate::error::TransactionError;
use crate::types::{Block, Hash256, OutPoint, Transaction};

/// Pending transactions keyed by txid.
///
/// Iteration order is by txid, so block templates built from the pool are
/// deterministic.
#[derive(Clone, Debug, Default)]
pub struct TransactionPool {
    entries: BTreeMap<Hash256, Transaction>,
}

impl TransactionPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a transaction, replacing any entry with the same txid.
    ///
    /// Returns the txid.
    pub fn add(&mut self, tx: Transaction) -> Result<Hash256, TransactionError> {
        let txid = tx.txid()?;
        self.entries.insert(txid, tx);
        Ok(txid)
    }

    /// Remove a transaction by txid.
    pub fn remove(&mut self, txid: &Hash256) -> Option<Transaction> {
        self.entries.remove(txid)
    }

    /// Check if a transaction with the given txid is in the pool.
    pub fn contains(&self, txid: &Hash256) -> bool {
        self.entries.contains_key(txid)
    }

    /// Get a pending transaction by txid.
    pub fn get(&self, txid: &Hash256) -> Option<&Transaction> {
        self.entries.get(txid)
    }

    /// Pending transactions in txid order.
    pub fn transactions(&self) -> Vec<&Transaction> {
        self.entries.values().collect()
    }

    /// Collect all txids in the pool.
    pub fn txids(&self) -> Vec<Hash256> {
        self.entries.keys().copied().collect()
    }

    /// Number of transactions in the pool.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove transactions confirmed in a block and any that conflict.
    ///
    /// Removes:
    /// 1. Transactions whose txids appear in the block
    /// 2. Pool transactions spending an outpoint the block already spent
    ///
    /// Returns the number of entries removed.
    pub fn remove_confirmed(&mut self, block: &Block) -> usize {
        let before = self.entries.len();
        let mut spent: HashSet<&OutPoint> = HashSet::new();

        for tx in &block.transactions {
            if let Ok(txid) = tx.txid() {
                self.entries.remove(&txid);
            }
            spent.extend(tx.inputs.iter().map(|input| &input.previous_output));
        }
        if let Ok(txid) = block.coinbase.txid() {
            self.entries.remove(&txid);
        }

        self.entries.retain(|_, tx| {
            !tx.inputs
                .iter()
                .any(|input| spent.contains(&input.previous_output))
        });

        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::types::{BlockHeader, TxInput, TxOutput};

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn outpoint(seed: u8, index: u64) -> OutPoint {
        OutPoint {
            txid: Hash256([seed; 32]),
            index,
        }
    }

    fn make_tx(outpoints: &[OutPoint], output_value: u64, lock_time: u64) -> Transaction {
        Transaction {
            version: 1,
            inputs: outpoints
                .iter()
                .map(|op| TxInput {
                    previous_output: op.clone(),
                    signature: vec![0; 64],
                })
                .collect(),
            outputs: vec![TxOutput {
                value: output_value,
                pubkey_hash: Hash256::ZERO,
            }],
            lock_time,
        }
    }

    fn make_block(transactions: Vec<Transaction>) -> Block {
        Block {
            header: BlockHeader {
                version: 1,
                prev_hash: Hash256([0x01; 32]),
                tx_root: Hash256::ZERO,
                timestamp: 0,
                nonce: 0,
            },
            coinbase: Transaction {
                version: 1,
                inputs: vec![TxInput { previous_output: OutPoint::null(), signature: vec![] }],
                outputs: vec![TxOutput { value: 50 * COIN, pubkey_hash: Hash256::ZERO }],
                lock_time: 2,
            },
            transactions,
        }
    }

    // ------------------------------------------------------------------
    // Basic operations
    // ------------------------------------------------------------------

    #[test]
    fn new_pool_is_empty() {
        let pool = TransactionPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn add_and_get() {
        let mut pool = TransactionPool::new();
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        let txid = pool.add(tx.clone()).unwrap();
        assert_eq!(txid, tx.txid().unwrap());
        assert!(pool.contains(&txid));
        assert_eq!(pool.get(&txid), Some(&tx));
    }

    #[test]
    fn add_same_tx_twice_keeps_one_entry() {
        let mut pool = TransactionPool::new();
        let tx = make_tx(&[outpoint(1, 0)], 49 * COIN, 0);
        pool.add(tx.clone()).unwrap();
        pool.add(tx).unwrap();
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn remove_returns_entry() {
        let mut pool = TransactionPool::new();
        let txid = pool.add(make_tx(&[outpoint(1, 0)], 1, 0)).unwrap();
        assert!(pool.remove(&txid).is_some());
        assert!(pool.remove(&txid).is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn transactions_are_in_txid_order() {
        let mut pool = TransactionPool::new();
        for i in 0..5 {
            pool.add(make_tx(&[outpoint(i, 0)], 1, i as u64)).unwrap();
        }
        let txids = pool.txids();
        let mut sorted = txids.clone();
        sorted.sort();
        assert_eq!(txids, sorted);
        assert_eq!(pool.transactions().len(), 5);
    }

    // ------------------------------------------------------------------
    // Block confirmation
    // ------------------------------------------------------------------

    #[test]
    fn remove_confirmed_drops_included_transactions() {
        let mut pool = TransactionPool::new();
        let included = make_tx(&[outpoint(1, 0)], 1, 0);
        let unrelated = make_tx(&[outpoint(2, 0)], 1, 0);
        pool.add(included.clone()).unwrap();
        let keep = pool.add(unrelated).unwrap();

        let removed = pool.remove_confirmed(&make_block(vec![included]));
        assert_eq!(removed, 1);
        assert_eq!(pool.txids(), vec![keep]);
    }

    #[test]
    fn remove_confirmed_drops_conflicting_spends() {
        let mut pool = TransactionPool::new();
        let in_block = make_tx(&[outpoint(1, 0)], 10, 0);
        let double_spend = make_tx(&[outpoint(1, 0)], 20, 7);
        pool.add(double_spend).unwrap();

        assert_eq!(pool.remove_confirmed(&make_block(vec![in_block])), 1);
        assert!(pool.is_empty());
    }
}
