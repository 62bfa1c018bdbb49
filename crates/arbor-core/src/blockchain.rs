//! Fork-aware chain manager.
//!
//! [`Blockchain`] keeps every retained block as a [`ChainNode`] carrying its
//! own [`LedgerSnapshot`], so competing branches can be extended
//! independently. Admission replays a candidate's transactions against a
//! private clone of the parent's snapshot and only touches the tree once the
//! whole block has been accepted.
//!
//! Best-tip rule: greatest height wins; on a tie the node admitted first
//! keeps the tip. Admission order is tracked with a sequence counter rather
//! than wall-clock time.
//!
//! Retention: with `floor = tip_height - cut_off_age`, candidates at or below
//! `floor` are refused with [`ChainError::StaleBranch`]. Nodes at `floor` can
//! still receive children (at `floor + 1`). After each admission, nodes below
//! `floor - 1` are evicted. The `floor - 1` layer is dead but stays
//! addressable so late extensions of it are reported as stale; anything older
//! is forgotten and reported as an unknown parent.
//!
//! The chain-level pending pool follows the best chain: when the tip moves,
//! every block between the new tip and its common ancestor with the old tip
//! has its transactions removed from the pool.
//!
//! Not thread-safe: callers should wrap in a `Mutex` or `RwLock` and hold
//! the write side for the whole of [`Blockchain::add_block`].

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::constants::{DEFAULT_CUT_OFF_AGE, GENESIS_HEIGHT};
use crate::error::{ChainError, TransactionError};
use crate::mempool::TransactionPool;
use crate::traits::TransactionValidator;
use crate::types::{Block, Hash256, Transaction};
use crate::utxo::{LedgerSnapshot, UtxoSet};
use crate::validation::UtxoValidator;

/// Tunables for the fork tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// How far below the best tip a branch may still be extended.
    pub cut_off_age: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            cut_off_age: DEFAULT_CUT_OFF_AGE,
        }
    }
}

impl ChainConfig {
    /// Configuration with the given retention horizon.
    pub fn with_cut_off_age(cut_off_age: u64) -> Self {
        Self { cut_off_age }
    }

    /// Highest height that may no longer receive children, given the tip height.
    pub fn retention_floor(&self, tip_height: u64) -> u64 {
        tip_height.saturating_sub(self.cut_off_age)
    }
}

/// One accepted block attached to the tree.
///
/// Immutable after creation except for its child list.
#[derive(Debug, Clone)]
pub struct ChainNode {
    block: Block,
    hash: Hash256,
    parent: Option<Hash256>,
    children: Vec<Hash256>,
    height: u64,
    snapshot: LedgerSnapshot,
    sequence: u64,
    accepted_at_ms: u64,
}

impl ChainNode {
    fn new(block: Block, hash: Hash256, parent: Option<Hash256>, height: u64, snapshot: LedgerSnapshot, sequence: u64) -> Self {
        Self {
            block,
            hash,
            parent,
            children: Vec::new(),
            height,
            snapshot,
            sequence,
            accepted_at_ms: unix_millis(),
        }
    }

    /// The block this node wraps.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Hash of the wrapped block.
    pub fn hash(&self) -> Hash256 {
        self.hash
    }

    /// Parent hash, `None` for the genesis node. The parent may since have
    /// been evicted.
    pub fn parent(&self) -> Option<Hash256> {
        self.parent
    }

    /// Hashes of retained children in admission order.
    pub fn children(&self) -> &[Hash256] {
        &self.children
    }

    /// Height in the tree; genesis is 1.
    pub fn height(&self) -> u64 {
        self.height
    }

    /// Ledger state after this block.
    pub fn snapshot(&self) -> &LedgerSnapshot {
        &self.snapshot
    }

    /// Unspent outputs after this block.
    pub fn utxo_set(&self) -> &UtxoSet {
        &self.snapshot.utxos
    }

    /// Transactions still pending on this branch.
    pub fn pending(&self) -> &TransactionPool {
        &self.snapshot.pending
    }

    /// Admission sequence number; lower was admitted earlier.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Wall-clock admission time in Unix milliseconds. Diagnostic only.
    pub fn accepted_at_ms(&self) -> u64 {
        self.accepted_at_ms
    }
}

/// Outcome of a successful [`Blockchain::add_block`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AdmittedBlock {
    /// Hash of the admitted block.
    pub hash: Hash256,
    /// Height assigned to it.
    pub height: u64,
    /// Whether it is now the best tip.
    pub became_tip: bool,
    /// Number of nodes evicted by the pruning pass that followed.
    pub pruned: usize,
}

/// Point-in-time summary of the tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ChainStats {
    /// Retained node count.
    pub retained: usize,
    /// Best-tip height.
    pub tip_height: u64,
    /// Best-tip hash.
    pub tip_hash: Hash256,
    /// Current retention floor.
    pub floor: u64,
    /// Retained nodes without children.
    pub leaves: usize,
    /// UTXO count at the best tip.
    pub tip_utxos: usize,
    /// Size of the chain-level pending pool.
    pub pending: usize,
}

/// The fork tree: retained nodes, the best tip and the pending pool.
pub struct Blockchain {
    /// Retained nodes by block hash.
    nodes: HashMap<Hash256, ChainNode>,
    /// Height → hashes in admission order.
    by_height: BTreeMap<u64, Vec<Hash256>>,
    /// Current best tip. Always present in `nodes`.
    best_tip: Hash256,
    /// Next admission sequence number.
    next_sequence: u64,
    /// Pending transactions offered to block producers.
    pool: TransactionPool,
    validator: Arc<dyn TransactionValidator>,
    config: ChainConfig,
}

impl fmt::Debug for Blockchain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Blockchain")
            .field("retained", &self.nodes.len())
            .field("best_tip", &self.best_tip)
            .field("tip_height", &self.tip_height())
            .field("config", &self.config)
            .finish()
    }
}

impl Blockchain {
    /// Create a chain rooted at `genesis` using the default [`UtxoValidator`].
    ///
    /// The genesis block is trusted: its coinbase outputs and the outputs of
    /// every other transaction it carries become spendable, and those other
    /// transactions are recorded as seen in the genesis pending pool.
    pub fn new(genesis: Block, config: ChainConfig) -> Self {
        Self::with_validator(genesis, config, Arc::new(UtxoValidator))
    }

    /// Create a chain rooted at `genesis` with a custom validator.
    pub fn with_validator(
        genesis: Block,
        config: ChainConfig,
        validator: Arc<dyn TransactionValidator>,
    ) -> Self {
        let mut snapshot = LedgerSnapshot::default();
        if let Err(e) = snapshot.utxos.add_outputs(&genesis.coinbase, GENESIS_HEIGHT) {
            warn!("genesis coinbase contributes no outputs: {e}");
        }
        for tx in &genesis.transactions {
            if let Err(e) = snapshot.utxos.add_outputs(tx, GENESIS_HEIGHT) {
                warn!("genesis transaction contributes no outputs: {e}");
                continue;
            }
            if let Err(e) = snapshot.pending.add(tx.clone()) {
                warn!("genesis transaction not recorded as pending: {e}");
            }
        }

        let hash = genesis.hash();
        let node = ChainNode::new(genesis, hash, None, GENESIS_HEIGHT, snapshot, 0);
        info!(%hash, utxos = node.utxo_set().len(), cut_off_age = config.cut_off_age, "chain initialised from genesis");

        let mut nodes = HashMap::new();
        nodes.insert(hash, node);
        let mut by_height = BTreeMap::new();
        by_height.insert(GENESIS_HEIGHT, vec![hash]);

        Self {
            nodes,
            by_height,
            best_tip: hash,
            next_sequence: 1,
            pool: TransactionPool::new(),
            validator,
            config,
        }
    }

    /// Admit a candidate block.
    ///
    /// On success the block is attached under its parent, the best tip is
    /// recomputed and out-of-horizon nodes are evicted. On any error the tree
    /// is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - [`ChainError::MalformedBlock`] if the block declares no parent, its
    ///   coinbase slot holds a regular transaction, or its header's `tx_root`
    ///   does not commit to its transactions
    /// - [`ChainError::DuplicateBlock`] if the block is already retained
    /// - [`ChainError::UnknownParent`] if the parent was never seen or is pruned
    /// - [`ChainError::StaleBranch`] if the block would sit at or below the
    ///   retention floor
    /// - [`ChainError::InvalidTransaction`] if any transaction is rejected
    pub fn add_block(&mut self, block: Block) -> Result<AdmittedBlock, ChainError> {
        let hash = block.hash();
        let result = self.admit(block, hash);
        if let Err(e) = &result {
            debug!(%hash, reason = e.kind(), "rejected block: {e}");
        }
        result
    }

    fn admit(&mut self, block: Block, hash: Hash256) -> Result<AdmittedBlock, ChainError> {
        let parent_hash = block
            .parent_hash()
            .ok_or_else(|| ChainError::MalformedBlock("block declares no parent".into()))?;
        if !block.coinbase.is_coinbase() {
            return Err(ChainError::MalformedBlock(
                "coinbase slot holds a non-coinbase transaction".into(),
            ));
        }
        let tx_root = block
            .compute_tx_root()
            .map_err(|e| ChainError::MalformedBlock(format!("tx root: {e}")))?;
        if tx_root != block.header.tx_root {
            return Err(ChainError::MalformedBlock(format!(
                "tx root mismatch: header {}, contents {tx_root}",
                block.header.tx_root
            )));
        }
        if self.nodes.contains_key(&hash) {
            return Err(ChainError::DuplicateBlock(hash.to_string()));
        }

        let parent = self
            .get_node(&parent_hash)
            .ok_or_else(|| ChainError::UnknownParent(parent_hash.to_string()))?;

        let height = parent.height + 1;
        let floor = self.retention_floor();
        if height <= floor {
            return Err(ChainError::StaleBranch { height, floor });
        }

        let snapshot = self.apply_block(parent.snapshot.clone(), &block, height)?;

        // Everything below mutates the tree; no further failure paths.
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        if let Some(parent) = self.nodes.get_mut(&parent_hash) {
            parent.children.push(hash);
        }
        self.by_height.entry(height).or_default().push(hash);
        self.nodes.insert(
            hash,
            ChainNode::new(block, hash, Some(parent_hash), height, snapshot, sequence),
        );

        let previous_tip = self.best_tip;
        self.best_tip = self.select_best_tip();
        let became_tip = self.best_tip == hash;
        if became_tip {
            let confirmed = self.confirm_on_best_chain(previous_tip);
            if confirmed > 0 {
                debug!(confirmed, pending = self.pool.len(), "dropped confirmed transactions from pool");
            }
            if parent_hash == previous_tip {
                info!(%hash, height, "extended best chain");
            } else {
                info!(%hash, height, %previous_tip, "best tip switched to another branch");
            }
        } else {
            debug!(%hash, height, tip_height = self.tip_height(), "retained block on side branch");
        }

        let pruned = self.prune();

        Ok(AdmittedBlock {
            hash,
            height,
            became_tip,
            pruned,
        })
    }

    /// Replay `block` on top of a private snapshot clone.
    ///
    /// The clone is dropped on the first rejected transaction.
    fn apply_block(
        &self,
        mut snapshot: LedgerSnapshot,
        block: &Block,
        height: u64,
    ) -> Result<LedgerSnapshot, ChainError> {
        for (index, tx) in block.transactions.iter().enumerate() {
            let invalid = |source: TransactionError| ChainError::InvalidTransaction { index, source };
            self.validator.validate(&snapshot.utxos, tx).map_err(invalid)?;
            snapshot.utxos.spend_inputs(tx).map_err(invalid)?;
            snapshot.utxos.add_outputs(tx, height).map_err(invalid)?;
        }

        snapshot
            .utxos
            .add_outputs(&block.coinbase, height)
            .map_err(|e| ChainError::MalformedBlock(format!("coinbase: {e}")))?;

        snapshot.pending.remove_confirmed(block);
        Ok(snapshot)
    }

    /// Remove from the chain-level pool everything confirmed between the
    /// current best tip and its common ancestor with `previous_tip`.
    ///
    /// Returns the number of pool entries removed.
    fn confirm_on_best_chain(&mut self, previous_tip: Hash256) -> usize {
        let old_chain: HashSet<Hash256> = self.ancestors(&previous_tip).into_iter().collect();
        let mut removed = 0;
        for hash in self.ancestors(&self.best_tip) {
            if old_chain.contains(&hash) {
                break;
            }
            if let Some(node) = self.nodes.get(&hash) {
                removed += self.pool.remove_confirmed(&node.block);
            }
        }
        removed
    }

    /// Highest bucket, earliest admission within it.
    fn select_best_tip(&self) -> Hash256 {
        self.by_height
            .values()
            .next_back()
            .and_then(|bucket| bucket.first())
            .copied()
            .unwrap_or(self.best_tip)
    }

    /// Evict every node strictly below `floor - 1`. Returns the eviction count.
    fn prune(&mut self) -> usize {
        let keep_from = self.retention_floor().saturating_sub(1);
        let retained = self.by_height.split_off(&keep_from);
        let evicted = std::mem::replace(&mut self.by_height, retained);

        let mut count = 0;
        for hash in evicted.into_values().flatten() {
            if let Some(node) = self.nodes.remove(&hash) {
                if let Some(parent) = node.parent.and_then(|p| self.nodes.get_mut(&p)) {
                    parent.children.retain(|child| *child != hash);
                }
                count += 1;
            }
        }
        if count > 0 {
            debug!(evicted = count, keep_from, retained = self.nodes.len(), "pruned nodes below horizon");
        }
        count
    }

    /// Insert a transaction into the pending pool offered to block producers.
    ///
    /// No validation happens here; a transaction is checked only when a block
    /// carrying it is admitted.
    pub fn add_transaction(&mut self, tx: Transaction) -> Result<Hash256, TransactionError> {
        let txid = self.pool.add(tx)?;
        debug!(%txid, pending = self.pool.len(), "added pending transaction");
        Ok(txid)
    }

    /// Look up a retained node by block hash.
    pub fn get_node(&self, hash: &Hash256) -> Option<&ChainNode> {
        self.nodes.get(hash)
    }

    /// Look up a retained block by hash.
    pub fn get_block(&self, hash: &Hash256) -> Option<&Block> {
        self.nodes.get(hash).map(ChainNode::block)
    }

    /// Whether a block with this hash is retained.
    pub fn contains_block(&self, hash: &Hash256) -> bool {
        self.nodes.contains_key(hash)
    }

    /// The best-tip node.
    pub fn best_tip(&self) -> &ChainNode {
        // `best_tip` is never evicted: pruning stops below the floor.
        &self.nodes[&self.best_tip]
    }

    /// Hash of the best tip.
    pub fn best_tip_hash(&self) -> Hash256 {
        self.best_tip
    }

    /// Height of the best tip.
    pub fn tip_height(&self) -> u64 {
        self.best_tip().height
    }

    /// Block at the best tip.
    pub fn max_height_block(&self) -> &Block {
        &self.best_tip().block
    }

    /// Copy of the best tip's UTXO set. Mutating it never affects the chain.
    pub fn max_height_utxo_set(&self) -> UtxoSet {
        self.best_tip().snapshot.utxos.clone()
    }

    /// The chain-level pending pool.
    pub fn transaction_pool(&self) -> &TransactionPool {
        &self.pool
    }

    /// Highest height that can no longer receive children.
    pub fn retention_floor(&self) -> u64 {
        self.config.retention_floor(self.tip_height())
    }

    /// Number of retained nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always false: the best tip is always retained.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Active configuration.
    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// Retained leaves, highest first, ties in admission order.
    pub fn tips(&self) -> Vec<&ChainNode> {
        let mut leaves: Vec<&ChainNode> = self
            .nodes
            .values()
            .filter(|node| node.children.is_empty())
            .collect();
        leaves.sort_by_key(|node| (std::cmp::Reverse(node.height), node.sequence));
        leaves
    }

    /// Hashes from the best tip back to its oldest retained ancestor.
    pub fn best_chain(&self) -> Vec<Hash256> {
        self.ancestors(&self.best_tip)
    }

    /// Hashes from `hash` back through every retained ancestor.
    ///
    /// Empty if `hash` is not retained.
    pub fn ancestors(&self, hash: &Hash256) -> Vec<Hash256> {
        let mut path = Vec::new();
        let mut cursor = self.nodes.get(hash);
        while let Some(node) = cursor {
            path.push(node.hash);
            cursor = node.parent.and_then(|p| self.nodes.get(&p));
        }
        path
    }

    /// Iterate over all retained nodes (arbitrary order).
    pub fn nodes(&self) -> impl Iterator<Item = &ChainNode> {
        self.nodes.values()
    }

    /// Summary counters for logging and monitoring.
    pub fn stats(&self) -> ChainStats {
        let tip = self.best_tip();
        ChainStats {
            retained: self.nodes.len(),
            tip_height: tip.height,
            tip_hash: tip.hash,
            floor: self.retention_floor(),
            leaves: self.nodes.values().filter(|n| n.children.is_empty()).count(),
            tip_utxos: tip.snapshot.utxos.len(),
            pending: self.pool.len(),
        }
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
