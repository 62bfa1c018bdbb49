//! Node composition and the block ingest loop.
//!
//! The [`Node`] owns the fork tree behind a `parking_lot::RwLock`. Admission
//! holds the write lock for the whole of `add_block`, pruning included, so
//! readers never observe a half-attached block. Reads take the read lock and
//! return owned copies.
//!
//! [`Node::spawn_ingest`] starts a single tokio task that drains a bounded
//! channel of candidate blocks and admits them one at a time.

use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use arbor_core::error::{ChainError, TransactionError};
use arbor_core::traits::TransactionValidator;
use arbor_core::types::{Block, Hash256, Transaction};
use arbor_core::utxo::UtxoSet;
use arbor_core::{AdmittedBlock, Blockchain, ChainStats};

use crate::config::NodeConfig;

/// The node: a fork tree plus its configuration.
pub struct Node {
    /// Fork tree behind a read-write lock.
    chain: RwLock<Blockchain>,
    /// Node configuration.
    config: NodeConfig,
}

impl Node {
    /// Create a node rooted at `genesis` with the default validator.
    pub fn new(genesis: Block, config: NodeConfig) -> Arc<Self> {
        let chain = Blockchain::new(genesis, config.chain);
        Arc::new(Self {
            chain: RwLock::new(chain),
            config,
        })
    }

    /// Create a node rooted at `genesis` with a custom validator.
    pub fn with_validator(
        genesis: Block,
        config: NodeConfig,
        validator: Arc<dyn TransactionValidator>,
    ) -> Arc<Self> {
        let chain = Blockchain::with_validator(genesis, config.chain, validator);
        Arc::new(Self {
            chain: RwLock::new(chain),
            config,
        })
    }

    /// Admit a candidate block under the write lock.
    pub fn process_block(&self, block: Block) -> Result<AdmittedBlock, ChainError> {
        let mut chain = self.chain.write();
        chain.add_block(block)
    }

    /// Add a transaction to the pending pool.
    pub fn submit_transaction(&self, tx: Transaction) -> Result<Hash256, TransactionError> {
        self.chain.write().add_transaction(tx)
    }

    /// Current best tip as `(height, hash)`.
    pub fn chain_tip(&self) -> (u64, Hash256) {
        let chain = self.chain.read();
        (chain.tip_height(), chain.best_tip_hash())
    }

    /// Copy of the block at the best tip.
    pub fn tip_block(&self) -> Block {
        self.chain.read().max_height_block().clone()
    }

    /// Copy of the UTXO set at the best tip.
    pub fn utxo_set(&self) -> UtxoSet {
        self.chain.read().max_height_utxo_set()
    }

    /// Copies of the pending transactions, in txid order.
    pub fn pending_transactions(&self) -> Vec<Transaction> {
        self.chain
            .read()
            .transaction_pool()
            .transactions()
            .into_iter()
            .cloned()
            .collect()
    }

    /// Whether a block is currently retained.
    pub fn contains_block(&self, hash: &Hash256) -> bool {
        self.chain.read().contains_block(hash)
    }

    /// Summary of the fork tree.
    pub fn stats(&self) -> ChainStats {
        self.chain.read().stats()
    }

    /// Node configuration.
    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// Start the single-writer ingest task.
    ///
    /// Blocks sent through the returned handle are admitted in arrival order.
    /// The task ends once every sender is dropped and reports its tallies.
    pub fn spawn_ingest(self: &Arc<Self>) -> IngestHandle {
        let (sender, mut receiver) = mpsc::channel::<Block>(self.config.ingest_queue_depth);
        let node = Arc::clone(self);

        let task = tokio::spawn(async move {
            let mut summary = IngestSummary::default();
            while let Some(block) = receiver.recv().await {
                match node.process_block(block) {
                    Ok(admitted) => {
                        summary.accepted += 1;
                        summary.pruned += admitted.pruned;
                        if admitted.became_tip {
                            summary.tip_changes += 1;
                        }
                    }
                    Err(e) => {
                        summary.rejected += 1;
                        debug!(reason = e.kind(), "ingest rejected block: {e}");
                    }
                }
            }
            let (height, hash) = node.chain_tip();
            info!(
                accepted = summary.accepted,
                rejected = summary.rejected,
                height,
                %hash,
                "ingest finished"
            );
            summary
        });

        IngestHandle { sender, task }
    }
}

/// Tallies reported by the ingest task when it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestSummary {
    /// Blocks admitted.
    pub accepted: usize,
    /// Blocks refused.
    pub rejected: usize,
    /// Admissions that moved the best tip.
    pub tip_changes: usize,
    /// Nodes evicted across all admissions.
    pub pruned: usize,
}

/// Handle to a running ingest task.
pub struct IngestHandle {
    sender: mpsc::Sender<Block>,
    task: JoinHandle<IngestSummary>,
}

impl IngestHandle {
    /// Queue a block, waiting for channel capacity.
    ///
    /// Fails only if the ingest task has stopped.
    pub async fn submit(&self, block: Block) -> Result<(), mpsc::error::SendError<Block>> {
        self.sender.send(block).await
    }

    /// Another sender feeding the same task.
    pub fn sender(&self) -> mpsc::Sender<Block> {
        self.sender.clone()
    }

    /// Close this handle's sender and wait for the task's summary.
    ///
    /// Returns the default summary if the task panicked.
    pub async fn finish(self) -> IngestSummary {
        drop(self.sender);
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("ingest task failed: {e}");
                IngestSummary::default()
            }
        }
    }
}
