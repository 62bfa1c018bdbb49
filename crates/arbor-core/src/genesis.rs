//! Genesis block construction.
//!
//! The fork tree accepts any genesis block it is given without verification.
//! This module builds the deterministic development genesis used by the node
//! binary and by tests, plus a general builder for custom allocations.

use std::sync::LazyLock;

use crate::constants::{COIN, PROTOCOL_VERSION};
use crate::types::{Block, BlockHeader, Hash256, OutPoint, Transaction, TxInput, TxOutput};

/// Development genesis timestamp: January 1, 2026 00:00:00 UTC.
pub const GENESIS_TIMESTAMP: u64 = 1_767_225_600;

/// Message embedded in the genesis coinbase.
pub const GENESIS_MESSAGE: &[u8] = b"arbor genesis: every branch starts here";

/// Value minted by the development genesis coinbase.
pub const DEV_GENESIS_VALUE: u64 = 50 * COIN;

/// Recipient of the development genesis coinbase.
pub const DEV_GENESIS_RECIPIENT: Hash256 = Hash256([0xA1; 32]);

/// Cached development genesis, computed once on first access.
static DEV_GENESIS: LazyLock<Block> =
    LazyLock::new(|| genesis_block(&[(DEV_GENESIS_VALUE, DEV_GENESIS_RECIPIENT)], GENESIS_TIMESTAMP, vec![]));

/// The development genesis block.
pub fn dev_genesis() -> &'static Block {
    &DEV_GENESIS
}

/// Hash of the development genesis block.
pub fn dev_genesis_hash() -> Hash256 {
    DEV_GENESIS.hash()
}

/// Build a genesis coinbase paying `allocations`, tagged with `message`.
pub fn genesis_coinbase(allocations: &[(u64, Hash256)], message: &[u8]) -> Transaction {
    Transaction {
        version: PROTOCOL_VERSION,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature: message.to_vec(),
        }],
        outputs: allocations
            .iter()
            .map(|(value, pubkey_hash)| TxOutput {
                value: *value,
                pubkey_hash: *pubkey_hash,
            })
            .collect(),
        lock_time: 0,
    }
}

/// Build a parentless block whose coinbase pays `allocations`.
///
/// `transactions` may pre-fund further outputs; their outputs become spendable
/// at genesis exactly like the coinbase's.
pub fn genesis_block(
    allocations: &[(u64, Hash256)],
    timestamp: u64,
    transactions: Vec<Transaction>,
) -> Block {
    let mut block = Block {
        header: BlockHeader {
            version: PROTOCOL_VERSION,
            prev_hash: Hash256::ZERO,
            tx_root: Hash256::ZERO,
            timestamp,
            nonce: 0,
        },
        coinbase: genesis_coinbase(allocations, GENESIS_MESSAGE),
        transactions,
    };
    // Unencodable transactions leave the root zeroed; genesis is trusted anyway.
    block.header.tx_root = block.compute_tx_root().unwrap_or(Hash256::ZERO);
    block
}
