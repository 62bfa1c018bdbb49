//! Shared test helpers for E2E and property tests.

use arbor_core::constants::COIN;
use arbor_core::genesis::genesis_block;
use arbor_core::types::*;
use arbor_core::Blockchain;

/// Timestamp of the first helper-built block.
pub const BASE_TIMESTAMP: u64 = 1_700_000_000;

/// Simple pubkey hash from a seed byte.
pub fn pkh(seed: u8) -> Hash256 {
    Hash256([seed; 32])
}

/// Create a coinbase transaction with a unique height marker.
///
/// Sets `lock_time: height` so that each coinbase produces a distinct txid
/// per block height and recipient.
pub fn make_coinbase(value: u64, pubkey_hash: Hash256, height: u64) -> Transaction {
    Transaction {
        version: 1,
        inputs: vec![TxInput {
            previous_output: OutPoint::null(),
            signature: height.to_le_bytes().to_vec(),
        }],
        outputs: vec![TxOutput {
            value,
            pubkey_hash,
        }],
        lock_time: height,
    }
}

/// Create a simple spending transaction (unsigned).
pub fn make_tx(inputs: Vec<OutPoint>, outputs: Vec<(u64, Hash256)>) -> Transaction {
    Transaction {
        version: 1,
        inputs: inputs
            .into_iter()
            .map(|op| TxInput {
                previous_output: op,
                signature: vec![0; 64],
            })
            .collect(),
        outputs: outputs
            .into_iter()
            .map(|(value, pubkey_hash)| TxOutput { value, pubkey_hash })
            .collect(),
        lock_time: 0,
    }
}

/// Create a block with a correct transaction root.
pub fn make_block(
    prev_hash: Hash256,
    timestamp: u64,
    coinbase: Transaction,
    txs: Vec<Transaction>,
) -> Block {
    let mut block = Block {
        header: BlockHeader {
            version: 1,
            prev_hash,
            tx_root: Hash256::ZERO,
            timestamp,
            nonce: 0,
        },
        coinbase,
        transactions: txs,
    };
    block.header.tx_root = block.compute_tx_root().unwrap();
    block
}

/// Block at `height` on `parent` carrying `txs`; `miner` keeps siblings distinct.
pub fn block_at(parent: Hash256, height: u64, miner: u8, txs: Vec<Transaction>) -> Block {
    make_block(
        parent,
        BASE_TIMESTAMP + height * 60,
        make_coinbase(50 * COIN, pkh(miner), height),
        txs,
    )
}

/// Outpoint `index` of `tx`.
pub fn outpoint(tx: &Transaction, index: u64) -> OutPoint {
    OutPoint {
        txid: tx.txid().unwrap(),
        index,
    }
}

/// Genesis paying `value` to `pkh(recipient)`.
pub fn test_genesis(value: u64, recipient: u8) -> Block {
    genesis_block(&[(value, pkh(recipient))], BASE_TIMESTAMP, vec![])
}

/// Extend `chain` from `from` by `count` empty blocks mined by `miner`.
///
/// Returns the hashes in order; panics if any block is rejected.
pub fn extend(chain: &mut Blockchain, from: Hash256, count: u64, miner: u8) -> Vec<Hash256> {
    let mut parent = from;
    let mut hashes = Vec::new();
    for _ in 0..count {
        let height = chain
            .get_node(&parent)
            .expect("parent retained")
            .height()
            + 1;
        parent = chain
            .add_block(block_at(parent, height, miner, vec![]))
            .expect("block accepted")
            .hash;
        hashes.push(parent);
    }
    hashes
}
