//! Core protocol types: transactions, blocks, UTXOs.
//!
//! All monetary values are in motes (1 ARB = 10^8 motes).
//! All numeric fields use u64 per protocol convention.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

use crate::error::TransactionError;

/// A 32-byte hash value.
///
/// Used for transaction IDs (BLAKE3), block header hashes (double SHA-256)
/// and transaction roots (BLAKE3). Serialized as lowercase hex in
/// human-readable formats.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default,
    bincode::Encode, bincode::Decode,
)]
#[serde(into = "String", try_from = "String")]
pub struct Hash256(pub [u8; 32]);

impl Hash256 {
    /// The zero hash. A block header carrying it as `prev_hash` declares no parent.
    pub const ZERO: Self = Self([0u8; 32]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for Hash256 {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<Hash256> for String {
    fn from(hash: Hash256) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for Hash256 {
    type Error = hex::FromHexError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reference to a specific output of a previous transaction.
///
/// This is the identity of a UTXO: `(originating txid, output index)`.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord,
    bincode::Encode, bincode::Decode,
)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u64,
}

impl OutPoint {
    /// The null outpoint, used for coinbase transaction inputs.
    pub fn null() -> Self {
        Self {
            txid: Hash256::ZERO,
            index: u64::MAX,
        }
    }

    /// Check if this is the null outpoint (coinbase marker).
    pub fn is_null(&self) -> bool {
        self.txid.is_zero() && self.index == u64::MAX
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxInput {
    /// The outpoint being spent. Null outpoint for coinbase.
    pub previous_output: OutPoint,
    /// Authorization data. Opaque to the ledger; coinbase inputs carry
    /// arbitrary extra data here.
    #[serde(default)]
    pub signature: Vec<u8>,
}

/// A transaction output, creating a new UTXO.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct TxOutput {
    /// Value in motes.
    pub value: u64,
    /// Hash identifying the recipient.
    pub pubkey_hash: Hash256,
}

/// A transaction transferring value between addresses.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Transaction {
    /// Protocol version.
    pub version: u64,
    /// Inputs consuming previous outputs.
    pub inputs: Vec<TxInput>,
    /// New outputs created by this transaction.
    pub outputs: Vec<TxOutput>,
    /// Free-form lock field; coinbases put their height here so txids stay unique.
    #[serde(default)]
    pub lock_time: u64,
}

impl Transaction {
    /// Compute the transaction ID (BLAKE3 hash of the canonical encoding).
    ///
    /// Uses bincode with standard config for deterministic serialization.
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        let encoded = bincode::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TransactionError::Serialization(e.to_string()))?;
        Ok(Hash256(blake3::hash(&encoded).into()))
    }

    /// Check if this is a coinbase transaction (single input with null outpoint).
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].previous_output.is_null()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, out| acc.checked_add(out.value))
    }

    /// Outpoints created by this transaction, paired with their outputs.
    pub fn created_outpoints(&self) -> Result<Vec<(OutPoint, &TxOutput)>, TransactionError> {
        let txid = self.txid()?;
        Ok(self
            .outputs
            .iter()
            .enumerate()
            .map(|(index, output)| (OutPoint { txid, index: index as u64 }, output))
            .collect())
    }
}

/// Block header.
///
/// Hash is computed as double SHA-256 over a fixed byte layout.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct BlockHeader {
    /// Protocol version.
    pub version: u64,
    /// Hash of the parent block header. Zero declares no parent.
    pub prev_hash: Hash256,
    /// BLAKE3 commitment over the coinbase and transaction ids.
    pub tx_root: Hash256,
    /// Unix timestamp in seconds, as claimed by the producer.
    pub timestamp: u64,
    /// Producer nonce. Not interpreted by the ledger.
    pub nonce: u64,
}

impl BlockHeader {
    /// Header size in bytes when serialized for hashing (3 u64 fields + 2 * 32-byte hashes).
    const HASH_SIZE: usize = 3 * 8 + 2 * 32;

    /// Compute the block header hash (double SHA-256).
    ///
    /// Layout: version || prev_hash || tx_root || timestamp || nonce, all
    /// little-endian.
    pub fn hash(&self) -> Hash256 {
        let mut data = Vec::with_capacity(Self::HASH_SIZE);
        data.extend_from_slice(&self.version.to_le_bytes());
        data.extend_from_slice(self.prev_hash.as_bytes());
        data.extend_from_slice(self.tx_root.as_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.nonce.to_le_bytes());
        let first = Sha256::digest(&data);
        Hash256(Sha256::digest(first).into())
    }
}

/// A complete block: header, coinbase and the ordered non-coinbase transactions.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct Block {
    /// Block header.
    pub header: BlockHeader,
    /// Reward transaction. Its outputs are credited without input validation.
    pub coinbase: Transaction,
    /// Non-coinbase transactions in application order.
    #[serde(default)]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// Hash of this block's header.
    pub fn hash(&self) -> Hash256 {
        self.header.hash()
    }

    /// Declared parent hash, or `None` if the header carries the zero hash.
    pub fn parent_hash(&self) -> Option<Hash256> {
        if self.header.prev_hash.is_zero() {
            None
        } else {
            Some(self.header.prev_hash)
        }
    }

    /// Txids of the coinbase followed by every non-coinbase transaction.
    pub fn txids(&self) -> Result<Vec<Hash256>, TransactionError> {
        std::iter::once(&self.coinbase)
            .chain(self.transactions.iter())
            .map(Transaction::txid)
            .collect()
    }

    /// Commitment over [`txids`](Self::txids): BLAKE3 of their concatenation.
    pub fn compute_tx_root(&self) -> Result<Hash256, TransactionError> {
        let mut hasher = blake3::Hasher::new();
        for txid in self.txids()? {
            hasher.update(txid.as_bytes());
        }
        Ok(Hash256(hasher.finalize().into()))
    }
}

/// An entry in the unspent transaction output set.
#[derive(
    Serialize, Deserialize, Clone, Debug, PartialEq, Eq,
    bincode::Encode, bincode::Decode,
)]
pub struct UtxoEntry {
    /// The unspent output.
    pub output: TxOutput,
    /// Height of the block containing this UTXO.
    pub block_height: u64,
    /// Whether this output is from a coinbase transaction.
    pub is_coinbase: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;

    fn sample_pubkey_hash() -> Hash256 {
        Hash256([0xAA; 32])
    }

    fn sample_tx() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint {
                    txid: Hash256([0x11; 32]),
                    index: 0,
                },
                signature: vec![0u8; 64],
            }],
            outputs: vec![TxOutput {
                value: 50 * COIN,
                pubkey_hash: sample_pubkey_hash(),
            }],
            lock_time: 0,
        }
    }

    fn sample_coinbase() -> Transaction {
        Transaction {
            version: 1,
            inputs: vec![TxInput {
                previous_output: OutPoint::null(),
                signature: vec![],
            }],
            outputs: vec![TxOutput {
                value: 50 * COIN,
                pubkey_hash: sample_pubkey_hash(),
            }],
            lock_time: 0,
        }
    }

    fn sample_header() -> BlockHeader {
        BlockHeader {
            version: 1,
            prev_hash: Hash256([0x22; 32]),
            tx_root: Hash256::ZERO,
            timestamp: 1_700_000_000,
            nonce: 0,
        }
    }

    // --- Hash256 ---

    #[test]
    fn hash256_zero_is_zero() {
        let h = Hash256::ZERO;
        assert!(h.is_zero());
        assert_eq!(h, Hash256::default());
    }

    #[test]
    fn hash256_display_hex() {
        let h = Hash256([0xAB; 32]);
        let s = format!("{h}");
        assert_eq!(s.len(), 64);
        assert_eq!(&s[0..2], "ab");
    }

    #[test]
    fn hash256_parses_own_display() {
        let h = Hash256([0x5C; 32]);
        assert_eq!(h.to_string().parse::<Hash256>().unwrap(), h);
        assert!("zz".parse::<Hash256>().is_err());
    }

    #[test]
    fn hash256_json_is_hex_string() {
        let h = Hash256([0x01; 32]);
        let json = serde_json::to_string(&h).unwrap();
        assert_eq!(json, format!("\"{}\"", "01".repeat(32)));
        let back: Hash256 = serde_json::from_str(&json).unwrap();
        assert_eq!(back, h);
    }

    // --- OutPoint ---

    #[test]
    fn outpoint_null_detection() {
        assert!(OutPoint::null().is_null());
        assert!(!OutPoint { txid: Hash256([1; 32]), index: 0 }.is_null());
    }

    #[test]
    fn outpoint_display() {
        let op = OutPoint { txid: Hash256([0xFF; 32]), index: 3 };
        assert!(format!("{op}").ends_with(":3"));
    }

    // --- Transaction ---

    #[test]
    fn coinbase_detection() {
        assert!(sample_coinbase().is_coinbase());
        assert!(!sample_tx().is_coinbase());
    }

    #[test]
    fn total_output_value_overflow_returns_none() {
        let tx = Transaction {
            version: 1,
            inputs: vec![],
            outputs: vec![
                TxOutput { value: u64::MAX, pubkey_hash: Hash256::ZERO },
                TxOutput { value: 1, pubkey_hash: Hash256::ZERO },
            ],
            lock_time: 0,
        };
        assert_eq!(tx.total_output_value(), None);
    }

    #[test]
    fn txid_changes_with_data() {
        let tx1 = sample_tx();
        let mut tx2 = sample_tx();
        tx2.lock_time = 1;
        assert_eq!(tx1.txid().unwrap(), tx1.txid().unwrap());
        assert_ne!(tx1.txid().unwrap(), tx2.txid().unwrap());
    }

    #[test]
    fn created_outpoints_index_each_output() {
        let mut tx = sample_tx();
        tx.outputs.push(TxOutput { value: 1, pubkey_hash: Hash256::ZERO });
        let txid = tx.txid().unwrap();
        let created = tx.created_outpoints().unwrap();
        assert_eq!(created.len(), 2);
        assert_eq!(created[1].0, OutPoint { txid, index: 1 });
        assert_eq!(created[1].1.value, 1);
    }

    // --- BlockHeader / Block ---

    #[test]
    fn block_header_hash_changes_with_nonce() {
        let h1 = sample_header();
        let mut h2 = h1.clone();
        h2.nonce = 1;
        assert_eq!(h1.hash(), h1.hash());
        assert_ne!(h1.hash(), h2.hash());
    }

    #[test]
    fn parent_hash_none_for_zero_prev() {
        let mut block = Block {
            header: sample_header(),
            coinbase: sample_coinbase(),
            transactions: vec![],
        };
        assert_eq!(block.parent_hash(), Some(Hash256([0x22; 32])));
        block.header.prev_hash = Hash256::ZERO;
        assert_eq!(block.parent_hash(), None);
    }

    #[test]
    fn tx_root_commits_to_order() {
        let mut other = sample_tx();
        other.lock_time = 9;
        let a = Block {
            header: sample_header(),
            coinbase: sample_coinbase(),
            transactions: vec![sample_tx(), other.clone()],
        };
        let b = Block {
            transactions: vec![other, sample_tx()],
            ..a.clone()
        };
        assert_eq!(a.txids().unwrap().len(), 3);
        assert_ne!(a.compute_tx_root().unwrap(), b.compute_tx_root().unwrap());
    }

    #[test]
    fn block_json_round_trip_keeps_hash() {
        let block = Block {
            header: sample_header(),
            coinbase: sample_coinbase(),
            transactions: vec![sample_tx()],
        };
        let json = serde_json::to_string(&block).unwrap();
        let decoded: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.hash(), block.hash());
    }
}
