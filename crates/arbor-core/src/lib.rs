//! # arbor-core
//! Foundation types and the fork-aware chain manager for the Arbor ledger.

pub mod blockchain;
pub mod constants;
pub mod error;
pub mod genesis;
pub mod mempool;
pub mod traits;
pub mod types;
pub mod utxo;
pub mod validation;

pub use blockchain::{AdmittedBlock, Blockchain, ChainConfig, ChainNode, ChainStats};
pub use error::{ArborError, ChainError, TransactionError};
