//! Trait interfaces for the Arbor ledger.
//!
//! - [`TransactionValidator`] — decides whether a transaction may be applied
//!   to a UTXO set. The fork tree trusts the verdict and performs the UTXO
//!   mutation itself.

use crate::error::TransactionError;
use crate::types::Transaction;
use crate::utxo::UtxoSet;
use crate::validation::ValidatedTransaction;

/// Accept/reject verdicts for non-coinbase transactions.
///
/// Implementations must be pure with respect to `utxos`: they only read the
/// set. Deployments that verify signatures plug in their own implementation;
/// [`UtxoValidator`](crate::validation::UtxoValidator) is the default.
pub trait TransactionValidator: Send + Sync {
    /// Validate `tx` against the UTXO set of the branch it would extend.
    fn validate(&self, utxos: &UtxoSet, tx: &Transaction) -> Result<ValidatedTransaction, TransactionError>;

    /// Convenience wrapper returning only the verdict.
    ///
    /// Default implementation delegates to [`validate`](Self::validate).
    fn is_valid(&self, utxos: &UtxoSet, tx: &Transaction) -> bool {
        self.validate(utxos, tx).is_ok()
    }
}
