//! Default transaction validation.
//!
//! [`UtxoValidator`] applies the ledger rules that need nothing beyond the
//! UTXO set of the branch being extended:
//!
//! - the transaction is not a coinbase and has inputs and outputs
//! - every input references an unspent output in the set
//! - no output is claimed twice by the same transaction
//! - every output carries a non-zero value
//! - input value covers output value without overflow
//!
//! Signature checks are left to deployments that wrap or replace this
//! validator.

use std::collections::HashSet;

use crate::error::TransactionError;
use crate::traits::TransactionValidator;
use crate::types::Transaction;
use crate::utxo::UtxoSet;

/// Summary of a successfully validated transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// Total value of all spent inputs in motes.
    pub total_input: u64,
    /// Total value of all created outputs in motes.
    pub total_output: u64,
    /// Transaction fee in motes (`total_input - total_output`).
    pub fee: u64,
}

/// Validate transaction structure (context-free).
pub fn validate_transaction_structure(tx: &Transaction) -> Result<(), TransactionError> {
    if tx.is_coinbase() {
        return Err(TransactionError::UnexpectedCoinbase);
    }

    if tx.inputs.is_empty() || tx.outputs.is_empty() {
        return Err(TransactionError::EmptyInputsOrOutputs);
    }

    for (i, output) in tx.outputs.iter().enumerate() {
        if output.value == 0 {
            return Err(TransactionError::ZeroValueOutput(i));
        }
    }

    let mut seen = HashSet::with_capacity(tx.inputs.len());
    for input in &tx.inputs {
        if !seen.insert(&input.previous_output) {
            return Err(TransactionError::DuplicateInput(
                input.previous_output.to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate a transaction against a UTXO set (contextual).
///
/// Runs [`validate_transaction_structure`] first, then resolves every input
/// in `utxos` and checks value conservation.
pub fn validate_transaction(
    utxos: &UtxoSet,
    tx: &Transaction,
) -> Result<ValidatedTransaction, TransactionError> {
    validate_transaction_structure(tx)?;

    let mut total_input: u64 = 0;
    for input in &tx.inputs {
        let utxo = utxos.get(&input.previous_output).ok_or_else(|| {
            TransactionError::UnknownUtxo(input.previous_output.to_string())
        })?;
        total_input = total_input
            .checked_add(utxo.output.value)
            .ok_or(TransactionError::ValueOverflow)?;
    }

    let total_output = tx
        .total_output_value()
        .ok_or(TransactionError::ValueOverflow)?;

    let fee = total_input
        .checked_sub(total_output)
        .ok_or(TransactionError::InsufficientFunds {
            have: total_input,
            need: total_output,
        })?;

    Ok(ValidatedTransaction {
        total_input,
        total_output,
        fee,
    })
}

/// The default [`TransactionValidator`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UtxoValidator;

impl TransactionValidator for UtxoValidator {
    fn validate(&self, utxos: &UtxoSet, tx: &Transaction) -> Result<ValidatedTransaction, TransactionError> {
        validate_transaction(utxos, tx)
    }
}
