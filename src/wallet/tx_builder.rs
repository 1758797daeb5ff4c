// Transaction builder

use crate::core::{Address, OutPoint, Transaction, TransactionInput, TransactionOutput};
use crate::wallet::keys::Keypair;
use std::collections::HashMap;

/// Builds signed spending transactions from a set of owned outputs.
pub struct TransactionBuilder<'a> {
    keys: &'a Keypair,
}

impl<'a> TransactionBuilder<'a> {
    pub fn new(keys: &'a Keypair) -> Self {
        Self { keys }
    }

    /// Build and sign a transaction paying `recipients` out of `owned`
    /// (outpoint -> balance), plus an explicit fee for the miner.
    ///
    /// Selection is smallest-balance-first: a greedy sweep of dust before
    /// larger outputs, not an attempt at minimal input count. Any excess
    /// over payments + fee returns to the sender as a change output.
    pub fn build(
        &self,
        owned: &HashMap<OutPoint, u64>,
        recipients: &[(Address, u64)],
        fee: u64,
    ) -> Result<Transaction, String> {
        let mut outputs = Vec::with_capacity(recipients.len() + 1);
        let mut payment_total: u64 = 0;
        for (address, value) in recipients {
            if *value == 0 {
                return Err("Output value must be positive".to_string());
            }
            outputs.push(TransactionOutput::new(address.clone(), *value));
            payment_total += value;
        }
        if outputs.is_empty() {
            return Err("Transaction needs at least one recipient".to_string());
        }
        let target = payment_total + fee;

        // Smallest-balance-first selection until the target is covered
        let mut candidates: Vec<(OutPoint, u64)> =
            owned.iter().map(|(outpoint, balance)| (*outpoint, *balance)).collect();
        candidates.sort_by_key(|(outpoint, balance)| (*balance, *outpoint));

        let mut selected = Vec::new();
        let mut allocated: u64 = 0;
        for (outpoint, balance) in candidates {
            if allocated >= target {
                break;
            }
            selected.push((outpoint, balance));
            allocated += balance;
        }

        if allocated < target {
            return Err(format!(
                "Insufficient funds: have {}, need {}",
                allocated, target
            ));
        }

        let change = allocated - target;
        if change > 0 {
            outputs.push(TransactionOutput::new(self.keys.address(), change));
        }

        let inputs: Vec<TransactionInput> = selected
            .into_iter()
            .map(|(outpoint, balance)| TransactionInput::with_balance(outpoint, balance))
            .collect();

        let mut tx = Transaction::new(self.keys.address(), inputs, outputs);
        self.keys.sign_transaction(&mut tx);
        Ok(tx)
    }
}
