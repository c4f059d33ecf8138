//! Transaction pool of unconfirmed transactions

use crate::error::{ConsensusError, Result};
use crate::ledger::Ledger;
use crate::transaction::validate_transaction_at;
use crate::types::*;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct PoolEntry {
    transaction: Transaction,
    sequence: u64,
}

/// Unconfirmed transactions keyed by transaction id, in arrival order, with
/// an index from every consumed output id to the transaction spending it.
///
/// A transaction must have at least one input to be admitted. At most one
/// pooled transaction spends any given output (first seen wins).
#[derive(Debug, Clone, Default)]
pub struct TransactionPool {
    entries: HashMap<TransactionId, PoolEntry>,
    order: BTreeMap<u64, TransactionId>,
    spenders: HashMap<OutputId, TransactionId>,
    next_sequence: u64,
}

impl TransactionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, id: &TransactionId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn get(&self, id: &TransactionId) -> Option<&Transaction> {
        self.entries.get(id).map(|entry| &entry.transaction)
    }

    /// The pooled transaction spending `output_id`, if any.
    pub fn spender(&self, output_id: &OutputId) -> Option<&TransactionId> {
        self.spenders.get(output_id)
    }

    /// Pooled transactions in arrival order.
    pub fn transactions(&self) -> impl Iterator<Item = &Transaction> {
        self.order
            .values()
            .filter_map(move |id| self.entries.get(id))
            .map(|entry| &entry.transaction)
    }

    /// AcceptTransaction: check for conflicts with the pool, validate against
    /// the ledger at the next block's height, then record the transaction.
    pub fn accept(&mut self, ledger: &Ledger, tx: Transaction) -> Result<TransactionId> {
        if tx.inputs.is_empty() {
            return Err(ConsensusError::NoInputs);
        }

        if tx.inputs.iter().any(|input| self.spenders.contains_key(&input.output_id)) {
            return Err(ConsensusError::ConflictingTransaction);
        }

        validate_transaction_at(ledger, &tx, next_block_height(ledger))?;

        let id = tx.id()?;
        self.insert(id, tx);
        Ok(id)
    }

    fn insert(&mut self, id: TransactionId, tx: Transaction) {
        for input in &tx.inputs {
            self.spenders.insert(input.output_id, id);
        }
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.order.insert(sequence, id);
        self.entries.insert(id, PoolEntry { transaction: tx, sequence });
    }

    pub fn remove(&mut self, id: &TransactionId) -> Option<Transaction> {
        let entry = self.entries.remove(id)?;
        self.order.remove(&entry.sequence);
        for input in &entry.transaction.inputs {
            if self.spenders.get(&input.output_id) == Some(id) {
                self.spenders.remove(&input.output_id);
            }
        }
        Some(entry.transaction)
    }

    /// Pooled transactions for a block of at most `size_limit` encoded bytes.
    ///
    /// Greedy in arrival order: stops at the first transaction that does not
    /// fit, even if a later one would.
    pub fn for_block(&self, size_limit: usize) -> Result<Vec<Transaction>> {
        let mut remaining = size_limit;
        let mut selected = Vec::new();
        for tx in self.transactions() {
            let size = tx.encoded_size()?;
            if size > remaining {
                break;
            }
            remaining -= size;
            selected.push(tx.clone());
        }
        Ok(selected)
    }

    /// Drop every pooled transaction included in `block` or spending an
    /// output one of its transactions spends.
    pub fn remove_confirmed(&mut self, block: &Block) -> Result<usize> {
        let mut removed = 0;
        for tx in &block.transactions {
            if self.remove(&tx.id()?).is_some() {
                removed += 1;
            }
            for input in &tx.inputs {
                if let Some(conflict) = self.spenders.get(&input.output_id).copied() {
                    self.remove(&conflict);
                    removed += 1;
                }
            }
        }
        if removed > 0 {
            debug!(removed, "dropped confirmed and conflicting pool transactions");
        }
        Ok(removed)
    }

    /// Drop every pooled transaction that no longer validates against `ledger`
    /// at the next block's height.
    pub fn refilter(&mut self, ledger: &Ledger) -> usize {
        let height = next_block_height(ledger);
        let invalid: Vec<TransactionId> = self
            .order
            .values()
            .filter(|id| {
                self.entries
                    .get(*id)
                    .map_or(false, |entry| validate_transaction_at(ledger, &entry.transaction, height).is_err())
            })
            .copied()
            .collect();
        for id in &invalid {
            self.remove(id);
        }
        if !invalid.is_empty() {
            info!(removed = invalid.len(), remaining = self.len(), "refiltered transaction pool");
        }
        invalid.len()
    }
}

/// Height at which the next block applies its transactions.
fn next_block_height(ledger: &Ledger) -> Height {
    ledger.height().saturating_add(1)
}
