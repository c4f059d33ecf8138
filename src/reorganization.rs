//! Applying consensus changes to the ledger

use crate::error::Result;
use crate::ledger::Ledger;
use crate::transition::{apply_block, revert_block};
use crate::types::*;
use tracing::info;

/// Reorganize: Ledger × ConsensusChange → Ledger
///
/// For a change with reverted blocks [r1, ..., rm] (old tip first) and
/// applied blocks [a1, ..., an] (fork point first):
/// 1. Copy the ledger
/// 2. Revert r1..rm in order on the copy
/// 3. Apply a1..an in order on the copy
/// 4. Return the copy; the input ledger is never touched, so a failing change
///    is as if it never happened
pub fn apply_consensus_change(ledger: &Ledger, change: &ConsensusChange) -> Result<ReorganizationResult> {
    let mut working = ledger.clone();

    for block in &change.reverted_blocks {
        revert_block(&mut working, block)?;
    }

    for block in &change.applied_blocks {
        apply_block(&mut working, block)?;
    }

    if !change.reverted_blocks.is_empty() {
        info!(
            depth = change.reverted_blocks.len(),
            applied = change.applied_blocks.len(),
            height = working.height(),
            "reorganized ledger"
        );
    }

    let disconnected_transactions = change
        .reverted_blocks
        .iter()
        .flat_map(|block| block.transactions.iter().cloned())
        .collect();

    Ok(ReorganizationResult {
        new_height: working.height(),
        new_ledger: working,
        disconnected_transactions,
        reorganization_depth: change.reverted_blocks.len(),
    })
}

/// Result of applying a consensus change
#[derive(Debug, Clone)]
pub struct ReorganizationResult {
    pub new_ledger: Ledger,
    pub new_height: Height,
    /// Transactions of reverted blocks, candidates to return to the pool
    pub disconnected_transactions: Vec<Transaction>,
    pub reorganization_depth: usize,
}
