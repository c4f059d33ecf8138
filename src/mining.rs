//! Block-assembly view of the chain: the consensus-change listener
//!
//! [`BlockAssembler`] follows consensus changes and unconfirmed-set updates
//! and keeps what a miner needs to build the next block: height, parent,
//! target, earliest valid timestamp and a size-bounded transaction list.

use crate::config::CoreConfig;
use crate::error::{ConsensusError, Result};
use crate::types::*;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error};

/// Chain lookups for the block following `parent`.
pub trait ChainQuery: Send + Sync {
    fn child_target(&self, parent: &BlockId) -> Option<Target>;
    fn earliest_child_timestamp(&self, parent: &BlockId) -> Option<Timestamp>;
}

/// Receives every consensus change after the ledger has committed it.
pub trait ConsensusSubscriber: Send + Sync {
    fn receive_consensus_change(&self, change: &ConsensusChange) -> Result<()>;
}

/// Receives the full unconfirmed set after every consensus change.
pub trait TransactionPoolSubscriber: Send + Sync {
    fn receive_updated_unconfirmed_transactions(
        &self,
        transactions: &[Transaction],
        change: &ConsensusChange,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Default)]
struct AssemblerState {
    height: Height,
    parent: BlockId,
    target: Target,
    earliest_timestamp: Timestamp,
    transactions: Vec<Transaction>,
}

pub struct BlockAssembler {
    chain: Arc<dyn ChainQuery>,
    transaction_budget: usize,
    state: Mutex<AssemblerState>,
}

impl BlockAssembler {
    pub fn new(chain: Arc<dyn ChainQuery>, config: &CoreConfig) -> Self {
        BlockAssembler {
            chain,
            transaction_budget: config.transaction_budget(),
            state: Mutex::new(AssemblerState::default()),
        }
    }

    pub fn height(&self) -> Height {
        self.state.lock().height
    }

    pub fn parent(&self) -> BlockId {
        self.state.lock().parent
    }

    pub fn target(&self) -> Target {
        self.state.lock().target
    }

    pub fn earliest_timestamp(&self) -> Timestamp {
        self.state.lock().earliest_timestamp
    }

    /// Candidate transactions for the next block.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.state.lock().transactions.clone()
    }
}

impl ConsensusSubscriber for BlockAssembler {
    /// Move the height by the applied and reverted block counts, then refresh
    /// parent, target and earliest timestamp from the last applied block.
    ///
    /// A missing target or timestamp for a block that was just applied is an
    /// [`ConsensusError::InvariantViolation`].
    fn receive_consensus_change(&self, change: &ConsensusChange) -> Result<()> {
        let mut state = self.state.lock();

        let height = state
            .height
            .checked_sub(change.reverted_blocks.len() as Height)
            .ok_or(ConsensusError::HeightUnderflow)?;
        state.height = height
            .checked_add(change.applied_blocks.len() as Height)
            .ok_or_else(|| ConsensusError::InvariantViolation("height overflow".to_string()))?;

        let last = match change.applied_blocks.last() {
            Some(block) => block,
            None => return Ok(()),
        };

        let parent = last.id()?;
        let target = self.chain.child_target(&parent);
        let timestamp = self.chain.earliest_child_timestamp(&parent);
        let (target, timestamp) = match (target, timestamp) {
            (Some(target), Some(timestamp)) => (target, timestamp),
            (None, _) => {
                error!(%parent, "could not get child target");
                return Err(ConsensusError::InvariantViolation(format!(
                    "could not get child target of {}",
                    parent
                )));
            }
            (_, None) => {
                error!(%parent, "could not get child earliest timestamp");
                return Err(ConsensusError::InvariantViolation(format!(
                    "could not get child earliest timestamp of {}",
                    parent
                )));
            }
        };

        state.parent = parent;
        state.target = target;
        state.earliest_timestamp = timestamp;
        debug!(height = state.height, %parent, "block assembler followed consensus change");
        Ok(())
    }
}

impl TransactionPoolSubscriber for BlockAssembler {
    /// Replace the candidate list with the longest prefix of `transactions`
    /// that fits the block's transaction budget.
    fn receive_updated_unconfirmed_transactions(
        &self,
        transactions: &[Transaction],
        _change: &ConsensusChange,
    ) -> Result<()> {
        let mut selected = Vec::new();
        let mut remaining = self.transaction_budget;
        for tx in transactions {
            let size = tx.encoded_size()?;
            if size > remaining {
                break;
            }
            remaining -= size;
            selected.push(tx.clone());
        }

        let mut state = self.state.lock();
        debug!(
            offered = transactions.len(),
            selected = selected.len(),
            "block assembler refreshed unconfirmed transactions"
        );
        state.transactions = selected;
        Ok(())
    }
}
