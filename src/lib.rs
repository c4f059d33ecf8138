//! # Consensus-Ledger
//!
//! State-transition core of a storage-contract cryptocurrency node.
//!
//! This crate owns the UTXO ledger, validates transactions against it,
//! applies and reverses them as blocks come and go, settles storage proofs,
//! and keeps the pool of unconfirmed transactions that miners draw from.
//!
//! ## Architecture
//!
//! The system follows a layered architecture:
//! - Primitives (`currency`, `types`, `encoding`)
//! - Ledger state (`ledger`)
//! - Validation (`transaction`, `signature`) - pure functions over the ledger
//! - State transitions (`transition`, `host`, `reorganization`)
//! - Transaction pool (`mempool`) and block assembly (`mining`)
//! - [`ConsensusCore`] - one lock over ledger and pool
//!
//! ## Design Principles
//!
//! 1. **Single Writer**: every mutation happens under one exclusive lock
//! 2. **Exact Conservation**: inputs equal outputs, fees and contract funds
//! 3. **All or Nothing**: a consensus change commits fully or not at all
//! 4. **Exact Version Pinning**: consensus-critical dependencies pinned
//!
//! ## Usage
//!
//! ```rust
//! use consensus_ledger::{ConsensusCore, CoreConfig, Currency, Ledger};
//! use consensus_ledger::types::*;
//!
//! let conditions = SpendConditions::default();
//! let address = conditions.address().unwrap();
//! let genesis_output = OutputId([1; 32]);
//! let ledger = Ledger::with_outputs(
//!     0,
//!     vec![(genesis_output, Output { value: Currency::new(10), spend_hash: address })],
//! );
//!
//! let core = ConsensusCore::new(ledger, CoreConfig::default());
//! let tx = Transaction {
//!     inputs: vec![Input { output_id: genesis_output, spend_conditions: conditions }],
//!     outputs: vec![Output { value: Currency::new(10), spend_hash: address }],
//!     ..Default::default()
//! };
//! core.accept_transaction(tx).unwrap();
//! assert_eq!(core.unconfirmed_transactions().len(), 1);
//! ```

pub mod types;
pub mod constants;
pub mod currency;
pub mod encoding;
pub mod config;
pub mod ledger;
pub mod signature;
pub mod transaction;
pub mod transition;
pub mod host;
pub mod mempool;
pub mod mining;
pub mod reorganization;
pub mod relay;
pub mod error;

// Re-export commonly used types
pub use types::*;
pub use constants::*;
pub use config::CoreConfig;
pub use currency::Currency;
pub use error::{ConsensusError, Result};
pub use ledger::Ledger;
pub use mempool::TransactionPool;
pub use mining::{BlockAssembler, ChainQuery, ConsensusSubscriber, TransactionPoolSubscriber};
pub use relay::{ChannelRelay, TransactionRelay};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Ledger and pool, always locked together.
struct CoreState {
    ledger: Ledger,
    pool: TransactionPool,
}

/// The ledger and transaction pool behind one exclusive lock.
///
/// Acceptance, consensus changes and pool refreshes serialize on the lock.
/// The relay hook and subscribers are called after it is released, so they
/// may call back into the core.
pub struct ConsensusCore {
    state: Mutex<CoreState>,
    config: CoreConfig,
    relay: Option<Arc<dyn TransactionRelay>>,
    consensus_subscribers: Mutex<Vec<Arc<dyn ConsensusSubscriber>>>,
    pool_subscribers: Mutex<Vec<Arc<dyn TransactionPoolSubscriber>>>,
}

impl ConsensusCore {
    /// Create a core over an initial ledger with an empty pool
    ///
    /// # Examples
    ///
    /// ```
    /// use consensus_ledger::{ConsensusCore, CoreConfig, Ledger};
    ///
    /// let core = ConsensusCore::new(Ledger::new(), CoreConfig::default());
    /// assert_eq!(core.height(), 0);
    /// ```
    pub fn new(ledger: Ledger, config: CoreConfig) -> Self {
        ConsensusCore {
            state: Mutex::new(CoreState {
                ledger,
                pool: TransactionPool::new(),
            }),
            config,
            relay: None,
            consensus_subscribers: Mutex::new(Vec::new()),
            pool_subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn with_relay(mut self, relay: Arc<dyn TransactionRelay>) -> Self {
        self.relay = Some(relay);
        self
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn subscribe_consensus(&self, subscriber: Arc<dyn ConsensusSubscriber>) {
        self.consensus_subscribers.lock().push(subscriber);
    }

    pub fn subscribe_pool(&self, subscriber: Arc<dyn TransactionPoolSubscriber>) {
        self.pool_subscribers.lock().push(subscriber);
    }

    /// Accept a transaction into the pool
    ///
    /// Rejects transactions without inputs, transactions spending an output
    /// another pooled transaction spends, and transactions the ledger does not
    /// validate. Accepted transactions are handed to the relay.
    pub fn accept_transaction(&self, tx: Transaction) -> Result<TransactionId> {
        let relayed = tx.clone();
        let id = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match state.pool.accept(&state.ledger, tx) {
                Ok(id) => id,
                Err(err) => {
                    debug!(error = %err, "rejected transaction");
                    return Err(err);
                }
            }
        };

        debug!(txid = %id, "accepted transaction");
        if let Some(relay) = &self.relay {
            relay.broadcast(&relayed);
        }
        Ok(id)
    }

    /// Apply a consensus change to the ledger and re-filter the pool
    ///
    /// The change commits fully or not at all. After committing:
    /// 1. Pooled transactions confirmed by, or conflicting with, applied
    ///    blocks are dropped
    /// 2. Transactions of reverted blocks are offered back to the pool
    /// 3. Pooled transactions no longer valid are dropped
    /// 4. Subscribers receive the change, then the new unconfirmed set
    ///
    /// Every subscriber is notified even if an earlier one fails. A failure
    /// there is returned as [`ConsensusError::SubscriberFailed`], and the
    /// change stays committed. Every other error leaves ledger and pool as
    /// they were. An error for which [`ConsensusError::is_fatal`] holds means
    /// the caller must abort the process.
    pub fn process_consensus_change(&self, change: &ConsensusChange) -> Result<()> {
        let unconfirmed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;

            let result = match reorganization::apply_consensus_change(&state.ledger, change) {
                Ok(result) => result,
                Err(err) => {
                    if err.is_fatal() {
                        error!(error = %err, "consensus change violates ledger invariants");
                    } else {
                        warn!(error = %err, "rejected consensus change");
                    }
                    return Err(err);
                }
            };
            state.ledger = result.new_ledger;

            for block in &change.applied_blocks {
                state.pool.remove_confirmed(block)?;
            }
            for tx in result.disconnected_transactions {
                if tx.inputs.is_empty() {
                    continue;
                }
                if let Err(err) = state.pool.accept(&state.ledger, tx) {
                    debug!(error = %err, "reverted transaction not returned to pool");
                }
            }
            state.pool.refilter(&state.ledger);

            state.pool.transactions().cloned().collect::<Vec<_>>()
        };

        let mut first_failure = None;
        let consensus_subscribers = self.consensus_subscribers.lock().clone();
        for subscriber in consensus_subscribers {
            if let Err(err) = subscriber.receive_consensus_change(change) {
                error!(error = %err, "consensus subscriber failed");
                first_failure.get_or_insert(err);
            }
        }
        let pool_subscribers = self.pool_subscribers.lock().clone();
        for subscriber in pool_subscribers {
            if let Err(err) = subscriber.receive_updated_unconfirmed_transactions(&unconfirmed, change) {
                error!(error = %err, "transaction pool subscriber failed");
                first_failure.get_or_insert(err);
            }
        }

        match first_failure {
            Some(err) => Err(ConsensusError::SubscriberFailed(Box::new(err))),
            None => Ok(()),
        }
    }

    /// Begin a new proof window for an open contract
    pub fn open_proof_window(&self, contract_id: &ContractId) -> Result<()> {
        let mut state = self.state.lock();
        transition::open_proof_window(&mut state.ledger, contract_id)
    }

    /// Pooled transactions fitting in `size_limit` encoded bytes, greedily
    pub fn for_block(&self, size_limit: usize) -> Result<Vec<Transaction>> {
        self.state.lock().pool.for_block(size_limit)
    }

    /// Pooled transactions in arrival order
    pub fn unconfirmed_transactions(&self) -> Vec<Transaction> {
        self.state.lock().pool.transactions().cloned().collect()
    }

    /// A consistent copy of the ledger for lock-free inspection
    pub fn ledger_snapshot(&self) -> Ledger {
        self.state.lock().ledger.clone()
    }

    pub fn height(&self) -> Height {
        self.state.lock().ledger.height()
    }

    pub fn pool_len(&self) -> usize {
        self.state.lock().pool.len()
    }
}
