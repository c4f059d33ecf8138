//! Relay hook for newly accepted transactions

use crate::types::Transaction;
use parking_lot::Mutex;
use std::sync::mpsc;
use tracing::debug;

/// Fire-and-forget broadcast of an accepted transaction to peers.
///
/// Called after the core's lock has been released. Implementations must not
/// block on the network.
pub trait TransactionRelay: Send + Sync {
    fn broadcast(&self, tx: &Transaction);
}

/// Relay that forwards accepted transactions into a channel drained by the
/// networking layer.
pub struct ChannelRelay {
    sender: Mutex<mpsc::Sender<Transaction>>,
}

impl ChannelRelay {
    pub fn new() -> (Self, mpsc::Receiver<Transaction>) {
        let (sender, receiver) = mpsc::channel();
        (ChannelRelay { sender: Mutex::new(sender) }, receiver)
    }
}

impl TransactionRelay for ChannelRelay {
    fn broadcast(&self, tx: &Transaction) {
        if self.sender.lock().send(tx.clone()).is_err() {
            debug!("relay receiver dropped; transaction not broadcast");
        }
    }
}
