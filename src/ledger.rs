//! Authoritative ledger state
//!
//! The ledger owns the UTXO set, the archive of spent outputs, the open
//! contract table and the host database. Reads are public; every mutation is
//! `pub(crate)` and reached only through [`crate::transition`].

use crate::currency::Currency;
use crate::types::*;
use std::collections::HashMap;

/// UTXO Set: OutputId → Output
pub type UtxoSet = HashMap<OutputId, Output>;

/// Spent outputs, kept so a reversal can restore them
pub type SpentOutputs = HashMap<OutputId, Output>;

/// Open contracts keyed by contract id
pub type OpenContracts = HashMap<ContractId, OpenContract>;

/// Hosts announced on chain, in announcement order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HostDatabase {
    hosts: Vec<Host>,
    total_weight: Currency,
}

impl HostDatabase {
    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn total_weight(&self) -> Currency {
        self.total_weight
    }

    pub(crate) fn push(&mut self, host: Host) {
        self.total_weight = self.total_weight.saturating_add(host.weight());
        self.hosts.push(host);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    height: Height,
    unspent_outputs: UtxoSet,
    spent_outputs: SpentOutputs,
    open_contracts: OpenContracts,
    host_database: HostDatabase,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger at `height` holding the given outputs, e.g. a genesis
    /// allocation or a snapshot restored by the storage layer.
    pub fn with_outputs<I>(height: Height, outputs: I) -> Self
    where
        I: IntoIterator<Item = (OutputId, Output)>,
    {
        Ledger {
            height,
            unspent_outputs: outputs.into_iter().collect(),
            ..Default::default()
        }
    }

    pub fn height(&self) -> Height {
        self.height
    }

    pub fn unspent_output(&self, id: &OutputId) -> Option<&Output> {
        self.unspent_outputs.get(id)
    }

    pub fn spent_output(&self, id: &OutputId) -> Option<&Output> {
        self.spent_outputs.get(id)
    }

    pub fn open_contract(&self, id: &ContractId) -> Option<&OpenContract> {
        self.open_contracts.get(id)
    }

    pub fn unspent_outputs(&self) -> &UtxoSet {
        &self.unspent_outputs
    }

    pub fn spent_outputs(&self) -> &SpentOutputs {
        &self.spent_outputs
    }

    pub fn open_contracts(&self) -> &OpenContracts {
        &self.open_contracts
    }

    pub fn hosts(&self) -> &[Host] {
        self.host_database.hosts()
    }

    pub fn host_database(&self) -> &HostDatabase {
        &self.host_database
    }

    /// Sum of all unspent output values.
    pub fn unspent_value(&self) -> Currency {
        self.unspent_outputs
            .values()
            .fold(Currency::ZERO, |acc, output| acc.saturating_add(output.value))
    }

    pub(crate) fn set_height(&mut self, height: Height) {
        self.height = height;
    }

    pub(crate) fn insert_unspent(&mut self, id: OutputId, output: Output) {
        self.unspent_outputs.insert(id, output);
    }

    pub(crate) fn remove_unspent(&mut self, id: &OutputId) -> Option<Output> {
        self.unspent_outputs.remove(id)
    }

    pub(crate) fn insert_spent(&mut self, id: OutputId, output: Output) {
        self.spent_outputs.insert(id, output);
    }

    pub(crate) fn remove_spent(&mut self, id: &OutputId) -> Option<Output> {
        self.spent_outputs.remove(id)
    }

    pub(crate) fn insert_open_contract(&mut self, contract: OpenContract) {
        self.open_contracts.insert(contract.contract_id, contract);
    }

    pub(crate) fn open_contract_mut(&mut self, id: &ContractId) -> Option<&mut OpenContract> {
        self.open_contracts.get_mut(id)
    }

    pub(crate) fn remove_open_contract(&mut self, id: &ContractId) -> Option<OpenContract> {
        self.open_contracts.remove(id)
    }

    pub(crate) fn push_host(&mut self, host: Host) {
        self.host_database.push(host);
    }
}
