//! State transitions: applying and reversing transactions and blocks

use crate::error::{ConsensusError, Result};
use crate::host::{host_from_announcement, parse_host_announcement};
use crate::ledger::Ledger;
use crate::transaction::validate_transaction;
use crate::types::*;
use tracing::{debug, info, warn};

/// ApplyTransaction: Ledger × Tx → Ledger
///
/// For a transaction already validated against `ledger`:
/// 1. Move every spent output from the UTXO set to the spent archive
/// 2. Insert every output under `tx.output_id(i)`
/// 3. Open every new contract with its full fund remaining and its first
///    window satisfied
/// 4. Settle every storage proof: pay `min(funds_remaining, valid_proof_payout)`
///    to the contract's valid proof address under the proof output id for the
///    current height, mark the window satisfied, decrement the funds
/// 5. Append a host record if the arbitrary data carries an acceptable
///    host announcement
///
/// Conflicts must already be excluded by the caller.
pub fn apply_transaction(ledger: &mut Ledger, tx: &Transaction) -> Result<()> {
    let height = ledger.height();

    // 1. Spend inputs
    for input in &tx.inputs {
        let output = ledger.remove_unspent(&input.output_id).ok_or_else(|| {
            ConsensusError::InvariantViolation(format!(
                "applying transaction spends absent output {}",
                input.output_id
            ))
        })?;
        ledger.insert_spent(input.output_id, output);
    }

    // 2. Create outputs
    for (i, output) in tx.outputs.iter().enumerate() {
        ledger.insert_unspent(tx.output_id(i)?, output.clone());
    }

    // 3. Open contracts
    for (i, contract) in tx.file_contracts.iter().enumerate() {
        let contract_id = tx.file_contract_id(i)?;
        ledger.insert_open_contract(OpenContract {
            contract: contract.clone(),
            contract_id,
            funds_remaining: contract.fund,
            failures: 0,
            // The first window is free: contracts must start in the future.
            window_satisfied: true,
        });
    }

    // 4. Settle storage proofs
    for proof in &tx.storage_proofs {
        let open_contract = ledger.open_contract_mut(&proof.contract_id).ok_or_else(|| {
            ConsensusError::InvariantViolation(format!(
                "storage proof for absent contract {}",
                proof.contract_id
            ))
        })?;
        let payout = open_contract
            .funds_remaining
            .min(open_contract.contract.valid_proof_payout);
        open_contract.window_satisfied = true;
        open_contract.funds_remaining = open_contract.funds_remaining.checked_sub(payout)?;

        let output = Output {
            value: payout,
            spend_hash: open_contract.contract.valid_proof_address,
        };
        let output_id = FileContract::storage_proof_output_id(&proof.contract_id, height, true)?;
        ledger.insert_unspent(output_id, output);
        debug!(contract = %proof.contract_id, %payout, height, "settled storage proof");
    }

    // 5. Host announcement
    if let Some(announcement) = parse_host_announcement(&tx.arbitrary_data) {
        if let Some(host) = host_from_announcement(tx, &announcement, height) {
            info!(ip = %host.ip_address, freeze = %host.freeze, "host announced");
            ledger.push_host(host);
        }
    }

    Ok(())
}

/// ReverseTransaction: the inverse of [`apply_transaction`] at the same height.
///
/// Removes proof outputs, created contracts and created outputs, then moves
/// every spent output back into the UTXO set. Storage-proof settlement
/// (`funds_remaining`, `window_satisfied`) and host database appends are not
/// rolled back.
pub fn reverse_transaction(ledger: &mut Ledger, tx: &Transaction) -> Result<()> {
    let height = ledger.height();

    if parse_host_announcement(&tx.arbitrary_data).is_some() {
        warn!(height, "reversing host announcement; host database entry is kept");
    }

    for proof in &tx.storage_proofs {
        warn!(contract = %proof.contract_id, height, "reversing storage proof; contract settlement is kept");
        let output_id = FileContract::storage_proof_output_id(&proof.contract_id, height, true)?;
        ledger.remove_unspent(&output_id);
    }

    for i in 0..tx.file_contracts.len() {
        ledger.remove_open_contract(&tx.file_contract_id(i)?);
    }

    for i in 0..tx.outputs.len() {
        ledger.remove_unspent(&tx.output_id(i)?);
    }

    for input in &tx.inputs {
        let output = ledger.remove_spent(&input.output_id).ok_or_else(|| {
            ConsensusError::InvariantViolation(format!(
                "reversing transaction restores unknown output {}",
                input.output_id
            ))
        })?;
        ledger.insert_unspent(input.output_id, output);
    }

    Ok(())
}

/// Begin a new proof window for an open contract.
///
/// Called by the window scheduler; afterwards exactly one storage proof for
/// the contract is accepted until the window is satisfied again.
pub fn open_proof_window(ledger: &mut Ledger, contract_id: &ContractId) -> Result<()> {
    let open_contract = ledger
        .open_contract_mut(contract_id)
        .ok_or(ConsensusError::UnknownContract)?;
    open_contract.window_satisfied = false;
    Ok(())
}

/// ApplyBlock: raise the height by one, then validate and apply each
/// transaction in order at the new height.
///
/// On error the ledger is left partially updated; callers apply blocks to a
/// working copy (see [`crate::reorganization`]).
pub fn apply_block(ledger: &mut Ledger, block: &Block) -> Result<()> {
    let height = ledger
        .height()
        .checked_add(1)
        .ok_or_else(|| ConsensusError::InvariantViolation("height overflow".to_string()))?;
    ledger.set_height(height);

    for (i, tx) in block.transactions.iter().enumerate() {
        if let Err(err) = validate_transaction(ledger, tx) {
            warn!(height, index = i, error = %err, "block contains invalid transaction");
            return Err(err);
        }
        apply_transaction(ledger, tx)?;
    }

    info!(height, transactions = block.transactions.len(), "applied block");
    Ok(())
}

/// RevertBlock: reverse each transaction in reverse order at the current
/// height, then lower the height by one.
pub fn revert_block(ledger: &mut Ledger, block: &Block) -> Result<()> {
    for tx in block.transactions.iter().rev() {
        reverse_transaction(ledger, tx)?;
    }

    let height = ledger
        .height()
        .checked_sub(1)
        .ok_or(ConsensusError::HeightUnderflow)?;
    ledger.set_height(height);

    info!(height, transactions = block.transactions.len(), "reverted block");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::Currency;
    use crate::host::encode_host_announcement;

    const O1: OutputId = OutputId([1; 32]);

    fn empty_address() -> Address {
        SpendConditions::default().address().unwrap()
    }

    fn genesis(value: u64) -> Ledger {
        Ledger::with_outputs(
            0,
            vec![(O1, Output { value: Currency::from(value), spend_hash: empty_address() })],
        )
    }

    fn spend_o1(value: u64) -> Transaction {
        Transaction {
            inputs: vec![Input { output_id: O1, spend_conditions: SpendConditions::default() }],
            outputs: vec![Output { value: Currency::from(value), spend_hash: empty_address() }],
            ..Default::default()
        }
    }

    fn contract_transaction(fund: u64, payout: u64) -> Transaction {
        Transaction {
            inputs: vec![Input { output_id: O1, spend_conditions: SpendConditions::default() }],
            file_contracts: vec![FileContract {
                fund: Currency::from(fund),
                start: 5,
                end: 20,
                valid_proof_payout: Currency::from(payout),
                valid_proof_address: Address([3; 32]),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn proof_transaction(contract_id: ContractId) -> Transaction {
        Transaction {
            storage_proofs: vec![StorageProof { contract_id, segment: vec![0; 64], hash_set: vec![] }],
            ..Default::default()
        }
    }

    #[test]
    fn test_apply_moves_output() {
        let mut ledger = genesis(10);
        let tx = spend_o1(10);
        validate_transaction(&ledger, &tx).unwrap();
        apply_transaction(&mut ledger, &tx).unwrap();

        assert!(ledger.unspent_output(&O1).is_none());
        assert_eq!(ledger.spent_output(&O1).unwrap().value, Currency::from(10u64));
        let new_output = ledger.unspent_output(&tx.output_id(0).unwrap()).unwrap();
        assert_eq!(new_output.value, Currency::from(10u64));
        assert_eq!(new_output.spend_hash, empty_address());
    }

    #[test]
    fn test_apply_reverse_round_trip() {
        let original = genesis(10);
        let mut ledger = original.clone();
        let mut tx = contract_transaction(6, 2);
        tx.outputs.push(Output { value: Currency::from(4u64), spend_hash: Address([2; 32]) });
        validate_transaction(&ledger, &tx).unwrap();

        apply_transaction(&mut ledger, &tx).unwrap();
        assert_eq!(ledger.open_contracts().len(), 1);
        reverse_transaction(&mut ledger, &tx).unwrap();
        assert_eq!(ledger, original);
    }

    #[test]
    fn test_contract_opens_satisfied() {
        let mut ledger = genesis(10);
        let tx = contract_transaction(10, 4);
        apply_transaction(&mut ledger, &tx).unwrap();
        let open = ledger.open_contract(&tx.file_contract_id(0).unwrap()).unwrap();
        assert!(open.window_satisfied);
        assert_eq!(open.funds_remaining, Currency::from(10u64));
        assert_eq!(open.failures, 0);
    }

    #[test]
    fn test_storage_proof_settlement() {
        let mut ledger = genesis(10);
        let creation = contract_transaction(10, 4);
        apply_transaction(&mut ledger, &creation).unwrap();
        let contract_id = creation.file_contract_id(0).unwrap();

        let proof = proof_transaction(contract_id);
        assert_eq!(validate_transaction(&ledger, &proof), Err(ConsensusError::ProofAlreadySatisfied));

        for expected_payout in [4u64, 4, 2] {
            open_proof_window(&mut ledger, &contract_id).unwrap();
            validate_transaction(&ledger, &proof).unwrap();
            let before = ledger.open_contract(&contract_id).unwrap().funds_remaining;
            apply_transaction(&mut ledger, &proof).unwrap();

            let open = ledger.open_contract(&contract_id).unwrap();
            assert!(open.window_satisfied);
            assert_eq!(open.funds_remaining, before.saturating_sub(Currency::from(expected_payout)));
            let payout_id = FileContract::storage_proof_output_id(&contract_id, ledger.height(), true).unwrap();
            let payout = ledger.unspent_output(&payout_id).unwrap();
            assert_eq!(payout.value, Currency::from(expected_payout));
            assert_eq!(payout.spend_hash, Address([3; 32]));
            // Each settlement at a new height gets a fresh proof output id.
            ledger.set_height(ledger.height() + 1);
        }
        let open = ledger.open_contract(&contract_id).unwrap();
        assert!(open.funds_remaining <= open.contract.fund);
        assert!(open.funds_remaining.is_zero());
    }

    #[test]
    fn test_reverse_storage_proof_removes_payout_only() {
        let mut ledger = genesis(10);
        let creation = contract_transaction(10, 4);
        apply_transaction(&mut ledger, &creation).unwrap();
        let contract_id = creation.file_contract_id(0).unwrap();
        open_proof_window(&mut ledger, &contract_id).unwrap();

        let proof = proof_transaction(contract_id);
        apply_transaction(&mut ledger, &proof).unwrap();
        reverse_transaction(&mut ledger, &proof).unwrap();

        let payout_id = FileContract::storage_proof_output_id(&contract_id, 0, true).unwrap();
        assert!(ledger.unspent_output(&payout_id).is_none());
        let open = ledger.open_contract(&contract_id).unwrap();
        assert_eq!(open.funds_remaining, Currency::from(6u64));
    }

    #[test]
    fn test_open_proof_window_unknown() {
        let mut ledger = Ledger::new();
        assert_eq!(
            open_proof_window(&mut ledger, &ContractId([1; 32])),
            Err(ConsensusError::UnknownContract)
        );
    }

    #[test]
    fn test_host_announcement_applied() {
        let mut ledger = genesis(10);
        let announcement = HostAnnouncement {
            ip_address: b"198.51.100.4:9982".to_vec(),
            price: Currency::new(1),
            burn: Currency::new(1),
            spend_conditions: SpendConditions { time_lock: 10, ..Default::default() },
            freeze_index: 0,
            ..Default::default()
        };
        let tx = Transaction {
            inputs: vec![Input { output_id: O1, spend_conditions: SpendConditions::default() }],
            outputs: vec![Output {
                value: Currency::from(10u64),
                spend_hash: announcement.spend_conditions.address().unwrap(),
            }],
            arbitrary_data: encode_host_announcement(&announcement).unwrap(),
            ..Default::default()
        };
        validate_transaction(&ledger, &tx).unwrap();
        apply_transaction(&mut ledger, &tx).unwrap();

        assert_eq!(ledger.hosts().len(), 1);
        assert_eq!(ledger.hosts()[0].freeze, Currency::new(100));
        assert_eq!(ledger.host_database().total_weight(), Currency::new(100));
    }

    #[test]
    fn test_host_announcement_without_freeze_ignored() {
        let mut ledger = genesis(10);
        let announcement = HostAnnouncement {
            spend_conditions: SpendConditions::default(),
            ..Default::default()
        };
        let mut tx = spend_o1(10);
        tx.arbitrary_data = encode_host_announcement(&announcement).unwrap();
        apply_transaction(&mut ledger, &tx).unwrap();
        assert!(ledger.hosts().is_empty());
        assert!(ledger.unspent_output(&tx.output_id(0).unwrap()).is_some());
    }

    #[test]
    fn test_apply_block_and_revert() {
        let original = genesis(10);
        let mut ledger = original.clone();
        let first = spend_o1(10);
        let second = Transaction {
            inputs: vec![Input {
                output_id: first.output_id(0).unwrap(),
                spend_conditions: SpendConditions::default(),
            }],
            outputs: vec![Output { value: Currency::from(7u64), spend_hash: Address([8; 32]) }],
            miner_fees: vec![Currency::from(3u64)],
            ..Default::default()
        };
        let block = Block { transactions: vec![first, second.clone()], ..Default::default() };

        apply_block(&mut ledger, &block).unwrap();
        assert_eq!(ledger.height(), 1);
        assert!(ledger.unspent_output(&second.output_id(0).unwrap()).is_some());
        assert_eq!(ledger.unspent_outputs().len(), 1);

        revert_block(&mut ledger, &block).unwrap();
        assert_eq!(ledger, original);
    }

    #[test]
    fn test_apply_block_rejects_double_spend() {
        let mut ledger = genesis(10);
        let block = Block { transactions: vec![spend_o1(10), spend_o1(10)], ..Default::default() };
        assert_eq!(apply_block(&mut ledger, &block), Err(ConsensusError::MissingOutput));
    }

    #[test]
    fn test_revert_block_at_genesis_underflows() {
        let mut ledger = Ledger::new();
        assert_eq!(
            revert_block(&mut ledger, &Block::default()),
            Err(ConsensusError::HeightUnderflow)
        );
    }

    #[test]
    fn test_apply_spending_absent_output_is_invariant_violation() {
        let mut ledger = Ledger::new();
        let err = apply_transaction(&mut ledger, &spend_o1(10)).unwrap_err();
        assert!(err.is_fatal());
    }
}
