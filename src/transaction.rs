//! Transaction validation against the ledger

use crate::currency::Currency;
use crate::error::{ConsensusError, Result};
use crate::ledger::Ledger;
use crate::signature::{sig_hash, verify_signature};
use crate::types::*;
use secp256k1::Secp256k1;
use std::collections::{HashMap, HashSet};

/// Which keys of one input have signed and how many more are needed.
struct InputSignatures<'a> {
    remaining_signatures: u64,
    possible_keys: &'a [PublicKeyBytes],
    used_keys: HashSet<u64>,
}

/// ValidTransaction: Ledger × Tx → {valid, reason}
///
/// For transaction tx against ledger state at height h:
/// 1. Every input spends an unspent output whose spend hash is the address of
///    the input's conditions, whose time lock is ≤ h, at most once per tx
/// 2. Let out = Σ miner fees + Σ output values; no created output id may
///    already be unspent or spent
/// 3. Every new contract starts after h, lasts at least one block and has an
///    id not already open; out += Σ contract funds
/// 4. Every storage proof references an open contract with an unproven window
/// 5. Σ input values = out, exactly
/// 6. Every signature signs with a distinct listed key of an input that still
///    needs signatures, after its own time lock, over sig_hash(tx, i)
/// 7. No input is left short of its signature threshold
///
/// Never mutates the ledger.
pub fn validate_transaction(ledger: &Ledger, tx: &Transaction) -> Result<()> {
    validate_transaction_at(ledger, tx, ledger.height())
}

/// [`validate_transaction`] as if the ledger were at `height`.
///
/// The pool validates at the height the next block will be applied at, so
/// that whatever it admits is also valid in that block.
pub fn validate_transaction_at(ledger: &Ledger, tx: &Transaction, height: Height) -> Result<()> {

    // 1. Inputs
    let mut input_sum = Currency::ZERO;
    let mut input_signatures: HashMap<OutputId, InputSignatures> = HashMap::new();
    for input in &tx.inputs {
        let utxo = ledger
            .unspent_output(&input.output_id)
            .ok_or(ConsensusError::MissingOutput)?;

        if input.spend_conditions.address()? != utxo.spend_hash {
            return Err(ConsensusError::ConditionMismatch);
        }

        if input.spend_conditions.time_lock > height {
            return Err(ConsensusError::TimeLockNotExpired);
        }

        if input_signatures.contains_key(&input.output_id) {
            return Err(ConsensusError::DuplicateInput);
        }
        input_signatures.insert(
            input.output_id,
            InputSignatures {
                remaining_signatures: input.spend_conditions.num_signatures,
                possible_keys: &input.spend_conditions.public_keys,
                used_keys: HashSet::new(),
            },
        );

        input_sum = input_sum.checked_add(utxo.value)?;
    }

    // 2. Miner fees and outputs
    let mut output_sum = Currency::checked_sum(tx.miner_fees.iter().copied())?;
    output_sum = output_sum.checked_add(Currency::checked_sum(tx.outputs.iter().map(|o| o.value))?)?;
    for i in 0..tx.outputs.len() {
        let output_id = tx.output_id(i)?;
        if ledger.unspent_output(&output_id).is_some() || ledger.spent_output(&output_id).is_some() {
            return Err(ConsensusError::OutputAlreadyExists);
        }
    }

    // 3. New contracts
    for (i, contract) in tx.file_contracts.iter().enumerate() {
        check_contract_terms(contract, height)?;
        if ledger.open_contract(&tx.file_contract_id(i)?).is_some() {
            return Err(ConsensusError::InvalidContractTerms(
                "contract already exists".to_string(),
            ));
        }
        output_sum = output_sum.checked_add(contract.fund)?;
    }

    // 4. Storage proofs
    let mut proven = HashSet::new();
    for proof in &tx.storage_proofs {
        let open_contract = ledger
            .open_contract(&proof.contract_id)
            .ok_or(ConsensusError::UnknownContract)?;
        if open_contract.window_satisfied || !proven.insert(proof.contract_id) {
            return Err(ConsensusError::ProofAlreadySatisfied);
        }
    }

    // 5. Exact conservation
    if input_sum != output_sum {
        return Err(ConsensusError::ValueMismatch);
    }

    // 6. Signatures
    let secp = Secp256k1::verification_only();
    for (i, sig) in tx.signatures.iter().enumerate() {
        let tracking = input_signatures
            .get_mut(&sig.input_id)
            .ok_or(ConsensusError::SpuriousSignature)?;
        if tracking.remaining_signatures == 0 {
            return Err(ConsensusError::SpuriousSignature);
        }
        if tracking.used_keys.contains(&sig.public_key_index) {
            return Err(ConsensusError::DuplicateKeyUse);
        }
        if sig.time_lock > height {
            return Err(ConsensusError::SignatureTimeLockNotExpired);
        }

        let possible_keys = tracking.possible_keys;
        let public_key = usize::try_from(sig.public_key_index)
            .ok()
            .and_then(|index| possible_keys.get(index))
            .ok_or(ConsensusError::InvalidSignature)?;
        let digest = sig_hash(tx, i)?;
        if !verify_signature(&secp, &digest, public_key, &sig.signature) {
            return Err(ConsensusError::InvalidSignature);
        }

        tracking.remaining_signatures -= 1;
        tracking.used_keys.insert(sig.public_key_index);
    }

    // 7. Thresholds met
    for input in &tx.inputs {
        if let Some(tracking) = input_signatures.get(&input.output_id) {
            if tracking.remaining_signatures > 0 {
                return Err(ConsensusError::MissingSignatures(tracking.remaining_signatures));
            }
        }
    }

    Ok(())
}

/// CheckContractTerms: a contract must start strictly after the current
/// height and end strictly after it starts.
pub fn check_contract_terms(contract: &FileContract, height: Height) -> Result<()> {
    if contract.start <= height {
        return Err(ConsensusError::InvalidContractTerms(
            "contract must start in the future".to_string(),
        ));
    }
    if contract.end <= contract.start {
        return Err(ConsensusError::InvalidContractTerms(
            "contract duration must be at least one block".to_string(),
        ));
    }
    Ok(())
}
