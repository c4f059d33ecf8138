//! Core ledger types

use crate::constants::*;
use crate::currency::Currency;
use crate::encoding::{hash_tagged, TransactionBody};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hash type: 256-bit digest
pub type Hash = [u8; 32];

/// Block height
pub type Height = u64;

/// Block timestamp, seconds since the epoch
pub type Timestamp = u64;

/// Mining target for the next block
pub type Target = Hash;

/// Compressed secp256k1 public key bytes
pub type PublicKeyBytes = Vec<u8>;

macro_rules! hash_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Hash);

        impl $name {
            pub fn as_bytes(&self) -> &Hash {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0[..8] {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }
    };
}

hash_identifier!(
    /// Identifier of an output, derived from its creating transaction
    OutputId
);
hash_identifier!(
    /// Identifier of a file contract, derived from its creating transaction
    ContractId
);
hash_identifier!(
    /// Identifier of a transaction: hash of its full canonical encoding
    TransactionId
);
hash_identifier!(BlockId);
hash_identifier!(
    /// Spend address: hash of a set of spend conditions
    Address
);

/// An unspent coin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub value: Currency,
    pub spend_hash: Address,
}

/// Predicate an input must satisfy to spend an output.
///
/// Satisfied when at least `num_signatures` distinct listed keys sign and
/// `time_lock <= height`. The empty conditions are trivially spendable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendConditions {
    pub time_lock: Height,
    pub public_keys: Vec<PublicKeyBytes>,
    pub num_signatures: u64,
}

impl SpendConditions {
    /// The address outputs locked by these conditions carry as `spend_hash`.
    pub fn address(&self) -> Result<Address> {
        hash_tagged(SPECIFIER_SPEND_CONDITIONS, self).map(Address)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Input {
    pub output_id: OutputId,
    pub spend_conditions: SpendConditions,
}

/// A storage contract between a renter and a host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContract {
    pub fund: Currency,
    pub file_merkle_root: Hash,
    pub file_size: u64,
    pub start: Height,
    pub end: Height,
    pub challenge_frequency: Height,
    pub tolerance: u64,
    pub valid_proof_payout: Currency,
    pub valid_proof_address: Address,
    pub missed_proof_payout: Currency,
    pub missed_proof_address: Address,
}

/// Evidence settling one proof window of an open contract.
///
/// The segment and hash set are carried for relay; this core does not verify
/// them against `file_merkle_root`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageProof {
    pub contract_id: ContractId,
    pub segment: Vec<u8>,
    pub hash_set: Vec<Hash>,
}

/// A signature over [`crate::signature::sig_hash`] by one key of one input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionSignature {
    pub input_id: OutputId,
    pub public_key_index: u64,
    pub time_lock: Height,
    pub signature: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub inputs: Vec<Input>,
    pub outputs: Vec<Output>,
    pub file_contracts: Vec<FileContract>,
    pub storage_proofs: Vec<StorageProof>,
    pub miner_fees: Vec<Currency>,
    pub arbitrary_data: Vec<u8>,
    pub signatures: Vec<TransactionSignature>,
}

impl Transaction {
    /// Content-derived id over the full encoding, signatures included.
    pub fn id(&self) -> Result<TransactionId> {
        hash_tagged(SPECIFIER_TRANSACTION, self).map(TransactionId)
    }

    /// Id of the output at `index`. Signatures are excluded so that the
    /// ids a transaction creates are fixed before it is signed.
    pub fn output_id(&self, index: usize) -> Result<OutputId> {
        let body = TransactionBody::from(self);
        hash_tagged(SPECIFIER_OUTPUT, &(body, index as u64)).map(OutputId)
    }

    pub fn file_contract_id(&self, index: usize) -> Result<ContractId> {
        let body = TransactionBody::from(self);
        hash_tagged(SPECIFIER_FILE_CONTRACT, &(body, index as u64)).map(ContractId)
    }

    /// Serialized size used for block and pool byte budgets.
    pub fn encoded_size(&self) -> Result<usize> {
        crate::encoding::encoded_size(self)
    }
}

/// A file contract that has been created and not yet removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenContract {
    pub contract: FileContract,
    pub contract_id: ContractId,
    pub funds_remaining: Currency,
    pub failures: u64,
    /// True when no unproven window is pending.
    pub window_satisfied: bool,
}

impl FileContract {
    /// Id of the output a storage proof for this contract creates at `height`.
    pub fn storage_proof_output_id(
        contract_id: &ContractId,
        height: Height,
        proof_valid: bool,
    ) -> Result<OutputId> {
        hash_tagged(SPECIFIER_STORAGE_PROOF, &(contract_id, height, proof_valid)).map(OutputId)
    }
}

/// An accepted block reduced to what the ledger needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub parent_id: BlockId,
    pub timestamp: Timestamp,
    pub nonce: u64,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn id(&self) -> Result<BlockId> {
        let transaction_ids = self
            .transactions
            .iter()
            .map(Transaction::id)
            .collect::<Result<Vec<_>>>()?;
        hash_tagged(
            SPECIFIER_BLOCK,
            &(self.parent_id, self.timestamp, self.nonce, transaction_ids),
        )
        .map(BlockId)
    }
}

/// Blocks removed from and added to the authoritative chain.
///
/// `reverted_blocks` is ordered from the old tip backwards; `applied_blocks`
/// from the fork point forwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsensusChange {
    pub reverted_blocks: Vec<Block>,
    pub applied_blocks: Vec<Block>,
}

/// Payload of a host announcement carried in arbitrary data.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostAnnouncement {
    pub ip_address: Vec<u8>,
    pub min_filesize: u64,
    pub max_filesize: u64,
    pub max_duration: Height,
    pub max_challenge_frequency: Height,
    pub min_tolerance: u64,
    pub price: Currency,
    pub burn: Currency,
    pub coin_address: Address,
    pub spend_conditions: SpendConditions,
    pub freeze_index: u64,
}

/// A host database entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Host {
    pub ip_address: String,
    pub min_size: u64,
    pub max_size: u64,
    pub duration: Height,
    pub frequency: Height,
    pub tolerance: u64,
    pub price: Currency,
    pub burn: Currency,
    pub freeze: Currency,
    pub coin_address: Address,
}

impl Host {
    /// Selection weight: frozen value scaled by burn over price.
    ///
    /// A zero price or burn is treated as one unit. This weighting is a local
    /// choice with no reference formula behind it; it is expected to change
    /// once host selection is designed.
    pub fn weight(&self) -> Currency {
        let price = self.price.units().max(1);
        let scaled = self.freeze.saturating_mul(self.burn.units().max(1));
        Currency::new(scaled.units() / price)
    }
}
