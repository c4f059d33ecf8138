//! Canonical encoding and content-derived hashing
//!
//! The canonical encoding is bincode 1 with its default configuration:
//! little-endian fixed-width integers and u64 length prefixes. Every
//! identifier is `SHA256(specifier || encode(value))`.

use crate::error::Result;
use crate::types::*;
use crate::currency::Currency;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}

pub fn encoded_size<T: Serialize + ?Sized>(value: &T) -> Result<usize> {
    Ok(bincode::serialized_size(value)? as usize)
}

fn finalize(hasher: Sha256) -> Hash {
    let result = hasher.finalize();
    let mut hash = [0u8; 32];
    hash.copy_from_slice(&result);
    hash
}

/// Hash a value under a domain-separation specifier.
pub fn hash_tagged<T: Serialize + ?Sized>(specifier: &[u8], value: &T) -> Result<Hash> {
    let mut hasher = Sha256::new();
    hasher.update(specifier);
    hasher.update(encode(value)?);
    Ok(finalize(hasher))
}

/// Every transaction field except the signatures.
#[derive(Serialize)]
pub(crate) struct TransactionBody<'a> {
    inputs: &'a [Input],
    outputs: &'a [Output],
    file_contracts: &'a [FileContract],
    storage_proofs: &'a [StorageProof],
    miner_fees: &'a [Currency],
    arbitrary_data: &'a [u8],
}

impl<'a> From<&'a Transaction> for TransactionBody<'a> {
    fn from(tx: &'a Transaction) -> Self {
        TransactionBody {
            inputs: &tx.inputs,
            outputs: &tx.outputs,
            file_contracts: &tx.file_contracts,
            storage_proofs: &tx.storage_proofs,
            miner_fees: &tx.miner_fees,
            arbitrary_data: &tx.arbitrary_data,
        }
    }
}
