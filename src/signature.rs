//! Transaction signature digests and ECDSA verification

use crate::constants::*;
use crate::encoding::{hash_tagged, TransactionBody};
use crate::error::{ConsensusError, Result};
use crate::types::*;
use secp256k1::{ecdsa::Signature, Context, Message, PublicKey, Secp256k1, SecretKey, Signing, Verification};

/// SigHash: the digest signature `index` of `tx` signs.
///
/// Covers every field except the signature list, plus the input id, key
/// index and time lock of the signature itself.
pub fn sig_hash(tx: &Transaction, index: usize) -> Result<Hash> {
    let sig = tx.signatures.get(index).ok_or(ConsensusError::InvalidSignature)?;
    let body = TransactionBody::from(tx);
    hash_tagged(
        SPECIFIER_SIGNATURE,
        &(body, sig.input_id, sig.public_key_index, sig.time_lock),
    )
}

/// Verify a compact ECDSA signature over `digest` against a compressed key.
pub fn verify_signature<C: Context + Verification>(
    secp: &Secp256k1<C>,
    digest: &Hash,
    pubkey_bytes: &[u8],
    signature_bytes: &[u8],
) -> bool {
    if pubkey_bytes.len() != PUBLIC_KEY_SIZE || signature_bytes.len() != SIGNATURE_SIZE {
        return false;
    }

    let pubkey = match PublicKey::from_slice(pubkey_bytes) {
        Ok(pk) => pk,
        Err(_) => return false,
    };

    let signature = match Signature::from_compact(signature_bytes) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    let message = match Message::from_digest_slice(digest) {
        Ok(msg) => msg,
        Err(_) => return false,
    };

    secp.verify_ecdsa(&message, &signature, &pubkey).is_ok()
}

/// Fill in signature `index` of `tx` using `secret_key`.
///
/// The signature's input id, key index and time lock must already be set.
pub fn sign_transaction<C: Context + Signing>(
    secp: &Secp256k1<C>,
    tx: &mut Transaction,
    index: usize,
    secret_key: &SecretKey,
) -> Result<()> {
    let digest = sig_hash(tx, index)?;
    let message = Message::from_digest_slice(&digest).map_err(|_| ConsensusError::InvalidSignature)?;
    let signature = secp.sign_ecdsa(&message, secret_key);
    if let Some(sig) = tx.signatures.get_mut(index) {
        sig.signature = signature.serialize_compact().to_vec();
    }
    Ok(())
}
