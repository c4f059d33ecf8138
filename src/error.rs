//! Error types for ledger validation, state transitions and the pool

use thiserror::Error;

/// Every way a transaction, block or consensus change can be rejected.
///
/// All variants except [`ConsensusError::InvariantViolation`] and
/// [`ConsensusError::SubscriberFailed`] are ordinary, recoverable rejections
/// that leave the ledger and pool untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("transaction spends a nonexisting output")]
    MissingOutput,

    #[error("spend conditions do not match hash")]
    ConditionMismatch,

    #[error("output spent before timelock expiry")]
    TimeLockNotExpired,

    #[error("output spent twice in same transaction")]
    DuplicateInput,

    #[error("invalid file contract terms: {0}")]
    InvalidContractTerms(String),

    #[error("storage proof references an unknown contract")]
    UnknownContract,

    #[error("storage proof has already been completed for this contract")]
    ProofAlreadySatisfied,

    #[error("transaction creates an output that already exists")]
    OutputAlreadyExists,

    #[error("inputs do not equal outputs for transaction")]
    ValueMismatch,

    #[error("currency arithmetic overflowed")]
    ValueOverflow,

    #[error("frivolous signature detected")]
    SpuriousSignature,

    #[error("public key used twice while signing")]
    DuplicateKeyUse,

    #[error("signature timelock has not expired")]
    SignatureTimeLockNotExpired,

    #[error("invalid signature in transaction")]
    InvalidSignature,

    #[error("input is missing {0} required signature(s)")]
    MissingSignatures(u64),

    #[error("conflicting transaction exists in transaction pool")]
    ConflictingTransaction,

    #[error("transaction has no inputs")]
    NoInputs,

    #[error("height underflow while reverting blocks")]
    HeightUnderflow,

    #[error("encoding error: {0}")]
    Encoding(String),

    #[error("internal invariant violated: {0}")]
    InvariantViolation(String),

    /// A subscriber failed after the change was committed to the ledger and
    /// pool. Every subscriber is still notified; this carries the first
    /// failure.
    #[error("subscriber failed after consensus change was committed: {0}")]
    SubscriberFailed(Box<ConsensusError>),
}

impl ConsensusError {
    /// Whether this error means the ledger diverged from the block-acceptance
    /// collaborator and the process must abort.
    pub fn is_fatal(&self) -> bool {
        match self {
            ConsensusError::InvariantViolation(_) => true,
            ConsensusError::SubscriberFailed(inner) => inner.is_fatal(),
            _ => false,
        }
    }
}

impl From<bincode::Error> for ConsensusError {
    fn from(err: bincode::Error) -> Self {
        ConsensusError::Encoding(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ConsensusError>;
