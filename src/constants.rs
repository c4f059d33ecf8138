//! Protocol constants

/// Nominal block size limit in bytes
pub const BLOCK_SIZE_LIMIT: usize = 1_000_000;

/// Bytes reserved below the block size limit for the header and miscellany
pub const BLOCK_RESERVED_OVERHEAD: usize = 5_000;

/// Arbitrary-data tag marking a host announcement
pub const HOST_ANNOUNCEMENT_TAG: u64 = 1;

/// Length of the little-endian tag prefix in arbitrary data
pub const ARBITRARY_DATA_TAG_LEN: usize = 8;

/// Length of a compressed secp256k1 public key
pub const PUBLIC_KEY_SIZE: usize = 33;

/// Length of a compact ECDSA signature
pub const SIGNATURE_SIZE: usize = 64;

/// Domain-separation tags for content-derived identifiers
pub const SPECIFIER_OUTPUT: &[u8] = b"output";
pub const SPECIFIER_FILE_CONTRACT: &[u8] = b"file contract";
pub const SPECIFIER_STORAGE_PROOF: &[u8] = b"storage proof";
pub const SPECIFIER_TRANSACTION: &[u8] = b"transaction";
pub const SPECIFIER_SIGNATURE: &[u8] = b"signature";
pub const SPECIFIER_BLOCK: &[u8] = b"block";
pub const SPECIFIER_SPEND_CONDITIONS: &[u8] = b"spend conditions";
