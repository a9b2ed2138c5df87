//! Error taxonomy for the signaling protocol.
//!
//! Every variant is recoverable at the request boundary: a failed operation
//! never leaves the group registry or the nullifier ledger half-updated.

use thiserror::Error;

/// Errors returned by identity, registry, witness and verification operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignalError {
    /// The identity seed was empty or could not be decoded.
    #[error("invalid identity seed: {0}")]
    InvalidSeed(String),

    /// The registry already holds `2^depth` commitments.
    #[error("group is full: capacity of {capacity} members reached")]
    CapacityExceeded { capacity: u64 },

    /// A membership proof was requested for an index that has no leaf yet.
    #[error("leaf index {index} out of range for group of size {size}")]
    IndexOutOfRange { index: u32, size: u32 },

    /// The Merkle proof leaf is not the commitment of the signaling identity.
    #[error("merkle proof leaf does not match the identity commitment")]
    IdentityMismatch,

    /// The submitted root is neither the current root nor inside the accepted window.
    #[error("merkle root {0} is stale or unknown; rebuild the proof against a current root")]
    StaleOrUnknownRoot(String),

    /// The nullifier was already consumed for this external nullifier.
    #[error("nullifier {0} has already been used for this external nullifier")]
    DuplicateNullifier(String),

    /// The proof system rejected the proof.
    #[error("zero-knowledge proof rejected")]
    InvalidProof,

    /// Tree depth outside the supported range.
    #[error("unsupported tree depth {0}: expected 1..=32")]
    InvalidTreeDepth(usize),

    /// The identity commitment is not in the group.
    #[error("identity commitment {0} is not a member of the group")]
    MemberNotFound(String),

    /// A public input or request field could not be decoded.
    #[error("malformed input: {0}")]
    MalformedInput(String),

    /// The proving backend failed while generating or checking a proof.
    #[error("proof system failure: {0}")]
    Proving(String),

    /// Reading or writing persisted state failed.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl SignalError {
    /// Whether a caller may succeed by resubmitting with corrected inputs.
    ///
    /// A duplicate nullifier is permanent: the same identity can never signal
    /// again under the same external nullifier.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, SignalError::DuplicateNullifier(_))
    }
}

/// Convenience result alias for protocol operations.
pub type Result<T> = std::result::Result<T, SignalError>;
