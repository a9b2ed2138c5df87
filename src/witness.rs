//! Signal witness construction.
//!
//! Building the witness is kept apart from proving so the proving backend can
//! be swapped or run elsewhere without touching protocol logic.

use crate::error::{Result, SignalError};
use crate::identity::Identity;
use crate::merkle::MerkleProof;
use crate::utils::{field_to_hex, hash_message, FieldElement};
use std::fmt;

/// Values a verifier sees. The proof attests to them without revealing the
/// private half of the witness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublicInputs {
    pub root: FieldElement,
    pub nullifier_hash: FieldElement,
    pub signal_hash: FieldElement,
    pub external_nullifier: FieldElement,
}

impl PublicInputs {
    /// Instance column order: root, nullifier hash, signal hash, external nullifier.
    #[must_use]
    pub fn to_instance(&self) -> Vec<FieldElement> {
        vec![
            self.root,
            self.nullifier_hash,
            self.signal_hash,
            self.external_nullifier,
        ]
    }
}

impl fmt::Display for PublicInputs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "root={} nullifier_hash={} signal_hash={} external_nullifier={}",
            field_to_hex(self.root),
            field_to_hex(self.nullifier_hash),
            field_to_hex(self.signal_hash),
            field_to_hex(self.external_nullifier)
        )
    }
}

/// Full witness for one signal: identity secrets, Merkle path and public inputs.
#[derive(Clone, PartialEq, Eq)]
pub struct SignalWitness {
    pub trapdoor: FieldElement,
    pub nullifier_secret: FieldElement,
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<bool>,
    pub public: PublicInputs,
}

impl SignalWitness {
    /// Combines an identity, its inclusion proof and the message.
    ///
    /// # Errors
    /// [`SignalError::IdentityMismatch`] if the proof is for another leaf.
    pub fn build(
        identity: &Identity,
        merkle_proof: &MerkleProof,
        external_nullifier: FieldElement,
        message: &str,
    ) -> Result<Self> {
        if merkle_proof.leaf != identity.commitment() {
            return Err(SignalError::IdentityMismatch);
        }

        Ok(Self {
            trapdoor: identity.trapdoor(),
            nullifier_secret: identity.nullifier_secret(),
            path_elements: merkle_proof.path_elements.clone(),
            path_indices: merkle_proof.path_indices.clone(),
            public: PublicInputs {
                root: merkle_proof.root,
                nullifier_hash: identity.nullifier_hash(external_nullifier),
                signal_hash: hash_message(message),
                external_nullifier,
            },
        })
    }

    #[must_use]
    pub fn public_inputs(&self) -> PublicInputs {
        self.public
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }
}

impl fmt::Debug for SignalWitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalWitness")
            .field("depth", &self.depth())
            .field("public", &self.public)
            .finish_non_exhaustive()
    }
}
