//! Signaler identities.
//!
//! An identity is a pair of secrets derived deterministically from a seed.
//! Only its commitment `H(trapdoor, nullifier_secret)` is ever published.

use crate::error::{Result, SignalError};
use crate::utils::{decode_hex, hash_to_field, poseidon_hash, FieldElement};
use sha3::{Digest, Sha3_256};
use std::fmt;

const TRAPDOOR_DOMAIN: &[u8] = b"identity_trapdoor";
const NULLIFIER_DOMAIN: &[u8] = b"identity_nullifier";

/// Secret identity material held by a signaler.
#[derive(Clone, PartialEq, Eq)]
pub struct Identity {
    trapdoor: FieldElement,
    nullifier_secret: FieldElement,
}

impl Identity {
    /// Derives an identity from raw seed bytes.
    ///
    /// The same seed always yields the same identity, so a user can regenerate
    /// it without storing anything. Anyone holding the seed holds the identity.
    ///
    /// # Errors
    /// [`SignalError::InvalidSeed`] if the seed is empty.
    pub fn new(seed: &[u8]) -> Result<Self> {
        if seed.is_empty() {
            return Err(SignalError::InvalidSeed("seed cannot be empty".to_string()));
        }

        let seed_digest: [u8; 32] = Sha3_256::digest(seed).into();
        Ok(Self {
            trapdoor: hash_to_field(&[TRAPDOOR_DOMAIN, &seed_digest]),
            nullifier_secret: hash_to_field(&[NULLIFIER_DOMAIN, &seed_digest]),
        })
    }

    /// Derives an identity from a hex-encoded wallet signature.
    ///
    /// # Errors
    /// [`SignalError::InvalidSeed`] if the signature is empty or not hex.
    pub fn from_signature(signature: &str) -> Result<Self> {
        let bytes = decode_hex(signature)
            .map_err(|e| SignalError::InvalidSeed(format!("signature is not valid hex: {e}")))?;
        Self::new(&bytes)
    }

    /// Public commitment stored in the group registry.
    #[must_use]
    pub fn commitment(&self) -> FieldElement {
        poseidon_hash(self.trapdoor, self.nullifier_secret)
    }

    /// Nullifier this identity reveals when signaling under `external_nullifier`.
    #[must_use]
    pub fn nullifier_hash(&self, external_nullifier: FieldElement) -> FieldElement {
        poseidon_hash(external_nullifier, self.nullifier_secret)
    }

    #[must_use]
    pub fn trapdoor(&self) -> FieldElement {
        self.trapdoor
    }

    #[must_use]
    pub fn nullifier_secret(&self) -> FieldElement {
        self.nullifier_secret
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("trapdoor", &"<redacted>")
            .field("nullifier_secret", &"<redacted>")
            .finish()
    }
}
