//! Interface to the zero-knowledge proving primitive.

use crate::error::Result;
use crate::witness::{PublicInputs, SignalWitness};
use serde::{Deserialize, Serialize};

/// Opaque proof bytes produced by a [`ProofSystem`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Proof(#[serde(with = "hex")] pub Vec<u8>);

impl Proof {
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A proving system for the signal relation.
///
/// `prove` takes the full witness; `verify` only the public inputs. Neither
/// touches protocol state, and the verifier calls `verify` without holding any
/// lock, so implementations may be slow.
pub trait ProofSystem: Send + Sync {
    /// Produces a proof that the witness satisfies the signal relation.
    fn prove(&self, witness: &SignalWitness) -> Result<Proof>;

    /// Returns `Ok(false)` for a well-formed but invalid proof.
    fn verify(&self, proof: &Proof, public_inputs: &PublicInputs) -> Result<bool>;
}

impl<P: ProofSystem + ?Sized> ProofSystem for std::sync::Arc<P> {
    fn prove(&self, witness: &SignalWitness) -> Result<Proof> {
        (**self).prove(witness)
    }

    fn verify(&self, proof: &Proof, public_inputs: &PublicInputs) -> Result<bool> {
        (**self).verify(proof, public_inputs)
    }
}
