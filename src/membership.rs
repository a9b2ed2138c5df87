//! Membership witnesses for a signaler.
//!
//! Pure functions over a registry snapshot; nothing here mutates state.

use crate::error::{Result, SignalError};
use crate::identity::Identity;
use crate::merkle::MerkleProof;
use crate::registry::GroupRegistry;
use crate::utils::{field_to_hex, FieldElement};

/// Inclusion proof for the member at `index`.
///
/// # Errors
/// [`SignalError::IndexOutOfRange`] if the group has no leaf at `index`.
pub fn prove_membership(registry: &GroupRegistry, index: u32) -> Result<MerkleProof> {
    registry.prove_membership(index)
}

/// Inclusion proof for `identity`, located by its commitment.
///
/// # Errors
/// [`SignalError::MemberNotFound`] if the commitment was never appended.
pub fn prove_identity(registry: &GroupRegistry, identity: &Identity) -> Result<MerkleProof> {
    let commitment = identity.commitment();
    let index = registry
        .index_of(commitment)
        .ok_or_else(|| SignalError::MemberNotFound(field_to_hex(commitment)))?;
    registry.prove_membership(index)
}

/// Root of a published commitment list.
pub fn commitments_root(depth: usize, commitments: &[FieldElement]) -> Result<FieldElement> {
    let registry = GroupRegistry::with_commitments(depth, commitments)?;
    Ok(registry.root())
}

/// Checks a proof against an explicit root rather than the one it carries.
#[must_use]
pub fn verify_against(proof: &MerkleProof, root: FieldElement) -> bool {
    proof.root == root && proof.verify()
}

/// Builds the inclusion proof for `commitment` in a published list.
pub fn prove_in_list(
    depth: usize,
    commitments: &[FieldElement],
    commitment: FieldElement,
) -> Result<MerkleProof> {
    let index = commitments
        .iter()
        .position(|c| *c == commitment)
        .ok_or_else(|| SignalError::MemberNotFound(field_to_hex(commitment)))?;
    let registry = GroupRegistry::with_commitments(depth, commitments)?;
    registry.prove_membership(index as u32)
}
