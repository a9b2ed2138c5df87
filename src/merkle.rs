//! Fixed-depth incremental Merkle tree over Poseidon.
//!
//! Leaves that were never appended hold the zero field element. Every level
//! of the populated part of the tree is stored, so both insertion and proof
//! generation touch exactly `depth` nodes.

use crate::utils::{field_to_hex, poseidon_hash, FieldElement};
use pasta_curves::pallas;
use std::fmt;

/// Largest supported depth; leaf indices are `u32`.
pub const MAX_TREE_DEPTH: usize = 32;

/// A Merkle proof for leaf inclusion.
///
/// `path_indices[i]` is `false` when the running node is the left input at
/// level `i`, `true` when it is the right input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleProof {
    pub leaf: FieldElement,
    pub root: FieldElement,
    pub path_elements: Vec<FieldElement>,
    pub path_indices: Vec<bool>,
}

impl MerkleProof {
    /// Re-hashes the leaf up the path.
    ///
    /// # Panics
    /// If `path_elements` and `path_indices` differ in length. Proofs are only
    /// built by [`MerkleTree::generate_proof`], so a mismatch is a bug.
    #[must_use]
    pub fn compute_root(&self) -> FieldElement {
        assert_eq!(
            self.path_elements.len(),
            self.path_indices.len(),
            "merkle path elements and indices must have equal length"
        );

        self.path_elements
            .iter()
            .zip(&self.path_indices)
            .fold(self.leaf, |node, (sibling, &is_right)| {
                if is_right {
                    poseidon_hash(*sibling, node)
                } else {
                    poseidon_hash(node, *sibling)
                }
            })
    }

    /// True if the path reproduces the claimed root.
    #[must_use]
    pub fn verify(&self) -> bool {
        self.compute_root() == self.root
    }

    /// Leaf position encoded by the path bits.
    #[must_use]
    pub fn leaf_index(&self) -> u64 {
        self.path_indices
            .iter()
            .enumerate()
            .fold(0u64, |acc, (level, &is_right)| {
                if is_right {
                    acc | (1u64 << level)
                } else {
                    acc
                }
            })
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }
}

/// Roots of all-zero subtrees: `zeros[0]` is the empty leaf, `zeros[depth]`
/// the root of an empty tree.
#[must_use]
pub fn zero_hashes(depth: usize) -> Vec<FieldElement> {
    let mut zeros = Vec::with_capacity(depth + 1);
    zeros.push(pallas::Base::zero());
    for level in 0..depth {
        let below = zeros[level];
        zeros.push(poseidon_hash(below, below));
    }
    zeros
}

/// An append-only binary Merkle tree of fixed depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MerkleTree {
    depth: usize,
    zeros: Vec<FieldElement>,
    /// `levels[0]` are the leaves, `levels[depth]` holds at most the root.
    levels: Vec<Vec<FieldElement>>,
}

impl MerkleTree {
    /// Creates an empty tree.
    ///
    /// # Panics
    /// If `depth` is zero or above [`MAX_TREE_DEPTH`]; callers validate it.
    #[must_use]
    pub fn new(depth: usize) -> Self {
        assert!(
            (1..=MAX_TREE_DEPTH).contains(&depth),
            "tree depth {depth} outside 1..={MAX_TREE_DEPTH}"
        );
        MerkleTree {
            depth,
            zeros: zero_hashes(depth),
            levels: vec![Vec::new(); depth + 1],
        }
    }

    /// Builds a tree from a list of leaves.
    #[must_use]
    pub fn from_leaves(depth: usize, leaves: &[FieldElement]) -> Self {
        let mut tree = Self::new(depth);
        for leaf in leaves {
            tree.push(*leaf);
        }
        tree
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        1u64 << self.depth
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.levels[0].len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels[0].is_empty()
    }

    #[must_use]
    pub fn leaves(&self) -> &[FieldElement] {
        &self.levels[0]
    }

    #[must_use]
    pub fn root(&self) -> FieldElement {
        self.levels[self.depth]
            .first()
            .copied()
            .unwrap_or(self.zeros[self.depth])
    }

    fn node(&self, level: usize, index: usize) -> FieldElement {
        self.levels[level]
            .get(index)
            .copied()
            .unwrap_or(self.zeros[level])
    }

    /// Appends a leaf and rehashes the path above it. Returns the leaf index.
    ///
    /// # Panics
    /// If the tree is full; capacity is checked by the registry first.
    pub fn push(&mut self, leaf: FieldElement) -> u64 {
        assert!(self.len() < self.capacity(), "merkle tree is full");

        let leaf_index = self.levels[0].len();
        self.levels[0].push(leaf);

        let mut index = leaf_index;
        for level in 0..self.depth {
            let left = self.node(level, index & !1);
            let right = self.node(level, index | 1);
            let parent = poseidon_hash(left, right);

            index >>= 1;
            let above = &mut self.levels[level + 1];
            if index < above.len() {
                above[index] = parent;
            } else {
                above.push(parent);
            }
        }

        leaf_index as u64
    }

    /// Generate a Merkle proof for a leaf at the given index.
    ///
    /// Returns `None` if no leaf has been appended at `leaf_index`.
    #[must_use]
    pub fn generate_proof(&self, leaf_index: u64) -> Option<MerkleProof> {
        if leaf_index >= self.len() {
            return None;
        }

        let mut index = leaf_index as usize;
        let mut path_elements = Vec::with_capacity(self.depth);
        let mut path_indices = Vec::with_capacity(self.depth);

        for level in 0..self.depth {
            path_elements.push(self.node(level, index ^ 1));
            path_indices.push(index & 1 == 1);
            index >>= 1;
        }

        Some(MerkleProof {
            leaf: self.levels[0][leaf_index as usize],
            root: self.root(),
            path_elements,
            path_indices,
        })
    }

    /// Verify a Merkle proof against this tree's current root.
    #[must_use]
    pub fn verify_proof(&self, proof: &MerkleProof) -> bool {
        proof.root == self.root() && proof.depth() == self.depth && proof.verify()
    }
}

impl fmt::Display for MerkleProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "MerkleProof:\n  Leaf: {}\n  Root: {}\n  Index: {}\n  Depth: {}",
            field_to_hex(self.leaf),
            field_to_hex(self.root),
            self.leaf_index(),
            self.depth()
        )
    }
}
