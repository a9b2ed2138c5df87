//! Group registry: the ordered set of identity commitments.
//!
//! [`GroupRegistry`] is the plain data structure. [`GroupStore`] is the shared,
//! lock-protected version the verifier reads from, with the window of recently
//! superseded roots and the optional on-disk commitment log.

use crate::error::{Result, SignalError};
use crate::merkle::{MerkleProof, MerkleTree, MAX_TREE_DEPTH};
use crate::storage::CommitmentLog;
use crate::utils::{field_to_bytes, field_to_hex, FieldElement};
use log::{debug, info};
use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::time::{Duration, Instant};

/// Default depth, enough for about a million members.
pub const DEFAULT_TREE_DEPTH: usize = 20;

/// Default number of superseded roots that remain acceptable.
pub const DEFAULT_ROOT_HISTORY_SIZE: usize = 30;

/// Append-only commitment set backed by a fixed-depth Merkle tree.
#[derive(Debug, Clone)]
pub struct GroupRegistry {
    tree: MerkleTree,
    positions: HashMap<[u8; 32], u32>,
}

impl GroupRegistry {
    /// # Errors
    /// [`SignalError::InvalidTreeDepth`] unless `1 <= depth <= 32`.
    pub fn new(depth: usize) -> Result<Self> {
        if depth == 0 || depth > MAX_TREE_DEPTH {
            return Err(SignalError::InvalidTreeDepth(depth));
        }
        Ok(Self {
            tree: MerkleTree::new(depth),
            positions: HashMap::new(),
        })
    }

    /// Builds a registry holding `commitments` in order.
    pub fn with_commitments(depth: usize, commitments: &[FieldElement]) -> Result<Self> {
        let mut registry = Self::new(depth)?;
        for commitment in commitments {
            registry.append(*commitment)?;
        }
        Ok(registry)
    }

    /// Adds a commitment at the next free index.
    ///
    /// # Errors
    /// [`SignalError::CapacityExceeded`] if the tree already holds `2^depth` leaves.
    pub fn append(&mut self, commitment: FieldElement) -> Result<u32> {
        if self.tree.len() >= self.tree.capacity() {
            return Err(SignalError::CapacityExceeded {
                capacity: self.tree.capacity(),
            });
        }

        let index = self.tree.push(commitment) as u32;
        self.positions
            .entry(field_to_bytes(commitment))
            .or_insert(index);
        Ok(index)
    }

    #[must_use]
    pub fn root(&self) -> FieldElement {
        self.tree.root()
    }

    /// Inclusion proof for the leaf at `index`.
    ///
    /// # Errors
    /// [`SignalError::IndexOutOfRange`] if `index >= len()`.
    pub fn prove_membership(&self, index: u32) -> Result<MerkleProof> {
        self.tree
            .generate_proof(u64::from(index))
            .ok_or(SignalError::IndexOutOfRange {
                index,
                size: self.len(),
            })
    }

    /// First index holding `commitment`, if any.
    #[must_use]
    pub fn index_of(&self, commitment: FieldElement) -> Option<u32> {
        self.positions.get(&field_to_bytes(commitment)).copied()
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.tree.len() as u32
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree.depth()
    }

    #[must_use]
    pub fn capacity(&self) -> u64 {
        self.tree.capacity()
    }

    #[must_use]
    pub fn commitments(&self) -> &[FieldElement] {
        self.tree.leaves()
    }
}

/// Window of superseded roots that verifiers still accept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RootWindow {
    /// How many superseded roots are kept. Zero accepts only the current root.
    pub max_roots: usize,
    /// Superseded roots older than this are rejected even if still kept.
    pub max_age: Option<Duration>,
}

impl Default for RootWindow {
    fn default() -> Self {
        Self {
            max_roots: DEFAULT_ROOT_HISTORY_SIZE,
            max_age: None,
        }
    }
}

/// Recently superseded roots, newest last, with the time each was superseded.
#[derive(Debug, Clone)]
pub struct RootHistory {
    window: RootWindow,
    superseded: VecDeque<(FieldElement, Instant)>,
}

impl RootHistory {
    #[must_use]
    pub fn new(window: RootWindow) -> Self {
        Self {
            window,
            superseded: VecDeque::with_capacity(window.max_roots),
        }
    }

    /// Records that `previous` stopped being the current root.
    pub fn supersede(&mut self, previous: FieldElement) {
        if self.window.max_roots == 0 {
            return;
        }
        if self.superseded.len() == self.window.max_roots {
            self.superseded.pop_front();
        }
        self.superseded.push_back((previous, Instant::now()));
    }

    /// Whether `root` is one of the retained, unexpired superseded roots.
    #[must_use]
    pub fn contains(&self, root: FieldElement) -> bool {
        self.superseded.iter().any(|(candidate, at)| {
            *candidate == root
                && self
                    .window
                    .max_age
                    .map_or(true, |max_age| at.elapsed() < max_age)
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.superseded.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.superseded.is_empty()
    }
}

#[derive(Debug)]
struct StoreState {
    registry: GroupRegistry,
    history: RootHistory,
}

/// Shared registry for the verifying side.
///
/// All mutation happens under one write lock: the new tree state is fully
/// computed before the lock is released, so readers see either the state
/// before an append or after it.
#[derive(Debug)]
pub struct GroupStore {
    state: RwLock<StoreState>,
    log: Option<CommitmentLog>,
}

impl GroupStore {
    /// In-memory store with an empty group.
    pub fn new(depth: usize, window: RootWindow) -> Result<Self> {
        Ok(Self {
            state: RwLock::new(StoreState {
                registry: GroupRegistry::new(depth)?,
                history: RootHistory::new(window),
            }),
            log: None,
        })
    }

    /// Store backed by an append-only commitment log.
    ///
    /// Existing entries are replayed in order. The log carries no timestamps,
    /// so the window of recent roots is rebuilt only when it is count-bounded;
    /// with a `max_age` only the current root is accepted after a reopen.
    pub fn open(depth: usize, window: RootWindow, path: &Path) -> Result<Self> {
        let log = CommitmentLog::open(path)?;
        let mut store = Self::new(depth, window)?;
        let replay_history = window.max_age.is_none();
        {
            let state = store.state.get_mut();
            for commitment in log.load()? {
                let previous = state.registry.root();
                state.registry.append(commitment)?;
                if replay_history {
                    state.history.supersede(previous);
                }
            }
            info!(
                "Loaded {} commitments from {}",
                state.registry.len(),
                path.display()
            );
        }
        store.log = Some(log);
        Ok(store)
    }

    /// Appends a commitment and publishes the new root atomically.
    ///
    /// With a log attached, the entry is persisted before the in-memory tree
    /// changes; a write failure leaves the group untouched.
    pub fn append(&self, commitment: FieldElement) -> Result<u32> {
        let mut state = self.state.write();
        if u64::from(state.registry.len()) >= state.registry.capacity() {
            return Err(SignalError::CapacityExceeded {
                capacity: state.registry.capacity(),
            });
        }
        if let Some(log) = &self.log {
            log.append(commitment)?;
        }

        let previous = state.registry.root();
        let index = state.registry.append(commitment)?;
        state.history.supersede(previous);
        debug!(
            "Appended commitment {} at index {index}, root {}",
            field_to_hex(commitment),
            field_to_hex(state.registry.root())
        );
        Ok(index)
    }

    /// Current root.
    #[must_use]
    pub fn root(&self) -> FieldElement {
        self.state.read().registry.root()
    }

    /// Current root and group size, read under one lock.
    #[must_use]
    pub fn snapshot(&self) -> (FieldElement, u32) {
        let state = self.state.read();
        (state.registry.root(), state.registry.len())
    }

    /// Whether a proof built against `root` may still be accepted.
    #[must_use]
    pub fn is_accepted_root(&self, root: FieldElement) -> bool {
        let state = self.state.read();
        state.registry.root() == root || state.history.contains(root)
    }

    pub fn prove_membership(&self, index: u32) -> Result<MerkleProof> {
        self.state.read().registry.prove_membership(index)
    }

    /// Inclusion proof for the first leaf holding `commitment`.
    pub fn proof_for(&self, commitment: FieldElement) -> Result<MerkleProof> {
        let state = self.state.read();
        let index = state
            .registry
            .index_of(commitment)
            .ok_or_else(|| SignalError::MemberNotFound(field_to_hex(commitment)))?;
        state.registry.prove_membership(index)
    }

    #[must_use]
    pub fn len(&self) -> u32 {
        self.state.read().registry.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().registry.is_empty()
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.state.read().registry.depth()
    }

    /// Copy of the registry as of now.
    #[must_use]
    pub fn registry_snapshot(&self) -> GroupRegistry {
        self.state.read().registry.clone()
    }
}
