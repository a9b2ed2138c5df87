//! Consumed nullifiers, scoped per external nullifier.

use crate::error::Result;
use crate::storage::NullifierLog;
use crate::utils::{field_to_bytes, field_to_hex, FieldElement};
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::Path;

type Key = [u8; 32];

/// Set of `(external_nullifier, nullifier_hash)` pairs that have signaled.
///
/// [`NullifierLedger::try_consume`] is the only mutating operation. It is an
/// atomic check-and-insert, so concurrent submissions of one nullifier have
/// exactly one winner.
#[derive(Debug, Default)]
pub struct NullifierLedger {
    consumed: Mutex<HashMap<Key, HashSet<Key>>>,
    journal: Option<NullifierLog>,
}

impl NullifierLedger {
    /// Empty in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger journaled to `path`, replaying any existing records.
    pub fn open(path: &Path) -> Result<Self> {
        let journal = NullifierLog::open(path)?;
        let mut consumed: HashMap<Key, HashSet<Key>> = HashMap::new();
        let records = journal.load()?;
        for (external_nullifier, nullifier_hash) in &records {
            consumed
                .entry(field_to_bytes(*external_nullifier))
                .or_default()
                .insert(field_to_bytes(*nullifier_hash));
        }
        info!(
            "Loaded {} consumed nullifiers from {}",
            records.len(),
            path.display()
        );
        Ok(Self {
            consumed: Mutex::new(consumed),
            journal: Some(journal),
        })
    }

    /// Marks the pair as consumed. Returns `Ok(false)` without inserting if it
    /// was already present.
    ///
    /// With a journal attached the record is written first, under the same
    /// lock; if the write fails the pair stays unconsumed.
    pub fn try_consume(
        &self,
        external_nullifier: FieldElement,
        nullifier_hash: FieldElement,
    ) -> Result<bool> {
        let scope = field_to_bytes(external_nullifier);
        let key = field_to_bytes(nullifier_hash);

        let mut consumed = self.consumed.lock();
        if consumed.get(&scope).is_some_and(|set| set.contains(&key)) {
            debug!("Nullifier {} already consumed", field_to_hex(nullifier_hash));
            return Ok(false);
        }

        if let Some(journal) = &self.journal {
            journal.append(external_nullifier, nullifier_hash)?;
        }
        consumed.entry(scope).or_default().insert(key);
        Ok(true)
    }

    /// Whether the pair has been consumed.
    #[must_use]
    pub fn contains(&self, external_nullifier: FieldElement, nullifier_hash: FieldElement) -> bool {
        self.consumed
            .lock()
            .get(&field_to_bytes(external_nullifier))
            .is_some_and(|set| set.contains(&field_to_bytes(nullifier_hash)))
    }

    /// Total number of consumed pairs across all external nullifiers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.consumed.lock().values().map(HashSet::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of signals accepted under one external nullifier.
    #[must_use]
    pub fn len_for(&self, external_nullifier: FieldElement) -> usize {
        self.consumed
            .lock()
            .get(&field_to_bytes(external_nullifier))
            .map_or(0, HashSet::len)
    }
}
