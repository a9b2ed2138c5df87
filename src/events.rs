//! Accepted-signal notifications.
//!
//! Consumers poll a [`Subscription`] instead of listening for on-chain events.
//! Iteration is lazy and ends when it catches up; calling `next()` later picks
//! up anything published since.

use crate::utils::{field_to_hex, FieldElement};
use parking_lot::RwLock;
use serde::{Serialize, Serializer};
use std::sync::Arc;

fn serialize_field<S: Serializer>(field: &FieldElement, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&field_to_hex(*field))
}

/// A signal that passed every verification stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptedSignal {
    pub sequence: u64,
    pub message: String,
    #[serde(serialize_with = "serialize_field")]
    pub nullifier_hash: FieldElement,
    #[serde(serialize_with = "serialize_field")]
    pub external_nullifier: FieldElement,
    #[serde(serialize_with = "serialize_field")]
    pub root: FieldElement,
}

/// Append-only, sequence-numbered log of accepted signals.
#[derive(Debug, Default)]
pub struct EventLog {
    events: RwLock<Vec<AcceptedSignal>>,
}

impl EventLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event, assigning the next sequence number.
    pub fn publish(
        &self,
        message: String,
        nullifier_hash: FieldElement,
        external_nullifier: FieldElement,
        root: FieldElement,
    ) -> AcceptedSignal {
        let mut events = self.events.write();
        let event = AcceptedSignal {
            sequence: events.len() as u64,
            message,
            nullifier_hash,
            external_nullifier,
            root,
        };
        events.push(event.clone());
        event
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Event with the given sequence number, if published.
    #[must_use]
    pub fn get(&self, sequence: u64) -> Option<AcceptedSignal> {
        let index = usize::try_from(sequence).ok()?;
        self.events.read().get(index).cloned()
    }

    /// Subscription starting at `from`. Pass `0` for the full history or a
    /// saved [`Subscription::cursor`] to resume.
    #[must_use]
    pub fn subscribe(self: &Arc<Self>, from: u64) -> Subscription {
        Subscription {
            log: Arc::clone(self),
            cursor: from,
        }
    }
}

/// Cursor over an [`EventLog`].
#[derive(Debug, Clone)]
pub struct Subscription {
    log: Arc<EventLog>,
    cursor: u64,
}

impl Subscription {
    /// Sequence number of the next event this subscription will yield.
    #[must_use]
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}

impl Iterator for Subscription {
    type Item = AcceptedSignal;

    fn next(&mut self) -> Option<Self::Item> {
        let event = self.log.get(self.cursor)?;
        self.cursor += 1;
        Some(event)
    }
}
