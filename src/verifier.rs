//! Signal verification.
//!
//! A submission moves through [`VerificationStage`]s in order and stops at the
//! first failure. Only the last stage mutates state: the nullifier is consumed
//! and an event is published. The proof check runs with no lock held.

use crate::error::{Result, SignalError};
use crate::events::{AcceptedSignal, EventLog};
use crate::ledger::NullifierLedger;
use crate::proving::{Proof, ProofSystem};
use crate::registry::GroupStore;
use crate::types::{SignalRequest, SignalResponse};
use crate::utils::{field_to_hex, hash_message, parse_field_hex, FieldElement};
use crate::witness::PublicInputs;
use log::{debug, info, warn};
use pasta_curves::pallas;
use std::fmt;
use std::sync::Arc;

/// Messages are limited to what fits a `bytes32` slot.
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 31;
pub const DEFAULT_MAX_PROOF_SIZE: usize = 512 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationStage {
    Received,
    RootValid,
    NullifierFresh,
    Verified,
}

impl fmt::Display for VerificationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerificationStage::Received => "received",
            VerificationStage::RootValid => "root-valid",
            VerificationStage::NullifierFresh => "nullifier-fresh",
            VerificationStage::Verified => "verified",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerifierSettings {
    /// Used when a request omits its external nullifier.
    pub external_nullifier: FieldElement,
    pub max_message_len: usize,
    pub max_proof_size: usize,
}

impl Default for VerifierSettings {
    fn default() -> Self {
        Self {
            external_nullifier: pallas::Base::one(),
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            max_proof_size: DEFAULT_MAX_PROOF_SIZE,
        }
    }
}

/// A decoded submission. `public.signal_hash` must be the hash of `message`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub message: String,
    pub public: PublicInputs,
    pub proof: Proof,
}

impl Submission {
    /// Submission for `message`, deriving the signal hash.
    #[must_use]
    pub fn new(
        message: impl Into<String>,
        root: FieldElement,
        nullifier_hash: FieldElement,
        external_nullifier: FieldElement,
        proof: Proof,
    ) -> Self {
        let message = message.into();
        let public = PublicInputs {
            root,
            nullifier_hash,
            signal_hash: hash_message(&message),
            external_nullifier,
        };
        Self {
            message,
            public,
            proof,
        }
    }
}

/// Verifies signals against shared group and nullifier state.
pub struct SignalVerifier<P: ProofSystem> {
    store: Arc<GroupStore>,
    ledger: Arc<NullifierLedger>,
    events: Arc<EventLog>,
    backend: P,
    settings: VerifierSettings,
}

impl<P: ProofSystem> SignalVerifier<P> {
    pub fn new(
        store: Arc<GroupStore>,
        ledger: Arc<NullifierLedger>,
        events: Arc<EventLog>,
        backend: P,
        settings: VerifierSettings,
    ) -> Self {
        Self {
            store,
            ledger,
            events,
            backend,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &VerifierSettings {
        &self.settings
    }

    #[must_use]
    pub fn store(&self) -> &Arc<GroupStore> {
        &self.store
    }

    #[must_use]
    pub fn ledger(&self) -> &Arc<NullifierLedger> {
        &self.ledger
    }

    #[must_use]
    pub fn events(&self) -> &Arc<EventLog> {
        &self.events
    }

    /// Decodes a wire request, filling in the current root and the configured
    /// external nullifier where they are omitted.
    pub fn parse(&self, request: &SignalRequest) -> Result<Submission> {
        let nullifier_hash = parse_field_hex(&request.nullifier_hash)?;
        let root = match &request.merkle_root {
            Some(hex) => parse_field_hex(hex)?,
            None => self.store.root(),
        };
        let external_nullifier = match &request.external_nullifier {
            Some(hex) => parse_field_hex(hex)?,
            None => self.settings.external_nullifier,
        };

        let submission = Submission::new(
            request.message.clone(),
            root,
            nullifier_hash,
            external_nullifier,
            request.proof.clone(),
        );
        self.check_limits(&submission)?;
        Ok(submission)
    }

    fn check_limits(&self, submission: &Submission) -> Result<()> {
        if submission.message.len() > self.settings.max_message_len {
            return Err(SignalError::MalformedInput(format!(
                "message is {} bytes, limit is {}",
                submission.message.len(),
                self.settings.max_message_len
            )));
        }
        if submission.proof.is_empty() {
            return Err(SignalError::MalformedInput("proof is empty".to_string()));
        }
        if submission.proof.len() > self.settings.max_proof_size {
            return Err(SignalError::MalformedInput(format!(
                "proof is {} bytes, limit is {}",
                submission.proof.len(),
                self.settings.max_proof_size
            )));
        }
        if submission.public.signal_hash != hash_message(&submission.message) {
            return Err(SignalError::MalformedInput(
                "signal hash does not match message".to_string(),
            ));
        }
        Ok(())
    }

    /// Runs every verification stage. On success the nullifier is consumed
    /// and the accepted signal is published.
    ///
    /// # Errors
    /// - [`SignalError::MalformedInput`] if the submission exceeds the limits
    /// - [`SignalError::StaleOrUnknownRoot`] if the root is outside the window
    /// - [`SignalError::DuplicateNullifier`] if the nullifier was already used,
    ///   including when a concurrent submission wins the race
    /// - [`SignalError::InvalidProof`] if the proof does not verify
    pub fn submit(&self, submission: &Submission) -> Result<AcceptedSignal> {
        let public = &submission.public;
        let nullifier_hex = field_to_hex(public.nullifier_hash);
        debug!("[{}] nullifier {nullifier_hex}", VerificationStage::Received);
        self.check_limits(submission)?;

        if !self.store.is_accepted_root(public.root) {
            return Err(SignalError::StaleOrUnknownRoot(field_to_hex(public.root)));
        }
        debug!("[{}] nullifier {nullifier_hex}", VerificationStage::RootValid);

        if self
            .ledger
            .contains(public.external_nullifier, public.nullifier_hash)
        {
            return Err(SignalError::DuplicateNullifier(nullifier_hex));
        }
        debug!(
            "[{}] nullifier {nullifier_hex}",
            VerificationStage::NullifierFresh
        );

        if !self.backend.verify(&submission.proof, public)? {
            return Err(SignalError::InvalidProof);
        }
        debug!("[{}] nullifier {nullifier_hex}", VerificationStage::Verified);

        if !self
            .ledger
            .try_consume(public.external_nullifier, public.nullifier_hash)?
        {
            return Err(SignalError::DuplicateNullifier(nullifier_hex));
        }

        let event = self.events.publish(
            submission.message.clone(),
            public.nullifier_hash,
            public.external_nullifier,
            public.root,
        );
        info!(
            "Accepted signal #{} under external nullifier {}",
            event.sequence,
            field_to_hex(public.external_nullifier)
        );
        Ok(event)
    }

    /// Parses and submits a wire request, reporting the outcome.
    pub fn handle(&self, request: &SignalRequest) -> SignalResponse {
        match self.parse(request).and_then(|s| self.submit(&s)) {
            Ok(event) => SignalResponse::accepted(event),
            Err(e) => {
                warn!("Rejected signal: {e}");
                SignalResponse::rejected(&e)
            }
        }
    }
}

impl<P: ProofSystem> fmt::Debug for SignalVerifier<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignalVerifier")
            .field("settings", &self.settings)
            .field("group_size", &self.store.len())
            .field("consumed", &self.ledger.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Identity;
    use crate::registry::RootWindow;
    use crate::witness::SignalWitness;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Accepts a proof iff its bytes encode the public inputs it is checked
    /// against, which is enough to exercise every stage.
    #[derive(Default)]
    struct EchoProofs {
        verify_calls: AtomicUsize,
    }

    fn encode(public: &PublicInputs) -> Vec<u8> {
        public
            .to_instance()
            .into_iter()
            .flat_map(crate::utils::field_to_bytes)
            .collect()
    }

    impl ProofSystem for EchoProofs {
        fn prove(&self, witness: &SignalWitness) -> Result<Proof> {
            Ok(Proof(encode(&witness.public_inputs())))
        }

        fn verify(&self, proof: &Proof, public_inputs: &PublicInputs) -> Result<bool> {
            self.verify_calls.fetch_add(1, Ordering::SeqCst);
            Ok(proof.as_bytes() == encode(public_inputs).as_slice())
        }
    }

    struct Fixture {
        verifier: SignalVerifier<Arc<EchoProofs>>,
        backend: Arc<EchoProofs>,
        member: Identity,
    }

    fn fixture() -> Fixture {
        let member = Identity::new(b"member").unwrap();
        let store = Arc::new(GroupStore::new(8, RootWindow::default()).unwrap());
        store.append(member.commitment()).unwrap();
        let backend = Arc::new(EchoProofs::default());
        let verifier = SignalVerifier::new(
            store,
            Arc::new(NullifierLedger::new()),
            Arc::new(EventLog::new()),
            Arc::clone(&backend),
            VerifierSettings::default(),
        );
        Fixture {
            verifier,
            backend,
            member,
        }
    }

    fn signal(fx: &Fixture, message: &str) -> Submission {
        let proof = fx
            .verifier
            .store()
            .proof_for(fx.member.commitment())
            .unwrap();
        let witness =
            SignalWitness::build(&fx.member, &proof, pallas::Base::one(), message).unwrap();
        let public = witness.public_inputs();
        Submission {
            message: message.to_string(),
            public,
            proof: fx.backend.prove(&witness).unwrap(),
        }
    }

    #[test]
    fn test_accepts_then_rejects_duplicate() {
        let fx = fixture();
        let submission = signal(&fx, "hello");
        let event = fx.verifier.submit(&submission).unwrap();
        assert_eq!(event.sequence, 0);
        assert_eq!(event.message, "hello");

        assert!(matches!(
            fx.verifier.submit(&submission),
            Err(SignalError::DuplicateNullifier(_))
        ));
        assert_eq!(fx.verifier.ledger().len(), 1);
        assert_eq!(fx.verifier.events().len(), 1);
    }

    #[test]
    fn test_duplicate_rejected_before_proof_check() {
        let fx = fixture();
        fx.verifier.submit(&signal(&fx, "one")).unwrap();
        let calls = fx.backend.verify_calls.load(Ordering::SeqCst);
        let _ = fx.verifier.submit(&signal(&fx, "two"));
        assert_eq!(fx.backend.verify_calls.load(Ordering::SeqCst), calls);
    }

    #[test]
    fn test_unknown_root_rejected_without_mutation() {
        let fx = fixture();
        let mut submission = signal(&fx, "hello");
        submission.public.root = pallas::Base::from(12345u64);
        assert!(matches!(
            fx.verifier.submit(&submission),
            Err(SignalError::StaleOrUnknownRoot(_))
        ));
        assert!(fx.verifier.ledger().is_empty());
        assert_eq!(fx.backend.verify_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_invalid_proof_leaves_nullifier_unused() {
        let fx = fixture();
        let mut submission = signal(&fx, "hello");
        submission.proof = Proof(vec![0u8; 16]);
        assert_eq!(
            fx.verifier.submit(&submission),
            Err(SignalError::InvalidProof)
        );
        assert!(fx.verifier.ledger().is_empty());
        assert!(fx.verifier.events().is_empty());

        fx.verifier.submit(&signal(&fx, "hello")).unwrap();
    }

    #[test]
    fn test_message_limits() {
        let fx = fixture();
        let long = "x".repeat(DEFAULT_MAX_MESSAGE_LEN + 1);
        assert!(matches!(
            fx.verifier.submit(&signal(&fx, &long)),
            Err(SignalError::MalformedInput(_))
        ));

        let mut tampered = signal(&fx, "hello");
        tampered.message = "goodbye".to_string();
        assert!(matches!(
            fx.verifier.submit(&tampered),
            Err(SignalError::MalformedInput(_))
        ));
    }

    #[test]
    fn test_handle_fills_defaults_and_reports() {
        let fx = fixture();
        let submission = signal(&fx, "hello");
        let request = SignalRequest {
            message: "hello".to_string(),
            nullifier_hash: field_to_hex(submission.public.nullifier_hash),
            proof: submission.proof.clone(),
            merkle_root: None,
            external_nullifier: None,
        };

        let response = fx.verifier.handle(&request);
        assert!(response.accepted, "{:?}", response.reason);

        let again = fx.verifier.handle(&request);
        assert!(!again.accepted);
        assert!(!again.retryable);
    }

    #[test]
    fn test_handle_rejects_bad_hex() {
        let fx = fixture();
        let request = SignalRequest {
            message: "hello".to_string(),
            nullifier_hash: "not-hex".to_string(),
            proof: Proof(vec![1]),
            merkle_root: None,
            external_nullifier: None,
        };
        let response = fx.verifier.handle(&request);
        assert!(!response.accepted);
        assert!(response.retryable);
        assert!(response.reason.unwrap().contains("malformed"));
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(VerificationStage::NullifierFresh.to_string(), "nullifier-fresh");
    }
}
