//! Anonymous signaling with group membership proofs and nullifiers.
//!
//! A member of a registered group proves, in zero knowledge, that their
//! identity commitment is a leaf of the group's Merkle tree and publishes a
//! message. A nullifier derived from the identity and an external nullifier
//! (the epoch or topic) lets verifiers reject a second signal from the same
//! member without learning who sent either.
//!
//! # Components
//!
//! - [`Identity`]: member secrets and their public commitment
//! - [`GroupRegistry`] / [`GroupStore`]: append-only Merkle group with a window
//!   of accepted roots
//! - [`membership`]: inclusion proofs for a member
//! - [`SignalWitness`]: full witness for one signal
//! - [`SignalVerifier`]: staged verification and nullifier consumption
//! - [`NullifierLedger`]: consumed nullifiers, scoped per external nullifier
//! - [`Halo2ProofSystem`]: the Halo2 circuit behind [`ProofSystem`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use zkp_anonymous_signal::{
//!     EventLog, GroupStore, Halo2ProofSystem, Identity, NullifierLedger, ProofSystem,
//!     RootWindow, SignalVerifier, SignalWitness, Submission, VerifierSettings, CIRCUIT_K,
//! };
//!
//! # fn main() -> zkp_anonymous_signal::Result<()> {
//! let store = Arc::new(GroupStore::new(20, RootWindow::default())?);
//! let alice = Identity::new(b"alice seed")?;
//! store.append(alice.commitment())?;
//!
//! let backend = Halo2ProofSystem::setup(CIRCUIT_K, 20)?;
//! let external_nullifier = pasta_curves::pallas::Base::one();
//! let witness = SignalWitness::build(
//!     &alice,
//!     &store.proof_for(alice.commitment())?,
//!     external_nullifier,
//!     "hello",
//! )?;
//! let proof = backend.prove(&witness)?;
//!
//! let verifier = SignalVerifier::new(
//!     store,
//!     Arc::new(NullifierLedger::new()),
//!     Arc::new(EventLog::new()),
//!     backend,
//!     VerifierSettings::default(),
//! );
//! let public = witness.public_inputs();
//! verifier.submit(&Submission::new(
//!     "hello",
//!     public.root,
//!     public.nullifier_hash,
//!     public.external_nullifier,
//!     proof,
//! ))?;
//! # Ok(())
//! # }
//! ```

pub mod circuit;
pub mod config;
pub mod error;
pub mod ethereum;
pub mod events;
pub mod identity;
pub mod ledger;
pub mod membership;
pub mod merkle;
pub mod proving;
pub mod registry;
pub mod storage;
pub mod types;
pub mod utils;
pub mod verifier;
pub mod witness;


pub use circuit::{Halo2ProofSystem, SignalCircuit, CIRCUIT_K};
pub use error::{Result, SignalError};
pub use events::{AcceptedSignal, EventLog, Subscription};
pub use identity::Identity;
pub use ledger::NullifierLedger;
pub use merkle::{MerkleProof, MerkleTree};
pub use proving::{Proof, ProofSystem};
pub use registry::{GroupRegistry, GroupStore, RootHistory, RootWindow};
pub use types::{SignalRequest, SignalResponse};
pub use utils::{field_to_hex, hash_message, parse_field_hex, poseidon_hash, FieldElement};
pub use verifier::{SignalVerifier, Submission, VerificationStage, VerifierSettings};
pub use witness::{PublicInputs, SignalWitness};
