use pasta_curves::pallas;
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use zkp_anonymous_signal::{
    membership, utils::field_to_bytes, EventLog, GroupStore, Halo2ProofSystem, Identity,
    NullifierLedger, Proof, ProofSystem, PublicInputs, RootWindow, SignalError, SignalRequest,
    SignalVerifier, SignalWitness, Submission, VerifierSettings,
};

const DEPTH: usize = 4;

/// Accepts exactly the proof bytes it would produce for the given public
/// inputs. Keeps verifier tests fast and independent of the circuit.
struct EchoProofSystem;

fn encode(public: &PublicInputs) -> Vec<u8> {
    public.to_instance().into_iter().flat_map(field_to_bytes).collect()
}

impl ProofSystem for EchoProofSystem {
    fn prove(&self, witness: &SignalWitness) -> zkp_anonymous_signal::Result<Proof> {
        Ok(Proof(encode(&witness.public_inputs())))
    }

    fn verify(&self, proof: &Proof, public: &PublicInputs) -> zkp_anonymous_signal::Result<bool> {
        Ok(proof.as_bytes() == encode(public).as_slice())
    }
}

fn identities(names: &[&str]) -> Vec<Identity> {
    names
        .iter()
        .map(|n| Identity::new(n.as_bytes()).expect("Failed to derive identity"))
        .collect()
}

fn verifier_for<P: ProofSystem>(store: Arc<GroupStore>, backend: P) -> SignalVerifier<P> {
    SignalVerifier::new(
        store,
        Arc::new(NullifierLedger::new()),
        Arc::new(EventLog::new()),
        backend,
        VerifierSettings::default(),
    )
}

fn make_signal<P: ProofSystem>(
    backend: &P,
    store: &GroupStore,
    identity: &Identity,
    external_nullifier: pallas::Base,
    message: &str,
) -> Submission {
    let merkle_proof = store
        .proof_for(identity.commitment())
        .expect("Identity should be a member");
    let witness = SignalWitness::build(identity, &merkle_proof, external_nullifier, message)
        .expect("Failed to build witness");
    let public = witness.public_inputs();
    Submission::new(
        message,
        public.root,
        public.nullifier_hash,
        public.external_nullifier,
        backend.prove(&witness).expect("Failed to prove"),
    )
}

fn group_store(members: &[Identity], window: RootWindow) -> Arc<GroupStore> {
    let store = GroupStore::new(DEPTH, window).expect("Failed to create store");
    for member in members {
        store.append(member.commitment()).expect("Failed to append");
    }
    Arc::new(store)
}

#[test]
fn test_end_to_end_signal_with_halo2() {
    let members = identities(&["A", "B", "C"]);
    let store = group_store(&members, RootWindow::default());
    let backend = Arc::new(Halo2ProofSystem::setup(9, DEPTH).expect("Failed to generate keys"));
    let verifier = verifier_for(Arc::clone(&store), Arc::clone(&backend));
    let epoch = pallas::Base::one();

    let hello = make_signal(&backend, &store, &members[1], epoch, "hello");
    let event = verifier.submit(&hello).expect("Signal should be accepted");
    assert_eq!(event.message, "hello");
    assert_eq!(event.root, store.root());
    assert_eq!(event.nullifier_hash, members[1].nullifier_hash(epoch));
    assert_eq!(verifier.ledger().len(), 1);

    assert!(matches!(
        verifier.submit(&hello),
        Err(SignalError::DuplicateNullifier(_))
    ));

    let goodbye = make_signal(&backend, &store, &members[1], epoch, "goodbye");
    assert!(matches!(
        verifier.submit(&goodbye),
        Err(SignalError::DuplicateNullifier(_))
    ));
    assert_eq!(verifier.ledger().len(), 1);

    // A proof for "hello" cannot be reused to publish another message.
    let mut swapped = make_signal(&backend, &store, &members[0], epoch, "hello");
    swapped.message = "goodbye".to_string();
    swapped.public.signal_hash = zkp_anonymous_signal::hash_message("goodbye");
    assert_eq!(verifier.submit(&swapped), Err(SignalError::InvalidProof));
    assert_eq!(verifier.ledger().len(), 1);
}

#[test]
fn test_unregistered_identity_cannot_signal() {
    let members = identities(&["A", "B", "C"]);
    let outsider = Identity::new(b"D").expect("Failed to derive identity");
    let store = group_store(&members, RootWindow::default());
    let registry = store.registry_snapshot();

    assert_eq!(
        membership::prove_membership(&registry, 3),
        Err(SignalError::IndexOutOfRange { index: 3, size: 3 })
    );
    assert!(matches!(
        membership::prove_identity(&registry, &outsider),
        Err(SignalError::MemberNotFound(_))
    ));

    // Borrowing a member's path does not help the outsider.
    let path = store.prove_membership(0).expect("Member proof");
    assert_eq!(
        SignalWitness::build(&outsider, &path, pallas::Base::one(), "hi"),
        Err(SignalError::IdentityMismatch)
    );
}

#[test]
fn test_same_identity_signals_once_per_epoch() {
    let members = identities(&["A", "B"]);
    let store = group_store(&members, RootWindow::default());
    let verifier = verifier_for(Arc::clone(&store), EchoProofSystem);

    for epoch in 1..=3u64 {
        let signal = make_signal(
            &EchoProofSystem,
            &store,
            &members[0],
            pallas::Base::from(epoch),
            "vote",
        );
        verifier.submit(&signal).expect("Fresh epoch should accept");
    }
    assert_eq!(verifier.ledger().len(), 3);
    assert_eq!(verifier.ledger().len_for(pallas::Base::from(2u64)), 1);

    let events: Vec<_> = verifier.events().subscribe(0).collect();
    assert_eq!(events.len(), 3);
    assert_eq!(events[2].external_nullifier, pallas::Base::from(3u64));
}

#[test]
fn test_root_window_accepts_recent_and_rejects_evicted() {
    let members = identities(&["A", "B", "C", "D"]);
    let window = RootWindow {
        max_roots: 2,
        max_age: None,
    };
    let store = group_store(&members[..1], window);
    let verifier = verifier_for(Arc::clone(&store), EchoProofSystem);

    let early = make_signal(&EchoProofSystem, &store, &members[0], pallas::Base::one(), "early");
    let late = make_signal(
        &EchoProofSystem,
        &store,
        &members[0],
        pallas::Base::from(2u64),
        "late",
    );

    store.append(members[1].commitment()).expect("append");
    store.append(members[2].commitment()).expect("append");
    verifier
        .submit(&early)
        .expect("Root two appends old is inside the window");

    store.append(members[3].commitment()).expect("append");
    assert!(matches!(
        verifier.submit(&late),
        Err(SignalError::StaleOrUnknownRoot(_))
    ));
    assert_eq!(verifier.ledger().len(), 1);

    let rebuilt = make_signal(
        &EchoProofSystem,
        &store,
        &members[0],
        pallas::Base::from(2u64),
        "late",
    );
    verifier.submit(&rebuilt).expect("Rebuilt against current root");
}

#[test]
fn test_concurrent_submissions_have_one_winner() {
    const THREADS: usize = 8;
    let members = identities(&["A", "B", "C"]);
    let store = group_store(&members, RootWindow::default());
    let verifier = Arc::new(verifier_for(Arc::clone(&store), EchoProofSystem));
    let signal = make_signal(&EchoProofSystem, &store, &members[2], pallas::Base::one(), "race");
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let verifier = Arc::clone(&verifier);
            let barrier = Arc::clone(&barrier);
            let signal = signal.clone();
            thread::spawn(move || {
                barrier.wait();
                verifier.submit(&signal)
            })
        })
        .collect();

    let results: Vec<_> = handles
        .into_iter()
        .map(|h| h.join().expect("Thread panicked"))
        .collect();
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results
        .iter()
        .filter_map(|r| r.as_ref().err())
        .all(|e| matches!(e, SignalError::DuplicateNullifier(_))));
    assert_eq!(verifier.ledger().len(), 1);
    assert_eq!(verifier.events().len(), 1);
}

#[test]
fn test_concurrent_appends_and_signals() {
    let members = identities(&["A", "B", "C", "D", "E", "F"]);
    let store = group_store(&members[..2], RootWindow::default());
    let verifier = Arc::new(verifier_for(Arc::clone(&store), EchoProofSystem));
    let signal = make_signal(&EchoProofSystem, &store, &members[0], pallas::Base::one(), "x");

    let writer = {
        let store = Arc::clone(&store);
        let rest: Vec<_> = members[2..].iter().map(Identity::commitment).collect();
        thread::spawn(move || {
            for commitment in rest {
                store.append(commitment).expect("append");
            }
        })
    };
    verifier
        .submit(&signal)
        .expect("Root stays in the window during appends");
    writer.join().expect("Writer panicked");
    assert_eq!(store.len(), 6);
}

#[test]
fn test_wire_request_roundtrip() {
    let members = identities(&["A", "B", "C"]);
    let store = group_store(&members, RootWindow::default());
    let verifier = verifier_for(Arc::clone(&store), EchoProofSystem);
    let signal = make_signal(&EchoProofSystem, &store, &members[1], pallas::Base::one(), "hello");

    let json = SignalRequest::new("hello", &signal.public, signal.proof.clone())
        .to_json()
        .expect("Failed to encode");
    let request = SignalRequest::from_json(&json).expect("Failed to decode");

    let response = verifier.handle(&request);
    assert!(response.accepted);
    assert_eq!(response.event.map(|e| e.sequence), Some(0));

    let replay = verifier.handle(&request);
    assert!(!replay.accepted);
    assert!(!replay.retryable);
    assert!(replay.reason.expect("reason").contains("already been used"));
}

#[test]
fn test_file_backed_state_survives_restart() {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let commitments = temp_dir.path().join("commitments.txt");
    let nullifiers = temp_dir.path().join("nullifiers.txt");
    let members = identities(&["A", "B", "C"]);

    let (root, signal) = {
        let store = Arc::new(
            GroupStore::open(DEPTH, RootWindow::default(), &commitments).expect("open store"),
        );
        for member in &members {
            store.append(member.commitment()).expect("append");
        }
        let ledger = Arc::new(NullifierLedger::open(&nullifiers).expect("open ledger"));
        let verifier = SignalVerifier::new(
            Arc::clone(&store),
            ledger,
            Arc::new(EventLog::new()),
            EchoProofSystem,
            VerifierSettings::default(),
        );
        let signal = make_signal(&EchoProofSystem, &store, &members[0], pallas::Base::one(), "hi");
        verifier.submit(&signal).expect("accepted");
        (store.root(), signal)
    };

    let store = Arc::new(
        GroupStore::open(DEPTH, RootWindow::default(), &commitments).expect("reopen store"),
    );
    assert_eq!(store.root(), root);
    assert_eq!(store.len(), 3);

    let verifier = SignalVerifier::new(
        store,
        Arc::new(NullifierLedger::open(&nullifiers).expect("reopen ledger")),
        Arc::new(EventLog::new()),
        EchoProofSystem,
        VerifierSettings::default(),
    );
    assert!(matches!(
        verifier.submit(&signal),
        Err(SignalError::DuplicateNullifier(_))
    ));
}
