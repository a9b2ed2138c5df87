//! Halo2 circuit for the signal relation.
//!
//! Public inputs, in instance-column order:
//! 0. Merkle root
//! 1. nullifier hash
//! 2. signal hash
//! 3. external nullifier
//!
//! Constraints:
//! - `commitment = H(trapdoor, nullifier_secret)`
//! - the path bits are boolean and each level hashes `(node, sibling)` in the
//!   order chosen by its bit, ending at the public root
//! - `nullifier_hash = H(external_nullifier, nullifier_secret)`
//!
//! The signal hash takes no part in any gate; it is bound to the proof through
//! the instance commitment, which is all that is needed to stop a proof being
//! replayed for a different message.

use crate::error::{Result, SignalError};
use crate::proving::{Proof, ProofSystem};
use crate::witness::{PublicInputs, SignalWitness};
use halo2_gadgets::poseidon::{
    primitives::{ConstantLength, P128Pow5T3},
    Hash as PoseidonHash, Pow5Chip, Pow5Config,
};
use halo2_proofs::{
    circuit::{AssignedCell, Layouter, SimpleFloorPlanner, Value},
    plonk::{
        create_proof, keygen_pk, keygen_vk, verify_proof, Advice, Circuit, Column,
        ConstraintSystem, Error, Expression, Instance, ProvingKey, Selector, SingleVerifier,
        VerifyingKey,
    },
    poly::{commitment::Params, Rotation},
    transcript::{Blake2bRead, Blake2bWrite, Challenge255},
};
use log::debug;
use pasta_curves::{pallas, vesta};
use rand::rngs::OsRng;
use std::fmt;
use std::sync::Arc;

/// Circuit size parameter: `2^12` rows.
///
/// Each Poseidon hash takes about 40 rows, so this fits trees up to the
/// maximum depth of 32 (34 hashes). Changing it requires regenerating keys on
/// both sides.
pub const CIRCUIT_K: u32 = 12;

pub const ROOT_ROW: usize = 0;
pub const NULLIFIER_HASH_ROW: usize = 1;
pub const SIGNAL_HASH_ROW: usize = 2;
pub const EXTERNAL_NULLIFIER_ROW: usize = 3;

type Cell = AssignedCell<pallas::Base, pallas::Base>;

#[derive(Debug, Clone)]
pub struct SignalConfig {
    /// `[node, sibling, bit, left, right]` for the swap gate; also used to
    /// load the secrets and public values.
    advice: [Column<Advice>; 5],
    instance: Column<Instance>,
    swap: Selector,
    poseidon: Pow5Config<pallas::Base, 3, 2>,
}

/// The signal circuit for a tree of `path_elements.len()` levels.
#[derive(Debug, Clone)]
pub struct SignalCircuit {
    pub trapdoor: Value<pallas::Base>,
    pub nullifier_secret: Value<pallas::Base>,
    pub path_elements: Vec<Value<pallas::Base>>,
    pub path_indices: Vec<Value<pallas::Base>>,
}

impl SignalCircuit {
    /// Circuit with every private value assigned from the witness.
    #[must_use]
    pub fn new(witness: &SignalWitness) -> Self {
        Self {
            trapdoor: Value::known(witness.trapdoor),
            nullifier_secret: Value::known(witness.nullifier_secret),
            path_elements: witness
                .path_elements
                .iter()
                .map(|e| Value::known(*e))
                .collect(),
            path_indices: witness
                .path_indices
                .iter()
                .map(|&bit| Value::known(pallas::Base::from(u64::from(bit))))
                .collect(),
        }
    }

    /// Circuit shape for key generation.
    #[must_use]
    pub fn empty(depth: usize) -> Self {
        Self {
            trapdoor: Value::unknown(),
            nullifier_secret: Value::unknown(),
            path_elements: vec![Value::unknown(); depth],
            path_indices: vec![Value::unknown(); depth],
        }
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.path_elements.len()
    }
}

fn poseidon(
    config: &SignalConfig,
    mut layouter: impl Layouter<pallas::Base>,
    inputs: [Cell; 2],
) -> std::result::Result<Cell, Error> {
    let chip = Pow5Chip::construct(config.poseidon.clone());
    let hasher = PoseidonHash::<_, _, P128Pow5T3, ConstantLength<2>, 3, 2>::init(
        chip,
        layouter.namespace(|| "init"),
    )?;
    hasher.hash(layouter.namespace(|| "hash"), inputs)
}

impl Circuit<pallas::Base> for SignalCircuit {
    type Config = SignalConfig;
    type FloorPlanner = SimpleFloorPlanner;

    fn without_witnesses(&self) -> Self {
        Self::empty(self.depth())
    }

    fn configure(meta: &mut ConstraintSystem<pallas::Base>) -> Self::Config {
        let advice = [(); 5].map(|_| meta.advice_column());
        for column in advice {
            meta.enable_equality(column);
        }
        let instance = meta.instance_column();
        meta.enable_equality(instance);

        let swap = meta.selector();
        meta.create_gate("conditional swap", |meta| {
            let s = meta.query_selector(swap);
            let node = meta.query_advice(advice[0], Rotation::cur());
            let sibling = meta.query_advice(advice[1], Rotation::cur());
            let bit = meta.query_advice(advice[2], Rotation::cur());
            let left = meta.query_advice(advice[3], Rotation::cur());
            let right = meta.query_advice(advice[4], Rotation::cur());
            let one = Expression::Constant(pallas::Base::one());

            vec![
                s.clone() * bit.clone() * (one - bit.clone()),
                s.clone()
                    * (left - (node.clone() + bit.clone() * (sibling.clone() - node.clone()))),
                s * (right - (sibling.clone() + bit * (node - sibling))),
            ]
        });

        let state = [(); 3].map(|_| meta.advice_column());
        let partial_sbox = meta.advice_column();
        let rc_a = [(); 3].map(|_| meta.fixed_column());
        let rc_b = [(); 3].map(|_| meta.fixed_column());
        meta.enable_constant(rc_b[0]);
        let poseidon =
            Pow5Chip::configure::<P128Pow5T3>(meta, state, partial_sbox, rc_a, rc_b);

        SignalConfig {
            advice,
            instance,
            swap,
            poseidon,
        }
    }

    fn synthesize(
        &self,
        config: Self::Config,
        mut layouter: impl Layouter<pallas::Base>,
    ) -> std::result::Result<(), Error> {
        let (trapdoor, nullifier_secret, external_nullifier) = layouter.assign_region(
            || "load inputs",
            |mut region| {
                let trapdoor =
                    region.assign_advice(|| "trapdoor", config.advice[0], 0, || self.trapdoor)?;
                let nullifier_secret = region.assign_advice(
                    || "nullifier secret",
                    config.advice[1],
                    0,
                    || self.nullifier_secret,
                )?;
                let external_nullifier = region.assign_advice_from_instance(
                    || "external nullifier",
                    config.instance,
                    EXTERNAL_NULLIFIER_ROW,
                    config.advice[2],
                    0,
                )?;
                region.assign_advice_from_instance(
                    || "signal hash",
                    config.instance,
                    SIGNAL_HASH_ROW,
                    config.advice[3],
                    0,
                )?;
                Ok((trapdoor, nullifier_secret, external_nullifier))
            },
        )?;

        let commitment = poseidon(
            &config,
            layouter.namespace(|| "commitment"),
            [trapdoor, nullifier_secret.clone()],
        )?;

        let nullifier_hash = poseidon(
            &config,
            layouter.namespace(|| "nullifier hash"),
            [external_nullifier, nullifier_secret],
        )?;
        layouter.constrain_instance(nullifier_hash.cell(), config.instance, NULLIFIER_HASH_ROW)?;

        let mut node = commitment;
        for (level, (sibling, bit)) in self.path_elements.iter().zip(&self.path_indices).enumerate()
        {
            let (left, right) = layouter.assign_region(
                || format!("swap level {level}"),
                |mut region| {
                    config.swap.enable(&mut region, 0)?;
                    let current = node.copy_advice(|| "node", &mut region, config.advice[0], 0)?;
                    region.assign_advice(|| "sibling", config.advice[1], 0, || *sibling)?;
                    region.assign_advice(|| "path bit", config.advice[2], 0, || *bit)?;

                    let left_value = current
                        .value()
                        .copied()
                        .zip(*sibling)
                        .zip(*bit)
                        .map(|((n, s), b)| n + b * (s - n));
                    let right_value = current
                        .value()
                        .copied()
                        .zip(*sibling)
                        .zip(*bit)
                        .map(|((n, s), b)| s + b * (n - s));

                    let left =
                        region.assign_advice(|| "left", config.advice[3], 0, || left_value)?;
                    let right =
                        region.assign_advice(|| "right", config.advice[4], 0, || right_value)?;
                    Ok((left, right))
                },
            )?;

            node = poseidon(
                &config,
                layouter.namespace(|| format!("level {level}")),
                [left, right],
            )?;
        }

        layouter.constrain_instance(node.cell(), config.instance, ROOT_ROW)
    }
}

fn proving_error(context: &str, e: Error) -> SignalError {
    SignalError::Proving(format!("{context}: {e:?}"))
}

/// Halo2 (IPA over Vesta) implementation of [`ProofSystem`] with cached keys.
#[derive(Clone)]
pub struct Halo2ProofSystem {
    k: u32,
    depth: usize,
    params: Arc<Params<vesta::Affine>>,
    pk: Arc<ProvingKey<vesta::Affine>>,
    vk: Arc<VerifyingKey<vesta::Affine>>,
}

impl Halo2ProofSystem {
    /// Generates parameters and keys for trees of `depth` levels.
    ///
    /// This is slow; build one instance and share it.
    pub fn setup(k: u32, depth: usize) -> Result<Self> {
        debug!("Generating Halo2 keys for k={k}, depth={depth}");
        let params = Params::<vesta::Affine>::new(k);
        let circuit = SignalCircuit::empty(depth);
        let vk = keygen_vk(&params, &circuit).map_err(|e| proving_error("keygen_vk", e))?;
        let pk = keygen_pk(&params, vk.clone(), &circuit)
            .map_err(|e| proving_error("keygen_pk", e))?;

        Ok(Self {
            k,
            depth,
            params: Arc::new(params),
            pk: Arc::new(pk),
            vk: Arc::new(vk),
        })
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn k(&self) -> u32 {
        self.k
    }
}

impl fmt::Debug for Halo2ProofSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Halo2ProofSystem")
            .field("k", &self.k)
            .field("depth", &self.depth)
            .finish_non_exhaustive()
    }
}

impl ProofSystem for Halo2ProofSystem {
    fn prove(&self, witness: &SignalWitness) -> Result<Proof> {
        if witness.depth() != self.depth {
            return Err(SignalError::Proving(format!(
                "witness has depth {}, keys were generated for depth {}",
                witness.depth(),
                self.depth
            )));
        }

        let circuit = SignalCircuit::new(witness);
        let instance = witness.public_inputs().to_instance();
        let instances: &[&[&[pallas::Base]]] = &[&[&instance]];

        let mut transcript = Blake2bWrite::<_, vesta::Affine, Challenge255<_>>::init(vec![]);
        create_proof(
            &*self.params,
            &*self.pk,
            &[circuit],
            instances,
            OsRng,
            &mut transcript,
        )
        .map_err(|e| proving_error("create_proof", e))?;

        let proof = transcript.finalize();
        debug!("Generated proof of {} bytes", proof.len());
        Ok(Proof(proof))
    }

    fn verify(&self, proof: &Proof, public_inputs: &PublicInputs) -> Result<bool> {
        let instance = public_inputs.to_instance();
        let instances: &[&[&[pallas::Base]]] = &[&[&instance]];

        let mut remaining = proof.as_bytes();
        let result = {
            let strategy = SingleVerifier::new(&*self.params);
            let mut transcript =
                Blake2bRead::<_, vesta::Affine, Challenge255<_>>::init(&mut remaining);
            verify_proof(&*self.params, &*self.vk, strategy, instances, &mut transcript)
        };
        if let Err(e) = &result {
            debug!("Proof rejected: {e:?}");
            return Ok(false);
        }
        // One encoding per proof.
        if !remaining.is_empty() {
            debug!("Proof rejected: {} trailing bytes", remaining.len());
            return Ok(false);
        }
        Ok(true)
    }
}
