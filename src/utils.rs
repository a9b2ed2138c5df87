//! Field encoding, hex validation and the hash primitive.

use crate::error::{Result, SignalError};
use halo2_gadgets::poseidon::primitives::{
    self as poseidon, ConstantLength, P128Pow5T3 as PoseidonSpec,
};
use pasta_curves::group::ff::PrimeField;
use pasta_curves::pallas;
use sha3::{Digest, Sha3_256};

/// Field element used for commitments, Merkle nodes and nullifiers.
pub type FieldElement = pallas::Base;

/// Width of an encoded field element in bytes.
pub const FIELD_BYTES: usize = 32;

/// Width of an encoded field element in hex characters.
pub const FIELD_HEX_LEN: usize = FIELD_BYTES * 2;

fn is_valid_hex_string(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii_hexdigit())
}

fn strip_hex_prefix(input: &str) -> &str {
    input
        .trim()
        .strip_prefix("0x")
        .or_else(|| input.trim().strip_prefix("0X"))
        .unwrap_or_else(|| input.trim())
}

/// Validates and strips hex prefix from a string.
///
/// # Errors
/// Returns [`SignalError::MalformedInput`] if the stripped string has the
/// wrong length or contains non-hex characters.
///
/// # Examples
///
/// ```
/// use zkp_anonymous_signal::utils::validate_and_strip_hex;
///
/// let result = validate_and_strip_hex("0x1234abcd", 8).unwrap();
/// assert_eq!(result, "1234abcd");
/// ```
pub fn validate_and_strip_hex(input: &str, expected_len: usize) -> Result<String> {
    let stripped = strip_hex_prefix(input);

    if stripped.len() != expected_len {
        return Err(SignalError::MalformedInput(format!(
            "hex string must be {} characters (got {})",
            expected_len,
            stripped.len()
        )));
    }

    if !is_valid_hex_string(stripped) {
        return Err(SignalError::MalformedInput(
            "hex string contains non-hex characters".to_string(),
        ));
    }

    Ok(stripped.to_string())
}

/// Returns true if the input is a non-empty hex string, with or without prefix.
#[must_use]
pub fn validate_hex_string(input: &str) -> bool {
    let stripped = strip_hex_prefix(input);

    if stripped.is_empty() {
        return false;
    }

    is_valid_hex_string(stripped)
}

/// Decodes a hex string of any even length, with or without `0x` prefix.
pub fn decode_hex(input: &str) -> Result<Vec<u8>> {
    if !validate_hex_string(input) {
        return Err(SignalError::MalformedInput(format!(
            "'{}' is not a hex string",
            input.trim()
        )));
    }
    hex::decode(strip_hex_prefix(input))
        .map_err(|e| SignalError::MalformedInput(format!("invalid hex: {e}")))
}

const BASE_U64: u64 = 256;

/// Interprets 32 bytes as a big-endian base-256 number reduced modulo the
/// field order.
#[inline]
#[must_use]
pub fn bytes_to_field(bytes: &[u8; 32]) -> pallas::Base {
    let mut value = pallas::Base::zero();
    let base = pallas::Base::from(BASE_U64);

    for &byte in bytes.iter() {
        value = value * base + pallas::Base::from(byte as u64);
    }

    value
}

/// Canonical big-endian encoding of a field element.
///
/// Inverse of [`field_from_bytes`], and of [`bytes_to_field`] for canonical input.
#[inline]
#[must_use]
pub fn field_to_bytes(field: pallas::Base) -> [u8; 32] {
    let mut bytes = field.to_repr();
    bytes.reverse();
    bytes
}

/// Decodes a canonical big-endian field element. Returns `None` when the
/// value is not below the field modulus.
#[must_use]
pub fn field_from_bytes(bytes: &[u8; 32]) -> Option<pallas::Base> {
    let mut repr = *bytes;
    repr.reverse();
    Option::from(pallas::Base::from_repr(repr))
}

/// Lowercase hex encoding of a field element, without prefix.
#[must_use]
pub fn field_to_hex(field: pallas::Base) -> String {
    hex::encode(field_to_bytes(field))
}

/// Parses a 32-byte hex field element, rejecting non-canonical values.
///
/// # Examples
///
/// ```
/// use zkp_anonymous_signal::utils::{field_to_hex, parse_field_hex};
/// use pasta_curves::pallas;
///
/// let value = pallas::Base::from(42u64);
/// assert_eq!(parse_field_hex(&field_to_hex(value)).unwrap(), value);
/// ```
pub fn parse_field_hex(input: &str) -> Result<pallas::Base> {
    let stripped = validate_and_strip_hex(input, FIELD_HEX_LEN)?;
    let mut bytes = [0u8; FIELD_BYTES];
    hex::decode_to_slice(&stripped, &mut bytes)
        .map_err(|e| SignalError::MalformedInput(format!("invalid hex: {e}")))?;
    field_from_bytes(&bytes).ok_or_else(|| {
        SignalError::MalformedInput(format!("0x{stripped} is not a canonical field element"))
    })
}

/// Poseidon hash of two field elements using the `P128Pow5T3` specification.
///
/// The same parameters are used by the in-circuit chip, so values computed
/// here match the circuit bit-for-bit.
///
/// # Example
///
/// ```
/// use zkp_anonymous_signal::utils::poseidon_hash;
/// use pasta_curves::pallas;
///
/// let left = pallas::Base::from(1u64);
/// let right = pallas::Base::from(2u64);
/// assert_ne!(poseidon_hash(left, right), poseidon_hash(right, left));
/// ```
#[inline]
#[must_use]
pub fn poseidon_hash(left: pallas::Base, right: pallas::Base) -> pallas::Base {
    let inputs = [left, right];
    poseidon::Hash::<_, PoseidonSpec, ConstantLength<2>, 3, 2>::init().hash(inputs)
}

/// SHA3-256 of the concatenated parts mapped into the field.
///
/// The most significant byte is cleared so the result is always below the
/// modulus and never wraps.
#[must_use]
pub fn hash_to_field(parts: &[&[u8]]) -> pallas::Base {
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut digest: [u8; 32] = hasher.finalize().into();
    digest[0] = 0;
    bytes_to_field(&digest)
}

/// Hash binding a signal message into a public input.
#[must_use]
pub fn hash_message(message: &str) -> pallas::Base {
    hash_to_field(&[message.as_bytes()])
}
