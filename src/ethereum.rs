//! Identity derivation from an Ethereum wallet.
//!
//! The wallet signs a fixed message and the signature bytes seed the identity,
//! so the same key always recovers the same identity without storing secrets.

use crate::error::{Result, SignalError};
use crate::identity::Identity;
use crate::utils::validate_and_strip_hex;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::hash_message;

/// Message signed to derive an identity.
pub const IDENTITY_MESSAGE: &str = "Sign this message to create your identity!";

/// Expected length of an Ethereum private key in hex characters (excluding 0x prefix)
pub const PRIVATE_KEY_HEX_LENGTH: usize = 64;

/// Validates an Ethereum private key.
///
/// # Errors
///
/// Returns [`SignalError::InvalidSeed`] if:
/// - The private key is not exactly 64 hex characters (excluding 0x prefix)
/// - The private key contains non-hex characters
/// - The private key is all zeros
///
/// # Examples
///
/// ```
/// use zkp_anonymous_signal::ethereum::validate_private_key;
///
/// // Valid private key (not a real key)
/// assert!(validate_private_key("0x4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318").is_ok());
///
/// // All zeros is invalid
/// assert!(validate_private_key("0x0000000000000000000000000000000000000000000000000000000000000000").is_err());
/// ```
pub fn validate_private_key(private_key: &str) -> Result<()> {
    let stripped = validate_and_strip_hex(private_key, PRIVATE_KEY_HEX_LENGTH)
        .map_err(|e| SignalError::InvalidSeed(format!("private key: {e}")))?;

    if stripped.chars().all(|c| c == '0') {
        return Err(SignalError::InvalidSeed(
            "private key cannot be all zeros".to_string(),
        ));
    }

    Ok(())
}

fn parse_wallet(private_key: &str) -> Result<LocalWallet> {
    validate_private_key(private_key)?;
    private_key
        .trim()
        .trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| SignalError::InvalidSeed(format!("private key rejected by wallet: {e}")))
}

/// Checksummed address of the wallet for `private_key`.
pub fn wallet_address(private_key: &str) -> Result<String> {
    let wallet = parse_wallet(private_key)?;
    Ok(ethers::utils::to_checksum(&wallet.address(), None))
}

/// Hex signature of [`IDENTITY_MESSAGE`] under `private_key`.
///
/// ECDSA signing in the wallet is deterministic (RFC 6979), so this is
/// stable for a given key.
pub fn identity_signature(private_key: &str) -> Result<String> {
    let wallet = parse_wallet(private_key)?;
    let signature = wallet
        .sign_hash(hash_message(IDENTITY_MESSAGE))
        .map_err(|e| SignalError::InvalidSeed(format!("signing failed: {e}")))?;
    Ok(hex::encode(signature.to_vec()))
}

/// Identity recovered from a wallet private key.
pub fn identity_from_private_key(private_key: &str) -> Result<Identity> {
    Identity::from_signature(&identity_signature(private_key)?)
}
