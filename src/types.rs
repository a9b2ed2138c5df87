//! Wire types for signal submission.
//!
//! Field elements travel as 32-byte big-endian hex strings. Requests are
//! decoded strictly: unknown fields are rejected rather than ignored.

use crate::error::SignalError;
use crate::events::AcceptedSignal;
use crate::proving::Proof;
use crate::utils::field_to_hex;
use crate::witness::PublicInputs;
use serde::{Deserialize, Serialize};

/// A signal as submitted by a client.
///
/// `merkle_root` and `external_nullifier` may be omitted, in which case the
/// verifier substitutes its current root and configured external nullifier.
/// A proof built against different values then fails verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SignalRequest {
    pub message: String,
    pub nullifier_hash: String,
    pub proof: Proof,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merkle_root: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_nullifier: Option<String>,
}

impl SignalRequest {
    /// Fully specified request for a proof over `public`.
    #[must_use]
    pub fn new(message: impl Into<String>, public: &PublicInputs, proof: Proof) -> Self {
        Self {
            message: message.into(),
            nullifier_hash: field_to_hex(public.nullifier_hash),
            proof,
            merkle_root: Some(field_to_hex(public.root)),
            external_nullifier: Some(field_to_hex(public.external_nullifier)),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, SignalError> {
        serde_json::from_str(json)
            .map_err(|e| SignalError::MalformedInput(format!("invalid signal request: {e}")))
    }

    pub fn to_json(&self) -> Result<String, SignalError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| SignalError::MalformedInput(format!("cannot encode request: {e}")))
    }
}

/// Outcome of a submission.
///
/// `retryable` is false only when resubmitting can never succeed, i.e. the
/// nullifier has already been used.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignalResponse {
    pub accepted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub retryable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<AcceptedSignal>,
}

impl SignalResponse {
    #[must_use]
    pub fn accepted(event: AcceptedSignal) -> Self {
        Self {
            accepted: true,
            reason: None,
            retryable: false,
            event: Some(event),
        }
    }

    #[must_use]
    pub fn rejected(error: &SignalError) -> Self {
        Self {
            accepted: false,
            reason: Some(error.to_string()),
            retryable: error.is_retryable(),
            event: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pasta_curves::pallas;

    fn public() -> PublicInputs {
        PublicInputs {
            root: pallas::Base::from(10u64),
            nullifier_hash: pallas::Base::from(20u64),
            signal_hash: pallas::Base::from(30u64),
            external_nullifier: pallas::Base::one(),
        }
    }

    #[test]
    fn test_request_json_shape() {
        let request = SignalRequest::new("hello", &public(), Proof(vec![1, 2, 3]));
        let json: serde_json::Value =
            serde_json::from_str(&request.to_json().unwrap()).unwrap();
        assert_eq!(json["message"], "hello");
        assert_eq!(json["proof"], "010203");
        assert_eq!(
            json["external_nullifier"].as_str().unwrap(),
            field_to_hex(pallas::Base::one())
        );
        assert_eq!(SignalRequest::from_json(&request.to_json().unwrap()).unwrap(), request);
    }

    #[test]
    fn test_optional_fields_may_be_omitted() {
        let request = SignalRequest::from_json(
            r#"{"message": "hi", "nullifier_hash": "00", "proof": "ab"}"#,
        )
        .unwrap();
        assert!(request.merkle_root.is_none());
        assert!(request.external_nullifier.is_none());
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let result = SignalRequest::from_json(
            r#"{"message": "hi", "nullifier_hash": "00", "proof": "ab", "leaf_index": 3}"#,
        );
        assert!(matches!(result, Err(SignalError::MalformedInput(_))));
    }

    #[test]
    fn test_rejection_carries_retryability() {
        let duplicate = SignalResponse::rejected(&SignalError::DuplicateNullifier("ab".into()));
        assert!(!duplicate.accepted);
        assert!(!duplicate.retryable);

        let stale = SignalResponse::rejected(&SignalError::StaleOrUnknownRoot("cd".into()));
        assert!(stale.retryable);
        assert!(stale.reason.unwrap().contains("stale"));
    }
}
