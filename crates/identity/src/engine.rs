//! Identity-bound cryptographic engine.
//!
//! The engine is the single signing surface for the rest of the platform:
//! findings and audit entries are signed here, inbound operator commands
//! are verified here. Signatures are hex-encoded Ed25519.

use ed25519_dalek::Signature;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use skysentry_core::unix_millis;
use skysentry_crypto::mac;

use crate::error::Result;
use crate::identity::DroneIdentity;

/// Why an inbound command was rejected. The first failing check wins.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandRejection {
    #[error("invalid_operator")]
    InvalidOperator,

    #[error("invalid_timestamp")]
    InvalidTimestamp,

    #[error("command_expired (age={age_ms}ms)")]
    Expired { age_ms: u64 },

    #[error("invalid_mac")]
    MacMismatch,
}

/// Cryptographic operations bound to one drone identity.
pub struct CryptoEngine {
    identity: Arc<DroneIdentity>,
}

impl CryptoEngine {
    pub fn new(identity: Arc<DroneIdentity>) -> Self {
        Self { identity }
    }

    pub fn identity(&self) -> &DroneIdentity {
        &self.identity
    }

    /// Sign data with the device key; returns the hex signature.
    pub fn sign_data(&self, data: &[u8]) -> Result<String> {
        let signature = self.identity.sign(data)?;
        Ok(hex::encode(signature.to_bytes()))
    }

    /// Verify a hex signature. Malformed input is a failed verification,
    /// never an error.
    pub fn verify_signature(&self, data: &[u8], signature_hex: &str) -> bool {
        let Ok(bytes) = hex::decode(signature_hex) else {
            return false;
        };
        let Ok(sig_bytes) = <[u8; 64]>::try_from(bytes.as_slice()) else {
            return false;
        };
        self.identity.verify(data, &Signature::from_bytes(&sig_bytes))
    }

    /// Verify an inbound operator command.
    ///
    /// Checks, in order: the operator credential, freshness of the
    /// payload's embedded `timestamp` (unix milliseconds) against
    /// `max_age`, and the MAC over the canonical key-sorted JSON encoding
    /// of the payload. All three must pass.
    pub fn verify_command(
        &self,
        payload: &serde_json::Value,
        operator_id: &str,
        secret: &str,
        provided_mac: &str,
        max_age: Duration,
    ) -> std::result::Result<(), CommandRejection> {
        if !self.identity.verify_operator(operator_id, secret) {
            return Err(CommandRejection::InvalidOperator);
        }

        let Some(timestamp) = payload.get("timestamp").and_then(serde_json::Value::as_u64)
        else {
            return Err(CommandRejection::InvalidTimestamp);
        };
        let age_ms = unix_millis().abs_diff(timestamp);
        if age_ms > max_age.as_millis() as u64 {
            return Err(CommandRejection::Expired { age_ms });
        }

        let canonical = canonical_payload_bytes(payload);
        if !mac::verify_command_mac(secret, &canonical, provided_mac) {
            return Err(CommandRejection::MacMismatch);
        }

        Ok(())
    }
}

/// Canonical encoding of a command payload for MAC computation.
///
/// serde_json maps are key-sorted, so serialization is deterministic for
/// any field order the sender used.
pub fn canonical_payload_bytes(payload: &serde_json::Value) -> Vec<u8> {
    serde_json::to_vec(payload).unwrap_or_default()
}
