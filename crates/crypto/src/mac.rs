//! Keyed message authentication for operator commands.
//!
//! The MAC key is derived from the operator's shared secret with a fixed
//! context string, then applied as a keyed BLAKE3 hash over the canonical
//! payload bytes. Verification compares via `blake3::Hash`, whose equality
//! is constant-time.

const COMMAND_MAC_CONTEXT: &str = "skysentry 2025-06 operator command mac";

fn mac_key(secret: &str) -> [u8; 32] {
    blake3::derive_key(COMMAND_MAC_CONTEXT, secret.as_bytes())
}

/// Compute the hex MAC a sender attaches to a command payload.
pub fn command_mac(secret: &str, payload: &[u8]) -> String {
    blake3::keyed_hash(&mac_key(secret), payload)
        .to_hex()
        .to_string()
}

/// Verify a hex MAC against the canonical payload bytes.
///
/// Returns false on malformed hex rather than erroring; a bad MAC is a
/// rejection, not a fault.
pub fn verify_command_mac(secret: &str, payload: &[u8], provided_hex: &str) -> bool {
    let expected = blake3::keyed_hash(&mac_key(secret), payload);
    match blake3::Hash::from_hex(provided_hex) {
        Ok(provided) => expected == provided,
        Err(_) => false,
    }
}
