//! Operator credential hashing.
//!
//! Secrets are stored only as keyed BLAKE3 digests under a dedicated
//! derivation context; verification recomputes the digest and compares in
//! constant time. Plaintext secrets never touch disk.

const CREDENTIAL_CONTEXT: &str = "skysentry 2025-06 operator credential";

/// Hash an operator secret for storage.
pub fn hash_secret(secret: &str) -> String {
    let digest = blake3::derive_key(CREDENTIAL_CONTEXT, secret.as_bytes());
    hex::encode(digest)
}

/// Constant-time verification of a presented secret against a stored hash.
pub fn verify_secret(secret: &str, stored_hex: &str) -> bool {
    let computed = blake3::Hash::from(blake3::derive_key(CREDENTIAL_CONTEXT, secret.as_bytes()));
    match blake3::Hash::from_hex(stored_hex) {
        Ok(stored) => computed == stored,
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verify_matches() {
        let stored = hash_secret("high-entropy-secret");
        assert!(verify_secret("high-entropy-secret", &stored));
    }

    #[test]
    fn test_verify_rejects_wrong_secret() {
        let stored = hash_secret("high-entropy-secret");
        assert!(!verify_secret("wrong", &stored));
    }

    #[test]
    fn test_hash_is_not_plaintext() {
        let stored = hash_secret("high-entropy-secret");
        assert!(!stored.contains("high-entropy-secret"));
        assert_eq!(stored.len(), 64);
    }

    #[test]
    fn test_corrupt_stored_hash_rejected() {
        assert!(!verify_secret("anything", "zz-not-hex"));
    }
}
