//! Authenticated encryption for opaque blobs.
//!
//! ChaCha20-Poly1305 with a fresh random 96-bit nonce per call. The nonce
//! is prefixed to the ciphertext so it travels with the data; it is never
//! reused under the same key.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use rand::RngCore;

use crate::CryptoError;

/// Nonce size for ChaCha20-Poly1305 (96 bits).
pub const NONCE_SIZE: usize = 12;

/// 256-bit symmetric key for blob encryption.
pub type BlobKey = [u8; 32];

/// Generate a random blob key.
pub fn generate_key() -> BlobKey {
    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    key
}

/// Encrypt a blob. Generates a random key when none is supplied.
///
/// Returns the nonce-prefixed ciphertext and the key in use.
pub fn encrypt_blob(plaintext: &[u8], key: Option<&BlobKey>) -> crate::Result<(Vec<u8>, BlobKey)> {
    let key = key.copied().unwrap_or_else(generate_key);
    let cipher = ChaCha20Poly1305::new((&key).into());

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| CryptoError::Encryption(e.to_string()))?;

    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok((out, key))
}

/// Decrypt a nonce-prefixed blob produced by [`encrypt_blob`].
pub fn decrypt_blob(data: &[u8], key: &BlobKey) -> crate::Result<Vec<u8>> {
    if data.len() < NONCE_SIZE {
        return Err(CryptoError::CiphertextTooShort { len: data.len() });
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_SIZE);
    let cipher = ChaCha20Poly1305::new(key.into());
    cipher
        .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
        .map_err(|e| CryptoError::Decryption(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let plaintext = b"sensitive mission data that must be encrypted";
        let (ciphertext, key) = encrypt_blob(plaintext, None).unwrap();
        assert_ne!(&ciphertext[NONCE_SIZE..], plaintext.as_slice());
        let decrypted = decrypt_blob(&ciphertext, &key).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_nonces_differ_per_call() {
        let key = generate_key();
        let (a, _) = encrypt_blob(b"payload", Some(&key)).unwrap();
        let (b, _) = encrypt_blob(b"payload", Some(&key)).unwrap();
        assert_ne!(a[..NONCE_SIZE], b[..NONCE_SIZE]);
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let (mut ciphertext, key) = encrypt_blob(b"payload", None).unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0xFF;
        assert!(decrypt_blob(&ciphertext, &key).is_err());
    }

    #[test]
    fn test_wrong_key_rejected() {
        let (ciphertext, _) = encrypt_blob(b"payload", None).unwrap();
        let other = generate_key();
        assert!(decrypt_blob(&ciphertext, &other).is_err());
    }

    #[test]
    fn test_short_ciphertext_rejected() {
        let key = generate_key();
        let result = decrypt_blob(&[0u8; 4], &key);
        assert!(matches!(
            result.unwrap_err(),
            CryptoError::CiphertextTooShort { len: 4 }
        ));
    }
}
