//! BLAKE3 content hashing for evidence and chain linkage.

use std::io::Read;
use std::path::Path;

/// Hex BLAKE3 digest of a byte slice.
pub fn hash_bytes(data: &[u8]) -> String {
    blake3::hash(data).to_hex().to_string()
}

/// Hex BLAKE3 digest of a file, read in 8 KiB chunks.
pub fn hash_file(path: impl AsRef<Path>) -> crate::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}
