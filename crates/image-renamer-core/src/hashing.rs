/// Content fingerprinting for the analysis cache
use crate::error::Result;

use std::{fs::File, io::Read, path::Path};

/// Compute the content fingerprint of a file using the Blake3 algorithm
///
/// The fingerprint covers the full byte content and is therefore
/// stable across renames; it must be computed before any move.
pub fn compute_fingerprint<P: AsRef<Path>>(path: P) -> Result<String> {
    // Open the file with explicit scope to ensure it's closed promptly
    let hash = {
        let mut file = File::open(&path)?;

        let mut hasher = blake3::Hasher::new();

        // Read the file in chunks and update the hasher
        let mut buffer = [0; 8192]; // 8KB buffer
        loop {
            let bytes_read = file.read(&mut buffer)?;
            if bytes_read == 0 {
                break;
            }
            hasher.update(&buffer[..bytes_read]);
        }

        hasher.finalize()
    };

    Ok(hash.to_hex().to_string())
}

/// Fingerprint a byte slice already in memory
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
