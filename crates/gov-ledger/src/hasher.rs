// hasher.rs — SHA-256 hashing helpers.
//
// Every digest in the governance core is SHA-256, hex-encoded lowercase:
// receipt payloads, chain links, export manifests. Keeping one helper
// module means the encoding can never drift between producers.

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::LedgerError;

/// Hash arbitrary bytes to a lowercase hex SHA-256 string.
pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

/// Hash a UTF-8 string.
pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Hash the contents of a file on disk.
pub fn hash_file(path: &Path) -> Result<String, LedgerError> {
    let data = std::fs::read(path).map_err(|source| LedgerError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(hash_bytes(&data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic() {
        assert_eq!(hash_bytes(b"receipt"), hash_bytes(b"receipt"));
    }

    #[test]
    fn distinct_inputs_distinct_digests() {
        assert_ne!(hash_str("a"), hash_str("b"));
    }

    #[test]
    fn known_empty_digest() {
        assert_eq!(
            hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn file_hash_matches_content_hash() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        std::fs::write(&path, b"payload").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"payload"));
    }
}
