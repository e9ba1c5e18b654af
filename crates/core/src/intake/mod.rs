//! Upload intake: filename contract and content integrity.
//!
//! Every uploaded ledger must be named `<tax-id>_<label>_<YYYYMM>.<ext>`.
//! Checks here are side-effect free so the pipeline may retry them freely.

mod error;
mod filename;

pub use error::IntakeError;
pub use filename::{LedgerFileName, SUPPORTED_EXTENSIONS};

use sha2::{Digest, Sha256};

/// Hashes file contents for integrity checks (lowercase hex SHA-256).
#[must_use]
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Verifies stored bytes are non-empty and match the hash recorded at intake.
///
/// # Errors
///
/// Returns `IntakeError::EmptyFile` or `IntakeError::HashMismatch`.
pub fn verify_content(bytes: &[u8], expected_hash: &str) -> Result<(), IntakeError> {
    if bytes.is_empty() {
        return Err(IntakeError::EmptyFile);
    }
    let actual = content_hash(bytes);
    if !actual.eq_ignore_ascii_case(expected_hash) {
        return Err(IntakeError::HashMismatch {
            expected: expected_hash.to_string(),
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_hash_is_stable_hex() {
        let hash = content_hash(b"ledger");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, content_hash(b"ledger"));
        assert_ne!(hash, content_hash(b"ledger2"));
    }

    #[test]
    fn test_verify_content() {
        let bytes = b"FECHA;DEBE;HABER";
        let hash = content_hash(bytes);
        assert!(verify_content(bytes, &hash).is_ok());
        assert!(verify_content(bytes, &hash.to_uppercase()).is_ok());
        assert!(matches!(
            verify_content(b"tampered", &hash),
            Err(IntakeError::HashMismatch { .. })
        ));
        assert!(matches!(
            verify_content(b"", &hash),
            Err(IntakeError::EmptyFile)
        ));
    }
}
