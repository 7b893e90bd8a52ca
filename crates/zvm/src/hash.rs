//! Integrity checks (§4.6): SHA-256 digest and declared-size comparison.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::error::{Result, ZvmError};

/// Streaming SHA-256 over `bytes`, compared constant-time against the
/// manifest's hex-decoded expected digest.
pub fn verify_sha256(version: &str, bytes: &[u8], expected_hex: &str) -> Result<()> {
    let expected = hex::decode(expected_hex)
        .map_err(|_| ZvmError::InvalidEncoding(format!("bad sha256 hex: {expected_hex}")))?;

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let actual: [u8; 32] = hasher.finalize().into();

    if expected.len() != actual.len() || actual.ct_eq(&expected).unwrap_u8() != 1 {
        return Err(ZvmError::HashMismatch {
            version: version.to_string(),
            expected: expected_hex.to_string(),
            actual: hex::encode(actual),
        });
    }
    Ok(())
}

/// If a `Content-Length` was observed, it must equal the manifest's declared
/// size.
pub fn verify_size(content_length: Option<u64>, declared: u64) -> Result<()> {
    if let Some(actual) = content_length {
        if actual != declared {
            return Err(ZvmError::IncorrectSize {
                expected: declared,
                actual,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_digest_passes() {
        let data = b"hello world";
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hex::encode(hasher.finalize());
        assert!(verify_sha256("1.0.0", data, &digest).is_ok());
    }

    #[test]
    fn one_flipped_byte_fails() {
        let data = b"hello world";
        let mut hasher = Sha256::new();
        hasher.update(data);
        let digest = hex::encode(hasher.finalize());
        let err = verify_sha256("1.0.0", b"hello worlD", &digest).unwrap_err();
        assert!(matches!(err, ZvmError::HashMismatch { .. }));
    }

    #[test]
    fn size_mismatch_is_reported() {
        assert!(verify_size(Some(10), 10).is_ok());
        assert!(matches!(
            verify_size(Some(11), 10),
            Err(ZvmError::IncorrectSize { .. })
        ));
        assert!(verify_size(None, 10).is_ok());
    }
}
