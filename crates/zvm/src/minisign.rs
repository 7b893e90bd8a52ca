//! Minisign signature verification (§4.6).
//!
//! Only the compiler carries a signature; language-server artifacts skip
//! this step entirely (callers decide that, this module just verifies
//! whatever it is handed).

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use blake2::Digest;
use ed25519_dalek::VerifyingKey;

use crate::error::{Result, ZvmError};

const KEY_BYTES: usize = 2 + 8 + 32;
const SIG_BYTES: usize = 2 + 8 + 64;
const TRUSTED_COMMENT_MAX: usize = 1024;

/// A minisign public key: `algo[2] ‖ key_id[8] ‖ key[32]`, base64-encoded to
/// 56 characters when shipped as a build-time constant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PublicKey {
    pub key_id: [u8; 8],
    pub key: [u8; 32],
}

impl PublicKey {
    pub fn decode(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded.trim())
            .map_err(|e| ZvmError::InvalidEncoding(e.to_string()))?;
        if bytes.len() != KEY_BYTES {
            return Err(ZvmError::InvalidEncoding(format!(
                "public key is {} bytes, expected {KEY_BYTES}",
                bytes.len()
            )));
        }
        let mut key_id = [0u8; 8];
        let mut key = [0u8; 32];
        key_id.copy_from_slice(&bytes[2..10]);
        key.copy_from_slice(&bytes[10..42]);
        Ok(Self { key_id, key })
    }

    pub fn encode(&self) -> String {
        let mut bytes = Vec::with_capacity(KEY_BYTES);
        bytes.extend_from_slice(b"Ed");
        bytes.extend_from_slice(&self.key_id);
        bytes.extend_from_slice(&self.key);
        BASE64.encode(bytes)
    }
}

/// Which payload a signature was computed over.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HashMode {
    /// `algo == "Ed"`: sign the raw artifact bytes.
    Legacy,
    /// `algo == "ED"`: sign the Blake2b-512 digest of the artifact bytes.
    Prehashed,
}

fn hash_mode(algo: [u8; 2]) -> Result<HashMode> {
    match &algo {
        b"Ed" => Ok(HashMode::Legacy),
        b"ED" => Ok(HashMode::Prehashed),
        other => Err(ZvmError::UnsupportedAlgorithm(*other)),
    }
}

/// A parsed minisign `.minisig` file: three lines after an optional
/// `untrusted comment:` prefix line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    algo: [u8; 2],
    key_id: [u8; 8],
    sig: [u8; 64],
    trusted_comment: String,
    global_sig: [u8; 64],
}

impl Signature {
    pub fn decode(text: &str) -> Result<Self> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim_end)
            .filter(|l| !l.starts_with("untrusted comment:"))
            .filter(|l| !l.is_empty())
            .collect();
        if lines.len() != 3 {
            return Err(ZvmError::InvalidEncoding(
                "expected 3 lines (signature, trusted comment, global signature)".into(),
            ));
        }

        let sig_bytes = BASE64
            .decode(lines[0])
            .map_err(|e| ZvmError::InvalidEncoding(e.to_string()))?;
        if sig_bytes.len() != SIG_BYTES {
            return Err(ZvmError::InvalidEncoding(format!(
                "signature line is {} bytes, expected {SIG_BYTES}",
                sig_bytes.len()
            )));
        }
        let mut algo = [0u8; 2];
        let mut key_id = [0u8; 8];
        let mut sig = [0u8; 64];
        algo.copy_from_slice(&sig_bytes[0..2]);
        key_id.copy_from_slice(&sig_bytes[2..10]);
        sig.copy_from_slice(&sig_bytes[10..74]);

        let trusted_comment = lines[1]
            .strip_prefix("trusted comment: ")
            .ok_or_else(|| ZvmError::InvalidEncoding("missing trusted comment line".into()))?
            .to_string();
        if trusted_comment.len() > TRUSTED_COMMENT_MAX {
            return Err(ZvmError::InvalidEncoding("trusted comment too long".into()));
        }

        let global_bytes = BASE64
            .decode(lines[2])
            .map_err(|e| ZvmError::InvalidEncoding(e.to_string()))?;
        if global_bytes.len() != 64 {
            return Err(ZvmError::InvalidEncoding(format!(
                "global signature is {} bytes, expected 64",
                global_bytes.len()
            )));
        }
        let mut global_sig = [0u8; 64];
        global_sig.copy_from_slice(&global_bytes);

        Ok(Self {
            algo,
            key_id,
            sig,
            trusted_comment,
            global_sig,
        })
    }

    pub fn encode(&self) -> String {
        let mut sig_line = Vec::with_capacity(SIG_BYTES);
        sig_line.extend_from_slice(&self.algo);
        sig_line.extend_from_slice(&self.key_id);
        sig_line.extend_from_slice(&self.sig);

        format!(
            "untrusted comment: signature\n{}\ntrusted comment: {}\n{}\n",
            BASE64.encode(sig_line),
            self.trusted_comment,
            BASE64.encode(self.global_sig),
        )
    }
}

/// Verify a minisign signature against the trusted public key:
/// 1. `sig` against the chosen payload (raw bytes or Blake2b-512 digest).
/// 2. `global_sig` against `sig ‖ trusted_comment`.
/// Either failure aborts with `SignatureVerificationFailed`.
pub fn verify(public_key: &PublicKey, signature: &Signature, artifact: &[u8]) -> Result<()> {
    if signature.key_id != public_key.key_id {
        return Err(ZvmError::KeyIdMismatch);
    }

    let mode = hash_mode(signature.algo)?;
    let payload: Vec<u8> = match mode {
        HashMode::Legacy => artifact.to_vec(),
        HashMode::Prehashed => {
            let mut hasher = blake2::Blake2b512::new();
            hasher.update(artifact);
            hasher.finalize().to_vec()
        }
    };

    let verifying_key = VerifyingKey::from_bytes(&public_key.key)
        .map_err(|_| ZvmError::SignatureVerificationFailed)?;

    let artifact_sig = ed25519_dalek::Signature::from_bytes(&signature.sig);
    verifying_key
        .verify_strict(&payload, &artifact_sig)
        .map_err(|_| ZvmError::SignatureVerificationFailed)?;

    let mut global_message = Vec::with_capacity(signature.sig.len() + signature.trusted_comment.len());
    global_message.extend_from_slice(&signature.sig);
    global_message.extend_from_slice(signature.trusted_comment.as_bytes());
    let global_sig = ed25519_dalek::Signature::from_bytes(&signature.global_sig);
    verifying_key
        .verify_strict(&global_message, &global_sig)
        .map_err(|_| ZvmError::SignatureVerificationFailed)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};
    use rand::rngs::OsRng;

    fn make_keypair() -> (SigningKey, PublicKey) {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying = signing_key.verifying_key();
        let public_key = PublicKey {
            key_id: [1, 2, 3, 4, 5, 6, 7, 8],
            key: verifying.to_bytes(),
        };
        (signing_key, public_key)
    }

    fn sign(signing_key: &SigningKey, key_id: [u8; 8], algo: &[u8; 2], data: &[u8], trusted_comment: &str) -> Signature {
        let payload = if algo == b"ED" {
            let mut hasher = blake2::Blake2b512::new();
            hasher.update(data);
            hasher.finalize().to_vec()
        } else {
            data.to_vec()
        };
        let sig = signing_key.sign(&payload);
        let sig_bytes: [u8; 64] = sig.to_bytes();

        let mut global_message = Vec::new();
        global_message.extend_from_slice(&sig_bytes);
        global_message.extend_from_slice(trusted_comment.as_bytes());
        let global_sig = signing_key.sign(&global_message);

        Signature {
            algo: *algo,
            key_id,
            sig: sig_bytes,
            trusted_comment: trusted_comment.to_string(),
            global_sig: global_sig.to_bytes(),
        }
    }

    #[test]
    fn public_key_round_trips() {
        let (_, public_key) = make_keypair();
        let encoded = public_key.encode();
        let decoded = PublicKey::decode(&encoded).unwrap();
        assert_eq!(decoded, public_key);
    }

    #[test]
    fn signature_round_trips_through_text() {
        let (signing_key, public_key) = make_keypair();
        let signature = sign(&signing_key, public_key.key_id, b"Ed", b"artifact bytes", "release notes");
        let text = signature.encode();
        let decoded = Signature::decode(&text).unwrap();
        assert_eq!(decoded, signature);
    }

    #[test]
    fn legacy_signature_verifies() {
        let (signing_key, public_key) = make_keypair();
        let data = b"the artifact";
        let signature = sign(&signing_key, public_key.key_id, b"Ed", data, "notes");
        assert!(verify(&public_key, &signature, data).is_ok());
    }

    #[test]
    fn prehashed_signature_verifies() {
        let (signing_key, public_key) = make_keypair();
        let data = b"the artifact";
        let signature = sign(&signing_key, public_key.key_id, b"ED", data, "notes");
        assert!(verify(&public_key, &signature, data).is_ok());
    }

    #[test]
    fn tampered_signature_fails() {
        let (signing_key, public_key) = make_keypair();
        let data = b"the artifact";
        let mut signature = sign(&signing_key, public_key.key_id, b"Ed", data, "notes");
        signature.sig[0] ^= 0xFF;
        let err = verify(&public_key, &signature, data).unwrap_err();
        assert!(matches!(err, ZvmError::SignatureVerificationFailed));
    }

    #[test]
    fn key_id_mismatch_is_rejected_before_crypto() {
        let (signing_key, public_key) = make_keypair();
        let data = b"the artifact";
        let mut signature = sign(&signing_key, public_key.key_id, b"Ed", data, "notes");
        signature.key_id = [9; 8];
        let err = verify(&public_key, &signature, data).unwrap_err();
        assert!(matches!(err, ZvmError::KeyIdMismatch));
    }

    #[test]
    fn unsupported_algorithm_is_rejected() {
        let (signing_key, public_key) = make_keypair();
        let data = b"the artifact";
        let mut signature = sign(&signing_key, public_key.key_id, b"Ed", data, "notes");
        signature.algo = *b"Xx";
        let err = verify(&public_key, &signature, data).unwrap_err();
        assert!(matches!(err, ZvmError::UnsupportedAlgorithm(_)));
    }
}
