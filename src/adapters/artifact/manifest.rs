//! Artifact manifest and signature checks.
//!
//! An artifact directory may carry:
//! - `manifest.json`: SHA-256 of every artifact file
//! - `manifest.sig`: raw 64-byte Ed25519 signature over the manifest bytes
//!
//! When a manifest is present, each artifact is hashed against it before it
//! is parsed. When a signature is present it is checked against the
//! configured verifying key. [`ArtifactPolicy::require_signature`] turns a
//! missing signature into a hard failure for the whole directory.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use base64::Engine;
use chrono::{DateTime, Utc};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::ArtifactError;

pub const MANIFEST_FILE: &str = "manifest.json";
pub const SIGNATURE_FILE: &str = "manifest.sig";
pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactManifest {
    pub version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    /// File name to lowercase hex SHA-256.
    pub files: BTreeMap<String, String>,
}

/// How strictly an artifact directory is checked.
#[derive(Debug, Clone, Default)]
pub struct ArtifactPolicy {
    pub require_signature: bool,
    pub verifying_key: Option<VerifyingKey>,
}

/// A manifest that passed every directory-level check.
#[derive(Debug, Clone)]
pub struct VerifiedManifest {
    pub manifest: ArtifactManifest,
    pub signed: bool,
}

impl VerifiedManifest {
    /// Check one artifact's bytes against its manifest entry.
    ///
    /// # Errors
    /// `NotInManifest` if the file is unlisted, `HashMismatch` if the digest
    /// differs.
    pub fn check_file(&self, name: &str, bytes: &[u8]) -> Result<(), ArtifactError> {
        let expected = self
            .manifest
            .files
            .get(name)
            .ok_or_else(|| ArtifactError::NotInManifest(name.to_string()))?;
        if !constant_time_eq_str(&sha256_hex_bytes(bytes), &expected.to_ascii_lowercase()) {
            return Err(ArtifactError::HashMismatch(name.to_string()));
        }
        Ok(())
    }
}

#[must_use]
pub fn sha256_hex_bytes(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

// Constant-time compare for ASCII strings (used for SHA-256 hex digests).
fn constant_time_eq_str(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff: u8 = 0;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes().iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Decode a base64 Ed25519 verifying key.
///
/// # Errors
/// Returns `ArtifactError::Signature` on bad base64, length, or curve point.
pub fn verifying_key_from_b64(b64: &str) -> Result<VerifyingKey, ArtifactError> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(b64.trim())
        .map_err(|_| ArtifactError::Signature("invalid public key base64".into()))?;
    let pubkey: [u8; 32] = bytes
        .as_slice()
        .try_into()
        .map_err(|_| ArtifactError::Signature("invalid public key length (expected 32 bytes)".into()))?;
    VerifyingKey::from_bytes(&pubkey)
        .map_err(|_| ArtifactError::Signature("invalid verifying key".into()))
}

/// Run the directory-level checks.
///
/// Returns `Ok(None)` for a directory without a manifest (allowed unless a
/// signature is required).
///
/// # Errors
/// Any error here makes every model in the directory unavailable.
pub fn verify_directory(
    dir: &Path,
    policy: &ArtifactPolicy,
) -> Result<Option<VerifiedManifest>, ArtifactError> {
    let manifest_path = dir.join(MANIFEST_FILE);
    let sig_path = dir.join(SIGNATURE_FILE);

    if !manifest_path.exists() {
        if policy.require_signature {
            return Err(ArtifactError::Signature(format!(
                "signed artifacts required but {MANIFEST_FILE} is missing"
            )));
        }
        tracing::info!("No {MANIFEST_FILE} in {dir:?}; artifact hashes not checked");
        return Ok(None);
    }

    let manifest_bytes = fs::read(&manifest_path).map_err(|e| ArtifactError::io(&manifest_path, e))?;

    let signed = if sig_path.exists() {
        let Some(key) = policy.verifying_key.as_ref() else {
            if policy.require_signature {
                return Err(ArtifactError::Signature(
                    "signed artifacts required but no verifying key is configured".into(),
                ));
            }
            tracing::warn!("{SIGNATURE_FILE} present but no verifying key configured; signature not checked");
            return parse_manifest(&manifest_bytes).map(|manifest| {
                Some(VerifiedManifest {
                    manifest,
                    signed: false,
                })
            });
        };
        let sig_bytes = fs::read(&sig_path).map_err(|e| ArtifactError::io(&sig_path, e))?;
        let sig: [u8; 64] = sig_bytes
            .as_slice()
            .try_into()
            .map_err(|_| ArtifactError::Signature("invalid signature length (expected 64 bytes)".into()))?;
        key.verify(&manifest_bytes, &Signature::from_bytes(&sig))
            .map_err(|_| ArtifactError::Signature("manifest signature does not verify".into()))?;
        true
    } else if policy.require_signature {
        return Err(ArtifactError::Signature(format!(
            "signed artifacts required but {SIGNATURE_FILE} is missing"
        )));
    } else {
        false
    };

    let manifest = parse_manifest(&manifest_bytes)?;
    if signed {
        tracing::info!("Artifact manifest signature verified ({} files)", manifest.files.len());
    }
    Ok(Some(VerifiedManifest { manifest, signed }))
}

fn parse_manifest(bytes: &[u8]) -> Result<ArtifactManifest, ArtifactError> {
    let manifest: ArtifactManifest = serde_json::from_slice(bytes)
        .map_err(|e| ArtifactError::Manifest(format!("invalid {MANIFEST_FILE}: {e}")))?;
    if manifest.version != MANIFEST_VERSION {
        return Err(ArtifactError::Manifest(format!(
            "unsupported manifest version {}",
            manifest.version
        )));
    }
    if manifest.files.is_empty() {
        return Err(ArtifactError::Manifest(format!("{MANIFEST_FILE} lists no files")));
    }
    Ok(manifest)
}

/// Hash the named files in `dir` into a fresh manifest.
///
/// # Errors
/// Fails if any file is unreadable or a name escapes the directory.
pub fn build_manifest(dir: &Path, names: &[String]) -> Result<ArtifactManifest, ArtifactError> {
    let mut files = BTreeMap::new();
    for name in names {
        if name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return Err(ArtifactError::Manifest(format!("refusing to hash {name:?}")));
        }
        let path = dir.join(name);
        let bytes = fs::read(&path).map_err(|e| ArtifactError::io(&path, e))?;
        files.insert(name.clone(), sha256_hex_bytes(&bytes));
    }
    Ok(ArtifactManifest {
        version: MANIFEST_VERSION,
        created_at: Some(Utc::now()),
        files,
    })
}

/// Write `manifest.json` (and `manifest.sig` when a key is given).
///
/// Returns the exact manifest bytes written, which are the signed bytes.
///
/// # Errors
/// Fails on serialization or write errors.
pub fn write_manifest(
    dir: &Path,
    manifest: &ArtifactManifest,
    signing_key: Option<&SigningKey>,
) -> Result<Vec<u8>, ArtifactError> {
    let bytes = serde_json::to_vec_pretty(manifest)?;
    let manifest_path = dir.join(MANIFEST_FILE);
    fs::write(&manifest_path, &bytes).map_err(|e| ArtifactError::io(&manifest_path, e))?;
    if let Some(key) = signing_key {
        let signature = key.sign(&bytes);
        let sig_path = dir.join(SIGNATURE_FILE);
        fs::write(&sig_path, signature.to_bytes()).map_err(|e| ArtifactError::io(&sig_path, e))?;
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use tempfile::tempdir;

    fn write_artifacts(dir: &Path) -> Vec<String> {
        fs::write(dir.join("cirrhosis.json"), b"{\"a\":1}").expect("write");
        fs::write(dir.join("hcc.json"), b"{\"b\":2}").expect("write");
        vec!["cirrhosis.json".to_string(), "hcc.json".to_string()]
    }

    #[test]
    fn test_no_manifest_is_allowed_by_default() {
        let dir = tempdir().expect("tempdir");
        let result = verify_directory(dir.path(), &ArtifactPolicy::default()).expect("ok");
        assert!(result.is_none());
    }

    #[test]
    fn test_no_manifest_fails_when_signature_required() {
        let dir = tempdir().expect("tempdir");
        let policy = ArtifactPolicy {
            require_signature: true,
            verifying_key: None,
        };
        assert!(matches!(
            verify_directory(dir.path(), &policy),
            Err(ArtifactError::Signature(_))
        ));
    }

    #[test]
    fn test_unsigned_manifest_detects_hash_mismatch() {
        let dir = tempdir().expect("tempdir");
        let names = write_artifacts(dir.path());
        let manifest = build_manifest(dir.path(), &names).expect("manifest");
        write_manifest(dir.path(), &manifest, None).expect("write manifest");

        let verified = verify_directory(dir.path(), &ArtifactPolicy::default())
            .expect("verify")
            .expect("manifest present");
        assert!(!verified.signed);
        assert!(verified.check_file("cirrhosis.json", b"{\"a\":1}").is_ok());
        assert!(matches!(
            verified.check_file("cirrhosis.json", b"{\"a\":2}"),
            Err(ArtifactError::HashMismatch(_))
        ));
        assert!(matches!(
            verified.check_file("mafld.json", b"{}"),
            Err(ArtifactError::NotInManifest(_))
        ));
    }

    #[test]
    fn test_signed_manifest_round_trip() {
        let dir = tempdir().expect("tempdir");
        let names = write_artifacts(dir.path());
        let signing_key = SigningKey::generate(&mut OsRng);
        let manifest = build_manifest(dir.path(), &names).expect("manifest");
        write_manifest(dir.path(), &manifest, Some(&signing_key)).expect("write manifest");

        let policy = ArtifactPolicy {
            require_signature: true,
            verifying_key: Some(signing_key.verifying_key()),
        };
        let verified = verify_directory(dir.path(), &policy)
            .expect("verify")
            .expect("manifest present");
        assert!(verified.signed);
        assert_eq!(verified.manifest.files.len(), 2);
    }

    #[test]
    fn test_wrong_key_rejected() {
        let dir = tempdir().expect("tempdir");
        let names = write_artifacts(dir.path());
        let signing_key = SigningKey::generate(&mut OsRng);
        let other_key = SigningKey::generate(&mut OsRng);
        let manifest = build_manifest(dir.path(), &names).expect("manifest");
        write_manifest(dir.path(), &manifest, Some(&signing_key)).expect("write manifest");

        let policy = ArtifactPolicy {
            require_signature: false,
            verifying_key: Some(other_key.verifying_key()),
        };
        assert!(matches!(
            verify_directory(dir.path(), &policy),
            Err(ArtifactError::Signature(_))
        ));
    }

    #[test]
    fn test_tampered_manifest_rejected() {
        let dir = tempdir().expect("tempdir");
        let names = write_artifacts(dir.path());
        let signing_key = SigningKey::generate(&mut OsRng);
        let manifest = build_manifest(dir.path(), &names).expect("manifest");
        write_manifest(dir.path(), &manifest, Some(&signing_key)).expect("write manifest");

        let mut tampered = manifest.clone();
        tampered
            .files
            .insert("cirrhosis.json".into(), sha256_hex_bytes(b"evil"));
        fs::write(
            dir.path().join(MANIFEST_FILE),
            serde_json::to_vec_pretty(&tampered).expect("serialize"),
        )
        .expect("write");

        let policy = ArtifactPolicy {
            require_signature: true,
            verifying_key: Some(signing_key.verifying_key()),
        };
        assert!(verify_directory(dir.path(), &policy).is_err());
    }

    #[test]
    fn test_verifying_key_b64() {
        let signing_key = SigningKey::generate(&mut OsRng);
        let b64 = base64::engine::general_purpose::STANDARD.encode(signing_key.verifying_key().to_bytes());
        let key = verifying_key_from_b64(&format!("{b64}\n")).expect("decode");
        assert_eq!(key, signing_key.verifying_key());
        assert!(verifying_key_from_b64("AAAA").is_err());
    }

    #[test]
    fn test_constant_time_eq_str() {
        assert!(constant_time_eq_str("abc", "abc"));
        assert!(!constant_time_eq_str("abc", "abd"));
        assert!(!constant_time_eq_str("abc", "abcd"));
    }
}
