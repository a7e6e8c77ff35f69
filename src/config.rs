//! Runtime settings read from the environment.
//!
//! | Variable | Default |
//! |---|---|
//! | `HEPATORISK_MODEL_DIR` | `models` |
//! | `HEPATORISK_REQUIRE_SIGNED_ARTIFACTS` | `false` |
//! | `HEPATORISK_ARTIFACT_PUBKEY_B64_FILE` | unset |
//! | `HEPATORISK_LOG_MODE` | `console` (stderr); `file` writes to the log file |
//! | `HEPATORISK_LOG_FILE` | `hepatorisk.log` |

use std::fs;
use std::path::{Path, PathBuf};

use crate::adapters::artifact::manifest::verifying_key_from_b64;
use crate::adapters::{ArtifactError, ArtifactPolicy};

pub const MODEL_DIR_ENV: &str = "HEPATORISK_MODEL_DIR";
pub const REQUIRE_SIGNED_ENV: &str = "HEPATORISK_REQUIRE_SIGNED_ARTIFACTS";
pub const PUBKEY_FILE_ENV: &str = "HEPATORISK_ARTIFACT_PUBKEY_B64_FILE";
pub const LOG_MODE_ENV: &str = "HEPATORISK_LOG_MODE";
pub const LOG_FILE_ENV: &str = "HEPATORISK_LOG_FILE";

const DOCKER_SECRET_PUBKEY: &str = "/run/secrets/hepatorisk_artifact_pubkey_b64";

/// Where log output goes.
///
/// Console logs go to stderr; stdout carries reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    Console,
    File,
}

impl LogMode {
    fn parse(value: &str) -> Self {
        match value.trim() {
            "file" => Self::File,
            _ => Self::Console,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub model_dir: PathBuf,
    pub require_signed_artifacts: bool,
    pub pubkey_file: Option<PathBuf>,
    pub log_mode: LogMode,
    pub log_file: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            require_signed_artifacts: false,
            pubkey_file: None,
            log_mode: LogMode::Console,
            log_file: PathBuf::from("hepatorisk.log"),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build settings from any variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        Self {
            model_dir: non_empty(MODEL_DIR_ENV)
                .map(|v| PathBuf::from(v.trim()))
                .unwrap_or(defaults.model_dir),
            require_signed_artifacts: lookup(REQUIRE_SIGNED_ENV)
                .as_deref()
                .is_some_and(parse_bool),
            pubkey_file: non_empty(PUBKEY_FILE_ENV).map(|v| PathBuf::from(v.trim())),
            log_mode: lookup(LOG_MODE_ENV)
                .as_deref()
                .map_or(LogMode::Console, LogMode::parse),
            log_file: non_empty(LOG_FILE_ENV)
                .map(|v| PathBuf::from(v.trim()))
                .unwrap_or(defaults.log_file),
        }
    }

    /// Artifact checks to run at startup.
    ///
    /// The verifying key comes from the configured file, else from the
    /// Docker secret when it exists.
    ///
    /// # Errors
    /// Fails when the key file cannot be read or holds an invalid key.
    pub fn artifact_policy(&self) -> Result<ArtifactPolicy, ArtifactError> {
        let key_path = match &self.pubkey_file {
            Some(path) => Some(path.clone()),
            None => Some(PathBuf::from(DOCKER_SECRET_PUBKEY)).filter(|p| p.exists()),
        };
        let verifying_key = match key_path {
            Some(path) => Some(read_verifying_key(&path)?),
            None => None,
        };
        Ok(ArtifactPolicy {
            require_signature: self.require_signed_artifacts,
            verifying_key,
        })
    }
}

fn read_verifying_key(path: &Path) -> Result<ed25519_dalek::VerifyingKey, ArtifactError> {
    let b64 = fs::read_to_string(path).map_err(|e| ArtifactError::io(path, e))?;
    verifying_key_from_b64(&b64)
}

/// Boolean flags accept `1`, `true` and `yes`.
fn parse_bool(value: &str) -> bool {
    matches!(value.trim(), "1" | "true" | "TRUE" | "yes" | "YES")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use ed25519_dalek::SigningKey;
    use rand::rngs::OsRng;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn settings(vars: &[(&str, &str)]) -> Settings {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Settings::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        assert_eq!(settings(&[]), Settings::default());
        assert_eq!(Settings::default().model_dir, PathBuf::from("models"));
    }

    #[test]
    fn test_overrides() {
        let s = settings(&[
            (MODEL_DIR_ENV, "/srv/models"),
            (REQUIRE_SIGNED_ENV, "yes"),
            (LOG_MODE_ENV, "stdout"),
            (LOG_FILE_ENV, " "),
        ]);
        assert_eq!(s.model_dir, PathBuf::from("/srv/models"));
        assert!(s.require_signed_artifacts);
        assert_eq!(s.log_mode, LogMode::Console);
        assert_eq!(s.log_file, PathBuf::from("hepatorisk.log"));
    }

    #[test]
    fn test_bool_parsing() {
        assert!(parse_bool("1"));
        assert!(parse_bool("TRUE"));
        assert!(!parse_bool("no"));
        assert!(!parse_bool("True"));
    }

    #[test]
    fn test_log_mode_defaults_to_console() {
        assert_eq!(settings(&[]).log_mode, LogMode::Console);
        assert_eq!(settings(&[(LOG_MODE_ENV, "auto")]).log_mode, LogMode::Console);
        assert_eq!(settings(&[(LOG_MODE_ENV, " file ")]).log_mode, LogMode::File);
    }

    #[test]
    fn test_policy_reads_pubkey_file() {
        let dir = tempdir().expect("tempdir");
        let key = SigningKey::generate(&mut OsRng);
        let path = dir.path().join("pub.b64");
        let b64 = base64::engine::general_purpose::STANDARD.encode(key.verifying_key().as_bytes());
        fs::write(&path, format!("{b64}\n")).expect("write");

        let s = Settings {
            pubkey_file: Some(path),
            require_signed_artifacts: true,
            ..Settings::default()
        };
        let policy = s.artifact_policy().expect("policy");
        assert!(policy.require_signature);
        assert_eq!(policy.verifying_key, Some(key.verifying_key()));
    }

    #[test]
    fn test_policy_rejects_bad_pubkey() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("pub.b64");
        fs::write(&path, "not base64!").expect("write");
        let s = Settings {
            pubkey_file: Some(path),
            ..Settings::default()
        };
        assert!(matches!(s.artifact_policy(), Err(ArtifactError::Signature(_))));
    }
}
