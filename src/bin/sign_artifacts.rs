//! Artifact signing utility.
//!
//! Writes `manifest.json` (SHA-256 of every disease artifact present in the
//! directory) and `manifest.sig` (Ed25519 signature over the manifest bytes).
//!
//! # Usage
//!
//! ```bash
//! sign_artifacts generate-key --out-seed <path> [--out-pub <path>] [--force]
//! sign_artifacts sign <model_dir> [--key-file <path>] [--unsigned]
//! ```
//!
//! The signing seed is read from `--key-file`, else from
//! `HEPATORISK_ARTIFACT_SIGNING_KEY_B64_FILE`. Seed material is zeroized
//! after use and never printed.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose;
use base64::Engine;
use clap::{Parser, Subcommand};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

use hepatorisk::adapters::artifact::manifest::{build_manifest, sha256_hex_bytes, write_manifest};
use hepatorisk::domain::Disease;

const KEY_FILE_ENV: &str = "HEPATORISK_ARTIFACT_SIGNING_KEY_B64_FILE";

#[derive(Parser, Debug)]
#[command(name = "sign_artifacts", about = "Hash and sign model artifacts")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate an Ed25519 signing seed
    GenerateKey {
        #[arg(long)]
        out_seed: PathBuf,
        #[arg(long)]
        out_pub: Option<PathBuf>,
        #[arg(long)]
        force: bool,
    },
    /// Write manifest.json and manifest.sig for a model directory
    Sign {
        model_dir: PathBuf,
        #[arg(long)]
        key_file: Option<PathBuf>,
        /// Write only the hash manifest
        #[arg(long)]
        unsigned: bool,
    },
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct Seed([u8; 32]);

fn read_signing_seed(key_file: Option<&Path>) -> Result<Seed> {
    let path = match key_file {
        Some(p) => p.to_path_buf(),
        None => std::env::var(KEY_FILE_ENV)
            .map(|v| PathBuf::from(v.trim()))
            .with_context(|| format!("missing signing key: pass --key-file or set {KEY_FILE_ENV}"))?,
    };
    let content = Zeroizing::new(
        fs::read_to_string(&path).with_context(|| format!("failed reading signing key {path:?}"))?,
    );
    let raw = Zeroizing::new(
        general_purpose::STANDARD
            .decode(content.trim())
            .context("invalid base64 in signing key")?,
    );
    if raw.len() != 32 {
        bail!(
            "signing key seed must be 32 bytes after base64 decode (got {})",
            raw.len()
        );
    }
    let mut seed = Seed([0u8; 32]);
    seed.0.copy_from_slice(&raw);
    Ok(seed)
}

fn open_new(path: &Path, force: bool, mode: u32) -> Result<fs::File> {
    if path.exists() && !force {
        bail!("refusing to overwrite existing file {path:?}, use --force");
    }
    if let Some(parent) = path.parent() {
        let _ = fs::create_dir_all(parent);
    }
    let mut opts = fs::OpenOptions::new();
    opts.write(true).create(true).truncate(true);
    #[cfg(unix)]
    opts.mode(mode);
    #[cfg(not(unix))]
    let _ = mode;
    opts.open(path).with_context(|| format!("failed to open {path:?}"))
}

fn generate_key(out_seed: &Path, out_pub: Option<&Path>, force: bool) -> Result<()> {
    let mut seed = Seed([0u8; 32]);
    OsRng.fill_bytes(&mut seed.0);
    let verifying_key = SigningKey::from_bytes(&seed.0).verifying_key();

    let seed_b64 = Zeroizing::new(general_purpose::STANDARD.encode(seed.0));
    let pub_b64 = general_purpose::STANDARD.encode(verifying_key.as_bytes());

    let mut file = open_new(out_seed, force, 0o600)?;
    file.write_all(seed_b64.as_bytes())?;
    file.write_all(b"\n")?;
    println!("Wrote signing seed (base64) to {out_seed:?}");

    if let Some(pub_path) = out_pub {
        let mut file = open_new(pub_path, force, 0o644)?;
        file.write_all(pub_b64.as_bytes())?;
        file.write_all(b"\n")?;
        println!("Wrote public key (base64) to {pub_path:?}");
    }
    println!("Public key (base64): {pub_b64}");
    Ok(())
}

fn sign(model_dir: &Path, key_file: Option<&Path>, unsigned: bool) -> Result<()> {
    let names: Vec<String> = Disease::ALL
        .iter()
        .map(|d| d.artifact_file_name())
        .filter(|name| model_dir.join(name).is_file())
        .collect();
    if names.is_empty() {
        bail!("no model artifacts found in {model_dir:?}");
    }

    let signing_key = if unsigned {
        None
    } else {
        let seed = read_signing_seed(key_file)?;
        Some(SigningKey::from_bytes(&seed.0))
    };

    let manifest = build_manifest(model_dir, &names)?;
    let bytes = write_manifest(model_dir, &manifest, signing_key.as_ref())?;

    for (name, hash) in &manifest.files {
        println!("{name}  sha256={hash}");
    }
    println!("manifest sha256={}", sha256_hex_bytes(&bytes));
    match &signing_key {
        Some(key) => println!(
            "Signed with public key {}",
            general_purpose::STANDARD.encode(key.verifying_key().as_bytes())
        ),
        None => println!("Manifest written without signature"),
    }
    Ok(())
}

fn main() -> Result<()> {
    match Cli::parse().command {
        Command::GenerateKey {
            out_seed,
            out_pub,
            force,
        } => generate_key(&out_seed, out_pub.as_deref(), force),
        Command::Sign {
            model_dir,
            key_file,
            unsigned,
        } => sign(&model_dir, key_file.as_deref(), unsigned),
    }
}
