//! # Hepatorisk
//!
//! Liver disease risk scoring from routine lab values.
//!
//! This crate provides:
//! - Validation of lab records against clinical bounds
//! - Closed-form clinical scores (MELD, Child-Pugh, FIB-4, APRI, NFS)
//! - Risk inference for cirrhosis, HCC and MAFLD from pretrained artifacts
//! - Plain-text and JSON reports
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core clinical types (lab record, scores, risk levels)
//! - `ports`: Trait definitions for model inference
//! - `adapters`: JSON artifacts, manifest verification, the model registry
//! - `application`: Use cases orchestrating domain and ports
//! - `config`: Environment settings

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{AssessmentReport, AssessmentService};
pub use domain::{Disease, LabRecord, RiskLevel};

/// Result type for Hepatorisk operations
pub type Result<T> = std::result::Result<T, HepatoriskError>;

/// Main error type for Hepatorisk
#[derive(Debug, thiserror::Error)]
pub enum HepatoriskError {
    #[error("Invalid lab record: {0}")]
    Validation(#[from] domain::ValidationError),

    #[error("Artifact error: {0}")]
    Artifact(#[from] adapters::ArtifactError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
