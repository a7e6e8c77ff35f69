//! Adapters layer: Concrete implementations of ports.
//!
//! - `artifact`: JSON model artifacts, manifest hashes and Ed25519 signatures
//! - `registry`: the read-only set of loaded models shared by every request

pub mod artifact;
pub mod registry;

pub use artifact::manifest::ArtifactPolicy;
pub use artifact::{ArtifactError, ArtifactModel, ModelArtifact};
pub use registry::{ModelRegistry, ModelStatus};
