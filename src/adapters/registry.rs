//! Read-only registry of loaded disease models.
//!
//! Built once at startup and shared behind an `Arc`. A model whose artifact
//! cannot be loaded is kept as an unavailable slot with its reason, so the
//! service keeps running with the remaining models.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::artifact::manifest::{verify_directory, ArtifactPolicy, VerifiedManifest};
use super::artifact::{ArtifactError, ArtifactModel};
use crate::domain::{Disease, ModelUnavailableError};
use crate::ports::RiskModel;

enum Slot {
    Ready(Arc<dyn RiskModel>),
    Unavailable(ModelUnavailableError),
}

/// Load status of one model, for listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelStatus {
    pub model: Disease,
    pub available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Registry of disease models, keyed in report order.
#[derive(Default)]
pub struct ModelRegistry {
    slots: BTreeMap<Disease, Slot>,
}

impl ModelRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every known disease model from `dir`.
    ///
    /// Never fails: each model that cannot be loaded is recorded as
    /// unavailable and logged once.
    #[must_use]
    pub fn load_from_dir(dir: &Path, policy: &ArtifactPolicy) -> Self {
        let mut registry = Self::new();

        let manifest = match verify_directory(dir, policy) {
            Ok(m) => m,
            Err(e) => {
                let reason = e.to_string();
                for disease in Disease::ALL {
                    registry = registry.with_unavailable(disease, reason.clone());
                }
                return registry;
            }
        };

        for disease in Disease::ALL {
            registry = match load_one(dir, disease, manifest.as_ref()) {
                Ok(model) => registry.with_model(Arc::new(model)),
                Err(e) => registry.with_unavailable(disease, e.to_string()),
            };
        }

        let ready = registry.available().len();
        tracing::info!("Model registry ready: {ready} of {} models loaded", Disease::ALL.len());
        registry
    }

    /// Register a loaded model, replacing any earlier slot for its disease.
    #[must_use]
    pub fn with_model(mut self, model: Arc<dyn RiskModel>) -> Self {
        self.slots.insert(model.disease(), Slot::Ready(model));
        self
    }

    /// Record a model as unavailable.
    #[must_use]
    pub fn with_unavailable(mut self, model: Disease, reason: impl Into<String>) -> Self {
        let err = ModelUnavailableError {
            model,
            reason: reason.into(),
        };
        tracing::warn!("{err}");
        self.slots.insert(model, Slot::Unavailable(err));
        self
    }

    /// The loaded model for `disease`.
    ///
    /// # Errors
    /// Returns the recorded `ModelUnavailableError`, or a "not registered"
    /// one for a disease the registry never heard of.
    pub fn get(&self, disease: Disease) -> Result<Arc<dyn RiskModel>, ModelUnavailableError> {
        match self.slots.get(&disease) {
            Some(Slot::Ready(model)) => Ok(Arc::clone(model)),
            Some(Slot::Unavailable(err)) => Err(err.clone()),
            None => Err(ModelUnavailableError {
                model: disease,
                reason: "not registered".into(),
            }),
        }
    }

    /// Loaded models in report order.
    #[must_use]
    pub fn available(&self) -> Vec<Arc<dyn RiskModel>> {
        self.slots
            .values()
            .filter_map(|slot| match slot {
                Slot::Ready(model) => Some(Arc::clone(model)),
                Slot::Unavailable(_) => None,
            })
            .collect()
    }

    /// Every disease without a loaded model, in report order.
    ///
    /// Diseases never registered count as degraded too.
    #[must_use]
    pub fn degraded(&self) -> Vec<Disease> {
        Disease::ALL
            .into_iter()
            .filter(|d| !matches!(self.slots.get(d), Some(Slot::Ready(_))))
            .collect()
    }

    #[must_use]
    pub fn status(&self) -> Vec<ModelStatus> {
        Disease::ALL
            .into_iter()
            .map(|disease| match self.get(disease) {
                Ok(model) => ModelStatus {
                    model: disease,
                    available: true,
                    version: Some(model.version().to_string()),
                    reason: None,
                },
                Err(err) => ModelStatus {
                    model: disease,
                    available: false,
                    version: None,
                    reason: Some(err.reason),
                },
            })
            .collect()
    }
}

fn load_one(
    dir: &Path,
    disease: Disease,
    manifest: Option<&VerifiedManifest>,
) -> Result<ArtifactModel, ArtifactError> {
    let name = disease.artifact_file_name();
    let path = dir.join(&name);
    let bytes = fs::read(&path).map_err(|e| ArtifactError::io(&path, e))?;
    if let Some(manifest) = manifest {
        manifest.check_file(&name, &bytes)?;
    }
    let model = ArtifactModel::from_slice(&bytes)?;
    let found = model.disease();
    if found != disease {
        return Err(ArtifactError::WrongModel {
            expected: disease,
            found,
        });
    }
    Ok(model)
}
