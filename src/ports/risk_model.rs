//! Risk model port: Trait for pretrained disease classifiers.
//!
//! This trait abstracts the model artifact format from the application logic,
//! so the assessment service can run against stub models in tests.

use crate::domain::{Disease, FeatureVector, Preprocessing, RiskResult};

/// Errors raised while running a loaded model on one feature vector.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InferenceError {
    #[error("{model}: expected {expected} features, got {got}")]
    SchemaMismatch {
        model: Disease,
        expected: usize,
        got: usize,
    },

    #[error("{model}: feature vector was built for {got}")]
    WrongModel { model: Disease, got: Disease },

    #[error("{model}: feature {index} is not finite")]
    NonFiniteFeature { model: Disease, index: usize },

    #[error("{model}: model produced a non-finite probability")]
    NonFiniteOutput { model: Disease },
}

/// A loaded, immutable disease model.
///
/// Implementations provide:
/// - The preprocessing schema their estimator was fitted with
/// - A pure `predict` over a feature vector in that schema
pub trait RiskModel: Send + Sync {
    /// Which disease this model scores.
    fn disease(&self) -> Disease;

    /// Column schema, imputer and scaler the feature vector must follow.
    fn preprocessing(&self) -> &Preprocessing;

    /// Artifact version string, reported alongside each result.
    fn version(&self) -> &str;

    /// Run inference on a normalized feature vector.
    ///
    /// Must be deterministic: the same vector always yields a bit-identical
    /// probability.
    ///
    /// # Errors
    /// Returns `InferenceError::SchemaMismatch` if the vector length differs
    /// from the schema, `InferenceError::WrongModel` if it was built for
    /// another disease.
    fn predict(&self, features: &FeatureVector) -> Result<RiskResult, InferenceError>;
}

/// Shared schema checks for implementors.
///
/// # Errors
/// See [`RiskModel::predict`].
pub fn check_vector(
    model: Disease,
    expected: usize,
    features: &FeatureVector,
) -> Result<(), InferenceError> {
    if features.model != model {
        return Err(InferenceError::WrongModel {
            model,
            got: features.model,
        });
    }
    if features.len() != expected {
        return Err(InferenceError::SchemaMismatch {
            model,
            expected,
            got: features.len(),
        });
    }
    if let Some(index) = features.values.iter().position(|v| !v.is_finite()) {
        return Err(InferenceError::NonFiniteFeature { model, index });
    }
    Ok(())
}
