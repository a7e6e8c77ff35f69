//! JSON model artifact adapter.
//!
//! An artifact bundles everything one disease model needs at inference time:
//! - the preprocessing schema (columns, fitted imputer, fitted scaler)
//! - the estimator (logistic regression or a boosted tree ensemble)
//! - the probability cutoffs used for risk categories, versioned with it
//!
//! Artifacts are produced by the training pipeline, hashed into
//! `manifest.json` and optionally signed (see [`manifest`]). They are loaded
//! once and never mutated.

pub mod manifest;

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::{Disease, FeatureVector, Preprocessing, RiskResult, RiskThresholds};
use crate::ports::{check_vector, InferenceError, RiskModel};

/// Artifact schema version understood by this build.
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Errors raised while reading or checking an artifact directory.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed artifact JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unsupported artifact format version {0} (expected {ARTIFACT_FORMAT_VERSION})")]
    UnsupportedFormat(u32),

    #[error("artifact is for {found}, expected {expected}")]
    WrongModel { expected: Disease, found: Disease },

    #[error("inconsistent artifact: {0}")]
    Invalid(String),

    #[error("manifest error: {0}")]
    Manifest(String),

    #[error("{0} is not listed in manifest.json")]
    NotInManifest(String),

    #[error("file hash mismatch for {0}")]
    HashMismatch(String),

    #[error("signature error: {0}")]
    Signature(String),
}

impl ArtifactError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// One node of a regression tree, stored flat.
///
/// Splits send `x[feature] < threshold` left. Child indices always point
/// forward, which rules out cycles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<TreeNode>,
}

impl Tree {
    fn validate(&self, width: usize) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("empty tree".into());
        }
        for (i, node) in self.nodes.iter().enumerate() {
            match *node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    if feature >= width {
                        return Err(format!("node {i} splits on feature {feature} of {width}"));
                    }
                    if !threshold.is_finite() {
                        return Err(format!("node {i} has non-finite threshold"));
                    }
                    for child in [left, right] {
                        if child <= i || child >= self.nodes.len() {
                            return Err(format!("node {i} has invalid child {child}"));
                        }
                    }
                }
                TreeNode::Leaf { value } => {
                    if !value.is_finite() {
                        return Err(format!("leaf {i} has non-finite value"));
                    }
                }
            }
        }
        Ok(())
    }

    /// Leaf margin reached by `x`. Assumes a validated tree.
    fn eval(&self, x: &[f64]) -> f64 {
        let mut idx = 0;
        loop {
            match self.nodes[idx] {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => idx = if x[feature] < threshold { left } else { right },
                TreeNode::Leaf { value } => return value,
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    /// `sigmoid(intercept + coefficients . x)`
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
    },
    /// `sigmoid(base_margin + sum of tree leaves)`
    TreeEnsemble { base_margin: f64, trees: Vec<Tree> },
}

impl Estimator {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Logistic { .. } => "logistic",
            Self::TreeEnsemble { .. } => "tree_ensemble",
        }
    }

    fn validate(&self, width: usize) -> Result<(), String> {
        match self {
            Self::Logistic {
                coefficients,
                intercept,
            } => {
                if coefficients.len() != width {
                    return Err(format!(
                        "{} coefficients for {width} columns",
                        coefficients.len()
                    ));
                }
                if !intercept.is_finite() || coefficients.iter().any(|c| !c.is_finite()) {
                    return Err("non-finite coefficient".into());
                }
            }
            Self::TreeEnsemble { base_margin, trees } => {
                if !base_margin.is_finite() {
                    return Err("non-finite base margin".into());
                }
                if trees.is_empty() {
                    return Err("tree ensemble has no trees".into());
                }
                for (t, tree) in trees.iter().enumerate() {
                    tree.validate(width).map_err(|e| format!("tree {t}: {e}"))?;
                }
            }
        }
        Ok(())
    }

    fn margin(&self, x: &[f64]) -> f64 {
        match self {
            Self::Logistic {
                coefficients,
                intercept,
            } => coefficients
                .iter()
                .zip(x)
                .fold(*intercept, |acc, (c, v)| acc + c * v),
            Self::TreeEnsemble { base_margin, trees } => trees
                .iter()
                .fold(*base_margin, |acc, tree| acc + tree.eval(x)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLabels {
    pub negative: String,
    pub positive: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpec {
    /// Report `1 - p`: the estimator was fitted with the disease as class 0.
    #[serde(default)]
    pub complement: bool,
    /// Class names for models that report a label (positive when p >= 0.5).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<ClassLabels>,
}

/// On-disk artifact format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model: Disease,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub preprocessing: Preprocessing,
    pub estimator: Estimator,
    #[serde(default)]
    pub output: OutputSpec,
    pub thresholds: RiskThresholds,
}

impl ModelArtifact {
    /// # Errors
    /// Returns `ArtifactError` describing the first inconsistency.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedFormat(self.format_version));
        }
        self.preprocessing.validate().map_err(ArtifactError::Invalid)?;
        self.estimator
            .validate(self.preprocessing.width())
            .map_err(ArtifactError::Invalid)?;
        self.thresholds.validate().map_err(ArtifactError::Invalid)?;
        Ok(())
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A validated artifact ready for inference.
#[derive(Debug, Clone)]
pub struct ArtifactModel {
    artifact: ModelArtifact,
}

impl ArtifactModel {
    /// Load and validate an artifact file.
    ///
    /// # Errors
    /// Returns `ArtifactError` if the file is unreadable, malformed, or
    /// internally inconsistent.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let bytes = fs::read(path).map_err(|e| ArtifactError::io(path, e))?;
        Self::from_slice(&bytes)
    }

    /// # Errors
    /// See [`ArtifactModel::load`].
    pub fn from_slice(bytes: &[u8]) -> Result<Self, ArtifactError> {
        let artifact: ModelArtifact = serde_json::from_slice(bytes)?;
        Self::from_artifact(artifact)
    }

    /// # Errors
    /// See [`ModelArtifact::validate`].
    pub fn from_artifact(artifact: ModelArtifact) -> Result<Self, ArtifactError> {
        artifact.validate()?;
        tracing::info!(
            "Loaded {} artifact v{} ({} features, {})",
            artifact.model,
            artifact.version,
            artifact.preprocessing.width(),
            artifact.estimator.kind()
        );
        Ok(Self { artifact })
    }

    #[must_use]
    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }
}

impl RiskModel for ArtifactModel {
    fn disease(&self) -> Disease {
        self.artifact.model
    }

    fn preprocessing(&self) -> &Preprocessing {
        &self.artifact.preprocessing
    }

    fn version(&self) -> &str {
        &self.artifact.version
    }

    fn predict(&self, features: &FeatureVector) -> Result<RiskResult, InferenceError> {
        let model = self.artifact.model;
        check_vector(model, self.artifact.preprocessing.width(), features)?;

        let raw = sigmoid(self.artifact.estimator.margin(&features.values));
        let probability = if self.artifact.output.complement {
            1.0 - raw
        } else {
            raw
        };
        if !probability.is_finite() {
            return Err(InferenceError::NonFiniteOutput { model });
        }

        let label = self.artifact.output.labels.as_ref().map(|labels| {
            if probability >= 0.5 {
                labels.positive.clone()
            } else {
                labels.negative.clone()
            }
        });

        Ok(RiskResult {
            model,
            probability,
            category: self.artifact.thresholds.categorize(probability),
            thresholds: self.artifact.thresholds,
            artifact_version: self.artifact.version.clone(),
            label,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::domain::{ColumnSource, FeatureColumn, ImputeStrategy, Imputer, LabField, RiskLevel};

    /// Two-column logistic artifact used across adapter and service tests.
    pub(crate) fn logistic_artifact(model: Disease) -> ModelArtifact {
        ModelArtifact {
            format_version: ARTIFACT_FORMAT_VERSION,
            model,
            version: "test-1".into(),
            description: None,
            preprocessing: Preprocessing {
                columns: vec![
                    FeatureColumn {
                        name: "ast".into(),
                        source: ColumnSource::Field {
                            field: LabField::Ast,
                            multiplier: 1.0,
                        },
                        passthrough: false,
                    },
                    FeatureColumn {
                        name: "platelets".into(),
                        source: ColumnSource::Field {
                            field: LabField::Platelets,
                            multiplier: 1.0,
                        },
                        passthrough: false,
                    },
                ],
                imputer: Imputer {
                    strategy: ImputeStrategy::Median,
                    statistics: vec![None, None],
                },
                scaler: None,
            },
            estimator: Estimator::Logistic {
                coefficients: vec![0.02, -0.01],
                intercept: 0.0,
            },
            output: OutputSpec::default(),
            thresholds: RiskThresholds {
                moderate: 0.3,
                high: 0.7,
                very_high: Some(0.9),
            },
        }
    }

    #[test]
    fn test_logistic_predict() {
        let model = ArtifactModel::from_artifact(logistic_artifact(Disease::Cirrhosis)).unwrap();
        // margin = 0.02*100 - 0.01*200 = 0
        let result = model
            .predict(&FeatureVector::new(Disease::Cirrhosis, vec![100.0, 200.0]))
            .unwrap();
        assert!((result.probability - 0.5).abs() < 1e-12);
        assert_eq!(result.category, RiskLevel::Moderate);
        assert_eq!(result.artifact_version, "test-1");
        assert!(result.label.is_none());
    }

    #[test]
    fn test_complement_and_labels() {
        let mut artifact = logistic_artifact(Disease::Mafld);
        artifact.estimator = Estimator::Logistic {
            coefficients: vec![0.0, 0.0],
            intercept: -2.0,
        };
        artifact.output = OutputSpec {
            complement: true,
            labels: Some(ClassLabels {
                negative: "NAFL".into(),
                positive: "NASH".into(),
            }),
        };
        let model = ArtifactModel::from_artifact(artifact).unwrap();
        let result = model
            .predict(&FeatureVector::new(Disease::Mafld, vec![1.0, 1.0]))
            .unwrap();
        // 1 - sigmoid(-2) = 0.8808
        assert!((result.probability - 0.880_797).abs() < 1e-5);
        assert_eq!(result.category, RiskLevel::High);
        assert_eq!(result.label.as_deref(), Some("NASH"));
    }

    #[test]
    fn test_tree_ensemble() {
        let mut artifact = logistic_artifact(Disease::Cirrhosis);
        artifact.estimator = Estimator::TreeEnsemble {
            base_margin: 0.0,
            trees: vec![
                Tree {
                    nodes: vec![
                        TreeNode::Split {
                            feature: 1,
                            threshold: 150.0,
                            left: 1,
                            right: 2,
                        },
                        TreeNode::Leaf { value: 1.0 },
                        TreeNode::Leaf { value: -1.0 },
                    ],
                },
                Tree {
                    nodes: vec![TreeNode::Leaf { value: 0.5 }],
                },
            ],
        };
        let model = ArtifactModel::from_artifact(artifact).unwrap();
        let low_plt = model
            .predict(&FeatureVector::new(Disease::Cirrhosis, vec![50.0, 100.0]))
            .unwrap();
        let high_plt = model
            .predict(&FeatureVector::new(Disease::Cirrhosis, vec![50.0, 150.0]))
            .unwrap();
        assert!((low_plt.probability - sigmoid(1.5)).abs() < 1e-12);
        assert!((high_plt.probability - sigmoid(-0.5)).abs() < 1e-12);
    }

    #[test]
    fn test_rejects_backward_tree_edge() {
        let mut artifact = logistic_artifact(Disease::Cirrhosis);
        artifact.estimator = Estimator::TreeEnsemble {
            base_margin: 0.0,
            trees: vec![Tree {
                nodes: vec![
                    TreeNode::Split {
                        feature: 0,
                        threshold: 1.0,
                        left: 0,
                        right: 1,
                    },
                    TreeNode::Leaf { value: 0.0 },
                ],
            }],
        };
        assert!(matches!(
            ArtifactModel::from_artifact(artifact),
            Err(ArtifactError::Invalid(_))
        ));
    }

    #[test]
    fn test_rejects_coefficient_count_mismatch() {
        let mut artifact = logistic_artifact(Disease::Hcc);
        artifact.estimator = Estimator::Logistic {
            coefficients: vec![1.0],
            intercept: 0.0,
        };
        assert!(ArtifactModel::from_artifact(artifact).is_err());
    }

    #[test]
    fn test_rejects_unknown_format() {
        let mut artifact = logistic_artifact(Disease::Hcc);
        artifact.format_version = 7;
        assert!(matches!(
            ArtifactModel::from_artifact(artifact),
            Err(ArtifactError::UnsupportedFormat(7))
        ));
    }

    #[test]
    fn test_schema_mismatch_is_an_error() {
        let model = ArtifactModel::from_artifact(logistic_artifact(Disease::Hcc)).unwrap();
        let err = model
            .predict(&FeatureVector::new(Disease::Hcc, vec![1.0, 2.0, 3.0]))
            .unwrap_err();
        assert!(matches!(err, InferenceError::SchemaMismatch { expected: 2, got: 3, .. }));
    }

    #[test]
    fn test_bit_identical_repeat() {
        let model = ArtifactModel::from_artifact(logistic_artifact(Disease::Hcc)).unwrap();
        let v = FeatureVector::new(Disease::Hcc, vec![87.3, 141.0]);
        let a = model.predict(&v).unwrap().probability;
        let b = model.predict(&v).unwrap().probability;
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = ArtifactModel::load(&dir.path().join("hcc.json")).unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));
    }

    #[test]
    fn test_load_written_artifact() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("mafld.json");
        let json = serde_json::to_vec(&logistic_artifact(Disease::Mafld)).unwrap();
        fs::write(&path, json).expect("write");
        let model = ArtifactModel::load(&path).unwrap();
        assert_eq!(model.disease(), Disease::Mafld);
        assert_eq!(model.artifact().estimator.kind(), "logistic");
    }

    #[test]
    fn test_tree_node_json_shape() {
        let json = r#"[{"feature":2,"threshold":60.0,"left":1,"right":2},{"value":0.4},{"value":-0.6}]"#;
        let nodes: Vec<TreeNode> = serde_json::from_str(json).unwrap();
        assert!(matches!(nodes[0], TreeNode::Split { feature: 2, .. }));
        assert_eq!(nodes[1], TreeNode::Leaf { value: 0.4 });
    }
}
