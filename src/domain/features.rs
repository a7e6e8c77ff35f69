//! Feature schema and feature vectors.
//!
//! A model's preprocessing is data, not code: each artifact declares its
//! columns (which lab field, unit multiplier or ratio), its fitted imputer and
//! its fitted scaler. The normalizer in `application` interprets it.

use serde::{Deserialize, Serialize};

use super::lab::LabField;
use super::risk::Disease;

/// Where a model column's raw value comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnSource {
    /// A lab field times a unit multiplier.
    Field {
        field: LabField,
        #[serde(default = "unit_multiplier")]
        multiplier: f64,
    },
    /// `numerator / denominator`.
    Ratio {
        numerator: LabField,
        denominator: LabField,
    },
}

fn unit_multiplier() -> f64 {
    1.0
}

impl ColumnSource {
    /// Lab fields this column reads.
    #[must_use]
    pub fn fields(&self) -> Vec<LabField> {
        match self {
            Self::Field { field, .. } => vec![*field],
            Self::Ratio {
                numerator,
                denominator,
            } => vec![*numerator, *denominator],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureColumn {
    /// Column name as seen during training.
    pub name: String,
    pub source: ColumnSource,
    /// Categorical column that bypasses the scaler.
    #[serde(default)]
    pub passthrough: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImputeStrategy {
    Mean,
    Median,
    MostFrequent,
    Constant,
}

/// Fitted imputer: one statistic per column. `None` means the column was
/// always present in training and has nothing to fall back on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Imputer {
    pub strategy: ImputeStrategy,
    pub statistics: Vec<Option<f64>>,
}

/// Fitted standard scaler: `(x - mean) / scale`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preprocessing {
    pub columns: Vec<FeatureColumn>,
    pub imputer: Imputer,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaler: Option<Scaler>,
}

impl Preprocessing {
    #[must_use]
    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// Check that the fitted statistics line up with the column list.
    ///
    /// # Errors
    /// Returns a description of the first inconsistency.
    pub fn validate(&self) -> Result<(), String> {
        let n = self.columns.len();
        if n == 0 {
            return Err("no feature columns".into());
        }
        if self.imputer.statistics.len() != n {
            return Err(format!(
                "imputer has {} statistics for {n} columns",
                self.imputer.statistics.len()
            ));
        }
        if let Some(stat) = self.imputer.statistics.iter().flatten().find(|v| !v.is_finite()) {
            return Err(format!("imputer statistic {stat} is not finite"));
        }
        for column in &self.columns {
            if let ColumnSource::Field { multiplier, .. } = column.source {
                if !multiplier.is_finite() || multiplier == 0.0 {
                    return Err(format!("column {} has multiplier {multiplier}", column.name));
                }
            }
        }
        if let Some(scaler) = &self.scaler {
            if scaler.mean.len() != n || scaler.scale.len() != n {
                return Err(format!(
                    "scaler has {} means and {} scales for {n} columns",
                    scaler.mean.len(),
                    scaler.scale.len()
                ));
            }
            for (column, (mean, scale)) in self.columns.iter().zip(scaler.mean.iter().zip(&scaler.scale)) {
                if !mean.is_finite() || !scale.is_finite() || *scale <= 0.0 {
                    return Err(format!(
                        "column {} has invalid scaler mean={mean} scale={scale}",
                        column.name
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Model input in the exact column order the model was trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    pub model: Disease,
    pub values: Vec<f64>,
}

impl FeatureVector {
    #[must_use]
    pub fn new(model: Disease, values: Vec<f64>) -> Self {
        Self { model, values }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
