//! Model risk result types.
//!
//! Represents the output of one disease model after thresholding.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Disease models known to the pipeline, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disease {
    Cirrhosis,
    Hcc,
    Mafld,
}

impl Disease {
    pub const ALL: [Disease; 3] = [Disease::Cirrhosis, Disease::Hcc, Disease::Mafld];

    /// Short machine name (`"hcc"`).
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Cirrhosis => "cirrhosis",
            Self::Hcc => "hcc",
            Self::Mafld => "mafld",
        }
    }

    #[must_use]
    pub fn title(self) -> &'static str {
        match self {
            Self::Cirrhosis => "Cirrhosis",
            Self::Hcc => "Hepatocellular Carcinoma",
            Self::Mafld => "MAFLD",
        }
    }

    /// Artifact file name inside the model directory.
    #[must_use]
    pub fn artifact_file_name(self) -> String {
        format!("{}.json", self.key())
    }
}

impl fmt::Display for Disease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Risk level classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RiskLevel {
    /// No significant indicators
    Low,
    /// Follow-up recommended
    Moderate,
    /// Specialist evaluation recommended
    High,
    /// Urgent evaluation
    VeryHigh,
}

impl RiskLevel {
    /// Get a human-readable description.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Low => "Low risk - No significant indicators",
            Self::Moderate => "Moderate risk - Follow-up recommended",
            Self::High => "High risk - Specialist evaluation advised",
            Self::VeryHigh => "Very high risk - Urgent evaluation advised",
        }
    }

    /// High and very-high warrant immediate care.
    #[must_use]
    pub fn is_urgent(&self) -> bool {
        *self >= Self::High
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "LOW"),
            Self::Moderate => write!(f, "MODERATE"),
            Self::High => write!(f, "HIGH"),
            Self::VeryHigh => write!(f, "VERY HIGH"),
        }
    }
}

/// Probability cutoffs stored with each model artifact.
///
/// `p < moderate` is low, `p < high` moderate, `p < very_high` high, anything
/// above very high. Without a `very_high` cutoff the top level is high.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskThresholds {
    pub moderate: f64,
    pub high: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub very_high: Option<f64>,
}

impl RiskThresholds {
    /// Check the cutoffs are probabilities in strictly increasing order.
    ///
    /// # Errors
    /// Returns a description of the first problem found.
    pub fn validate(&self) -> Result<(), String> {
        let mut cutoffs = vec![("moderate", self.moderate), ("high", self.high)];
        if let Some(v) = self.very_high {
            cutoffs.push(("very_high", v));
        }
        for (name, v) in &cutoffs {
            if !(0.0..=1.0).contains(v) {
                return Err(format!("threshold {name}={v} is not in [0, 1]"));
            }
        }
        for pair in cutoffs.windows(2) {
            if pair[0].1 >= pair[1].1 {
                return Err(format!(
                    "threshold {}={} must be below {}={}",
                    pair[0].0, pair[0].1, pair[1].0, pair[1].1
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn categorize(&self, probability: f64) -> RiskLevel {
        if probability < self.moderate {
            RiskLevel::Low
        } else if probability < self.high {
            RiskLevel::Moderate
        } else {
            match self.very_high {
                Some(cut) if probability >= cut => RiskLevel::VeryHigh,
                _ => RiskLevel::High,
            }
        }
    }
}

/// Result of one model prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskResult {
    pub model: Disease,
    /// Probability of disease (0.0 to 1.0)
    pub probability: f64,
    pub category: RiskLevel,
    /// Cutoffs used to derive `category`
    pub thresholds: RiskThresholds,
    pub artifact_version: String,
    /// Predicted class name, for models that report one (NAFL / NASH)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A model that could not be loaded and is left out of every response.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{model} model unavailable: {reason}")]
pub struct ModelUnavailableError {
    pub model: Disease,
    pub reason: String,
}
