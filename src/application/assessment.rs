//! Assessment service: one lab record in, one aggregated report out.
//!
//! This service coordinates:
//! - Clinical score calculation
//! - Feature normalization per loaded model
//! - Model inference
//! - Aggregation into a single report with the degraded list and care flag

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::interpretation;
use super::normalizer::{normalize, NormalizeError};
use crate::adapters::ModelRegistry;
use crate::domain::{
    calculate_all, ClinicalScore, Disease, LabRecord, RawLabRecord, RiskResult, ScoreBand,
    ScoreKind, ScoreSheet, UnavailableScore, ValidationError,
};

/// One model's result with its narrative.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRisk {
    #[serde(flatten)]
    pub result: RiskResult,
    pub findings: Vec<String>,
    pub recommendation: String,
}

/// Aggregated assessment payload.
#[derive(Debug, Clone, Serialize)]
pub struct AssessmentReport {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Validated inputs the report was computed from
    pub inputs: LabRecord,
    pub clinical_scores: Vec<ClinicalScore>,
    pub unavailable_scores: Vec<UnavailableScore>,
    /// Ordered cirrhosis, HCC, MAFLD
    pub model_risks: Vec<ModelRisk>,
    /// Models left out of this report
    pub degraded: Vec<Disease>,
    pub seek_immediate_care: bool,
}

impl AssessmentReport {
    #[must_use]
    pub fn risk(&self, disease: Disease) -> Option<&ModelRisk> {
        self.model_risks.iter().find(|r| r.result.model == disease)
    }

    #[must_use]
    pub fn score(&self, kind: ScoreKind) -> Option<&ClinicalScore> {
        self.clinical_scores.iter().find(|s| s.name == kind)
    }
}

/// Service for running the full assessment pipeline.
///
/// Holds only the shared read-only registry, so one instance can serve
/// concurrent requests without locking.
#[derive(Clone)]
pub struct AssessmentService {
    registry: Arc<ModelRegistry>,
}

impl AssessmentService {
    /// Create a new assessment service.
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self { registry }
    }

    /// Validate a raw record, then assess it.
    ///
    /// # Errors
    /// Returns `ValidationError` for bad or missing input.
    pub fn assess_raw(&self, raw: &RawLabRecord) -> Result<AssessmentReport, ValidationError> {
        let record = LabRecord::from_raw(raw)?;
        self.assess(&record)
    }

    /// Assess a validated record.
    ///
    /// A record missing a field a model needs fails the whole request, since
    /// the input is user-correctable. A model with inconsistent preprocessing,
    /// or one that fails inside inference, is left out and listed as degraded.
    ///
    /// # Errors
    /// Returns `ValidationError` when a model needs a field the record lacks
    /// and its artifact has no imputation statistic for.
    pub fn assess(&self, record: &LabRecord) -> Result<AssessmentReport, ValidationError> {
        let sheet = calculate_all(record);
        let mut degraded = self.registry.degraded();
        let mut model_risks = Vec::new();

        for model in self.registry.available() {
            let disease = model.disease();
            let features = match normalize(record, disease, model.preprocessing()) {
                Ok(features) => features,
                Err(NormalizeError::Input(e)) => return Err(e),
                Err(e @ NormalizeError::Schema { .. }) => {
                    tracing::warn!("Omitting model: {e}");
                    degraded.push(disease);
                    continue;
                }
            };
            match model.predict(&features) {
                Ok(result) => {
                    tracing::debug!(
                        "{disease}: p={:.4} category={}",
                        result.probability,
                        result.category
                    );
                    model_risks.push(ModelRisk {
                        findings: interpretation::findings(disease, record),
                        recommendation: interpretation::recommendation(&result).to_string(),
                        result,
                    });
                }
                Err(e) => {
                    tracing::warn!("Inference failed, omitting model: {e}");
                    degraded.push(disease);
                }
            }
        }
        degraded.sort();
        model_risks.sort_by_key(|r| r.result.model);

        let seek_immediate_care = needs_immediate_care(&model_risks, &sheet);
        if !degraded.is_empty() {
            tracing::info!("Assessment completed without: {degraded:?}");
        }

        Ok(AssessmentReport {
            id: uuid_v4(),
            created_at: Utc::now(),
            inputs: record.clone(),
            clinical_scores: sheet.scores,
            unavailable_scores: sheet.unavailable,
            model_risks,
            degraded,
            seek_immediate_care,
        })
    }
}

fn needs_immediate_care(risks: &[ModelRisk], sheet: &ScoreSheet) -> bool {
    let model_flag = risks.iter().any(|r| r.result.category.is_urgent());
    let meld_flag = sheet
        .get(ScoreKind::Meld)
        .is_some_and(|s| s.band == ScoreBand::VeryHigh);
    let child_pugh_flag = sheet
        .get(ScoreKind::ChildPugh)
        .is_some_and(|s| s.band == ScoreBand::ClassC);
    model_flag || meld_flag || child_pugh_flag
}

/// Generate a random UUID v4 using a CSPRNG.
fn uuid_v4() -> String {
    use rand::Rng;
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    let mut rng = ChaCha20Rng::from_entropy();
    let bytes: [u8; 16] = rng.gen();

    format!(
        "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
        bytes[0], bytes[1], bytes[2], bytes[3],
        bytes[4], bytes[5],
        (bytes[6] & 0x0f) | 0x40, bytes[7],
        (bytes[8] & 0x3f) | 0x80, bytes[9],
        bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15]
    )
}
