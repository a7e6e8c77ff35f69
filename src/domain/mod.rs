//! Domain layer: Core clinical types and formulas.
//!
//! Pure Rust types with no I/O. Everything here is deterministic and
//! serializable, and validates on construction.

pub mod features;
pub mod lab;
pub mod ocr;
pub mod risk;
pub mod samples;
pub mod scores;

pub use features::{
    ColumnSource, FeatureColumn, FeatureVector, ImputeStrategy, Imputer, Preprocessing, Scaler,
};
pub use lab::{validation_bounds, FieldSpec, LabField, LabRecord, RawLabRecord, RawValue, ValidationError};
pub use risk::{Disease, ModelUnavailableError, RiskLevel, RiskResult, RiskThresholds};
pub use samples::SamplePatient;
pub use scores::{
    calculate_all, CalculationError, ClinicalScore, ScoreBand, ScoreKind, ScoreSheet,
    UnavailableScore,
};
