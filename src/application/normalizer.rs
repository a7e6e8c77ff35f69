//! Feature normalizer: lab record to model feature vector.

use crate::domain::{
    ColumnSource, Disease, FeatureVector, LabField, LabRecord, Preprocessing, ValidationError,
};

/// Reasons a feature vector could not be built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    /// The record lacks something the model needs.
    #[error(transparent)]
    Input(#[from] ValidationError),

    /// The model's own preprocessing is inconsistent.
    #[error("{model}: invalid preprocessing: {reason}")]
    Schema { model: Disease, reason: String },
}

/// Build the feature vector `disease` expects from a validated record.
///
/// For each declared column, in order:
/// 1. read the lab field (times its multiplier) or the field ratio
/// 2. fall back to the fitted imputer statistic when absent
/// 3. standardize with the fitted scaler unless the column is pass-through
///
/// A ratio with a zero denominator counts as absent.
///
/// # Errors
/// `NormalizeError::Schema` when the imputer or scaler does not line up with
/// the columns. `NormalizeError::Input` wraps `ValidationError::Missing`
/// naming the first absent field of a column the imputer has no statistic for.
pub fn normalize(
    record: &LabRecord,
    disease: Disease,
    preprocessing: &Preprocessing,
) -> Result<FeatureVector, NormalizeError> {
    preprocessing
        .validate()
        .map_err(|reason| NormalizeError::Schema {
            model: disease,
            reason,
        })?;
    let mut values = Vec::with_capacity(preprocessing.width());

    for (i, column) in preprocessing.columns.iter().enumerate() {
        let raw = match column.source {
            ColumnSource::Field { field, multiplier } => record.get(field).map(|v| v * multiplier),
            ColumnSource::Ratio {
                numerator,
                denominator,
            } => match (record.get(numerator), record.get(denominator)) {
                (Some(n), Some(d)) if d != 0.0 => Some(n / d),
                _ => None,
            },
        };

        let value = match raw {
            Some(v) => v,
            None => match preprocessing.imputer.statistics.get(i).copied().flatten() {
                Some(stat) => {
                    tracing::debug!("{disease}: imputing column {}", column.name);
                    stat
                }
                None => {
                    return Err(ValidationError::Missing {
                        field: missing_field(&column.source, record),
                    }
                    .into())
                }
            },
        };

        let scaled = match (&preprocessing.scaler, column.passthrough) {
            (Some(scaler), false) => (value - scaler.mean[i]) / scaler.scale[i],
            _ => value,
        };
        values.push(scaled);
    }

    Ok(FeatureVector::new(disease, values))
}

/// The field to blame when a column has no value and no statistic.
fn missing_field(source: &ColumnSource, record: &LabRecord) -> LabField {
    match *source {
        ColumnSource::Field { field, .. } => field,
        // Both present means the denominator was zero.
        ColumnSource::Ratio {
            numerator,
            denominator,
        } => {
            if record.contains(numerator) {
                denominator
            } else {
                numerator
            }
        }
    }
}
