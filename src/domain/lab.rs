//! Patient lab record types for liver disease risk scoring.
//!
//! The bounds table in this module is the single source of truth for input
//! validation. The same table is exported to form clients (see
//! [`validation_bounds`]) so that browser-side and server-side checks agree.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A named lab value (or clinical grade) accepted by the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabField {
    Age,
    Gender,
    Ast,
    Alt,
    Alp,
    TotalBilirubin,
    DirectBilirubin,
    Albumin,
    Platelets,
    Inr,
    Creatinine,
    Afp,
    Ggt,
    Bmi,
    Obesity,
    Diabetes,
    Ascites,
    Encephalopathy,
}

impl LabField {
    /// All fields, in the order of [`FIELD_SPECS`].
    pub const ALL: [LabField; 18] = [
        LabField::Age,
        LabField::Gender,
        LabField::Ast,
        LabField::Alt,
        LabField::Alp,
        LabField::TotalBilirubin,
        LabField::DirectBilirubin,
        LabField::Albumin,
        LabField::Platelets,
        LabField::Inr,
        LabField::Creatinine,
        LabField::Afp,
        LabField::Ggt,
        LabField::Bmi,
        LabField::Obesity,
        LabField::Diabetes,
        LabField::Ascites,
        LabField::Encephalopathy,
    ];

    /// Validation and display metadata for this field.
    #[must_use]
    pub fn spec(self) -> &'static FieldSpec {
        &FIELD_SPECS[self as usize]
    }

    /// Canonical form key (`"ast"`, `"total_bilirubin"`, ...).
    #[must_use]
    pub fn key(self) -> &'static str {
        self.spec().key
    }

    #[must_use]
    pub fn is_required(self) -> bool {
        self.spec().required
    }

    /// Resolve a form key to a field.
    ///
    /// Accepts the canonical key plus the legacy form names still posted by
    /// older clients (`trombosit`, `creatin`, `total_bil`, `dir_bil`).
    /// Matching is case-insensitive.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Self> {
        let key = key.trim().to_ascii_lowercase();
        if let Some(spec) = FIELD_SPECS.iter().find(|s| s.key == key) {
            return Some(spec.field);
        }
        match key.as_str() {
            "trombosit" | "platelet" => Some(LabField::Platelets),
            "creatin" => Some(LabField::Creatinine),
            "total_bil" => Some(LabField::TotalBilirubin),
            "dir_bil" => Some(LabField::DirectBilirubin),
            _ => None,
        }
    }
}

impl fmt::Display for LabField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Validation bounds and display metadata for one lab field.
///
/// Bounds are inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FieldSpec {
    pub field: LabField,
    pub key: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub min: f64,
    pub max: f64,
    pub required: bool,
    /// Value must be a whole number (grades and flags).
    pub integral: bool,
    /// Adult reference range, for reports only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference: Option<&'static str>,
}

impl FieldSpec {
    const fn new(
        field: LabField,
        key: &'static str,
        label: &'static str,
        unit: &'static str,
        min: f64,
        max: f64,
    ) -> Self {
        Self {
            field,
            key,
            label,
            unit,
            min,
            max,
            required: false,
            integral: false,
            reference: None,
        }
    }

    const fn required(mut self) -> Self {
        self.required = true;
        self
    }

    const fn integral(mut self) -> Self {
        self.integral = true;
        self
    }

    const fn reference(mut self, range: &'static str) -> Self {
        self.reference = Some(range);
        self
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        (self.min..=self.max).contains(&value)
    }
}

/// Bounds table, indexed by `LabField as usize`.
pub const FIELD_SPECS: [FieldSpec; 18] = [
    FieldSpec::new(LabField::Age, "age", "Age", "years", 18.0, 100.0).required(),
    FieldSpec::new(LabField::Gender, "gender", "Gender", "code", 0.0, 2.0).integral(),
    FieldSpec::new(LabField::Ast, "ast", "AST", "IU/L", 1.0, 1000.0)
        .required()
        .reference("5-40"),
    FieldSpec::new(LabField::Alt, "alt", "ALT", "IU/L", 1.0, 1000.0)
        .required()
        .reference("7-56"),
    FieldSpec::new(LabField::Alp, "alp", "ALP", "IU/L", 1.0, 3000.0).reference("44-147"),
    FieldSpec::new(
        LabField::TotalBilirubin,
        "total_bilirubin",
        "Total Bilirubin",
        "mg/dL",
        0.1,
        50.0,
    )
    .required()
    .reference("0.3-1.2"),
    FieldSpec::new(
        LabField::DirectBilirubin,
        "direct_bilirubin",
        "Direct Bilirubin",
        "mg/dL",
        0.1,
        50.0,
    )
    .reference("0.0-0.3"),
    FieldSpec::new(LabField::Albumin, "albumin", "Albumin", "g/dL", 0.5, 10.0)
        .required()
        .reference("3.5-5.0"),
    FieldSpec::new(LabField::Platelets, "platelets", "Platelets", "x10^3/uL", 1.0, 1000.0)
        .required()
        .reference("150-450"),
    FieldSpec::new(LabField::Inr, "inr", "INR", "ratio", 0.5, 10.0)
        .required()
        .reference("0.8-1.1"),
    FieldSpec::new(LabField::Creatinine, "creatinine", "Creatinine", "mg/dL", 0.1, 20.0)
        .required()
        .reference("0.7-1.3"),
    FieldSpec::new(LabField::Afp, "afp", "AFP", "ng/mL", 0.0, 100_000.0).reference("<10"),
    FieldSpec::new(LabField::Ggt, "ggt", "GGT", "IU/L", 1.0, 3000.0).reference("9-48"),
    FieldSpec::new(LabField::Bmi, "bmi", "BMI", "kg/m2", 10.0, 80.0).reference("18.5-24.9"),
    FieldSpec::new(LabField::Obesity, "obesity", "Obesity", "flag", 0.0, 1.0).integral(),
    FieldSpec::new(LabField::Diabetes, "diabetes", "Diabetes", "flag", 0.0, 1.0).integral(),
    FieldSpec::new(LabField::Ascites, "ascites", "Ascites", "grade", 0.0, 2.0).integral(),
    FieldSpec::new(
        LabField::Encephalopathy,
        "encephalopathy",
        "Encephalopathy",
        "grade",
        0.0,
        2.0,
    )
    .integral(),
];

/// The bounds table in the shape served to form clients.
#[must_use]
pub fn validation_bounds() -> &'static [FieldSpec] {
    &FIELD_SPECS
}

/// Error raised for bad or missing input. User-correctable.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field}: required value is missing")]
    Missing { field: LabField },

    #[error("{field}: {value} is outside the accepted range [{min}, {max}]")]
    OutOfRange {
        field: LabField,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("{field}: '{raw}' is not a number")]
    NotANumber { field: LabField, raw: String },

    #[error("{field}: {value} must be a whole number")]
    NotAnInteger { field: LabField, value: f64 },

    #[error("{field}: supplied more than once with different values")]
    Conflicting { field: LabField },
}

impl ValidationError {
    /// The field the error refers to.
    #[must_use]
    pub fn field(&self) -> LabField {
        match self {
            Self::Missing { field }
            | Self::OutOfRange { field, .. }
            | Self::NotANumber { field, .. }
            | Self::NotAnInteger { field, .. }
            | Self::Conflicting { field } => *field,
        }
    }
}

/// One raw input value as posted by a form or extracted by OCR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Number(f64),
    Text(String),
}

/// Raw input record: form key to (nullable) value.
pub type RawLabRecord = BTreeMap<String, Option<RawValue>>;

/// A validated patient lab record.
///
/// Every present value lies within its field bounds and every required field
/// is present.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct LabRecord {
    values: BTreeMap<LabField, f64>,
}

impl LabRecord {
    /// Parse and validate a raw record.
    ///
    /// Unknown keys are ignored. Blank strings and nulls count as absent.
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] in field order.
    pub fn from_raw(raw: &RawLabRecord) -> Result<Self, ValidationError> {
        Self::from_values(parse_raw(raw)?)
    }

    /// Build a record from already-numeric values.
    ///
    /// # Errors
    /// Returns the first [`ValidationError`] in field order.
    pub fn from_values(
        values: impl IntoIterator<Item = (LabField, f64)>,
    ) -> Result<Self, ValidationError> {
        let mut map = BTreeMap::new();
        for (field, value) in values {
            if let Some(previous) = map.insert(field, value) {
                if previous.to_bits() != value.to_bits() {
                    return Err(ValidationError::Conflicting { field });
                }
            }
        }
        match check_values(&map).into_iter().next() {
            Some(err) => Err(err),
            None => Ok(Self { values: map }),
        }
    }

    /// Collect every validation problem in a raw record instead of stopping
    /// at the first one.
    #[must_use]
    pub fn check_raw(raw: &RawLabRecord) -> Vec<ValidationError> {
        let mut map = BTreeMap::new();
        let mut errors = Vec::new();
        for (key, value) in raw {
            let Some(field) = LabField::from_key(key) else {
                continue;
            };
            match parse_value(field, value.as_ref()) {
                Ok(Some(v)) => {
                    if let Some(previous) = map.insert(field, v) {
                        if previous.to_bits() != v.to_bits() {
                            errors.push(ValidationError::Conflicting { field });
                        }
                    }
                }
                Ok(None) => {}
                Err(e) => errors.push(e),
            }
        }
        let parsed: Vec<LabField> = errors.iter().map(ValidationError::field).collect();
        errors.extend(
            check_values(&map)
                .into_iter()
                .filter(|e| !parsed.contains(&e.field())),
        );
        errors.sort_by_key(ValidationError::field);
        errors
    }

    #[must_use]
    pub fn get(&self, field: LabField) -> Option<f64> {
        self.values.get(&field).copied()
    }

    #[must_use]
    pub fn contains(&self, field: LabField) -> bool {
        self.values.contains_key(&field)
    }

    /// Present values in field order.
    pub fn iter(&self) -> impl Iterator<Item = (LabField, f64)> + '_ {
        self.values.iter().map(|(f, v)| (*f, *v))
    }

    /// Back to the raw wire shape (numbers only).
    #[must_use]
    pub fn to_raw(&self) -> RawLabRecord {
        self.values
            .iter()
            .map(|(f, v)| (f.key().to_string(), Some(RawValue::Number(*v))))
            .collect()
    }
}

fn parse_raw(raw: &RawLabRecord) -> Result<Vec<(LabField, f64)>, ValidationError> {
    let mut out = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        let Some(field) = LabField::from_key(key) else {
            tracing::debug!("Ignoring unknown input key {key:?}");
            continue;
        };
        if let Some(v) = parse_value(field, value.as_ref())? {
            out.push((field, v));
        }
    }
    Ok(out)
}

pub(crate) fn parse_value(
    field: LabField,
    value: Option<&RawValue>,
) -> Result<Option<f64>, ValidationError> {
    let parsed = match value {
        None => return Ok(None),
        Some(RawValue::Number(n)) => *n,
        Some(RawValue::Text(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            // Comma decimal separators are common in lab printouts.
            trimmed
                .replace(',', ".")
                .parse::<f64>()
                .map_err(|_| ValidationError::NotANumber {
                    field,
                    raw: s.clone(),
                })?
        }
    };
    if !parsed.is_finite() {
        return Err(ValidationError::NotANumber {
            field,
            raw: parsed.to_string(),
        });
    }
    Ok(Some(parsed))
}

fn check_values(values: &BTreeMap<LabField, f64>) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for spec in &FIELD_SPECS {
        match values.get(&spec.field) {
            Some(&value) => {
                if !value.is_finite() {
                    errors.push(ValidationError::NotANumber {
                        field: spec.field,
                        raw: value.to_string(),
                    });
                } else if !spec.contains(value) {
                    errors.push(ValidationError::OutOfRange {
                        field: spec.field,
                        value,
                        min: spec.min,
                        max: spec.max,
                    });
                } else if spec.integral && value.fract() != 0.0 {
                    errors.push(ValidationError::NotAnInteger {
                        field: spec.field,
                        value,
                    });
                }
            }
            None if spec.required => errors.push(ValidationError::Missing { field: spec.field }),
            None => {}
        }
    }
    errors
}
