//! Mapping of lab-report field names (as extracted from scanned documents)
//! onto lab fields.
//!
//! Extraction itself happens outside this crate; this module only resolves the
//! names it produces. Keys are compared after [`normalize_label`], so
//! `"Total Bilirubin"`, `"total_bilirubin"` and `"TOTAL-BILIRUBIN"` all hit
//! the same entry.

use serde_json::{Map, Value};

use super::lab::{parse_value, LabField, RawLabRecord, RawValue, ValidationError};

/// Report label aliases. Each normalized alias appears exactly once.
pub const OCR_FIELD_MAP: &[(&str, LabField)] = &[
    ("age", LabField::Age),
    ("yas", LabField::Age),
    ("gender", LabField::Gender),
    ("sex", LabField::Gender),
    ("cinsiyet", LabField::Gender),
    ("ast", LabField::Ast),
    ("sgot", LabField::Ast),
    ("aspartate aminotransferase", LabField::Ast),
    ("alt", LabField::Alt),
    ("sgpt", LabField::Alt),
    ("alanine aminotransferase", LabField::Alt),
    ("alp", LabField::Alp),
    ("alkaline phosphatase", LabField::Alp),
    ("total bilirubin", LabField::TotalBilirubin),
    ("t.bil", LabField::TotalBilirubin),
    ("total bil", LabField::TotalBilirubin),
    ("bilirubin", LabField::TotalBilirubin),
    ("direct bilirubin", LabField::DirectBilirubin),
    ("d.bil", LabField::DirectBilirubin),
    ("dir bil", LabField::DirectBilirubin),
    ("conjugated bilirubin", LabField::DirectBilirubin),
    ("albumin", LabField::Albumin),
    ("alb", LabField::Albumin),
    ("platelets", LabField::Platelets),
    ("platelet", LabField::Platelets),
    ("platelet count", LabField::Platelets),
    ("plt", LabField::Platelets),
    ("trombosit", LabField::Platelets),
    ("inr", LabField::Inr),
    ("pt-inr", LabField::Inr),
    ("creatinine", LabField::Creatinine),
    ("creatin", LabField::Creatinine),
    ("kreatinin", LabField::Creatinine),
    ("afp", LabField::Afp),
    ("alpha-fetoprotein", LabField::Afp),
    ("ggt", LabField::Ggt),
    ("gamma-glutamyl transferase", LabField::Ggt),
    ("bmi", LabField::Bmi),
    ("body mass index", LabField::Bmi),
];

/// Lowercase and keep only ASCII alphanumerics.
#[must_use]
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

#[must_use]
pub fn lookup(label: &str) -> Option<LabField> {
    let key = normalize_label(label);
    OCR_FIELD_MAP
        .iter()
        .find(|(alias, _)| normalize_label(alias) == key)
        .map(|(_, field)| *field)
}

/// Convert extracted report fields into a raw lab record.
///
/// Returns the record plus the labels that matched nothing. Values that are
/// neither numbers nor strings (objects, arrays, booleans) are treated as
/// absent. Several labels may name the same field as long as they agree.
///
/// # Errors
/// `ValidationError::Conflicting` when two labels for one field carry
/// different values.
pub fn map_ocr_fields(
    extracted: &Map<String, Value>,
) -> Result<(RawLabRecord, Vec<String>), ValidationError> {
    let mut record = RawLabRecord::new();
    let mut unmapped = Vec::new();
    for (label, value) in extracted {
        let Some(field) = lookup(label) else {
            unmapped.push(label.clone());
            continue;
        };
        let raw = match value {
            Value::Number(n) => n.as_f64().map(RawValue::Number),
            Value::String(s) => Some(RawValue::Text(s.clone())),
            _ => None,
        };
        let incoming = parse_value(field, raw.as_ref());
        if let Some(previous) = record.get(field.key()) {
            if matches!(incoming, Ok(None)) {
                continue;
            }
            let existing = parse_value(field, previous.as_ref());
            if !matches!(existing, Ok(None)) {
                if existing != incoming {
                    tracing::warn!("Report labels disagree on {field}");
                    return Err(ValidationError::Conflicting { field });
                }
                continue;
            }
        }
        record.insert(field.key().to_string(), raw);
    }
    if !unmapped.is_empty() {
        tracing::debug!("{} extracted labels did not map to a lab field", unmapped.len());
    }
    Ok((record, unmapped))
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::domain::lab::LabRecord;

    #[test]
    fn test_no_duplicate_aliases() {
        let mut seen = HashSet::new();
        for (alias, _) in OCR_FIELD_MAP {
            let key = normalize_label(alias);
            assert!(!key.is_empty(), "alias {alias:?} normalizes to nothing");
            assert!(seen.insert(key.clone()), "duplicate alias {alias:?} ({key})");
        }
    }

    #[test]
    fn test_every_field_except_flags_is_reachable() {
        let mapped: HashSet<LabField> = OCR_FIELD_MAP.iter().map(|(_, f)| *f).collect();
        for field in LabField::ALL {
            let clinician_only = matches!(
                field,
                LabField::Obesity | LabField::Diabetes | LabField::Ascites | LabField::Encephalopathy
            );
            assert_eq!(mapped.contains(&field), !clinician_only, "{field}");
        }
    }

    #[test]
    fn test_lookup_variants() {
        assert_eq!(lookup("SGOT"), Some(LabField::Ast));
        assert_eq!(lookup("Total Bilirubin"), Some(LabField::TotalBilirubin));
        assert_eq!(lookup("total_bilirubin"), Some(LabField::TotalBilirubin));
        assert_eq!(lookup("T.Bil"), Some(LabField::TotalBilirubin));
        assert_eq!(lookup("PT-INR"), Some(LabField::Inr));
        assert_eq!(lookup("Hemoglobin"), None);
    }

    #[test]
    fn test_map_extracted_report() {
        let extracted = serde_json::json!({
            "Age": 61,
            "SGOT": "92",
            "SGPT": 55,
            "PLT": "118",
            "Albumin": "3.3",
            "Total Bilirubin": 1.9,
            "INR": "1.2",
            "Creatinine": 1.1,
            "Hemoglobin": 12.1,
            "AFP": null
        });
        let (raw, unmapped) = map_ocr_fields(extracted.as_object().unwrap()).expect("no conflicts");
        assert_eq!(unmapped, vec!["Hemoglobin".to_string()]);
        assert_eq!(raw.get("afp"), Some(&None));
        let record = LabRecord::from_raw(&raw).expect("valid record");
        assert_eq!(record.get(LabField::Platelets), Some(118.0));
        assert_eq!(record.get(LabField::Ast), Some(92.0));
    }

    #[test]
    fn test_disagreeing_labels_for_one_field_are_rejected() {
        let extracted = serde_json::json!({
            "Age": 50,
            "AST": 80,
            "ALT": 40,
            "PLT": 150,
            "Albumin": 3.8,
            "INR": 1.1,
            "Creatinine": 0.9,
            "T.Bil": 6.0,
            "Total Bilirubin": 1.9
        });
        let err = map_ocr_fields(extracted.as_object().unwrap()).unwrap_err();
        assert_eq!(err, ValidationError::Conflicting { field: LabField::TotalBilirubin });
    }

    #[test]
    fn test_agreeing_or_blank_duplicate_labels_are_merged() {
        let extracted = serde_json::json!({
            "SGOT": "92",
            "AST": 92.0,
            "Total Bilirubin": "",
            "T.Bil": "1,9",
            "Bilirubin": null
        });
        let (raw, _) = map_ocr_fields(extracted.as_object().unwrap()).expect("no conflicts");
        assert!(matches!(raw.get("total_bilirubin"), Some(Some(RawValue::Text(s))) if s == "1,9"));
        assert!(raw.get("ast").is_some_and(Option::is_some));
    }
}
