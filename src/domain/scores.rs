//! Clinical liver scores computed straight from lab values.
//!
//! These are closed-form formulas with no model dependency. Every function
//! rejects non-positive inputs where the formula divides or takes a log, and
//! rejects non-finite results.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::lab::{LabField, LabRecord};

/// AST upper limit of normal used by APRI (IU/L).
pub const AST_UPPER_LIMIT: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ScoreKind {
    #[serde(rename = "MELD")]
    Meld,
    #[serde(rename = "Child-Pugh")]
    ChildPugh,
    #[serde(rename = "FIB-4")]
    Fib4,
    #[serde(rename = "APRI")]
    Apri,
    #[serde(rename = "NFS")]
    Nfs,
    #[serde(rename = "BMI")]
    Bmi,
    #[serde(rename = "AFP")]
    Afp,
}

impl ScoreKind {
    pub const ALL: [ScoreKind; 7] = [
        ScoreKind::Meld,
        ScoreKind::ChildPugh,
        ScoreKind::Fib4,
        ScoreKind::Apri,
        ScoreKind::Nfs,
        ScoreKind::Bmi,
        ScoreKind::Afp,
    ];

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Meld => "MELD",
            Self::ChildPugh => "Child-Pugh",
            Self::Fib4 => "FIB-4",
            Self::Apri => "APRI",
            Self::Nfs => "NFS",
            Self::Bmi => "BMI",
            Self::Afp => "AFP",
        }
    }

    /// Lab fields the score cannot be computed without.
    #[must_use]
    pub fn inputs(self) -> &'static [LabField] {
        match self {
            Self::Meld => &[LabField::TotalBilirubin, LabField::Inr, LabField::Creatinine],
            // Grades are never defaulted.
            Self::ChildPugh => &[
                LabField::TotalBilirubin,
                LabField::Albumin,
                LabField::Inr,
                LabField::Ascites,
                LabField::Encephalopathy,
            ],
            Self::Fib4 => &[LabField::Age, LabField::Ast, LabField::Alt, LabField::Platelets],
            Self::Apri => &[LabField::Ast, LabField::Platelets],
            Self::Nfs => &[
                LabField::Age,
                LabField::Bmi,
                LabField::Ast,
                LabField::Alt,
                LabField::Platelets,
                LabField::Albumin,
            ],
            Self::Bmi => &[LabField::Bmi],
            Self::Afp => &[LabField::Afp],
        }
    }
}

impl fmt::Display for ScoreKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Interpretation band attached to a score value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScoreBand {
    Low,
    Indeterminate,
    Moderate,
    High,
    VeryHigh,
    ClassA,
    ClassB,
    ClassC,
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl fmt::Display for ScoreBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Low => "low",
            Self::Indeterminate => "indeterminate",
            Self::Moderate => "moderate",
            Self::High => "high",
            Self::VeryHigh => "very high",
            Self::ClassA => "Class A",
            Self::ClassB => "Class B",
            Self::ClassC => "Class C",
            Self::Underweight => "underweight",
            Self::Normal => "normal",
            Self::Overweight => "overweight",
            Self::Obese => "obese",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClinicalScore {
    pub name: ScoreKind,
    pub value: f64,
    pub band: ScoreBand,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("unable to compute {score}: {reason}")]
pub struct CalculationError {
    pub score: ScoreKind,
    pub reason: String,
}

impl CalculationError {
    fn new(score: ScoreKind, reason: impl Into<String>) -> Self {
        Self {
            score,
            reason: reason.into(),
        }
    }
}

/// A score that could not be produced for this record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnavailableScore {
    pub name: ScoreKind,
    pub reason: String,
}

/// All clinical scores for one record.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScoreSheet {
    pub scores: Vec<ClinicalScore>,
    pub unavailable: Vec<UnavailableScore>,
}

impl ScoreSheet {
    #[must_use]
    pub fn get(&self, kind: ScoreKind) -> Option<&ClinicalScore> {
        self.scores.iter().find(|s| s.name == kind)
    }
}

fn require_positive(score: ScoreKind, name: &str, value: f64) -> Result<f64, CalculationError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(CalculationError::new(
            score,
            format!("{name} must be positive, got {value}"),
        ))
    }
}

fn finite(score: ScoreKind, value: f64) -> Result<f64, CalculationError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CalculationError::new(score, "result is not a finite number"))
    }
}

/// MELD from bilirubin (mg/dL), INR and creatinine (mg/dL).
///
/// # Errors
/// Fails on non-positive or non-finite inputs.
pub fn meld(bilirubin: f64, inr: f64, creatinine: f64) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::Meld;
    let bili = require_positive(kind, "bilirubin", bilirubin)?.max(1.0);
    let inr = require_positive(kind, "INR", inr)?.max(1.0);
    let creat = require_positive(kind, "creatinine", creatinine)?.max(1.0);

    let raw = 3.78 * bili.ln() + 11.2 * inr.ln() + 9.57 * creat.ln() + 6.43;
    let value = finite(kind, raw)?;

    let band = if value < 10.0 {
        ScoreBand::Low
    } else if value <= 15.0 {
        ScoreBand::Moderate
    } else if value <= 20.0 {
        ScoreBand::High
    } else {
        ScoreBand::VeryHigh
    };
    Ok(ClinicalScore {
        name: kind,
        value,
        band,
    })
}

/// Child-Pugh points and class.
///
/// `ascites` and `encephalopathy` are grades 0 (none), 1 (mild), 2 (moderate
/// or worse), each adding grade + 1 points.
///
/// # Errors
/// Fails on non-positive lab inputs or a grade above 2.
pub fn child_pugh(
    bilirubin: f64,
    albumin: f64,
    inr: f64,
    ascites: u8,
    encephalopathy: u8,
) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::ChildPugh;
    let bili = require_positive(kind, "bilirubin", bilirubin)?;
    let alb = require_positive(kind, "albumin", albumin)?;
    let inr = require_positive(kind, "INR", inr)?;
    for (name, grade) in [("ascites", ascites), ("encephalopathy", encephalopathy)] {
        if grade > 2 {
            return Err(CalculationError::new(
                kind,
                format!("{name} grade must be 0-2, got {grade}"),
            ));
        }
    }

    let bili_points = if bili < 2.0 {
        1
    } else if bili <= 3.0 {
        2
    } else {
        3
    };
    let alb_points = if alb > 3.5 {
        1
    } else if alb >= 2.8 {
        2
    } else {
        3
    };
    let inr_points = if inr < 1.7 {
        1
    } else if inr <= 2.3 {
        2
    } else {
        3
    };
    let total = bili_points + alb_points + inr_points + (ascites + 1) + (encephalopathy + 1);

    let band = match total {
        0..=6 => ScoreBand::ClassA,
        7..=9 => ScoreBand::ClassB,
        _ => ScoreBand::ClassC,
    };
    Ok(ClinicalScore {
        name: kind,
        value: f64::from(total),
        band,
    })
}

/// FIB-4 index: `(age * AST) / (platelets * sqrt(ALT))`.
///
/// # Errors
/// Fails on non-positive inputs.
pub fn fib4(age: f64, ast: f64, alt: f64, platelets: f64) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::Fib4;
    let age = require_positive(kind, "age", age)?;
    let ast = require_positive(kind, "AST", ast)?;
    let alt = require_positive(kind, "ALT", alt)?;
    let plt = require_positive(kind, "platelets", platelets)?;

    let value = finite(kind, (age * ast) / (plt * alt.sqrt()))?;
    let band = if value < 1.3 {
        ScoreBand::Low
    } else if value <= 2.67 {
        ScoreBand::Indeterminate
    } else {
        ScoreBand::High
    };
    Ok(ClinicalScore {
        name: kind,
        value,
        band,
    })
}

/// AST to platelet ratio index.
///
/// # Errors
/// Fails on non-positive inputs.
pub fn apri(ast: f64, platelets: f64) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::Apri;
    let ast = require_positive(kind, "AST", ast)?;
    let plt = require_positive(kind, "platelets", platelets)?;

    let value = finite(kind, (ast / AST_UPPER_LIMIT) / plt * 100.0)?;
    let band = if value < 0.5 {
        ScoreBand::Low
    } else if value <= 1.5 {
        ScoreBand::Indeterminate
    } else {
        ScoreBand::High
    };
    Ok(ClinicalScore {
        name: kind,
        value,
        band,
    })
}

/// NAFLD fibrosis score. `diabetes` is 0 or 1.
///
/// # Errors
/// Fails on non-positive lab inputs.
pub fn nfs(
    age: f64,
    bmi: f64,
    diabetes: f64,
    ast: f64,
    alt: f64,
    platelets: f64,
    albumin: f64,
) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::Nfs;
    let age = require_positive(kind, "age", age)?;
    let bmi = require_positive(kind, "BMI", bmi)?;
    let ast = require_positive(kind, "AST", ast)?;
    let alt = require_positive(kind, "ALT", alt)?;
    let plt = require_positive(kind, "platelets", platelets)?;
    let alb = require_positive(kind, "albumin", albumin)?;

    let raw = -1.675 + 0.037 * age + 0.094 * bmi + 1.13 * diabetes + 0.99 * (ast / alt)
        - 0.013 * plt
        - 0.66 * alb;
    let value = finite(kind, raw)?;
    let band = if value < -1.455 {
        ScoreBand::Low
    } else if value > 0.676 {
        ScoreBand::High
    } else {
        ScoreBand::Indeterminate
    };
    Ok(ClinicalScore {
        name: kind,
        value,
        band,
    })
}

/// # Errors
/// Fails on a non-positive BMI.
pub fn bmi_category(bmi: f64) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::Bmi;
    let value = require_positive(kind, "BMI", bmi)?;
    let band = if value < 18.5 {
        ScoreBand::Underweight
    } else if value < 25.0 {
        ScoreBand::Normal
    } else if value < 30.0 {
        ScoreBand::Overweight
    } else {
        ScoreBand::Obese
    };
    Ok(ClinicalScore {
        name: kind,
        value,
        band,
    })
}

/// # Errors
/// Fails on a negative or non-finite AFP.
pub fn afp_band(afp: f64) -> Result<ClinicalScore, CalculationError> {
    let kind = ScoreKind::Afp;
    if !afp.is_finite() || afp < 0.0 {
        return Err(CalculationError::new(
            kind,
            format!("AFP must be non-negative, got {afp}"),
        ));
    }
    let band = if afp < 10.0 {
        ScoreBand::Low
    } else if afp < 200.0 {
        ScoreBand::Moderate
    } else {
        ScoreBand::High
    };
    Ok(ClinicalScore {
        name: kind,
        value: afp,
        band,
    })
}

fn compute(kind: ScoreKind, record: &LabRecord) -> Result<ClinicalScore, CalculationError> {
    // Callers check `kind.inputs()` first; absent diabetes reads as zero.
    let v = |field: LabField| record.get(field).unwrap_or(0.0);
    let grade = |field: LabField| v(field).clamp(0.0, f64::from(u8::MAX)) as u8;
    match kind {
        ScoreKind::Meld => meld(
            v(LabField::TotalBilirubin),
            v(LabField::Inr),
            v(LabField::Creatinine),
        ),
        ScoreKind::ChildPugh => child_pugh(
            v(LabField::TotalBilirubin),
            v(LabField::Albumin),
            v(LabField::Inr),
            grade(LabField::Ascites),
            grade(LabField::Encephalopathy),
        ),
        ScoreKind::Fib4 => fib4(
            v(LabField::Age),
            v(LabField::Ast),
            v(LabField::Alt),
            v(LabField::Platelets),
        ),
        ScoreKind::Apri => apri(v(LabField::Ast), v(LabField::Platelets)),
        ScoreKind::Nfs => nfs(
            v(LabField::Age),
            v(LabField::Bmi),
            v(LabField::Diabetes),
            v(LabField::Ast),
            v(LabField::Alt),
            v(LabField::Platelets),
            v(LabField::Albumin),
        ),
        ScoreKind::Bmi => bmi_category(v(LabField::Bmi)),
        ScoreKind::Afp => afp_band(v(LabField::Afp)),
    }
}

/// Compute every clinical score the record has inputs for.
///
/// Scores with absent inputs or failing formulas land in
/// [`ScoreSheet::unavailable`] instead of failing the whole sheet.
#[must_use]
pub fn calculate_all(record: &LabRecord) -> ScoreSheet {
    let mut sheet = ScoreSheet::default();
    for kind in ScoreKind::ALL {
        if let Some(missing) = kind.inputs().iter().find(|f| !record.contains(**f)) {
            sheet.unavailable.push(UnavailableScore {
                name: kind,
                reason: format!("missing {missing}"),
            });
            continue;
        }
        match compute(kind, record) {
            Ok(score) => sheet.scores.push(score),
            Err(e) => {
                tracing::debug!("{e}");
                sheet.unavailable.push(UnavailableScore {
                    name: kind,
                    reason: e.to_string(),
                });
            }
        }
    }
    sheet
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64, tol: f64) -> bool {
        (a - b).abs() < tol
    }

    #[test]
    fn test_fib4_reference_case() {
        let score = fib4(50.0, 80.0, 40.0, 150.0).expect("computable");
        assert!(approx(score.value, 4.216, 1e-3), "got {}", score.value);
        assert_eq!(score.band, ScoreBand::High);
    }

    #[test]
    fn test_fib4_bands() {
        // age 40, AST 20, ALT 25, plt 250 -> 0.64
        assert_eq!(fib4(40.0, 20.0, 25.0, 250.0).unwrap().band, ScoreBand::Low);
        // age 55, AST 45, ALT 36, plt 200 -> 2.06
        assert_eq!(
            fib4(55.0, 45.0, 36.0, 200.0).unwrap().band,
            ScoreBand::Indeterminate
        );
    }

    #[test]
    fn test_apri_zero_platelets_fails() {
        let err = apri(80.0, 0.0).expect_err("must fail");
        assert_eq!(err.score, ScoreKind::Apri);
        assert!(err.to_string().starts_with("unable to compute APRI"));
    }

    #[test]
    fn test_apri_value() {
        // (80/40)/100*100 = 2.0
        let score = apri(80.0, 100.0).unwrap();
        assert!(approx(score.value, 2.0, 1e-12));
        assert_eq!(score.band, ScoreBand::High);
        assert_eq!(apri(20.0, 200.0).unwrap().band, ScoreBand::Low);
    }

    #[test]
    fn test_meld_clamps_inputs_to_one() {
        let score = meld(0.5, 0.9, 0.7).unwrap();
        assert!(approx(score.value, 6.43, 1e-12));
        assert_eq!(score.band, ScoreBand::Low);
    }

    #[test]
    fn test_meld_is_unbounded_above() {
        let score = meld(40.0, 8.0, 15.0).unwrap();
        assert!(approx(score.value, 69.579_750_027_913, 1e-9));
        assert_eq!(score.band, ScoreBand::VeryHigh);
    }

    #[test]
    fn test_meld_rejects_zero() {
        assert!(meld(0.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn test_child_pugh_classes() {
        let a = child_pugh(1.0, 4.0, 1.0, 0, 0).unwrap();
        assert_eq!(a.value, 5.0);
        assert_eq!(a.band, ScoreBand::ClassA);

        // 2 + 2 + 2 + 1 + 1
        let b = child_pugh(2.5, 3.0, 2.0, 0, 0).unwrap();
        assert_eq!(b.value, 8.0);
        assert_eq!(b.band, ScoreBand::ClassB);

        // 3 + 3 + 3 + 3 + 2
        let c = child_pugh(4.0, 2.5, 2.5, 2, 1).unwrap();
        assert_eq!(c.value, 14.0);
        assert_eq!(c.band, ScoreBand::ClassC);
    }

    #[test]
    fn test_child_pugh_boundaries() {
        // bilirubin exactly 2 and 3 both score 2; albumin exactly 3.5 scores 2.
        assert_eq!(child_pugh(2.0, 4.0, 1.0, 0, 0).unwrap().value, 6.0);
        assert_eq!(child_pugh(3.0, 4.0, 1.0, 0, 0).unwrap().value, 6.0);
        assert_eq!(child_pugh(1.0, 3.5, 1.0, 0, 0).unwrap().value, 6.0);
        assert_eq!(child_pugh(1.0, 4.0, 2.3, 0, 0).unwrap().value, 6.0);
    }

    #[test]
    fn test_child_pugh_rejects_bad_grade() {
        assert!(child_pugh(1.0, 4.0, 1.0, 3, 0).is_err());
    }

    #[test]
    fn test_nfs_bands() {
        let low = nfs(35.0, 22.0, 0.0, 20.0, 30.0, 280.0, 4.5).unwrap();
        assert_eq!(low.band, ScoreBand::Low);
        let high = nfs(68.0, 34.0, 1.0, 95.0, 48.0, 90.0, 2.9).unwrap();
        assert_eq!(high.band, ScoreBand::High);
    }

    #[test]
    fn test_bmi_and_afp_bands() {
        assert_eq!(bmi_category(17.0).unwrap().band, ScoreBand::Underweight);
        assert_eq!(bmi_category(24.9).unwrap().band, ScoreBand::Normal);
        assert_eq!(bmi_category(25.0).unwrap().band, ScoreBand::Overweight);
        assert_eq!(bmi_category(30.0).unwrap().band, ScoreBand::Obese);
        assert_eq!(afp_band(0.0).unwrap().band, ScoreBand::Low);
        assert_eq!(afp_band(10.0).unwrap().band, ScoreBand::Moderate);
        assert_eq!(afp_band(200.0).unwrap().band, ScoreBand::High);
    }

    #[test]
    fn test_calculate_all_lists_unavailable() {
        let record = LabRecord::from_values([
            (LabField::Age, 50.0),
            (LabField::Ast, 80.0),
            (LabField::Alt, 40.0),
            (LabField::Platelets, 150.0),
            (LabField::Albumin, 3.8),
            (LabField::TotalBilirubin, 1.1),
            (LabField::Inr, 1.1),
            (LabField::Creatinine, 0.9),
        ])
        .unwrap();
        let sheet = calculate_all(&record);
        let names: Vec<ScoreKind> = sheet.scores.iter().map(|s| s.name).collect();
        assert_eq!(names, vec![ScoreKind::Meld, ScoreKind::Fib4, ScoreKind::Apri]);
        let missing: Vec<ScoreKind> = sheet.unavailable.iter().map(|s| s.name).collect();
        assert_eq!(
            missing,
            vec![ScoreKind::ChildPugh, ScoreKind::Nfs, ScoreKind::Bmi, ScoreKind::Afp]
        );
        assert_eq!(sheet.unavailable[0].reason, "missing ascites");
        assert_eq!(sheet.unavailable[1].reason, "missing bmi");
        assert!(approx(sheet.get(ScoreKind::Fib4).unwrap().value, 4.216, 1e-3));
    }

    #[test]
    fn test_score_names_serialize() {
        let json = serde_json::to_string(&ScoreKind::ChildPugh).unwrap();
        assert_eq!(json, "\"Child-Pugh\"");
        let json = serde_json::to_string(&ScoreBand::VeryHigh).unwrap();
        assert_eq!(json, "\"very-high\"");
    }
}
