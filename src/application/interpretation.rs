//! Key findings and recommendations attached to each model result.
//!
//! Findings read the lab record directly; they are independent of the model
//! probability. Recommendations are keyed by the risk category.

use crate::domain::{Disease, LabField, LabRecord, RiskLevel, RiskResult};

fn ratio(record: &LabRecord, num: LabField, den: LabField) -> Option<f64> {
    match (record.get(num), record.get(den)) {
        (Some(n), Some(d)) if d > 0.0 => Some(n / d),
        _ => None,
    }
}

fn cirrhosis_findings(record: &LabRecord) -> Vec<String> {
    let mut out = Vec::new();
    if let Some(r) = ratio(record, LabField::Ast, LabField::Alt).filter(|r| *r > 1.0) {
        out.push(format!("AST/ALT ratio of {r:.2} suggests possible liver damage"));
    }
    if let Some(plt) = record.get(LabField::Platelets).filter(|p| *p < 150.0) {
        out.push(format!("Low platelet count ({plt}) may indicate portal hypertension"));
    }
    if let Some(alb) = record.get(LabField::Albumin).filter(|a| *a < 3.5) {
        out.push(format!("Low albumin ({alb}) suggests impaired liver synthesis"));
    }
    if let Some(inr) = record.get(LabField::Inr).filter(|i| *i > 1.3) {
        out.push(format!("Elevated INR ({inr}) indicates coagulopathy"));
    }
    out
}

fn hcc_findings(record: &LabRecord) -> Vec<String> {
    let mut out = Vec::new();
    if record.get(LabField::Age).is_some_and(|a| a > 60.0) {
        out.push("Advanced age increases HCC risk".to_string());
    }
    if record.get(LabField::Gender) == Some(2.0) {
        out.push("Male gender is associated with higher HCC risk".to_string());
    }
    let enzymes = [LabField::Ast, LabField::Alt];
    if enzymes.iter().any(|f| record.get(*f).is_some_and(|v| v > 80.0)) {
        out.push("Significantly elevated liver enzymes suggest hepatocellular injury".to_string());
    }
    if record.get(LabField::Platelets).is_some_and(|p| p < 150.0) {
        out.push("Thrombocytopenia may indicate advanced liver disease".to_string());
    }
    match record.get(LabField::Afp) {
        Some(afp) if afp > 400.0 => out.push(format!("Very high AFP ({afp} ng/mL) strongly suggests HCC")),
        Some(afp) if afp > 200.0 => out.push(format!("Elevated AFP ({afp} ng/mL) is concerning for HCC")),
        Some(afp) if afp > 20.0 => out.push(format!("Mildly elevated AFP ({afp} ng/mL) warrants monitoring")),
        _ => {}
    }
    out
}

fn mafld_findings(record: &LabRecord) -> Vec<String> {
    let mut out = Vec::new();
    match record.get(LabField::Bmi) {
        Some(bmi) if bmi >= 30.0 => {
            out.push(format!("Obesity (BMI {bmi}) significantly increases progression risk"));
        }
        Some(bmi) if bmi >= 25.0 => {
            out.push(format!("Overweight status (BMI {bmi}) is a moderate risk factor"));
        }
        _ => {}
    }
    let enzymes = [LabField::Ast, LabField::Alt];
    if enzymes.iter().any(|f| record.get(*f).is_some_and(|v| v > 40.0)) {
        out.push("Elevated liver enzymes suggest hepatic inflammation".to_string());
    }
    if ratio(record, LabField::Ast, LabField::Alt).is_some_and(|r| r > 1.5) {
        out.push("AST/ALT ratio above 1.5 may indicate more advanced disease".to_string());
    }
    out
}

/// Lab-derived findings relevant to one disease model.
#[must_use]
pub fn findings(disease: Disease, record: &LabRecord) -> Vec<String> {
    match disease {
        Disease::Cirrhosis => cirrhosis_findings(record),
        Disease::Hcc => hcc_findings(record),
        Disease::Mafld => mafld_findings(record),
    }
}

/// One-sentence recommendation for a model result.
#[must_use]
pub fn recommendation(result: &RiskResult) -> &'static str {
    use RiskLevel::*;
    match (result.model, result.category) {
        (Disease::Cirrhosis, Low) => "Low risk - routine monitoring and lifestyle modifications advised.",
        (Disease::Cirrhosis, Moderate) => {
            "Moderate risk - consider hepatology referral and regular monitoring."
        }
        (Disease::Cirrhosis, High | VeryHigh) => "High risk warrants urgent hepatology consultation.",
        (Disease::Hcc, Low) => "Low risk but continue surveillance if risk factors present.",
        (Disease::Hcc, Moderate) => "Moderate risk requires close monitoring and follow-up.",
        (Disease::Hcc, High | VeryHigh) => {
            "High risk warrants immediate hepatology evaluation and imaging."
        }
        (Disease::Mafld, Low | Moderate) => {
            "Management focuses on lifestyle modifications and monitoring for progression."
        }
        (Disease::Mafld, High | VeryHigh) => {
            "Steatohepatitis pattern: lifestyle intervention, regular monitoring and possible medical treatment."
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RiskThresholds, SamplePatient};

    fn result(model: Disease, category: RiskLevel) -> RiskResult {
        RiskResult {
            model,
            probability: 0.5,
            category,
            thresholds: RiskThresholds {
                moderate: 0.3,
                high: 0.7,
                very_high: None,
            },
            artifact_version: "t".into(),
            label: None,
        }
    }

    #[test]
    fn test_low_sample_has_no_findings() {
        let record = SamplePatient::Low.record().unwrap();
        for disease in Disease::ALL {
            assert!(findings(disease, &record).is_empty(), "{disease}");
        }
    }

    #[test]
    fn test_high_sample_cirrhosis_findings() {
        let record = SamplePatient::High.record().unwrap();
        let f = findings(Disease::Cirrhosis, &record);
        assert_eq!(f.len(), 4);
        assert!(f[0].starts_with("AST/ALT ratio of 1.14"));
        assert!(f[1].contains("(72)"));
    }

    #[test]
    fn test_hcc_afp_tiers() {
        let record = SamplePatient::High.record().unwrap();
        let f = findings(Disease::Hcc, &record);
        assert!(f.iter().any(|s| s.starts_with("Elevated AFP (280 ng/mL)")));
        assert!(f.iter().any(|s| s.starts_with("Male gender")));

        let moderate = SamplePatient::Moderate.record().unwrap();
        let f = findings(Disease::Hcc, &moderate);
        assert!(!f.iter().any(|s| s.contains("AFP")), "AFP 18.5 is below every tier");
    }

    #[test]
    fn test_mafld_findings() {
        let record = SamplePatient::Moderate.record().unwrap();
        let f = findings(Disease::Mafld, &record);
        assert!(f[0].starts_with("Overweight status"));
        assert!(f.iter().any(|s| s.contains("hepatic inflammation")));
    }

    #[test]
    fn test_recommendations_follow_category() {
        assert!(recommendation(&result(Disease::Cirrhosis, RiskLevel::VeryHigh)).contains("urgent"));
        assert!(recommendation(&result(Disease::Hcc, RiskLevel::Low)).contains("surveillance"));
        assert_ne!(
            recommendation(&result(Disease::Mafld, RiskLevel::Low)),
            recommendation(&result(Disease::Mafld, RiskLevel::High))
        );
    }
}
