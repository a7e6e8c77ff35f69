//! Plain-text and JSON renderings of an assessment report.

use std::fmt::Write as _;

use super::assessment::AssessmentReport;
use crate::domain::LabField;

const RULE: &str = "------------------------------------------------------------";

/// Human-readable summary for terminals and plain-text export.
#[must_use]
pub fn render_text(report: &AssessmentReport) -> String {
    let mut out = String::new();
    // Writing into a String cannot fail.
    let _ = write_text(&mut out, report);
    out
}

fn write_text(out: &mut String, report: &AssessmentReport) -> std::fmt::Result {
    writeln!(out, "LIVER DISEASE RISK ASSESSMENT")?;
    writeln!(out, "Report {}", report.id)?;
    writeln!(out, "Generated {}", report.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
    writeln!(out)?;

    writeln!(out, "LABORATORY VALUES")?;
    writeln!(out, "{RULE}")?;
    writeln!(out, "{:<26} {:>10}  {:<12} {}", "Test", "Value", "Unit", "Reference")?;
    for (field, value) in report.inputs.iter() {
        let spec = field.spec();
        writeln!(
            out,
            "{:<26} {:>10}  {:<12} {}",
            spec.label,
            format_value(field, value),
            spec.unit,
            spec.reference.unwrap_or("-")
        )?;
    }
    writeln!(out)?;

    writeln!(out, "CLINICAL SCORES")?;
    writeln!(out, "{RULE}")?;
    for score in &report.clinical_scores {
        writeln!(out, "{:<12} {:>8.2}  {}", score.name.name(), score.value, score.band)?;
    }
    for missing in &report.unavailable_scores {
        writeln!(out, "{:<12} {:>8}  {}", missing.name.name(), "n/a", missing.reason)?;
    }
    writeln!(out)?;

    writeln!(out, "MODEL RISK")?;
    writeln!(out, "{RULE}")?;
    for risk in &report.model_risks {
        let r = &risk.result;
        write!(
            out,
            "{:<24} {:>6.1}%  {}",
            r.model.title(),
            r.probability * 100.0,
            r.category
        )?;
        if let Some(label) = &r.label {
            write!(out, " ({label})")?;
        }
        writeln!(out, "  [model {}]", r.artifact_version)?;
        writeln!(out, "    {}", r.category.description())?;
        for finding in &risk.findings {
            writeln!(out, "    - {finding}")?;
        }
        writeln!(out, "    Recommendation: {}", risk.recommendation)?;
    }
    if !report.degraded.is_empty() {
        let names: Vec<&str> = report.degraded.iter().map(|d| d.title()).collect();
        writeln!(out, "Not assessed (model unavailable): {}", names.join(", "))?;
    }
    writeln!(out)?;

    if report.seek_immediate_care {
        writeln!(out, "!! These results suggest you should seek medical care promptly.")?;
    } else {
        writeln!(out, "No urgent findings. Discuss these results with your physician.")?;
    }
    writeln!(
        out,
        "This assessment is a screening aid and does not replace a clinical diagnosis."
    )?;
    Ok(())
}

fn format_value(field: LabField, value: f64) -> String {
    if field.spec().integral {
        format!("{value:.0}")
    } else {
        format!("{value}")
    }
}

/// Export payload as pretty JSON.
///
/// # Errors
/// Returns the serializer error (non-finite numbers cannot occur in a
/// validated report).
pub fn to_json(report: &AssessmentReport) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(report)
}
