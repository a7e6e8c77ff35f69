//! Built-in demo patients.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::lab::{LabField, LabRecord, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplePatient {
    Low,
    Moderate,
    High,
}

impl SamplePatient {
    pub const ALL: [SamplePatient; 3] = [Self::Low, Self::Moderate, Self::High];

    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Low => "Low Risk Patient - Healthy Young Adult",
            Self::Moderate => "Moderate Risk Patient - MAFLD with Fibrosis",
            Self::High => "High Risk Patient - Advanced Liver Disease",
        }
    }

    fn values(self) -> [(LabField, f64); 17] {
        use LabField::*;
        match self {
            Self::Low => [
                (Age, 28.0),
                (Gender, 1.0),
                (Bmi, 21.5),
                (Obesity, 0.0),
                (Diabetes, 0.0),
                (Ast, 18.0),
                (Alt, 22.0),
                (Alp, 65.0),
                (Platelets, 320.0),
                (Albumin, 4.7),
                (Inr, 0.9),
                (TotalBilirubin, 0.5),
                (DirectBilirubin, 0.12),
                (Creatinine, 0.7),
                (Afp, 1.8),
                (Ascites, 0.0),
                (Encephalopathy, 0.0),
            ],
            Self::Moderate => [
                (Age, 52.0),
                (Gender, 2.0),
                (Bmi, 29.2),
                (Obesity, 0.0),
                (Diabetes, 1.0),
                (Ast, 78.0),
                (Alt, 92.0),
                (Alp, 145.0),
                (Platelets, 135.0),
                (Albumin, 3.4),
                (Inr, 1.4),
                (TotalBilirubin, 2.1),
                (DirectBilirubin, 0.8),
                (Creatinine, 1.3),
                (Afp, 18.5),
                (Ascites, 0.0),
                (Encephalopathy, 0.0),
            ],
            Self::High => [
                (Age, 58.0),
                (Gender, 2.0),
                (Bmi, 33.8),
                (Obesity, 1.0),
                (Diabetes, 1.0),
                (Ast, 210.0),
                (Alt, 185.0),
                (Alp, 285.0),
                (Platelets, 72.0),
                (Albumin, 2.4),
                (Inr, 2.8),
                (TotalBilirubin, 6.2),
                (DirectBilirubin, 3.8),
                (Creatinine, 2.1),
                (Afp, 280.0),
                (Ascites, 2.0),
                (Encephalopathy, 1.0),
            ],
        }
    }

    /// # Errors
    /// Only if the built-in values drift outside the bounds table.
    pub fn record(self) -> Result<LabRecord, ValidationError> {
        LabRecord::from_values(self.values())
    }
}

impl fmt::Display for SamplePatient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::High => "high",
        })
    }
}

impl FromStr for SamplePatient {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "moderate" => Ok(Self::Moderate),
            "high" => Ok(Self::High),
            other => Err(format!("unknown sample patient '{other}' (low, moderate, high)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_samples_validate() {
        for sample in SamplePatient::ALL {
            let record = sample.record().expect("sample within bounds");
            assert!(record.contains(LabField::Ast), "{sample}");
        }
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("High".parse::<SamplePatient>(), Ok(SamplePatient::High));
        assert!("critical".parse::<SamplePatient>().is_err());
    }
}
