use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a single vitals reading
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[default]
    Normal,
    Warning,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Normal => "Normal",
            Severity::Warning => "Warning",
            Severity::Critical => "Critical",
        }
    }

    /// Anything other than Normal
    pub fn is_abnormal(&self) -> bool {
        !matches!(self, Severity::Normal)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Normal" => Ok(Severity::Normal),
            "Warning" => Ok(Severity::Warning),
            "Critical" => Ok(Severity::Critical),
            other => bail!("Unknown severity '{}'", other),
        }
    }
}

/// Classify a vitals triple.
///
/// Critical thresholds are checked before warning thresholds; all bounds
/// are exclusive (a heart rate of exactly 140 is not Critical).
pub fn classify(heart_rate: u32, oxygen: u32, temperature: f64) -> Severity {
    if heart_rate > 140 || heart_rate < 40 || oxygen < 85 || temperature > 39.0 {
        return Severity::Critical;
    }

    if heart_rate > 110 || heart_rate < 55 || oxygen < 92 || temperature > 37.8 {
        return Severity::Warning;
    }

    Severity::Normal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_values() {
        assert_eq!(classify(150, 80, 40.0), Severity::Critical);
        assert_eq!(classify(120, 93, 37.0), Severity::Warning);
        assert_eq!(classify(75, 98, 36.5), Severity::Normal);
    }

    #[test]
    fn test_heart_rate_boundaries_are_exclusive() {
        assert_eq!(classify(140, 98, 36.5), Severity::Warning);
        assert_eq!(classify(141, 98, 36.5), Severity::Critical);
        assert_eq!(classify(110, 98, 36.5), Severity::Normal);
        assert_eq!(classify(111, 98, 36.5), Severity::Warning);
        assert_eq!(classify(40, 98, 36.5), Severity::Warning);
        assert_eq!(classify(39, 98, 36.5), Severity::Critical);
        assert_eq!(classify(55, 98, 36.5), Severity::Normal);
        assert_eq!(classify(54, 98, 36.5), Severity::Warning);
    }

    #[test]
    fn test_oxygen_boundaries() {
        assert_eq!(classify(75, 85, 36.5), Severity::Warning);
        assert_eq!(classify(75, 84, 36.5), Severity::Critical);
        assert_eq!(classify(75, 92, 36.5), Severity::Normal);
        assert_eq!(classify(75, 91, 36.5), Severity::Warning);
    }

    #[test]
    fn test_temperature_boundaries() {
        assert_eq!(classify(75, 98, 39.0), Severity::Warning);
        assert_eq!(classify(75, 98, 39.1), Severity::Critical);
        assert_eq!(classify(75, 98, 37.8), Severity::Normal);
        assert_eq!(classify(75, 98, 37.9), Severity::Warning);
    }

    #[test]
    fn test_critical_wins_over_warning() {
        // Warning-level heart rate combined with critical oxygen
        assert_eq!(classify(120, 80, 36.5), Severity::Critical);
    }

    #[test]
    fn test_classify_is_deterministic() {
        for hr in (30..160).step_by(7) {
            for o2 in (80..100).step_by(3) {
                let first = classify(hr, o2, 37.0);
                assert_eq!(first, classify(hr, o2, 37.0));
            }
        }
    }

    #[test]
    fn test_severity_string_roundtrip() {
        for severity in [Severity::Normal, Severity::Warning, Severity::Critical] {
            assert_eq!(severity.to_string().parse::<Severity>().unwrap(), severity);
        }
        assert!("Unknown".parse::<Severity>().is_err());
    }

    #[test]
    fn test_severity_serializes_as_name() {
        let json = serde_json::to_string(&Severity::Critical).unwrap();
        assert_eq!(json, "\"Critical\"");
    }
}
