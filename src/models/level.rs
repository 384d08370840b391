//! Sensitivity level normalization
//!
//! The classification service reports severity as small integer codes or as
//! free text, sometimes localized. Everything is folded onto three levels.
//! Anything unrecognized becomes MEDIUM so an unclassifiable column is never
//! treated as low risk.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical sensitivity scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SensitivityLevel {
    Low,
    Medium,
    High,
}

impl SensitivityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SensitivityLevel::Low => "LOW",
            SensitivityLevel::Medium => "MEDIUM",
            SensitivityLevel::High => "HIGH",
        }
    }
}

impl fmt::Display for SensitivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Severity as it arrives on the wire: a numeric code or a label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawLevel {
    Code(i64),
    Label(String),
}

impl From<i64> for RawLevel {
    fn from(code: i64) -> Self {
        RawLevel::Code(code)
    }
}

impl From<&str> for RawLevel {
    fn from(label: &str) -> Self {
        RawLevel::Label(label.to_string())
    }
}

const HIGH_LABELS: &[&str] = &[
    "high", "h", "critical", "severe", "sensitive", "高", "高危", "高敏感", "高风险", "极高",
];
const MEDIUM_LABELS: &[&str] = &["medium", "med", "m", "moderate", "中", "中危", "中敏感", "中风险"];
const LOW_LABELS: &[&str] = &["low", "l", "minor", "低", "低危", "低敏感", "低风险"];

/// Map a raw severity onto the canonical scale.
pub fn normalize(raw: &RawLevel) -> SensitivityLevel {
    match raw {
        RawLevel::Code(code) => from_code(*code),
        RawLevel::Label(label) => from_label(label),
    }
}

fn from_code(code: i64) -> SensitivityLevel {
    match code {
        0 => SensitivityLevel::Low,
        1 => SensitivityLevel::Medium,
        2 | 3 => SensitivityLevel::High,
        _ => SensitivityLevel::Medium,
    }
}

fn from_label(label: &str) -> SensitivityLevel {
    let label = label.trim();

    // "2" and friends arrive as strings from some service versions
    if let Ok(code) = label.parse::<i64>() {
        return from_code(code);
    }

    let lowered = label.to_lowercase();
    if HIGH_LABELS.contains(&lowered.as_str()) {
        SensitivityLevel::High
    } else if LOW_LABELS.contains(&lowered.as_str()) {
        SensitivityLevel::Low
    } else if MEDIUM_LABELS.contains(&lowered.as_str()) {
        SensitivityLevel::Medium
    } else {
        log::debug!("Unrecognized sensitivity label {:?}, using MEDIUM", label);
        SensitivityLevel::Medium
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_codes() {
        assert_eq!(normalize(&0.into()), SensitivityLevel::Low);
        assert_eq!(normalize(&1.into()), SensitivityLevel::Medium);
        assert_eq!(normalize(&2.into()), SensitivityLevel::High);
        assert_eq!(normalize(&3.into()), SensitivityLevel::High);
    }

    #[test]
    fn test_out_of_range_codes_default_to_medium() {
        assert_eq!(normalize(&99.into()), SensitivityLevel::Medium);
        assert_eq!(normalize(&(-1).into()), SensitivityLevel::Medium);
    }

    #[test]
    fn test_english_labels_case_insensitive() {
        assert_eq!(normalize(&"HIGH".into()), SensitivityLevel::High);
        assert_eq!(normalize(&"high".into()), SensitivityLevel::High);
        assert_eq!(normalize(&" Medium ".into()), SensitivityLevel::Medium);
        assert_eq!(normalize(&"Low".into()), SensitivityLevel::Low);
    }

    #[test]
    fn test_localized_labels() {
        assert_eq!(normalize(&"高".into()), SensitivityLevel::High);
        assert_eq!(normalize(&"中".into()), SensitivityLevel::Medium);
        assert_eq!(normalize(&"低".into()), SensitivityLevel::Low);
        assert_eq!(normalize(&"高危".into()), SensitivityLevel::High);
    }

    #[test]
    fn test_numeric_strings_use_code_mapping() {
        assert_eq!(normalize(&"0".into()), SensitivityLevel::Low);
        assert_eq!(normalize(&"3".into()), SensitivityLevel::High);
        assert_eq!(normalize(&"42".into()), SensitivityLevel::Medium);
    }

    #[test]
    fn test_unknown_label_defaults_to_medium() {
        assert_eq!(normalize(&"unknown-token".into()), SensitivityLevel::Medium);
        assert_eq!(normalize(&"".into()), SensitivityLevel::Medium);
    }

    #[test]
    fn test_raw_level_deserializes_both_shapes() {
        let code: RawLevel = serde_json::from_str("2").unwrap();
        let label: RawLevel = serde_json::from_str("\"高\"").unwrap();
        assert_eq!(code, RawLevel::Code(2));
        assert_eq!(label, RawLevel::Label("高".to_string()));
    }

    #[test]
    fn test_level_serializes_uppercase() {
        let json = serde_json::to_string(&SensitivityLevel::High).unwrap();
        assert_eq!(json, "\"HIGH\"");
    }
}
