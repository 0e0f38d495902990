use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Fatal,
    Critical,
    Warning,
    None,
}

impl Severity {
    /// Case-insensitive mapping of the severities alerting pipelines emit.
    /// Unrecognised values fall back to `Warning`.
    pub fn from_label(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Self::Critical,
            "warning" => Self::Warning,
            "fatal" | "emergency" => Self::Fatal,
            "info" | "none" => Self::None,
            _ => Self::Warning,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "fatal",
            Self::Critical => "critical",
            Self::Warning => "warning",
            Self::None => "none",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapping_is_case_insensitive() {
        assert_eq!(Severity::from_label("CRITICAL"), Severity::Critical);
        assert_eq!(Severity::from_label(" Warning "), Severity::Warning);
    }

    #[test]
    fn aliases_collapse() {
        assert_eq!(Severity::from_label("emergency"), Severity::Fatal);
        assert_eq!(Severity::from_label("fatal"), Severity::Fatal);
        assert_eq!(Severity::from_label("info"), Severity::None);
        assert_eq!(Severity::from_label("none"), Severity::None);
    }

    #[test]
    fn unknown_defaults_to_warning() {
        assert_eq!(Severity::from_label("page"), Severity::Warning);
        assert_eq!(Severity::from_label(""), Severity::Warning);
    }
}
