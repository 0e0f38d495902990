use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Who asserted a piece of service metadata. Variant order is trust order:
/// `Otel < Alertmanager < Operator`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagSource {
    Otel,
    Alertmanager,
    Operator,
}

impl TagSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Otel => "otel",
            Self::Alertmanager => "alertmanager",
            Self::Operator => "operator",
        }
    }
}

impl FromStr for TagSource {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "otel" | "telemetry" => Ok(Self::Otel),
            "alertmanager" | "alert" => Ok(Self::Alertmanager),
            "operator" | "manual" => Ok(Self::Operator),
            other => Err(DomainError::UnknownSource(other.to_string())),
        }
    }
}

impl fmt::Display for TagSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
