use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ValidationError;

/// Regulatory regime a check is evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    #[serde(rename = "EU")]
    Eu,
    #[serde(rename = "Codex")]
    Codex,
}

impl Market {
    /// Canonical label echoed in results.
    pub fn label(self) -> &'static str {
        match self {
            Self::Eu => "EU",
            Self::Codex => "Codex",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Market {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "EU" => Ok(Self::Eu),
            "CODEX" => Ok(Self::Codex),
            _ => Err(ValidationError::UnsupportedMarket(s.to_string())),
        }
    }
}
