//! Compliance outcomes handed back to callers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::GapRecommendations;

/// Classification of a compliance check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Compliant,
    NonCompliant,
    Warning,
    Info,
    Unknown,
}

impl Status {
    pub const ALL: [Status; 5] = [
        Self::Compliant,
        Self::NonCompliant,
        Self::Warning,
        Self::Info,
        Self::Unknown,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compliant => "COMPLIANT",
            Self::NonCompliant => "NON_COMPLIANT",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How much risk a result carries. `Info` when there is none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    Info,
    Minor,
    Major,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "INFO",
            Self::Minor => "MINOR",
            Self::Major => "MAJOR",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of checking one crop/substance pair against one market.
///
/// Built once per check and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceResult {
    pub status: Status,
    pub severity: Severity,
    pub message: String,
    pub crop: String,
    pub substance: String,
    pub target_market: String,
    /// Limit (mg/kg) of the market that was evaluated.
    pub mrl_limit: Option<f64>,
    pub mrl_flag: Option<String>,
    pub residue_level: Option<f64>,
    /// EU approval state, echoed whatever the market.
    pub eu_status: Option<String>,
    pub gap_recommendations: Option<GapRecommendations>,
    pub alternatives: Option<Vec<String>>,
    pub references: Vec<String>,
}
