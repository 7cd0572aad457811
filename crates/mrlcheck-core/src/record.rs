//! Regulatory records as held by the `pesticide_mrl` store.

use serde::{Deserialize, Deserializer, Serialize};

/// EU approval states that block export outright.
///
/// Exact, case-sensitive match against the stored value. Any other state,
/// including ones not seen before, is treated as approved-or-neutral.
pub const NON_APPROVED_STATUSES: &[&str] = &["Not approved", "Not listed"];

/// One crop × active substance row of the regulatory database.
///
/// Owned by the record store; the rule engine only reads it. Column names
/// follow the `pesticide_mrl` table (see [`crate::schema`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegulatoryRecord {
    pub crop: String,
    pub active_substance: String,
    #[serde(default)]
    pub eu_status: Option<String>,
    /// ISO 8601 date or timestamp, kept as stored. Parsed lazily by the EU rules.
    #[serde(default, rename = "eu_expiration")]
    pub eu_expiration_date: Option<String>,
    /// EU maximum residue limit in mg/kg.
    #[serde(default)]
    pub mrl_eu: Option<f64>,
    #[serde(default)]
    pub mrl_eu_flag: Option<String>,
    /// Codex Alimentarius maximum residue limit in mg/kg.
    #[serde(default)]
    pub mrl_codex: Option<f64>,
    #[serde(default)]
    pub mrl_codex_flag: Option<String>,
    #[serde(default)]
    pub pesticide_type: Option<String>,

    // ── GAP (informational) ──
    #[serde(default, deserialize_with = "text_or_number")]
    pub dose: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub max_applications: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub interval_days: Option<String>,
    #[serde(default, rename = "preharvest_eu", deserialize_with = "text_or_number")]
    pub preharvest_interval_eu: Option<String>,
    #[serde(default, rename = "preharvest_codex", deserialize_with = "text_or_number")]
    pub preharvest_interval_codex: Option<String>,
    #[serde(default, rename = "who_class", deserialize_with = "text_or_number")]
    pub who_toxicity_class: Option<String>,
    #[serde(default, deserialize_with = "text_or_number")]
    pub resistance_group: Option<String>,
}

impl RegulatoryRecord {
    /// A record with only its identifying fields set.
    pub fn new(crop: impl Into<String>, active_substance: impl Into<String>) -> Self {
        Self {
            crop: crop.into(),
            active_substance: active_substance.into(),
            eu_status: None,
            eu_expiration_date: None,
            mrl_eu: None,
            mrl_eu_flag: None,
            mrl_codex: None,
            mrl_codex_flag: None,
            pesticide_type: None,
            dose: None,
            max_applications: None,
            interval_days: None,
            preharvest_interval_eu: None,
            preharvest_interval_codex: None,
            who_toxicity_class: None,
            resistance_group: None,
        }
    }

    /// Whether the EU status is one of [`NON_APPROVED_STATUSES`].
    pub fn is_eu_non_approved(&self) -> bool {
        self.eu_status
            .as_deref()
            .is_some_and(|s| NON_APPROVED_STATUSES.contains(&s))
    }

    /// Case-insensitive match on the identifying pair.
    pub fn matches(&self, crop: &str, substance: &str) -> bool {
        self.crop.to_lowercase() == crop.to_lowercase()
            && self.active_substance.to_lowercase() == substance.to_lowercase()
    }
}

/// Summary row returned when listing every substance documented for a crop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubstanceSummary {
    pub active_substance: String,
    #[serde(default)]
    pub pesticide_type: Option<String>,
    #[serde(default)]
    pub eu_status: Option<String>,
    #[serde(default)]
    pub mrl_eu: Option<f64>,
    #[serde(default)]
    pub mrl_codex: Option<f64>,
}

impl From<&RegulatoryRecord> for SubstanceSummary {
    fn from(r: &RegulatoryRecord) -> Self {
        Self {
            active_substance: r.active_substance.clone(),
            pesticide_type: r.pesticide_type.clone(),
            eu_status: r.eu_status.clone(),
            mrl_eu: r.mrl_eu,
            mrl_codex: r.mrl_codex,
        }
    }
}

/// GAP columns are free text in the source sheets but numeric in some exports.
fn text_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(serde_json::Value::Null) => None,
        Some(serde_json::Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
