//! Good Agricultural Practice payload attached to most compliance results.

use serde::{Deserialize, Serialize};

use crate::RegulatoryRecord;

/// Agronomic-practice guidance projected from a [`RegulatoryRecord`].
///
/// Every field is copied as-is; an absent source field stays absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GapRecommendations {
    pub dose: Option<String>,
    pub max_applications: Option<String>,
    pub interval_days: Option<String>,
    pub preharvest_interval_eu: Option<String>,
    pub preharvest_interval_codex: Option<String>,
    pub who_toxicity_class: Option<String>,
    pub pesticide_type: Option<String>,
    pub resistance_group: Option<String>,
}

impl GapRecommendations {
    pub fn from_record(record: &RegulatoryRecord) -> Self {
        Self {
            dose: record.dose.clone(),
            max_applications: record.max_applications.clone(),
            interval_days: record.interval_days.clone(),
            preharvest_interval_eu: record.preharvest_interval_eu.clone(),
            preharvest_interval_codex: record.preharvest_interval_codex.clone(),
            who_toxicity_class: record.who_toxicity_class.clone(),
            pesticide_type: record.pesticide_type.clone(),
            resistance_group: record.resistance_group.clone(),
        }
    }

    /// True when the record carried no GAP data at all.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Labelled non-empty fields, in display order.
    pub fn entries(&self) -> Vec<(&'static str, &str)> {
        [
            ("dose", &self.dose),
            ("max applications", &self.max_applications),
            ("interval (days)", &self.interval_days),
            ("PHI EU (days)", &self.preharvest_interval_eu),
            ("PHI Codex (days)", &self.preharvest_interval_codex),
            ("WHO class", &self.who_toxicity_class),
            ("pesticide type", &self.pesticide_type),
            ("resistance group", &self.resistance_group),
        ]
        .into_iter()
        .filter_map(|(label, v)| v.as_deref().map(|v| (label, v)))
        .collect()
    }
}
