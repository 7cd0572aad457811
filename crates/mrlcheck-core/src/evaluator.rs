//! Compliance evaluation: record lookup followed by the market rule chain.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::rules::{COLEAD_REF, Facts, RuleChain};
use crate::{
    CheckError, ComplianceResult, GapRecommendations, Market, RecordLookup, RegulatoryRecord,
    Severity, Status, SubstanceSummary, ValidationError,
};

/// Decides whether crop/substance combinations meet a market's residue rules.
///
/// Holds no state besides the record store it was built with, so one
/// checker can serve concurrent checks.
#[derive(Clone)]
pub struct ComplianceChecker {
    lookup: Arc<dyn RecordLookup>,
}

impl ComplianceChecker {
    pub fn new(lookup: Arc<dyn RecordLookup>) -> Self {
        Self { lookup }
    }

    /// Check one substance on one crop.
    ///
    /// `target_market` is `"EU"` or `"Codex"` in any case. `residue_level` is
    /// the measured residue in mg/kg, if any.
    pub async fn evaluate(
        &self,
        crop: &str,
        substance: &str,
        target_market: &str,
        residue_level: Option<f64>,
    ) -> Result<ComplianceResult, CheckError> {
        self.evaluate_at(crop, substance, target_market, residue_level, Utc::now())
            .await
    }

    /// As [`evaluate`](Self::evaluate), with expiry computed against `now`.
    pub async fn evaluate_at(
        &self,
        crop: &str,
        substance: &str,
        target_market: &str,
        residue_level: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<ComplianceResult, CheckError> {
        let market: Market = target_market.parse()?;
        self.check(crop, substance, market, residue_level, now).await
    }

    /// Check against an already-parsed market.
    pub async fn check(
        &self,
        crop: &str,
        substance: &str,
        market: Market,
        residue_level: Option<f64>,
        now: DateTime<Utc>,
    ) -> Result<ComplianceResult, CheckError> {
        validate_residue(residue_level)?;

        let Some(record) = self.lookup.find_record(crop, substance).await? else {
            debug!(crop, substance, "no record found");
            return Ok(unknown_result(crop, substance, market, residue_level));
        };

        let facts = Facts::new(&record, residue_level, now);
        let rule = RuleChain::for_market(market).select(&facts);
        debug!(
            crop = %record.crop,
            substance = %record.active_substance,
            market = %market,
            rule = rule.name,
            "rule selected"
        );
        let verdict = (rule.verdict)(&facts);

        let alternatives = if verdict.with_alternatives {
            let pesticide_type = record.pesticide_type.as_deref().unwrap_or_default();
            Some(
                self.lookup
                    .find_alternatives(&record.crop, pesticide_type)
                    .await?,
            )
        } else {
            None
        };
        let gap_recommendations = verdict
            .with_gap
            .then(|| GapRecommendations::from_record(&record));

        let RegulatoryRecord {
            crop,
            active_substance,
            eu_status,
            ..
        } = record;
        Ok(ComplianceResult {
            status: verdict.status,
            severity: verdict.severity,
            message: verdict.message,
            crop,
            substance: active_substance,
            target_market: market.label().to_string(),
            mrl_limit: verdict.mrl_limit,
            mrl_flag: verdict.mrl_flag,
            residue_level: verdict.residue_level,
            eu_status,
            gap_recommendations,
            alternatives,
            references: verdict.references.iter().map(|r| r.to_string()).collect(),
        })
    }

    /// Every substance documented for `crop`, for reporting.
    pub async fn substances_for_crop(
        &self,
        crop: &str,
    ) -> Result<Vec<SubstanceSummary>, CheckError> {
        Ok(self.lookup.list_substances_for_crop(crop).await?)
    }
}

fn validate_residue(residue_level: Option<f64>) -> Result<(), ValidationError> {
    match residue_level {
        Some(r) if !r.is_finite() || r < 0.0 => Err(ValidationError::InvalidResidue(r)),
        _ => Ok(()),
    }
}

fn unknown_result(
    crop: &str,
    substance: &str,
    market: Market,
    residue_level: Option<f64>,
) -> ComplianceResult {
    ComplianceResult {
        status: Status::Unknown,
        severity: Severity::Info,
        message: format!("No data found for {substance} on {crop} in COLEAD database."),
        crop: crop.to_string(),
        substance: substance.to_string(),
        target_market: market.label().to_string(),
        mrl_limit: None,
        mrl_flag: None,
        residue_level,
        eu_status: None,
        gap_recommendations: None,
        alternatives: None,
        references: vec![COLEAD_REF.to_string()],
    }
}
