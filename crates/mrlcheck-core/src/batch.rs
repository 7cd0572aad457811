//! Batch evaluation of many substances for one crop.

use std::collections::BTreeMap;

use chrono::Utc;
use futures::future::{join_all, try_join_all};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{CheckError, ComplianceChecker, ComplianceResult, Market, Status};

/// One substance to check, with its measured residue if known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub substance: String,
    #[serde(default)]
    pub residue_level: Option<f64>,
}

impl BatchItem {
    pub fn new(substance: impl Into<String>, residue_level: Option<f64>) -> Self {
        Self {
            substance: substance.into(),
            residue_level,
        }
    }
}

impl ComplianceChecker {
    /// Check every item against the same crop and market.
    ///
    /// Checks run concurrently; results come back in input order. The first
    /// error aborts the batch and is returned.
    pub async fn evaluate_batch(
        &self,
        crop: &str,
        items: &[BatchItem],
        target_market: &str,
    ) -> Result<Vec<ComplianceResult>, CheckError> {
        let market: Market = target_market.parse()?;
        let now = Utc::now();
        info!(crop, market = %market, count = items.len(), "evaluating batch");
        try_join_all(
            items
                .iter()
                .map(|item| self.check(crop, &item.substance, market, item.residue_level, now)),
        )
        .await
    }

    /// Like [`evaluate_batch`](Self::evaluate_batch), but each item carries
    /// its own outcome so one failed lookup does not discard the rest.
    ///
    /// An unsupported market still fails the whole call.
    pub async fn evaluate_batch_each(
        &self,
        crop: &str,
        items: &[BatchItem],
        target_market: &str,
    ) -> Result<Vec<Result<ComplianceResult, CheckError>>, CheckError> {
        let market: Market = target_market.parse()?;
        let now = Utc::now();
        info!(crop, market = %market, count = items.len(), "evaluating batch per item");
        Ok(join_all(
            items
                .iter()
                .map(|item| self.check(crop, &item.substance, market, item.residue_level, now)),
        )
        .await)
    }
}

/// Count of results per status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub by_status: BTreeMap<Status, usize>,
    pub failed: usize,
}

impl BatchSummary {
    pub fn from_results<'a>(results: impl IntoIterator<Item = &'a ComplianceResult>) -> Self {
        let mut summary = Self::default();
        for r in results {
            summary.record(r.status);
        }
        summary
    }

    pub fn record(&mut self, status: Status) {
        self.total += 1;
        *self.by_status.entry(status).or_default() += 1;
    }

    pub fn record_failure(&mut self) {
        self.total += 1;
        self.failed += 1;
    }

    pub fn count(&self, status: Status) -> usize {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
