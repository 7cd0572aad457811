//! In-memory record store for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::{
    ALTERNATIVES_LIMIT, APPROVED_STATUS, LookupError, RecordLookup, RegulatoryRecord,
    SubstanceSummary,
};

#[derive(Default)]
pub struct MemoryLookup {
    pub records: Vec<RegulatoryRecord>,
    /// Substances whose lookup fails, to exercise error paths.
    pub failing: Vec<String>,
    pub calls: AtomicUsize,
}

impl MemoryLookup {
    pub fn new(records: Vec<RegulatoryRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordLookup for MemoryLookup {
    async fn find_record(
        &self,
        crop: &str,
        substance: &str,
    ) -> Result<Option<RegulatoryRecord>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.iter().any(|s| s.eq_ignore_ascii_case(substance)) {
            return Err(LookupError::new("memory", format!("store offline for {substance}")));
        }
        Ok(self.records.iter().find(|r| r.matches(crop, substance)).cloned())
    }

    async fn find_alternatives(
        &self,
        crop: &str,
        pesticide_type: &str,
    ) -> Result<Vec<String>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let wanted = pesticide_type.trim().to_lowercase();
        if wanted.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .records
            .iter()
            .filter(|r| r.crop.eq_ignore_ascii_case(crop))
            .filter(|r| {
                r.pesticide_type
                    .as_deref()
                    .is_some_and(|t| t.to_lowercase().contains(&wanted))
            })
            .filter(|r| r.eu_status.as_deref() == Some(APPROVED_STATUS))
            .take(ALTERNATIVES_LIMIT)
            .map(|r| r.active_substance.clone())
            .collect())
    }

    async fn list_substances_for_crop(
        &self,
        crop: &str,
    ) -> Result<Vec<SubstanceSummary>, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut rows: Vec<SubstanceSummary> = self
            .records
            .iter()
            .filter(|r| r.crop.eq_ignore_ascii_case(crop))
            .map(SubstanceSummary::from)
            .collect();
        rows.sort_by(|a, b| {
            b.eu_status
                .cmp(&a.eu_status)
                .then_with(|| a.active_substance.cmp(&b.active_substance))
        });
        Ok(rows)
    }
}

/// Records used across the evaluator tests.
pub fn mango_records() -> Vec<RegulatoryRecord> {
    let mut alpha = RegulatoryRecord::new("Mango", "Alpha-cypermethrin");
    alpha.eu_status = Some("Not approved".into());
    alpha.mrl_eu = Some(0.05);
    alpha.pesticide_type = Some("Insecticide".into());
    alpha.dose = Some("0.2 L/ha".into());

    let mut azoxy = RegulatoryRecord::new("Mango", "Azoxystrobin");
    azoxy.eu_status = Some("Approved".into());
    azoxy.mrl_eu = Some(5.0);
    azoxy.pesticide_type = Some("Fungicide".into());
    azoxy.dose = Some("0.5 L/ha".into());
    azoxy.max_applications = Some("3".into());
    azoxy.preharvest_interval_eu = Some("7".into());

    let mut lambda = RegulatoryRecord::new("Mango", "Lambda-cyhalothrin");
    lambda.eu_status = Some("Approved".into());
    lambda.mrl_eu = Some(0.2);
    lambda.mrl_codex = Some(0.2);
    lambda.pesticide_type = Some("Insecticide (pyrethroid)".into());

    let mut spinosad = RegulatoryRecord::new("Mango", "Spinosad");
    spinosad.eu_status = Some("Approved".into());
    spinosad.mrl_eu = Some(0.3);
    spinosad.pesticide_type = Some("insecticide".into());

    let mut chlorpyrifos = RegulatoryRecord::new("Mango", "Chlorpyrifos");
    chlorpyrifos.eu_status = Some("Not listed".into());
    chlorpyrifos.mrl_eu = Some(0.01);
    chlorpyrifos.mrl_eu_flag = Some("LOQ".into());
    chlorpyrifos.mrl_codex = Some(1.0);
    chlorpyrifos.pesticide_type = Some("Insecticide".into());

    vec![alpha, azoxy, lambda, spinosad, chlorpyrifos]
}
