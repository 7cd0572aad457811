//! Market rule chains.
//!
//! Each market is an ordered list of [`Rule`]s evaluated top to bottom; the
//! first rule whose guard holds decides the outcome, and a final fallback
//! rule always applies. Order is part of the contract: for the EU, a
//! non-approved substance is critical even when its residue is under the limit,
//! and an expiring approval is reported before any residue comparison.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tracing::warn;

use crate::{Market, RegulatoryRecord, Severity, Status};

pub const COLEAD_REF: &str = "COLEAD GAP Database";
pub const EU_REGULATION_REF: &str = "EU Reg 396/2005";
pub const CODEX_REF: &str = "Codex Alimentarius";

/// Approvals expiring in fewer days than this are flagged.
pub const EXPIRY_WARNING_DAYS: i64 = 180;

/// Flag value marking a limit set at the limit of quantification.
pub const LOQ_FLAG: &str = "LOQ";

const SECONDS_PER_DAY: i64 = 86_400;

/// Inputs a rule may inspect, derived once per check.
#[derive(Debug, Clone, Copy)]
pub struct Facts<'a> {
    pub record: &'a RegulatoryRecord,
    pub residue_level: Option<f64>,
    /// Whole days until the EU approval expires. `None` when no expiration
    /// is recorded or the stored value does not parse.
    pub days_to_expiry: Option<i64>,
}

impl<'a> Facts<'a> {
    pub fn new(record: &'a RegulatoryRecord, residue_level: Option<f64>, now: DateTime<Utc>) -> Self {
        let days_to_expiry = record
            .eu_expiration_date
            .as_deref()
            .and_then(|raw| days_until(raw, now));
        Self {
            record,
            residue_level,
            days_to_expiry,
        }
    }
}

/// What a rule decided, before the evaluator attaches GAP data and alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub status: Status,
    pub severity: Severity,
    pub message: String,
    pub mrl_limit: Option<f64>,
    pub mrl_flag: Option<String>,
    pub residue_level: Option<f64>,
    pub with_gap: bool,
    pub with_alternatives: bool,
    pub references: &'static [&'static str],
}

/// A guard paired with the outcome it produces.
pub struct Rule {
    pub name: &'static str,
    pub guard: fn(&Facts<'_>) -> bool,
    pub verdict: fn(&Facts<'_>) -> Verdict,
}

/// Ordered rules plus the fallback taken when none match.
pub struct RuleChain {
    pub rules: &'static [Rule],
    pub fallback: Rule,
}

impl RuleChain {
    pub fn for_market(market: Market) -> &'static RuleChain {
        match market {
            Market::Eu => &EU_CHAIN,
            Market::Codex => &CODEX_CHAIN,
        }
    }

    /// First rule whose guard holds, or the fallback.
    pub fn select(&self, facts: &Facts<'_>) -> &Rule {
        self.rules
            .iter()
            .find(|rule| (rule.guard)(facts))
            .unwrap_or(&self.fallback)
    }
}

// ── EU ──

pub static EU_CHAIN: RuleChain = RuleChain {
    rules: &[
        Rule {
            name: "eu-not-approved",
            guard: |f| f.record.is_eu_non_approved(),
            verdict: eu_not_approved,
        },
        Rule {
            name: "eu-approval-expiring",
            guard: |f| f.days_to_expiry.is_some_and(|d| d < EXPIRY_WARNING_DAYS),
            verdict: eu_expiring,
        },
        Rule {
            name: "eu-residue-exceeds",
            guard: |f| matches!((f.residue_level, f.record.mrl_eu), (Some(r), Some(l)) if r > l),
            verdict: eu_exceeds,
        },
        Rule {
            name: "eu-residue-within",
            guard: |f| f.residue_level.is_some() && f.record.mrl_eu.is_some(),
            verdict: eu_within,
        },
    ],
    fallback: Rule {
        name: "eu-info",
        guard: |_| true,
        verdict: eu_info,
    },
};

fn eu_not_approved(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::NonCompliant,
        severity: Severity::Critical,
        message: format!(
            "{} is NOT APPROVED in EU for {}. Cannot export to EU market.",
            r.active_substance, r.crop
        ),
        mrl_limit: r.mrl_eu,
        mrl_flag: r.mrl_eu_flag.clone(),
        residue_level: f.residue_level,
        with_gap: false,
        with_alternatives: true,
        references: &[COLEAD_REF, EU_REGULATION_REF],
    }
}

fn eu_expiring(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::Warning,
        severity: Severity::Major,
        message: format!(
            "{} EU approval expires in {} days ({}). Monitor for renewal.",
            r.active_substance,
            f.days_to_expiry.unwrap_or_default(),
            r.eu_expiration_date.as_deref().unwrap_or_default()
        ),
        mrl_limit: r.mrl_eu,
        mrl_flag: r.mrl_eu_flag.clone(),
        residue_level: f.residue_level,
        with_gap: true,
        with_alternatives: false,
        references: &[COLEAD_REF],
    }
}

fn eu_exceeds(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::NonCompliant,
        severity: Severity::Major,
        message: format!(
            "Residue level {} mg/kg exceeds EU MRL of {} mg/kg.",
            fmt_mg(f.residue_level),
            fmt_mg(r.mrl_eu)
        ),
        mrl_limit: r.mrl_eu,
        mrl_flag: r.mrl_eu_flag.clone(),
        residue_level: f.residue_level,
        with_gap: true,
        with_alternatives: false,
        references: &[COLEAD_REF, EU_REGULATION_REF],
    }
}

fn eu_within(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    let loq_note = if r.mrl_eu_flag.as_deref() == Some(LOQ_FLAG) {
        " (at LOQ)"
    } else {
        ""
    };
    Verdict {
        status: Status::Compliant,
        severity: Severity::Info,
        message: format!(
            "Compliant with EU standards. Residue {} mg/kg ≤ MRL {} mg/kg{loq_note}.",
            fmt_mg(f.residue_level),
            fmt_mg(r.mrl_eu)
        ),
        mrl_limit: r.mrl_eu,
        mrl_flag: r.mrl_eu_flag.clone(),
        residue_level: f.residue_level,
        with_gap: true,
        with_alternatives: false,
        references: &[COLEAD_REF],
    }
}

fn eu_info(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::Info,
        severity: Severity::Info,
        message: format!(
            "EU MRL for {} on {}: {}. Status: {}",
            r.active_substance,
            r.crop,
            limit_text(r.mrl_eu),
            r.eu_status.as_deref().unwrap_or("unknown")
        ),
        mrl_limit: r.mrl_eu,
        mrl_flag: r.mrl_eu_flag.clone(),
        residue_level: None,
        with_gap: true,
        with_alternatives: false,
        references: &[COLEAD_REF],
    }
}

// ── Codex ──

pub static CODEX_CHAIN: RuleChain = RuleChain {
    rules: &[
        Rule {
            name: "codex-no-limit",
            guard: |f| f.record.mrl_codex.is_none(),
            verdict: codex_no_limit,
        },
        Rule {
            name: "codex-residue-exceeds",
            guard: |f| matches!((f.residue_level, f.record.mrl_codex), (Some(r), Some(l)) if r > l),
            verdict: codex_exceeds,
        },
        Rule {
            name: "codex-residue-within",
            guard: |f| f.residue_level.is_some(),
            verdict: codex_within,
        },
    ],
    fallback: Rule {
        name: "codex-info",
        guard: |_| true,
        verdict: codex_info,
    },
};

const CODEX_REFS: &[&str] = &[COLEAD_REF, CODEX_REF];

fn codex_no_limit(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::Unknown,
        severity: Severity::Info,
        message: format!(
            "No Codex MRL established for {} on {}.",
            r.active_substance, r.crop
        ),
        mrl_limit: None,
        mrl_flag: None,
        residue_level: f.residue_level,
        with_gap: true,
        with_alternatives: false,
        references: CODEX_REFS,
    }
}

fn codex_exceeds(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::NonCompliant,
        severity: Severity::Major,
        message: format!(
            "Residue level {} mg/kg exceeds Codex MRL of {} mg/kg.",
            fmt_mg(f.residue_level),
            fmt_mg(r.mrl_codex)
        ),
        mrl_limit: r.mrl_codex,
        mrl_flag: r.mrl_codex_flag.clone(),
        residue_level: f.residue_level,
        with_gap: true,
        with_alternatives: false,
        references: CODEX_REFS,
    }
}

fn codex_within(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::Compliant,
        severity: Severity::Info,
        message: format!(
            "Compliant with Codex standards. Residue {} mg/kg ≤ MRL {} mg/kg.",
            fmt_mg(f.residue_level),
            fmt_mg(r.mrl_codex)
        ),
        mrl_limit: r.mrl_codex,
        mrl_flag: r.mrl_codex_flag.clone(),
        residue_level: f.residue_level,
        with_gap: true,
        with_alternatives: false,
        references: CODEX_REFS,
    }
}

fn codex_info(f: &Facts<'_>) -> Verdict {
    let r = f.record;
    Verdict {
        status: Status::Info,
        severity: Severity::Info,
        message: format!(
            "Codex MRL for {} on {}: {}.",
            r.active_substance,
            r.crop,
            limit_text(r.mrl_codex)
        ),
        mrl_limit: r.mrl_codex,
        mrl_flag: r.mrl_codex_flag.clone(),
        residue_level: None,
        with_gap: true,
        with_alternatives: false,
        references: CODEX_REFS,
    }
}

// ── Helpers ──

/// Whole days from `now` until the stored expiration, rounded down.
///
/// Unparseable values are logged and treated as "no expiration tracked".
pub fn days_until(raw: &str, now: DateTime<Utc>) -> Option<i64> {
    match parse_expiration(raw) {
        Some(expiry) => {
            let secs = (expiry - now.naive_utc()).num_seconds();
            Some(secs.div_euclid(SECONDS_PER_DAY))
        }
        None => {
            warn!(value = raw, "ignoring unparseable EU expiration date");
            None
        }
    }
}

fn parse_expiration(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|dt| dt.naive_utc())
}

/// Format a mg/kg value, keeping one decimal on whole numbers (`5.0`, `0.01`).
fn fmt_mg(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() && v.fract() == 0.0 => format!("{v:.1}"),
        Some(v) => v.to_string(),
        None => "-".to_string(),
    }
}

fn limit_text(limit: Option<f64>) -> String {
    match limit {
        Some(_) => format!("{} mg/kg", fmt_mg(limit)),
        None => "no limit set".to_string(),
    }
}
