//! Text rendering of compliance results and substance listings.

use std::fmt::Write;

use mrlcheck_core::{BatchSummary, ComplianceResult, Status, SubstanceSummary};

const LABEL_WIDTH: usize = 18;

fn icon(status: Status) -> &'static str {
    match status {
        Status::Compliant => "✅",
        Status::NonCompliant => "❌",
        Status::Warning => "⚠️",
        Status::Info | Status::Unknown => "ℹ️",
    }
}

fn mg(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v} mg/kg"))
}

/// Render one result as a vertical card.
pub fn render_card(r: &ComplianceResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== {} on {} ({}) ===", r.substance, r.crop, r.target_market);
    let _ = writeln!(out, "{} {} / {}", icon(r.status), r.status, r.severity);
    let _ = writeln!(out, "{}", r.message);
    out.push('\n');

    let mut field = |label: &str, value: String| {
        let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
    };
    if r.mrl_limit.is_some() {
        let flag = r.mrl_flag.as_deref().map(|f| format!(" ({f})")).unwrap_or_default();
        field("MRL", format!("{}{flag}", mg(r.mrl_limit)));
    }
    if r.residue_level.is_some() {
        field("residue", mg(r.residue_level));
    }
    if let Some(status) = &r.eu_status {
        field("EU status", status.clone());
    }

    if let Some(gap) = r.gap_recommendations.as_ref().filter(|g| !g.is_empty()) {
        let _ = writeln!(out, "\nGood Agricultural Practice");
        for (label, value) in gap.entries() {
            let _ = writeln!(out, "  {label:<LABEL_WIDTH$} {value}");
        }
    }

    if let Some(alternatives) = &r.alternatives {
        let _ = writeln!(out, "\nApproved alternatives");
        if alternatives.is_empty() {
            let _ = writeln!(out, "  (none found)");
        }
        for name in alternatives {
            let _ = writeln!(out, "  - {name}");
        }
    }

    let _ = writeln!(out, "\nReferences: {}", r.references.join("; "));
    out
}

pub fn print_card(r: &ComplianceResult) {
    println!("{}", render_card(r));
}

/// Render a substance listing as an aligned table.
pub fn render_substances(crop: &str, rows: &[SubstanceSummary]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} substances documented for {crop}", rows.len());
    if rows.is_empty() {
        return out;
    }
    let _ = writeln!(
        out,
        "  {:<32} {:<24} {:<14} {:>10} {:>10}",
        "substance", "type", "EU status", "MRL EU", "MRL Codex"
    );
    for row in rows {
        let _ = writeln!(
            out,
            "  {:<32} {:<24} {:<14} {:>10} {:>10}",
            row.active_substance,
            row.pesticide_type.as_deref().unwrap_or("-"),
            row.eu_status.as_deref().unwrap_or("-"),
            row.mrl_eu.map_or_else(|| "-".to_string(), |v| v.to_string()),
            row.mrl_codex.map_or_else(|| "-".to_string(), |v| v.to_string()),
        );
    }
    out
}

/// Render the per-status tally printed after a batch.
pub fn render_summary(summary: &BatchSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Summary ({} checked)", summary.total);
    for status in Status::ALL {
        let n = summary.count(status);
        if n > 0 {
            let _ = writeln!(out, "  {} {:<14} {n}", icon(status), status.as_str());
        }
    }
    if summary.failed > 0 {
        let _ = writeln!(out, "  !! {:<14} {}", "FAILED", summary.failed);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mrlcheck_core::{GapRecommendations, Severity};

    fn result() -> ComplianceResult {
        ComplianceResult {
            status: Status::NonCompliant,
            severity: Severity::Critical,
            message: "Chlorpyrifos is NOT APPROVED in EU for Mango. Cannot export to EU market."
                .into(),
            crop: "Mango".into(),
            substance: "Chlorpyrifos".into(),
            target_market: "EU".into(),
            mrl_limit: Some(0.01),
            mrl_flag: Some("LOQ".into()),
            residue_level: Some(0.015),
            eu_status: Some("Not approved".into()),
            gap_recommendations: None,
            alternatives: Some(vec!["Spinosad".into()]),
            references: vec!["COLEAD GAP Database".into(), "EU Reg 396/2005".into()],
        }
    }

    #[test]
    fn card_shows_verdict_limit_and_alternatives() {
        let card = render_card(&result());
        assert!(card.starts_with("=== Chlorpyrifos on Mango (EU) ==="));
        assert!(card.contains("❌ NON_COMPLIANT / CRITICAL"));
        assert!(card.contains("0.01 mg/kg (LOQ)"));
        assert!(card.contains("  - Spinosad"));
        assert!(card.contains("References: COLEAD GAP Database; EU Reg 396/2005"));
        assert!(!card.contains("Good Agricultural Practice"));
    }

    #[test]
    fn card_lists_gap_fields() {
        let mut r = result();
        r.alternatives = None;
        r.gap_recommendations = Some(GapRecommendations {
            dose: Some("0.5 L/ha".into()),
            ..Default::default()
        });
        let card = render_card(&r);
        assert!(card.contains("Good Agricultural Practice"));
        assert!(card.contains("dose"));
        assert!(!card.contains("Approved alternatives"));
    }

    #[test]
    fn empty_alternatives_are_called_out() {
        let mut r = result();
        r.alternatives = Some(Vec::new());
        assert!(render_card(&r).contains("(none found)"));
    }

    #[test]
    fn substances_table_has_one_line_per_row() {
        let rows = vec![SubstanceSummary {
            active_substance: "Spinosad".into(),
            pesticide_type: Some("Insecticide".into()),
            eu_status: Some("Approved".into()),
            mrl_eu: Some(0.3),
            mrl_codex: None,
        }];
        let text = render_substances("mango", &rows);
        assert!(text.starts_with("1 substances documented for mango"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn summary_skips_empty_statuses() {
        let mut summary = BatchSummary::default();
        summary.record(Status::Compliant);
        summary.record(Status::Compliant);
        summary.record_failure();
        let text = render_summary(&summary);
        assert!(text.contains("Summary (3 checked)"));
        assert!(text.contains("COMPLIANT"));
        assert!(!text.contains("WARNING"));
        assert!(text.contains("FAILED"));
    }
}
