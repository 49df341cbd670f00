//! Plain-text daily report.
//!
//! Every section is always printed; an empty one reads "none", so a reader
//! scanning many reports can rely on section presence alone.

use chrono::NaiveDate;

use crate::amount::format_cents;
use crate::model::Reconciliation;

fn verdict(ok: bool) -> &'static str {
    if ok {
        "match"
    } else {
        "MISMATCH"
    }
}

fn id_section(lines: &mut Vec<String>, title: &str, ids: &std::collections::BTreeSet<String>) {
    if ids.is_empty() {
        lines.push(format!("{title}: none"));
    } else {
        lines.push(format!("{title} ({}):", ids.len()));
        lines.extend(ids.iter().map(|id| format!("  {id}")));
    }
}

pub fn render_text(z_number: u32, report_date: NaiveDate, recon: &Reconciliation) -> String {
    let mut lines = vec![
        "EKJ vs OLD reconciliation".to_string(),
        format!("Z number:    {z_number}"),
        format!("Report date: {report_date}"),
        format!("Status:      {}", recon.status),
        String::new(),
        format!(
            "Day total:     EKJ {} / OLD {} (difference {}) - {}",
            format_cents(recon.declared_total_cents),
            format_cents(recon.old_total_cents),
            format_cents(recon.total_delta_cents()),
            verdict(recon.totals_match),
        ),
        format!(
            "Receipt count: EKJ declared {} / OLD {} - {}",
            recon.declared_count,
            recon.old_count,
            verdict(recon.counts_match),
        ),
        format!("EKJ receipts listed in journal: {}", recon.ekj_receipt_count),
        String::new(),
    ];

    id_section(&mut lines, "Missing in OLD", &recon.missing_ids);
    id_section(&mut lines, "Extra in OLD", &recon.extra_ids);

    if recon.amount_mismatches.is_empty() {
        lines.push("Amount mismatches: none".to_string());
    } else {
        lines.push(format!("Amount mismatches ({}):", recon.amount_mismatches.len()));
        for (id, m) in &recon.amount_mismatches {
            lines.push(format!(
                "  {id}: EKJ {} vs OLD {} (difference {})",
                format_cents(m.ekj_cents),
                format_cents(m.old_cents),
                format_cents(m.delta_cents()),
            ));
        }
    }

    id_section(&mut lines, "Duplicate receipt ids", &recon.duplicate_ids);

    let mut text = lines.join("\n");
    text.push('\n');
    text
}
