use std::collections::{BTreeMap, BTreeSet};

use crate::config::ToleranceConfig;
use crate::model::{AmountMismatch, Receipt, ReconStatus, Reconciliation, ZReport};
use crate::normalize::normalize_id;

/// Compares one Z report against the OLD receipts of the same Z and day.
///
/// Total: every inconsistency ends up in the returned [`Reconciliation`].
#[derive(Debug, Clone)]
pub struct Reconciler {
    tolerance_cents: i64,
}

impl Reconciler {
    pub fn new(tolerance: &ToleranceConfig) -> Self {
        Self {
            tolerance_cents: tolerance.amount_cents.max(0),
        }
    }

    pub fn within_tolerance(&self, a_cents: i64, b_cents: i64) -> bool {
        a_cents.abs_diff(b_cents) <= self.tolerance_cents.unsigned_abs()
    }

    pub fn reconcile(&self, z_report: &ZReport, old_receipts: &[Receipt]) -> Reconciliation {
        let ekj = index_receipts(&z_report.receipts);
        let old = index_receipts(old_receipts);

        let missing_ids: BTreeSet<String> = ekj
            .keys()
            .filter(|id| !old.contains_key(*id))
            .cloned()
            .collect();
        let extra_ids: BTreeSet<String> = old
            .keys()
            .filter(|id| !ekj.contains_key(*id))
            .cloned()
            .collect();

        let duplicate_ids: BTreeSet<String> = ekj
            .iter()
            .chain(old.iter())
            .filter(|(_, amounts)| amounts.len() > 1)
            .map(|(id, _)| id.clone())
            .collect();

        // Only ids seen exactly once on each side are amount-compared.
        let mut amount_mismatches = BTreeMap::new();
        for (id, ekj_amounts) in &ekj {
            let Some(old_amounts) = old.get(id) else {
                continue;
            };
            if let ([ekj_cents], [old_cents]) = (ekj_amounts.as_slice(), old_amounts.as_slice()) {
                if !self.within_tolerance(*ekj_cents, *old_cents) {
                    amount_mismatches.insert(
                        id.clone(),
                        AmountMismatch {
                            ekj_cents: *ekj_cents,
                            old_cents: *old_cents,
                        },
                    );
                }
            }
        }

        let old_total_cents = old_receipts
            .iter()
            .fold(0i64, |total, r| total.saturating_add(r.amount_cents));
        let totals_match = self.within_tolerance(z_report.declared_total_cents, old_total_cents);
        let counts_match = z_report.declared_count as usize == old_receipts.len();

        let status = if totals_match
            && counts_match
            && missing_ids.is_empty()
            && extra_ids.is_empty()
            && amount_mismatches.is_empty()
            && duplicate_ids.is_empty()
        {
            ReconStatus::Ok
        } else {
            ReconStatus::Mismatch
        };

        Reconciliation {
            status,
            totals_match,
            counts_match,
            missing_ids,
            extra_ids,
            amount_mismatches,
            duplicate_ids,
            declared_total_cents: z_report.declared_total_cents,
            old_total_cents,
            declared_count: z_report.declared_count,
            old_count: old_receipts.len(),
            ekj_receipt_count: z_report.receipts.len(),
        }
    }
}

/// Normalized id → every amount seen for it, in input order.
fn index_receipts(receipts: &[Receipt]) -> BTreeMap<String, Vec<i64>> {
    let mut index: BTreeMap<String, Vec<i64>> = BTreeMap::new();
    for receipt in receipts {
        index
            .entry(normalize_id(&receipt.id))
            .or_default()
            .push(receipt.amount_cents);
    }
    index
}
