use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// One fiscal receipt: document number and paid amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub id: String,
    pub amount_cents: i64,
}

impl Receipt {
    pub fn new(id: impl Into<String>, amount_cents: i64) -> Self {
        Self {
            id: id.into(),
            amount_cents,
        }
    }
}

/// The register's daily closing report, as declared in one EKJ file.
///
/// `receipts.len() == declared_count` is not enforced; a
/// disagreement is reconciliation data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ZReport {
    pub z_number: u32,
    pub report_date: NaiveDate,
    pub declared_total_cents: i64,
    pub declared_count: u32,
    pub receipts: Vec<Receipt>,
}

/// A raw record from an OLD export. Field values are kept as text; the
/// extractor decides what they mean.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OldRecord {
    pub doc_number: String,
    pub amount: String,
    pub date: Option<String>,
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconStatus {
    Ok,
    Mismatch,
}

impl std::fmt::Display for ReconStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ok => write!(f, "OK"),
            Self::Mismatch => write!(f, "MISMATCH"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmountMismatch {
    pub ekj_cents: i64,
    pub old_cents: i64,
}

impl AmountMismatch {
    /// EKJ minus OLD.
    pub fn delta_cents(&self) -> i64 {
        self.ekj_cents.saturating_sub(self.old_cents)
    }
}

/// Structured difference between one Z report and its OLD receipts.
///
/// Ids are normalized. Sets and maps are ordered so two runs over the same
/// input produce identical values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    pub status: ReconStatus,
    pub totals_match: bool,
    pub counts_match: bool,
    /// On the EKJ side, absent from OLD.
    pub missing_ids: BTreeSet<String>,
    /// On the OLD side, absent from EKJ.
    pub extra_ids: BTreeSet<String>,
    /// Present once on each side with amounts further apart than tolerance.
    pub amount_mismatches: BTreeMap<String, AmountMismatch>,
    /// Occurring more than once on either side.
    pub duplicate_ids: BTreeSet<String>,
    pub declared_total_cents: i64,
    pub old_total_cents: i64,
    pub declared_count: u32,
    pub old_count: usize,
    /// Receipts actually listed in the EKJ journal.
    pub ekj_receipt_count: usize,
}

impl Reconciliation {
    pub fn is_ok(&self) -> bool {
        self.status == ReconStatus::Ok
    }

    /// Declared EKJ total minus OLD total.
    pub fn total_delta_cents(&self) -> i64 {
        self.declared_total_cents.saturating_sub(self.old_total_cents)
    }
}
