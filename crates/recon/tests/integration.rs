use std::collections::BTreeSet;
use std::path::PathBuf;

use chrono::NaiveDate;
use kasa_recon::model::{AmountMismatch, ReconStatus};
use kasa_recon::{Engine, ExtractError, ParseError, ReconConfig, RunError};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn ids(items: &[&str]) -> BTreeSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn engine() -> Engine {
    Engine::new(&ReconConfig::default())
}

// -------------------------------------------------------------------------
// End-to-end runs
// -------------------------------------------------------------------------

#[test]
fn fixture_day_reconciles_cleanly() {
    let outcome = engine()
        .run(&fixture("ekj_z950.txt"), &[fixture("riv_sales_d20240115.old")])
        .unwrap();

    assert_eq!(outcome.z_report.z_number, 950);
    assert_eq!(
        outcome.z_report.report_date,
        NaiveDate::from_ymd_opt(2024, 1, 15).unwrap()
    );
    assert_eq!(outcome.z_report.declared_total_cents, 101_600);
    assert_eq!(outcome.z_report.declared_count, 3);
    assert_eq!(outcome.z_report.receipts.len(), 3);

    // 7/949 belongs to the previous Z and is filtered out
    assert_eq!(outcome.old_receipts.len(), 3);

    let r = &outcome.reconciliation;
    assert_eq!(r.status, ReconStatus::Ok);
    assert_eq!(r.old_total_cents, 101_600);
}

#[test]
fn second_export_adds_extra_and_duplicate() {
    let outcome = engine()
        .run(
            &fixture("ekj_z950.txt"),
            &[
                fixture("riv_sales_d20240115.old"),
                fixture("riv_sales_d20240115_part2.old"),
            ],
        )
        .unwrap();

    let r = &outcome.reconciliation;
    assert_eq!(r.status, ReconStatus::Mismatch);
    assert_eq!(r.extra_ids, ids(&["4/950"]));
    assert_eq!(r.duplicate_ids, ids(&["3/950"]));
    assert!(r.missing_ids.is_empty());
    assert!(r.amount_mismatches.is_empty());
    assert_eq!(r.old_count, 5);
    assert!(!r.counts_match);
    assert_eq!(r.old_total_cents, 101_600 + 2_500 + 1_230);
    assert!(!r.totals_match);
}

#[test]
fn missing_day_sales_fails_the_run() {
    let err = engine()
        .run(&fixture("ekj_no_day_sales.txt"), &[fixture("riv_sales_d20240115.old")])
        .unwrap_err();
    assert_eq!(err, RunError::Parse(ParseError::MissingZBlock));
}

#[test]
fn no_old_exports_reconciles_against_empty_side() {
    let outcome = engine().run::<&str>(&fixture("ekj_z950.txt"), &[]).unwrap();
    let r = &outcome.reconciliation;
    assert_eq!(r.missing_ids, ids(&["1/950", "2/950", "3/950"]));
    assert_eq!(r.old_count, 0);
    assert_eq!(r.status, ReconStatus::Mismatch);
}

#[test]
fn required_match_fails_on_wrong_day() {
    let mut config = ReconConfig::default();
    config.old.require_match = true;
    let old = fixture("riv_sales_d20240115.old").replace("2024.01.15", "2024.01.16");
    let err = Engine::new(&config)
        .run(&fixture("ekj_z950.txt"), &[old])
        .unwrap_err();
    assert!(matches!(
        err,
        RunError::Extract(ExtractError::NoMatchingRecords { z_number: 950, .. })
    ));
}

#[test]
fn per_receipt_drift_beyond_tolerance() {
    let old = fixture("riv_sales_d20240115.old").replace("<I06_MOK_SUMA>12.30<", "<I06_MOK_SUMA>12.40<");
    let outcome = engine().run(&fixture("ekj_z950.txt"), &[old]).unwrap();
    let r = &outcome.reconciliation;
    assert_eq!(r.amount_mismatches.len(), 1);
    assert_eq!(
        r.amount_mismatches.get("3/950"),
        Some(&AmountMismatch {
            ekj_cents: 1_230,
            old_cents: 1_240
        })
    );
    assert!(!r.totals_match);
    assert!(r.counts_match);
}

// -------------------------------------------------------------------------
// Configuration
// -------------------------------------------------------------------------

#[test]
fn tolerance_from_toml_absorbs_small_drift() {
    let config = ReconConfig::from_toml("[tolerance]\namount_cents = 10\n").unwrap();
    let old = fixture("riv_sales_d20240115.old").replace("<I06_MOK_SUMA>12.30<", "<I06_MOK_SUMA>12.40<");
    let outcome = Engine::new(&config).run(&fixture("ekj_z950.txt"), &[old]).unwrap();
    assert!(outcome.reconciliation.is_ok());
}

#[test]
fn one_engine_many_locales() {
    let lt = Engine::new(&ReconConfig::default());
    let en = Engine::new(
        &ReconConfig::from_toml(
            r#"
[ekj]
date_format = "%d/%m/%Y"
[ekj.labels]
z_number = ["Z report no"]
report_date = ["Closed"]
day_total = ["Day sales"]
receipt_count = ["Fiscal receipts"]
receipt_header = ["Receipt"]
receipt_total = ["Total"]
[ekj.number]
decimal_separator = "."
thousands_separator = ","
"#,
        )
        .unwrap(),
    );

    let en_text = "Receipt 5/7/1\nTotal 1,200.00\nZ report no 7\nClosed 15/01/2024 21:00\nDay sales 1,200.00\nFiscal receipts 1\n";
    let old = "<I06><I06_DOK_NR>5/7</I06_DOK_NR><I06_OP_DATA>2024-01-15</I06_OP_DATA><I06_MOK_SUMA>1200.00</I06_MOK_SUMA></I06>";

    assert!(en.run(en_text, &[old]).unwrap().reconciliation.is_ok());
    assert!(lt.parse_ekj(en_text).is_err());
    assert!(lt
        .run(&fixture("ekj_z950.txt"), &[fixture("riv_sales_d20240115.old")])
        .unwrap()
        .reconciliation
        .is_ok());
}

#[test]
fn reconciliation_serializes_to_json() {
    let outcome = engine()
        .run(&fixture("ekj_z950.txt"), &[fixture("riv_sales_d20240115.old")])
        .unwrap();
    let json = serde_json::to_value(&outcome.reconciliation).unwrap();
    assert_eq!(json["status"], "ok");
    assert_eq!(json["totals_match"], true);
    assert_eq!(json["missing_ids"], serde_json::json!([]));
    assert_eq!(json["old_total_cents"], 101_600);
}
