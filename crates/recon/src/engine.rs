use crate::config::ReconConfig;
use crate::ekj::EkjParser;
use crate::error::{ExtractError, ParseError, RunError};
use crate::model::{Receipt, Reconciliation, ZReport};
use crate::old::OldExtractor;
use crate::reconcile::Reconciler;

/// Result of one end-to-end run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub z_report: ZReport,
    pub old_receipts: Vec<Receipt>,
    pub reconciliation: Reconciliation,
}

/// Parser, extractor and reconciler built from one configuration.
///
/// Immutable and `Sync`; one engine can serve several EKJ files at once.
#[derive(Debug, Clone)]
pub struct Engine {
    parser: EkjParser,
    extractor: OldExtractor,
    reconciler: Reconciler,
}

impl Engine {
    pub fn new(config: &ReconConfig) -> Self {
        Self {
            parser: EkjParser::new(&config.ekj),
            extractor: OldExtractor::new(&config.old),
            reconciler: Reconciler::new(&config.tolerance),
        }
    }

    pub fn parse_ekj(&self, text: &str) -> Result<ZReport, ParseError> {
        self.parser.parse(text)
    }

    /// Receipts of the Z report's Z number and date, gathered from every
    /// OLD export text in order.
    pub fn extract_old<S: AsRef<str>>(
        &self,
        z_report: &ZReport,
        old_texts: &[S],
    ) -> Result<Vec<Receipt>, ExtractError> {
        let mut records = Vec::new();
        for text in old_texts {
            records.extend(self.extractor.read_records(text.as_ref())?);
        }
        log::debug!(
            "Z {}: {} OLD record(s) read from {} export(s)",
            z_report.z_number,
            records.len(),
            old_texts.len()
        );
        self.extractor
            .extract(&records, z_report.z_number, z_report.report_date)
    }

    pub fn reconcile(&self, z_report: &ZReport, old_receipts: &[Receipt]) -> Reconciliation {
        self.reconciler.reconcile(z_report, old_receipts)
    }

    /// Parse, extract and reconcile one EKJ text against its OLD exports.
    pub fn run<S: AsRef<str>>(&self, ekj_text: &str, old_texts: &[S]) -> Result<RunOutcome, RunError> {
        let z_report = self.parse_ekj(ekj_text)?;
        let old_receipts = self.extract_old(&z_report, old_texts)?;
        let reconciliation = self.reconcile(&z_report, &old_receipts);
        log::info!(
            "Z {} ({}): {}",
            z_report.z_number,
            z_report.report_date,
            reconciliation.status
        );
        Ok(RunOutcome {
            z_report,
            old_receipts,
            reconciliation,
        })
    }
}
