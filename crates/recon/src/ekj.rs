//! EKJ (electronic cash journal) parser.
//!
//! The journal is read line by line. Receipts are collected wherever they
//! appear; the Z report block is located by a small state machine:
//!
//! ```text
//! SeekingZBlock --(Z number label)--> InZBlock --(all fields / window end)--> Done
//! ```
//!
//! All label matching happens on the folded line (see [`fold_label`]), so
//! values are read from the folded text as well.

use chrono::NaiveDate;

use crate::amount::{parse_cents, trailing_amount, NumberFormat};
use crate::config::EkjConfig;
use crate::error::ParseError;
use crate::model::{Receipt, ZReport};
use crate::normalize::fold_label;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    SeekingZBlock,
    InZBlock { opened_at: usize },
    Done,
}

/// Labels, folded once at construction.
#[derive(Debug, Clone)]
struct Labels {
    z_number: Vec<String>,
    report_date: Vec<String>,
    day_total: Vec<String>,
    receipt_count: Vec<String>,
    receipt_header: Vec<String>,
    receipt_total: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct EkjParser {
    labels: Labels,
    number: NumberFormat,
    date_format: String,
    z_block_max_lines: usize,
    receipt_id_segments: usize,
}

/// Fields of the Z block seen so far.
#[derive(Debug, Default)]
struct ZBlock {
    z_number: Option<u32>,
    report_date: Option<NaiveDate>,
    day_total_cents: Option<i64>,
    receipt_count: Option<u32>,
}

impl ZBlock {
    fn complete(&self) -> bool {
        self.report_date.is_some() && self.day_total_cents.is_some() && self.receipt_count.is_some()
    }
}

/// The receipt currently being read from the journal.
#[derive(Debug)]
struct OpenReceipt {
    id: String,
    line: usize,
    last_total: Option<i64>,
}

#[derive(Debug, Default)]
struct ReceiptCollector {
    open: Option<OpenReceipt>,
    receipts: Vec<Receipt>,
}

impl ReceiptCollector {
    fn close(&mut self) {
        if let Some(open) = self.open.take() {
            match open.last_total {
                Some(amount) => self.receipts.push(Receipt::new(open.id, amount)),
                None => log::warn!(
                    "receipt {} (line {}) has no payment line, skipped",
                    open.id,
                    open.line
                ),
            }
        }
    }
}

impl EkjParser {
    pub fn new(config: &EkjConfig) -> Self {
        let fold_all =
            |labels: &[String]| -> Vec<String> { labels.iter().map(|l| fold_label(l)).collect() };
        let labels = &config.labels;
        Self {
            labels: Labels {
                z_number: fold_all(&labels.z_number),
                report_date: fold_all(&labels.report_date),
                day_total: fold_all(&labels.day_total),
                receipt_count: fold_all(&labels.receipt_count),
                receipt_header: fold_all(&labels.receipt_header),
                receipt_total: fold_all(&labels.receipt_total),
            },
            number: config.number.clone(),
            date_format: config.date_format.clone(),
            z_block_max_lines: config.z_block_max_lines,
            receipt_id_segments: config.receipt_id_segments,
        }
    }

    /// Parse one EKJ report. Only the first Z block in the text is used.
    pub fn parse(&self, text: &str) -> Result<ZReport, ParseError> {
        let mut state = State::SeekingZBlock;
        let mut block = ZBlock::default();
        // Report date printed in the header lines just before the Z number.
        let mut date_before_block: Option<NaiveDate> = None;
        let mut collector = ReceiptCollector::default();

        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = fold_label(raw);
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = find_prefix(&line, &self.labels.receipt_header) {
                collector.close();
                match self.receipt_id(rest) {
                    Some(id) => {
                        collector.open = Some(OpenReceipt {
                            id,
                            line: line_no,
                            last_total: None,
                        });
                    }
                    None => log::debug!("line {line_no}: receipt header without a usable id"),
                }
                continue;
            }

            state = match state {
                State::SeekingZBlock => {
                    if let Some(z) = find_anywhere(&line, &self.labels.z_number).and_then(first_number) {
                        log::debug!("line {line_no}: Z block opened (Z {z})");
                        // A payment line inside the Z block is not a receipt total.
                        collector.close();
                        block.z_number = Some(z);
                        block.report_date = date_before_block;
                        State::InZBlock { opened_at: line_no }
                    } else {
                        if let Some(date) = self.report_date(&line) {
                            date_before_block = Some(date);
                        }
                        self.scan_receipt_line(line_no, &line, &mut collector)?;
                        State::SeekingZBlock
                    }
                }
                State::InZBlock { opened_at } => {
                    if line_no - opened_at > self.z_block_max_lines {
                        log::debug!("line {line_no}: Z block window exhausted");
                        self.scan_receipt_line(line_no, &line, &mut collector)?;
                        State::Done
                    } else {
                        self.scan_block_line(line_no, &line, &mut block, date_before_block)?;
                        if block.complete() {
                            log::debug!("line {line_no}: Z block complete");
                            State::Done
                        } else {
                            State::InZBlock { opened_at }
                        }
                    }
                }
                State::Done => {
                    self.scan_receipt_line(line_no, &line, &mut collector)?;
                    State::Done
                }
            };
        }
        collector.close();

        let (Some(z_number), Some(declared_total_cents)) = (block.z_number, block.day_total_cents)
        else {
            return Err(ParseError::MissingZBlock);
        };
        let report_date = block.report_date.ok_or(ParseError::MissingReportDate)?;
        let declared_count = block.receipt_count.ok_or(ParseError::MissingCountField)?;

        Ok(ZReport {
            z_number,
            report_date,
            declared_total_cents,
            declared_count,
            receipts: collector.receipts,
        })
    }

    fn scan_block_line(
        &self,
        line_no: usize,
        line: &str,
        block: &mut ZBlock,
        date_before_block: Option<NaiveDate>,
    ) -> Result<(), ParseError> {
        if block.day_total_cents.is_none() {
            if let Some(rest) = find_prefix(line, &self.labels.day_total) {
                block.day_total_cents = Some(self.amount(line_no, rest)?);
                return Ok(());
            }
        }
        if block.receipt_count.is_none() {
            if let Some(rest) = find_prefix(line, &self.labels.receipt_count) {
                block.receipt_count = last_number(rest);
                if block.receipt_count.is_none() {
                    log::debug!("line {line_no}: receipt count label without a number");
                }
                return Ok(());
            }
        }
        // A date inside the block replaces one taken from the header.
        if block.report_date.is_none() || block.report_date == date_before_block {
            if let Some(date) = self.report_date(line) {
                block.report_date = Some(date);
            }
        }
        Ok(())
    }

    fn scan_receipt_line(
        &self,
        line_no: usize,
        line: &str,
        collector: &mut ReceiptCollector,
    ) -> Result<(), ParseError> {
        let Some(open) = collector.open.as_mut() else {
            return Ok(());
        };
        let Some(rest) = find_prefix(line, &self.labels.receipt_total) else {
            return Ok(());
        };
        // "Mokėjimo būdas: grynais" and the like carry no amount.
        if trailing_amount(rest, &self.number).is_some() {
            open.last_total = Some(self.amount(line_no, rest)?);
        }
        Ok(())
    }

    fn amount(&self, line_no: usize, rest: &str) -> Result<i64, ParseError> {
        let malformed = |value: &str| ParseError::MalformedAmount {
            line: line_no,
            value: value.trim().to_string(),
        };
        let candidate = trailing_amount(rest, &self.number).ok_or_else(|| malformed(rest))?;
        parse_cents(candidate, &self.number).ok_or_else(|| malformed(candidate))
    }

    fn report_date(&self, line: &str) -> Option<NaiveDate> {
        let rest = find_anywhere(line, &self.labels.report_date)?;
        rest.split_whitespace()
            .find_map(|token| NaiveDate::parse_from_str(token, &self.date_format).ok())
    }

    fn receipt_id(&self, rest: &str) -> Option<String> {
        let token = rest.split_whitespace().next()?;
        let segments: Vec<&str> = token.split('/').take(self.receipt_id_segments).collect();
        if segments.len() < self.receipt_id_segments || segments.iter().any(|s| s.is_empty()) {
            return None;
        }
        Some(segments.join("/"))
    }
}

fn find_prefix<'a>(line: &'a str, labels: &[String]) -> Option<&'a str> {
    labels.iter().find_map(|label| line.strip_prefix(label.as_str()))
}

fn find_anywhere<'a>(line: &'a str, labels: &[String]) -> Option<&'a str> {
    labels
        .iter()
        .find_map(|label| line.find(label.as_str()).map(|pos| &line[pos + label.len()..]))
}

fn digits_of(token: &str) -> Option<u32> {
    let digits = token.trim_matches(|c: char| !c.is_ascii_digit());
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn first_number(rest: &str) -> Option<u32> {
    rest.split_whitespace().find_map(digits_of)
}

fn last_number(rest: &str) -> Option<u32> {
    rest.split_whitespace().last().and_then(digits_of)
}
