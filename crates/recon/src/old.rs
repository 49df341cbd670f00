//! OLD sales export: record reading and Z/date selection.

use chrono::NaiveDate;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::{BytesRef, Event};
use quick_xml::Reader;

use crate::amount::{parse_cents, NumberFormat};
use crate::config::{OldConfig, OldTags};
use crate::error::ExtractError;
use crate::model::{OldRecord, Receipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    DocNumber,
    Amount,
    Date,
}

#[derive(Debug, Default)]
struct PartialRecord {
    doc_number: Option<String>,
    amount: Option<String>,
    date: Option<String>,
}

impl PartialRecord {
    fn append(&mut self, field: Field, text: &str) {
        let slot = match field {
            Field::DocNumber => &mut self.doc_number,
            Field::Amount => &mut self.amount,
            Field::Date => &mut self.date,
        };
        slot.get_or_insert_with(String::new).push_str(text);
    }

    fn finish(self) -> Option<OldRecord> {
        let doc_number = self.doc_number.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        let amount = self.amount.map(|s| s.trim().to_string()).filter(|s| !s.is_empty());
        match (doc_number, amount) {
            (Some(doc_number), Some(amount)) => Some(OldRecord {
                doc_number,
                amount,
                date: self.date.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
            }),
            _ => {
                log::debug!("OLD record without document number or amount, skipped");
                None
            }
        }
    }
}

/// Text of an entity or character reference. Unknown entities are kept
/// verbatim.
fn resolve_reference(reference: &BytesRef<'_>) -> Result<String, quick_xml::Error> {
    if let Some(ch) = reference.resolve_char_ref()? {
        return Ok(ch.to_string());
    }
    let name = reference.decode()?;
    Ok(match resolve_predefined_entity(&name) {
        Some(text) => text.to_string(),
        None => format!("&{name};"),
    })
}

#[derive(Debug, Clone)]
pub struct OldExtractor {
    tags: OldTags,
    number: NumberFormat,
    date_formats: Vec<String>,
    require_match: bool,
}

impl OldExtractor {
    pub fn new(config: &OldConfig) -> Self {
        Self {
            tags: config.tags.clone(),
            number: config.number.clone(),
            date_formats: config.date_formats.clone(),
            require_match: config.require_match,
        }
    }

    /// Read every record of one OLD export, in file order.
    ///
    /// Records lacking a document number or an amount are dropped. End tags
    /// are not checked against their start tags, and a record left open is
    /// closed by the next record start.
    pub fn read_records(&self, text: &str) -> Result<Vec<OldRecord>, ExtractError> {
        let mut reader = Reader::from_str(text);
        reader.config_mut().check_end_names = false;

        let mut records = Vec::new();
        let mut current: Option<PartialRecord> = None;
        let mut field: Option<Field> = None;

        loop {
            match reader.read_event() {
                Ok(Event::Start(ref e)) => {
                    let name = e.name();
                    let name = name.as_ref();
                    if name == self.tags.record.as_bytes() {
                        if let Some(open) = current.replace(PartialRecord::default()) {
                            records.extend(open.finish());
                        }
                        field = None;
                    } else if current.is_some() {
                        field = self.field_for(name);
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if let (Some(record), Some(f)) = (current.as_mut(), field) {
                        record.append(f, &String::from_utf8_lossy(e));
                    }
                }
                Ok(Event::GeneralRef(ref e)) => {
                    if let (Some(record), Some(f)) = (current.as_mut(), field) {
                        let resolved = resolve_reference(e).map_err(|err| {
                            ExtractError::Malformed(format!(
                                "at byte {}: {err}",
                                reader.buffer_position()
                            ))
                        })?;
                        record.append(f, &resolved);
                    }
                }
                Ok(Event::End(ref e)) => {
                    if e.name().as_ref() == self.tags.record.as_bytes() {
                        if let Some(open) = current.take() {
                            records.extend(open.finish());
                        }
                    }
                    field = None;
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(ExtractError::Malformed(format!(
                        "at byte {}: {e}",
                        reader.buffer_position()
                    )))
                }
                _ => {}
            }
        }

        if let Some(open) = current.take() {
            records.extend(open.finish());
        }
        Ok(records)
    }

    /// Keep the records of `z_number` on `report_date`, as receipts.
    ///
    /// A record is kept only when its document number ends in
    /// `/<z_number>` and its date parses and equals `report_date`, whatever
    /// filtering happened upstream. Duplicates are preserved.
    pub fn extract(
        &self,
        records: &[OldRecord],
        z_number: u32,
        report_date: NaiveDate,
    ) -> Result<Vec<Receipt>, ExtractError> {
        let suffix = z_number.to_string();
        let mut receipts = Vec::new();

        for record in records {
            let doc_number = record.doc_number.trim();
            let belongs_to_z = doc_number
                .rsplit_once('/')
                .is_some_and(|(_, tail)| tail.trim() == suffix);
            if !belongs_to_z {
                continue;
            }

            match record.date.as_deref().and_then(|d| self.parse_date(d)) {
                Some(date) if date == report_date => {}
                Some(_) => continue,
                None => {
                    log::debug!("OLD record {doc_number}: missing or unreadable date, skipped");
                    continue;
                }
            }

            match parse_cents(&record.amount, &self.number) {
                Some(amount) => receipts.push(Receipt::new(doc_number, amount)),
                None => log::warn!(
                    "OLD record {doc_number}: cannot parse amount '{}', skipped",
                    record.amount
                ),
            }
        }

        if receipts.is_empty() && self.require_match {
            return Err(ExtractError::NoMatchingRecords {
                z_number,
                report_date,
            });
        }
        Ok(receipts)
    }

    fn field_for(&self, name: &[u8]) -> Option<Field> {
        if name == self.tags.doc_number.as_bytes() {
            Some(Field::DocNumber)
        } else if name == self.tags.amount.as_bytes() {
            Some(Field::Amount)
        } else if name == self.tags.date.as_bytes() {
            Some(Field::Date)
        } else {
            None
        }
    }

    /// The date part of a date or date-time value.
    fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let token = value.split_whitespace().next()?;
        let token = token.split('T').next().unwrap_or(token);
        self.date_formats
            .iter()
            .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<I06_LIST>
  <I06>
    <I06_DOK_NR>1/950</I06_DOK_NR>
    <I06_OP_DATA>2024.01.15</I06_OP_DATA>
    <I06_MOK_SUMA>3.70</I06_MOK_SUMA>
  </I06>
  <I06>
    <I06_DOK_NR>2/950</I06_DOK_NR>
    <I06_OP_DATA>2024.01.15</I06_OP_DATA>
    <I06_MOK_SUMA>1000.00</I06_MOK_SUMA>
  </I06>
  <I06>
    <I06_DOK_NR>1/949</I06_DOK_NR>
    <I06_OP_DATA>2024.01.14</I06_OP_DATA>
    <I06_MOK_SUMA>55.00</I06_MOK_SUMA>
  </I06>
</I06_LIST>
"#;

    fn extractor() -> OldExtractor {
        OldExtractor::new(&OldConfig::default())
    }

    fn jan(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn record(doc: &str, amount: &str, date: Option<&str>) -> OldRecord {
        OldRecord {
            doc_number: doc.into(),
            amount: amount.into(),
            date: date.map(str::to_string),
        }
    }

    #[test]
    fn reads_records_in_order() {
        let records = extractor().read_records(EXPORT).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record("1/950", "3.70", Some("2024.01.15")));
        assert_eq!(records[2].doc_number, "1/949");
    }

    #[test]
    fn unclosed_record_is_closed_by_next_one() {
        let text = "<I06><I06_DOK_NR>1/5</I06_DOK_NR><I06_MOK_SUMA>1.00</I06_MOK_SUMA>\n\
                    <I06><I06_DOK_NR>2/5</I06_DOK_NR><I06_MOK_SUMA>2.00</I06_MOK_SUMA></I06>";
        let records = extractor().read_records(text).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].date, None);
        assert_eq!(records[1].amount, "2.00");
    }

    #[test]
    fn references_in_fields_are_resolved() {
        let text = "<I06>\n  <I06_DOK_NR> A&amp;B/950 </I06_DOK_NR>\n  \
                    <I06_MOK_SUMA>&#49;2.50</I06_MOK_SUMA>\n  \
                    <I06_OP_DATA>2024&#x2E;01.15</I06_OP_DATA>\n</I06>\n\
                    <I06><I06_DOK_NR>x &lt;y&gt; &apos;1&quot;&#47;950</I06_DOK_NR>\
                    <I06_MOK_SUMA>1.00</I06_MOK_SUMA></I06>\n\
                    <I06><I06_DOK_NR>&custom;/950</I06_DOK_NR><I06_MOK_SUMA>1.00</I06_MOK_SUMA></I06>";
        let records = extractor().read_records(text).unwrap();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0], record("A&B/950", "12.50", Some("2024.01.15")));
        assert_eq!(records[1].doc_number, "x <y> '1\"/950");
        assert_eq!(records[2].doc_number, "&custom;/950");

        let receipts = extractor().extract(&records[..1], 950, jan(15)).unwrap();
        assert_eq!(receipts, vec![Receipt::new("A&B/950", 1250)]);
    }

    #[test]
    fn incomplete_records_are_dropped() {
        let text = "<I06><I06_DOK_NR>1/5</I06_DOK_NR></I06><I06><I06_MOK_SUMA>2.00</I06_MOK_SUMA></I06>";
        assert!(extractor().read_records(text).unwrap().is_empty());
    }

    #[test]
    fn fields_outside_records_are_ignored() {
        let text = "<I06_DOK_NR>9/9</I06_DOK_NR><I06_MOK_SUMA>9.00</I06_MOK_SUMA>";
        assert!(extractor().read_records(text).unwrap().is_empty());
    }

    #[test]
    fn extract_filters_by_z_and_date() {
        let ex = extractor();
        let records = ex.read_records(EXPORT).unwrap();
        let receipts = ex.extract(&records, 950, jan(15)).unwrap();
        assert_eq!(
            receipts,
            vec![Receipt::new("1/950", 370), Receipt::new("2/950", 100_000)]
        );
    }

    #[test]
    fn suffix_must_match_exactly() {
        let records = vec![
            record("1/1950", "1.00", Some("2024-01-15")),
            record("1/95", "1.00", Some("2024-01-15")),
            record("950", "1.00", Some("2024-01-15")),
            record("A/1/950", "1.00", Some("2024-01-15")),
        ];
        let receipts = extractor().extract(&records, 950, jan(15)).unwrap();
        assert_eq!(receipts, vec![Receipt::new("A/1/950", 100)]);
    }

    #[test]
    fn date_is_revalidated() {
        let records = vec![
            record("1/950", "1.00", Some("2024.01.16")),
            record("2/950", "2.00", None),
            record("3/950", "3.00", Some("not a date")),
            record("4/950", "4.00", Some("2024-01-15 23:59:59")),
        ];
        let receipts = extractor().extract(&records, 950, jan(15)).unwrap();
        assert_eq!(receipts, vec![Receipt::new("4/950", 400)]);
    }

    #[test]
    fn duplicates_are_preserved() {
        let records = vec![
            record("1/950", "1.00", Some("2024.01.15")),
            record("1/950", "2.00", Some("2024.01.15")),
        ];
        let receipts = extractor().extract(&records, 950, jan(15)).unwrap();
        assert_eq!(receipts.len(), 2);
    }

    #[test]
    fn bad_amount_is_skipped() {
        let records = vec![
            record("1/950", "n/a", Some("2024.01.15")),
            record("2/950", "2.00", Some("2024.01.15")),
        ];
        let receipts = extractor().extract(&records, 950, jan(15)).unwrap();
        assert_eq!(receipts, vec![Receipt::new("2/950", 200)]);
    }

    #[test]
    fn empty_result_is_valid_by_default() {
        let receipts = extractor().extract(&[], 950, jan(15)).unwrap();
        assert!(receipts.is_empty());
    }

    #[test]
    fn empty_result_fails_when_required() {
        let config = OldConfig {
            require_match: true,
            ..OldConfig::default()
        };
        let err = OldExtractor::new(&config).extract(&[], 950, jan(15)).unwrap_err();
        assert_eq!(
            err,
            ExtractError::NoMatchingRecords {
                z_number: 950,
                report_date: jan(15)
            }
        );
    }
}
