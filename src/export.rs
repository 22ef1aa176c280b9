//! JSON and CSV export of page records.
//!
//! One row per page with the column names downstream spreadsheets expect.
//! Internal fields (the structured page error) are left out; the error
//! message is already in `transcribed_contents`.

use crate::output::PageRecord;
use serde::Serialize;

/// One exported row.
#[derive(Debug, Serialize)]
pub struct ExportRow<'a> {
    pub page_number: usize,
    pub transcribed_contents: &'a str,
    pub optimized_details: &'a str,
    pub is_important: bool,
}

impl<'a> From<&'a PageRecord> for ExportRow<'a> {
    fn from(r: &'a PageRecord) -> Self {
        Self {
            page_number: r.page_number,
            transcribed_contents: &r.analyze_contents,
            optimized_details: &r.optimized_details,
            is_important: r.is_important,
        }
    }
}

/// Render records as a pretty-printed JSON array. Thai text is kept as-is.
pub fn to_json(records: &[PageRecord]) -> serde_json::Result<String> {
    let rows: Vec<ExportRow<'_>> = records.iter().map(ExportRow::from).collect();
    serde_json::to_string_pretty(&rows)
}

/// Render records as CSV with a header row, in page order.
pub fn to_csv(records: &[PageRecord]) -> Result<String, csv::Error> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(ExportRow::from(record))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    // Every field came from a `str`.
    String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}
