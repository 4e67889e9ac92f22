//! CSV validation: reads a whole usage export, checks the header against the required schema
//! and runs every record through the normalizer.
//!
//! Validation never returns an error. Parser-level failures collapse into a report with no
//! rows and a single diagnostic carrying the failure message.

use crate::error::Result;
use crate::normalizer::{normalize, spreadsheet_row};
use crate::schema::{required_columns, RawRecord, UsageRow};
use crate::utils::clean_cell;
use futures::io::{AsyncRead, AsyncReadExt};
use log::{debug, info, warn};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Textual marker separating warning diagnostics from errors.
pub const WARNING_MARKER: &str = "(warning)";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum DiagnosticSeverity {
    Error,
    Warning,
}

impl DiagnosticSeverity {
    pub fn classify(diagnostic: &str) -> Self {
        if diagnostic.contains(WARNING_MARKER) {
            DiagnosticSeverity::Warning
        } else {
            DiagnosticSeverity::Error
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct ValidationReport {
    #[schemars(description = "Every parsed row in file order, annotated with errors and warnings")]
    pub rows: Vec<UsageRow>,

    #[schemars(
        description = "Flat list: missing columns first, then per row its errors followed by one combined warning line"
    )]
    pub diagnostics: Vec<String>,

    #[serde(default)]
    pub missing_columns: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub struct ValidationSummary {
    pub total_rows: usize,
    pub valid_rows: usize,
    pub error_rows: usize,
    pub warning_rows: usize,
    #[schemars(description = "Distinct companies among error-free rows")]
    pub companies: usize,
    pub missing_columns: usize,
}

impl ValidationReport {
    /// A terminal parse failure: no rows, one diagnostic.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            rows: Vec::new(),
            diagnostics: vec![message.into()],
            missing_columns: Vec::new(),
        }
    }

    pub fn valid_rows(&self) -> impl Iterator<Item = &UsageRow> {
        self.rows.iter().filter(|row| row.is_valid())
    }

    pub fn errors(&self) -> impl Iterator<Item = &str> {
        self.diagnostics_with(DiagnosticSeverity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &str> {
        self.diagnostics_with(DiagnosticSeverity::Warning)
    }

    fn diagnostics_with(&self, severity: DiagnosticSeverity) -> impl Iterator<Item = &str> {
        self.diagnostics
            .iter()
            .map(String::as_str)
            .filter(move |d| DiagnosticSeverity::classify(d) == severity)
    }

    pub fn summary(&self) -> ValidationSummary {
        let valid_rows = self.valid_rows().count();
        let companies: BTreeSet<&str> = self
            .valid_rows()
            .map(|row| row.company.as_str())
            .filter(|company| !company.is_empty())
            .collect();

        ValidationSummary {
            total_rows: self.rows.len(),
            valid_rows,
            error_rows: self.rows.len() - valid_rows,
            warning_rows: self.rows.iter().filter(|row| row.has_warnings()).count(),
            companies: companies.len(),
            missing_columns: self.missing_columns.len(),
        }
    }
}

/// Header names (cleaned) and raw records, in file order.
fn parse_records<R: Read>(reader: R) -> Result<(Vec<String>, Vec<RawRecord>)> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader.headers()?.iter().map(clean_cell).collect();

    let mut records = Vec::new();
    for result in csv_reader.records() {
        let record = result?;
        if record.iter().all(str::is_empty) && record.len() <= 1 {
            continue;
        }
        records.push(RawRecord::from_pairs(
            headers.iter().cloned().zip(record.iter().map(str::to_string)),
        ));
    }

    Ok((headers, records))
}

fn build_report(headers: &[String], records: &[RawRecord]) -> ValidationReport {
    let mut diagnostics = Vec::new();
    let mut missing_columns = Vec::new();

    for column in required_columns() {
        if !headers.iter().any(|h| h == column) {
            diagnostics.push(format!("Missing required column: {}", column));
            missing_columns.push(column.to_string());
        }
    }

    if !missing_columns.is_empty() {
        warn!(
            "Usage export is missing {} required column(s): {}",
            missing_columns.len(),
            missing_columns.join(", ")
        );
    }

    let rows: Vec<UsageRow> = records
        .iter()
        .enumerate()
        .map(|(idx, raw)| normalize(raw, idx))
        .collect();

    for (idx, row) in rows.iter().enumerate() {
        diagnostics.extend(row.row_errors.iter().cloned());
        if row.has_warnings() {
            diagnostics.push(format!(
                "Row {} {}: {}",
                spreadsheet_row(idx),
                WARNING_MARKER,
                row.row_warnings.join(", ")
            ));
        }
    }

    let report = ValidationReport {
        rows,
        diagnostics,
        missing_columns,
    };

    let summary = report.summary();
    info!(
        "Validated {} rows: {} valid, {} with errors, {} auto-corrected",
        summary.total_rows, summary.valid_rows, summary.error_rows, summary.warning_rows
    );

    report
}

fn try_validate_reader<R: Read>(reader: R) -> Result<ValidationReport> {
    let (headers, records) = parse_records(reader)?;
    debug!(
        "Parsed {} records across {} columns",
        records.len(),
        headers.len()
    );
    Ok(build_report(&headers, &records))
}

pub fn validate_reader<R: Read>(reader: R) -> ValidationReport {
    try_validate_reader(reader).unwrap_or_else(|e| {
        warn!("Usage export could not be parsed: {}", e);
        ValidationReport::failed(e.to_string())
    })
}

pub fn validate(contents: &str) -> ValidationReport {
    validate_reader(contents.as_bytes())
}

pub fn validate_path(path: impl AsRef<Path>) -> ValidationReport {
    match File::open(path.as_ref()) {
        Ok(file) => validate_reader(file),
        Err(e) => {
            warn!("Could not open {}: {}", path.as_ref().display(), e);
            ValidationReport::failed(e.to_string())
        }
    }
}

/// Reads the whole stream, then validates it. There are no partial results.
pub async fn validate_async<R: AsyncRead + Unpin>(mut reader: R) -> ValidationReport {
    let mut buffer = Vec::new();
    if let Err(e) = reader.read_to_end(&mut buffer).await {
        warn!("Usage export stream failed: {}", e);
        return ValidationReport::failed(e.to_string());
    }
    validate_reader(buffer.as_slice())
}

/// Single-shot completion style: `on_complete` runs exactly once, with the report on success or
/// the failure message when the file could not be parsed at all.
pub fn validate_with_callback<R, F>(reader: R, on_complete: F)
where
    R: Read,
    F: FnOnce(std::result::Result<ValidationReport, String>),
{
    match try_validate_reader(reader) {
        Ok(report) => on_complete(Ok(report)),
        Err(e) => on_complete(Err(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Measure;

    const HEADER: &str = "Date,User Email,Company,Role,Last Login,Total Activities,Frank AI Searches,Product Searches,Product Views,Brand Profile Views,Supplier Profile Views,Messages Sent,Sample Requests,Document Downloads,List Exports";

    fn csv_with(rows: &[&str]) -> String {
        let mut out = String::from(HEADER);
        for row in rows {
            out.push('\n');
            out.push_str(row);
        }
        out
    }

    #[test]
    fn test_clean_file_has_no_diagnostics() {
        let contents = csv_with(&[
            "05/01/2024,a@acme.test,Acme,Brand,05/01/2024,3,1,1,1,0,0,0,0,0,0",
            "06/01/2024,b@globex.test,Globex,Supplier,06/01/2024,2,0,1,1,0,0,0,0,0,0",
        ]);
        let report = validate(&contents);
        assert!(report.diagnostics.is_empty(), "{:?}", report.diagnostics);
        assert_eq!(report.rows.len(), 2);
        assert_eq!(report.rows[1].measure(Measure::TotalActivities), 2.0);
    }

    #[test]
    fn test_empty_lines_are_skipped() {
        let contents = format!(
            "{}\n05/01/2024,a@acme.test,Acme,Brand,,1,,,,,,,,,\n\n\n06/01/2024,a@acme.test,Acme,Brand,,2,,,,,,,,,\n",
            HEADER
        );
        let report = validate(&contents);
        assert_eq!(report.rows.len(), 2);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_errors_then_combined_warning_per_row() {
        let contents = csv_with(&[
            "2024-01-05, a@acme.test,Acme,Brand,,1,,,,,,,,,",
            "05/01/2024,a@acme.test,Acme,Owner,,-3,,,,,,,,,",
        ]);
        let report = validate(&contents);
        assert_eq!(
            report.diagnostics,
            vec![
                "Row 2 (warning): User Email auto-corrected by trimming, Date auto-converted to DD/MM/YYYY".to_string(),
                "Row 3, Column 'Role': Invalid role (value: 'Owner')".to_string(),
                "Row 3, Column 'Total Activities': Negative value (value: '-3')".to_string(),
            ]
        );
        assert_eq!(report.errors().count(), 2);
        assert_eq!(report.warnings().count(), 1);
    }

    #[test]
    fn test_header_invisible_characters_are_cleaned() {
        let contents = format!(
            "\u{FEFF}{}\n05/01/2024,a@acme.test,Acme,Brand,,1,,,,,,,,,",
            HEADER
        );
        let report = validate(&contents);
        assert!(report.missing_columns.is_empty());
        assert!(report.rows[0].is_valid());
    }

    #[test]
    fn test_short_rows_read_missing_cells_as_absent() {
        let contents = csv_with(&["05/01/2024,a@acme.test,Acme,Brand"]);
        let report = validate(&contents);
        assert_eq!(report.rows.len(), 1);
        assert!(report.rows[0].is_valid());
        assert_eq!(report.rows[0].measure(Measure::TotalActivities), 0.0);
    }

    #[test]
    fn test_malformed_file_yields_single_diagnostic() {
        let bytes: &[u8] = b"Date,Company\n\xff\xfe,Acme\n";
        let report = validate_reader(bytes);
        assert!(report.rows.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_callback_runs_once_with_report() {
        let mut calls = 0;
        validate_with_callback(csv_with(&[]).as_bytes(), |result| {
            calls += 1;
            let report = result.unwrap();
            assert!(report.rows.is_empty());
        });
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_callback_runs_once_with_failure_on_invalid_utf8() {
        let mut outcomes = Vec::new();
        let bytes: &[u8] = b"Date,Company\n\xff\xfe,Acme\n";
        validate_with_callback(bytes, |result| outcomes.push(result));
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_err());
    }

    struct BrokenReader;

    impl Read for BrokenReader {
        fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "upload interrupted"))
        }
    }

    #[test]
    fn test_callback_reports_read_failure() {
        let mut calls = 0;
        let mut message = String::new();
        validate_with_callback(BrokenReader, |result| {
            calls += 1;
            message = result.unwrap_err();
        });
        assert_eq!(calls, 1);
        assert!(message.contains("upload interrupted"), "{}", message);
    }

    #[test]
    fn test_async_validation_matches_sync() {
        let contents = csv_with(&["05/01/2024,a@acme.test,Acme,Brand,,1,,,,,,,,,"]);
        let report =
            futures::executor::block_on(validate_async(futures::io::Cursor::new(contents.clone())));
        assert_eq!(report, validate(&contents));
    }

    #[test]
    fn test_missing_file_is_a_parse_failure() {
        let report = validate_path("/definitely/not/here.csv");
        assert!(report.rows.is_empty());
        assert_eq!(report.diagnostics.len(), 1);
    }

    #[test]
    fn test_summary_counts() {
        let contents = csv_with(&[
            "05/01/2024,a@acme.test,Acme,Brand,,1,,,,,,,,,",
            "2024-01-06,b@globex.test,Globex,Supplier,,1,,,,,,,,,",
            "07/01/2024,c@initech.test,Initech,Nobody,,1,,,,,,,,,",
        ]);
        let summary = validate(&contents).summary();
        assert_eq!(
            summary,
            ValidationSummary {
                total_rows: 3,
                valid_rows: 2,
                error_rows: 1,
                warning_rows: 1,
                companies: 2,
                missing_columns: 0,
            }
        );
    }
}
