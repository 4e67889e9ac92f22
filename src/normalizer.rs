//! Row normalization: cleans one raw CSV record and classifies it.
//!
//! The normalizer is a pure function of the raw record and its position in the file. It never
//! fails; problems are recorded on the returned row as errors (row excluded from aggregation)
//! or warnings (auto-corrections, row still counted).

use crate::schema::{
    Measure, MeasureCell, RawRecord, Role, UsageRow, COMPANY_COLUMN, DATE_COLUMN,
    IDENTITY_COLUMNS, LAST_LOGIN_COLUMN, ROLE_COLUMN, USER_EMAIL_COLUMN,
};
use crate::utils::{clean_cell, is_display_date, iso_to_display};
use log::trace;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

pub const DATE_CONVERTED_WARNING: &str = "Date auto-converted to DD/MM/YYYY";

/// Spreadsheet row number for the record at `idx`: 1-based, plus one for the header line.
pub fn spreadsheet_row(idx: usize) -> usize {
    idx + 2
}

fn cell_error(row: usize, column: &str, problem: &str, raw: &str) -> String {
    format!("Row {}, Column '{}': {} (value: '{}')", row, column, problem, raw)
}

pub fn normalize(raw: &RawRecord, idx: usize) -> UsageRow {
    let row_number = spreadsheet_row(idx);
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    // A repeated header keeps its first cell; later copies are ignored entirely.
    let mut cleaned: BTreeMap<&str, String> = BTreeMap::new();
    for (column, value) in raw.iter() {
        if let Entry::Vacant(slot) = cleaned.entry(column) {
            let clean = clean_cell(value);
            if clean != value {
                warnings.push(format!("{} auto-corrected by trimming", column));
            }
            slot.insert(clean);
        }
    }

    let field = |column: &str| cleaned.get(column).cloned().unwrap_or_default();

    let raw_date = field(DATE_COLUMN);
    let date = if is_display_date(&raw_date) {
        raw_date
    } else if let Some(converted) = iso_to_display(&raw_date) {
        warnings.push(DATE_CONVERTED_WARNING.to_string());
        converted
    } else {
        errors.push(cell_error(row_number, DATE_COLUMN, "Invalid date format", &raw_date));
        raw_date
    };

    let role = field(ROLE_COLUMN);
    if Role::parse(&role).is_none() {
        errors.push(cell_error(row_number, ROLE_COLUMN, "Invalid role", &role));
    }

    let mut measures = BTreeMap::new();
    for measure in Measure::ALL {
        let column = measure.column_name();
        let value = field(column);
        let cell = if value.is_empty() {
            MeasureCell::Number(0.0)
        } else {
            match value.parse::<f64>() {
                Ok(number) if !number.is_finite() => {
                    errors.push(cell_error(row_number, column, "Non-numeric value", &value));
                    MeasureCell::Invalid(value)
                }
                Ok(number) if number < 0.0 => {
                    errors.push(cell_error(row_number, column, "Negative value", &value));
                    MeasureCell::Invalid(value)
                }
                Ok(number) => MeasureCell::Number(number),
                Err(_) => {
                    errors.push(cell_error(row_number, column, "Non-numeric value", &value));
                    MeasureCell::Invalid(value)
                }
            }
        };
        measures.insert(measure, cell);
    }

    let extra = cleaned
        .iter()
        .filter(|(column, _)| {
            let column: &str = column;
            !IDENTITY_COLUMNS.contains(&column) && Measure::from_column_name(column).is_none()
        })
        .map(|(column, value)| (column.to_string(), value.clone()))
        .collect();

    if !errors.is_empty() {
        trace!("Row {} flagged with {} error(s)", row_number, errors.len());
    }

    UsageRow {
        date,
        user_email: field(USER_EMAIL_COLUMN),
        company: field(COMPANY_COLUMN),
        role,
        last_login: field(LAST_LOGIN_COLUMN),
        measures,
        extra,
        row_errors: errors,
        row_warnings: warnings,
    }
}

/// Turns a validated row back into a raw record in required-schema order, followed by any
/// extra columns. Feeding the result to [`normalize`] again must not change anything for an
/// error-free row.
pub fn to_raw_record(row: &UsageRow) -> RawRecord {
    let mut record = RawRecord::new();
    record.push(DATE_COLUMN, row.date.clone());
    record.push(USER_EMAIL_COLUMN, row.user_email.clone());
    record.push(COMPANY_COLUMN, row.company.clone());
    record.push(ROLE_COLUMN, row.role.clone());
    record.push(LAST_LOGIN_COLUMN, row.last_login.clone());
    for measure in Measure::ALL {
        let value = match row.measures.get(&measure) {
            Some(MeasureCell::Number(number)) => number.to_string(),
            Some(MeasureCell::Invalid(text)) => text.clone(),
            None => String::new(),
        };
        record.push(measure.column_name(), value);
    }
    for (column, value) in &row.extra {
        record.push(column.clone(), value.clone());
    }
    record
}
