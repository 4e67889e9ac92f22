use crate::error::{Result, UsageReportError};
use chrono::{Days, NaiveDate};

/// Characters that survive a plain trim but still break equality checks on exported cells.
const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', // zero width space
    '\u{200C}', // zero width non-joiner
    '\u{200D}', // zero width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // byte order mark
    '\u{00AD}', // soft hyphen
];

/// Removes invisible characters anywhere in the value, then surrounding whitespace.
pub fn clean_cell(value: &str) -> String {
    value
        .chars()
        .filter(|c| !INVISIBLE_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string()
}

fn matches_shape(value: &str, shape: &str) -> bool {
    value.len() == shape.len()
        && value.bytes().zip(shape.bytes()).all(|(v, s)| match s {
            b'd' => v.is_ascii_digit(),
            _ => v == s,
        })
}

/// `DD/MM/YYYY`, checked by shape only.
pub fn is_display_date(value: &str) -> bool {
    matches_shape(value, "dd/dd/dddd")
}

/// `YYYY-MM-DD`, checked by shape only.
pub fn is_iso_date(value: &str) -> bool {
    matches_shape(value, "dddd-dd-dd")
}

/// Rewrites an ISO-shaped date into `DD/MM/YYYY` without validating the calendar.
pub fn iso_to_display(value: &str) -> Option<String> {
    if !is_iso_date(value) {
        return None;
    }
    Some(format!("{}/{}/{}", &value[8..10], &value[5..7], &value[0..4]))
}

pub fn format_display_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Sort key (year, month, day) for a `DD/MM/YYYY` string. Works on impossible dates too,
/// so ordering never depends on calendar validity.
pub fn display_date_key(value: &str) -> Option<(u32, u32, u32)> {
    if !is_display_date(value) {
        return None;
    }
    let day = value[0..2].parse().ok()?;
    let month = value[3..5].parse().ok()?;
    let year = value[6..10].parse().ok()?;
    Some((year, month, day))
}

/// Parses a row date in either accepted shape into a real calendar date.
pub fn parse_row_date(value: &str) -> Option<NaiveDate> {
    if is_display_date(value) {
        NaiveDate::parse_from_str(value, "%d/%m/%Y").ok()
    } else if is_iso_date(value) {
        NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
    } else {
        None
    }
}

/// First day of an inclusive trailing window of `days` days ending on `end`.
pub fn window_start(end: NaiveDate, days: u32) -> Result<NaiveDate> {
    if days == 0 {
        return Err(UsageReportError::InvalidWindow(days));
    }
    end.checked_sub_days(Days::new(u64::from(days - 1)))
        .ok_or_else(|| {
            UsageReportError::DateError(format!(
                "Window of {} days ending {} starts before the supported calendar",
                days, end
            ))
        })
}

pub fn in_window(date: NaiveDate, start: NaiveDate, end: NaiveDate) -> bool {
    date >= start && date <= end
}
