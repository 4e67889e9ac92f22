use crate::schema::{Role, UsageRow};
use crate::utils::{in_window, parse_row_date};
use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "mode", content = "companies", rename_all = "snake_case")]
pub enum EntityFilter {
    AllEntities,
    BrandsOnly,
    SuppliersOnly,
    SpecificCompanies(BTreeSet<String>),
}

impl Default for EntityFilter {
    fn default() -> Self {
        Self::AllEntities
    }
}

impl EntityFilter {
    pub fn companies<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::SpecificCompanies(names.into_iter().map(Into::into).collect())
    }

    pub fn matches(&self, row: &UsageRow) -> bool {
        match self {
            EntityFilter::AllEntities => true,
            EntityFilter::BrandsOnly => row.role() == Some(Role::Brand),
            EntityFilter::SuppliersOnly => row.role() == Some(Role::Supplier),
            EntityFilter::SpecificCompanies(set) => set.contains(&row.company),
        }
    }

    /// Label for the synthetic row that aggregates every entity in scope.
    pub fn aggregate_label(&self) -> &'static str {
        match self {
            EntityFilter::AllEntities => "All Companies",
            EntityFilter::BrandsOnly => "All Brands",
            EntityFilter::SuppliersOnly => "All Suppliers",
            EntityFilter::SpecificCompanies(_) => "Selected Companies",
        }
    }
}

/// Closed date interval; a missing bound leaves that side open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self::new(Some(start), Some(end))
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// The full span of the data, used when the caller has not picked a range yet.
    pub fn full_span(rows: &[UsageRow]) -> Self {
        match data_date_span(rows) {
            Some((start, end)) => Self::between(start, end),
            None => Self::unbounded(),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        let after_start = self.start.map_or(true, |start| date >= start);
        let before_end = self.end.map_or(true, |end| date <= end);
        after_start && before_end
    }

    /// Rows whose date does not parse under either accepted shape never match.
    pub fn matches(&self, row: &UsageRow) -> bool {
        parse_row_date(&row.date).is_some_and(|date| self.contains(date))
    }
}

/// Date test first, then entity test. Error rows pass through untouched.
pub fn filter_rows(
    rows: &[UsageRow],
    date_range: &DateRange,
    entity_filter: &EntityFilter,
) -> Vec<UsageRow> {
    rows.iter()
        .filter(|row| date_range.matches(row) && entity_filter.matches(row))
        .cloned()
        .collect()
}

/// Earliest and latest calendar date over error-free rows.
pub fn data_date_span(rows: &[UsageRow]) -> Option<(NaiveDate, NaiveDate)> {
    let mut dates = rows
        .iter()
        .filter(|row| row.is_valid())
        .filter_map(UsageRow::calendar_date);

    let first = dates.next()?;
    Some(dates.fold((first, first), |(min, max), date| {
        (min.min(date), max.max(date))
    }))
}

/// Distinct companies on error-free rows matching the filter, alphabetical regardless of case.
/// Names differing only in case keep a stable byte-order tie-break.
pub fn companies(rows: &[UsageRow], entity_filter: &EntityFilter) -> Vec<String> {
    let mut names: Vec<String> = rows
        .iter()
        .filter(|row| row.is_valid() && entity_filter.matches(row))
        .map(|row| row.company.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    names.sort_by(|a, b| {
        a.to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| a.cmp(b))
    });
    names
}

/// Rows inside an inclusive window, skipping error rows.
pub(crate) fn valid_rows_in_window<'a>(
    rows: &'a [UsageRow],
    start: NaiveDate,
    end: NaiveDate,
) -> impl Iterator<Item = (NaiveDate, &'a UsageRow)> + 'a {
    rows.iter()
        .filter(|row| row.is_valid())
        .filter_map(|row| row.calendar_date().map(|date| (date, row)))
        .filter(move |(date, _)| in_window(*date, start, end))
}
