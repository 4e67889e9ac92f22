//! Period comparison over trailing windows.
//!
//! Two independent classifiers live here and must stay separate:
//! - trend tables compare each window's average with the next wider window's average by exact
//!   value (`TrendIndicator`);
//! - the momentum tag compares a period with the immediately preceding period of the same
//!   length against a percentage threshold (`Momentum`).

use crate::config::ReportConfig;
use crate::error::{Result, UsageReportError};
use crate::filter::{companies, valid_rows_in_window, EntityFilter};
use crate::schema::{Measure, UsageRow};
use crate::utils::window_start;
use chrono::{Days, NaiveDate};
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum TrendIndicator {
    Higher,
    Lower,
    Equal,
}

impl TrendIndicator {
    /// Exact comparison, no tolerance band.
    pub fn compare(avg: f64, wider_avg: f64) -> Self {
        if avg > wider_avg {
            TrendIndicator::Higher
        } else if avg < wider_avg {
            TrendIndicator::Lower
        } else {
            TrendIndicator::Equal
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WindowFigures {
    pub days: u32,
    pub actual: f64,
    #[schemars(description = "Actual divided by the window length in calendar days")]
    pub avg: f64,
    #[schemars(description = "Against the next wider window; absent on the widest window")]
    pub trend: Option<TrendIndicator>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendRow {
    pub label: String,
    pub windows: Vec<WindowFigures>,
    #[serde(default)]
    pub is_aggregate: bool,
}

impl TrendRow {
    pub fn window(&self, days: u32) -> Option<&WindowFigures> {
        self.windows.iter().find(|w| w.days == days)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TrendTable {
    pub title: String,
    pub as_of: NaiveDate,
    pub windows: Vec<u32>,
    pub rows: Vec<TrendRow>,
}

impl TrendTable {
    pub fn row(&self, label: &str) -> Option<&TrendRow> {
        self.rows.iter().find(|r| r.label == label)
    }
}

fn window_figures<F>(
    rows: &[UsageRow],
    windows: &[u32],
    as_of: NaiveDate,
    value: F,
) -> Result<Vec<WindowFigures>>
where
    F: Fn(&UsageRow) -> f64,
{
    let mut figures = Vec::with_capacity(windows.len());
    for &days in windows {
        let start = window_start(as_of, days)?;
        let actual: f64 = valid_rows_in_window(rows, start, as_of)
            .map(|(_, row)| value(row))
            .sum();
        figures.push(WindowFigures {
            days,
            actual,
            avg: actual / f64::from(days),
            trend: None,
        });
    }

    for i in 0..figures.len().saturating_sub(1) {
        figures[i].trend = Some(TrendIndicator::compare(figures[i].avg, figures[i + 1].avg));
    }

    Ok(figures)
}

/// Per-activity Avg/Actual for one company, or for every row in scope when `company` is `None`.
/// Rows are the individual activity types in schema order followed by a "Total Activities" row.
pub fn build_trend_table(
    rows: &[UsageRow],
    company: Option<&str>,
    as_of: NaiveDate,
    config: &ReportConfig,
) -> Result<TrendTable> {
    let scoped: Vec<UsageRow> = match company {
        Some(name) => rows.iter().filter(|r| r.company == name).cloned().collect(),
        None => rows.to_vec(),
    };
    let title = company.unwrap_or("All Companies").to_string();
    activity_table(&scoped, title, as_of, config)
}

/// Same table over the rows an entity filter keeps, titled after the selection: the company
/// name when exactly one specific company is selected, the filter's aggregate label otherwise.
pub fn build_scoped_trend_table(
    rows: &[UsageRow],
    entity_filter: &EntityFilter,
    as_of: NaiveDate,
    config: &ReportConfig,
) -> Result<TrendTable> {
    let in_scope: Vec<UsageRow> = rows
        .iter()
        .filter(|r| entity_filter.matches(r))
        .cloned()
        .collect();

    let scoped_companies = companies(&in_scope, &EntityFilter::AllEntities);
    let title = match (entity_filter, scoped_companies.as_slice()) {
        (EntityFilter::SpecificCompanies(_), [only]) => only.clone(),
        _ => entity_filter.aggregate_label().to_string(),
    };
    activity_table(&in_scope, title, as_of, config)
}

fn activity_table(
    scoped: &[UsageRow],
    title: String,
    as_of: NaiveDate,
    config: &ReportConfig,
) -> Result<TrendTable> {
    config.validate()?;

    let mut table_rows = Vec::new();
    for measure in Measure::activity_types() {
        table_rows.push(TrendRow {
            label: measure.column_name().to_string(),
            windows: window_figures(scoped, &config.windows, as_of, |r| r.measure(measure))?,
            is_aggregate: false,
        });
    }
    table_rows.push(TrendRow {
        label: Measure::TotalActivities.column_name().to_string(),
        windows: window_figures(scoped, &config.windows, as_of, |r| {
            r.measure(Measure::TotalActivities)
        })?,
        is_aggregate: true,
    });

    debug!(
        "Built trend table for {} as of {} over {} windows",
        title,
        as_of,
        config.windows.len()
    );

    Ok(TrendTable {
        title,
        as_of,
        windows: config.windows.clone(),
        rows: table_rows,
    })
}

/// One row per entity in scope (alphabetical) plus a synthetic row over all of them.
pub fn build_entity_summary(
    rows: &[UsageRow],
    entity_filter: &EntityFilter,
    measure: Measure,
    as_of: NaiveDate,
    config: &ReportConfig,
) -> Result<TrendTable> {
    config.validate()?;

    let in_scope: Vec<UsageRow> = rows
        .iter()
        .filter(|r| entity_filter.matches(r))
        .cloned()
        .collect();

    let mut table_rows = Vec::new();
    for entity in companies(&in_scope, &EntityFilter::AllEntities) {
        let entity_rows: Vec<UsageRow> = in_scope
            .iter()
            .filter(|r| r.company == entity)
            .cloned()
            .collect();
        table_rows.push(TrendRow {
            windows: window_figures(&entity_rows, &config.windows, as_of, |r| r.measure(measure))?,
            label: entity,
            is_aggregate: false,
        });
    }

    table_rows.push(TrendRow {
        label: entity_filter.aggregate_label().to_string(),
        windows: window_figures(&in_scope, &config.windows, as_of, |r| r.measure(measure))?,
        is_aggregate: true,
    });

    Ok(TrendTable {
        title: format!("{} - {}", entity_filter.aggregate_label(), measure),
        as_of,
        windows: config.windows.clone(),
        rows: table_rows,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum Momentum {
    Up,
    Down,
    Flat,
}

impl Momentum {
    pub fn arrow(&self) -> &'static str {
        match self {
            Momentum::Up => "↑",
            Momentum::Down => "↓",
            Momentum::Flat => "→",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MomentumReport {
    pub measure: Measure,
    pub period_days: u32,
    pub end_date: NaiveDate,
    pub current_avg: f64,
    pub prior_avg: f64,
    #[schemars(description = "Percent change from the prior period; absent when the prior average is zero")]
    pub change_pct: Option<f64>,
    pub momentum: Momentum,
}

/// Up when the prior period was silent and the current one is not, or the change exceeds the
/// threshold; Down below the negative threshold; Flat otherwise.
pub fn classify_momentum(current_avg: f64, prior_avg: f64, threshold_pct: f64) -> Momentum {
    if prior_avg == 0.0 {
        return if current_avg > 0.0 {
            Momentum::Up
        } else {
            Momentum::Flat
        };
    }

    let change_pct = (current_avg - prior_avg) / prior_avg * 100.0;
    if change_pct > threshold_pct {
        Momentum::Up
    } else if change_pct < -threshold_pct {
        Momentum::Down
    } else {
        Momentum::Flat
    }
}

/// Sum over the period divided by the number of distinct days that have data (at least 1).
fn period_average(rows: &[UsageRow], measure: Measure, start: NaiveDate, end: NaiveDate) -> f64 {
    let mut days = BTreeSet::new();
    let mut total = 0.0;
    for (date, row) in valid_rows_in_window(rows, start, end) {
        days.insert(date);
        total += row.measure(measure);
    }
    total / days.len().max(1) as f64
}

pub fn momentum(
    rows: &[UsageRow],
    measure: Measure,
    period_days: u32,
    end_date: NaiveDate,
    threshold_pct: f64,
) -> Result<MomentumReport> {
    let current_start = window_start(end_date, period_days)?;
    let prior_end = current_start.checked_sub_days(Days::new(1)).ok_or_else(|| {
        UsageReportError::DateError(format!("No prior period before {}", current_start))
    })?;
    let prior_start = window_start(prior_end, period_days)?;

    let current_avg = period_average(rows, measure, current_start, end_date);
    let prior_avg = period_average(rows, measure, prior_start, prior_end);
    let change_pct = (prior_avg != 0.0).then(|| (current_avg - prior_avg) / prior_avg * 100.0);
    let momentum = classify_momentum(current_avg, prior_avg, threshold_pct);

    debug!(
        "{} momentum over {} days ending {}: {:.2} vs {:.2} -> {:?}",
        measure, period_days, end_date, current_avg, prior_avg, momentum
    );

    Ok(MomentumReport {
        measure,
        period_days,
        end_date,
        current_avg,
        prior_avg,
        change_pct,
        momentum,
    })
}
