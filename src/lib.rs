//! # Usage Report Core
//!
//! Validation and aggregation pipeline for platform usage CSV exports.
//!
//! ## Core Concepts
//!
//! - **Validated rows**: every CSV record becomes a typed [`UsageRow`] annotated with errors
//!   (row excluded from aggregation) and warnings (auto-corrections, row still counted)
//! - **Diagnostics**: a flat list of strings; warnings carry the `(warning)` marker
//! - **Filtering**: an inclusive date range plus an entity filter (all, brands, suppliers or a
//!   set of companies)
//! - **Timelines**: date-ordered matrices of a measure per company, or per activity column for a
//!   single company
//! - **Trend tables**: trailing 7/14/30/90/180 day Avg/Actual figures, each window compared with
//!   the next wider one
//!
//! ## Example
//!
//! ```rust,ignore
//! use usage_report_core::*;
//! use chrono::NaiveDate;
//!
//! let report = validate(&std::fs::read_to_string("usage.csv")?);
//! for diagnostic in report.errors() {
//!     eprintln!("{}", diagnostic);
//! }
//!
//! let selection = FilterSelection {
//!     date_range: DateRange::full_span(&report.rows),
//!     entity_filter: EntityFilter::BrandsOnly,
//! };
//! let config = ReportConfig::default()
//!     .with_as_of(AsOfAnchor::Fixed(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()));
//!
//! let usage = process_usage_report(&report.rows, &selection, Measure::TotalActivities, &config)?;
//! println!("{}", usage.timeline.to_csv()?);
//! ```

pub mod config;
pub mod error;
pub mod filter;
pub mod ingestion;
pub mod normalizer;
pub mod schema;
pub mod timeline;
pub mod trend;
pub mod utils;

pub use config::{AsOfAnchor, ReportConfig};
pub use error::{Result, UsageReportError};
pub use filter::{companies, data_date_span, filter_rows, DateRange, EntityFilter};
pub use ingestion::*;
pub use normalizer::normalize;
pub use schema::*;
pub use timeline::{aggregate_by_activity, aggregate_by_company, Timeline, TimelinePoint};
pub use trend::*;

use chrono::NaiveDate;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FilterSelection {
    #[serde(default)]
    pub date_range: DateRange,
    #[serde(default)]
    pub entity_filter: EntityFilter,
}

/// Everything a presentation shell needs for one filter state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UsageReport {
    #[schemars(description = "Rows passing the date and entity filters, error rows included")]
    pub rows: Vec<UsageRow>,

    pub timeline: Timeline,

    #[schemars(description = "Per-activity timeline, only when exactly one company is in scope")]
    pub activity_timeline: Option<Timeline>,

    pub trend_table: TrendTable,

    pub entity_summary: TrendTable,

    pub momentum: MomentumReport,

    pub as_of: NaiveDate,
}

pub struct UsageReportProcessor;

impl UsageReportProcessor {
    /// Recomputes every aggregate from scratch for the given filter state.
    ///
    /// The timeline follows the full selection. Trend figures only apply the entity filter,
    /// since their trailing windows carry their own dates.
    pub fn process(
        rows: &[UsageRow],
        selection: &FilterSelection,
        measure: Measure,
        config: &ReportConfig,
    ) -> Result<UsageReport> {
        config.validate()?;

        let filtered = filter_rows(rows, &selection.date_range, &selection.entity_filter);
        let entity_rows = filter_rows(rows, &DateRange::unbounded(), &selection.entity_filter);
        let as_of = config.as_of.resolve(&entity_rows);

        info!(
            "Processing usage report: {} of {} rows selected, as of {}",
            filtered.len(),
            rows.len(),
            as_of
        );

        let timeline = aggregate_by_company(&filtered, measure);
        let in_scope = companies(&filtered, &EntityFilter::AllEntities);
        let activity_timeline = if in_scope.len() == 1 {
            Some(aggregate_by_activity(&filtered)?)
        } else {
            None
        };

        let trend_table =
            build_scoped_trend_table(&entity_rows, &selection.entity_filter, as_of, config)?;
        let entity_summary = build_entity_summary(
            rows,
            &selection.entity_filter,
            config.summary_measure,
            as_of,
            config,
        )?;

        let shortest = config.windows.first().copied().unwrap_or(7);
        let momentum = trend::momentum(
            &entity_rows,
            measure,
            shortest,
            as_of,
            config.momentum_threshold_pct,
        )?;

        debug!(
            "Timeline has {} dates and {} series; trend table has {} rows",
            timeline.series.len(),
            timeline.group_keys.len(),
            trend_table.rows.len()
        );

        Ok(UsageReport {
            rows: filtered,
            timeline,
            activity_timeline,
            trend_table,
            entity_summary,
            momentum,
            as_of,
        })
    }

    /// Validates a whole CSV export, then processes the validated rows.
    pub fn process_csv(
        contents: &str,
        selection: &FilterSelection,
        measure: Measure,
        config: &ReportConfig,
    ) -> Result<(ValidationReport, UsageReport)> {
        let validation = validate(contents);
        let report = Self::process(&validation.rows, selection, measure, config)?;
        Ok((validation, report))
    }
}

pub fn process_usage_report(
    rows: &[UsageRow],
    selection: &FilterSelection,
    measure: Measure,
    config: &ReportConfig,
) -> Result<UsageReport> {
    UsageReportProcessor::process(rows, selection, measure, config)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CSV: &str = "\
Date,User Email,Company,Role,Last Login,Total Activities,Frank AI Searches,Product Searches,Product Views,Brand Profile Views,Supplier Profile Views,Messages Sent,Sample Requests,Document Downloads,List Exports
28/06/2024,a@acme.test,Acme,Brand,28/06/2024,4,1,1,2,0,0,0,0,0,0
2024-06-29,a@acme.test,Acme,Brand,29/06/2024,6,2,2,2,0,0,0,0,0,0
30/06/2024,b@globex.test,Globex,Supplier,30/06/2024,10,0,5,5,0,0,0,0,0,0
30/06/2024,c@initech.test,Initech,Brand,30/06/2024,-2,0,0,0,0,0,0,0,0,0
";

    fn config() -> ReportConfig {
        ReportConfig::default()
            .with_as_of(AsOfAnchor::Fixed(NaiveDate::from_ymd_opt(2024, 6, 30).unwrap()))
    }

    #[test]
    fn test_end_to_end_processing() {
        let (validation, report) = UsageReportProcessor::process_csv(
            CSV,
            &FilterSelection::default(),
            Measure::TotalActivities,
            &config(),
        )
        .unwrap();

        assert_eq!(validation.rows.len(), 4);
        assert_eq!(validation.errors().count(), 1);
        assert_eq!(validation.warnings().count(), 1);

        assert_eq!(report.rows.len(), 4);
        assert_eq!(report.timeline.group_keys, vec!["Acme", "Globex"]);
        assert_eq!(
            report.timeline.dates(),
            vec!["28/06/2024", "29/06/2024", "30/06/2024"]
        );
        assert!(report.activity_timeline.is_none());

        let total = report.trend_table.row("Total Activities").unwrap();
        assert_eq!(total.window(7).unwrap().actual, 20.0);

        let labels: Vec<&str> = report
            .entity_summary
            .rows
            .iter()
            .map(|r| r.label.as_str())
            .collect();
        assert_eq!(labels, vec!["Acme", "Globex", "All Companies"]);
    }

    #[test]
    fn test_single_company_selection() {
        let validation = validate(CSV);
        let selection = FilterSelection {
            date_range: DateRange::unbounded(),
            entity_filter: EntityFilter::companies(["Acme"]),
        };
        let report = process_usage_report(
            &validation.rows,
            &selection,
            Measure::TotalActivities,
            &config(),
        )
        .unwrap();

        assert_eq!(report.trend_table.title, "Acme");
        let activity = report.activity_timeline.unwrap();
        assert_eq!(activity.series.len(), 2);
        assert_eq!(activity.total_for("Product Views"), 4.0);
        assert_eq!(
            report
                .trend_table
                .row("Total Activities")
                .unwrap()
                .window(7)
                .unwrap()
                .actual,
            10.0
        );
    }

    #[test]
    fn test_date_range_only_scopes_timeline() {
        let validation = validate(CSV);
        let last_day = NaiveDate::from_ymd_opt(2024, 6, 30).unwrap();
        let selection = FilterSelection {
            date_range: DateRange::between(last_day, last_day),
            entity_filter: EntityFilter::AllEntities,
        };
        let report = process_usage_report(
            &validation.rows,
            &selection,
            Measure::TotalActivities,
            &config(),
        )
        .unwrap();

        assert_eq!(report.rows.len(), 2);
        assert!(report.rows.iter().all(|r| r.date == "30/06/2024"));
        assert_eq!(report.timeline.group_keys, vec!["Globex"]);
        assert_eq!(report.timeline.dates(), vec!["30/06/2024"]);

        let total = report.trend_table.row("Total Activities").unwrap();
        assert_eq!(total.window(7).unwrap().actual, 20.0);
        assert_eq!(
            report
                .entity_summary
                .row("Acme")
                .unwrap()
                .window(7)
                .unwrap()
                .actual,
            10.0
        );
        assert_eq!(report.momentum.current_avg, 20.0 / 3.0);
    }

    #[test]
    fn test_role_selection_titles_trend_table() {
        let validation = validate(CSV);
        let selection = FilterSelection {
            date_range: DateRange::unbounded(),
            entity_filter: EntityFilter::BrandsOnly,
        };
        let report = process_usage_report(
            &validation.rows,
            &selection,
            Measure::TotalActivities,
            &config(),
        )
        .unwrap();

        assert_eq!(report.trend_table.title, "All Brands");
        assert_eq!(
            report
                .trend_table
                .row("Total Activities")
                .unwrap()
                .window(7)
                .unwrap()
                .actual,
            10.0
        );
    }

    #[test]
    fn test_latest_data_anchor() {
        let validation = validate(CSV);
        let config = ReportConfig::default().with_as_of(AsOfAnchor::LatestData);
        let report = process_usage_report(
            &validation.rows,
            &FilterSelection::default(),
            Measure::TotalActivities,
            &config,
        )
        .unwrap();
        assert_eq!(report.as_of, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
    }
}
