//! Timeline aggregation: one entry per distinct date, one value per group key.
//!
//! Every entry carries every group key so that each series spans the full date axis without
//! gaps. Entries are ordered by calendar date, never by the display string.

use crate::error::{Result, UsageReportError};
use crate::schema::{Measure, UsageRow, DATE_COLUMN};
use crate::utils::display_date_key;
use log::debug;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TimelinePoint {
    #[schemars(description = "DD/MM/YYYY, exactly as it appears on the rows")]
    pub date: String,
    pub values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Timeline {
    pub series: Vec<TimelinePoint>,
    pub group_keys: Vec<String>,
}

impl Timeline {
    fn from_buckets(
        buckets: BTreeMap<String, BTreeMap<String, f64>>,
        group_keys: Vec<String>,
    ) -> Self {
        let mut series: Vec<TimelinePoint> = buckets
            .into_iter()
            .map(|(date, mut values)| {
                for key in &group_keys {
                    values.entry(key.clone()).or_insert(0.0);
                }
                TimelinePoint { date, values }
            })
            .collect();

        // Impossible calendar dates still carry sortable components; anything else goes last.
        series.sort_by(|a, b| {
            let ka = display_date_key(&a.date).unwrap_or((u32::MAX, u32::MAX, u32::MAX));
            let kb = display_date_key(&b.date).unwrap_or((u32::MAX, u32::MAX, u32::MAX));
            ka.cmp(&kb).then_with(|| a.date.cmp(&b.date))
        });

        Self { series, group_keys }
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }

    pub fn dates(&self) -> Vec<&str> {
        self.series.iter().map(|p| p.date.as_str()).collect()
    }

    /// Values of one group key across the whole date axis.
    pub fn series_for(&self, key: &str) -> Option<Vec<f64>> {
        if !self.group_keys.iter().any(|k| k == key) {
            return None;
        }
        Some(
            self.series
                .iter()
                .map(|p| p.values.get(key).copied().unwrap_or(0.0))
                .collect(),
        )
    }

    pub fn total_for(&self, key: &str) -> f64 {
        self.series_for(key)
            .map(|values| values.iter().sum())
            .unwrap_or(0.0)
    }

    /// Renders the matrix as `Date,<key>...` CSV for chart-data export.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::Writer::from_writer(Vec::new());

        let mut header = vec![DATE_COLUMN.to_string()];
        header.extend(self.group_keys.iter().cloned());
        writer.write_record(&header)?;

        for point in &self.series {
            let mut record = vec![point.date.clone()];
            record.extend(
                self.group_keys
                    .iter()
                    .map(|key| point.values.get(key).copied().unwrap_or(0.0).to_string()),
            );
            writer.write_record(&record)?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|e| UsageReportError::IoError(e.into_error()))?;
        String::from_utf8(bytes).map_err(|e| {
            UsageReportError::IoError(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
        })
    }
}

/// Sums `measure` per company per date over error-free rows.
pub fn aggregate_by_company(rows: &[UsageRow], measure: Measure) -> Timeline {
    let mut buckets: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    let mut companies: BTreeSet<String> = BTreeSet::new();

    for row in rows.iter().filter(|row| row.is_valid()) {
        companies.insert(row.company.clone());
        *buckets
            .entry(row.date.clone())
            .or_default()
            .entry(row.company.clone())
            .or_insert(0.0) += row.measure(measure);
    }

    debug!(
        "Company timeline for {}: {} dates across {} companies",
        measure,
        buckets.len(),
        companies.len()
    );

    Timeline::from_buckets(buckets, companies.into_iter().collect())
}

/// Sums every measure column per date, for a single company's all-activity view.
pub fn aggregate_by_activity(rows: &[UsageRow]) -> Result<Timeline> {
    let companies: BTreeSet<&str> = rows
        .iter()
        .filter(|row| row.is_valid())
        .map(|row| row.company.as_str())
        .collect();
    if companies.len() > 1 {
        return Err(UsageReportError::MultipleCompanies(companies.len()));
    }

    let mut buckets: BTreeMap<String, BTreeMap<String, f64>> = BTreeMap::new();
    for row in rows.iter().filter(|row| row.is_valid()) {
        let values = buckets.entry(row.date.clone()).or_default();
        for measure in Measure::ALL {
            *values
                .entry(measure.column_name().to_string())
                .or_insert(0.0) += row.measure(measure);
        }
    }

    let group_keys = Measure::ALL
        .iter()
        .map(|m| m.column_name().to_string())
        .collect();

    Ok(Timeline::from_buckets(buckets, group_keys))
}
