use crate::error::{Result, UsageReportError};
use crate::schema::{Measure, UsageRow};
use chrono::{Local, NaiveDate};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub const DEFAULT_WINDOWS: [u32; 5] = [7, 14, 30, 90, 180];
pub const DEFAULT_MOMENTUM_THRESHOLD_PCT: f64 = 10.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "anchor", content = "date", rename_all = "snake_case")]
pub enum AsOfAnchor {
    #[schemars(description = "Windows end on the local wall-clock date, whatever the data covers")]
    Today,

    #[schemars(description = "Windows end on the latest valid date among the rows in scope")]
    LatestData,

    #[schemars(description = "Windows end on a fixed date")]
    Fixed(NaiveDate),
}

impl Default for AsOfAnchor {
    fn default() -> Self {
        Self::Today
    }
}

impl AsOfAnchor {
    /// Resolves the anchor against the rows in scope. `LatestData` over rows without a valid
    /// date falls back to today.
    pub fn resolve(&self, rows: &[UsageRow]) -> NaiveDate {
        match self {
            AsOfAnchor::Today => Local::now().date_naive(),
            AsOfAnchor::Fixed(date) => *date,
            AsOfAnchor::LatestData => rows
                .iter()
                .filter(|row| row.is_valid())
                .filter_map(UsageRow::calendar_date)
                .max()
                .unwrap_or_else(|| Local::now().date_naive()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ReportConfig {
    #[serde(default = "default_windows")]
    #[schemars(
        description = "Trailing window lengths in days, strictly increasing. Each window's trend compares it with the next wider one."
    )]
    pub windows: Vec<u32>,

    #[serde(default)]
    pub as_of: AsOfAnchor,

    #[serde(default = "default_momentum_threshold")]
    #[schemars(description = "Percent change beyond which the momentum tag turns Up or Down")]
    pub momentum_threshold_pct: f64,

    #[serde(default = "default_summary_measure")]
    #[schemars(description = "Measure used for per-entity summary tables")]
    pub summary_measure: Measure,
}

fn default_windows() -> Vec<u32> {
    DEFAULT_WINDOWS.to_vec()
}

fn default_momentum_threshold() -> f64 {
    DEFAULT_MOMENTUM_THRESHOLD_PCT
}

fn default_summary_measure() -> Measure {
    Measure::TotalActivities
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            windows: default_windows(),
            as_of: AsOfAnchor::default(),
            momentum_threshold_pct: default_momentum_threshold(),
            summary_measure: default_summary_measure(),
        }
    }
}

impl ReportConfig {
    pub fn with_as_of(mut self, as_of: AsOfAnchor) -> Self {
        self.as_of = as_of;
        self
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: ReportConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.windows.is_empty() {
            return Err(UsageReportError::InvalidConfig(
                "At least one trend window is required".to_string(),
            ));
        }

        if let Some(&zero) = self.windows.iter().find(|&&w| w == 0) {
            return Err(UsageReportError::InvalidWindow(zero));
        }

        if self.windows.windows(2).any(|pair| pair[0] >= pair[1]) {
            return Err(UsageReportError::InvalidConfig(format!(
                "Trend windows must be strictly increasing, got {:?}",
                self.windows
            )));
        }

        if !self.momentum_threshold_pct.is_finite() || self.momentum_threshold_pct < 0.0 {
            return Err(UsageReportError::InvalidConfig(format!(
                "Momentum threshold must be a non-negative percentage, got {}",
                self.momentum_threshold_pct
            )));
        }

        Ok(())
    }
}
