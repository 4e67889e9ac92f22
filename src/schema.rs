use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::UsageReportError;
use crate::utils::parse_row_date;

pub const DATE_COLUMN: &str = "Date";
pub const USER_EMAIL_COLUMN: &str = "User Email";
pub const COMPANY_COLUMN: &str = "Company";
pub const ROLE_COLUMN: &str = "Role";
pub const LAST_LOGIN_COLUMN: &str = "Last Login";

/// Identity and metadata columns, in the order they lead the required schema.
pub const IDENTITY_COLUMNS: [&str; 5] = [
    DATE_COLUMN,
    USER_EMAIL_COLUMN,
    COMPANY_COLUMN,
    ROLE_COLUMN,
    LAST_LOGIN_COLUMN,
];

/// Every column a usage export must carry, identity columns first.
pub fn required_columns() -> Vec<&'static str> {
    IDENTITY_COLUMNS
        .iter()
        .copied()
        .chain(Measure::ALL.iter().map(|m| m.column_name()))
        .collect()
}

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, JsonSchema,
)]
pub enum Measure {
    #[serde(rename = "Total Activities")]
    #[schemars(description = "Sum of every tracked activity for the user on that day")]
    TotalActivities,

    #[serde(rename = "Frank AI Searches")]
    FrankAiSearches,

    #[serde(rename = "Product Searches")]
    ProductSearches,

    #[serde(rename = "Product Views")]
    ProductViews,

    #[serde(rename = "Brand Profile Views")]
    BrandProfileViews,

    #[serde(rename = "Supplier Profile Views")]
    SupplierProfileViews,

    #[serde(rename = "Messages Sent")]
    MessagesSent,

    #[serde(rename = "Sample Requests")]
    SampleRequests,

    #[serde(rename = "Document Downloads")]
    DocumentDownloads,

    #[serde(rename = "List Exports")]
    ListExports,
}

impl Measure {
    pub const ALL: [Measure; 10] = [
        Measure::TotalActivities,
        Measure::FrankAiSearches,
        Measure::ProductSearches,
        Measure::ProductViews,
        Measure::BrandProfileViews,
        Measure::SupplierProfileViews,
        Measure::MessagesSent,
        Measure::SampleRequests,
        Measure::DocumentDownloads,
        Measure::ListExports,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Measure::TotalActivities => "Total Activities",
            Measure::FrankAiSearches => "Frank AI Searches",
            Measure::ProductSearches => "Product Searches",
            Measure::ProductViews => "Product Views",
            Measure::BrandProfileViews => "Brand Profile Views",
            Measure::SupplierProfileViews => "Supplier Profile Views",
            Measure::MessagesSent => "Messages Sent",
            Measure::SampleRequests => "Sample Requests",
            Measure::DocumentDownloads => "Document Downloads",
            Measure::ListExports => "List Exports",
        }
    }

    pub fn from_column_name(name: &str) -> Option<Measure> {
        Measure::ALL.iter().copied().find(|m| m.column_name() == name)
    }

    /// Individual activity types, i.e. every measure except the precomputed total.
    pub fn activity_types() -> impl Iterator<Item = Measure> {
        Measure::ALL
            .into_iter()
            .filter(|m| *m != Measure::TotalActivities)
    }
}

impl FromStr for Measure {
    type Err = UsageReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Measure::from_column_name(s.trim())
            .ok_or_else(|| UsageReportError::UnknownMeasure(s.to_string()))
    }
}

impl fmt::Display for Measure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
pub enum Role {
    Brand,
    Supplier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Brand => "Brand",
            Role::Supplier => "Supplier",
        }
    }

    /// Exact, case-sensitive match against the two accepted spellings.
    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "Brand" => Some(Role::Brand),
            "Supplier" => Some(Role::Supplier),
            _ => None,
        }
    }
}

/// One row as it came out of the CSV reader: header name to raw cell, in header order.
/// Columns missing from the header are simply absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: Vec<(String, String)>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, value: impl Into<String>) {
        self.fields.push((column.into(), value.into()));
    }

    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum MeasureCell {
    #[schemars(description = "A coerced, finite number. Empty or missing cells hold 0.")]
    Number(f64),

    #[schemars(description = "The cleaned cell text, kept for preview when it failed validation")]
    Invalid(String),
}

impl MeasureCell {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            MeasureCell::Number(value) => Some(*value),
            MeasureCell::Invalid(_) => None,
        }
    }
}

/// A validated usage row. Rows with a non-empty `row_errors` stay visible for previews but
/// never reach the aggregators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, JsonSchema)]
pub struct UsageRow {
    #[schemars(description = "Canonical DD/MM/YYYY on error-free rows; the cleaned input otherwise")]
    pub date: String,

    pub user_email: String,

    pub company: String,

    #[schemars(description = "\"Brand\" or \"Supplier\" on error-free rows")]
    pub role: String,

    pub last_login: String,

    pub measures: BTreeMap<Measure, MeasureCell>,

    #[serde(default)]
    #[schemars(description = "Columns outside the required schema, cleaned but otherwise untouched")]
    pub extra: BTreeMap<String, String>,

    #[serde(default)]
    pub row_errors: Vec<String>,

    #[serde(default)]
    pub row_warnings: Vec<String>,
}

impl UsageRow {
    pub fn is_valid(&self) -> bool {
        self.row_errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.row_warnings.is_empty()
    }

    pub fn role(&self) -> Option<Role> {
        Role::parse(&self.role)
    }

    /// Numeric value of a measure; invalid or absent cells read as 0.
    pub fn measure(&self, measure: Measure) -> f64 {
        self.measures
            .get(&measure)
            .and_then(MeasureCell::as_number)
            .unwrap_or(0.0)
    }

    pub fn calendar_date(&self) -> Option<NaiveDate> {
        parse_row_date(&self.date)
    }
}

/// Generates a pretty-printed JSON schema for any exported model.
pub fn schema_as_json<T: JsonSchema>() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(T);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_schema_has_fifteen_columns() {
        let columns = required_columns();
        assert_eq!(columns.len(), 15);
        assert_eq!(columns[0], "Date");
        assert_eq!(columns[5], "Total Activities");
        assert_eq!(Measure::ALL.len(), 10);
        assert_eq!(Measure::activity_types().count(), 9);
    }

    #[test]
    fn test_measure_column_names_round_trip() {
        for measure in Measure::ALL {
            assert_eq!(Measure::from_column_name(measure.column_name()), Some(measure));
        }
        assert_eq!(Measure::from_column_name("total activities"), None);
    }

    #[test]
    fn test_measure_from_str() {
        assert_eq!(
            "Product Views".parse::<Measure>().unwrap(),
            Measure::ProductViews
        );
        assert_eq!(
            " List Exports ".parse::<Measure>().unwrap(),
            Measure::ListExports
        );
        assert!(matches!(
            "Page Views".parse::<Measure>(),
            Err(UsageReportError::UnknownMeasure(name)) if name == "Page Views"
        ));
    }

    #[test]
    fn test_role_parse_is_case_sensitive() {
        assert_eq!(Role::parse("Brand"), Some(Role::Brand));
        assert_eq!(Role::parse("Supplier"), Some(Role::Supplier));
        assert_eq!(Role::parse("brand"), None);
        assert_eq!(Role::parse(""), None);
    }

    #[test]
    fn test_raw_record_lookup() {
        let record = RawRecord::from_pairs([("Date", "01/02/2024"), ("Company", "Acme")]);
        assert_eq!(record.get("Company"), Some("Acme"));
        assert_eq!(record.get("Role"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_schema_generation() {
        let schema_json = schema_as_json::<UsageRow>().unwrap();
        assert!(schema_json.contains("row_errors"));

        let measure_json = schema_as_json::<Measure>().unwrap();
        assert!(measure_json.contains("Frank AI Searches"));
    }

    #[test]
    fn test_row_serialization_uses_column_names() {
        let mut measures = BTreeMap::new();
        measures.insert(Measure::TotalActivities, MeasureCell::Number(4.0));
        let row = UsageRow {
            date: "01/02/2024".to_string(),
            user_email: "a@acme.test".to_string(),
            company: "Acme".to_string(),
            role: "Brand".to_string(),
            last_login: String::new(),
            measures,
            extra: BTreeMap::new(),
            row_errors: vec![],
            row_warnings: vec![],
        };

        let json = serde_json::to_string(&row).unwrap();
        assert!(json.contains("\"Total Activities\""));

        let back: UsageRow = serde_json::from_str(&json).unwrap();
        assert_eq!(back, row);
        assert_eq!(back.measure(Measure::TotalActivities), 4.0);
        assert_eq!(back.measure(Measure::ListExports), 0.0);
    }
}
