use thiserror::Error;

#[derive(Error, Debug)]
pub enum UsageReportError {
    #[error("Invalid report configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid trend window {0}: windows must be at least one day long")]
    InvalidWindow(u32),

    #[error("Activity timeline needs exactly one company in scope, found {0}")]
    MultipleCompanies(usize),

    #[error("Unknown measure column: {0}")]
    UnknownMeasure(String),

    #[error("Date calculation error: {0}")]
    DateError(String),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UsageReportError>;
