use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Unauthorized: caller has no organization/sector assignment")]
    Unauthorized,

    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Snapshot already exists for period {period_start} to {period_end}")]
    DuplicatePeriod {
        period_start: NaiveDate,
        period_end: NaiveDate,
    },

    #[error("Report not found: {0}")]
    ReportNotFound(Uuid),

    #[error("Unknown organization: {0}")]
    UnknownOrganization(Uuid),

    #[error("Unknown sector: {0}")]
    UnknownSector(Uuid),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AnalyticsError>;
