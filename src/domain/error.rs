use thiserror::Error;
use time::Date;

use super::recurrence::ScheduleError;

#[derive(Debug, Error)]
pub enum DomainError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },
    #[error("invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("date range ends on {end} before it starts on {start}")]
    DateRange { start: Date, end: Date },
    #[error("service on {serviced_on} precedes the previous service on {previous}")]
    ServiceOutOfOrder { previous: Date, serviced_on: Date },
    #[error(transparent)]
    Schedule(#[from] ScheduleError),
}

impl DomainError {
    pub fn not_found(entity: &'static str) -> Self {
        Self::NotFound { entity }
    }

    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }
}
