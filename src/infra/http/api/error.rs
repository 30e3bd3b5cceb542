use crate::application::auth::AuthError;
use crate::application::error::{AppError, ErrorReport};
use crate::application::repos::RepoError;
use crate::cache::CacheError;
use crate::domain::error::DomainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

const SOURCE: &str = "infra::http::api";

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const BAD_REQUEST: &str = "bad_request";
    pub const UNAUTHORIZED: &str = "unauthorized";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const CONFLICT: &str = "conflict";
    pub const DUPLICATE: &str = "duplicate";
    pub const INVALID_INPUT: &str = "invalid_input";
    pub const INVALID_PATTERN: &str = "invalid_pattern";
    pub const INVALID_SCHEDULE: &str = "invalid_schedule";
    pub const INTEGRITY: &str = "integrity_error";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const REPO: &str = "repo_error";
    pub const INTERNAL: &str = "internal_error";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: &'static str,
    hint: Option<String>,
    report: Option<ErrorReport>,
}

impl ApiError {
    pub fn new(
        status: StatusCode,
        code: &'static str,
        message: &'static str,
        hint: Option<String>,
    ) -> Self {
        Self {
            status,
            code,
            message,
            hint,
            report: None,
        }
    }

    pub fn bad_request(message: &'static str, hint: Option<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message, hint)
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            codes::UNAUTHORIZED,
            "Bearer token required",
            None,
        )
    }

    pub fn forbidden() -> Self {
        Self::new(
            StatusCode::FORBIDDEN,
            codes::FORBIDDEN,
            "Token lacks the required role",
            None,
        )
    }

    pub fn not_found(message: &'static str) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message, None)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    fn with_report(mut self, report: ErrorReport) -> Self {
        self.report = Some(report);
        self
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Missing | AuthError::Invalid => Self::unauthorized(),
            AuthError::Forbidden => Self::forbidden(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        let status = err.status_code();
        let report = ErrorReport::from_error(SOURCE, status, &err);
        let api = match err {
            AppError::Repo(repo) => repo_to_api(repo),
            AppError::Cache(CacheError::InvalidPattern { pattern, reason }) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_PATTERN,
                "Invalid cache key pattern",
                Some(format!("{pattern}: {reason}")),
            ),
            AppError::Domain(DomainError::Schedule(schedule)) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_SCHEDULE,
                "Invalid schedule",
                Some(schedule.to_string()),
            ),
            AppError::Domain(DomainError::Validation { field, reason }) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(format!("{field}: {reason}")),
            ),
            AppError::Domain(
                domain @ (DomainError::DateRange { .. } | DomainError::ServiceOutOfOrder { .. }),
            ) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(domain.to_string()),
            ),
            AppError::Validation(message) => Self::new(
                StatusCode::BAD_REQUEST,
                codes::INVALID_INPUT,
                "Invalid input",
                Some(message),
            ),
            AppError::Domain(DomainError::NotFound { entity }) => Self::new(
                StatusCode::NOT_FOUND,
                codes::NOT_FOUND,
                "Resource not found",
                Some(format!("{entity} not found")),
            ),
            AppError::NotFound => Self::not_found("Resource not found"),
            AppError::Conflict(message) => Self::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Request conflicts with current state",
                Some(message),
            ),
            other => Self::new(
                other.status_code(),
                codes::INTERNAL,
                other.presentation_message(),
                None,
            ),
        };
        api.with_report(report)
    }
}

fn repo_to_api(err: RepoError) -> ApiError {
    match err {
        RepoError::Duplicate { constraint } => ApiError::new(
            StatusCode::CONFLICT,
            codes::DUPLICATE,
            "Duplicate record",
            Some(constraint),
        ),
        RepoError::NotFound => ApiError::not_found("Resource not found"),
        RepoError::InvalidInput { message } => ApiError::new(
            StatusCode::BAD_REQUEST,
            codes::INVALID_INPUT,
            "Invalid input",
            Some(message),
        ),
        RepoError::Integrity { message } => ApiError::new(
            StatusCode::CONFLICT,
            codes::INTEGRITY,
            "Integrity constraint violated",
            Some(message),
        ),
        RepoError::Timeout => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::DB_TIMEOUT,
            "Storage timeout",
            None,
        ),
        RepoError::Persistence(_) => ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            codes::REPO,
            "Service temporarily unavailable",
            None,
        ),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report = self.report.unwrap_or_else(|| {
            ErrorReport::from_message(
                SOURCE,
                self.status,
                format!(
                    "{}: {}",
                    self.code,
                    self.hint.as_deref().unwrap_or(self.message)
                ),
            )
        });
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message.to_string(),
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        // Picked up by the shared logging middleware.
        report.attach(&mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_pattern_maps_to_its_own_code() {
        let err = ApiError::from(AppError::from(CacheError::invalid_pattern(
            "booking:[",
            "unterminated class",
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INVALID_PATTERN);
    }

    #[test]
    fn overlapping_booking_is_a_conflict() {
        let err = ApiError::from(AppError::from(RepoError::Duplicate {
            constraint: "bookings_vehicle_dates_excl".to_string(),
        }));
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.code(), codes::DUPLICATE);
    }

    #[test]
    fn field_validation_names_the_field() {
        let err = ApiError::from(AppError::from(DomainError::validation(
            "mileage_interval_km",
            "must be greater than zero",
        )));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INVALID_INPUT);
        assert_eq!(
            err.hint.as_deref(),
            Some("mileage_interval_km: must be greater than zero")
        );
    }

    #[test]
    fn reversed_date_range_is_invalid_input() {
        let err = ApiError::from(AppError::from(DomainError::DateRange {
            start: time::macros::date!(2025 - 07 - 05),
            end: time::macros::date!(2025 - 07 - 01),
        }));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.code(), codes::INVALID_INPUT);
        assert!(err.hint.is_some_and(|hint| hint.contains("2025-07-01")));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = ApiError::from(AppError::unexpected("lock poisoned"));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), codes::INTERNAL);
        assert!(err.hint.is_none());
    }
}
