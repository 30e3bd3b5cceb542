//! Recurring expense handlers

use axum::Json;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::recurring::CreateRecurringExpenseCommand;
use crate::application::repos::RecurringExpenseFilter;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{AsOfQuery, RecurringExpenseCreateRequest};
use crate::infra::http::api::state::ApiState;

use super::as_of;

pub async fn list_recurring_expenses(
    State(state): State<ApiState>,
    Query(filter): Query<RecurringExpenseFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let records = state.recurring.list(filter).await?;
    Ok(Json(records))
}

pub async fn create_recurring_expense(
    State(state): State<ApiState>,
    Json(payload): Json<RecurringExpenseCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateRecurringExpenseCommand {
        vehicle_id: payload.vehicle_id,
        description: payload.description,
        amount_cents: payload.amount_cents,
        anchor_date: payload.anchor_date,
        interval: payload.interval,
        custom_interval_days: payload.custom_interval_days,
        total_occurrences_limit: payload.total_occurrences_limit,
    };

    let record = state.recurring.create(command).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

/// Run the processor on demand, for `?date=` or today.
pub async fn process_recurring_expenses(
    State(state): State<ApiState>,
    Query(query): Query<AsOfQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = state.recurring.process_due(as_of(&query)).await?;
    Ok(Json(summary))
}
