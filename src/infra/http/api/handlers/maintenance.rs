//! Maintenance plan handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::application::maintenance::CreateMaintenancePlanCommand;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{
    AsOfQuery, MaintenanceCompleteRequest, MaintenancePlanCreateRequest,
};
use crate::infra::http::api::state::ApiState;

use super::as_of;

pub async fn create_maintenance_plan(
    State(state): State<ApiState>,
    Json(payload): Json<MaintenancePlanCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateMaintenancePlanCommand {
        vehicle_id: payload.vehicle_id,
        title: payload.title,
        interval: payload.interval,
        custom_interval_days: payload.custom_interval_days,
        last_service_date: payload.last_service_date,
        mileage_interval_km: payload.mileage_interval_km,
        last_service_mileage_km: payload.last_service_mileage_km,
    };

    let plan = state.maintenance.create(command).await?;
    Ok((StatusCode::CREATED, Json(plan)))
}

pub async fn maintenance_due(
    State(state): State<ApiState>,
    Query(query): Query<AsOfQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let items = state.maintenance.due(as_of(&query)).await?;
    Ok(Json(items))
}

pub async fn complete_maintenance(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<MaintenanceCompleteRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let serviced_on = payload
        .serviced_on
        .unwrap_or_else(|| OffsetDateTime::now_utc().date());

    let plan = state
        .maintenance
        .complete(id, serviced_on, payload.mileage_km)
        .await?;
    Ok(Json(plan))
}
