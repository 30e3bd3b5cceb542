//! Vehicle handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::repos::VehicleFilter;
use crate::application::vehicles::{CreateVehicleCommand, UpdateVehicleCommand};
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{VehicleCreateRequest, VehicleUpdateRequest};
use crate::infra::http::api::state::ApiState;

pub async fn list_vehicles(
    State(state): State<ApiState>,
    Query(filter): Query<VehicleFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.vehicles.list(filter).await?;
    Ok(Json(page))
}

pub async fn get_vehicle(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let vehicle = state.vehicles.get(id).await?;
    Ok(Json(vehicle))
}

pub async fn create_vehicle(
    State(state): State<ApiState>,
    Json(payload): Json<VehicleCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateVehicleCommand {
        plate: payload.plate,
        make: payload.make,
        model: payload.model,
        year: payload.year,
        daily_rate_cents: payload.daily_rate_cents,
        mileage_km: payload.mileage_km,
    };

    let vehicle = state.vehicles.create(command).await?;
    Ok((StatusCode::CREATED, Json(vehicle)))
}

pub async fn update_vehicle(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<VehicleUpdateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = UpdateVehicleCommand {
        status: payload.status,
        daily_rate_cents: payload.daily_rate_cents,
        mileage_km: payload.mileage_km,
    };

    let vehicle = state.vehicles.update(id, command).await?;
    Ok(Json(vehicle))
}

pub async fn delete_vehicle(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.vehicles.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
