//! Booking handlers

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::application::bookings::CreateBookingCommand;
use crate::application::repos::BookingFilter;
use crate::infra::http::api::error::ApiError;
use crate::infra::http::api::models::{BookingCreateRequest, BookingStatusRequest};
use crate::infra::http::api::state::ApiState;

pub async fn list_bookings(
    State(state): State<ApiState>,
    Query(filter): Query<BookingFilter>,
) -> Result<impl IntoResponse, ApiError> {
    let page = state.bookings.list(filter).await?;
    Ok(Json(page))
}

pub async fn get_booking(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state.bookings.get(id).await?;
    Ok(Json(booking))
}

pub async fn create_booking(
    State(state): State<ApiState>,
    Json(payload): Json<BookingCreateRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let command = CreateBookingCommand {
        vehicle_id: payload.vehicle_id,
        customer_id: payload.customer_id,
        start_date: payload.start_date,
        end_date: payload.end_date,
    };

    let booking = state.bookings.create(command).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn update_booking_status(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<BookingStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let booking = state.bookings.change_status(id, payload.status).await?;
    Ok(Json(booking))
}

pub async fn delete_booking(
    State(state): State<ApiState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.bookings.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
