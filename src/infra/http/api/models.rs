use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::domain::recurrence::IntervalKind;
use crate::domain::types::{BookingStatus, VehicleStatus};

#[derive(Debug, Deserialize, Serialize)]
pub struct VehicleCreateRequest {
    pub plate: String,
    pub make: String,
    pub model: String,
    pub year: i32,
    pub daily_rate_cents: i64,
    #[serde(default)]
    pub mileage_km: u32,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct VehicleUpdateRequest {
    pub status: Option<VehicleStatus>,
    pub daily_rate_cents: Option<i64>,
    pub mileage_km: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BookingCreateRequest {
    pub vehicle_id: Uuid,
    pub customer_id: Uuid,
    pub start_date: Date,
    pub end_date: Date,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct BookingStatusRequest {
    pub status: BookingStatus,
}

/// `?date=YYYY-MM-DD`; defaults to today (UTC).
#[derive(Debug, Default, Deserialize)]
pub struct AsOfQuery {
    pub date: Option<Date>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct RecurringExpenseCreateRequest {
    pub vehicle_id: Option<Uuid>,
    pub description: String,
    pub amount_cents: i64,
    pub anchor_date: Date,
    pub interval: IntervalKind,
    pub custom_interval_days: Option<u32>,
    pub total_occurrences_limit: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MaintenancePlanCreateRequest {
    pub vehicle_id: Uuid,
    pub title: String,
    pub interval: IntervalKind,
    pub custom_interval_days: Option<u32>,
    pub last_service_date: Date,
    pub mileage_interval_km: Option<u32>,
    pub last_service_mileage_km: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct MaintenanceCompleteRequest {
    pub serviced_on: Option<Date>,
    pub mileage_km: Option<u32>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct CachePurgeRequest {
    pub pattern: String,
}

#[derive(Debug, Serialize)]
pub struct CacheRemovedResponse {
    pub removed: usize,
}
